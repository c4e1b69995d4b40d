use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File system access used by the directive host and the runtime
/// This allows for dependency injection and testing with an in-memory tree
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// Absolute, normalized form of an existing path.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// Operating system file system
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}

/// In-memory file system for tests
///
/// Paths are normalized lexically; there are no symlinks to resolve.
#[derive(Debug)]
pub struct MockFileSystem {
    files: Mutex<FxHashMap<PathBuf, String>>,
    cwd: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_cwd("/")
    }

    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            files: Mutex::new(FxHashMap::default()),
            cwd: cwd.into(),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = self.absolute(path.as_ref());
        if let Ok(mut files) = self.files.lock() {
            files.insert(path, content.into());
        }
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path.as_ref());
        self.files
            .lock()
            .map(|mut files| files.remove(&path).is_some())
            .unwrap_or(false)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.cwd.join(path).clean()
        }
    }

    fn poisoned() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "mock file system lock poisoned")
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        let path = self.absolute(path);
        let files = self.files.lock().map_err(|_| Self::poisoned())?;
        files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        })
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        self.add_file(path, content);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        self.files
            .lock()
            .map(|files| files.contains_key(&path))
            .unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let path = self.absolute(path);
        if self.exists(&path) {
            Ok(path)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        }
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
