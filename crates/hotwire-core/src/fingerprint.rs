use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::fs::FileSystem;
use crate::module_id::ModuleId;

/// Content hashes of watched files, used to drop events that did not change
/// a file's bytes (touches, metadata-only updates seen by polling).
pub struct Fingerprints {
    fs: Arc<dyn FileSystem>,
    hashes: FxHashMap<ModuleId, blake3::Hash>,
}

impl Fingerprints {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: FxHashMap::default(),
        }
    }

    /// Remember the current content of `id` without reporting a change.
    pub fn record(&mut self, id: &ModuleId) {
        if let Ok(content) = self.fs.read_file(id.as_path()) {
            self.hashes
                .insert(id.clone(), blake3::hash(content.as_bytes()));
        }
    }

    /// Whether the content of `id` differs from the last observation.
    ///
    /// Unknown or unreadable files count as changed.
    pub fn has_changed(&mut self, id: &ModuleId) -> bool {
        let content = match self.fs.read_file(id.as_path()) {
            Ok(content) => content,
            Err(_) => {
                self.hashes.remove(id);
                return true;
            }
        };

        let hash = blake3::hash(content.as_bytes());
        match self.hashes.insert(id.clone(), hash) {
            Some(previous) => previous != hash,
            None => true,
        }
    }

    pub fn forget(&mut self, id: &ModuleId) {
        self.hashes.remove(id);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::path::Path;

    #[test]
    fn test_detects_content_changes_only() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/app/a.hot", "print one");
        let id = ModuleId::new("/app/a.hot");
        let mut fingerprints = Fingerprints::new(fs.clone());

        fingerprints.record(&id);
        assert!(!fingerprints.has_changed(&id));

        fs.write_file(Path::new("/app/a.hot"), "print two").unwrap();
        assert!(fingerprints.has_changed(&id));
        assert!(!fingerprints.has_changed(&id));
    }

    #[test]
    fn test_unknown_and_missing_files_count_as_changed() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/app/a.hot", "print one");
        let id = ModuleId::new("/app/a.hot");
        let mut fingerprints = Fingerprints::new(fs.clone());

        assert!(fingerprints.has_changed(&id));
        assert_eq!(fingerprints.len(), 1);

        fs.remove_file("/app/a.hot");
        assert!(fingerprints.has_changed(&id));
        assert!(fingerprints.is_empty());
    }
}
