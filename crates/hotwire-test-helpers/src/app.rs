//! In-memory applications for end-to-end reload tests
//!
//! Builds a session through the Container, backed by a mock file system
//! rooted at [`APP_ROOT`].

use crate::mocks::{MockDiagnosticHandler, RecordingWatcher};
use hotwire_core::fs::{FileSystem, MockFileSystem};
use hotwire_core::host::Journal;
use hotwire_core::{
    Container, DirectiveLoader, HotConfig, HotOptions, ModuleId, ReloadReport, Result, Session,
};
use std::sync::Arc;

pub const APP_ROOT: &str = "/app";

pub struct TestApp {
    pub fs: Arc<MockFileSystem>,
    pub diagnostics: Arc<MockDiagnosticHandler>,
    pub watcher: RecordingWatcher,
    session: Session<DirectiveLoader>,
}

impl TestApp {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_options(files, HotOptions::default())
    }

    pub fn with_options(files: &[(&str, &str)], options: HotOptions) -> Self {
        let fs = Arc::new(MockFileSystem::with_cwd(APP_ROOT));
        for (path, source) in files {
            fs.add_file(path, *source);
        }

        let diagnostics = MockDiagnosticHandler::new();
        let config = HotConfig {
            options,
            ..HotConfig::default()
        };
        let container = Container::with_dependencies(config, diagnostics.clone(), fs.clone());
        let watcher = RecordingWatcher::new();
        let session = container.session(container.directive_loader(), Box::new(watcher.clone()));

        Self {
            fs,
            diagnostics,
            watcher,
            session,
        }
    }

    /// Id of a file relative to the app root
    pub fn id(path: &str) -> ModuleId {
        ModuleId::new(format!("{}/{}", APP_ROOT, path))
    }

    /// Load `path` as the entry module
    pub fn load(&mut self, path: &str) -> Result<ModuleId> {
        self.session.load_entry(&format!("./{}", path))
    }

    /// Overwrite a file without notifying the session
    pub fn edit(&self, path: &str, source: &str) {
        self.fs.add_file(path, source);
    }

    /// Current content of a file
    pub fn source(&self, path: &str) -> String {
        self.fs.read_file(Self::id(path).as_path()).unwrap()
    }

    /// Tell the session that `path` changed on disk
    pub fn change(&mut self, path: &str) -> ReloadReport {
        self.session.handle_change(&Self::id(path))
    }

    pub fn session(&self) -> &Session<DirectiveLoader> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<DirectiveLoader> {
        &mut self.session
    }

    pub fn journal(&self) -> &Journal {
        self.session.loader().journal()
    }

    pub fn evaluations(&self, path: &str) -> usize {
        self.journal().evaluations(Self::id(path).as_str())
    }

    pub fn callbacks(&self, path: &str) -> usize {
        self.journal().callback_count(Self::id(path).as_str())
    }

    pub fn is_accepted(&self, path: &str) -> bool {
        self.session.is_accepted(&Self::id(path))
    }
}
