//! Mock implementations for testing

use hotwire_core::diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticLevel};
use hotwire_core::{ModuleId, ModuleWatcher, Result};
use std::sync::{Arc, Mutex};

/// A mock diagnostic handler that collects diagnostics
#[derive(Debug, Default)]
pub struct MockDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MockDiagnosticHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.get_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    pub fn clear(&self) {
        self.diagnostics.lock().unwrap().clear();
    }
}

impl DiagnosticHandler for MockDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }
}

/// A watcher that remembers which modules are watched
///
/// Clones share state, so a test can keep one handle and give the other to
/// a session.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatcher {
    watching: Arc<Mutex<Vec<ModuleId>>>,
    unwatched: Arc<Mutex<Vec<ModuleId>>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_watching(&self, id: &ModuleId) -> bool {
        self.watching.lock().unwrap().contains(id)
    }

    pub fn watched_count(&self) -> usize {
        self.watching.lock().unwrap().len()
    }

    /// Every unwatch call, in order
    pub fn unwatched(&self) -> Vec<ModuleId> {
        self.unwatched.lock().unwrap().clone()
    }
}

impl ModuleWatcher for RecordingWatcher {
    fn watch(&mut self, id: &ModuleId) -> Result<()> {
        let mut watching = self.watching.lock().unwrap();
        if !watching.contains(id) {
            watching.push(id.clone());
        }
        Ok(())
    }

    fn unwatch(&mut self, id: &ModuleId) -> Result<()> {
        self.watching.lock().unwrap().retain(|w| w != id);
        self.unwatched.lock().unwrap().push(id.clone());
        Ok(())
    }
}
