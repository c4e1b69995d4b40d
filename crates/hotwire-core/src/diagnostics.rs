use crate::module_id::ModuleId;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        }
    }
}

/// A human-readable line about a reload, optionally tied to one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub module: Option<ModuleId>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(module: Option<&ModuleId>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            module: module.cloned(),
            message: message.into(),
        }
    }

    pub fn warning(module: Option<&ModuleId>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            module: module.cloned(),
            message: message.into(),
        }
    }

    pub fn info(module: Option<&ModuleId>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            module: module.cloned(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{} [{}]: {}", self.level.as_str(), module, self.message),
            None => write!(f, "{}: {}", self.level.as_str(), self.message),
        }
    }
}

/// Trait for handling diagnostics
/// This allows for dependency injection and testing with mock handlers
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn error(&self, module: Option<&ModuleId>, message: &str) {
        self.report(Diagnostic::error(module, message));
    }

    fn warning(&self, module: Option<&ModuleId>, message: &str) {
        self.report(Diagnostic::warning(module, message));
    }

    fn info(&self, module: Option<&ModuleId>, message: &str) {
        self.report(Diagnostic::info(module, message));
    }

    fn has_errors(&self) -> bool;
    fn error_count(&self) -> usize;
    fn warning_count(&self) -> usize;
    fn get_diagnostics(&self) -> Vec<Diagnostic>;
}

fn count_level(diagnostics: &Mutex<Vec<Diagnostic>>, level: DiagnosticLevel) -> usize {
    diagnostics
        .lock()
        .map(|d| d.iter().filter(|d| d.level == level).count())
        .unwrap_or(0)
}

/// Console-based diagnostic handler that prints to stderr
///
/// Only counts are kept; the handler lives as long as the watch loop, so
/// printed diagnostics are not retained.
pub struct ConsoleDiagnosticHandler {
    errors: AtomicUsize,
    warnings: AtomicUsize,
    pretty: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(pretty: bool) -> Self {
        Self {
            errors: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
            pretty,
        }
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        let target = diagnostic
            .module
            .as_ref()
            .map(|m| format!(" [{}]", m))
            .unwrap_or_default();

        if self.pretty {
            eprintln!(
                "\x1b[1mhotwire {}\x1b[0m{}: {}",
                diagnostic.level.as_str(),
                target,
                diagnostic.message
            );
        } else {
            eprintln!(
                "hotwire {}{}: {}",
                diagnostic.level.as_str(),
                target,
                diagnostic.message
            );
        }

        match diagnostic.level {
            DiagnosticLevel::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticLevel::Warning => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Always empty: printed diagnostics are not kept.
    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Collecting diagnostic handler for testing
/// Collects all diagnostics without printing
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Messages of every collected diagnostic, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.get_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }
}

impl Default for CollectingDiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let module = ModuleId::new("/app/a.hot");
        let diag = Diagnostic::error(Some(&module), "Test error");

        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.message, "Test error");
        assert_eq!(diag.to_string(), "error [/app/a.hot]: Test error");
    }

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingDiagnosticHandler::new();

        handler.error(None, "Error 1");
        handler.warning(None, "Warning 1");
        handler.error(None, "Error 2");

        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.has_errors());
        assert_eq!(handler.messages(), vec!["Error 1", "Warning 1", "Error 2"]);
    }

    #[test]
    fn test_console_handler_counts_without_retaining() {
        let handler = ConsoleDiagnosticHandler::new(false);

        for i in 0..50 {
            handler.info(None, &format!("reloading batch {}", i));
        }
        handler.warning(None, "Warning 1");
        handler.error(None, "Error 1");
        handler.error(None, "Error 2");

        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.has_errors());
        assert!(handler.get_diagnostics().is_empty());
    }

    #[test]
    fn test_no_errors() {
        let handler = CollectingDiagnosticHandler::new();

        handler.warning(None, "Warning 1");
        handler.info(None, "Info 1");

        assert!(!handler.has_errors());
        assert_eq!(handler.error_count(), 0);
    }
}
