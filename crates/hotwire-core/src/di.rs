use crate::config::HotConfig;
use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use crate::fs::{FileSystem, RealFileSystem};
use crate::host::DirectiveLoader;
use crate::loader::ModuleLoader;
use crate::session::Session;
use crate::watcher::ModuleWatcher;
use std::sync::Arc;

/// Dependency injection container
/// Manages all shared dependencies and creates sessions with proper wiring
pub struct Container {
    config: Arc<HotConfig>,
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
    file_system: Arc<dyn FileSystem>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(config: HotConfig) -> Self {
        let config = Arc::new(config);

        let diagnostic_handler = Arc::new(ConsoleDiagnosticHandler::new(config.options.pretty));

        let file_system = Arc::new(RealFileSystem::new());

        Container {
            config,
            diagnostic_handler,
            file_system,
        }
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        config: HotConfig,
        diagnostic_handler: Arc<dyn DiagnosticHandler>,
        file_system: Arc<dyn FileSystem>,
    ) -> Self {
        Container {
            config: Arc::new(config),
            diagnostic_handler,
            file_system,
        }
    }

    pub fn config(&self) -> &Arc<HotConfig> {
        &self.config
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    /// A directive loader reading from the container's file system
    pub fn directive_loader(&self) -> DirectiveLoader {
        DirectiveLoader::new(Arc::clone(&self.file_system))
    }

    /// A session over `loader` configured from the container
    pub fn session<L: ModuleLoader>(&self, loader: L, watcher: Box<dyn ModuleWatcher>) -> Session<L> {
        Session::new(
            loader,
            watcher,
            &self.config.options,
            self.config.eligibility_filter(),
            Arc::clone(&self.diagnostic_handler),
        )
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostic_handler.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostic_handler.warning_count()
    }
}
