pub mod accept;
pub mod config;
pub mod crash;
pub mod di;
pub mod diagnostics;
pub mod eligibility;
pub mod errors;
pub mod fingerprint;
pub mod fs;
pub mod graph;
pub mod host;
pub mod invalidation;
pub mod loader;
pub mod module_id;
pub mod reload;
pub mod runtime;
pub mod session;
pub mod watcher;

pub use accept::{noop_callback, AcceptCallback, AcceptRegistry};
pub use config::{CliOverrides, HotConfig, HotOptions, WatchOptions};
pub use crash::CrashSafetyNet;
pub use di::Container;
pub use diagnostics::{
    CollectingDiagnosticHandler, ConsoleDiagnosticHandler, Diagnostic, DiagnosticHandler,
    DiagnosticLevel,
};
pub use eligibility::EligibilityFilter;
pub use errors::{HotError, Result};
pub use graph::DependencyGraph;
pub use host::DirectiveLoader;
pub use invalidation::{InvalidationEngine, InvalidationPlan};
pub use loader::ModuleLoader;
pub use module_id::ModuleId;
pub use reload::ReloadReport;
pub use runtime::HotRuntime;
pub use session::{ModuleScope, Session};
pub use watcher::{ChangeEvents, ModuleWatcher, NotifyWatcher, NullWatcher};
