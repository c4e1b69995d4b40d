use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::eligibility::{EligibilityFilter, DEFAULT_VENDOR_DIRS};
use crate::errors::{HotError, Result};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "hotwire.json";

/// Options that control reload behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotOptions {
    /// Do not report errors raised while re-evaluating a module (default: false)
    #[serde(default)]
    pub silent_require_error: bool,

    /// Do not contain uncaught failures (default: false)
    #[serde(default)]
    pub no_exception_catch: bool,

    /// Pretty-print diagnostics (default: true)
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for HotOptions {
    fn default() -> Self {
        Self {
            silent_require_error: false,
            no_exception_catch: false,
            pretty: true,
        }
    }
}

/// File watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    /// Poll file metadata instead of using OS notifications (default: true)
    #[serde(default = "default_true")]
    pub use_polling: bool,

    /// Poll interval in milliseconds (default: 100)
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ignore repeated events for a module within this window (default: 100)
    #[serde(default = "default_interval_ms")]
    pub debounce_ms: u64,

    /// Skip reloads when the file content hash did not change (default: true)
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,
}

impl WatchOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            use_polling: true,
            poll_interval_ms: default_interval_ms(),
            debounce_ms: default_interval_ms(),
            skip_unchanged: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    100
}

fn default_vendor_dirs() -> Vec<String> {
    DEFAULT_VENDOR_DIRS.iter().map(|d| d.to_string()).collect()
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotConfig {
    #[serde(default)]
    pub options: HotOptions,

    #[serde(default)]
    pub watch: WatchOptions,

    /// Directory names whose modules are never tracked
    #[serde(default = "default_vendor_dirs")]
    pub vendor_dirs: Vec<String>,

    /// Entry module, relative to the working directory
    #[serde(default)]
    pub entry: Option<String>,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            options: HotOptions::default(),
            watch: WatchOptions::default(),
            vendor_dirs: default_vendor_dirs(),
            entry: None,
        }
    }
}

/// Command-line values that take precedence over the file configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub entry: Option<String>,
    pub silent_require_error: bool,
    pub no_exception_catch: bool,
    pub no_polling: bool,
    pub debounce_ms: Option<u64>,
}

impl HotConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| HotError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<()> {
        let config = HotConfig::default();
        let json =
            serde_json::to_string_pretty(&config).map_err(|e| HotError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Merge this configuration with CLI overrides
    ///
    /// Flags only ever switch behavior on; absent values keep the file's.
    pub fn merge_with_cli(&mut self, cli: CliOverrides) {
        if cli.entry.is_some() {
            self.entry = cli.entry;
        }
        self.options.silent_require_error |= cli.silent_require_error;
        self.options.no_exception_catch |= cli.no_exception_catch;
        if cli.no_polling {
            self.watch.use_polling = false;
        }
        if let Some(debounce_ms) = cli.debounce_ms {
            self.watch.debounce_ms = debounce_ms;
        }
    }

    pub fn eligibility_filter(&self) -> EligibilityFilter {
        EligibilityFilter::new(self.vendor_dirs.iter().cloned())
    }
}
