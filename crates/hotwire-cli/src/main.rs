use clap::Parser;
use hotwire_core::config::CONFIG_FILE_NAME;
use hotwire_core::{
    CliOverrides, Container, DirectiveLoader, HotConfig, HotRuntime, ModuleId, NotifyWatcher,
    NullWatcher, Session,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Hotwire - hot module reloading for directive programs
#[derive(Parser, Debug, Clone)]
#[command(name = "hotwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Entry module to load and watch
    #[arg(value_name = "ENTRY")]
    entry: Option<String>,

    /// Path to hotwire.json configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a default hotwire.json and exit
    #[arg(long)]
    init: bool,

    /// Do not report errors raised while reloading a module
    #[arg(long)]
    silent_require_error: bool,

    /// Let uncaught failures propagate instead of containing them
    #[arg(long)]
    no_exception_catch: bool,

    /// Use native file notifications instead of polling
    #[arg(long)]
    no_polling: bool,

    /// Ignore repeated changes of a module within this many milliseconds
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Load the entry module once and exit without watching
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=info for normal output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    if cli.init {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        init_project(&path)?;
        return Ok(());
    }

    let config = load_config(&cli)?;

    let Some(entry) = config.entry.clone() else {
        eprintln!("Error: No entry module specified. Use --help for usage information.");
        std::process::exit(1);
    };
    let entry = as_request(&entry);
    debug!("Configuration: {:?}", config);

    let container = Container::new(config);
    let loader = container.directive_loader();

    if cli.once {
        let mut session = container.session(loader, Box::new(NullWatcher));
        let id = load_entry(&mut session, &entry)?;
        println!("Loaded {}", id);
        return Ok(());
    }

    let watch = container.config().watch.clone();
    let (watcher, events) = NotifyWatcher::new(&watch)?;
    let mut session = container.session(loader, Box::new(watcher));
    let id = load_entry(&mut session, &entry)?;
    info!("Loaded {}", id);

    println!("Watching for changes... (Press Ctrl+C to stop)");
    let mut runtime = HotRuntime::new(
        session,
        events,
        &watch,
        Arc::clone(container.file_system()),
    );
    runtime.run()?;

    Ok(())
}

/// Write a default configuration file
fn init_project(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    HotConfig::init_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
    println!("Created {}", path.display());
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<HotConfig> {
    let mut config = if let Some(ref path) = cli.config {
        HotConfig::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?
    } else {
        // Try to find hotwire.json in current directory
        let default_path = PathBuf::from(CONFIG_FILE_NAME);
        if default_path.exists() {
            HotConfig::from_file(&default_path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", CONFIG_FILE_NAME, e))?
        } else {
            HotConfig::default()
        }
    };

    config.merge_with_cli(CliOverrides {
        entry: cli.entry.clone(),
        silent_require_error: cli.silent_require_error,
        no_exception_catch: cli.no_exception_catch,
        no_polling: cli.no_polling,
        debounce_ms: cli.debounce_ms,
    });

    Ok(config)
}

/// Entry paths on the command line are file paths, not bare module names.
fn as_request(entry: &str) -> String {
    let path = Path::new(entry);
    if path.is_absolute() || entry.starts_with("./") || entry.starts_with("../") {
        entry.to_string()
    } else {
        format!("./{}", entry)
    }
}

fn load_entry(session: &mut Session<DirectiveLoader>, entry: &str) -> anyhow::Result<ModuleId> {
    session
        .load_entry(entry)
        .map_err(|e| anyhow::anyhow!("Failed to load entry module: {}", e))
}
