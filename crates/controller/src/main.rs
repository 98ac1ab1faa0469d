//! Certsync - Main entry point
//!
//! Reconciles the certificate requests in a configuration file against the
//! configured credential store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use certsync_config::{Config, LogFormat, StoreConfig};
use certsync_controller::{
    CredentialStore, FileCredentialStore, IssuerFactory, IssuerRegistry, MemoryCredentialStore,
    ReconcileContext, Reconciler, ResyncScheduler, ValidationPolicy,
};

/// Certsync - keeps stored TLS credentials in line with certificate requests
#[derive(Parser, Debug)]
#[command(name = "certsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "CERTSYNC_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Override the configured log format
    #[arg(long = "log-format", value_enum, global = true)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resync all certificates periodically (default)
    Run,
    /// Resync all certificates once and exit
    Once,
    /// Validate configuration file and exit
    Check,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let log_format = cli
        .log_format
        .map(LogFormat::from)
        .unwrap_or(config.logging.format);
    init_logging(log_level, log_format);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => check_config(&config, cli.config.as_deref()),
        Commands::Once => run(config, false),
        Commands::Run => run(config, true),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).context("Failed to load configuration file"),
        None => Ok(Config::default()),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Validate configuration and exit
fn check_config(config: &Config, config_path: Option<&str>) -> Result<()> {
    let result = config.validate()?;

    info!("Configuration test successful:");
    info!("  - {} issuer(s)", config.issuers.len());
    info!("  - {} certificate(s)", config.certificates.len());
    if result.has_warnings() {
        info!("  - {} warning(s)", result.warnings.len());
    }

    println!(
        "certsync: configuration file {} test is successful",
        config_path.unwrap_or("(default)")
    );

    Ok(())
}

fn run(config: Config, periodic: bool) -> Result<()> {
    config.validate()?;

    if config.certificates.is_empty() {
        warn!("No certificates configured, nothing to reconcile");
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let scheduler = build_scheduler(&config)?;

        if !periodic {
            let summary = scheduler.run_once().await;
            if summary.failed > 0 {
                anyhow::bail!("{} of {} certificate(s) failed", summary.failed, summary.total());
            }
            return Ok(());
        }

        tokio::select! {
            _ = scheduler.run() => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Received shutdown signal, stopping");
            }
        }
        Ok(())
    })
}

fn build_scheduler(config: &Config) -> Result<ResyncScheduler> {
    let store: Arc<dyn CredentialStore> = match &config.store {
        StoreConfig::Memory => {
            warn!("Using in-memory credential store, credentials are lost on exit");
            Arc::new(MemoryCredentialStore::new())
        }
        StoreConfig::Filesystem { path } => Arc::new(
            FileCredentialStore::new(path)
                .with_context(|| format!("Failed to open credential storage at {:?}", path))?,
        ),
    };

    let issuers = IssuerRegistry::from_descriptors(config.issuers.iter().cloned());
    let factory = IssuerFactory::with_builtin();

    let ctx = ReconcileContext::new(Arc::new(issuers), Arc::new(factory), store).with_policy(
        ValidationPolicy {
            accept_pkcs8: config.controller.accept_pkcs8_keys,
        },
    );

    Ok(
        ResyncScheduler::new(Reconciler::new(ctx), config.certificates.clone())
            .with_interval(Duration::from_secs(config.controller.resync_interval_secs))
            .with_max_concurrent(config.controller.max_concurrent_passes),
    )
}
