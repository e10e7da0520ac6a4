//! emuctl - GPU driver and settings manager for the emulator front-end

use anyhow::Result;
use clap::Parser;
use emuctl::cli::{self, Command};
use emuctl::config::{AppConfig, LoggingConfig};
use emuctl::paths::AppPaths;
use emuctl::App;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// emuctl - manage GPU drivers, engine settings and preferences
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to config.yaml in the data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Data directory, overrides portable/installed detection
    #[arg(long, env = "EMUCTL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::resolve(args.data_dir.as_deref());
    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    let config = AppConfig::load_or_default(&config_path).await?;

    let _log_guard = init_logging(&args.log_level, &config.logging, &paths.logs_dir)?;

    info!("Starting emuctl v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let app = App::open(paths, config).await?;

    if let Err(e) = app.registry.restore_selection() {
        warn!("Failed to restore the selected driver: {}", e);
    }

    let command = args.command.unwrap_or(Command::Status);
    let result = cli::run(&app, command).await;

    app.shutdown()?;

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init_logging(
    level: &str,
    logging: &LoggingConfig,
    logs_dir: &Path,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = if logging.file {
        std::fs::create_dir_all(logs_dir)?;
        let appender = tracing_appender::rolling::daily(logs_dir, "emuctl.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = if logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}
