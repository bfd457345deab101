//! s3local - local S3 emulator with event notifications
//!
//! Serves a path-style S3 API over a directory and delivers object events to
//! the functions subscribed to them.

mod commands;
mod reload;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CommandContext;
use s3local_core::config::LoggingConfig;
use s3local_core::S3LocalConfig;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "s3local")]
#[command(author = "s3local contributors")]
#[command(version = s3local_core::VERSION)]
#[command(about = "Local S3 emulator with event notifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "S3LOCAL_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, global = true, env = "S3LOCAL_ADDRESS")]
    address: Option<String>,

    /// Port number
    #[arg(short, long, global = true, env = "S3LOCAL_PORT")]
    port: Option<u16>,

    /// Storage directory
    #[arg(short, long, global = true, env = "S3LOCAL_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "S3LOCAL_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the S3 emulator and dispatch events (default)
    Start,

    /// Create the service's buckets
    Create,

    /// Remove the service's buckets
    Remove {
        /// Delete buckets that still hold objects
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("s3local {}", s3local_core::VERSION);
        return Ok(());
    }

    // Load or create config
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = S3LocalConfig::from_file(path)?;
            config.apply_env();
            config
        }
        None => S3LocalConfig::from_env(),
    };

    // Override with CLI args
    if let Some(address) = cli.address {
        config.server.address = address;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(directory) = cli.directory {
        config.storage.directory = directory;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging);

    let ctx = CommandContext {
        config,
        config_path: cli.config,
    };

    match cli.command {
        Some(Commands::Start) | None => commands::start::execute(ctx).await,
        Some(Commands::Create) => commands::create::execute(&ctx).await,
        Some(Commands::Remove { force }) => commands::remove::execute(&ctx, force).await,
        Some(Commands::Version) => Ok(()),
    }
}

/// `RUST_LOG` takes precedence over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
