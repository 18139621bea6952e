//! Go VV - a terminal companion for the e-bike ride tracker.
//!
//! Records simulated rides, browses ride history and the dashboard from the
//! activity backend, and manages the offline cache of the web app.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use govv_core::api::DEFAULT_PAGE_SIZE;
use govv_core::Config;

/// Log file name prefix; the appender adds the date
const LOG_FILE_PREFIX: &str = "govv.log";

#[derive(Parser)]
#[command(name = "govv")]
#[command(about = "Track simulated e-bike rides and manage the Go VV offline cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a simulated ride and save it to the backend
    Ride {
        /// How long to ride, in seconds
        #[arg(short, long, default_value_t = 30)]
        seconds: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Hide the ride from other riders
        #[arg(long)]
        private: bool,
        /// Print the summary without saving it
        #[arg(long)]
        no_save: bool,
        /// Seed the GPS jitter for a reproducible route
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List saved rides, newest first
    History {
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one ride in detail
    Show { id: String },
    /// Totals, streak and speed trend over recent rides
    Dashboard,
    /// Manage the offline cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Install and activate the current cache generation
    Update,
    /// Run one request through the cache manager
    Fetch {
        /// Path on the app origin, e.g. /index.html
        path: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },
    /// List cache generations on disk
    Status,
}

/// Initialize logging to stderr and, when `log_dir` is usable, a daily log file.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;

    let log_dir = config.cache_dir().ok();
    let _log_guard = init_tracing(log_dir.as_deref());
    info!(backend = config.backend_url(), "govv starting");

    match cli.command {
        Commands::Ride {
            seconds,
            name,
            notes,
            private,
            no_save,
            seed,
        } => {
            let options = commands::ride::RideOptions {
                seconds,
                name,
                notes,
                private,
                save: !no_save,
                seed,
            };
            commands::ride::run(&config, options).await
        }
        Commands::History { limit, offset } => commands::activities::history(&config, limit, offset).await,
        Commands::Show { id } => commands::activities::show(&config, &id).await,
        Commands::Dashboard => commands::activities::dashboard(&config).await,
        Commands::Cache { command } => commands::cache::run(&config, command).await,
    }
}
