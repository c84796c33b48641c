//! staffdesk - command-line client for the staffdesk employee management API.
//!
//! Signs in against the backend, keeps the session tokens between runs and
//! exposes the company, department and employee endpoints as subcommands.

mod commands;
mod format;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use staffdesk_core::{ApiError, AppContext, Config, ErrorCategory, SessionError};

use commands::{Command, OutputFormat};

// ============================================================================
// Constants
// ============================================================================

/// File name prefix for the daily rolling log
const LOG_FILE_PREFIX: &str = "staffdesk.log";

#[derive(Debug, Parser)]
#[command(name = "staffdesk", version, about = "Employee management from the command line")]
struct Cli {
    /// Backend base URL (overrides config and STAFFDESK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
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

fn error_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.downcast_ref::<ApiError>()
        .map(ApiError::category)
        .or_else(|| err.downcast_ref::<SessionError>().map(SessionError::category))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let log_dir = if cli.log_file {
        let dir = config.cache_dir()?;
        std::fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };
    let guard = init_tracing(log_dir.as_deref());

    info!(base_url = %config.api_base_url, storage = ?config.token_storage, "Starting staffdesk");

    let ctx = AppContext::from_config(config)?;
    ctx.session().initialize().await;

    if let Err(e) = commands::run(&ctx, cli.command, cli.output).await {
        eprintln!("Error: {}", e);
        if let Some(category) = error_category(&e) {
            eprintln!("{}", category.hint());
        }
        // Flush the file log before exiting
        drop(guard);
        std::process::exit(1);
    }

    drop(guard);
    Ok(())
}
