//! jobqueue - Disk-backed job queue
//!
//! Command-line entry point: enqueue, inspect and process jobs.

mod cli;
mod commands;
mod register;

use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobqueue::QueueSettings;
use jobqueue_config::{ConfigLoader, ConfigValidator, LoggingConfig};

use crate::cli::Cli;
use crate::commands::handle_command;

/// Initialize tracing with console output and, when configured, a daily
/// rolling log file.
///
/// Console output goes to stderr so command output on stdout stays
/// machine-readable.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file_layer = match logging.file_path() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("jobqueue")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the program duration.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(logging.ansi)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.logging)?;

    let warnings = ConfigValidator::validate(&config)?.into_result()?;
    for warning in warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    let settings = QueueSettings::from_config(&config.queue);
    handle_command(cli.command, settings).await
}
