//! Subcommand handlers for jobqueue.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

use jobqueue::{Dispatcher, JobOptions, JobStore, QueueProcessor, QueueSettings};

use crate::cli::Commands;
use crate::register::builtin_registry;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Dispatch a parsed subcommand.
pub(crate) async fn handle_command(command: Commands, settings: QueueSettings) -> CommandResult {
    match command {
        Commands::Add {
            job_type,
            class,
            function,
            filename,
            filepath,
            id,
            start_time,
            delay,
            params,
        } => {
            let options = JobOptions {
                job_type,
                class: Some(class),
                function: Some(function),
                filename: Some(filename),
                filepath,
                id,
                start_time: start_time.or_else(|| delay.map(|d| Utc::now().timestamp() + d)),
                params: Some(params.iter().map(String::as_str).map(parse_param).collect()),
            };
            add(&settings, options)
        }
        Commands::List { job_type } => list(&settings, job_type.as_deref()),
        Commands::Exists { id, job_type } => {
            let store = JobStore::open(&settings);
            println!("{}", store.exists(&id, &job_type));
            Ok(())
        }
        Commands::Delete { id, job_type } => {
            let store = JobStore::open(&settings);
            let removed = store.delete(&id, &job_type);
            info!(id = %id, job_type = %job_type, "Deleted {} job file(s)", removed);
            Ok(())
        }
        Commands::Process => {
            let mut processor = new_processor(&settings);
            let report = processor.process();
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Commands::Watch { interval } => watch(&settings, interval).await,
        Commands::Requeue { id, job_type } => {
            let processor = new_processor(&settings);
            if !processor.requeue_dead_letter(&id, &job_type)? {
                error!(id = %id, "No dead-lettered job with this id");
            }
            Ok(())
        }
    }
}

/// Parse a `--param` value as JSON, falling back to a plain string.
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn new_processor(settings: &QueueSettings) -> QueueProcessor {
    let dispatcher = Dispatcher::new(settings, builtin_registry());
    QueueProcessor::from_settings(settings, dispatcher)
}

fn add(settings: &QueueSettings, options: JobOptions) -> CommandResult {
    let store = JobStore::open(settings);
    match store.add(options)? {
        Some(job) => println!("{}", job.id),
        None => info!("Queues are disabled, job not added"),
    }
    Ok(())
}

fn list(settings: &QueueSettings, job_type: Option<&str>) -> CommandResult {
    let store = JobStore::open(settings);
    let jobs = store.get_jobs(job_type);
    println!("{}", serde_json::to_string_pretty(&jobs)?);
    Ok(())
}

/// Run passes on a fixed interval until ctrl-c. Each pass runs on the
/// blocking pool and the next tick waits for it to finish.
async fn watch(settings: &QueueSettings, interval_secs: u64) -> CommandResult {
    let mut processor = new_processor(settings);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    info!(
        root = %settings.root.display(),
        "Watching queue every {}s",
        interval_secs.max(1)
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => {
                processor = tokio::task::spawn_blocking(move || {
                    processor.process();
                    processor
                })
                .await?;
            }
        }
    }

    Ok(())
}
