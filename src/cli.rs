//! CLI definitions for jobqueue.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use jobqueue::WILDCARD;

/// jobqueue CLI.
#[derive(Parser)]
#[command(name = "jobqueue")]
#[command(about = "Disk-backed job queue")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "jobqueue.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Enqueue a job, replacing any job with the same type and id
    Add {
        /// Job type (partition)
        #[arg(long = "type")]
        job_type: Option<String>,

        /// Class that holds the function to run
        #[arg(long)]
        class: String,

        /// Function to run
        #[arg(long)]
        function: String,

        /// File containing the class
        #[arg(long)]
        filename: String,

        /// Location of the file, relative to the application root
        #[arg(long)]
        filepath: Option<String>,

        /// Job id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Do not run before this epoch timestamp
        #[arg(long, conflicts_with = "delay")]
        start_time: Option<i64>,

        /// Do not run for this many seconds
        #[arg(long)]
        delay: Option<i64>,

        /// Positional parameter, parsed as JSON or taken as a string
        #[arg(long = "param")]
        params: Vec<String>,
    },

    /// Print pending jobs as JSON
    List {
        /// Only list this type
        #[arg(long = "type")]
        job_type: Option<String>,
    },

    /// Check whether a job exists
    Exists {
        /// Job id
        id: String,

        /// Job type
        #[arg(long = "type", default_value = WILDCARD)]
        job_type: String,
    },

    /// Delete a job
    Delete {
        /// Job id
        id: String,

        /// Job type
        #[arg(long = "type", default_value = WILDCARD)]
        job_type: String,
    },

    /// Run one processing pass
    Process,

    /// Run processing passes on an interval until interrupted
    Watch {
        /// Seconds between passes
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// Move a dead-lettered job back into a type
    Requeue {
        /// Job id
        id: String,

        /// Destination type
        #[arg(long = "type")]
        job_type: String,
    },
}
