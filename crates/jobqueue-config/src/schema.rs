//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue storage and dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// When false, enqueueing is a silent no-op.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Queue root directory. Defaults to `<data dir>/jobqueue/queue`.
    #[serde(default)]
    pub root: Option<String>,

    /// Base directory that non-library job filepaths are resolved against.
    #[serde(default)]
    pub app_root: Option<String>,

    /// Filepath value that routes a job through the shared library loader.
    #[serde(default = "default_library_path")]
    pub library_path: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            root: None,
            app_root: None,
            library_path: default_library_path(),
            retry: RetryConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Resolved queue root, with `~` expanded.
    pub fn root_path(&self) -> PathBuf {
        match &self.root {
            Some(root) => PathBuf::from(ConfigLoader::expand_path(root)),
            None => default_queue_root(),
        }
    }

    /// Resolved application root, with `~` expanded. Defaults to the
    /// current directory.
    pub fn app_root_path(&self) -> PathBuf {
        match &self.app_root {
            Some(root) => PathBuf::from(ConfigLoader::expand_path(root)),
            None => PathBuf::from("."),
        }
    }
}

/// Retry behaviour for jobs whose dispatch fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Failed attempts before a job is dead-lettered. 0 retries forever.
    #[serde(default)]
    pub max_attempts: u32,

    /// Partition that exhausted jobs are moved to.
    #[serde(default = "default_dead_letter_type")]
    pub dead_letter_type: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            dead_letter_type: default_dead_letter_type(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            ansi: default_true(),
        }
    }
}

impl LoggingConfig {
    /// Resolved log directory, with `~` expanded.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

/// Whether `name` can be used as a partition directory or job file stem.
///
/// Rejects empty names, dot-prefixed names (hidden from scans), path
/// separators and glob metacharacters, so a name always maps to exactly one
/// visible path component.
pub fn is_valid_partition_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '*' | '?' | '[' | ']' | '\0'))
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_library_path() -> String {
    "libraries".to_string()
}

fn default_dead_letter_type() -> String {
    "dead_letter".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_root() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("jobqueue").join("queue"))
        .unwrap_or_else(|| PathBuf::from("data/queue"))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
