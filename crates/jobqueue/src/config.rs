//! Queue settings injected into the store, dispatcher and processor.

use std::path::PathBuf;

use jobqueue_config::{QueueConfig, RetryConfig};

/// What happens to a job whose dispatch fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Leave the job untouched; it is retried on every pass until it
    /// succeeds or is deleted by hand.
    #[default]
    Forever,
    /// Count failures in the job record and move the job to
    /// `dead_letter_type` once `max_attempts` is reached.
    Limited {
        max_attempts: u32,
        dead_letter_type: String,
    },
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        if config.max_attempts == 0 {
            RetryPolicy::Forever
        } else {
            RetryPolicy::Limited {
                max_attempts: config.max_attempts,
                dead_letter_type: config.dead_letter_type.clone(),
            }
        }
    }

    /// Partition holding exhausted jobs, if this policy has one.
    pub fn dead_letter_type(&self) -> Option<&str> {
        match self {
            RetryPolicy::Forever => None,
            RetryPolicy::Limited {
                dead_letter_type, ..
            } => Some(dead_letter_type),
        }
    }
}

/// Resolved queue settings.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Queue root directory.
    pub root: PathBuf,
    /// Base directory for non-library job filepaths.
    pub app_root: PathBuf,
    /// When false, `add` is a no-op.
    pub enabled: bool,
    /// Filepath value that selects the library loader.
    pub library_path: String,
    /// Failure handling.
    pub retry: RetryPolicy,
}

impl QueueSettings {
    /// Settings rooted at `root` with every other value at its default.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = QueueConfig::default();
        Self {
            root: root.into(),
            app_root: defaults.app_root_path(),
            enabled: defaults.enabled,
            library_path: defaults.library_path,
            retry: RetryPolicy::Forever,
        }
    }

    /// Resolve settings from the loaded configuration file.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            root: config.root_path(),
            app_root: config.app_root_path(),
            enabled: config.enabled,
            library_path: config.library_path.clone(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_app_root(mut self, app_root: impl Into<PathBuf>) -> Self {
        self.app_root = app_root.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
