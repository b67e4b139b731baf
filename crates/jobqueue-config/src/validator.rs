//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{is_valid_partition_name, Config};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error, if any, into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_queue(config, &mut result);
        Self::validate_retry(config, &mut result);
        Self::validate_logging(config, &mut result);

        Ok(result)
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.root.as_deref().is_some_and(|r| r.trim().is_empty()) {
            result.add_error(ValidationError::new(
                "queue.root",
                "Queue root cannot be empty",
            ));
        }

        if config.queue.library_path.is_empty() {
            result.add_error(ValidationError::new(
                "queue.library_path",
                "library_path cannot be empty",
            ));
        }

        if !config.queue.enabled {
            result.add_warning(ValidationWarning::new(
                "queue.enabled",
                "Queues are disabled, new jobs will be silently dropped",
            ));
        }
    }

    fn validate_retry(config: &Config, result: &mut ValidationResult) {
        let retry = &config.queue.retry;
        if retry.max_attempts == 0 {
            return;
        }

        if !is_valid_partition_name(&retry.dead_letter_type) {
            result.add_error(ValidationError::new(
                "queue.retry.dead_letter_type",
                format!(
                    "'{}' is not a valid partition name",
                    retry.dead_letter_type
                ),
            ));
        }

        if retry.max_attempts == 1 {
            result.add_warning(ValidationWarning::new(
                "queue.retry.max_attempts",
                "max_attempts = 1 dead-letters a job on its first failure",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        if config.logging.level.trim().is_empty() {
            result.add_error(ValidationError::new(
                "logging.level",
                "Log level cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
