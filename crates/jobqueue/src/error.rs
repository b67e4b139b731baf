//! Queue errors.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Job store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required enqueue option was not supplied.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A job type or id that cannot be used as a single path component.
    #[error("Invalid {field} '{value}'")]
    InvalidName { field: &'static str, value: String },

    /// Filesystem error.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job file that is not a valid job document.
    #[error("Failed to decode job file {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by a handler function.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The parameters did not match what the function expects.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The function ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// Dispatch error types.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered under the class name.
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// The handler has no function with this name.
    #[error("Unknown function: {class}::{function}")]
    UnknownFunction { class: String, function: String },

    /// The function returned something other than `true`.
    #[error("Job returned {0} instead of true")]
    NotTrue(Value),

    /// The function returned an error or panicked.
    #[error("Handler failed: {0}")]
    Handler(String),
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        DispatchError::Handler(err.to_string())
    }
}
