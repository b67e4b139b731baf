//! # jobqueue
//!
//! Disk-backed job queue.
//!
//! ## Features
//!
//! - One JSON file per job, one directory per job type
//! - Overwrite-by-id enqueueing
//! - Delayed start gate
//! - Handler dispatch with per-run instance caching
//! - At-least-once execution, retry forever or dead-letter after N attempts
//!
//! ```text
//! {queue_root}/
//! ├── email/
//! │   └── {id}.json
//! └── all/
//!     └── {id}.json
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod job;
pub mod processor;
pub mod store;

pub use config::{QueueSettings, RetryPolicy};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, HandlerError, StoreError};
pub use handler::{ClassLoader, FnHandler, HandlerRegistry, JobHandler, LibraryLoader};
pub use job::{Job, JobOptions, JobTarget};
pub use processor::{ProcessReport, QueueProcessor};
pub use store::{JobStore, DEFAULT_TYPE, WILDCARD};
