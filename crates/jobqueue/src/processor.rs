//! Processing pass over every stored job.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{QueueSettings, RetryPolicy};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, StoreError};
use crate::job::Job;
use crate::store::JobStore;

/// Outcome counters for one processing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Jobs whose target returned `true` and were deleted.
    pub succeeded: u32,
    /// Jobs whose dispatch failed.
    pub failed: u32,
    /// Jobs whose start time has not been reached.
    pub skipped: u32,
    /// Failed jobs moved to the dead-letter partition.
    pub dead_lettered: u32,
}

impl ProcessReport {
    /// Jobs that were dispatched, successfully or not.
    pub fn dispatched(&self) -> u32 {
        self.succeeded + self.failed
    }
}

/// Drives processing passes: load, gate, dispatch, retire.
///
/// A pass runs to completion on the calling thread. There is no locking
/// around job files, so two passes sharing a queue root can both run the
/// same job; run one processor per queue root.
pub struct QueueProcessor {
    store: JobStore,
    dispatcher: Dispatcher,
    retry: RetryPolicy,
}

impl QueueProcessor {
    /// Create a processor that retries failed jobs forever.
    pub fn new(store: JobStore, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            retry: RetryPolicy::Forever,
        }
    }

    /// Create a processor from resolved settings.
    pub fn from_settings(settings: &QueueSettings, dispatcher: Dispatcher) -> Self {
        Self::new(JobStore::open(settings), dispatcher).with_retry_policy(settings.retry.clone())
    }

    /// Set the failure policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run one pass at the current wall-clock time.
    pub fn process(&mut self) -> ProcessReport {
        self.process_at(Utc::now().timestamp())
    }

    /// Run one pass treating `now` (epoch seconds) as the current time.
    ///
    /// Jobs are visited in the order the store returns them. A failing job
    /// never stops the pass.
    pub fn process_at(&mut self, now: i64) -> ProcessReport {
        let mut report = ProcessReport::default();
        let jobs_by_type = self.store.pending_jobs();

        for (job_type, jobs) in jobs_by_type {
            if self.retry.dead_letter_type() == Some(job_type.as_str()) {
                continue;
            }

            for (path, job) in jobs {
                if !job.is_due(now) {
                    debug!(job_type = %job_type, id = %job.id, "Job skipped, start time not reached");
                    report.skipped += 1;
                    continue;
                }

                match self.dispatcher.run(&job) {
                    Ok(()) => {
                        self.store.remove(&path);
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        error!(job_type = %job_type, id = %job.id, "Failed to process job: {}", e);
                        report.failed += 1;
                        self.handle_failure(&job_type, &path, job, &e, &mut report);
                    }
                }
            }
        }

        if report != ProcessReport::default() {
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                dead_lettered = report.dead_lettered,
                "Processing pass complete"
            );
        }

        report
    }

    /// Move a dead-lettered job back into `job_type` with its attempt
    /// count reset. Returns false when there is no such job or no
    /// dead-letter partition.
    pub fn requeue_dead_letter(&self, id: &str, job_type: &str) -> Result<bool, StoreError> {
        let Some(dead_letter_type) = self.retry.dead_letter_type() else {
            return Ok(false);
        };

        let jobs = self.store.get_jobs(Some(dead_letter_type));
        let Some(mut job) = jobs
            .into_values()
            .flatten()
            .find(|job| job.id == id)
        else {
            return Ok(false);
        };

        job.attempts = 0;
        self.store.write(job_type, &job)?;
        self.store.delete(id, dead_letter_type);

        info!(job_type = %job_type, id = %id, "Requeued dead-lettered job");
        Ok(true)
    }

    fn handle_failure(
        &self,
        job_type: &str,
        path: &Path,
        mut job: Job,
        error: &DispatchError,
        report: &mut ProcessReport,
    ) {
        let RetryPolicy::Limited {
            max_attempts,
            dead_letter_type,
        } = &self.retry
        else {
            return;
        };

        job.attempts += 1;

        if job.attempts < *max_attempts {
            if let Err(e) = self.store.rewrite(path, &job) {
                error!(job_type = %job_type, id = %job.id, "Failed to record attempt: {}", e);
            }
            return;
        }

        match self.store.write(dead_letter_type, &job) {
            Ok(_) => {
                self.store.remove(path);
                report.dead_lettered += 1;
                warn!(
                    job_type = %job_type,
                    id = %job.id,
                    attempts = job.attempts,
                    "Moved job to dead letter partition after: {}",
                    error
                );
            }
            Err(e) => {
                error!(job_type = %job_type, id = %job.id, "Failed to dead-letter job: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
