//! Job persistence store.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use jobqueue_config::is_valid_partition_name;
use tracing::{debug, error, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::QueueSettings;
use crate::error::StoreError;
use crate::job::{generate_id, Job, JobOptions, JobTarget};

/// Partition used when an enqueue does not name a type.
pub const DEFAULT_TYPE: &str = "all";

/// Type (or id) pattern matching every partition.
pub const WILDCARD: &str = "*";

/// Job file extension.
pub const JOB_EXTENSION: &str = "json";

/// File system based job store.
///
/// One directory per job type, one JSON file per job:
/// ```text
/// {root}/
/// ├── {type}/
/// │   ├── {id}.json
/// │   └── {id}.json
/// └── all/
///     └── {id}.json
/// ```
///
/// Writes go straight to the target file. A crash mid-write can leave a
/// truncated record, which is reported and skipped on read.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
    enabled: bool,
    library_path: String,
}

impl JobStore {
    /// Open a store, creating the root directory if it does not exist.
    ///
    /// Failure to create the root is logged; later reads then come back
    /// empty and writes fail.
    pub fn open(settings: &QueueSettings) -> Self {
        let root = settings.root.clone();

        if !root.is_dir() {
            if let Err(e) = fs::create_dir_all(&root) {
                error!(path = %root.display(), "Failed to create queue directory: {}", e);
            }
        }

        debug!("JobStore opened at {:?}", root);

        Self {
            root,
            enabled: settings.enabled,
            library_path: settings.library_path.clone(),
        }
    }

    /// Queue root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `add` accepts new jobs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enqueue a job, overwriting any job with the same type and id.
    ///
    /// Returns `Ok(None)` without touching the disk when queues are
    /// disabled. Missing required options fail before any I/O.
    pub fn add(&self, options: JobOptions) -> Result<Option<Job>, StoreError> {
        if !self.enabled {
            return Ok(None);
        }

        let job_type = options.job_type.unwrap_or_else(|| DEFAULT_TYPE.to_string());
        let filepath = options
            .filepath
            .unwrap_or_else(|| self.library_path.clone());
        let class = options.class.ok_or(StoreError::MissingField("class"))?;
        let function = options
            .function
            .ok_or(StoreError::MissingField("function"))?;
        let filename = options
            .filename
            .ok_or(StoreError::MissingField("filename"))?;

        let job = Job {
            id: options.id.unwrap_or_else(generate_id),
            start_time: options.start_time,
            process: JobTarget {
                class,
                function,
                filepath,
                filename,
            },
            params: options.params.unwrap_or_default(),
            attempts: 0,
        };

        self.write(&job_type, &job)?;

        info!(job_type = %job_type, id = %job.id, "New {} job added to the queue", job_type);
        debug!(job_type = %job_type, "Job info: {:?}", job);

        Ok(Some(job))
    }

    /// Write `job` into the `job_type` partition, replacing any existing
    /// file for the same id. The partition is created on demand.
    ///
    /// Returns the path written. Failures are logged at `error`.
    pub fn write(&self, job_type: &str, job: &Job) -> Result<PathBuf, StoreError> {
        Self::check_name("type", job_type)?;
        Self::check_name("id", &job.id)?;

        let dir = self.root.join(job_type);
        if !dir.is_dir() {
            // The write below reports the failure to the caller.
            if let Err(e) = fs::create_dir_all(&dir) {
                error!(path = %dir.display(), "Failed to create directory: {}", e);
            }
        }

        let path = self.job_path(job_type, &job.id);
        Self::write_file(&path, job)?;
        Ok(path)
    }

    /// Overwrite the job file at `path`, which must come from
    /// [`pending_jobs`](Self::pending_jobs).
    pub(crate) fn rewrite(&self, path: &Path, job: &Job) -> Result<(), StoreError> {
        Self::write_file(path, job)
    }

    /// Remove the job file at `path`. Failure is logged.
    pub(crate) fn remove(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted job file");
                true
            }
            Err(e) => {
                error!(path = %path.display(), "Failed to delete job file: {}", e);
                false
            }
        }
    }

    fn write_file(path: &Path, job: &Job) -> Result<(), StoreError> {
        let content = serde_json::to_string(job)?;

        fs::write(path, content).map_err(|e| {
            error!(path = %path.display(), "Failed to write job file: {}", e);
            StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }

    /// Load pending jobs grouped by type.
    ///
    /// Without a filter every partition directly under the root is
    /// returned. With a filter the tree is searched depth first, in name
    /// order, for a directory with exactly that name; the first one found
    /// is the only partition returned. Unreadable or malformed job files
    /// are logged and left out; they stay on disk.
    pub fn get_jobs(&self, type_filter: Option<&str>) -> BTreeMap<String, Vec<Job>> {
        self.load(type_filter)
            .into_iter()
            .map(|(job_type, jobs)| (job_type, jobs.into_iter().map(|(_, job)| job).collect()))
            .collect()
    }

    /// Every partition with its jobs, each paired with the file it was read
    /// from. The file, not the embedded id, identifies the job on disk.
    pub(crate) fn pending_jobs(&self) -> BTreeMap<String, Vec<(PathBuf, Job)>> {
        self.load(None)
    }

    fn load(&self, type_filter: Option<&str>) -> BTreeMap<String, Vec<(PathBuf, Job)>> {
        let mut jobs_by_type = BTreeMap::new();

        match type_filter {
            Some(job_type) => {
                if let Some(dir) = self.find_partition(job_type) {
                    jobs_by_type.insert(job_type.to_string(), self.read_partition(&dir));
                }
            }
            None => {
                for entry in Self::scan(&self.root, 1) {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    let job_type = entry.file_name().to_string_lossy().into_owned();
                    jobs_by_type.insert(job_type, self.read_partition(entry.path()));
                }
            }
        }

        jobs_by_type
    }

    /// Check whether a job file exists for `id` in `job_type`.
    ///
    /// `job_type` may be [`WILDCARD`] to search every partition; an empty
    /// `id` matches any job.
    pub fn exists(&self, id: &str, job_type: &str) -> bool {
        let id = if id.is_empty() { WILDCARD } else { id };
        !self.matching_files(id, job_type).is_empty()
    }

    /// Delete the job files for `id` in `job_type`.
    ///
    /// With [`WILDCARD`] as the type, same-id jobs are removed from every
    /// partition. Each failed removal is logged and the rest still run.
    /// Returns the number of files removed.
    pub fn delete(&self, id: &str, job_type: &str) -> usize {
        if id.is_empty() {
            return 0;
        }

        self.matching_files(id, job_type)
            .iter()
            .filter(|path| self.remove(path))
            .count()
    }

    /// Path of the file holding `id` in `job_type`.
    pub fn job_path(&self, job_type: &str, id: &str) -> PathBuf {
        self.root
            .join(job_type)
            .join(format!("{}.{}", id, JOB_EXTENSION))
    }

    fn check_name(field: &'static str, value: &str) -> Result<(), StoreError> {
        if is_valid_partition_name(value) {
            Ok(())
        } else {
            Err(StoreError::InvalidName {
                field,
                value: value.to_string(),
            })
        }
    }

    /// Files matching `{root}/{type}/{id}.json`, where either part may be
    /// the wildcard. Any other value must be a valid name and is matched
    /// literally; an invalid name matches nothing.
    fn matching_files(&self, id: &str, job_type: &str) -> Vec<PathBuf> {
        for (field, value) in [("type", job_type), ("id", id)] {
            if value != WILDCARD && !is_valid_partition_name(value) {
                debug!(field, value, "Invalid name never matches a job file");
                return Vec::new();
            }
        }

        let pattern = format!(
            "{}/{}/{}.{}",
            Pattern::escape(&self.root.to_string_lossy()),
            Self::pattern_part(job_type),
            Self::pattern_part(id),
            JOB_EXTENSION
        );
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };

        let paths = match glob::glob_with(&pattern, options) {
            Ok(paths) => paths,
            Err(e) => {
                error!(pattern = %pattern, "Invalid job file pattern: {}", e);
                return Vec::new();
            }
        };

        paths
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    error!("Failed to read job path: {}", e);
                    None
                }
            })
            .collect()
    }

    fn pattern_part(value: &str) -> String {
        if value == WILDCARD {
            WILDCARD.to_string()
        } else {
            Pattern::escape(value)
        }
    }

    /// First directory named `job_type` anywhere under the root.
    fn find_partition(&self, job_type: &str) -> Option<PathBuf> {
        Self::scan(&self.root, usize::MAX)
            .find(|entry| entry.file_type().is_dir() && entry.file_name() == OsStr::new(job_type))
            .map(DirEntry::into_path)
    }

    /// Jobs stored directly inside a partition directory, in name order.
    fn read_partition(&self, dir: &Path) -> Vec<(PathBuf, Job)> {
        Self::scan(dir, 1)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| match Self::read_job(entry.path()) {
                Ok(job) => Some((entry.into_path(), job)),
                Err(e) => {
                    error!(path = %entry.path().display(), "Skipping unreadable job: {}", e);
                    None
                }
            })
            .collect()
    }

    fn read_job(path: &Path) -> Result<Job, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| StoreError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Depth-first walk below `dir`, sorted by name, skipping hidden
    /// entries. Walk errors are logged and skipped.
    fn scan(dir: &Path, max_depth: usize) -> impl Iterator<Item = DirEntry> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_reserved(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    error!("Failed to scan queue directory: {}", e);
                    None
                }
            })
    }
}

/// Dot-prefixed entries (`.DS_Store`, `.gitignore`, ...) are never
/// partitions or jobs.
fn is_reserved(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
