//! Resolves a job's target and invokes it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::QueueSettings;
use crate::error::DispatchError;
use crate::handler::{ClassLoader, HandlerRegistry, JobHandler, LibraryLoader};
use crate::job::Job;

/// Job dispatcher.
///
/// Instances are created once and cached for the dispatcher's lifetime:
/// by class for file targets, by class and function for library targets.
pub struct Dispatcher {
    app_root: PathBuf,
    library_path: String,
    classes: Arc<dyn ClassLoader>,
    libraries: Arc<dyn LibraryLoader>,
    instances: HashMap<String, Box<dyn JobHandler>>,
    library_instances: HashMap<(String, String), Box<dyn JobHandler>>,
}

impl Dispatcher {
    /// Create a dispatcher that resolves both kinds of target through
    /// `registry`.
    pub fn new(settings: &QueueSettings, registry: Arc<HandlerRegistry>) -> Self {
        Self::with_loaders(settings, registry.clone(), registry)
    }

    /// Create a dispatcher with separate loaders.
    pub fn with_loaders(
        settings: &QueueSettings,
        classes: Arc<dyn ClassLoader>,
        libraries: Arc<dyn LibraryLoader>,
    ) -> Self {
        Self {
            app_root: settings.app_root.clone(),
            library_path: settings.library_path.clone(),
            classes,
            libraries,
            instances: HashMap::new(),
            library_instances: HashMap::new(),
        }
    }

    /// Dispatch a job. Succeeds only if the target returned exactly `true`.
    pub fn run(&mut self, job: &Job) -> Result<(), DispatchError> {
        let value = if self.is_library_target(job) {
            self.run_library(job)?
        } else {
            self.run_class(job)?
        };

        match value {
            Value::Bool(true) => Ok(()),
            other => Err(DispatchError::NotTrue(other)),
        }
    }

    /// Number of cached handler instances.
    pub fn cached_instances(&self) -> usize {
        self.instances.len() + self.library_instances.len()
    }

    /// Drop every cached instance.
    pub fn clear_cache(&mut self) {
        self.instances.clear();
        self.library_instances.clear();
    }

    fn is_library_target(&self, job: &Job) -> bool {
        job.process.filepath.eq_ignore_ascii_case(&self.library_path)
    }

    fn run_library(&mut self, job: &Job) -> Result<Value, DispatchError> {
        let target = &job.process;
        let key = (target.class.clone(), target.function.clone());

        let handler = match self.library_instances.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.libraries.load_library(&target.class)?),
        };

        if !handler.has_function(&target.function) {
            return Err(Self::unknown_function(job));
        }

        Self::invoke(&mut **handler, job)
    }

    fn run_class(&mut self, job: &Job) -> Result<Value, DispatchError> {
        let target = &job.process;

        let handler = match self.instances.entry(target.class.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let location = self.app_root.join(&target.filepath).join(&target.filename);
                let handler = self.classes.load(&target.class, &location)?;
                if !handler.has_function(&target.function) {
                    return Err(Self::unknown_function(job));
                }
                debug!(class = %target.class, "Caching handler instance");
                entry.insert(handler)
            }
        };

        if !handler.has_function(&target.function) {
            return Err(Self::unknown_function(job));
        }

        Self::invoke(&mut **handler, job)
    }

    /// Invoke the target function, turning a panic into a handler error.
    fn invoke(handler: &mut dyn JobHandler, job: &Job) -> Result<Value, DispatchError> {
        let target = &job.process;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(&target.function, &job.params)
        }));

        match outcome {
            Ok(result) => result.map_err(DispatchError::from),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(DispatchError::Handler(format!(
                    "{}::{} panicked: {}",
                    target.class, target.function, message
                )))
            }
        }
    }

    fn unknown_function(job: &Job) -> DispatchError {
        DispatchError::UnknownFunction {
            class: job.process.class.clone(),
            function: job.process.function.clone(),
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
