//! Job handlers and the loaders that resolve them.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{DispatchError, HandlerError};

/// A resolved job target: an instance exposing named functions.
///
/// A job succeeds only when the invoked function returns `Value::Bool(true)`.
pub trait JobHandler: Send {
    /// Whether `function` can be invoked on this handler.
    fn has_function(&self, function: &str) -> bool;

    /// Invoke `function` with positional `params`.
    fn invoke(&mut self, function: &str, params: &[Value]) -> Result<Value, HandlerError>;
}

/// Resolves a class whose code lives at a file location.
pub trait ClassLoader: Send + Sync {
    /// Load `class` from `location` (`{app_root}/{filepath}/{filename}`).
    fn load(&self, class: &str, location: &Path) -> Result<Box<dyn JobHandler>, DispatchError>;
}

/// Resolves a class through the shared library loader.
pub trait LibraryLoader: Send + Sync {
    /// Load a fresh instance of the library `class`.
    fn load_library(&self, class: &str) -> Result<Box<dyn JobHandler>, DispatchError>;
}

type HandlerFn = Box<dyn FnMut(&[Value]) -> Result<Value, HandlerError> + Send>;

/// A handler assembled from named closures.
#[derive(Default)]
pub struct FnHandler {
    functions: HashMap<String, HandlerFn>,
}

impl FnHandler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: FnMut(&[Value]) -> Result<Value, HandlerError> + Send + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl JobHandler for FnHandler {
    fn has_function(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    fn invoke(&mut self, function: &str, params: &[Value]) -> Result<Value, HandlerError> {
        match self.functions.get_mut(function) {
            Some(f) => f(params),
            None => Err(HandlerError::Failed(format!("no function '{}'", function))),
        }
    }
}

type HandlerFactory = Box<dyn Fn() -> Box<dyn JobHandler> + Send + Sync>;

/// Class name to handler factory mapping.
///
/// Serves as both the [`ClassLoader`] and the [`LibraryLoader`]; the file
/// location is only recorded in the logs.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `class`, replacing any previous one.
    pub fn register<F, H>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: JobHandler + 'static,
    {
        self.factories
            .insert(class.into(), Box::new(move || Box::new(factory()) as Box<dyn JobHandler>));
    }

    /// Whether `class` has a factory.
    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Registered class names, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<_> = self.factories.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    fn instantiate(&self, class: &str) -> Result<Box<dyn JobHandler>, DispatchError> {
        self.factories
            .get(class)
            .map(|factory| factory())
            .ok_or_else(|| DispatchError::UnknownClass(class.to_string()))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}

impl ClassLoader for HandlerRegistry {
    fn load(&self, class: &str, location: &Path) -> Result<Box<dyn JobHandler>, DispatchError> {
        debug!(class = %class, location = %location.display(), "Loading class");
        self.instantiate(class)
    }
}

impl LibraryLoader for HandlerRegistry {
    fn load_library(&self, class: &str) -> Result<Box<dyn JobHandler>, DispatchError> {
        debug!(class = %class, "Loading library");
        self.instantiate(class)
    }
}
