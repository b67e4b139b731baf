//! Built-in job handler registration for jobqueue.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use jobqueue::{FnHandler, HandlerRegistry};

/// Build the registry of handlers shipped with the binary.
///
/// `Echo::log` logs its parameters and succeeds; `Echo::fail` always
/// fails, which is handy for exercising retry and dead-lettering.
pub(crate) fn builtin_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.register("Echo", || {
        FnHandler::new()
            .with_function("log", |params: &[Value]| {
                info!(params = %serde_json::Value::Array(params.to_vec()), "Echo job ran");
                Ok(json!(true))
            })
            .with_function("fail", |_: &[Value]| Ok(json!(false)))
    });

    Arc::new(registry)
}
