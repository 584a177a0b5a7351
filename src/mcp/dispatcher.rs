//! Validates tool calls against the catalog and drives the backend worker.
//!
//! `dispatch` never fails: every error, including a panic inside the
//! worker, comes back as an `isError` result.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::bridge::ExternalWorker;
use crate::errors::{BridgeError, ErrorEnvelope, Result};

use super::tools::{ToolCatalog, ToolDefinition};
use super::transport::ToolCallResult;

/// Routes validated tool calls to an [`ExternalWorker`].
pub struct ToolDispatcher {
    catalog: ToolCatalog,
    worker: Arc<dyn ExternalWorker>,
    permits: Semaphore,
}

impl ToolDispatcher {
    /// `max_concurrent` bounds how many worker invocations run at once.
    pub fn new(
        catalog: ToolCatalog,
        worker: Arc<dyn ExternalWorker>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            catalog,
            worker,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Executes one tool call and wraps the outcome in the result envelope.
    pub async fn dispatch(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        let started = Instant::now();
        match self.try_dispatch(name, arguments).await {
            Ok(value) => {
                info!(
                    tool = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                ToolCallResult::success(&value)
            }
            Err(e) => {
                let envelope = ErrorEnvelope::from(&e);
                warn!(
                    tool = name,
                    kind = envelope.kind.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %envelope.message,
                    "tool call failed"
                );
                ToolCallResult::failure(&envelope)
            }
        }
    }

    async fn try_dispatch(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        let tool = self
            .catalog
            .lookup(name)
            .ok_or_else(|| BridgeError::UnknownTool {
                name: name.to_string(),
            })?;
        let args = validate_arguments(tool, arguments.as_ref())?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BridgeError::Internal {
                message: "dispatcher is shutting down".to_string(),
            })?;

        AssertUnwindSafe(self.worker.invoke(tool.method, &args))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(BridgeError::Internal {
                    message: format!("worker panicked: {}", panic_message(panic.as_ref())),
                })
            })
    }
}

/// Checks `arguments` against the tool's schema and fills declared defaults.
///
/// Unknown fields are dropped. A `null` value counts as omitted. Missing
/// required fields, type mismatches, and values outside an enum are rejected.
pub fn validate_arguments(
    tool: &ToolDefinition,
    arguments: Option<&Value>,
) -> Result<Map<String, Value>> {
    let invalid = |message: String| BridgeError::InvalidArguments {
        tool: tool.name.to_string(),
        message,
    };

    let empty = Map::new();
    let supplied = match arguments {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid("arguments must be a JSON object".to_string())),
    };

    for key in supplied.keys() {
        if tool.param(key).is_none() {
            debug!(tool = tool.name, field = %key, "ignoring unknown argument");
        }
    }

    let mut args = Map::new();
    for param in &tool.params {
        match supplied.get(param.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let value = param.kind.coerce(value).ok_or_else(|| {
                    invalid(format!(
                        "field '{}' must be of type {}",
                        param.name,
                        param.kind.schema_type()
                    ))
                })?;
                if !param.allowed.is_empty()
                    && !value.as_str().is_some_and(|s| param.allowed.contains(&s))
                {
                    return Err(invalid(format!(
                        "field '{}' must be one of: {}",
                        param.name,
                        param.allowed.join(", ")
                    )));
                }
                args.insert(param.name.to_string(), value);
            }
            None if param.required => {
                return Err(invalid(format!("missing required field '{}'", param.name)));
            }
            None => {
                if let Some(default) = &param.default {
                    args.insert(param.name.to_string(), default.clone());
                }
            }
        }
    }
    Ok(args)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
