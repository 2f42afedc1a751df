//! Invocation envelope and the dispatch wrapper around every handler call.
//!
//! [`invoke`] times the call, checks the arguments against the tool's input
//! schema and turns the handler outcome into an [`InvocationResult`].
//! Handling is two-tiered:
//!
//! - [`ErrorKind::InvalidParams`] errors are returned unchanged as `Err`, so
//!   the transport answers with a protocol error the caller must fix.
//! - Every other error becomes a [`InvocationResult::Failure`] envelope the
//!   caller inspects like any other result.

use crate::{
    error::{ErrorKind, ProcessOutput, ToolError},
    registry::RegisteredTool,
    tools::ToolContext,
};
use jsonschema::Validator;
use rmcp::model::JsonObject;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;
use std::time::Instant;
use tracing::Instrument;

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success {
        payload: JsonObject,
        elapsed_ms: u64,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        elapsed_ms: u64,
        output: Option<ProcessOutput>,
    },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            InvocationResult::Success { elapsed_ms, .. }
            | InvocationResult::Failure { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    /// Failure kind, if this is a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            InvocationResult::Success { .. } => None,
            InvocationResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The envelope as a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "execution_time_ms": self.elapsed_ms(),
                "error": format!("failed to serialize result: {e}"),
                "error_kind": ErrorKind::InternalError,
            })
        })
    }

    fn failure(err: ToolError, elapsed_ms: u64) -> Self {
        let (kind, message, output) = err.into_parts();
        InvocationResult::Failure {
            kind,
            message,
            elapsed_ms,
            output,
        }
    }
}

impl Serialize for InvocationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &self.is_success())?;
        map.serialize_entry("execution_time_ms", &self.elapsed_ms())?;
        match self {
            InvocationResult::Success { payload, .. } => {
                for (key, value) in payload {
                    if key != "success" && key != "execution_time_ms" {
                        map.serialize_entry(key, value)?;
                    }
                }
            }
            InvocationResult::Failure {
                kind,
                message,
                output,
                ..
            } => {
                map.serialize_entry("error", message)?;
                map.serialize_entry("error_kind", kind)?;
                if let Some(output) = output {
                    map.serialize_entry("stdout", &output.stdout)?;
                    map.serialize_entry("stderr", &output.stderr)?;
                    if let Some(code) = output.exit_code {
                        map.serialize_entry("exit_code", &code)?;
                    }
                    if let Some(signal) = &output.signal {
                        map.serialize_entry("signal", signal)?;
                    }
                    map.serialize_entry("timeout", &output.timed_out)?;
                }
            }
        }
        map.end()
    }
}

/// Run `tool` with `args` and wrap the outcome.
pub async fn invoke(
    tool: &RegisteredTool,
    ctx: &ToolContext,
    args: JsonObject,
) -> Result<InvocationResult, ToolError> {
    let name = tool.descriptor.name.as_str();
    let start = Instant::now();
    validate_arguments(tool.validator(), &args)?;

    let span = tracing::debug_span!("tool", tool = name);
    let outcome = (tool.handler)(ctx, args).instrument(span).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(payload) => {
            tracing::debug!(tool = name, elapsed_ms, "tool succeeded");
            Ok(InvocationResult::Success {
                payload,
                elapsed_ms,
            })
        }
        Err(err) if err.kind() == ErrorKind::InvalidParams => {
            tracing::debug!(tool = name, error = %err, "rejected arguments");
            Err(err)
        }
        Err(err) => {
            tracing::warn!(tool = name, kind = %err.kind(), error = %err, elapsed_ms, "tool failed");
            Ok(InvocationResult::failure(err, elapsed_ms))
        }
    }
}

/// Check `args` against a tool's compiled input schema.
///
/// Keys the schema does not declare are left to the handler.
pub fn validate_arguments(validator: &Validator, args: &JsonObject) -> Result<(), ToolError> {
    let instance = Value::Object(args.clone());
    validator
        .validate(&instance)
        .map_err(|e| ToolError::invalid_params(format!("Invalid arguments: {e}")))
}
