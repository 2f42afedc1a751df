//! Builtin tool handlers and the state they share.
//!
//! Each tool module exposes a `NAME` constant, a `*_definition()` returning
//! the [`ToolDescriptor`] and the handler itself.

pub mod command;
pub mod directory;
pub mod file;
pub mod metadata;
pub mod process;
pub mod script;
pub mod system;

use crate::{
    config::{Config, ConfigStore},
    error::ToolError,
    registry::{Handler, ToolDescriptor},
    validate::validate_path,
};
use rmcp::{model::JsonObject, schemars::JsonSchema};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// State handed to every handler invocation.
#[derive(Debug)]
pub struct ToolContext {
    config: ConfigStore,
    home: Option<PathBuf>,
    script_dir: Option<PathBuf>,
}

impl ToolContext {
    pub fn new(config: ConfigStore) -> Self {
        Self {
            config,
            home: dirs::home_dir(),
            script_dir: None,
        }
    }

    /// Override the home directory used by the path guard.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Create script temp directories under `dir` instead of the system
    /// temp directory.
    pub fn with_script_dir(mut self, dir: PathBuf) -> Self {
        self.script_dir = Some(dir);
        self
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.snapshot()
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn script_dir(&self) -> Option<&Path> {
        self.script_dir.as_deref()
    }

    /// Normalize a caller path and run it through the traversal guard.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf, ToolError> {
        Ok(validate_path(raw, self.home())?)
    }
}

/// All builtin tools in enumeration order.
pub fn builtin_tools() -> Vec<(ToolDescriptor, Handler)> {
    vec![
        (
            command::execute_command_definition(),
            command::execute_command as Handler,
        ),
        (
            script::execute_script_definition(),
            script::execute_script as Handler,
        ),
        (
            system::get_system_info_definition(),
            system::get_system_info as Handler,
        ),
        (
            process::list_processes_definition(),
            process::list_processes as Handler,
        ),
        (
            process::kill_process_definition(),
            process::kill_process as Handler,
        ),
        (file::file_read_definition(), file::file_read as Handler),
        (file::file_write_definition(), file::file_write as Handler),
        (
            file::file_operations_definition(),
            file::file_operations as Handler,
        ),
        (
            directory::directory_operations_definition(),
            directory::directory_operations as Handler,
        ),
    ]
}

/// Deserialize tool arguments into a parameter struct.
pub(crate) fn parse_params<T: DeserializeOwned>(args: JsonObject) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::invalid_params(format!("Invalid arguments: {e}")))
}

/// JSON Schema of a parameter struct, as advertised in `tools/list`.
pub(crate) fn schema_for<T: JsonSchema>() -> JsonObject {
    let schema = rmcp::schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(Value::Object(mut map)) => {
            map.remove("$schema");
            map.remove("title");
            map
        }
        _ => JsonObject::new(),
    }
}

/// Serialize a payload struct into the object merged into the envelope.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<JsonObject, ToolError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ToolError::internal("tool payload is not a JSON object")),
        Err(e) => Err(ToolError::internal(format!(
            "failed to serialize tool payload: {e}"
        ))),
    }
}

/// Reject blank required strings that the schema alone lets through.
pub(crate) fn require_non_blank(value: &str, field: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid_params(format!(
            "Parameter '{field}' must not be empty"
        )));
    }
    Ok(())
}
