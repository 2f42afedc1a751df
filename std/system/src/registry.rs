//! Tool registry: operation name to descriptor and handler.
//!
//! Registration order is the enumeration order reported to callers.
//! Registering a name that already exists replaces the earlier entry in
//! place; the last registration wins.

use crate::{
    dispatch::{self, InvocationResult},
    error::ToolError,
    tools::{self, ToolContext},
};
use futures::future::BoxFuture;
use jsonschema::Validator;
use rmcp::model::JsonObject;
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Async handler for one operation.
pub type Handler =
    for<'a> fn(&'a ToolContext, JsonObject) -> BoxFuture<'a, Result<JsonObject, ToolError>>;

/// Public description of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the accepted arguments.
    pub input_schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: JsonObject,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Arc::new(input_schema),
        }
    }
}

/// Errors from registering a tool.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("invalid input schema for tool {name}: {message}")]
    InvalidSchema { name: String, message: String },
}

/// A descriptor together with its handler and compiled input schema.
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Handler,
    validator: Arc<Validator>,
}

impl RegisteredTool {
    /// Compile the descriptor's input schema and pair it with `handler`.
    pub fn new(descriptor: ToolDescriptor, handler: Handler) -> Result<Self, RegistryError> {
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let schema = Value::Object((*descriptor.input_schema).clone());
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| RegistryError::InvalidSchema {
                name: descriptor.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            descriptor,
            handler,
            validator: Arc::new(validator),
        })
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Ordered set of registered tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the builtin tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.reset();
        registry
    }

    /// Register `handler` under `descriptor.name`.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let tool = RegisteredTool::new(descriptor, handler)?;
        match self.position(&tool.descriptor.name) {
            Some(index) => {
                tracing::debug!(tool = %tool.descriptor.name, "replacing registered tool");
                self.tools[index] = tool;
            }
            None => self.tools.push(tool),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.descriptor.name == name)
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Remove `name`, returning whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.tools.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// Drop everything and register the builtin tools again.
    pub fn reset(&mut self) {
        self.clear();
        for (descriptor, handler) in tools::builtin_tools() {
            if let Err(e) = self.register(descriptor, handler) {
                tracing::error!(error = %e, "failed to register builtin tool");
            }
        }
    }

    /// Dispatch `name` with `args`.
    ///
    /// Unknown names fail with [`crate::error::ErrorKind::UnknownOperation`].
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: JsonObject,
    ) -> Result<InvocationResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::unknown_operation(name))?;
        dispatch::invoke(tool, ctx, args).await
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.descriptor.name == name)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigStore};
    use crate::error::{ErrorKind, ToolError};
    use crate::registry::{RegistryError, ToolDescriptor, ToolRegistry};
    use crate::tools::ToolContext;
    use futures::{FutureExt, future::BoxFuture};
    use rmcp::model::JsonObject;
    use std::collections::HashSet;

    const BUILTIN: [&str; 9] = [
        "execute_command",
        "execute_script",
        "get_system_info",
        "list_processes",
        "kill_process",
        "file_read",
        "file_write",
        "file_operations",
        "directory_operations",
    ];

    fn first(_ctx: &ToolContext, _args: JsonObject) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
        async move {
            let mut out = JsonObject::new();
            out.insert("handler".into(), "first".into());
            Ok(out)
        }
        .boxed()
    }

    fn second(_ctx: &ToolContext, _args: JsonObject) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
        async move {
            let mut out = JsonObject::new();
            out.insert("handler".into(), "second".into());
            Ok(out)
        }
        .boxed()
    }

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, "test", JsonObject::new())
    }

    fn ctx() -> ToolContext {
        ToolContext::new(ConfigStore::in_memory(Config::default()))
    }

    #[test]
    fn builtin_tools_are_registered_once() {
        let mut registry = ToolRegistry::with_builtin_tools();
        for _ in 0..3 {
            registry.reset();
        }
        let names: Vec<&str> = registry.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, BUILTIN);
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
        for name in BUILTIN {
            let tool = registry.get(name).expect("registered");
            assert_eq!(tool.descriptor.input_schema["type"], "object");
            assert!(!tool.descriptor.description.is_empty());
        }
    }

    #[test]
    fn rejects_empty_name() {
        let mut registry = ToolRegistry::new();
        assert_eq!(
            registry.register(descriptor("  "), first),
            Err(RegistryError::EmptyName)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_malformed_schema() {
        let mut registry = ToolRegistry::new();
        let mut schema = JsonObject::new();
        schema.insert("type".into(), 42.into());
        let err = registry
            .register(ToolDescriptor::new("broken", "test", schema), first)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { ref name, .. } if name == "broken"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn last_registration_wins_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(descriptor("a"), first).unwrap();
        registry.register(descriptor("b"), first).unwrap();
        registry.register(descriptor("a"), second).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list()[0].name, "a");

        let result = registry.execute(&ctx(), "a", JsonObject::new()).await.unwrap();
        assert_eq!(result.to_json()["handler"], "second");
    }

    #[test]
    fn unregister_and_clear() {
        let mut registry = ToolRegistry::new();
        registry.register(descriptor("a"), first).unwrap();
        registry.register(descriptor("b"), first).unwrap();
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.get("a").is_none());
        assert!(registry.get("b").is_some());
        registry.clear();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let registry = ToolRegistry::with_builtin_tools();
        let err = registry
            .execute(&ctx(), "format_disk", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperation);
    }

    #[tokio::test]
    async fn contract_is_checked_before_the_handler_runs() {
        let registry = ToolRegistry::with_builtin_tools();
        let err = registry
            .execute(&ctx(), "execute_command", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(err.message().contains("command"));
    }
}
