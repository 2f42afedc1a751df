//! MCP server exposing host tools: shell commands, scripts, processes,
//! files, directories and system information.
//!
//! Tools live in a [`registry::ToolRegistry`]. Every call goes through the
//! dispatch wrapper in [`dispatch`], which validates arguments against the
//! tool's input schema, times the handler and wraps the outcome in a uniform
//! `{ success, execution_time_ms, ... }` envelope. Argument errors and unknown
//! tool names are reported as JSON-RPC errors; every other failure is a
//! structured error result.

use crate::{
    error::{ErrorKind, ToolError},
    registry::ToolRegistry,
    tools::ToolContext,
};
use rmcp::{
    RoleServer, ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, ErrorCode, ErrorData, Implementation,
        ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use std::{future::Future, sync::Arc};

pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod options;
pub mod registry;
pub mod tools;
pub mod validate;

/// MCP server backed by a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct SystemServer {
    registry: Arc<ToolRegistry>,
    context: Arc<ToolContext>,
}

impl SystemServer {
    /// Server with the builtin tools.
    pub fn new(context: ToolContext) -> Self {
        Self::with_registry(ToolRegistry::with_builtin_tools(), context)
    }

    /// Server serving the tools in `registry`.
    pub fn with_registry(registry: ToolRegistry, context: ToolContext) -> Self {
        Self {
            registry: Arc::new(registry),
            context: Arc::new(context),
        }
    }

    /// Tools this server dispatches to.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Context handed to every tool call.
    pub fn context(&self) -> &ToolContext {
        &self.context
    }
}

impl ServerHandler for SystemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "wmcp-system".into(),
                title: Some("Walrus MCP System Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "System server providing command and script execution, process management, \
                 file and directory operations, and host information."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        let tools = self
            .registry
            .list()
            .into_iter()
            .map(|d| Tool::new(d.name.clone(), d.description.clone(), d.input_schema.clone()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            let args = request.arguments.unwrap_or_default();
            let result = self
                .registry
                .execute(&self.context, &request.name, args)
                .await
                .map_err(protocol_error)?;
            let envelope = result.to_json();
            Ok(if result.is_success() {
                CallToolResult::structured(envelope)
            } else {
                CallToolResult::structured_error(envelope)
            })
        }
    }
}

fn protocol_error(err: ToolError) -> ErrorData {
    let message = err.message().to_string();
    match err.kind() {
        ErrorKind::InvalidParams => ErrorData::invalid_params(message, None),
        ErrorKind::UnknownOperation => ErrorData::new(ErrorCode::METHOD_NOT_FOUND, message, None),
        _ => ErrorData::internal_error(message, None),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        SystemServer,
        config::{Config, ConfigStore},
        tools::ToolContext,
    };
    use rmcp::{
        RoleClient, ServiceExt,
        model::{CallToolRequestParams, CallToolResult, ErrorCode},
        service::{RunningService, ServiceError},
    };
    use serde_json::{Value, json};
    use std::borrow::Cow;

    async fn connect() -> RunningService<RoleClient, ()> {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = SystemServer::new(ToolContext::new(ConfigStore::in_memory(Config::default())));
        tokio::spawn(async move {
            if let Ok(service) = server.serve(server_io).await {
                let _ = service.waiting().await;
            }
        });
        ().serve(client_io).await.unwrap()
    }

    async fn call(
        client: &RunningService<RoleClient, ()>,
        name: &str,
        args: Value,
    ) -> Result<CallToolResult, ServiceError> {
        client
            .call_tool(CallToolRequestParams {
                meta: None,
                name: Cow::Owned(name.to_string()),
                arguments: args.as_object().cloned(),
                task: None,
            })
            .await
    }

    #[tokio::test]
    async fn lists_builtin_tools_in_order() {
        let client = connect().await;
        let tools = client.peer().list_all_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| &*t.name).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "execute_command");
        assert_eq!(names[8], "directory_operations");
        let _ = client.cancel().await;
    }

    #[tokio::test]
    async fn success_envelope_is_structured() {
        let client = connect().await;
        let result = call(&client, "get_system_info", json!({})).await.unwrap();
        assert_ne!(result.is_error, Some(true));
        let envelope = result.structured_content.unwrap();
        assert_eq!(envelope["success"], true);
        assert!(envelope["execution_time_ms"].is_u64());
        let _ = client.cancel().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_envelope_sets_is_error() {
        let client = connect().await;
        let result = call(&client, "execute_command", json!({ "command": "exit 3" }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        let envelope = result.structured_content.unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error_kind"], "non_zero_exit");
        assert_eq!(envelope["exit_code"], 3);
        let _ = client.cancel().await;
    }

    #[tokio::test]
    async fn protocol_errors() {
        let client = connect().await;
        match call(&client, "format_disk", json!({})).await {
            Err(ServiceError::McpError(e)) => assert_eq!(e.code, ErrorCode::METHOD_NOT_FOUND),
            other => panic!("expected method not found, got {other:?}"),
        }
        match call(&client, "file_read", json!({})).await {
            Err(ServiceError::McpError(e)) => assert_eq!(e.code, ErrorCode::INVALID_PARAMS),
            other => panic!("expected invalid params, got {other:?}"),
        }
        let _ = client.cancel().await;
    }
}
