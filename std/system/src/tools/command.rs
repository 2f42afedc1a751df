//! Command execution tool: execute_command

use crate::{
    error::{ErrorKind, ToolError},
    exec,
    options::{ExecKind, ExecRequest, ExecutionOptions},
    registry::ToolDescriptor,
    tools::{ToolContext, parse_params, require_non_blank, schema_for, to_payload},
};
use futures::{FutureExt, future::BoxFuture};
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const EXECUTE_COMMAND: &str = "execute_command";

/// Parameters for `execute_command`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteCommandParams {
    /// Shell command line to run.
    pub command: String,
    /// Directory to run the command in. Defaults to the server's directory.
    pub working_directory: Option<String>,
    /// Timeout in milliseconds (1000-300000, default 30000).
    pub timeout_ms: Option<u64>,
    /// Extra environment variables, layered over the server's environment.
    pub environment: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct CommandOutput {
    command: String,
    working_directory: String,
    stdout: String,
    stderr: String,
    exit_code: i32,
}

pub fn execute_command_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        EXECUTE_COMMAND,
        "Execute a shell command and return its stdout, stderr and exit code",
        schema_for::<ExecuteCommandParams>(),
    )
}

pub fn execute_command(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    run(ctx, args).boxed()
}

async fn run(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: ExecuteCommandParams = parse_params(args)?;
    require_non_blank(&params.command, "command")?;

    let config = ctx.config();
    if !config.security.permits(&params.command) {
        tracing::warn!(command = %params.command, mode = config.security.mode.as_str(), "command blocked");
        return Err(ToolError::new(
            ErrorKind::PermissionDenied,
            format!(
                "Command blocked by {} security policy",
                config.security.mode.as_str()
            ),
        ));
    }

    let options = ExecutionOptions::build(
        ExecRequest {
            working_directory: params.working_directory,
            timeout_ms: params.timeout_ms,
            environment: params.environment,
        },
        ExecKind::Command,
        &config,
    );
    let output = exec::run_shell(&params.command, &options).await?;

    to_payload(&CommandOutput {
        command: params.command,
        working_directory: display_cwd(&options),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code.unwrap_or(0),
    })
}

/// The directory a spawn ran in, for reporting.
pub(crate) fn display_cwd(options: &ExecutionOptions) -> String {
    match &options.working_directory {
        Some(dir) => dir.display().to_string(),
        None => std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default(),
    }
}
