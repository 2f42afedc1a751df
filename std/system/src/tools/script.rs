//! Script execution tool: execute_script
//!
//! The script is written to a fresh temporary directory and run with the
//! chosen interpreter through the same shell path as `execute_command`. The
//! directory is owned by a [`ScriptFile`] guard, so it is removed however the
//! invocation ends.

use crate::{
    error::ToolError,
    exec,
    options::{ExecKind, ExecRequest, ExecutionOptions},
    registry::ToolDescriptor,
    tools::{
        ToolContext, command::display_cwd, parse_params, require_non_blank, schema_for,
        to_payload,
    },
};
use futures::{FutureExt, future::BoxFuture};
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub const EXECUTE_SCRIPT: &str = "execute_script";

/// Supported script interpreters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    Bash,
    Sh,
    Zsh,
    Fish,
    Powershell,
    Pwsh,
    Cmd,
    Python,
    Python3,
    Node,
    Perl,
    Ruby,
}

impl Interpreter {
    pub const ALL: [Interpreter; 12] = [
        Interpreter::Bash,
        Interpreter::Sh,
        Interpreter::Zsh,
        Interpreter::Fish,
        Interpreter::Powershell,
        Interpreter::Pwsh,
        Interpreter::Cmd,
        Interpreter::Python,
        Interpreter::Python3,
        Interpreter::Node,
        Interpreter::Perl,
        Interpreter::Ruby,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Interpreter::Bash => "bash",
            Interpreter::Sh => "sh",
            Interpreter::Zsh => "zsh",
            Interpreter::Fish => "fish",
            Interpreter::Powershell => "powershell",
            Interpreter::Pwsh => "pwsh",
            Interpreter::Cmd => "cmd",
            Interpreter::Python => "python",
            Interpreter::Python3 => "python3",
            Interpreter::Node => "node",
            Interpreter::Perl => "perl",
            Interpreter::Ruby => "ruby",
        }
    }

    /// File extension for the temporary script.
    pub fn extension(self) -> &'static str {
        match self {
            Interpreter::Bash | Interpreter::Sh | Interpreter::Zsh => "sh",
            Interpreter::Fish => "fish",
            Interpreter::Powershell | Interpreter::Pwsh => "ps1",
            Interpreter::Cmd => "bat",
            Interpreter::Python | Interpreter::Python3 => "py",
            Interpreter::Node => "js",
            Interpreter::Perl => "pl",
            Interpreter::Ruby => "rb",
        }
    }

    fn command_template(self) -> &'static str {
        match self {
            Interpreter::Bash => r#"bash "{file}""#,
            Interpreter::Sh => r#"sh "{file}""#,
            Interpreter::Zsh => r#"zsh "{file}""#,
            Interpreter::Fish => r#"fish "{file}""#,
            Interpreter::Powershell => {
                r#"powershell -NoProfile -ExecutionPolicy Bypass -File "{file}""#
            }
            Interpreter::Pwsh => r#"pwsh -NoProfile -ExecutionPolicy Bypass -File "{file}""#,
            Interpreter::Cmd => r#"cmd /C "{file}""#,
            Interpreter::Python => r#"python "{file}""#,
            Interpreter::Python3 => r#"python3 "{file}""#,
            Interpreter::Node => r#"node "{file}""#,
            Interpreter::Perl => r#"perl "{file}""#,
            Interpreter::Ruby => r#"ruby "{file}""#,
        }
    }

    /// Shell command line running `file` with this interpreter.
    pub fn command_for(self, file: &Path) -> String {
        self.command_template()
            .replace("{file}", &file.display().to_string())
    }
}

/// Parameters for `execute_script`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteScriptParams {
    /// Source code of the script.
    pub script_content: String,
    /// Interpreter that runs the script.
    pub interpreter: Interpreter,
    /// Directory to run the script in. Defaults to the server's directory.
    pub working_directory: Option<String>,
    /// Timeout in milliseconds (1000-300000, default 60000).
    pub timeout_ms: Option<u64>,
    /// Extra environment variables, layered over the server's environment.
    pub environment: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct ScriptOutput {
    interpreter: Interpreter,
    script_path: String,
    working_directory: String,
    stdout: String,
    stderr: String,
    exit_code: i32,
}

/// A script written to its own temporary directory.
///
/// Dropping the guard removes the directory. Removal failures are logged.
#[derive(Debug)]
pub struct ScriptFile {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScriptFile {
    /// Write `content` to `script.<ext>` in a new directory under `root`
    /// (the system temp directory when `None`).
    pub async fn create(
        root: Option<&Path>,
        interpreter: Interpreter,
        content: &str,
    ) -> Result<Self, ToolError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("wmcp-script-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
            ToolError::from_io(&e, &root)
        })?;

        let path = dir
            .path()
            .join(format!("script.{}", interpreter.extension()));
        let script = Self {
            dir: Some(dir),
            path,
        };
        tokio::fs::write(&script.path, content)
            .await
            .map_err(|e| ToolError::from_io(&e, &script.path))?;
        Ok(script)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let dir_path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!(path = %dir_path.display(), "removed script directory"),
            Err(e) => tracing::warn!(
                path = %dir_path.display(),
                error = %e,
                "failed to remove script directory"
            ),
        }
    }
}

pub fn execute_script_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        EXECUTE_SCRIPT,
        "Execute a script with the given interpreter (shell, PowerShell, batch, Python, Node, Perl or Ruby)",
        schema_for::<ExecuteScriptParams>(),
    )
}

pub fn execute_script(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    run(ctx, args).boxed()
}

async fn run(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: ExecuteScriptParams = parse_params(args)?;
    require_non_blank(&params.script_content, "script_content")?;

    let config = ctx.config();
    let interpreter = params.interpreter;
    if !config.security.allows_interpreter(interpreter) {
        return Err(ToolError::invalid_params(format!(
            "Unsupported interpreter: {}",
            interpreter.as_str()
        )));
    }

    let options = ExecutionOptions::build(
        ExecRequest {
            working_directory: params.working_directory,
            timeout_ms: params.timeout_ms,
            environment: params.environment,
        },
        ExecKind::Script,
        &config,
    );
    let script = ScriptFile::create(ctx.script_dir(), interpreter, &params.script_content).await?;
    let command = interpreter.command_for(script.path());
    tracing::debug!(interpreter = interpreter.as_str(), path = %script.path().display(), "running script");
    let output = exec::run_shell(&command, &options).await?;

    to_payload(&ScriptOutput {
        interpreter,
        script_path: script.path().display().to_string(),
        working_directory: display_cwd(&options),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code.unwrap_or(0),
    })
}
