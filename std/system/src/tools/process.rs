//! Process tools: list_processes, kill_process
//!
//! Both shell out to the platform's own utilities (`ps`/`kill` or
//! `tasklist`/`taskkill`) through the executor, so they share its timeout and
//! output handling.

use crate::{
    error::ToolError,
    exec,
    options::{ExecKind, ExecRequest, ExecutionOptions},
    registry::ToolDescriptor,
    tools::{ToolContext, parse_params, schema_for, to_payload},
};
use futures::{FutureExt, future::BoxFuture};
use regex::RegexBuilder;
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};

pub const LIST_PROCESSES: &str = "list_processes";
pub const KILL_PROCESS: &str = "kill_process";

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Parameters for `list_processes`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListProcessesParams {
    /// Case-insensitive regular expression matched against process names.
    pub filter: Option<String>,
    /// Maximum number of processes to return (1-500, default 50).
    pub limit: Option<usize>,
}

/// Signals `kill_process` can send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    #[default]
    Sigterm,
    Sigkill,
    Sigint,
    Sighup,
    Sigquit,
    Sigusr1,
    Sigusr2,
}

impl Signal {
    /// Name as accepted by `kill -<NAME>`, without the `SIG` prefix.
    fn kill_name(self) -> &'static str {
        match self {
            Signal::Sigterm => "TERM",
            Signal::Sigkill => "KILL",
            Signal::Sigint => "INT",
            Signal::Sighup => "HUP",
            Signal::Sigquit => "QUIT",
            Signal::Sigusr1 => "USR1",
            Signal::Sigusr2 => "USR2",
        }
    }
}

/// Parameters for `kill_process`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct KillProcessParams {
    /// Process id to signal.
    #[schemars(range(min = 1))]
    pub pid: u32,
    /// Send SIGKILL (or `taskkill /F`) regardless of `signal`.
    pub force: Option<bool>,
    /// Signal to send. Defaults to SIGTERM.
    pub signal: Option<Signal>,
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessEntry {
    pub name: String,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProcessList {
    process_count: usize,
    processes: Vec<ProcessEntry>,
    platform: &'static str,
}

#[derive(Debug, Serialize)]
struct KillOutput {
    pid: u32,
    signal: Signal,
    force: bool,
    stdout: String,
    stderr: String,
}

pub fn list_processes_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        LIST_PROCESSES,
        "List running processes, optionally filtered by a name pattern",
        schema_for::<ListProcessesParams>(),
    )
}

pub fn list_processes(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    list(ctx, args).boxed()
}

pub fn kill_process_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        KILL_PROCESS,
        "Send a termination signal to a process by PID",
        schema_for::<KillProcessParams>(),
    )
}

pub fn kill_process(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    kill(ctx, args).boxed()
}

async fn list(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: ListProcessesParams = parse_params(args)?;
    let filter = params
        .filter
        .as_deref()
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ToolError::invalid_params(format!("Invalid filter pattern: {e}")))
        })
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let options = ExecutionOptions::build(ExecRequest::default(), ExecKind::Command, &ctx.config());
    let (command, parse): (&str, fn(&str) -> Vec<ProcessEntry>) = if cfg!(windows) {
        ("tasklist /fo csv /nh", parse_tasklist_csv)
    } else {
        ("ps aux", parse_ps_output)
    };
    let output = exec::run_shell(command, &options).await?;

    let processes: Vec<ProcessEntry> = parse(&output.stdout)
        .into_iter()
        .filter(|p| filter.as_ref().is_none_or(|re| re.is_match(&p.name)))
        .take(limit)
        .collect();
    to_payload(&ProcessList {
        process_count: processes.len(),
        processes,
        platform: std::env::consts::OS,
    })
}

async fn kill(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: KillProcessParams = parse_params(args)?;
    if params.pid == 0 {
        return Err(ToolError::invalid_params("Parameter 'pid' must be at least 1"));
    }
    let force = params.force.unwrap_or(false);
    let signal = if force {
        Signal::Sigkill
    } else {
        params.signal.unwrap_or_default()
    };

    let command = if cfg!(windows) {
        let mut command = format!("taskkill /PID {}", params.pid);
        if force {
            command.push_str(" /F");
        }
        command
    } else {
        format!("kill -{} {}", signal.kill_name(), params.pid)
    };
    tracing::info!(pid = params.pid, signal = signal.kill_name(), force, "sending signal");

    let options = ExecutionOptions::build(ExecRequest::default(), ExecKind::Command, &ctx.config());
    let output = exec::run_shell(&command, &options).await?;

    to_payload(&KillOutput {
        pid: params.pid,
        signal,
        force,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Parse `ps aux` output. The header and malformed rows are skipped.
///
/// Columns: USER PID %CPU %MEM VSZ RSS TTY STAT START TIME COMMAND.
pub fn parse_ps_output(stdout: &str) -> Vec<ProcessEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 11 {
                return None;
            }
            let pid: u32 = fields[1].parse().ok()?;
            let command = fields[10..].join(" ");
            let program = fields[10];
            let name = program.rsplit('/').next().unwrap_or(program).to_string();
            Some(ProcessEntry {
                name,
                pid,
                user: Some(fields[0].to_string()),
                cpu_percent: fields[2].parse().ok(),
                memory_percent: fields[3].parse().ok(),
                memory: Some(fields[5].to_string()),
                command: Some(command),
            })
        })
        .collect()
}

/// Parse `tasklist /fo csv /nh` output.
///
/// Columns: "Image Name","PID","Session Name","Session#","Mem Usage".
pub fn parse_tasklist_csv(stdout: &str) -> Vec<ProcessEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim().strip_prefix('"')?.strip_suffix('"')?;
            let fields: Vec<&str> = line.split("\",\"").collect();
            if fields.len() < 5 {
                return None;
            }
            let pid: u32 = fields[1].parse().ok()?;
            Some(ProcessEntry {
                name: fields[0].to_string(),
                pid,
                user: None,
                cpu_percent: None,
                memory_percent: None,
                memory: Some(fields[4].to_string()),
                command: None,
            })
        })
        .collect()
}
