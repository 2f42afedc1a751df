//! Host information tool: get_system_info

use crate::{
    config::SecurityMode,
    error::ToolError,
    registry::ToolDescriptor,
    tools::{ToolContext, parse_params, schema_for, to_payload},
};
use futures::{FutureExt, future::BoxFuture};
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};

pub const GET_SYSTEM_INFO: &str = "get_system_info";

/// `get_system_info` takes no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetSystemInfoParams {}

#[derive(Debug, Serialize)]
struct SystemInfo {
    platform: &'static str,
    arch: &'static str,
    family: &'static str,
    hostname: Option<String>,
    cpu_count: usize,
    total_memory: Option<u64>,
    free_memory: Option<u64>,
    uptime_seconds: Option<u64>,
    home_directory: Option<String>,
    temp_directory: String,
    current_directory: Option<String>,
    user: Option<String>,
    shell: Option<String>,
    pid: u32,
    server_version: &'static str,
    security_mode: SecurityMode,
}

/// Memory figures in bytes.
#[derive(Debug, Default, PartialEq, Eq)]
struct Memory {
    total: Option<u64>,
    free: Option<u64>,
}

pub fn get_system_info_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        GET_SYSTEM_INFO,
        "Get information about the host: platform, CPU, memory, uptime, user and directories",
        schema_for::<GetSystemInfoParams>(),
    )
}

pub fn get_system_info(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    run(ctx, args).boxed()
}

async fn run(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let _: GetSystemInfoParams = parse_params(args)?;
    let memory = read_memory().await;

    to_payload(&SystemInfo {
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        family: std::env::consts::FAMILY,
        hostname: hostname::get()
            .ok()
            .map(|name| name.to_string_lossy().into_owned()),
        cpu_count: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        total_memory: memory.total,
        free_memory: memory.free,
        uptime_seconds: read_uptime().await,
        home_directory: dirs::home_dir().map(|dir| dir.display().to_string()),
        temp_directory: std::env::temp_dir().display().to_string(),
        current_directory: std::env::current_dir()
            .ok()
            .map(|dir| dir.display().to_string()),
        user: env_any(&["USER", "USERNAME"]),
        shell: env_any(&["SHELL", "ComSpec"]),
        pid: std::process::id(),
        server_version: env!("CARGO_PKG_VERSION"),
        security_mode: ctx.config().security.mode,
    })
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

async fn read_proc(path: &str) -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!(path, error = %e, "failed to read proc file");
            None
        }
    }
}

async fn read_memory() -> Memory {
    read_proc("/proc/meminfo")
        .await
        .map(|content| parse_meminfo(&content))
        .unwrap_or_default()
}

async fn read_uptime() -> Option<u64> {
    parse_uptime(&read_proc("/proc/uptime").await?)
}

/// Parse `/proc/meminfo`. Free memory prefers `MemAvailable` over `MemFree`.
fn parse_meminfo(content: &str) -> Memory {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kib * 1024)
        })
    };
    Memory {
        total: field("MemTotal"),
        free: field("MemAvailable").or_else(|| field("MemFree")),
    }
}

/// Parse `/proc/uptime` into whole seconds.
fn parse_uptime(content: &str) -> Option<u64> {
    let seconds: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(seconds as u64)
}
