//! Static limits and the per-invocation execution options.

use crate::config::Config;
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Smallest accepted timeout.
pub const MIN_TIMEOUT_MS: u64 = 1_000;
/// Absolute ceiling for any timeout, whatever the configuration says.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 60_000;

/// Cap on captured stdout or stderr of one process (10 MiB).
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
/// Cap on a single file read (50 MiB).
pub const MAX_READ_BYTES: u64 = 50 * 1024 * 1024;
/// Cap on a single file write (100 MiB).
pub const MAX_WRITE_BYTES: u64 = 100 * 1024 * 1024;

/// Which default timeout applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecKind {
    Command,
    Script,
}

/// Caller-supplied execution options, as they appear in tool arguments.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub working_directory: Option<String>,
    pub timeout_ms: Option<u64>,
    pub environment: Option<HashMap<String, String>>,
}

/// Resolved options for one spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub timeout_ms: u64,
    /// Passed to the spawn unchecked; a missing directory is reported by the
    /// spawn itself.
    pub working_directory: Option<PathBuf>,
    /// Overlay on the inherited environment. Overlay wins on collisions.
    pub environment: Option<HashMap<String, String>>,
    pub max_output_bytes: usize,
}

impl ExecutionOptions {
    /// Resolve `request` against the configured defaults and caps.
    pub fn build(request: ExecRequest, kind: ExecKind, config: &Config) -> Self {
        let default_ms = match kind {
            ExecKind::Command => config.timeouts.command_ms,
            ExecKind::Script => config.timeouts.script_ms,
        };
        let max_ms = config.timeouts.max_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        let timeout_ms = request
            .timeout_ms
            .unwrap_or(default_ms)
            .clamp(MIN_TIMEOUT_MS, max_ms);

        Self {
            timeout_ms,
            working_directory: request
                .working_directory
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            environment: request.environment,
            max_output_bytes: config.limits.max_output_bytes,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::options::{ExecKind, ExecRequest, ExecutionOptions};
    use std::collections::HashMap;

    fn build(timeout_ms: Option<u64>, kind: ExecKind) -> ExecutionOptions {
        let request = ExecRequest {
            timeout_ms,
            ..ExecRequest::default()
        };
        ExecutionOptions::build(request, kind, &Config::default())
    }

    #[test]
    fn defaults_depend_on_kind() {
        assert_eq!(build(None, ExecKind::Command).timeout_ms, 30_000);
        assert_eq!(build(None, ExecKind::Script).timeout_ms, 60_000);
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(build(Some(10), ExecKind::Command).timeout_ms, 1_000);
        assert_eq!(build(Some(5_000), ExecKind::Command).timeout_ms, 5_000);
        assert_eq!(build(Some(10_000_000), ExecKind::Command).timeout_ms, 300_000);
    }

    #[test]
    fn configured_max_never_exceeds_absolute_cap() {
        let mut config = Config::default();
        config.timeouts.max_ms = 900_000;
        let request = ExecRequest {
            timeout_ms: Some(600_000),
            ..ExecRequest::default()
        };
        let options = ExecutionOptions::build(request, ExecKind::Script, &config);
        assert_eq!(options.timeout_ms, 300_000);

        config.timeouts.max_ms = 2_000;
        let request = ExecRequest {
            timeout_ms: Some(60_000),
            ..ExecRequest::default()
        };
        let options = ExecutionOptions::build(request, ExecKind::Script, &config);
        assert_eq!(options.timeout_ms, 2_000);
    }

    #[test]
    fn passes_directory_and_environment_through() {
        let request = ExecRequest {
            working_directory: Some("/does/not/exist".into()),
            timeout_ms: None,
            environment: Some(HashMap::from([("FOO".to_string(), "bar".to_string())])),
        };
        let options = ExecutionOptions::build(request, ExecKind::Command, &Config::default());
        assert_eq!(
            options.working_directory.as_deref(),
            Some(std::path::Path::new("/does/not/exist"))
        );
        assert_eq!(options.environment.unwrap()["FOO"], "bar");
        assert_eq!(options.max_output_bytes, 10 * 1024 * 1024);
    }
}
