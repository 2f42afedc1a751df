//! Process-wide server configuration.
//!
//! The configuration is a JSON file merged over built-in defaults. It is
//! loaded once at startup, read by every invocation through a
//! [`ConfigStore`], and only changed through [`ConfigStore::update`], which
//! writes the new value back to disk immediately.

use crate::{options, tools::script::Interpreter};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};
use thiserror::Error;

/// Errors from loading or persisting the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read or written.
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Full server configuration. Missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timeouts: Timeouts,
    pub limits: Limits,
    pub security: Security,
}

/// Default and maximum timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Default for commands and process tools.
    pub command_ms: u64,
    /// Default for scripts.
    pub script_ms: u64,
    /// Upper bound for any requested timeout. Never above
    /// [`options::MAX_TIMEOUT_MS`].
    pub max_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_ms: options::DEFAULT_COMMAND_TIMEOUT_MS,
            script_ms: options::DEFAULT_SCRIPT_TIMEOUT_MS,
            max_ms: options::MAX_TIMEOUT_MS,
        }
    }
}

/// Buffer and transfer caps, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_output_bytes: usize,
    pub max_read_bytes: u64,
    pub max_write_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_output_bytes: options::MAX_OUTPUT_BYTES,
            max_read_bytes: options::MAX_READ_BYTES,
            max_write_bytes: options::MAX_WRITE_BYTES,
        }
    }
}

/// Command permission mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Everything is allowed except blacklisted substrings.
    #[default]
    Standard,
    /// Only whitelisted substrings are allowed.
    Strict,
}

impl SecurityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityMode::Standard => "standard",
            SecurityMode::Strict => "strict",
        }
    }
}

/// Substring-based command policy.
///
/// This is a convenience filter, not an isolation boundary: matching is a
/// plain substring test on the raw command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub mode: SecurityMode,
    pub command_whitelist: Vec<String>,
    pub command_blacklist: Vec<String>,
    pub allowed_interpreters: Vec<Interpreter>,
}

impl Default for Security {
    fn default() -> Self {
        Self {
            mode: SecurityMode::Standard,
            command_whitelist: Vec::new(),
            command_blacklist: [
                "rm -rf /",
                "mkfs",
                "dd if=/dev/zero",
                ":(){ :|:& };:",
                "format c:",
                "shutdown",
                "reboot",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            allowed_interpreters: Interpreter::ALL.to_vec(),
        }
    }
}

impl Security {
    /// Whether `command` passes the policy for the current mode.
    ///
    /// In strict mode an empty whitelist permits nothing.
    pub fn permits(&self, command: &str) -> bool {
        match self.mode {
            SecurityMode::Strict => self
                .command_whitelist
                .iter()
                .any(|allowed| command.contains(allowed.as_str())),
            SecurityMode::Standard => !self
                .command_blacklist
                .iter()
                .any(|blocked| command.contains(blocked.as_str())),
        }
    }

    pub fn allows_interpreter(&self, interpreter: Interpreter) -> bool {
        self.allowed_interpreters.contains(&interpreter)
    }
}

/// Shared, persisted configuration.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Config>,
}

impl ConfigStore {
    /// A store that never touches disk.
    pub fn in_memory(config: Config) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// Per-user configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wmcp").join("system.json"))
    }

    /// Load the file at `path`, merged over the defaults.
    ///
    /// A missing file yields the defaults; later updates create it.
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    /// Backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `change` and persist the result before returning it.
    pub fn update(&self, change: impl FnOnce(&mut Config)) -> Result<Config, ConfigError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        change(&mut next);
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *guard = next.clone();
        tracing::info!(path = ?self.path, "configuration updated");
        Ok(next)
    }
}

fn persist(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw).map_err(io_err)
}
