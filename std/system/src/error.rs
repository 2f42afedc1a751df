//! Error taxonomy shared by every tool.
//!
//! OS-level failures are mapped in exactly one place, [`ToolError::from_io`],
//! onto the closed [`ErrorKind`] set that callers branch on.

use serde::Serialize;
use std::{fmt, io, path::Path};
use thiserror::Error;

/// Closed set of failure categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed, missing or out-of-range arguments. Reported as a protocol error.
    InvalidParams,
    /// The requested tool is not registered. Reported as a protocol error.
    UnknownOperation,
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    PermissionDenied,
    NotEmpty,
    NoSpace,
    TooManyOpenFiles,
    CrossDeviceMove,
    /// A size cap (file read/write, captured output) was exceeded.
    TooLarge,
    /// A spawned process outlived its deadline and was killed.
    Timeout,
    NonZeroExit,
    Signaled,
    InternalError,
}

impl ErrorKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::UnknownOperation => "unknown_operation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotADirectory => "not_a_directory",
            ErrorKind::IsADirectory => "is_a_directory",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotEmpty => "not_empty",
            ErrorKind::NoSpace => "no_space",
            ErrorKind::TooManyOpenFiles => "too_many_open_files",
            ErrorKind::CrossDeviceMove => "cross_device_move",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::Signaled => "signaled",
            ErrorKind::InternalError => "internal_error",
        }
    }

    /// Classify an I/O error.
    pub fn from_io(err: &io::Error) -> Self {
        #[cfg(unix)]
        if matches!(err.raw_os_error(), Some(code) if code == libc::EMFILE || code == libc::ENFILE) {
            return ErrorKind::TooManyOpenFiles;
        }
        // ERROR_TOO_MANY_OPEN_FILES
        #[cfg(windows)]
        if err.raw_os_error() == Some(4) {
            return ErrorKind::TooManyOpenFiles;
        }

        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::NotADirectory => ErrorKind::NotADirectory,
            io::ErrorKind::IsADirectory => ErrorKind::IsADirectory,
            io::ErrorKind::DirectoryNotEmpty => ErrorKind::NotEmpty,
            io::ErrorKind::StorageFull => ErrorKind::NoSpace,
            io::ErrorKind::CrossesDevices => ErrorKind::CrossDeviceMove,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::InternalError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output captured from a process that did not finish cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Name of the terminating signal, e.g. `SIGKILL`.
    pub signal: Option<String>,
    pub timed_out: bool,
}

/// Failure raised by a tool handler.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ToolError {
    kind: ErrorKind,
    message: String,
    output: Option<Box<ProcessOutput>>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            output: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self::new(ErrorKind::UnknownOperation, format!("Unknown tool: {name}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Attach the partial output of a process to this error.
    pub fn with_output(mut self, output: ProcessOutput) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Map an I/O error raised while operating on `path`.
    pub fn from_io(err: &io::Error, path: &Path) -> Self {
        let kind = ErrorKind::from_io(err);
        let path = path.display();
        let message = match kind {
            ErrorKind::NotFound => format!("File or directory not found: {path}"),
            ErrorKind::AlreadyExists => format!("File or directory already exists: {path}"),
            ErrorKind::NotADirectory => format!("Not a directory: {path}"),
            ErrorKind::IsADirectory => format!("Is a directory: {path}"),
            ErrorKind::PermissionDenied => format!("Permission denied: {path}"),
            ErrorKind::NotEmpty => format!("Directory not empty: {path}"),
            ErrorKind::NoSpace => format!("No space left on device: {path}"),
            ErrorKind::TooManyOpenFiles => {
                format!("Too many open files while accessing {path}")
            }
            ErrorKind::CrossDeviceMove => format!("Cannot move across devices: {path}"),
            _ => format!("{path}: {err}"),
        };
        Self::new(kind, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn output(&self) -> Option<&ProcessOutput> {
        self.output.as_deref()
    }

    pub(crate) fn into_parts(self) -> (ErrorKind, String, Option<ProcessOutput>) {
        (self.kind, self.message, self.output.map(|o| *o))
    }
}
