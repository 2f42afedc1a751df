//! Path normalization and the traversal guard.
//!
//! Every path argument of the file and directory tools passes through
//! [`validate_path`] before any filesystem call. The guard is coarse on
//! purpose: a path that spells out `..` segments must still land under the
//! home directory. Paths without `..` are accepted wherever they point. This
//! is not a sandbox.

use crate::error::ToolError;
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors from path validation.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The path is empty or whitespace.
    #[error("path must not be empty")]
    Empty,
    /// The path contains a null byte.
    #[error("path contains null byte")]
    NullByte,
    /// A `..` segment leads outside the home directory.
    #[error("path traversal outside the home directory is not allowed: {0}")]
    Traversal(PathBuf),
    /// The current directory could not be determined.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidateError> for ToolError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Io(_) => ToolError::internal(err.to_string()),
            _ => ToolError::invalid_params(err.to_string()),
        }
    }
}

/// Resolve `path` to a normalized absolute path and apply the traversal guard.
///
/// Steps:
/// 1. Reject empty paths and paths containing null bytes
/// 2. Expand a leading `~` to `home`
/// 3. Join relative paths onto the current directory
/// 4. Normalize lexically (`.` and `..` are folded, symlinks are not resolved)
/// 5. If the input contained a `..` segment, require the result to be under
///    `home`
pub fn validate_path(path: &str, home: Option<&Path>) -> Result<PathBuf, ValidateError> {
    if path.contains('\0') {
        return Err(ValidateError::NullByte);
    }
    if path.trim().is_empty() {
        return Err(ValidateError::Empty);
    }

    let expanded = expand_home(path, home);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    let normalized = absolute.clean();

    let traverses = Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if traverses && !home.is_some_and(|home| normalized.starts_with(home)) {
        return Err(ValidateError::Traversal(normalized));
    }

    Ok(normalized)
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        _ => PathBuf::from(path),
    }
}
