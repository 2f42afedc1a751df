//! File tools: file_read, file_write, file_operations

use crate::{
    error::{ErrorKind, ToolError},
    registry::ToolDescriptor,
    tools::{ToolContext, metadata::FileMetadata, parse_params, schema_for, to_payload},
};
use futures::{FutureExt, future::BoxFuture};
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::io::AsyncWriteExt;

pub const FILE_READ: &str = "file_read";
pub const FILE_WRITE: &str = "file_write";
pub const FILE_OPERATIONS: &str = "file_operations";

/// Parameters for `file_read`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileReadParams {
    /// Path of the file to read.
    pub path: String,
}

/// Parameters for `file_write`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileWriteParams {
    /// Path of the file to write.
    pub path: String,
    /// Text to write.
    pub content: String,
    /// Create missing parent directories.
    pub create_directories: Option<bool>,
    /// Append instead of replacing the file.
    pub append: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Copy,
    Move,
    Delete,
}

impl FileOperation {
    fn as_str(self) -> &'static str {
        match self {
            FileOperation::Copy => "copy",
            FileOperation::Move => "move",
            FileOperation::Delete => "delete",
        }
    }
}

/// Parameters for `file_operations`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileOperationsParams {
    /// Operation to perform.
    pub operation: FileOperation,
    /// File to copy, move or delete.
    pub source: String,
    /// Target path. Required for copy and move.
    pub destination: Option<String>,
    /// Replace an existing destination.
    pub overwrite: Option<bool>,
    /// Deleting a missing file succeeds instead of failing.
    pub force: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ReadOutput {
    path: String,
    content: String,
    content_length: usize,
    metadata: FileMetadata,
}

#[derive(Debug, Serialize)]
struct WriteOutput {
    path: String,
    bytes_written: usize,
    size_before: u64,
    size_after: u64,
    created: bool,
    appended: bool,
    metadata: FileMetadata,
}

#[derive(Debug, Serialize)]
struct TransferOutput {
    operation: FileOperation,
    source: String,
    destination: String,
    source_metadata: FileMetadata,
    destination_metadata: FileMetadata,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    operation: FileOperation,
    source: String,
    deleted: bool,
    existed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<FileMetadata>,
}

pub fn file_read_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        FILE_READ,
        "Read a UTF-8 text file and return its content with metadata",
        schema_for::<FileReadParams>(),
    )
}

pub fn file_read(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    read(ctx, args).boxed()
}

pub fn file_write_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        FILE_WRITE,
        "Write or append text to a file, optionally creating parent directories",
        schema_for::<FileWriteParams>(),
    )
}

pub fn file_write(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    write(ctx, args).boxed()
}

pub fn file_operations_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        FILE_OPERATIONS,
        "Copy, move or delete a file",
        schema_for::<FileOperationsParams>(),
    )
}

pub fn file_operations(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    operate(ctx, args).boxed()
}

async fn read(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: FileReadParams = parse_params(args)?;
    let path = ctx.resolve_path(&params.path)?;
    let limit = ctx.config().limits.max_read_bytes;

    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ToolError::from_io(&e, &path))?;
    if meta.is_dir() {
        return Err(ToolError::new(
            ErrorKind::IsADirectory,
            format!("Path is a directory, not a file: {}", path.display()),
        ));
    }
    if meta.len() > limit {
        return Err(ToolError::new(
            ErrorKind::TooLarge,
            format!(
                "File is too large to read: {} bytes (limit {limit} bytes)",
                meta.len()
            ),
        ));
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ToolError::from_io(&e, &path))?;
    let content = String::from_utf8(bytes).map_err(|_| {
        ToolError::internal(format!("File is not valid UTF-8: {}", path.display()))
    })?;
    let metadata = FileMetadata::read(&path).await?;

    to_payload(&ReadOutput {
        path: path.display().to_string(),
        content_length: content.chars().count(),
        content,
        metadata,
    })
}

async fn write(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: FileWriteParams = parse_params(args)?;
    let path = ctx.resolve_path(&params.path)?;
    let limit = ctx.config().limits.max_write_bytes;
    let append = params.append.unwrap_or(false);

    let bytes_written = params.content.len();
    if bytes_written as u64 > limit {
        return Err(ToolError::new(
            ErrorKind::TooLarge,
            format!("Content is too large to write: {bytes_written} bytes (limit {limit} bytes)"),
        ));
    }

    if let Some(parent) = path.parent() {
        if params.create_directories.unwrap_or(false) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(&e, parent))?;
        } else if !exists(parent).await? {
            return Err(ToolError::new(
                ErrorKind::NotFound,
                format!("Parent directory not found: {}", parent.display()),
            ));
        }
    }

    let size_before = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => {
            return Err(ToolError::new(
                ErrorKind::IsADirectory,
                format!("Path is a directory, not a file: {}", path.display()),
            ));
        }
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(ToolError::from_io(&e, &path)),
    };

    if append {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ToolError::from_io(&e, &path))?;
        file.write_all(params.content.as_bytes())
            .await
            .map_err(|e| ToolError::from_io(&e, &path))?;
        file.flush()
            .await
            .map_err(|e| ToolError::from_io(&e, &path))?;
    } else {
        tokio::fs::write(&path, params.content.as_bytes())
            .await
            .map_err(|e| ToolError::from_io(&e, &path))?;
    }
    tracing::debug!(path = %path.display(), bytes = bytes_written, append, "wrote file");

    let metadata = FileMetadata::read(&path).await?;
    to_payload(&WriteOutput {
        path: path.display().to_string(),
        bytes_written,
        size_before: size_before.unwrap_or(0),
        size_after: metadata.size,
        created: size_before.is_none(),
        appended: append,
        metadata,
    })
}

/// Whether `a` and `b` name the same file, through links included.
async fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match (tokio::fs::metadata(a).await, tokio::fs::metadata(b).await) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }
    #[cfg(not(unix))]
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn operate(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: FileOperationsParams = parse_params(args)?;
    let source = ctx.resolve_path(&params.source)?;
    let operation = params.operation;

    if operation == FileOperation::Delete {
        return delete(source, params.force.unwrap_or(false)).await;
    }

    let destination = match params.destination.as_deref() {
        Some(raw) if !raw.trim().is_empty() => ctx.resolve_path(raw)?,
        _ => {
            return Err(ToolError::invalid_params(format!(
                "Parameter 'destination' is required for {}",
                operation.as_str()
            )));
        }
    };

    // Copy reads through links; move relocates the link itself.
    let source_meta = match operation {
        FileOperation::Copy => tokio::fs::metadata(&source).await,
        _ => tokio::fs::symlink_metadata(&source).await,
    }
    .map_err(|e| ToolError::from_io(&e, &source))?;
    if operation == FileOperation::Copy {
        if source_meta.is_dir() {
            return Err(ToolError::new(
                ErrorKind::IsADirectory,
                format!("Source is a directory: {}", source.display()),
            ));
        }
        if !source_meta.is_file() {
            return Err(ToolError::invalid_params(format!(
                "Source is not a regular file: {}",
                source.display()
            )));
        }
    }
    if same_file(&source, &destination).await {
        return Err(ToolError::invalid_params(format!(
            "Source and destination are the same file: {}",
            destination.display()
        )));
    }
    if !params.overwrite.unwrap_or(false) && exists(&destination).await? {
        return Err(ToolError::new(
            ErrorKind::AlreadyExists,
            format!(
                "Destination already exists: {} (set overwrite to replace it)",
                destination.display()
            ),
        ));
    }
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::from_io(&e, parent))?;
    }

    let source_metadata = FileMetadata::from(&source_meta);
    match operation {
        FileOperation::Copy => {
            tokio::fs::copy(&source, &destination)
                .await
                .map_err(|e| ToolError::from_io(&e, &destination))?;
        }
        _ => {
            tokio::fs::rename(&source, &destination)
                .await
                .map_err(|e| ToolError::from_io(&e, &source))?;
        }
    }
    tracing::debug!(
        operation = operation.as_str(),
        source = %source.display(),
        destination = %destination.display(),
        "file operation done"
    );

    to_payload(&TransferOutput {
        operation,
        source: source.display().to_string(),
        destination: destination.display().to_string(),
        source_metadata,
        destination_metadata: FileMetadata::read(&destination).await?,
    })
}

async fn delete(source: PathBuf, force: bool) -> Result<JsonObject, ToolError> {
    let meta = match tokio::fs::symlink_metadata(&source).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound && force => {
            return to_payload(&DeleteOutput {
                operation: FileOperation::Delete,
                source: source.display().to_string(),
                deleted: false,
                existed: false,
                message: Some("File does not exist"),
                metadata: None,
            });
        }
        Err(e) => return Err(ToolError::from_io(&e, &source)),
    };
    if meta.is_dir() {
        return Err(ToolError::new(
            ErrorKind::IsADirectory,
            format!(
                "Path is a directory, use directory_operations to delete it: {}",
                source.display()
            ),
        ));
    }

    let metadata = FileMetadata::from(&meta);
    tokio::fs::remove_file(&source)
        .await
        .map_err(|e| ToolError::from_io(&e, &source))?;
    tracing::debug!(path = %source.display(), "deleted file");

    to_payload(&DeleteOutput {
        operation: FileOperation::Delete,
        source: source.display().to_string(),
        deleted: true,
        existed: true,
        message: None,
        metadata: Some(metadata),
    })
}

async fn exists(path: &Path) -> Result<bool, ToolError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| ToolError::from_io(&e, path))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::tools::test_support::{call, call_err, call_ok, ctx, ctx_with};
    use serde_json::json;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let ctx = ctx();

        let json = call_ok(
            &ctx,
            "file_write",
            json!({ "path": path, "content": "héllo\nworld" }),
        )
        .await;
        assert_eq!(json["created"], true);
        assert_eq!(json["bytes_written"], "héllo\nworld".len());
        assert_eq!(json["size_before"], 0);
        assert_eq!(json["metadata"]["is_file"], true);

        let json = call_ok(&ctx, "file_read", json!({ "path": path })).await;
        assert_eq!(json["content"], "héllo\nworld");
        assert_eq!(json["content_length"], 11);
        assert_eq!(json["path"], path.display().to_string());
    }

    #[tokio::test]
    async fn append_extends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "one\n").unwrap();

        let json = call_ok(
            &ctx(),
            "file_write",
            json!({ "path": path, "content": "two\n", "append": true }),
        )
        .await;
        assert_eq!(json["created"], false);
        assert_eq!(json["appended"], true);
        assert_eq!(json["size_before"], 4);
        assert_eq!(json["size_after"], 8);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn write_needs_parent_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        call_err(
            &ctx(),
            "file_write",
            json!({ "path": path, "content": "x" }),
            ErrorKind::NotFound,
        )
        .await;
        call_ok(
            &ctx(),
            "file_write",
            json!({ "path": path, "content": "x", "create_directories": true }),
        )
        .await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn read_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        call_err(
            &ctx(),
            "file_read",
            json!({ "path": dir.path().join("missing.txt") }),
            ErrorKind::NotFound,
        )
        .await;
        call_err(
            &ctx(),
            "file_read",
            json!({ "path": dir.path() }),
            ErrorKind::IsADirectory,
        )
        .await;

        let binary = dir.path().join("blob.bin");
        std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();
        call_err(
            &ctx(),
            "file_read",
            json!({ "path": binary }),
            ErrorKind::InternalError,
        )
        .await;
    }

    #[tokio::test]
    async fn size_caps_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "0123456789").unwrap();

        let mut config = Config::default();
        config.limits.max_read_bytes = 5;
        config.limits.max_write_bytes = 5;
        let ctx = ctx_with(config);
        call_err(&ctx, "file_read", json!({ "path": path }), ErrorKind::TooLarge).await;
        call_err(
            &ctx,
            "file_write",
            json!({ "path": path, "content": "too long" }),
            ErrorKind::TooLarge,
        )
        .await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let sneaky = format!("{}/../escaped.txt", sub.display());

        let err = call(&ctx(), "file_write", json!({ "path": sneaky, "content": "x" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(!dir.path().join("escaped.txt").exists());

        let err = call(&ctx(), "file_read", json!({ "path": "../../../../etc/passwd" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
    }

    #[tokio::test]
    async fn copy_and_move() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        let copy = dir.path().join("nested/b.txt");
        let moved = dir.path().join("c.txt");
        std::fs::write(&source, "data").unwrap();
        let ctx = ctx();

        let json = call_ok(
            &ctx,
            "file_operations",
            json!({ "operation": "copy", "source": source, "destination": copy }),
        )
        .await;
        assert_eq!(json["operation"], "copy");
        assert_eq!(json["destination_metadata"]["size"], 4);
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "data");

        call_err(
            &ctx,
            "file_operations",
            json!({ "operation": "copy", "source": source, "destination": copy }),
            ErrorKind::AlreadyExists,
        )
        .await;
        call_ok(
            &ctx,
            "file_operations",
            json!({ "operation": "copy", "source": source, "destination": copy, "overwrite": true }),
        )
        .await;

        call_ok(
            &ctx,
            "file_operations",
            json!({ "operation": "move", "source": copy, "destination": moved }),
        )
        .await;
        assert!(!copy.exists());
        assert_eq!(std::fs::read_to_string(&moved).unwrap(), "data");
    }

    #[tokio::test]
    async fn transfer_requires_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        std::fs::write(&source, "data").unwrap();
        let err = call(
            &ctx(),
            "file_operations",
            json!({ "operation": "move", "source": source }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn copy_rejects_directories_and_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        call_err(
            &ctx(),
            "file_operations",
            json!({ "operation": "copy", "source": dir.path(), "destination": dir.path().join("x") }),
            ErrorKind::IsADirectory,
        )
        .await;
        call_err(
            &ctx(),
            "file_operations",
            json!({ "operation": "move", "source": dir.path().join("nope"), "destination": dir.path().join("x") }),
            ErrorKind::NotFound,
        )
        .await;
    }

    #[tokio::test]
    async fn transfer_onto_itself_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, "precious").unwrap();

        for operation in ["copy", "move"] {
            let err = call(
                &ctx(),
                "file_operations",
                json!({ "operation": operation, "source": path, "destination": path, "overwrite": true }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParams);
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "precious");
        }

        let spelled = dir.path().join(".").join("keep.txt");
        let err = call(
            &ctx(),
            "file_operations",
            json!({ "operation": "copy", "source": path, "destination": spelled, "overwrite": true }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "precious");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_follows_symlinked_source() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.txt");
        let link = dir.path().join("link.txt");
        let copy = dir.path().join("copy.txt");
        std::fs::write(&target, "linked").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let json = call_ok(
            &ctx(),
            "file_operations",
            json!({ "operation": "copy", "source": link, "destination": copy }),
        )
        .await;
        assert_eq!(json["success"], true);
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "linked");
        assert!(std::fs::symlink_metadata(&copy).unwrap().file_type().is_file());

        let err = call(
            &ctx(),
            "file_operations",
            json!({ "operation": "copy", "source": link, "destination": target, "overwrite": true }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "linked");
    }

    #[tokio::test]
    async fn delete_honors_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, "bye").unwrap();
        let ctx = ctx();

        let json = call_ok(
            &ctx,
            "file_operations",
            json!({ "operation": "delete", "source": path }),
        )
        .await;
        assert_eq!(json["deleted"], true);
        assert!(!path.exists());

        call_err(
            &ctx,
            "file_operations",
            json!({ "operation": "delete", "source": path }),
            ErrorKind::NotFound,
        )
        .await;
        let json = call_ok(
            &ctx,
            "file_operations",
            json!({ "operation": "delete", "source": path, "force": true }),
        )
        .await;
        assert_eq!(json["deleted"], false);
        assert_eq!(json["existed"], false);

        call_err(
            &ctx,
            "file_operations",
            json!({ "operation": "delete", "source": dir.path() }),
            ErrorKind::IsADirectory,
        )
        .await;
    }
}
