//! Directory tool: directory_operations (create, list, delete, exists)

use crate::{
    error::{ErrorKind, ToolError},
    registry::ToolDescriptor,
    tools::{
        ToolContext,
        metadata::{EntryType, FileMetadata, ListingSummary},
        parse_params, schema_for, to_payload,
    },
};
use futures::{FutureExt, future::BoxFuture};
use rmcp::{
    model::JsonObject,
    schemars::{self, JsonSchema},
};
use serde::{Deserialize, Serialize};
use std::{io, path::Path};

pub const DIRECTORY_OPERATIONS: &str = "directory_operations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryOperation {
    Create,
    List,
    Delete,
    Exists,
}

/// Parameters for `directory_operations`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirectoryOperationsParams {
    /// Operation to perform.
    pub operation: DirectoryOperation,
    /// Directory path.
    pub path: String,
    /// create: make missing parents (default true). delete: remove contents too.
    pub recursive: Option<bool>,
    /// delete: succeed when the directory is missing.
    pub force: Option<bool>,
    /// list: include entries whose names start with a dot.
    pub include_hidden: Option<bool>,
    /// list: attach metadata to every entry.
    pub include_metadata: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CreateOutput {
    operation: DirectoryOperation,
    path: String,
    created: bool,
    existed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<FileMetadata>,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    operation: DirectoryOperation,
    path: String,
    entries: Vec<Entry>,
    summary: ListingSummary,
}

#[derive(Debug, Serialize)]
struct Entry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<EntryMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EntryMetadata {
    Metadata(FileMetadata),
    Error { error: String },
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    operation: DirectoryOperation,
    path: String,
    deleted: bool,
    existed: bool,
    recursive: bool,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    operation: DirectoryOperation,
    path: String,
    exists: bool,
    is_directory: bool,
    is_file: bool,
    path_exists: bool,
}

pub fn directory_operations_definition() -> ToolDescriptor {
    ToolDescriptor::new(
        DIRECTORY_OPERATIONS,
        "Create, list, delete or check a directory",
        schema_for::<DirectoryOperationsParams>(),
    )
}

pub fn directory_operations(
    ctx: &ToolContext,
    args: JsonObject,
) -> BoxFuture<'_, Result<JsonObject, ToolError>> {
    run(ctx, args).boxed()
}

async fn run(ctx: &ToolContext, args: JsonObject) -> Result<JsonObject, ToolError> {
    let params: DirectoryOperationsParams = parse_params(args)?;
    let path = ctx.resolve_path(&params.path)?;

    match params.operation {
        DirectoryOperation::Create => create(&path, params.recursive.unwrap_or(true)).await,
        DirectoryOperation::List => {
            list(
                &path,
                params.include_hidden.unwrap_or(false),
                params.include_metadata.unwrap_or(false),
            )
            .await
        }
        DirectoryOperation::Delete => {
            delete(
                &path,
                params.recursive.unwrap_or(false),
                params.force.unwrap_or(false),
            )
            .await
        }
        DirectoryOperation::Exists => exists(&path).await,
    }
}

fn not_a_directory(path: &Path) -> ToolError {
    ToolError::new(
        ErrorKind::NotADirectory,
        format!("Path exists but is not a directory: {}", path.display()),
    )
}

async fn create(path: &Path, recursive: bool) -> Result<JsonObject, ToolError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            return to_payload(&CreateOutput {
                operation: DirectoryOperation::Create,
                path: path.display().to_string(),
                created: false,
                existed: true,
                metadata: Some(FileMetadata::from(&meta)),
            });
        }
        Ok(_) => return Err(not_a_directory(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ToolError::from_io(&e, path)),
    }

    let result = if recursive {
        tokio::fs::create_dir_all(path).await
    } else {
        tokio::fs::create_dir(path).await
    };
    result.map_err(|e| ToolError::from_io(&e, path))?;
    tracing::debug!(path = %path.display(), recursive, "created directory");

    to_payload(&CreateOutput {
        operation: DirectoryOperation::Create,
        path: path.display().to_string(),
        created: true,
        existed: false,
        metadata: Some(FileMetadata::read(path).await?),
    })
}

async fn list(
    path: &Path,
    include_hidden: bool,
    include_metadata: bool,
) -> Result<JsonObject, ToolError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ToolError::from_io(&e, path))?;
    if !meta.is_dir() {
        return Err(not_a_directory(path));
    }

    let mut reader = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ToolError::from_io(&e, path))?;
    let mut entries = Vec::new();
    let mut summary = ListingSummary::default();
    while let Some(dir_entry) = reader
        .next_entry()
        .await
        .map_err(|e| ToolError::from_io(&e, path))?
    {
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if !include_hidden && name.starts_with('.') {
            continue;
        }

        let entry_type = match dir_entry.file_type().await {
            Ok(file_type) => EntryType::from(file_type),
            Err(_) => EntryType::Other,
        };
        let entry_meta = dir_entry.metadata().await;
        match &entry_meta {
            Ok(m) => summary.add(&name, entry_type, Some(m.len()), m.modified().ok()),
            Err(_) => summary.add(&name, entry_type, None, None),
        }
        let metadata = include_metadata.then(|| match entry_meta {
            Ok(m) => EntryMetadata::Metadata(FileMetadata::from(&m)),
            Err(e) => EntryMetadata::Error {
                error: e.to_string(),
            },
        });

        entries.push(Entry {
            path: dir_entry.path().display().to_string(),
            name,
            entry_type,
            metadata,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    to_payload(&ListOutput {
        operation: DirectoryOperation::List,
        path: path.display().to_string(),
        entries,
        summary,
    })
}

async fn delete(path: &Path, recursive: bool, force: bool) -> Result<JsonObject, ToolError> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound && force => {
            return to_payload(&DeleteOutput {
                operation: DirectoryOperation::Delete,
                path: path.display().to_string(),
                deleted: false,
                existed: false,
                recursive,
            });
        }
        Err(e) => return Err(ToolError::from_io(&e, path)),
    };
    if !meta.is_dir() {
        return Err(not_a_directory(path));
    }

    let result = if recursive {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_dir(path).await
    };
    result.map_err(|e| match ToolError::from_io(&e, path) {
        err if err.kind() == ErrorKind::NotEmpty => ToolError::new(
            ErrorKind::NotEmpty,
            format!(
                "Directory not empty: {} (set recursive to delete its contents)",
                path.display()
            ),
        ),
        err => err,
    })?;
    tracing::debug!(path = %path.display(), recursive, "deleted directory");

    to_payload(&DeleteOutput {
        operation: DirectoryOperation::Delete,
        path: path.display().to_string(),
        deleted: true,
        existed: true,
        recursive,
    })
}

async fn exists(path: &Path) -> Result<JsonObject, ToolError> {
    let meta = tokio::fs::metadata(path).await.ok();
    let is_directory = meta.as_ref().is_some_and(|m| m.is_dir());
    to_payload(&ExistsOutput {
        operation: DirectoryOperation::Exists,
        path: path.display().to_string(),
        exists: is_directory,
        is_directory,
        is_file: meta.as_ref().is_some_and(|m| m.is_file()),
        path_exists: meta.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::tools::test_support::{call_err, call_ok, ctx};
    use serde_json::json;

    #[tokio::test]
    async fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c");
        let ctx = ctx();

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "create", "path": path }),
        )
        .await;
        assert_eq!(json["created"], true);
        assert!(path.is_dir());

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "create", "path": path }),
        )
        .await;
        assert_eq!(json["created"], false);
        assert_eq!(json["existed"], true);
    }

    #[tokio::test]
    async fn create_over_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "").unwrap();
        call_err(
            &ctx(),
            "directory_operations",
            json!({ "operation": "create", "path": file }),
            ErrorKind::NotADirectory,
        )
        .await;
        call_err(
            &ctx(),
            "directory_operations",
            json!({ "operation": "create", "path": dir.path().join("x/y"), "recursive": false }),
            ErrorKind::NotFound,
        )
        .await;
    }

    #[tokio::test]
    async fn list_sorts_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), [0u8; 20]).unwrap();
        std::fs::write(dir.path().join("a.txt"), [0u8; 10]).unwrap();
        std::fs::write(dir.path().join("c.txt"), [0u8; 30]).unwrap();
        std::fs::write(dir.path().join(".hidden"), [0u8; 99]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let json = call_ok(
            &ctx(),
            "directory_operations",
            json!({ "operation": "list", "path": dir.path(), "include_metadata": true }),
        )
        .await;
        let names: Vec<&str> = json["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt", "sub"]);
        assert_eq!(json["entries"][3]["type"], "directory");
        assert_eq!(json["entries"][0]["metadata"]["size"], 10);

        let summary = &json["summary"];
        assert_eq!(summary["total_entries"], 4);
        assert_eq!(summary["files"], 3);
        assert_eq!(summary["directories"], 1);
        assert_eq!(summary["total_size"], 60);
        assert_eq!(summary["largest_file"]["size"], 30);
        assert_eq!(summary["largest_file"]["name"], "c.txt");

        let json = call_ok(
            &ctx(),
            "directory_operations",
            json!({ "operation": "list", "path": dir.path(), "include_hidden": true }),
        )
        .await;
        assert_eq!(json["summary"]["total_entries"], 5);
        assert_eq!(json["entries"][0]["name"], ".hidden");
        assert!(json["entries"][0].get("metadata").is_none());
    }

    #[tokio::test]
    async fn list_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        call_err(
            &ctx(),
            "directory_operations",
            json!({ "operation": "list", "path": file }),
            ErrorKind::NotADirectory,
        )
        .await;
    }

    #[tokio::test]
    async fn delete_requires_recursive_for_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("full");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("f"), "x").unwrap();
        let ctx = ctx();

        call_err(
            &ctx,
            "directory_operations",
            json!({ "operation": "delete", "path": target }),
            ErrorKind::NotEmpty,
        )
        .await;
        assert!(target.exists());

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "delete", "path": target, "recursive": true }),
        )
        .await;
        assert_eq!(json["deleted"], true);
        assert!(!target.exists());

        call_err(
            &ctx,
            "directory_operations",
            json!({ "operation": "delete", "path": target }),
            ErrorKind::NotFound,
        )
        .await;
        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "delete", "path": target, "force": true }),
        )
        .await;
        assert_eq!(json["existed"], false);
    }

    #[tokio::test]
    async fn exists_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let ctx = ctx();

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "exists", "path": dir.path() }),
        )
        .await;
        assert_eq!(json["exists"], true);
        assert_eq!(json["is_directory"], true);

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "exists", "path": file }),
        )
        .await;
        assert_eq!(json["exists"], false);
        assert_eq!(json["is_file"], true);
        assert_eq!(json["path_exists"], true);

        let json = call_ok(
            &ctx,
            "directory_operations",
            json!({ "operation": "exists", "path": dir.path().join("missing") }),
        )
        .await;
        assert_eq!(json["path_exists"], false);
    }
}
