//! File metadata and directory listing summaries shared by the file tools.

use crate::error::ToolError;
use serde::Serialize;
use std::{
    fs::{FileType, Metadata},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

/// Metadata of a single filesystem entry. Symlinks are not followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    pub size: u64,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symbolic_link: bool,
    pub permissions: Permissions,
}

/// Access flags for the owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl FileMetadata {
    /// Stat `path` without following symlinks.
    pub async fn read(path: &Path) -> Result<Self, ToolError> {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| ToolError::from_io(&e, path))?;
        Ok(Self::from(&meta))
    }
}

impl From<&Metadata> for FileMetadata {
    fn from(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            created: meta.created().ok().and_then(rfc3339),
            modified: meta.modified().ok().and_then(rfc3339),
            accessed: meta.accessed().ok().and_then(rfc3339),
            is_file: meta.is_file(),
            is_directory: meta.is_dir(),
            is_symbolic_link: meta.is_symlink(),
            permissions: permissions(meta),
        }
    }
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    Permissions {
        readable: mode & 0o400 != 0,
        writable: mode & 0o200 != 0,
        executable: mode & 0o100 != 0,
    }
}

#[cfg(not(unix))]
fn permissions(meta: &Metadata) -> Permissions {
    Permissions {
        readable: true,
        writable: !meta.permissions().readonly(),
        executable: false,
    }
}

/// Format a timestamp as RFC 3339 in UTC.
pub fn rfc3339(time: SystemTime) -> Option<String> {
    let since = time.duration_since(UNIX_EPOCH).ok()?;
    chrono::DateTime::from_timestamp(since.as_secs() as i64, since.subsec_nanos())
        .map(|dt| dt.to_rfc3339())
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Other,
}

impl From<FileType> for EntryType {
    fn from(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            EntryType::Symlink
        } else if file_type.is_dir() {
            EntryType::Directory
        } else if file_type.is_file() {
            EntryType::File
        } else {
            EntryType::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargestFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentEntry {
    pub name: String,
    pub modified: String,
}

/// Aggregate counts over one directory listing.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSummary {
    pub total_entries: usize,
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    pub other: usize,
    /// Sum of regular file sizes.
    pub total_size: u64,
    pub largest_file: Option<LargestFile>,
    pub most_recently_modified: Option<RecentEntry>,
    #[serde(skip)]
    latest: Option<SystemTime>,
}

impl ListingSummary {
    /// Account for one entry. `size` counts toward totals only for files.
    pub fn add(
        &mut self,
        name: &str,
        entry_type: EntryType,
        size: Option<u64>,
        modified: Option<SystemTime>,
    ) {
        self.total_entries += 1;
        match entry_type {
            EntryType::File => self.files += 1,
            EntryType::Directory => self.directories += 1,
            EntryType::Symlink => self.symlinks += 1,
            EntryType::Other => self.other += 1,
        }

        if let (EntryType::File, Some(size)) = (entry_type, size) {
            self.total_size += size;
            if self.largest_file.as_ref().is_none_or(|f| size > f.size) {
                self.largest_file = Some(LargestFile {
                    name: name.to_string(),
                    size,
                });
            }
        }

        let Some(modified) = modified else {
            return;
        };
        if self.latest.is_some_and(|latest| modified <= latest) {
            return;
        }
        if let Some(formatted) = rfc3339(modified) {
            self.latest = Some(modified);
            self.most_recently_modified = Some(RecentEntry {
                name: name.to_string(),
                modified: formatted,
            });
        }
    }
}
