//! Storage roots and the file records they own

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{FileId, StorageRootId};

/// Lifecycle of a storage root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageRootStatus {
    Configured,
    Scanned,
    Disabled,
    Deleted,
}

impl StorageRootStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Scanned => "scanned",
            Self::Disabled => "disabled",
            Self::Deleted => "deleted",
        }
    }
}

/// A configured storage subtree on some protocol.
/// Invariant: `(protocol, host, port, path)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StorageRoot {
    pub id: StorageRootId,
    pub name: String,
    /// Lowercased protocol tag: local, smb, ftp, nfs, webdav
    pub protocol: String,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub enabled: bool,
    pub max_depth: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// A file or directory inside a storage root.
/// Invariant: `path` is unique within a root; `parent_id` references a
/// directory record in the same root, or is null for top-level entries.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    pub id: FileId,
    pub storage_root_id: StorageRootId,
    pub parent_id: Option<FileId>,
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: i64,
    pub modified_at: Option<DateTime<Utc>>,
    pub quick_hash: Option<String>,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub file_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub is_duplicate: bool,
    pub duplicate_group_id: Option<String>,
}

impl FileRecord {
    /// Lowercased extension without the dot, if any
    #[must_use]
    pub fn extension_lower(&self) -> Option<String> {
        self.extension.as_ref().map(|e| e.to_lowercase())
    }
}
