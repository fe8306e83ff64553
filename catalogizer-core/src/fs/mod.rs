//! Storage abstraction consumed by the scan and rename layers
//!
//! The core never talks to a concrete protocol: it consumes the
//! `FileSystemClient` capability set. Concrete SMB/FTP/NFS/WebDAV/local
//! clients live outside the core and implement this trait.

pub mod handler;
pub mod rename;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

pub use handler::{
    HandlerFactory, ProtocolCapabilities, ProtocolHandler, FTP_MOVE_WINDOW, LOCAL_MOVE_WINDOW,
    NFS_MOVE_WINDOW, SMB_MOVE_WINDOW, WEBDAV_MOVE_WINDOW,
};
pub use rename::{MoveCorrelator, RenameEvent};

/// One listing entry returned by a storage client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: i64,
    pub mtime: Option<DateTime<Utc>>,
}

/// Capability set every storage protocol exposes to the core.
///
/// Operations fail with `Error::Transient` (timeouts, connection loss;
/// retryable) or `Error::Permanent`/`Error::NotFound` (definitive).
#[async_trait]
pub trait FileSystemClient: Send + Sync {
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>>;

    async fn file_exists(&self, path: &str) -> Result<bool>;

    async fn copy_file(&self, src: &str, dst: &str) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    async fn create_directory(&self, path: &str) -> Result<()>;

    async fn delete_directory(&self, path: &str) -> Result<()>;
}
