//! Per-protocol identity, move primitives and correlation windows
//!
//! Each handler answers four questions for its protocol: how to build a
//! stable file identity for rename correlation, how to move a file or
//! directory through the `FileSystemClient` capability set, whether the
//! protocol pushes change notifications, and how wide the delete/create
//! correlation window must be.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{Error, Result};

use super::{DirEntry, FileSystemClient};

pub const LOCAL_MOVE_WINDOW: Duration = Duration::from_secs(2);
pub const NFS_MOVE_WINDOW: Duration = Duration::from_secs(5);
pub const SMB_MOVE_WINDOW: Duration = Duration::from_secs(10);
pub const WEBDAV_MOVE_WINDOW: Duration = Duration::from_secs(15);
pub const FTP_MOVE_WINDOW: Duration = Duration::from_secs(30);

/// What a protocol can and cannot do, for callers that schedule scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolCapabilities {
    pub supports_real_time_notification: bool,
    pub move_window: Duration,
    pub supports_atomic_move: bool,
    pub requires_polling: bool,
}

/// Per-protocol behavior consumed by rename detection and file moves
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Lowercased protocol tag this handler serves
    fn protocol(&self) -> &'static str;

    /// Stable, protocol-prefixed identity for rename correlation.
    /// Deterministic: the same inputs always produce the same string,
    /// and two handlers never produce colliding identifiers.
    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String;

    /// Interval in which a deleted(old) + created(new) pair is treated
    /// as a rename
    fn move_window(&self) -> Duration;

    /// Whether the protocol pushes change events; everything else polls
    fn supports_real_time_notification(&self) -> bool {
        false
    }

    /// Whether the underlying protocol can rename without copying
    fn supports_atomic_move(&self) -> bool {
        false
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        ProtocolCapabilities {
            supports_real_time_notification: self.supports_real_time_notification(),
            move_window: self.move_window(),
            supports_atomic_move: self.supports_atomic_move(),
            requires_polling: !self.supports_real_time_notification(),
        }
    }

    /// Reject same-path moves and moves onto an existing destination
    async fn validate_move(
        &self,
        client: &dyn FileSystemClient,
        old_path: &str,
        new_path: &str,
    ) -> Result<()> {
        if old_path == new_path {
            return Err(Error::Invalid(format!(
                "Move source and destination are the same path: {old_path}"
            )));
        }
        if client.file_exists(new_path).await? {
            return Err(Error::Conflict(format!(
                "Move destination already exists: {new_path}"
            )));
        }
        Ok(())
    }

    /// Move a file or directory.
    ///
    /// The capability set has no rename primitive, so every protocol
    /// moves as copy-then-delete; directories recurse depth-first. On
    /// any failure after the destination was created, the partially
    /// copied destination is removed before returning.
    async fn perform_move(
        &self,
        client: &dyn FileSystemClient,
        old_path: &str,
        new_path: &str,
        is_dir: bool,
    ) -> Result<()> {
        self.validate_move(client, old_path, new_path).await?;

        if is_dir {
            if let Err(err) = copy_tree(client, old_path, new_path).await {
                tracing::warn!(
                    protocol = self.protocol(),
                    old_path,
                    new_path,
                    error = %err,
                    "Directory copy failed, removing partial destination"
                );
                if let Err(cleanup_err) = delete_tree(client, new_path).await {
                    tracing::warn!(
                        new_path,
                        error = %cleanup_err,
                        "Failed to remove partial move destination"
                    );
                }
                return Err(err);
            }
            delete_tree(client, old_path).await?;
        } else {
            if let Err(err) = client.copy_file(old_path, new_path).await {
                if client.file_exists(new_path).await.unwrap_or(false) {
                    let _ = client.delete_file(new_path).await;
                }
                return Err(err);
            }
            client.delete_file(old_path).await?;
        }

        tracing::debug!(
            protocol = self.protocol(),
            old_path,
            new_path,
            is_dir,
            "Move completed"
        );
        Ok(())
    }
}

/// Depth-first copy of a directory tree
fn copy_tree<'a>(
    client: &'a dyn FileSystemClient,
    src: &'a str,
    dst: &'a str,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        client.create_directory(dst).await?;
        let entries = client.list_directory(src).await?;
        for entry in entries {
            let child_src = join_path(src, &entry.name);
            let child_dst = join_path(dst, &entry.name);
            if entry.is_dir {
                copy_tree(client, &child_src, &child_dst).await?;
            } else {
                client.copy_file(&child_src, &child_dst).await?;
            }
        }
        Ok(())
    })
}

/// Depth-first removal of a directory tree
fn delete_tree<'a>(
    client: &'a dyn FileSystemClient,
    path: &'a str,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let entries = client.list_directory(path).await?;
        for entry in entries {
            let child = join_path(path, &entry.name);
            if entry.is_dir {
                delete_tree(client, &child).await?;
            } else {
                client.delete_file(&child).await?;
            }
        }
        client.delete_directory(path).await
    })
}

fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Local filesystem: inotify-backed notification, tight window
pub struct LocalHandler;

#[async_trait]
impl ProtocolHandler for LocalHandler {
    fn protocol(&self) -> &'static str {
        "local"
    }

    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String {
        format!("local:{path}:{size}:{is_dir}")
    }

    fn move_window(&self) -> Duration {
        LOCAL_MOVE_WINDOW
    }

    fn supports_real_time_notification(&self) -> bool {
        true
    }

    fn supports_atomic_move(&self) -> bool {
        true
    }
}

/// NFS: rename is atomic server-side, but changes are only seen by polling
pub struct NfsHandler;

#[async_trait]
impl ProtocolHandler for NfsHandler {
    fn protocol(&self) -> &'static str {
        "nfs"
    }

    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String {
        format!("nfs:{path}:{size}:{is_dir}")
    }

    fn move_window(&self) -> Duration {
        NFS_MOVE_WINDOW
    }

    fn supports_atomic_move(&self) -> bool {
        true
    }
}

/// SMB shares
pub struct SmbHandler;

#[async_trait]
impl ProtocolHandler for SmbHandler {
    fn protocol(&self) -> &'static str {
        "smb"
    }

    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String {
        format!("smb:{path}:{size}:{is_dir}")
    }

    fn move_window(&self) -> Duration {
        SMB_MOVE_WINDOW
    }
}

/// WebDAV: paths can be percent-encoded differently between listings,
/// so identity hashes the path instead of embedding it
pub struct WebDavHandler;

#[async_trait]
impl ProtocolHandler for WebDavHandler {
    fn protocol(&self) -> &'static str {
        "webdav"
    }

    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String {
        let digest = md5::compute(path.as_bytes());
        format!("webdav:{digest:x}:{size}:{is_dir}")
    }

    fn move_window(&self) -> Duration {
        WEBDAV_MOVE_WINDOW
    }
}

/// FTP: slowest listings, widest window
pub struct FtpHandler;

#[async_trait]
impl ProtocolHandler for FtpHandler {
    fn protocol(&self) -> &'static str {
        "ftp"
    }

    fn file_identifier(&self, path: &str, size: i64, is_dir: bool) -> String {
        format!("ftp:{path}:{size}:{is_dir}")
    }

    fn move_window(&self) -> Duration {
        FTP_MOVE_WINDOW
    }
}

/// Maps a protocol tag (lowercased) to its handler
pub struct HandlerFactory {
    handlers: HashMap<&'static str, Arc<dyn ProtocolHandler>>,
}

impl HandlerFactory {
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn ProtocolHandler>> = HashMap::new();
        handlers.insert("local", Arc::new(LocalHandler));
        handlers.insert("nfs", Arc::new(NfsHandler));
        handlers.insert("smb", Arc::new(SmbHandler));
        handlers.insert("webdav", Arc::new(WebDavHandler));
        handlers.insert("ftp", Arc::new(FtpHandler));
        Self { handlers }
    }

    /// Resolve a handler; unknown tags fail with `Invalid`
    pub fn handler_for(&self, protocol: &str) -> Result<Arc<dyn ProtocolHandler>> {
        let tag = protocol.to_lowercase();
        self.handlers
            .get(tag.as_str())
            .cloned()
            .ok_or_else(|| Error::Invalid(format!("Unsupported protocol: {protocol}")))
    }

    /// Capabilities for a protocol tag
    pub fn capabilities(&self, protocol: &str) -> Result<ProtocolCapabilities> {
        Ok(self.handler_for(protocol)?.capabilities())
    }

    /// Registered protocol tags
    #[must_use]
    pub fn protocols(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    /// In-memory filesystem fake; paths are /-separated strings
    #[derive(Default)]
    pub(crate) struct FakeFileSystem {
        pub files: Mutex<BTreeSet<String>>,
        pub dirs: Mutex<BTreeSet<String>>,
        /// Copies targeting this destination fail with `Transient`
        pub fail_copy_to: Mutex<Option<String>>,
    }

    impl FakeFileSystem {
        pub fn with_files(files: &[&str], dirs: &[&str]) -> Self {
            let fs = Self::default();
            for f in files {
                fs.files.lock().insert((*f).to_string());
            }
            for d in dirs {
                fs.dirs.lock().insert((*d).to_string());
            }
            fs
        }

        fn direct_children(&self, path: &str) -> Vec<DirEntry> {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let mut entries = Vec::new();
            for dir in self.dirs.lock().iter() {
                if let Some(rest) = dir.strip_prefix(&prefix) {
                    if !rest.is_empty() && !rest.contains('/') {
                        entries.push(DirEntry {
                            name: rest.to_string(),
                            is_dir: true,
                            size: 0,
                            mtime: None,
                        });
                    }
                }
            }
            for file in self.files.lock().iter() {
                if let Some(rest) = file.strip_prefix(&prefix) {
                    if !rest.is_empty() && !rest.contains('/') {
                        entries.push(DirEntry {
                            name: rest.to_string(),
                            is_dir: false,
                            size: 1,
                            mtime: None,
                        });
                    }
                }
            }
            entries
        }
    }

    #[async_trait]
    impl FileSystemClient for FakeFileSystem {
        async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
            if !self.dirs.lock().contains(path) {
                return Err(Error::NotFound(format!("No such directory: {path}")));
            }
            Ok(self.direct_children(path))
        }

        async fn file_exists(&self, path: &str) -> Result<bool> {
            Ok(self.files.lock().contains(path) || self.dirs.lock().contains(path))
        }

        async fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
            if self.fail_copy_to.lock().as_deref() == Some(dst) {
                return Err(Error::Transient(format!("Copy to {dst} timed out")));
            }
            if !self.files.lock().contains(src) {
                return Err(Error::NotFound(format!("No such file: {src}")));
            }
            self.files.lock().insert(dst.to_string());
            Ok(())
        }

        async fn delete_file(&self, path: &str) -> Result<()> {
            if !self.files.lock().remove(path) {
                return Err(Error::NotFound(format!("No such file: {path}")));
            }
            Ok(())
        }

        async fn create_directory(&self, path: &str) -> Result<()> {
            self.dirs.lock().insert(path.to_string());
            Ok(())
        }

        async fn delete_directory(&self, path: &str) -> Result<()> {
            if !self.dirs.lock().remove(path) {
                return Err(Error::NotFound(format!("No such directory: {path}")));
            }
            Ok(())
        }
    }

    // ========== Capabilities ==========

    #[test]
    fn test_local_capabilities() {
        let factory = HandlerFactory::new();
        let caps = factory.capabilities("local").unwrap();
        assert!(caps.supports_real_time_notification);
        assert_eq!(caps.move_window, Duration::from_secs(2));
        assert!(caps.supports_atomic_move);
        assert!(!caps.requires_polling);
    }

    #[test]
    fn test_ftp_capabilities() {
        let factory = HandlerFactory::new();
        let caps = factory.capabilities("ftp").unwrap();
        assert!(!caps.supports_real_time_notification);
        assert_eq!(caps.move_window, Duration::from_secs(30));
        assert!(!caps.supports_atomic_move);
        assert!(caps.requires_polling);
    }

    #[test]
    fn test_unknown_protocol_is_invalid() {
        let factory = HandlerFactory::new();
        let err = factory.capabilities("sftp").unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn test_factory_lowercases_tags() {
        let factory = HandlerFactory::new();
        assert!(factory.handler_for("SMB").is_ok());
        assert!(factory.handler_for("WebDAV").is_ok());
    }

    #[test]
    fn test_move_windows_per_protocol() {
        let factory = HandlerFactory::new();
        for (tag, secs) in [("local", 2), ("nfs", 5), ("smb", 10), ("webdav", 15), ("ftp", 30)] {
            let handler = factory.handler_for(tag).unwrap();
            assert_eq!(handler.move_window(), Duration::from_secs(secs), "{tag}");
        }
    }

    // ========== Identity ==========

    #[test]
    fn test_identifiers_are_deterministic_and_prefixed() {
        let factory = HandlerFactory::new();
        for tag in ["local", "nfs", "smb", "webdav", "ftp"] {
            let handler = factory.handler_for(tag).unwrap();
            let a = handler.file_identifier("/media/file.mkv", 1024, false);
            let b = handler.file_identifier("/media/file.mkv", 1024, false);
            assert_eq!(a, b, "{tag}");
            assert!(a.starts_with(&format!("{tag}:")), "{tag}: {a}");
        }
    }

    #[test]
    fn test_identifiers_never_collide_across_protocols() {
        let factory = HandlerFactory::new();
        let mut seen = BTreeSet::new();
        for tag in ["local", "nfs", "smb", "webdav", "ftp"] {
            let handler = factory.handler_for(tag).unwrap();
            assert!(seen.insert(handler.file_identifier("/same/path", 7, false)));
        }
    }

    #[test]
    fn test_webdav_identifier_hashes_path() {
        let handler = WebDavHandler;
        let id = handler.file_identifier("/media/file with spaces.mkv", 10, false);
        assert!(id.starts_with("webdav:"));
        assert!(!id.contains("spaces"));
    }

    // ========== Validate ==========

    #[tokio::test]
    async fn test_validate_rejects_same_path() {
        let fs = FakeFileSystem::default();
        let err = LocalHandler
            .validate_move(&fs, "/a/b", "/a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn test_validate_rejects_existing_destination() {
        let fs = FakeFileSystem::with_files(&["/a/src", "/a/dst"], &[]);
        let err = LocalHandler
            .validate_move(&fs, "/a/src", "/a/dst")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    // ========== Move ==========

    #[tokio::test]
    async fn test_move_file_copies_then_deletes() {
        let fs = FakeFileSystem::with_files(&["/a/src.mkv"], &[]);
        LocalHandler
            .perform_move(&fs, "/a/src.mkv", "/a/dst.mkv", false)
            .await
            .unwrap();
        assert!(!fs.files.lock().contains("/a/src.mkv"));
        assert!(fs.files.lock().contains("/a/dst.mkv"));
    }

    #[tokio::test]
    async fn test_move_directory_recurses() {
        let fs = FakeFileSystem::with_files(
            &["/root/show/ep1.mkv", "/root/show/extras/trailer.mkv"],
            &["/root/show", "/root/show/extras"],
        );
        SmbHandler
            .perform_move(&fs, "/root/show", "/root/moved", true)
            .await
            .unwrap();

        let files = fs.files.lock();
        assert!(files.contains("/root/moved/ep1.mkv"));
        assert!(files.contains("/root/moved/extras/trailer.mkv"));
        assert!(!files.contains("/root/show/ep1.mkv"));
        let dirs = fs.dirs.lock();
        assert!(dirs.contains("/root/moved"));
        assert!(!dirs.contains("/root/show"));
    }

    #[tokio::test]
    async fn test_failed_directory_move_removes_partial_destination() {
        let fs = FakeFileSystem::with_files(
            &["/root/show/ep1.mkv", "/root/show/ep2.mkv"],
            &["/root/show"],
        );
        *fs.fail_copy_to.lock() = Some("/root/moved/ep2.mkv".to_string());

        let err = SmbHandler
            .perform_move(&fs, "/root/show", "/root/moved", true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transient(_)));

        // Source intact, destination cleaned up
        assert!(fs.files.lock().contains("/root/show/ep1.mkv"));
        assert!(fs.files.lock().contains("/root/show/ep2.mkv"));
        assert!(!fs.dirs.lock().contains("/root/moved"));
        assert!(!fs.files.lock().contains("/root/moved/ep1.mkv"));
    }
}
