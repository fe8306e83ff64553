//! Rename detection via delete/create correlation
//!
//! Storage protocols without rename notifications surface a move as a
//! delete followed by a create. The correlator keeps recent deletions and
//! matches a subsequent creation against them inside the protocol's move
//! window: same size and kind, preferring an identical basename when
//! several candidates are pending.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::handler::ProtocolHandler;

/// A correlated rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    pub protocol: String,
    pub old_path: String,
    pub new_path: String,
    pub old_identifier: String,
    pub new_identifier: String,
}

#[derive(Debug, Clone)]
struct PendingDelete {
    path: String,
    identifier: String,
    deleted_at: Instant,
}

/// Tracks deletions per protocol handler and correlates creations
pub struct MoveCorrelator {
    handler: Arc<dyn ProtocolHandler>,
    /// correlation key (size + kind) -> pending deletions, oldest first
    pending: DashMap<String, Vec<PendingDelete>>,
}

impl MoveCorrelator {
    #[must_use]
    pub fn new(handler: Arc<dyn ProtocolHandler>) -> Self {
        Self {
            handler,
            pending: DashMap::new(),
        }
    }

    /// The window inside which a create can still match
    #[must_use]
    pub fn window(&self) -> Duration {
        self.handler.move_window()
    }

    fn correlation_key(&self, size: i64, is_dir: bool) -> String {
        format!("{}:{}:{}", self.handler.protocol(), size, is_dir)
    }

    /// Record a deletion as a rename candidate
    pub fn record_delete(&self, path: &str, size: i64, is_dir: bool) {
        let entry = PendingDelete {
            path: path.to_string(),
            identifier: self.handler.file_identifier(path, size, is_dir),
            deleted_at: Instant::now(),
        };
        self.pending
            .entry(self.correlation_key(size, is_dir))
            .or_default()
            .push(entry);
    }

    /// Try to correlate a creation with a pending deletion.
    /// Returns the rename when one matches inside the move window.
    pub fn record_create(&self, path: &str, size: i64, is_dir: bool) -> Option<RenameEvent> {
        let window = self.window();
        let key = self.correlation_key(size, is_dir);
        let mut slot = self.pending.get_mut(&key)?;

        slot.retain(|p| p.deleted_at.elapsed() <= window);
        if slot.is_empty() {
            drop(slot);
            self.pending.remove(&key);
            return None;
        }

        let new_name = basename(path);
        let index = slot
            .iter()
            .position(|p| basename(&p.path) == new_name)
            .unwrap_or(0);
        let matched = slot.remove(index);
        let empty = slot.is_empty();
        drop(slot);
        if empty {
            self.pending.remove(&key);
        }

        let event = RenameEvent {
            protocol: self.handler.protocol().to_string(),
            old_path: matched.path,
            new_path: path.to_string(),
            old_identifier: matched.identifier,
            new_identifier: self.handler.file_identifier(path, size, is_dir),
        };
        tracing::debug!(
            protocol = %event.protocol,
            old_path = %event.old_path,
            new_path = %event.new_path,
            window = %humantime::format_duration(window),
            "Correlated delete/create pair as rename"
        );
        Some(event)
    }

    /// Drop deletions whose window has passed; call periodically from the
    /// polling loop so unmatched deletes do not accumulate
    pub fn prune_expired(&self) -> usize {
        let window = self.window();
        let mut pruned = 0;
        self.pending.retain(|_, slot| {
            let before = slot.len();
            slot.retain(|p| p.deleted_at.elapsed() <= window);
            pruned += before - slot.len();
            !slot.is_empty()
        });
        pruned
    }

    /// Number of deletions currently waiting for a match
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.iter().map(|slot| slot.len()).sum()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::handler::{FtpHandler, LocalHandler};

    fn correlator() -> MoveCorrelator {
        MoveCorrelator::new(Arc::new(FtpHandler))
    }

    // ========== Correlation ==========

    #[test]
    fn test_delete_then_create_is_a_rename() {
        let c = correlator();
        c.record_delete("/media/old/file.mkv", 1024, false);

        let event = c.record_create("/media/new/file.mkv", 1024, false).unwrap();
        assert_eq!(event.old_path, "/media/old/file.mkv");
        assert_eq!(event.new_path, "/media/new/file.mkv");
        assert!(event.old_identifier.starts_with("ftp:"));
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn test_create_without_delete_is_not_a_rename() {
        let c = correlator();
        assert!(c.record_create("/media/file.mkv", 1024, false).is_none());
    }

    #[test]
    fn test_size_mismatch_does_not_correlate() {
        let c = correlator();
        c.record_delete("/media/file.mkv", 1024, false);
        assert!(c.record_create("/media/file.mkv", 2048, false).is_none());
        assert_eq!(c.pending_count(), 1);
    }

    #[test]
    fn test_kind_mismatch_does_not_correlate() {
        let c = correlator();
        c.record_delete("/media/thing", 0, true);
        assert!(c.record_create("/media/thing", 0, false).is_none());
    }

    #[test]
    fn test_same_basename_preferred_among_candidates() {
        let c = correlator();
        c.record_delete("/a/one.mkv", 1024, false);
        c.record_delete("/a/two.mkv", 1024, false);

        let event = c.record_create("/b/two.mkv", 1024, false).unwrap();
        assert_eq!(event.old_path, "/a/two.mkv");
        assert_eq!(c.pending_count(), 1);
    }

    #[test]
    fn test_falls_back_to_oldest_candidate() {
        let c = correlator();
        c.record_delete("/a/one.mkv", 1024, false);
        c.record_delete("/a/two.mkv", 1024, false);

        let event = c.record_create("/b/renamed.mkv", 1024, false).unwrap();
        assert_eq!(event.old_path, "/a/one.mkv");
    }

    // ========== Window ==========

    #[test]
    fn test_window_comes_from_handler() {
        let local = MoveCorrelator::new(Arc::new(LocalHandler));
        assert_eq!(local.window(), Duration::from_secs(2));
        assert_eq!(correlator().window(), Duration::from_secs(30));
    }

    #[test]
    fn test_prune_keeps_fresh_entries() {
        let c = correlator();
        c.record_delete("/a/one.mkv", 1024, false);
        assert_eq!(c.prune_expired(), 0);
        assert_eq!(c.pending_count(), 1);
    }
}
