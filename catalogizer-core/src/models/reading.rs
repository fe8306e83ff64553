//! Reading session models
//!
//! Positions carry a timestamp and a monotonic sync version so devices
//! can be reconciled deterministically; bookmarks and highlights are
//! immutable anchors on top of a position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{MediaItemId, SessionId, UserId};

/// A precise location inside a book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub book_id: MediaItemId,
    pub chapter_id: Option<String>,
    pub page_number: i32,
    pub word_offset: i32,
    pub character_offset: i32,
    /// in [0, 100]
    pub percent_complete: f64,
    /// Format-specific location string (e.g. Kindle location)
    pub location: Option<String>,
    /// EPUB canonical fragment identifier
    pub cfi: Option<String>,
    pub confidence: f64,
    /// Surrounding text, for re-anchoring after reflows
    pub context: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub sync_version: i64,
}

/// Per-session reading preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingSettings {
    pub font_size: Option<i32>,
    pub font_family: Option<String>,
    pub theme: Option<String>,
    pub line_spacing: Option<f64>,
    pub margin: Option<i32>,
}

/// Accumulated statistics for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingStats {
    pub session_time_seconds: i64,
    pub pages_read: i32,
    pub words_read: i64,
    /// words per minute; 0 until session time is non-zero
    pub reading_speed: f64,
    /// whole minutes contributed to the daily goal
    pub daily_progress_minutes: i64,
}

/// A position update lost during sync conflict resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    pub device_id: String,
    pub device_name: String,
    pub discarded_position: ReadingPosition,
    pub winning_device_id: String,
    pub resolved_at: DateTime<Utc>,
}

/// Cross-device synchronization state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending_changes: i32,
    #[serde(default)]
    pub conflict_details: Vec<SyncConflict>,
}

/// An active or historical reading session.
/// Invariant: at most one active session per (user, book, device).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub book_id: MediaItemId,
    pub device_id: String,
    pub device_name: String,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub current_position: ReadingPosition,
    pub reading_settings: ReadingSettings,
    pub reading_stats: ReadingStats,
    pub sync_status: SyncStatus,
    pub is_active: bool,
}

impl ReadingSession {
    /// Fold a position update into the session's statistics
    pub fn accumulate(&mut self, session_time_seconds: i64, pages_read: i32, words_read: i64) {
        self.reading_stats.session_time_seconds += session_time_seconds;
        self.reading_stats.pages_read += pages_read;
        self.reading_stats.words_read += words_read;
        if self.reading_stats.session_time_seconds > 0 {
            let minutes = self.reading_stats.session_time_seconds as f64 / 60.0;
            self.reading_stats.reading_speed = self.reading_stats.words_read as f64 / minutes;
        }
        self.reading_stats.daily_progress_minutes += session_time_seconds / 60;
        self.last_active_at = Utc::now();
    }
}

/// An immutable position anchor with an optional note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: UserId,
    pub book_id: MediaItemId,
    pub position: ReadingPosition,
    pub title: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: bool,
    /// Populated iff `is_public`
    pub share_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An immutable highlighted range with an optional note and color
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub user_id: UserId,
    pub book_id: MediaItemId,
    pub start_position: ReadingPosition,
    pub end_position: ReadingPosition,
    pub highlighted_text: String,
    pub note: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: bool,
    /// Populated iff `is_public`
    pub share_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ReadingSession {
        ReadingSession {
            id: SessionId::new(),
            user_id: UserId::new(),
            book_id: MediaItemId::new(),
            device_id: "dev-1".to_string(),
            device_name: "Reader".to_string(),
            started_at: Utc::now(),
            last_active_at: Utc::now(),
            current_position: ReadingPosition::default(),
            reading_settings: ReadingSettings::default(),
            reading_stats: ReadingStats::default(),
            sync_status: SyncStatus::default(),
            is_active: true,
        }
    }

    #[test]
    fn test_accumulate_computes_reading_speed() {
        let mut s = session();
        // 10 minutes, 2500 words -> 250 wpm
        s.accumulate(600, 20, 2500);
        assert!((s.reading_stats.reading_speed - 250.0).abs() < f64::EPSILON);
        assert_eq!(s.reading_stats.daily_progress_minutes, 10);
    }

    #[test]
    fn test_accumulate_is_cumulative() {
        let mut s = session();
        s.accumulate(60, 2, 200);
        s.accumulate(60, 3, 400);
        assert_eq!(s.reading_stats.session_time_seconds, 120);
        assert_eq!(s.reading_stats.pages_read, 5);
        assert_eq!(s.reading_stats.words_read, 600);
        // 600 words over 2 minutes
        assert!((s.reading_stats.reading_speed - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accumulate_zero_time_leaves_speed_untouched() {
        let mut s = session();
        s.accumulate(0, 0, 0);
        assert!(s.reading_stats.reading_speed.abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_progress_uses_integer_minutes() {
        let mut s = session();
        s.accumulate(59, 1, 100);
        assert_eq!(s.reading_stats.daily_progress_minutes, 0);
        s.accumulate(61, 1, 100);
        assert_eq!(s.reading_stats.daily_progress_minutes, 1);
    }
}
