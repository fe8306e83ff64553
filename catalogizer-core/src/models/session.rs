//! Music playback session model
//!
//! A session is persisted as one opaque serialized blob keyed by session
//! ID and versioned by a monotonic counter. Queue semantics (shuffle,
//! repeat, next/previous) live here so they stay pure and deterministic;
//! the engine layers persistence and retry on top.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::id::{MediaItemId, SessionId, UserId};

/// Sessions expire this long after their last mutation
pub const SESSION_TTL_HOURS: i64 = 24;

/// Seeking to the previous track restarts the current one past this point
const PREVIOUS_RESTART_THRESHOLD_MS: i64 = 3000;

/// What the queue was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    Track,
    Album,
    Artist,
    Playlist,
    Folder,
    Genre,
    Queue,
}

/// Repeat behavior at queue boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off,
    One,
    All,
    Random,
}

/// A queue entry, denormalized so playback never re-reads the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTrack {
    pub media_item_id: MediaItemId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: i64,
    pub file_path: Option<String>,
}

/// Crossfade settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Crossfade {
    pub enabled: bool,
    pub duration_ms: i64,
}

/// Equalizer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Equalizer {
    pub preset: String,
    #[serde(default)]
    pub bands: HashMap<String, f64>,
}

/// Originating device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    pub platform: Option<String>,
}

/// Outcome of a queue-advance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to (or restarted at) `queue_index`
    Moved,
    /// `repeat = off` and the queue end was reached; playback stops
    EndOfQueue,
}

/// Cross-device music playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub queue: Vec<QueueTrack>,
    /// Valid iff queue is non-empty: 0 <= queue_index < queue.len()
    pub queue_index: usize,
    pub play_mode: PlayMode,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    /// Indices visited while `repeat_mode = random`, newest last
    pub shuffle_history: Vec<usize>,
    /// in [0, 1]
    pub volume: f64,
    /// in [0, duration_ms] of the current track
    pub position_ms: i64,
    pub duration_ms: i64,
    pub is_playing: bool,
    pub crossfade: Crossfade,
    pub equalizer: Equalizer,
    pub device_info: DeviceInfo,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Monotonic counter for cross-device ordering and optimistic writes
    pub sync_version: i64,
}

impl PlaybackSession {
    /// New session positioned at the first queue entry
    #[must_use]
    pub fn new(
        user_id: UserId,
        play_mode: PlayMode,
        queue: Vec<QueueTrack>,
        device_info: DeviceInfo,
    ) -> Self {
        let duration_ms = queue.first().map_or(0, |t| t.duration_ms);
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            queue,
            queue_index: 0,
            play_mode,
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            shuffle_history: Vec::new(),
            volume: 1.0,
            position_ms: 0,
            duration_ms,
            is_playing: true,
            crossfade: Crossfade::default(),
            equalizer: Equalizer::default(),
            device_info,
            last_activity: now,
            expires_at: now + Duration::hours(SESSION_TTL_HOURS),
            sync_version: 0,
        }
    }

    /// Current track, if the queue is non-empty
    #[must_use]
    pub fn current_track(&self) -> Option<&QueueTrack> {
        self.queue.get(self.queue_index)
    }

    /// Bump activity/version and refresh the TTL; every mutation ends here
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
        self.expires_at = self.last_activity + Duration::hours(SESSION_TTL_HOURS);
        self.sync_version += 1;
    }

    /// Land on `index`: reset position and adopt the track's duration
    fn land_on(&mut self, index: usize) {
        self.queue_index = index;
        self.position_ms = 0;
        self.duration_ms = self.queue.get(index).map_or(0, |t| t.duration_ms);
    }

    /// Advance per repeat mode
    pub fn next(&mut self) -> AdvanceOutcome {
        if self.queue.is_empty() {
            return AdvanceOutcome::EndOfQueue;
        }
        let outcome = match self.repeat_mode {
            RepeatMode::One => {
                self.land_on(self.queue_index);
                AdvanceOutcome::Moved
            }
            RepeatMode::All => {
                self.land_on((self.queue_index + 1) % self.queue.len());
                AdvanceOutcome::Moved
            }
            RepeatMode::Off => {
                if self.queue_index + 1 < self.queue.len() {
                    self.land_on(self.queue_index + 1);
                    AdvanceOutcome::Moved
                } else {
                    self.is_playing = false;
                    self.position_ms = 0;
                    AdvanceOutcome::EndOfQueue
                }
            }
            RepeatMode::Random => {
                self.land_on(self.pick_random_index());
                self.shuffle_history.push(self.queue_index);
                AdvanceOutcome::Moved
            }
        };
        self.touch();
        outcome
    }

    /// Move backwards: restart the current track when more than 3 s in,
    /// otherwise step to the previous index (wrapping only under repeat-all)
    pub fn previous(&mut self) -> AdvanceOutcome {
        if self.queue.is_empty() {
            return AdvanceOutcome::EndOfQueue;
        }
        if self.position_ms > PREVIOUS_RESTART_THRESHOLD_MS {
            self.position_ms = 0;
            self.touch();
            return AdvanceOutcome::Moved;
        }
        let outcome = if self.queue_index > 0 {
            self.land_on(self.queue_index - 1);
            AdvanceOutcome::Moved
        } else if self.repeat_mode == RepeatMode::All {
            self.land_on(self.queue.len() - 1);
            AdvanceOutcome::Moved
        } else {
            self.position_ms = 0;
            AdvanceOutcome::Moved
        };
        self.touch();
        outcome
    }

    /// Clamp-seek within the current track
    pub fn seek(&mut self, position_ms: i64) {
        self.position_ms = position_ms.clamp(0, self.duration_ms);
        self.touch();
    }

    /// Toggle shuffle.
    ///
    /// Enabling retains the current track at index 0 and Fisher-Yates
    /// shuffles the rest. Disabling restores the order stable-sorted by
    /// track ID and repositions the current track at its natural index.
    pub fn set_shuffle(&mut self, enabled: bool) {
        if enabled == self.shuffle_enabled || self.queue.is_empty() {
            self.shuffle_enabled = enabled;
            return;
        }
        if enabled {
            let current = self.queue.remove(self.queue_index);
            self.queue.shuffle(&mut rand::rng());
            self.queue.insert(0, current);
            self.queue_index = 0;
        } else {
            let current_id = self.queue[self.queue_index].media_item_id.clone();
            self.queue
                .sort_by(|a, b| a.media_item_id.as_str().cmp(b.media_item_id.as_str()));
            self.queue_index = self
                .queue
                .iter()
                .position(|t| t.media_item_id == current_id)
                .unwrap_or(0);
        }
        self.shuffle_enabled = enabled;
        self.touch();
    }

    /// Insert a track at `position`, or append when absent/out of range.
    /// The current index shifts right when the insertion lands before it.
    pub fn add_to_queue(&mut self, track: QueueTrack, position: Option<usize>) {
        match position {
            Some(pos) if pos <= self.queue.len() => {
                if pos <= self.queue_index && !self.queue.is_empty() {
                    self.queue_index += 1;
                }
                self.queue.insert(pos, track);
            }
            _ => self.queue.push(track),
        }
        if self.queue.len() == 1 {
            self.duration_ms = self.queue[0].duration_ms;
        }
        self.touch();
    }

    /// Random index, avoiding the current track and recent history where
    /// the queue allows it
    fn pick_random_index(&self) -> usize {
        use rand::RngExt;
        if self.queue.len() < 2 {
            return 0;
        }
        let recent: Vec<usize> = self
            .shuffle_history
            .iter()
            .rev()
            .take(self.queue.len() / 2)
            .copied()
            .collect();
        let mut rng = rand::rng();
        for _ in 0..8 {
            let candidate = rng.random_range(0..self.queue.len());
            if candidate != self.queue_index && !recent.contains(&candidate) {
                return candidate;
            }
        }
        // Degenerate histories fall back to any non-current index
        (self.queue_index + 1 + rng.random_range(0..self.queue.len() - 1)) % self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, duration_ms: i64) -> QueueTrack {
        QueueTrack {
            media_item_id: MediaItemId::from_string(id.to_string()),
            title: format!("Track {id}"),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            duration_ms,
            file_path: None,
        }
    }

    fn session_with_tracks(n: usize) -> PlaybackSession {
        let queue = (0..n).map(|i| track(&format!("t{i:03}"), 180_000)).collect();
        PlaybackSession::new(
            UserId::new(),
            PlayMode::Album,
            queue,
            DeviceInfo::default(),
        )
    }

    // ========== Next / Previous ==========

    #[test]
    fn test_next_repeat_all_wraps_to_zero() {
        let mut session = session_with_tracks(3);
        session.repeat_mode = RepeatMode::All;
        session.queue_index = 2;

        assert_eq!(session.next(), AdvanceOutcome::Moved);
        assert_eq!(session.queue_index, 0);
        assert_eq!(session.position_ms, 0);
        assert_eq!(session.duration_ms, session.queue[0].duration_ms);
    }

    #[test]
    fn test_next_repeat_one_stays_put() {
        let mut session = session_with_tracks(3);
        session.repeat_mode = RepeatMode::One;
        session.queue_index = 1;
        session.position_ms = 42_000;

        assert_eq!(session.next(), AdvanceOutcome::Moved);
        assert_eq!(session.queue_index, 1);
        assert_eq!(session.position_ms, 0);
    }

    #[test]
    fn test_next_repeat_off_stops_at_end() {
        let mut session = session_with_tracks(2);
        session.queue_index = 1;

        assert_eq!(session.next(), AdvanceOutcome::EndOfQueue);
        assert_eq!(session.queue_index, 1);
        assert!(!session.is_playing);
    }

    #[test]
    fn test_previous_restarts_past_three_seconds() {
        let mut session = session_with_tracks(3);
        session.queue_index = 2;
        session.position_ms = 5_000;

        assert_eq!(session.previous(), AdvanceOutcome::Moved);
        assert_eq!(session.queue_index, 2);
        assert_eq!(session.position_ms, 0);
    }

    #[test]
    fn test_previous_steps_back_under_three_seconds() {
        let mut session = session_with_tracks(3);
        session.queue_index = 2;
        session.position_ms = 1_000;

        assert_eq!(session.previous(), AdvanceOutcome::Moved);
        assert_eq!(session.queue_index, 1);
    }

    #[test]
    fn test_previous_wraps_only_under_repeat_all() {
        let mut session = session_with_tracks(3);
        session.queue_index = 0;
        session.previous();
        assert_eq!(session.queue_index, 0);

        session.repeat_mode = RepeatMode::All;
        session.previous();
        assert_eq!(session.queue_index, 2);
    }

    // ========== Shuffle ==========

    #[test]
    fn test_shuffle_keeps_current_track_first() {
        let mut session = session_with_tracks(20);
        session.queue_index = 7;
        let current = session.queue[7].media_item_id.clone();

        session.set_shuffle(true);
        assert_eq!(session.queue_index, 0);
        assert_eq!(session.queue[0].media_item_id, current);
        assert_eq!(session.queue.len(), 20);
    }

    #[test]
    fn test_shuffle_unshuffle_round_trip() {
        let mut session = session_with_tracks(20);
        session.queue_index = 7;
        let current = session.queue[7].media_item_id.clone();
        let mut expected: Vec<String> = session
            .queue
            .iter()
            .map(|t| t.media_item_id.as_str().to_string())
            .collect();
        expected.sort();

        session.set_shuffle(true);
        session.set_shuffle(false);

        let restored: Vec<String> = session
            .queue
            .iter()
            .map(|t| t.media_item_id.as_str().to_string())
            .collect();
        assert_eq!(restored, expected);
        assert_eq!(session.current_track().unwrap().media_item_id, current);
    }

    #[test]
    fn test_shuffle_noop_when_already_in_state() {
        let mut session = session_with_tracks(5);
        let version = session.sync_version;
        session.set_shuffle(false);
        assert_eq!(session.sync_version, version);
    }

    // ========== Seek / Queue ==========

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut session = session_with_tracks(1);
        session.seek(999_999_999);
        assert_eq!(session.position_ms, session.duration_ms);
        session.seek(-5);
        assert_eq!(session.position_ms, 0);
    }

    #[test]
    fn test_add_to_queue_appends_and_inserts() {
        let mut session = session_with_tracks(2);
        session.queue_index = 1;

        session.add_to_queue(track("t-append", 60_000), None);
        assert_eq!(session.queue.len(), 3);
        assert_eq!(session.queue[2].media_item_id.as_str(), "t-append");

        session.add_to_queue(track("t-insert", 60_000), Some(0));
        assert_eq!(session.queue[0].media_item_id.as_str(), "t-insert");
        // current track shifted right with the insertion
        assert_eq!(session.queue_index, 2);
    }

    #[test]
    fn test_random_next_avoids_current() {
        let mut session = session_with_tracks(10);
        session.repeat_mode = RepeatMode::Random;
        for _ in 0..50 {
            let before = session.queue_index;
            session.next();
            assert_ne!(session.queue_index, before);
        }
    }

    #[test]
    fn test_touch_refreshes_expiry_and_version() {
        let mut session = session_with_tracks(1);
        let version = session.sync_version;
        let expires = session.expires_at;
        session.touch();
        assert_eq!(session.sync_version, version + 1);
        assert!(session.expires_at >= expires);
    }
}
