//! Music playback session engine
//!
//! Builds queues from the chosen play mode, applies the queue semantics
//! that live on `PlaybackSession`, and persists every mutation as an
//! opaque blob with an optimistic version check. Conflicting writes are
//! retried with jittered backoff. Play-count increments run as detached
//! fire-and-forget tasks with their own timeout so a cancelled request
//! never leaves half-written side tables.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::models::{
    DeviceInfo, MediaItem, MediaItemId, PlayMode, PlaybackSession, PlaylistId, QueueTrack,
    RepeatMode, SessionId, StorageRootId, UserId,
};
use crate::repository::{FileRepository, MediaRepository, PlaylistRepository, SessionRepository};
use crate::{Error, Result};

/// Artist queues are capped at the top 100 tracks by play count
const ARTIST_QUEUE_LIMIT: i64 = 100;

/// Background play-count writes get this long before being dropped
const PLAY_COUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// Music playback session engine
#[derive(Clone)]
pub struct MusicSessionEngine {
    session_repo: SessionRepository,
    media_repo: MediaRepository,
    playlist_repo: PlaylistRepository,
    file_repo: FileRepository,
}

impl std::fmt::Debug for MusicSessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicSessionEngine").finish()
    }
}

impl MusicSessionEngine {
    #[must_use]
    pub const fn new(
        session_repo: SessionRepository,
        media_repo: MediaRepository,
        playlist_repo: PlaylistRepository,
        file_repo: FileRepository,
    ) -> Self {
        Self {
            session_repo,
            media_repo,
            playlist_repo,
            file_repo,
        }
    }

    // ========== Session construction ==========

    /// Start a session playing a single track
    pub async fn play_track(
        &self,
        user_id: UserId,
        track_id: &MediaItemId,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let track = self.require_item(track_id).await?;
        let queue = vec![to_queue_track(&track, None, None)];
        self.start_session(user_id, PlayMode::Track, queue, device, track_id)
            .await
    }

    /// Start a session over an album's tracks in track order
    pub async fn play_album(
        &self,
        user_id: UserId,
        album_id: &MediaItemId,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let album = self.require_item(album_id).await?;
        let tracks = self.media_repo.get_album_tracks(album_id).await?;
        if tracks.is_empty() {
            return Err(Error::NotFound(format!("Album {album_id} has no tracks")));
        }
        let queue = tracks
            .iter()
            .map(|t| to_queue_track(t, Some(album.title.as_str()), None))
            .collect();
        self.start_session(user_id, PlayMode::Album, queue, device, album_id)
            .await
    }

    /// Start a session over an artist's top tracks by play count
    pub async fn play_artist(
        &self,
        user_id: UserId,
        artist_id: &MediaItemId,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let artist = self.require_item(artist_id).await?;
        let tracks = self
            .media_repo
            .get_artist_top_tracks(artist_id, ARTIST_QUEUE_LIMIT)
            .await?;
        if tracks.is_empty() {
            return Err(Error::NotFound(format!("Artist {artist_id} has no tracks")));
        }
        let queue = tracks
            .iter()
            .map(|t| to_queue_track(t, None, Some(artist.title.as_str())))
            .collect();
        self.start_session(user_id, PlayMode::Artist, queue, device, artist_id)
            .await
    }

    /// Start a session over a playlist's items in playlist order
    pub async fn play_playlist(
        &self,
        user_id: UserId,
        playlist_id: &PlaylistId,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let items = self.playlist_repo.get_items(playlist_id).await?;
        if items.is_empty() {
            return Err(Error::NotFound(format!(
                "Playlist {playlist_id} has no items"
            )));
        }
        let mut queue = Vec::with_capacity(items.len());
        for item in &items {
            let track = self.require_item(&item.media_item_id).await?;
            queue.push(to_queue_track(&track, None, None));
        }
        let first = queue[0].media_item_id.clone();
        self.start_session(user_id, PlayMode::Playlist, queue, device, &first)
            .await
    }

    /// Start a session over the audio files under a directory prefix
    pub async fn play_folder(
        &self,
        user_id: UserId,
        storage_root_id: &StorageRootId,
        path_prefix: &str,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let files = self
            .file_repo
            .get_by_path_prefix(storage_root_id, path_prefix)
            .await?;
        // Folder playback resolves tracks through their file links
        let mut queue = Vec::new();
        for file in files {
            if let Some(item) = self.media_repo.get_item_for_file(&file.id).await? {
                let mut track = to_queue_track(&item, None, None);
                track.file_path = Some(file.path.clone());
                queue.push(track);
            }
        }
        if queue.is_empty() {
            return Err(Error::NotFound(format!(
                "No playable tracks under {path_prefix}"
            )));
        }
        let first = queue[0].media_item_id.clone();
        self.start_session(user_id, PlayMode::Folder, queue, device, &first)
            .await
    }

    /// Start a session over a genre's tracks
    pub async fn play_genre(
        &self,
        user_id: UserId,
        genre: &str,
        device: DeviceInfo,
    ) -> Result<PlaybackSession> {
        let tracks = self
            .media_repo
            .get_genre_tracks(genre, ARTIST_QUEUE_LIMIT)
            .await?;
        if tracks.is_empty() {
            return Err(Error::NotFound(format!("No tracks in genre {genre}")));
        }
        let queue: Vec<QueueTrack> = tracks
            .iter()
            .map(|t| to_queue_track(t, None, None))
            .collect();
        let first = queue[0].media_item_id.clone();
        self.start_session(user_id, PlayMode::Genre, queue, device, &first)
            .await
    }

    async fn start_session(
        &self,
        user_id: UserId,
        play_mode: PlayMode,
        queue: Vec<QueueTrack>,
        device: DeviceInfo,
        source_id: &MediaItemId,
    ) -> Result<PlaybackSession> {
        let session = PlaybackSession::new(user_id, play_mode, queue, device);
        self.session_repo.upsert(&session).await?;
        if let Some(track) = session.current_track() {
            self.spawn_play_count(track.media_item_id.clone());
        }
        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            play_mode = ?play_mode,
            source = %source_id,
            queue_len = session.queue.len(),
            "Playback session started"
        );
        Ok(session)
    }

    // ========== Session mutations ==========

    /// Advance to the next track per the repeat mode
    pub async fn next(&self, session_id: &SessionId) -> Result<PlaybackSession> {
        let session = self
            .mutate(session_id, |s| {
                s.next();
            })
            .await?;
        if session.is_playing {
            if let Some(track) = session.current_track() {
                self.spawn_play_count(track.media_item_id.clone());
            }
        }
        Ok(session)
    }

    /// Restart or step back per the 3-second rule
    pub async fn previous(&self, session_id: &SessionId) -> Result<PlaybackSession> {
        self.mutate(session_id, |s| {
            s.previous();
        })
        .await
    }

    /// Clamp-seek within the current track
    pub async fn seek(&self, session_id: &SessionId, position_ms: i64) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| s.seek(position_ms)).await
    }

    /// Toggle shuffle (current track pinned; unshuffle restores order)
    pub async fn set_shuffle(
        &self,
        session_id: &SessionId,
        enabled: bool,
    ) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| s.set_shuffle(enabled)).await
    }

    /// Change the repeat mode
    pub async fn set_repeat(
        &self,
        session_id: &SessionId,
        mode: RepeatMode,
    ) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| {
            s.repeat_mode = mode;
            s.touch();
        })
        .await
    }

    /// Insert or append a track to the queue
    pub async fn add_to_queue(
        &self,
        session_id: &SessionId,
        track_id: &MediaItemId,
        position: Option<usize>,
    ) -> Result<PlaybackSession> {
        let item = self.require_item(track_id).await?;
        let track = to_queue_track(&item, None, None);
        self.mutate(session_id, move |s| {
            s.add_to_queue(track.clone(), position);
        })
        .await
    }

    /// Pause or resume
    pub async fn set_playing(
        &self,
        session_id: &SessionId,
        playing: bool,
    ) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| {
            s.is_playing = playing;
            s.touch();
        })
        .await
    }

    /// Set the volume, clamped to [0, 1]
    pub async fn set_volume(&self, session_id: &SessionId, volume: f64) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| {
            s.volume = volume.clamp(0.0, 1.0);
            s.touch();
        })
        .await
    }

    /// Update crossfade settings
    pub async fn set_crossfade(
        &self,
        session_id: &SessionId,
        crossfade: crate::models::Crossfade,
    ) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| {
            s.crossfade = crossfade;
            s.touch();
        })
        .await
    }

    /// Update equalizer settings
    pub async fn set_equalizer(
        &self,
        session_id: &SessionId,
        equalizer: crate::models::Equalizer,
    ) -> Result<PlaybackSession> {
        self.mutate(session_id, move |s| {
            s.equalizer = equalizer.clone();
            s.touch();
        })
        .await
    }

    /// Load a session by ID
    pub async fn get_session(&self, session_id: &SessionId) -> Result<PlaybackSession> {
        self.session_repo
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} not found or expired")))
    }

    /// The user's most recent live session, for cross-device resume
    pub async fn resume(&self, user_id: &UserId) -> Result<Option<PlaybackSession>> {
        self.session_repo.get_latest_for_user(user_id).await
    }

    /// Read-modify-write with an optimistic version check; conflicting
    /// writers re-read and retry with jittered backoff
    async fn mutate<F>(&self, session_id: &SessionId, apply: F) -> Result<PlaybackSession>
    where
        F: Fn(&mut PlaybackSession) + Send + Sync,
    {
        let attempt = || async {
            let mut session = self.get_session(session_id).await?;
            let expected = session.sync_version;
            apply(&mut session);
            self.session_repo.update_checked(&session, expected).await?;
            Ok::<_, Error>(session)
        };

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|err: &Error| matches!(err, Error::Conflict(_)))
            .await
    }

    /// Fire-and-forget play-count increment with a detached timeout
    fn spawn_play_count(&self, media_item_id: MediaItemId) {
        let repo = self.media_repo.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(
                PLAY_COUNT_TIMEOUT,
                repo.increment_play_count(&media_item_id),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(media_item = %media_item_id, error = %err, "Play count update failed");
                }
                Err(_) => {
                    tracing::warn!(media_item = %media_item_id, "Play count update timed out");
                }
            }
        });
    }

    async fn require_item(&self, id: &MediaItemId) -> Result<MediaItem> {
        self.media_repo
            .get_item(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Media item {id} not found")))
    }
}

/// Denormalize a catalog item into a queue entry. `runtime` is seconds
/// for audio tracks.
fn to_queue_track(item: &MediaItem, album: Option<&str>, artist: Option<&str>) -> QueueTrack {
    QueueTrack {
        media_item_id: item.id.clone(),
        title: item.title.clone(),
        artist: artist.map(str::to_string),
        album: album.map(str::to_string),
        duration_ms: i64::from(item.runtime.unwrap_or(0)) * 1000,
        file_path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdvanceOutcome;

    fn item(id: &str, title: &str, runtime: Option<i32>) -> MediaItem {
        MediaItem {
            id: MediaItemId::from_string(id.to_string()),
            media_type_id: 1,
            title: title.to_string(),
            original_title: None,
            year: None,
            description: None,
            genre: None,
            director: None,
            cast_crew: None,
            rating: None,
            runtime,
            language: None,
            country: None,
            status: "detected".to_string(),
            parent_id: None,
            season_number: None,
            episode_number: None,
            track_number: Some(1),
            first_detected: chrono::Utc::now(),
            last_updated: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_queue_track_duration_conversion() {
        let track = to_queue_track(&item("t1", "Speak to Me", Some(203)), Some("DSOTM"), None);
        assert_eq!(track.duration_ms, 203_000);
        assert_eq!(track.album.as_deref(), Some("DSOTM"));
    }

    #[test]
    fn test_queue_track_missing_runtime_is_zero() {
        let track = to_queue_track(&item("t1", "Unknown", None), None, None);
        assert_eq!(track.duration_ms, 0);
    }

    // Scenario: queue of 3, index 2, repeat all -> Next lands on 0
    #[test]
    fn test_next_under_repeat_all_wraps() {
        let queue: Vec<QueueTrack> = (0..3)
            .map(|i| to_queue_track(&item(&format!("t{i}"), &format!("Track {i}"), Some(100 + i)), None, None))
            .collect();
        let mut session = PlaybackSession::new(
            UserId::new(),
            PlayMode::Album,
            queue,
            DeviceInfo::default(),
        );
        session.repeat_mode = RepeatMode::All;
        session.queue_index = 2;

        assert_eq!(session.next(), AdvanceOutcome::Moved);
        assert_eq!(session.queue_index, 0);
        assert_eq!(session.position_ms, 0);
        assert_eq!(session.duration_ms, session.queue[0].duration_ms);
    }

    // ========== Integration (Require DB) ==========

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_play_album_builds_ordered_queue() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_conflicting_mutation_retries() {
        // Integration test placeholder
    }
}
