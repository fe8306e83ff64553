//! Reading session repository
//!
//! Sessions keep their identity columns flat for querying; position,
//! settings, stats and sync state travel as JSONB blobs so a position
//! update stays one atomic write.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{
    models::{
        Bookmark, Highlight, MediaItemId, ReadingPosition, ReadingSession, SessionId, UserId,
    },
    Error, Result,
};

/// Reading session repository
#[derive(Clone)]
pub struct ReadingRepository {
    pool: PgPool,
}

impl ReadingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========== sessions ==========

    /// Insert a new session
    pub async fn create_session(&self, session: &ReadingSession) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reading_sessions
                (id, user_id, book_id, device_id, device_name, started_at, last_active_at,
                 current_position, reading_settings, reading_stats, sync_status, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(session.id.as_str())
        .bind(session.user_id.as_str())
        .bind(session.book_id.as_str())
        .bind(&session.device_id)
        .bind(&session.device_name)
        .bind(session.started_at)
        .bind(session.last_active_at)
        .bind(serde_json::to_value(&session.current_position)?)
        .bind(serde_json::to_value(&session.reading_settings)?)
        .bind(serde_json::to_value(&session.reading_stats)?)
        .bind(serde_json::to_value(&session.sync_status)?)
        .bind(session.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a session's mutable state, guarded by the position's sync
    /// version
    pub async fn update_session_checked(
        &self,
        session: &ReadingSession,
        expected_version: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE reading_sessions
            SET last_active_at = $2, current_position = $3, reading_settings = $4,
                reading_stats = $5, sync_status = $6, is_active = $7
            WHERE id = $1
              AND (current_position ->> 'sync_version')::BIGINT = $8
            ",
        )
        .bind(session.id.as_str())
        .bind(session.last_active_at)
        .bind(serde_json::to_value(&session.current_position)?)
        .bind(serde_json::to_value(&session.reading_settings)?)
        .bind(serde_json::to_value(&session.reading_stats)?)
        .bind(serde_json::to_value(&session.sync_status)?)
        .bind(session.is_active)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "Reading session {} changed concurrently (expected version {expected_version})",
                session.id
            )));
        }
        Ok(())
    }

    /// Load one session
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<ReadingSession>> {
        let row = sqlx::query(
            "SELECT id, user_id, book_id, device_id, device_name, started_at, last_active_at, \
             current_position, reading_settings, reading_stats, sync_status, is_active \
             FROM reading_sessions WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| session_from_row(&r)).transpose()
    }

    /// The active session for one device, if any
    pub async fn get_active_session(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
        device_id: &str,
    ) -> Result<Option<ReadingSession>> {
        let row = sqlx::query(
            "SELECT id, user_id, book_id, device_id, device_name, started_at, last_active_at, \
             current_position, reading_settings, reading_stats, sync_status, is_active \
             FROM reading_sessions \
             WHERE user_id = $1 AND book_id = $2 AND device_id = $3 AND is_active = TRUE",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| session_from_row(&r)).transpose()
    }

    /// Every active session for a (user, book) across devices
    pub async fn get_active_sessions(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
    ) -> Result<Vec<ReadingSession>> {
        let rows = sqlx::query(
            "SELECT id, user_id, book_id, device_id, device_name, started_at, last_active_at, \
             current_position, reading_settings, reading_stats, sync_status, is_active \
             FROM reading_sessions \
             WHERE user_id = $1 AND book_id = $2 AND is_active = TRUE \
             ORDER BY last_active_at DESC",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    /// Deactivate any prior active session on the same device, preserving
    /// the one-active-per-(user, book, device) invariant
    pub async fn deactivate_device_sessions(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
        device_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE reading_sessions SET is_active = FALSE \
             WHERE user_id = $1 AND book_id = $2 AND device_id = $3 AND is_active = TRUE",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Most recent saved position for a (user, book), for resume
    pub async fn get_latest_position(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
    ) -> Result<Option<ReadingPosition>> {
        let blob: Option<serde_json::Value> = sqlx::query_scalar(
            r"
            SELECT position FROM reading_positions
            WHERE user_id = $1 AND book_id = $2
            ORDER BY recorded_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match blob {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Append a position to the history (reading_history feeds stats)
    pub async fn save_position(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
        position: &ReadingPosition,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reading_positions (user_id, book_id, position, recorded_at)
            VALUES ($1, $2, $3, NOW())
            ",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .bind(serde_json::to_value(position)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========== bookmarks & highlights ==========

    pub async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reading_bookmarks
                (id, user_id, book_id, position, title, note, tags, is_public, share_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&bookmark.id)
        .bind(bookmark.user_id.as_str())
        .bind(bookmark.book_id.as_str())
        .bind(serde_json::to_value(&bookmark.position)?)
        .bind(&bookmark.title)
        .bind(&bookmark.note)
        .bind(serde_json::to_value(&bookmark.tags)?)
        .bind(bookmark.is_public)
        .bind(&bookmark.share_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_bookmarks(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
    ) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query(
            "SELECT id, user_id, book_id, position, title, note, tags, is_public, share_url, \
             created_at FROM reading_bookmarks \
             WHERE user_id = $1 AND book_id = $2 ORDER BY created_at",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(bookmark_from_row).collect()
    }

    pub async fn insert_highlight(&self, highlight: &Highlight) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reading_highlights
                (id, user_id, book_id, start_position, end_position, highlighted_text,
                 note, color, tags, is_public, share_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(&highlight.id)
        .bind(highlight.user_id.as_str())
        .bind(highlight.book_id.as_str())
        .bind(serde_json::to_value(&highlight.start_position)?)
        .bind(serde_json::to_value(&highlight.end_position)?)
        .bind(&highlight.highlighted_text)
        .bind(&highlight.note)
        .bind(&highlight.color)
        .bind(serde_json::to_value(&highlight.tags)?)
        .bind(highlight.is_public)
        .bind(&highlight.share_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_highlights(
        &self,
        user_id: &UserId,
        book_id: &MediaItemId,
    ) -> Result<Vec<Highlight>> {
        let rows = sqlx::query(
            "SELECT id, user_id, book_id, start_position, end_position, highlighted_text, \
             note, color, tags, is_public, share_url, created_at FROM reading_highlights \
             WHERE user_id = $1 AND book_id = $2 ORDER BY created_at",
        )
        .bind(user_id.as_str())
        .bind(book_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(highlight_from_row).collect()
    }

    // ========== daily stats ==========

    /// Fold finished minutes/pages/words into the per-day row
    pub async fn record_daily_progress(
        &self,
        user_id: &UserId,
        minutes: i64,
        pages: i32,
        words: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reading_stats (user_id, day, minutes_read, pages_read, words_read)
            VALUES ($1, CURRENT_DATE, $2, $3, $4)
            ON CONFLICT (user_id, day) DO UPDATE
            SET minutes_read = reading_stats.minutes_read + EXCLUDED.minutes_read,
                pages_read = reading_stats.pages_read + EXCLUDED.pages_read,
                words_read = reading_stats.words_read + EXCLUDED.words_read
            ",
        )
        .bind(user_id.as_str())
        .bind(minutes)
        .bind(pages)
        .bind(words)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn session_from_row(row: &PgRow) -> Result<ReadingSession> {
    Ok(ReadingSession {
        id: SessionId::from_string(row.get("id")),
        user_id: UserId::from_string(row.get("user_id")),
        book_id: MediaItemId::from_string(row.get("book_id")),
        device_id: row.get("device_id"),
        device_name: row.get("device_name"),
        started_at: row.get("started_at"),
        last_active_at: row.get("last_active_at"),
        current_position: serde_json::from_value(row.get("current_position"))?,
        reading_settings: serde_json::from_value(row.get("reading_settings"))?,
        reading_stats: serde_json::from_value(row.get("reading_stats"))?,
        sync_status: serde_json::from_value(row.get("sync_status"))?,
        is_active: row.get("is_active"),
    })
}

fn bookmark_from_row(row: &PgRow) -> Result<Bookmark> {
    Ok(Bookmark {
        id: row.get("id"),
        user_id: UserId::from_string(row.get("user_id")),
        book_id: MediaItemId::from_string(row.get("book_id")),
        position: serde_json::from_value(row.get("position"))?,
        title: row.get("title"),
        note: row.get("note"),
        tags: serde_json::from_value(row.get("tags"))?,
        is_public: row.get("is_public"),
        share_url: row.get("share_url"),
        created_at: row.get("created_at"),
    })
}

fn highlight_from_row(row: &PgRow) -> Result<Highlight> {
    Ok(Highlight {
        id: row.get("id"),
        user_id: UserId::from_string(row.get("user_id")),
        book_id: MediaItemId::from_string(row.get("book_id")),
        start_position: serde_json::from_value(row.get("start_position"))?,
        end_position: serde_json::from_value(row.get("end_position"))?,
        highlighted_text: row.get("highlighted_text"),
        note: row.get("note"),
        color: row.get("color"),
        tags: serde_json::from_value(row.get("tags"))?,
        is_public: row.get("is_public"),
        share_url: row.get("share_url"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_one_active_session_per_device() {
        // Integration test placeholder
    }
}
