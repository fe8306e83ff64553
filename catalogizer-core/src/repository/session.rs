//! Music playback session store
//!
//! Sessions are opaque serialized blobs keyed by session ID with a
//! 24-hour TTL refreshed on every mutation. Writes carry an optimistic
//! check on the blob's monotonic `sync_version`; a mismatch surfaces as
//! `Conflict` and the engine re-reads and retries.

use sqlx::PgPool;

use crate::{
    models::{PlaybackSession, SessionId, UserId, SESSION_TTL_HOURS},
    Error, Result,
};

/// Music playback session repository
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or unconditionally replace a session blob, refreshing the TTL
    pub async fn upsert(&self, session: &PlaybackSession) -> Result<()> {
        let blob = serde_json::to_value(session)?;
        sqlx::query(&format!(
            r"
            INSERT INTO music_playback_sessions (id, user_id, session_data, expires_at, updated_at)
            VALUES ($1, $2, $3, NOW() + INTERVAL '{SESSION_TTL_HOURS} hours', NOW())
            ON CONFLICT (id) DO UPDATE
            SET session_data = EXCLUDED.session_data,
                expires_at = NOW() + INTERVAL '{SESSION_TTL_HOURS} hours',
                updated_at = NOW()
            "
        ))
        .bind(session.id.as_str())
        .bind(session.user_id.as_str())
        .bind(blob)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a session blob only if the stored version still matches
    /// `expected_version`. Refreshes the TTL on success.
    pub async fn update_checked(
        &self,
        session: &PlaybackSession,
        expected_version: i64,
    ) -> Result<()> {
        let blob = serde_json::to_value(session)?;
        let result = sqlx::query(&format!(
            r"
            UPDATE music_playback_sessions
            SET session_data = $2,
                expires_at = NOW() + INTERVAL '{SESSION_TTL_HOURS} hours',
                updated_at = NOW()
            WHERE id = $1
              AND (session_data ->> 'sync_version')::BIGINT = $3
            "
        ))
        .bind(session.id.as_str())
        .bind(blob)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!(
                "Session {} changed concurrently (expected version {expected_version})",
                session.id
            )));
        }
        Ok(())
    }

    /// Load a non-expired session
    pub async fn get(&self, id: &SessionId) -> Result<Option<PlaybackSession>> {
        let blob: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT session_data FROM music_playback_sessions \
             WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match blob {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// A user's most recently touched live session (cross-device resume)
    pub async fn get_latest_for_user(&self, user_id: &UserId) -> Result<Option<PlaybackSession>> {
        let blob: Option<serde_json::Value> = sqlx::query_scalar(
            r"
            SELECT session_data FROM music_playback_sessions
            WHERE user_id = $1 AND expires_at > NOW()
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match blob {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Drop a session
    pub async fn delete(&self, id: &SessionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM music_playback_sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Purge expired rows; returns the number removed
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM music_playback_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_update_checked_conflicts_on_stale_version() {
        // Integration test placeholder
    }
}
