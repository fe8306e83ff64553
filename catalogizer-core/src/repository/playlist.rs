//! Playlist repository
//!
//! Playlists, membership rows, tags and collaborators. Position-shifting
//! primitives take an executor so the service layer can compose them
//! inside one transaction; the dense `{1..N}` invariant is enforced
//! there, not here.

use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};

use crate::{
    models::{Playlist, PlaylistId, PlaylistItem, UserId},
    Result,
};

const ITEM_COLUMNS: &str =
    "id, playlist_id, media_item_id, position, added_by, added_at, custom_title, \
     start_time, end_time";

/// Playlist repository
#[derive(Clone)]
pub struct PlaylistRepository {
    pool: PgPool,
}

impl PlaylistRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========== playlists ==========

    /// Get playlist by ID
    pub async fn get_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, description, is_public, is_smart_playlist, \
             smart_criteria, track_count, total_duration, created_at, updated_at \
             FROM playlists WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| playlist_from_row(&r)).transpose()
    }

    /// Lock a playlist row for the duration of the transaction.
    /// Serializes concurrent refreshes of the same playlist.
    pub async fn lock<'e, E: PgExecutor<'e>>(
        &self,
        id: &PlaylistId,
        executor: E,
    ) -> Result<Playlist> {
        let row = sqlx::query(
            "SELECT id, user_id, name, description, is_public, is_smart_playlist, \
             smart_criteria, track_count, total_duration, created_at, updated_at \
             FROM playlists WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_str())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| crate::Error::NotFound("Playlist not found".to_string()))?;
        playlist_from_row(&row)
    }

    /// User's playlists, newest first
    pub async fn get_by_user(&self, user_id: &UserId) -> Result<Vec<Playlist>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, description, is_public, is_smart_playlist, \
             smart_criteria, track_count, total_duration, created_at, updated_at \
             FROM playlists WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(playlist_from_row).collect()
    }

    /// Create a playlist
    pub async fn create(&self, playlist: &Playlist) -> Result<Playlist> {
        let criteria = playlist
            .smart_criteria
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let row = sqlx::query(
            r"
            INSERT INTO playlists (id, user_id, name, description, is_public,
                                   is_smart_playlist, smart_criteria, track_count, total_duration)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0)
            RETURNING id, user_id, name, description, is_public, is_smart_playlist,
                      smart_criteria, track_count, total_duration, created_at, updated_at
            ",
        )
        .bind(playlist.id.as_str())
        .bind(playlist.user_id.as_str())
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.is_public)
        .bind(playlist.is_smart_playlist)
        .bind(criteria)
        .fetch_one(&self.pool)
        .await?;
        playlist_from_row(&row)
    }

    /// Delete a playlist and (by cascade) its items
    pub async fn delete(&self, id: &PlaylistId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Recompute track_count/total_duration from the current items
    pub async fn refresh_stats<'e, E: PgExecutor<'e>>(
        &self,
        id: &PlaylistId,
        executor: E,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE playlists p
            SET track_count = stats.count,
                total_duration = stats.duration,
                updated_at = NOW()
            FROM (
                SELECT COALESCE(COUNT(*), 0)::INT AS count,
                       COALESCE(SUM(COALESCE(m.runtime, 0)), 0)::BIGINT AS duration
                FROM playlist_items i
                LEFT JOIN media_items m ON m.id = i.media_item_id
                WHERE i.playlist_id = $1
            ) AS stats
            WHERE p.id = $1
            ",
        )
        .bind(id.as_str())
        .execute(executor)
        .await?;
        Ok(())
    }

    // ========== playlist_items ==========

    /// Items in position order
    pub async fn get_items(&self, playlist_id: &PlaylistId) -> Result<Vec<PlaylistItem>> {
        let items = sqlx::query_as::<_, PlaylistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM playlist_items \
             WHERE playlist_id = $1 ORDER BY position"
        ))
        .bind(playlist_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// A single item row
    pub async fn get_item(&self, item_id: &str) -> Result<Option<PlaylistItem>> {
        let item = sqlx::query_as::<_, PlaylistItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM playlist_items WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Current max position, 0 for an empty playlist
    pub async fn max_position<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        executor: E,
    ) -> Result<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(position) FROM playlist_items WHERE playlist_id = $1",
        )
        .bind(playlist_id.as_str())
        .fetch_one(executor)
        .await?;
        Ok(max.unwrap_or(0))
    }

    /// Shift positions >= `from_position` by `delta`
    pub async fn shift_from<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        from_position: i32,
        delta: i32,
        executor: E,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE playlist_items SET position = position + $3 \
             WHERE playlist_id = $1 AND position >= $2",
        )
        .bind(playlist_id.as_str())
        .bind(from_position)
        .bind(delta)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Shift positions in `[low, high]` by `delta`
    pub async fn shift_range<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        low: i32,
        high: i32,
        delta: i32,
        executor: E,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE playlist_items SET position = position + $4 \
             WHERE playlist_id = $1 AND position >= $2 AND position <= $3",
        )
        .bind(playlist_id.as_str())
        .bind(low)
        .bind(high)
        .bind(delta)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert one membership row
    pub async fn insert_item<'e, E: PgExecutor<'e>>(
        &self,
        item: &PlaylistItem,
        executor: E,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO playlist_items (id, playlist_id, media_item_id, position,
                                        added_by, custom_title, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&item.id)
        .bind(item.playlist_id.as_str())
        .bind(item.media_item_id.as_str())
        .bind(item.position)
        .bind(item.added_by.as_str())
        .bind(&item.custom_title)
        .bind(item.start_time)
        .bind(item.end_time)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Delete an item, returning its position
    pub async fn delete_item<'e, E: PgExecutor<'e>>(
        &self,
        item_id: &str,
        executor: E,
    ) -> Result<Option<i32>> {
        let position: Option<i32> = sqlx::query_scalar(
            "DELETE FROM playlist_items WHERE id = $1 RETURNING position",
        )
        .bind(item_id)
        .fetch_optional(executor)
        .await?;
        Ok(position)
    }

    /// Move one item to a new position
    pub async fn set_item_position<'e, E: PgExecutor<'e>>(
        &self,
        item_id: &str,
        position: i32,
        executor: E,
    ) -> Result<()> {
        sqlx::query("UPDATE playlist_items SET position = $2 WHERE id = $1")
            .bind(item_id)
            .bind(position)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Remove every item (smart refresh)
    pub async fn delete_all_items<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        executor: E,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM playlist_items WHERE playlist_id = $1")
            .bind(playlist_id.as_str())
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    // ========== collaborators & tags ==========

    pub async fn get_collaborator_ids(&self, playlist_id: &PlaylistId) -> Result<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM playlist_collaborators WHERE playlist_id = $1",
        )
        .bind(playlist_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(UserId::from_string).collect())
    }

    pub async fn is_collaborator(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<bool> {
        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM playlist_collaborators WHERE playlist_id = $1 AND user_id = $2",
        )
        .bind(playlist_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.is_some())
    }

    /// Replace the collaborator set (single-statement diff; idempotent).
    /// Rows absent from `user_ids` are deleted, present rows are kept,
    /// new rows are inserted.
    pub async fn replace_collaborators<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        user_ids: &[UserId],
        executor: E,
    ) -> Result<()> {
        let ids: Vec<String> = user_ids.iter().map(|u| u.as_str().to_string()).collect();
        sqlx::query(
            r"
            WITH incoming AS (
                SELECT unnest($2::text[]) AS user_id
            ), removed AS (
                DELETE FROM playlist_collaborators
                WHERE playlist_id = $1
                  AND user_id NOT IN (SELECT user_id FROM incoming)
            )
            INSERT INTO playlist_collaborators (playlist_id, user_id)
            SELECT $1, user_id FROM incoming
            ON CONFLICT (playlist_id, user_id) DO NOTHING
            ",
        )
        .bind(playlist_id.as_str())
        .bind(&ids)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_tags(&self, playlist_id: &PlaylistId) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT tag FROM playlist_tags WHERE playlist_id = $1 ORDER BY tag",
        )
        .bind(playlist_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Replace the tag set (single-statement diff; idempotent)
    pub async fn replace_tags<'e, E: PgExecutor<'e>>(
        &self,
        playlist_id: &PlaylistId,
        tags: &[String],
        executor: E,
    ) -> Result<()> {
        sqlx::query(
            r"
            WITH incoming AS (
                SELECT unnest($2::text[]) AS tag
            ), removed AS (
                DELETE FROM playlist_tags
                WHERE playlist_id = $1
                  AND tag NOT IN (SELECT tag FROM incoming)
            )
            INSERT INTO playlist_tags (playlist_id, tag)
            SELECT $1, tag FROM incoming
            ON CONFLICT (playlist_id, tag) DO NOTHING
            ",
        )
        .bind(playlist_id.as_str())
        .bind(tags)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn playlist_from_row(row: &PgRow) -> Result<Playlist> {
    let criteria = row
        .try_get::<Option<serde_json::Value>, _>("smart_criteria")
        .map_err(sqlx::Error::from)?
        .map(serde_json::from_value)
        .transpose()?;
    Ok(Playlist {
        id: PlaylistId::from_string(row.get("id")),
        user_id: UserId::from_string(row.get("user_id")),
        name: row.get("name"),
        description: row.get("description"),
        is_public: row.get("is_public"),
        is_smart_playlist: row.get("is_smart_playlist"),
        smart_criteria: criteria,
        track_count: row.get("track_count"),
        total_duration: row.get("total_duration"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_shift_and_insert_keeps_positions_dense() {
        // Integration test placeholder
    }
}
