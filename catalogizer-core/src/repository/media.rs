//! Media catalog repository
//!
//! media_types, media_items, media_files join rows, directory analyses
//! and play statistics.

use sqlx::PgPool;

use crate::{
    models::{
        DirectoryAnalysis, FileId, MediaFile, MediaItem, MediaItemId, MediaTypeRow,
    },
    Result,
};

const ITEM_COLUMNS: &str = "id, media_type_id, title, original_title, year, description, genre, \
     director, cast_crew, rating, runtime, language, country, status, parent_id, season_number, \
     episode_number, track_number, first_detected, last_updated";

/// Media catalog repository
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========== media_types ==========

    /// Look up a media type row by detection name
    pub async fn get_type_by_name(&self, name: &str) -> Result<Option<MediaTypeRow>> {
        let row = sqlx::query_as::<_, MediaTypeRow>(
            "SELECT id, name, description, detection_patterns, metadata_providers, \
             created_at, updated_at FROM media_types WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Look up a media type row, creating it on first encounter so a scan
    /// never aborts on an unseeded type table
    pub async fn get_or_create_type(&self, name: &str) -> Result<MediaTypeRow> {
        if let Some(row) = self.get_type_by_name(name).await? {
            return Ok(row);
        }
        let row = sqlx::query_as::<_, MediaTypeRow>(
            r"
            INSERT INTO media_types (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET updated_at = NOW()
            RETURNING id, name, description, detection_patterns, metadata_providers,
                      created_at, updated_at
            ",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ========== media_items ==========

    /// Get media item by ID
    pub async fn get_item(&self, id: &MediaItemId) -> Result<Option<MediaItem>> {
        let item = sqlx::query_as::<_, MediaItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Natural-key lookup used for initial dedupe before external IDs
    /// are known
    pub async fn find_item_by_title_and_type(
        &self,
        title: &str,
        media_type_id: i32,
    ) -> Result<Option<MediaItem>> {
        let item = sqlx::query_as::<_, MediaItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items \
             WHERE LOWER(title) = LOWER($1) AND media_type_id = $2"
        ))
        .bind(title)
        .bind(media_type_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Insert a media item
    pub async fn create_item(&self, item: &MediaItem) -> Result<MediaItem> {
        let created = sqlx::query_as::<_, MediaItem>(&format!(
            r"
            INSERT INTO media_items (id, media_type_id, title, original_title, year,
                                     description, genre, director, cast_crew, rating, runtime,
                                     language, country, status, parent_id, season_number,
                                     episode_number, track_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(item.id.as_str())
        .bind(item.media_type_id)
        .bind(&item.title)
        .bind(&item.original_title)
        .bind(item.year)
        .bind(&item.description)
        .bind(&item.genre)
        .bind(&item.director)
        .bind(&item.cast_crew)
        .bind(item.rating)
        .bind(item.runtime)
        .bind(&item.language)
        .bind(&item.country)
        .bind(&item.status)
        .bind(item.parent_id.as_ref().map(MediaItemId::as_str))
        .bind(item.season_number)
        .bind(item.episode_number)
        .bind(item.track_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Tracks of an album, ordered by track number
    pub async fn get_album_tracks(&self, album_id: &MediaItemId) -> Result<Vec<MediaItem>> {
        let items = sqlx::query_as::<_, MediaItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items \
             WHERE parent_id = $1 ORDER BY track_number NULLS LAST, title"
        ))
        .bind(album_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// An artist's tracks across albums, most played first, capped
    pub async fn get_artist_top_tracks(
        &self,
        artist_id: &MediaItemId,
        limit: i64,
    ) -> Result<Vec<MediaItem>> {
        let items = sqlx::query_as::<_, MediaItem>(&format!(
            r"
            SELECT {ITEM_COLUMNS} FROM (
                SELECT t.*, COALESCE(ps.play_count, 0) AS plays
                FROM media_items t
                JOIN media_items album ON t.parent_id = album.id
                LEFT JOIN media_play_stats ps ON ps.media_item_id = t.id
                WHERE album.parent_id = $1
                ORDER BY plays DESC, t.title
                LIMIT $2
            ) ranked
            ORDER BY ranked.plays DESC, ranked.title
            "
        ))
        .bind(artist_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Tracks in a genre, alphabetical
    pub async fn get_genre_tracks(&self, genre: &str, limit: i64) -> Result<Vec<MediaItem>> {
        let items = sqlx::query_as::<_, MediaItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items \
             WHERE genre ILIKE $1 ORDER BY title LIMIT $2"
        ))
        .bind(format!("%{genre}%"))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    // ========== media_files ==========

    /// Link a file to a media item
    pub async fn link_file(
        &self,
        media_item_id: &MediaItemId,
        file_id: &FileId,
        is_primary: bool,
    ) -> Result<MediaFile> {
        let link = sqlx::query_as::<_, MediaFile>(
            r"
            INSERT INTO media_files (id, media_item_id, file_id, is_primary)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (media_item_id, file_id) DO UPDATE SET is_primary = EXCLUDED.is_primary
            RETURNING id, media_item_id, file_id, quality_info, language, is_primary, created_at
            ",
        )
        .bind(crate::models::generate_id())
        .bind(media_item_id.as_str())
        .bind(file_id.as_str())
        .bind(is_primary)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    /// The media item a file is linked to, if any
    pub async fn get_item_for_file(&self, file_id: &FileId) -> Result<Option<MediaItem>> {
        let item = sqlx::query_as::<_, MediaItem>(&format!(
            r"
            SELECT {ITEM_COLUMNS} FROM media_items
            WHERE id = (
                SELECT media_item_id FROM media_files WHERE file_id = $1 LIMIT 1
            )
            "
        ))
        .bind(file_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// File links of a media item, primary first
    pub async fn get_item_files(&self, media_item_id: &MediaItemId) -> Result<Vec<MediaFile>> {
        let links = sqlx::query_as::<_, MediaFile>(
            "SELECT id, media_item_id, file_id, quality_info, language, is_primary, created_at \
             FROM media_files WHERE media_item_id = $1 ORDER BY is_primary DESC, created_at",
        )
        .bind(media_item_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    // ========== directory_analyses ==========

    /// Upsert the analysis for a directory path (one analysis per path)
    pub async fn upsert_directory_analysis(
        &self,
        analysis: &DirectoryAnalysis,
    ) -> Result<DirectoryAnalysis> {
        let stored = sqlx::query_as::<_, DirectoryAnalysis>(
            r"
            INSERT INTO directory_analyses (id, directory_path, smb_root, media_item_id,
                                            confidence_score, detection_method, analysis_data,
                                            files_count, total_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (directory_path) DO UPDATE
            SET media_item_id = EXCLUDED.media_item_id,
                confidence_score = EXCLUDED.confidence_score,
                detection_method = EXCLUDED.detection_method,
                analysis_data = EXCLUDED.analysis_data,
                files_count = EXCLUDED.files_count,
                total_size = EXCLUDED.total_size,
                last_analyzed = NOW()
            RETURNING id, directory_path, smb_root AS storage_root, media_item_id,
                      confidence_score, detection_method, analysis_data, last_analyzed,
                      files_count, total_size
            ",
        )
        .bind(&analysis.id)
        .bind(&analysis.directory_path)
        .bind(analysis.storage_root.as_str())
        .bind(analysis.media_item_id.as_str())
        .bind(analysis.confidence_score)
        .bind(&analysis.detection_method)
        .bind(&analysis.analysis_data)
        .bind(analysis.files_count)
        .bind(analysis.total_size)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    /// Get the analysis for a directory path
    pub async fn get_analysis_by_path(&self, path: &str) -> Result<Option<DirectoryAnalysis>> {
        let analysis = sqlx::query_as::<_, DirectoryAnalysis>(
            "SELECT id, directory_path, smb_root AS storage_root, media_item_id, \
             confidence_score, detection_method, analysis_data, last_analyzed, files_count, \
             total_size FROM directory_analyses WHERE directory_path = $1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(analysis)
    }

    // ========== play statistics ==========

    /// Bump the play counter; called from detached background tasks
    pub async fn increment_play_count(&self, media_item_id: &MediaItemId) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO media_play_stats (media_item_id, play_count, last_played_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (media_item_id) DO UPDATE
            SET play_count = media_play_stats.play_count + 1, last_played_at = NOW()
            ",
        )
        .bind(media_item_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current play count, zero when never played
    pub async fn get_play_count(&self, media_item_id: &MediaItemId) -> Result<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT play_count FROM media_play_stats WHERE media_item_id = $1",
        )
        .bind(media_item_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_find_item_by_natural_key() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_directory_analysis_upsert_is_idempotent() {
        // Integration test placeholder
    }
}
