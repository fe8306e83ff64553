//! File record repository
//!
//! Owns the `files` tree under each storage root plus duplicate-group
//! maintenance.

use sqlx::PgPool;

use crate::{
    models::{generate_id, DuplicateGroup, FileId, FileRecord, StorageRootId},
    Result,
};

const FILE_COLUMNS: &str = "id, storage_root_id, parent_id, name, path, is_directory, size, \
     modified_at, quick_hash, extension, mime_type, file_type, created_at, last_scan_at, \
     deleted, is_duplicate, duplicate_group_id";

/// File record repository
#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get file record by ID
    pub async fn get_by_id(&self, id: &FileId) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Top-level directories of a storage root, sorted by name
    pub async fn get_top_level_directories(
        &self,
        storage_root_id: &StorageRootId,
    ) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            r"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE storage_root_id = $1
              AND parent_id IS NULL
              AND is_directory = TRUE
              AND deleted = FALSE
            ORDER BY name
            "
        ))
        .bind(storage_root_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Direct non-deleted file children of a directory
    pub async fn get_file_children(&self, parent_id: &FileId) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            r"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE parent_id = $1
              AND is_directory = FALSE
              AND deleted = FALSE
            ORDER BY name
            "
        ))
        .bind(parent_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Files under a path prefix (folder playback)
    pub async fn get_by_path_prefix(
        &self,
        storage_root_id: &StorageRootId,
        prefix: &str,
    ) -> Result<Vec<FileRecord>> {
        let pattern = format!("{}%", prefix.trim_end_matches('/'));
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            r"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE storage_root_id = $1
              AND path LIKE $2
              AND is_directory = FALSE
              AND deleted = FALSE
            ORDER BY path
            "
        ))
        .bind(storage_root_id.as_str())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Insert a file record
    pub async fn create(&self, record: &FileRecord) -> Result<FileRecord> {
        let created = sqlx::query_as::<_, FileRecord>(&format!(
            r"
            INSERT INTO files (id, storage_root_id, parent_id, name, path, is_directory,
                               size, modified_at, quick_hash, extension, mime_type, file_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {FILE_COLUMNS}
            "
        ))
        .bind(record.id.as_str())
        .bind(record.storage_root_id.as_str())
        .bind(record.parent_id.as_ref().map(FileId::as_str))
        .bind(&record.name)
        .bind(&record.path)
        .bind(record.is_directory)
        .bind(record.size)
        .bind(record.modified_at)
        .bind(&record.quick_hash)
        .bind(&record.extension)
        .bind(&record.mime_type)
        .bind(&record.file_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Soft-delete a file record
    pub async fn mark_deleted(&self, id: &FileId) -> Result<bool> {
        let result = sqlx::query("UPDATE files SET deleted = TRUE WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update path/name/parent after a correlated rename; identity and
    /// catalog links survive the move
    pub async fn apply_rename(
        &self,
        id: &FileId,
        new_path: &str,
        new_name: &str,
        new_parent: Option<&FileId>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE files
            SET path = $2, name = $3, parent_id = $4, last_scan_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(new_path)
        .bind(new_name)
        .bind(new_parent.map(FileId::as_str))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Duplicate groups ==========

    /// Attach a file to the duplicate group for `file_hash`, creating the
    /// group on first use, and refresh the group's aggregates
    pub async fn add_to_duplicate_group(&self, file_id: &FileId, file_hash: &str) -> Result<DuplicateGroup> {
        let existing = sqlx::query_as::<_, DuplicateGroup>(
            "SELECT id, file_hash, file_count, total_size, created_at \
             FROM duplicate_groups WHERE file_hash = $1",
        )
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;

        let group_id = match existing {
            Some(group) => group.id,
            None => {
                let id = generate_id();
                sqlx::query(
                    "INSERT INTO duplicate_groups (id, file_hash, file_count, total_size) \
                     VALUES ($1, $2, 0, 0)",
                )
                .bind(&id)
                .bind(file_hash)
                .execute(&self.pool)
                .await?;
                id
            }
        };

        sqlx::query(
            "UPDATE files SET is_duplicate = TRUE, duplicate_group_id = $2 WHERE id = $1",
        )
        .bind(file_id.as_str())
        .bind(&group_id)
        .execute(&self.pool)
        .await?;

        self.refresh_duplicate_group(&group_id).await
    }

    /// Detach a file from its group; the group is dropped when it falls
    /// below 2 members
    pub async fn remove_from_duplicate_group(&self, file_id: &FileId) -> Result<()> {
        let group_id: Option<String> = sqlx::query_scalar(
            "UPDATE files SET is_duplicate = FALSE, duplicate_group_id = NULL \
             WHERE id = $1 RETURNING duplicate_group_id",
        )
        .bind(file_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        if let Some(group_id) = group_id {
            let group = self.refresh_duplicate_group(&group_id).await?;
            if group.file_count < 2 {
                sqlx::query(
                    "UPDATE files SET is_duplicate = FALSE, duplicate_group_id = NULL \
                     WHERE duplicate_group_id = $1",
                )
                .bind(&group_id)
                .execute(&self.pool)
                .await?;
                sqlx::query("DELETE FROM duplicate_groups WHERE id = $1")
                    .bind(&group_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Recompute a group's member count and total size
    async fn refresh_duplicate_group(&self, group_id: &str) -> Result<DuplicateGroup> {
        let group = sqlx::query_as::<_, DuplicateGroup>(
            r"
            UPDATE duplicate_groups g
            SET file_count = stats.count, total_size = stats.size
            FROM (
                SELECT COALESCE(COUNT(*), 0)::INT AS count,
                       COALESCE(SUM(size), 0)::BIGINT AS size
                FROM files
                WHERE duplicate_group_id = $1 AND deleted = FALSE
            ) AS stats
            WHERE g.id = $1
            RETURNING g.id, g.file_hash, g.file_count, g.total_size, g.created_at
            ",
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }
}
