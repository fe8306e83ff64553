//! Storage root repository

use sqlx::PgPool;

use crate::{
    models::{StorageRoot, StorageRootId},
    Result,
};

const STORAGE_ROOT_COLUMNS: &str = "id, name, protocol, host, port, path, username, password, \
     domain, enabled, max_depth, created_at, updated_at, last_scan_at";

/// Storage root repository
#[derive(Clone)]
pub struct StorageRootRepository {
    pool: PgPool,
}

impl StorageRootRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get storage root by ID
    pub async fn get_by_id(&self, id: &StorageRootId) -> Result<Option<StorageRoot>> {
        let root = sqlx::query_as::<_, StorageRoot>(&format!(
            "SELECT {STORAGE_ROOT_COLUMNS} FROM storage_roots WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(root)
    }

    /// All enabled storage roots, stable order
    pub async fn get_enabled(&self) -> Result<Vec<StorageRoot>> {
        let roots = sqlx::query_as::<_, StorageRoot>(&format!(
            "SELECT {STORAGE_ROOT_COLUMNS} FROM storage_roots WHERE enabled = TRUE ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(roots)
    }

    /// Create a new storage root.
    /// The `(protocol, host, port, path)` unique constraint surfaces as
    /// `Conflict`.
    pub async fn create(&self, root: &StorageRoot) -> Result<StorageRoot> {
        let created = sqlx::query_as::<_, StorageRoot>(&format!(
            r"
            INSERT INTO storage_roots (id, name, protocol, host, port, path, username,
                                       password, domain, enabled, max_depth)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {STORAGE_ROOT_COLUMNS}
            "
        ))
        .bind(root.id.as_str())
        .bind(&root.name)
        .bind(root.protocol.to_lowercase())
        .bind(&root.host)
        .bind(root.port)
        .bind(&root.path)
        .bind(&root.username)
        .bind(&root.password)
        .bind(&root.domain)
        .bind(root.enabled)
        .bind(root.max_depth)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Flip the enabled flag
    pub async fn set_enabled(&self, id: &StorageRootId, enabled: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE storage_roots SET enabled = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp a completed scan
    pub async fn mark_scanned(&self, id: &StorageRootId) -> Result<()> {
        sqlx::query(
            "UPDATE storage_roots SET last_scan_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a storage root (cascades to its file records)
    pub async fn delete(&self, id: &StorageRootId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM storage_roots WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_create_and_get() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_duplicate_root_conflicts() {
        // Integration test placeholder
    }
}
