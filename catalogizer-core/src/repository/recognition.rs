//! Recognition result store
//!
//! Persists provider results keyed by file hash and answers the
//! duplicate-detection candidate queries.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{
    models::{ExternalIds, MediaType, RecognitionResult},
    Result,
};

/// Recognition result repository
#[derive(Clone)]
pub struct RecognitionRepository {
    pool: PgPool,
}

impl RecognitionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a recognition result; one row per (file_hash) with the
    /// latest result winning
    pub async fn save(&self, file_path: &str, file_hash: &str, result: &RecognitionResult) -> Result<()> {
        let external_ids = serde_json::to_value(&result.external_ids)?;
        let payload = serde_json::to_value(result)?;
        sqlx::query(
            r"
            INSERT INTO media_recognition_results
                (media_id, file_path, file_hash, media_type, title, year, confidence,
                 recognition_method, api_provider, external_ids, result_data,
                 recognized_at, processing_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), $12)
            ON CONFLICT (file_hash) DO UPDATE
            SET media_id = EXCLUDED.media_id,
                file_path = EXCLUDED.file_path,
                media_type = EXCLUDED.media_type,
                title = EXCLUDED.title,
                year = EXCLUDED.year,
                confidence = EXCLUDED.confidence,
                recognition_method = EXCLUDED.recognition_method,
                api_provider = EXCLUDED.api_provider,
                external_ids = EXCLUDED.external_ids,
                result_data = EXCLUDED.result_data,
                recognized_at = NOW(),
                processing_time_ms = EXCLUDED.processing_time_ms
            ",
        )
        .bind(&result.media_id)
        .bind(file_path)
        .bind(file_hash)
        .bind(result.media_type.as_str())
        .bind(&result.title)
        .bind(result.year)
        .bind(result.confidence)
        .bind(&result.recognition_method)
        .bind(&result.api_provider)
        .bind(external_ids)
        .bind(payload)
        .bind(result.processing_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Full stored result for a file hash
    pub async fn get_by_hash(&self, file_hash: &str) -> Result<Option<RecognitionResult>> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT result_data FROM media_recognition_results WHERE file_hash = $1",
        )
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Prior results sharing the title or any of the given external IDs,
    /// excluding the hash being recognized
    pub async fn find_duplicate_candidates(
        &self,
        title: &str,
        external_ids: &ExternalIds,
        exclude_hash: &str,
    ) -> Result<Vec<DuplicateCandidate>> {
        let mut candidates: Vec<DuplicateCandidate> = sqlx::query(
            r"
            SELECT media_id, title, media_type, external_ids
            FROM media_recognition_results
            WHERE LOWER(title) = LOWER($1) AND file_hash <> $2
            LIMIT 50
            ",
        )
        .bind(title)
        .bind(exclude_hash)
        .map(candidate_from_row)
        .fetch_all(&self.pool)
        .await?;

        for (key, value) in external_ids {
            let by_id: Vec<DuplicateCandidate> = sqlx::query(
                r"
                SELECT media_id, title, media_type, external_ids
                FROM media_recognition_results
                WHERE external_ids ->> $1 = $2 AND file_hash <> $3
                LIMIT 50
                ",
            )
            .bind(key)
            .bind(value)
            .bind(exclude_hash)
            .map(candidate_from_row)
            .fetch_all(&self.pool)
            .await?;
            for candidate in by_id {
                if !candidates.iter().any(|c| c.media_id == candidate.media_id) {
                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }
}

/// Slim projection used by duplicate scoring
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub media_id: String,
    pub title: String,
    pub media_type: MediaType,
    pub external_ids: ExternalIds,
}

fn candidate_from_row(row: PgRow) -> DuplicateCandidate {
    let external_ids: ExternalIds = row
        .try_get::<serde_json::Value, _>("external_ids")
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    DuplicateCandidate {
        media_id: row.get("media_id"),
        title: row.get("title"),
        media_type: MediaType::from_name(row.get::<String, _>("media_type").as_str()),
        external_ids,
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_save_then_get_round_trip() {
        // Integration test placeholder
    }
}
