// Enrichment collaborators
//
// Cover-art fetching and metadata translation are consumed through these
// traits; implementations live outside the core. Failures are absorbed by
// the orchestrator with a warning, never surfaced to the caller.

use async_trait::async_trait;

use crate::models::{CoverArt, RecognitionResult};

use super::error::ProviderError;

/// Supplies additional cover art for a recognized entity
#[async_trait]
pub trait CoverArtSource: Send + Sync {
    async fn fetch_cover_art(
        &self,
        result: &RecognitionResult,
    ) -> Result<Vec<CoverArt>, ProviderError>;
}

/// Translates metadata strings between languages
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language`; the source language is
    /// inferred by the implementation
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;
}
