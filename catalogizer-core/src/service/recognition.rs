//! Recognition orchestrator
//!
//! Drives a single recognition end to end: cache lookup, type detection,
//! concurrent provider fan-out, deterministic fusion, enrichment,
//! duplicate detection, translation, then caching and persistence.
//! Provider failures are absorbed; only "no confident match across all
//! providers" surfaces, as `Unrecognized`. Cancellation aborts in-flight
//! provider calls and commits nothing.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::{KeyBuilder, RecognitionCache};
use crate::classify::MediaTypeDetector;
use crate::config::RecognitionConfig;
use crate::models::{
    DuplicateInfo, DuplicateMatch, ExternalIds, MediaType, RecognitionRequest, RecognitionResult,
    TranslatedMetadata,
};
use crate::provider::{
    CoverArtSource, ProviderError, ProviderRateLimiter, ProviderRegistry, Translator,
};
use crate::repository::RecognitionRepository;
use crate::{Error, Result};

/// Metadata translation treats this as the source language when the
/// winning result does not declare one
const DEFAULT_SOURCE_LANGUAGE: &str = "en";

type ProviderOutcome = (
    &'static str,
    f64,
    std::result::Result<RecognitionResult, ProviderError>,
);

/// Orchestrates the full recognition pipeline
pub struct RecognitionOrchestrator {
    registry: Arc<ProviderRegistry>,
    detector: MediaTypeDetector,
    cache: RecognitionCache,
    keys: KeyBuilder,
    recognition_repo: RecognitionRepository,
    cover_art: Option<Arc<dyn CoverArtSource>>,
    translator: Option<Arc<dyn Translator>>,
    rate_limiter: Arc<ProviderRateLimiter>,
    admission: Arc<Semaphore>,
}

impl RecognitionOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        recognition_repo: RecognitionRepository,
        config: &RecognitionConfig,
    ) -> Self {
        Self {
            registry,
            detector: MediaTypeDetector::new(),
            cache: RecognitionCache::new(
                10_000,
                std::time::Duration::from_secs(config.cache_ttl_hours * 3600),
            ),
            keys: KeyBuilder::default(),
            recognition_repo,
            cover_art: None,
            translator: None,
            rate_limiter: Arc::new(ProviderRateLimiter::new(config.rate_limit_per_second)),
            admission: Arc::new(Semaphore::new(config.worker_pool_size)),
        }
    }

    #[must_use]
    pub fn with_cover_art(mut self, source: Arc<dyn CoverArtSource>) -> Self {
        self.cover_art = Some(source);
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Recognize one file.
    ///
    /// The sequence per request is strictly:
    /// cache -> detect -> fan-out -> fuse -> enhance -> dedupe ->
    /// translate -> persist. Only the fan-out is concurrent.
    pub async fn recognize(
        &self,
        cancel: &CancellationToken,
        mut request: RecognitionRequest,
    ) -> Result<RecognitionResult> {
        let started = Instant::now();
        let cache_key = self.keys.recognition(
            &request.file_hash,
            request.media_type.map(MediaType::as_str),
        );

        if let Some(hit) = self.cache.get(&cache_key).await {
            tracing::debug!(file_hash = %request.file_hash, "Recognition cache hit");
            return Ok(hit);
        }

        // Bounded worker pool; overflow is retryable
        let Ok(_permit) = self.admission.clone().try_acquire_owned() else {
            return Err(Error::Transient(
                "Recognition worker pool is full".to_string(),
            ));
        };

        let media_type = match request.media_type {
            Some(media_type) => media_type,
            None => {
                let detection = self.detector.detect(
                    request.mime_type.as_deref().unwrap_or(""),
                    &request.file_name,
                    request.directory_context.as_deref(),
                );
                tracing::debug!(
                    file = %request.file_name,
                    media_type = %detection.media_type,
                    confidence = detection.confidence,
                    "Detected media type"
                );
                request.media_type = Some(detection.media_type);
                detection.media_type
            }
        };

        let providers = self.registry.providers_for(media_type);
        if providers.is_empty() {
            return Err(Error::Unrecognized(format!(
                "No provider supports media type {media_type}"
            )));
        }

        let outcomes = self.fan_out(cancel, providers, &request).await?;
        let (mut winner, also_ran) = fuse(&request.file_name, outcomes).ok_or_else(|| {
            Error::Unrecognized(format!(
                "No provider produced a confident match for {}",
                request.file_name
            ))
        })?;

        self.enhance(&mut winner, also_ran).await;
        self.detect_duplicates(&mut winner, &request).await;
        self.translate(&mut winner, &request).await;

        winner.recognized_at = Some(chrono::Utc::now());
        winner.processing_time_ms = started.elapsed().as_millis() as i64;

        self.cache.insert(cache_key, winner.clone()).await;
        self.recognition_repo
            .save(&request.file_path, &request.file_hash, &winner)
            .await?;

        tracing::info!(
            file = %request.file_name,
            title = %winner.title,
            provider = %winner.api_provider,
            confidence = winner.confidence,
            elapsed_ms = winner.processing_time_ms,
            "Recognition completed"
        );
        Ok(winner)
    }

    /// Run every selected provider concurrently, collecting results in
    /// completion order. Cancellation aborts the in-flight calls.
    async fn fan_out(
        &self,
        cancel: &CancellationToken,
        providers: Vec<Arc<dyn crate::provider::RecognitionProvider>>,
        request: &RecognitionRequest,
    ) -> Result<Vec<ProviderOutcome>> {
        let shared = Arc::new(request.clone());
        let mut join_set = JoinSet::new();
        for provider in providers {
            let request = shared.clone();
            let limiter = self.rate_limiter.clone();
            join_set.spawn(async move {
                limiter.acquire(provider.name()).await;
                let outcome = provider.recognize(&request).await;
                (provider.name(), provider.confidence_threshold(), outcome)
            });
        }

        let mut outcomes = Vec::new();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(Error::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok(outcome)) => outcomes.push(outcome),
                        Some(Err(join_err)) if join_err.is_cancelled() => {}
                        Some(Err(join_err)) => {
                            tracing::warn!(error = %join_err, "Provider task panicked");
                        }
                    }
                }
            }
        }
        Ok(outcomes)
    }

    /// Merge supplementary external IDs from the other passing candidates
    /// and fetch additional cover art. Failures are absorbed.
    async fn enhance(&self, winner: &mut RecognitionResult, also_ran: Vec<RecognitionResult>) {
        for other in also_ran {
            for (key, value) in other.external_ids {
                winner.external_ids.entry(key).or_insert(value);
            }
        }

        if let Some(source) = &self.cover_art {
            match source.fetch_cover_art(winner).await {
                Ok(extra) => {
                    for art in extra {
                        if !winner.cover_art.iter().any(|c| c.url == art.url) {
                            winner.cover_art.push(art);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(title = %winner.title, error = %err, "Cover art fetch failed");
                }
            }
        }
    }

    /// Score prior catalog entries against the winner; matches at or
    /// above 0.8 are recorded. Failures are absorbed.
    async fn detect_duplicates(&self, winner: &mut RecognitionResult, request: &RecognitionRequest) {
        let candidates = match self
            .recognition_repo
            .find_duplicate_candidates(&winner.title, &winner.external_ids, &request.file_hash)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(title = %winner.title, error = %err, "Duplicate lookup failed");
                return;
            }
        };

        for candidate in candidates {
            let score = similarity(
                &winner.title,
                &candidate.title,
                &winner.external_ids,
                &candidate.external_ids,
            );
            if let Some(label) = DuplicateMatch::from_similarity(score) {
                winner.duplicates.push(DuplicateInfo {
                    media_id: candidate.media_id,
                    title: candidate.title,
                    similarity: score,
                    label,
                });
            }
        }
        if !winner.duplicates.is_empty() {
            tracing::info!(
                title = %winner.title,
                duplicates = winner.duplicates.len(),
                "Duplicate entries detected"
            );
        }
    }

    /// Translate title/description/genres per requested language.
    /// A failing language is dropped silently (warn log only).
    async fn translate(&self, winner: &mut RecognitionResult, request: &RecognitionRequest) {
        let Some(translator) = &self.translator else {
            return;
        };
        for language in &request.target_languages {
            if language == DEFAULT_SOURCE_LANGUAGE {
                continue;
            }
            match translate_metadata(translator.as_ref(), winner, language).await {
                Ok(translated) => {
                    winner.translations.insert(language.clone(), translated);
                }
                Err(err) => {
                    tracing::warn!(
                        title = %winner.title,
                        language = %language,
                        error = %err,
                        "Translation failed, dropping language"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for RecognitionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionOrchestrator")
            .field("providers", &self.registry.names())
            .finish()
    }
}

async fn translate_metadata(
    translator: &dyn Translator,
    result: &RecognitionResult,
    language: &str,
) -> std::result::Result<TranslatedMetadata, ProviderError> {
    let mut translated = TranslatedMetadata {
        title: Some(translator.translate(&result.title, language).await?),
        ..TranslatedMetadata::default()
    };
    if let Some(description) = &result.description {
        translated.description = Some(translator.translate(description, language).await?);
    }
    for genre in &result.genres {
        translated.genres.push(translator.translate(genre, language).await?);
    }
    Ok(translated)
}

/// Deterministic fusion: keep candidates meeting their provider's
/// threshold, then pick by confidence, external-ID strength, and stable
/// provider-name order. Returns the winner plus the other passing
/// candidates (their IDs feed enhancement).
fn fuse(
    file_name: &str,
    outcomes: Vec<ProviderOutcome>,
) -> Option<(RecognitionResult, Vec<RecognitionResult>)> {
    let mut passing = Vec::new();
    for (name, threshold, outcome) in outcomes {
        match outcome {
            Ok(result) if result.confidence >= threshold => passing.push(result),
            Ok(result) => {
                tracing::debug!(
                    provider = name,
                    confidence = result.confidence,
                    threshold,
                    "Discarding result below provider threshold"
                );
            }
            Err(err) => {
                tracing::warn!(provider = name, file = file_name, error = %err, "Provider failed");
            }
        }
    }
    if passing.is_empty() {
        return None;
    }

    passing.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.external_id_strength().cmp(&a.external_id_strength()))
            .then_with(|| a.api_provider.cmp(&b.api_provider))
    });
    let winner = passing.remove(0);
    Some((winner, passing))
}

/// Similarity between a fresh result and a prior catalog entry:
/// token-set title similarity, external-ID overlap when both sides carry
/// IDs, and fingerprint-hash equality as a near-exact signal.
fn similarity(title_a: &str, title_b: &str, ids_a: &ExternalIds, ids_b: &ExternalIds) -> f64 {
    let title_sim = token_similarity(title_a, title_b);
    let both_have_ids = !ids_a.is_empty() && !ids_b.is_empty();
    let id_overlap = ids_a
        .iter()
        .any(|(k, v)| k != "fingerprint_hash" && ids_b.get(k) == Some(v));

    let mut score = if both_have_ids {
        0.5 * title_sim + if id_overlap { 0.5 } else { 0.0 }
    } else {
        title_sim
    };
    if id_overlap {
        score = score.max(0.85);
    }
    if let (Some(a), Some(b)) = (ids_a.get("fingerprint_hash"), ids_b.get("fingerprint_hash")) {
        if a == b {
            score = score.max(0.97);
        }
    }
    score.clamp(0.0, 1.0)
}

/// Jaccard similarity over lowercase word sets
fn token_similarity(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<String> =
        a.to_lowercase().split_whitespace().map(str::to_string).collect();
    let set_b: std::collections::HashSet<String> =
        b.to_lowercase().split_whitespace().map(str::to_string).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}
