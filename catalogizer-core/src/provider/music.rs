//! Music recognition provider
//!
//! Prefers an audio fingerprint match when the request carries one;
//! otherwise falls back to a tag/filename search against a
//! MusicBrainz-style API, then to the parsed filename alone.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::filename;
use crate::config::RecognitionConfig;
use crate::models::{AudioFingerprint, MediaType, RecognitionRequest, RecognitionResult};

use super::error::ProviderError;
use super::traits::RecognitionProvider;

pub const PROVIDER_NAME: &str = "music_db";

/// Music metadata provider
pub struct MusicProvider {
    client: reqwest::Client,
    search_url: String,
    fingerprint_url: String,
}

#[derive(Debug, Serialize)]
struct FingerprintLookup<'a> {
    algorithm: &'a str,
    hash: &'a str,
    duration: f64,
    segments: &'a [String],
}

#[derive(Debug, Deserialize)]
struct FingerprintResponse {
    #[serde(default)]
    matches: Vec<RecordingMatch>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    recordings: Vec<RecordingMatch>,
}

#[derive(Debug, Deserialize)]
struct RecordingMatch {
    id: String,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    year: Option<i32>,
    /// match score in [0, 1]
    score: Option<f64>,
}

impl MusicProvider {
    pub fn new(config: &RecognitionConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| crate::Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            search_url: config.music_api_url.trim_end_matches('/').to_string(),
            fingerprint_url: config.fingerprint_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup_fingerprint(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<Option<RecognitionResult>, ProviderError> {
        let body = FingerprintLookup {
            algorithm: &fingerprint.algorithm,
            hash: &fingerprint.hash,
            duration: fingerprint.duration_seconds,
            segments: &fingerprint.segments,
        };
        let response = self
            .client
            .post(format!("{}/lookup", self.fingerprint_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Fingerprint API returned {}",
                response.status()
            )));
        }

        let parsed: FingerprintResponse = response.json().await?;
        Ok(parsed
            .matches
            .into_iter()
            .next()
            .map(|m| to_result(m, "fingerprint")))
    }

    async fn search_tags(
        &self,
        artist: Option<&str>,
        title: &str,
    ) -> Result<Option<RecognitionResult>, ProviderError> {
        let mut query: Vec<(&str, String)> = vec![("title", title.to_string())];
        if let Some(a) = artist {
            query.push(("artist", a.to_string()));
        }
        let response = self
            .client
            .get(format!("{}/recordings", self.search_url))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Music search API returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .recordings
            .into_iter()
            .next()
            .map(|m| to_result(m, "tag_search")))
    }
}

fn to_result(m: RecordingMatch, method: &str) -> RecognitionResult {
    let mut result = RecognitionResult::new(MediaType::Music, m.title, PROVIDER_NAME);
    result.artist = m.artist;
    result.album = m.album;
    result.year = m.year;
    result
        .external_ids
        .insert("musicbrainz_id".to_string(), m.id);
    // Fingerprint matches carry the matcher's own score; tag searches get
    // a flat mid confidence
    result.confidence = match method {
        "fingerprint" => m.score.unwrap_or(0.9).clamp(0.0, 1.0),
        _ => m.score.unwrap_or(0.7).clamp(0.0, 1.0),
    };
    result.recognition_method = method.to_string();
    result
}

#[async_trait::async_trait]
impl RecognitionProvider for MusicProvider {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, ProviderError> {
        // Fingerprint matches beat tag matches whenever available
        if let Some(fingerprint) = &request.fingerprint {
            if !self.fingerprint_url.is_empty() {
                match self.lookup_fingerprint(fingerprint).await {
                    Ok(Some(mut result)) => {
                        result
                            .external_ids
                            .insert("fingerprint_hash".to_string(), fingerprint.hash.clone());
                        return Ok(result);
                    }
                    Ok(None) => {}
                    Err(err) if err.is_transient() => return Err(err),
                    Err(err) => {
                        tracing::warn!(provider = PROVIDER_NAME, error = %err, "Fingerprint lookup failed");
                    }
                }
            }
        }

        let parsed = filename::parse_music(&request.file_name);
        let title = if parsed.title.is_empty() {
            request
                .directory_context
                .as_deref()
                .map(filename::clean_title)
                .unwrap_or_default()
        } else {
            parsed.title.clone()
        };
        if title.is_empty() {
            return Err(ProviderError::MissingField("title".to_string()));
        }

        if !self.search_url.is_empty() {
            match self.search_tags(parsed.artist.as_deref(), &title).await {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Tag search failed");
                }
            }
        }

        let mut result = RecognitionResult::new(
            request.media_type.unwrap_or(MediaType::Music),
            title,
            PROVIDER_NAME,
        );
        result.artist = parsed.artist;
        result.album = parsed.album;
        result.year = parsed.year;
        result.confidence = 0.5;
        result.recognition_method = "filename".to_string();
        Ok(result)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(
            media_type,
            MediaType::Music | MediaType::Album | MediaType::Audiobook | MediaType::Podcast
        )
    }

    fn confidence_threshold(&self) -> f64 {
        0.55
    }
}
