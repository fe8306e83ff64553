//! Recognition request/result types exchanged with the providers

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::media::{ExternalIds, MediaType};

/// Compact, comparable representation of audio content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFingerprint {
    pub algorithm: String,
    pub hash: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub features: Vec<f64>,
    /// Sub-hashes over fixed-length segments, for partial matching
    #[serde(default)]
    pub segments: Vec<String>,
}

/// A single OCR-extracted text block with its page geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextBlock {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

impl OcrTextBlock {
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// OCR output for a scanned cover or title page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub blocks: Vec<OcrTextBlock>,
    pub language: Option<String>,
}

/// What a provider is asked to recognize
#[derive(Debug, Clone, Default)]
pub struct RecognitionRequest {
    pub file_path: String,
    pub file_name: String,
    /// Content hash; also the cache key
    pub file_hash: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    /// Pre-detected type; the orchestrator fills this in when empty
    pub media_type: Option<MediaType>,
    /// Name of the containing directory, for directory-level hints
    pub directory_context: Option<String>,
    pub fingerprint: Option<AudioFingerprint>,
    pub ocr: Option<OcrResult>,
    /// Target languages for metadata translation (BCP-47-ish tags)
    pub target_languages: Vec<String>,
}

/// Cover art reference returned by providers and enrichers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverArt {
    pub url: String,
    pub kind: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Translated metadata for one target language
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Match strength label for a detected duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatch {
    /// similarity >= 0.95
    Exact,
    /// similarity >= 0.85
    High,
    /// similarity >= 0.8
    Medium,
}

impl DuplicateMatch {
    /// Label for a similarity score, if it clears the 0.8 floor
    #[must_use]
    pub fn from_similarity(similarity: f64) -> Option<Self> {
        if similarity >= 0.95 {
            Some(Self::Exact)
        } else if similarity >= 0.85 {
            Some(Self::High)
        } else if similarity >= 0.8 {
            Some(Self::Medium)
        } else {
            None
        }
    }
}

/// A prior catalog entry judged to duplicate a recognition result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub media_id: String,
    pub title: String,
    pub similarity: f64,
    pub label: DuplicateMatch,
}

/// Scored result returned by a recognition provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub media_id: String,
    pub media_type: MediaType,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    /// in [0, 1]
    pub confidence: f64,
    pub recognition_method: String,
    pub api_provider: String,
    #[serde(default)]
    pub external_ids: ExternalIds,
    #[serde(default)]
    pub cover_art: Vec<CoverArt>,
    /// language tag -> translated metadata
    #[serde(default)]
    pub translations: HashMap<String, TranslatedMetadata>,
    #[serde(default)]
    pub duplicates: Vec<DuplicateInfo>,
    pub recognized_at: Option<DateTime<Utc>>,
    pub processing_time_ms: i64,
}

impl RecognitionResult {
    /// Skeleton result a provider fills in
    #[must_use]
    pub fn new(media_type: MediaType, title: impl Into<String>, api_provider: &str) -> Self {
        Self {
            media_id: super::id::generate_id(),
            media_type,
            title: title.into(),
            original_title: None,
            year: None,
            description: None,
            genres: Vec::new(),
            director: None,
            artist: None,
            album: None,
            author: None,
            rating: None,
            vote_count: None,
            season_number: None,
            episode_number: None,
            confidence: 0.0,
            recognition_method: String::new(),
            api_provider: api_provider.to_string(),
            external_ids: ExternalIds::new(),
            cover_art: Vec::new(),
            translations: HashMap::new(),
            duplicates: Vec::new(),
            recognized_at: None,
            processing_time_ms: 0,
        }
    }

    /// Attach a parsed season/episode marker
    pub fn season_episode(&mut self, season: Option<u32>, episode: Option<u32>) {
        self.season_number = season.map(|s| s as i32);
        self.episode_number = episode.map(|e| e as i32);
    }

    /// Count of strong external identifiers (IMDb, ISBN, MusicBrainz,
    /// TMDb, IGDB). Used as the fusion tiebreak.
    #[must_use]
    pub fn external_id_strength(&self) -> usize {
        const STRONG: [&str; 6] = [
            "imdb_id",
            "tmdb_id",
            "musicbrainz_id",
            "isbn_13",
            "isbn_10",
            "igdb_id",
        ];
        STRONG
            .iter()
            .filter(|key| self.external_ids.contains_key(**key))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Duplicate Labels ==========

    #[test]
    fn test_duplicate_match_thresholds() {
        assert_eq!(
            DuplicateMatch::from_similarity(0.97),
            Some(DuplicateMatch::Exact)
        );
        assert_eq!(
            DuplicateMatch::from_similarity(0.95),
            Some(DuplicateMatch::Exact)
        );
        assert_eq!(
            DuplicateMatch::from_similarity(0.9),
            Some(DuplicateMatch::High)
        );
        assert_eq!(
            DuplicateMatch::from_similarity(0.8),
            Some(DuplicateMatch::Medium)
        );
        assert_eq!(DuplicateMatch::from_similarity(0.79), None);
    }

    // ========== External ID Strength ==========

    #[test]
    fn test_external_id_strength_counts_strong_ids_only() {
        let mut result = RecognitionResult::new(MediaType::Movie, "The Matrix", "tmdb");
        assert_eq!(result.external_id_strength(), 0);

        result
            .external_ids
            .insert("imdb_id".to_string(), "tt0133093".to_string());
        result
            .external_ids
            .insert("tmdb_id".to_string(), "603".to_string());
        result
            .external_ids
            .insert("homepage".to_string(), "https://example.com".to_string());
        assert_eq!(result.external_id_strength(), 2);
    }

    #[test]
    fn test_ocr_block_area() {
        let block = OcrTextBlock {
            text: "DUNE".to_string(),
            x: 10.0,
            y: 10.0,
            width: 200.0,
            height: 80.0,
            confidence: 0.93,
        };
        assert!((block.area() - 16_000.0).abs() < f64::EPSILON);
    }
}
