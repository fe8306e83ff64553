//! Movie/TV recognition provider
//!
//! Tries external sources in order: a TMDb-style primary API, an
//! OMDb-style fallback, then a basic filename fallback that never fails.
//! Confidence combines the source's rating and vote count on a 0.5 base.

use std::time::Duration;

use serde::Deserialize;

use crate::classify::filename;
use crate::config::RecognitionConfig;
use crate::models::{MediaType, RecognitionRequest, RecognitionResult};

use super::error::ProviderError;
use super::traits::RecognitionProvider;

pub const PROVIDER_NAME: &str = "movie_db";

const FILENAME_CONFIDENCE: f64 = 0.5;

/// Movie metadata provider
pub struct MovieProvider {
    client: reqwest::Client,
    primary_url: String,
    primary_key: String,
    fallback_url: String,
    fallback_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    title: String,
    original_title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
    #[serde(default)]
    genre_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FallbackResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
}

impl MovieProvider {
    pub fn new(config: &RecognitionConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| crate::Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            primary_url: config.movie_api_url.trim_end_matches('/').to_string(),
            primary_key: config.movie_api_key.clone(),
            fallback_url: config.movie_fallback_url.trim_end_matches('/').to_string(),
            fallback_key: config.movie_fallback_key.clone(),
        })
    }

    async fn search_primary(
        &self,
        title: &str,
        year: Option<i32>,
        media_type: MediaType,
    ) -> Result<Option<RecognitionResult>, ProviderError> {
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.primary_key.clone()),
            ("query", title.to_string()),
        ];
        if let Some(y) = year {
            query.push(("year", y.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/search/movie", self.primary_url))
            .query(&query)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Primary movie API returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        let Some(hit) = body.results.into_iter().next() else {
            return Ok(None);
        };

        let mut result = RecognitionResult::new(media_type, hit.title, PROVIDER_NAME);
        result.original_title = hit.original_title;
        result.year = hit
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
            .or(year);
        result.description = hit.overview;
        result.genres = hit.genre_names;
        result.rating = hit.vote_average;
        result.vote_count = hit.vote_count;
        result
            .external_ids
            .insert("tmdb_id".to_string(), hit.id.to_string());
        result.confidence = score_confidence(hit.vote_average, hit.vote_count);
        result.recognition_method = "api_search".to_string();
        Ok(Some(result))
    }

    async fn search_fallback(
        &self,
        title: &str,
        year: Option<i32>,
        media_type: MediaType,
    ) -> Result<Option<RecognitionResult>, ProviderError> {
        let mut query: Vec<(&str, String)> = vec![
            ("apikey", self.fallback_key.clone()),
            ("t", title.to_string()),
        ];
        if let Some(y) = year {
            query.push(("y", y.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/", self.fallback_url))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Fallback movie API returned {}",
                response.status()
            )));
        }

        let body: FallbackResponse = response.json().await?;
        if body.response != "True" {
            return Ok(None);
        }

        let title = body.title.ok_or(ProviderError::MissingField("Title".to_string()))?;
        let rating = body.imdb_rating.as_deref().and_then(|r| r.parse().ok());
        let votes = body
            .imdb_votes
            .as_deref()
            .map(|v| v.replace(',', ""))
            .and_then(|v| v.parse().ok());

        let mut result = RecognitionResult::new(media_type, title, PROVIDER_NAME);
        result.year = body.year.as_deref().and_then(|y| y.get(..4)).and_then(|y| y.parse().ok());
        result.description = body.plot;
        result.director = body.director;
        result.genres = body
            .genre
            .map(|g| g.split(", ").map(str::to_string).collect())
            .unwrap_or_default();
        result.rating = rating;
        result.vote_count = votes;
        if let Some(imdb_id) = body.imdb_id {
            result.external_ids.insert("imdb_id".to_string(), imdb_id);
        }
        result.confidence = score_confidence(rating, votes);
        result.recognition_method = "api_fallback".to_string();
        Ok(Some(result))
    }

    /// Result built from the filename alone; last resort, never fails
    fn filename_result(&self, title: &str, year: Option<i32>, media_type: MediaType) -> RecognitionResult {
        let mut result = RecognitionResult::new(media_type, title, PROVIDER_NAME);
        result.year = year;
        result.confidence = FILENAME_CONFIDENCE;
        result.recognition_method = "filename".to_string();
        result
    }
}

/// 0.5 base, +0.3 for rating > 7.0, +0.2 for more than 1000 votes,
/// capped at 1.0
fn score_confidence(rating: Option<f64>, votes: Option<i64>) -> f64 {
    let mut confidence: f64 = 0.5;
    if rating.is_some_and(|r| r > 7.0) {
        confidence += 0.3;
    }
    if votes.is_some_and(|v| v > 1000) {
        confidence += 0.2;
    }
    confidence.min(1.0)
}

#[async_trait::async_trait]
impl RecognitionProvider for MovieProvider {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, ProviderError> {
        let parsed = filename::parse(&request.file_name);
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

        let media_type = if parsed.season.is_some() {
            MediaType::TvEpisode
        } else {
            request.media_type.unwrap_or(MediaType::Movie)
        };

        if !self.primary_url.is_empty() {
            match self.search_primary(&title, parsed.year, media_type).await {
                Ok(Some(mut result)) => {
                    result.season_episode(parsed.season, parsed.episode);
                    return Ok(result);
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Primary movie lookup failed");
                }
            }
        }

        if !self.fallback_url.is_empty() {
            match self.search_fallback(&title, parsed.year, media_type).await {
                Ok(Some(mut result)) => {
                    result.season_episode(parsed.season, parsed.episode);
                    return Ok(result);
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Fallback movie lookup failed");
                }
            }
        }

        let mut result = self.filename_result(&title, parsed.year, media_type);
        result.season_episode(parsed.season, parsed.episode);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(
            media_type,
            MediaType::Movie
                | MediaType::TvSeries
                | MediaType::TvEpisode
                | MediaType::Concert
                | MediaType::Documentary
        )
    }

    fn confidence_threshold(&self) -> f64 {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(primary: &str, fallback: &str) -> RecognitionConfig {
        RecognitionConfig {
            movie_api_url: primary.to_string(),
            movie_api_key: "k".to_string(),
            movie_fallback_url: fallback.to_string(),
            movie_fallback_key: "k2".to_string(),
            request_timeout_seconds: 2,
            ..RecognitionConfig::default()
        }
    }

    fn request(file_name: &str) -> RecognitionRequest {
        RecognitionRequest {
            file_name: file_name.to_string(),
            file_path: format!("/movies/{file_name}"),
            file_hash: "hash".to_string(),
            ..RecognitionRequest::default()
        }
    }

    // ========== Confidence Scoring ==========

    #[test]
    fn test_confidence_base() {
        assert!((score_confidence(None, None) - 0.5).abs() < f64::EPSILON);
        assert!((score_confidence(Some(6.9), Some(900)) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_rating_and_votes() {
        assert!((score_confidence(Some(8.7), None) - 0.8).abs() < f64::EPSILON);
        assert!((score_confidence(None, Some(20_000)) - 0.7).abs() < f64::EPSILON);
        assert!((score_confidence(Some(8.7), Some(20_000)) - 1.0).abs() < f64::EPSILON);
    }

    // ========== Primary API ==========

    #[tokio::test]
    async fn test_primary_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", "The Matrix"))
            .and(query_param("year", "1999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": 603,
                    "title": "The Matrix",
                    "original_title": "The Matrix",
                    "release_date": "1999-03-30",
                    "overview": "A computer hacker learns the truth.",
                    "vote_average": 8.1,
                    "vote_count": 21000
                }]
            })))
            .mount(&server)
            .await;

        let provider = MovieProvider::new(&config(&server.uri(), "")).unwrap();
        let result = provider
            .recognize(&request("The.Matrix.1999.1080p.mkv"))
            .await
            .unwrap();

        assert_eq!(result.title, "The Matrix");
        assert_eq!(result.year, Some(1999));
        assert_eq!(result.external_ids.get("tmdb_id").unwrap(), "603");
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.recognition_method, "api_search");
    }

    #[tokio::test]
    async fn test_empty_primary_falls_through_to_fallback() {
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("t", "Obscure Film"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "True",
                "Title": "Obscure Film",
                "Year": "2011",
                "imdbID": "tt0000001",
                "imdbRating": "7.4",
                "imdbVotes": "2,345",
                "Genre": "Drama, Mystery",
                "Director": "Someone",
                "Plot": "Things happen."
            })))
            .mount(&fallback)
            .await;

        let provider = MovieProvider::new(&config(&primary.uri(), &fallback.uri())).unwrap();
        let result = provider
            .recognize(&request("Obscure Film (2011).mkv"))
            .await
            .unwrap();

        assert_eq!(result.recognition_method, "api_fallback");
        assert_eq!(result.external_ids.get("imdb_id").unwrap(), "tt0000001");
        assert_eq!(result.genres, vec!["Drama", "Mystery"]);
        // rating 7.4 > 7.0, votes 2345 > 1000
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_no_sources_yields_filename_result() {
        let provider = MovieProvider::new(&config("", "")).unwrap();
        let result = provider
            .recognize(&request("The.Matrix.1999.1080p.mkv"))
            .await
            .unwrap();

        assert_eq!(result.title, "The Matrix");
        assert_eq!(result.year, Some(1999));
        assert_eq!(result.recognition_method, "filename");
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_tv_pattern_yields_episode_type() {
        let provider = MovieProvider::new(&config("", "")).unwrap();
        let result = provider
            .recognize(&request("Breaking Bad S01E01 720p.mkv"))
            .await
            .unwrap();

        assert_eq!(result.media_type, MediaType::TvEpisode);
        assert_eq!(result.season_number, Some(1));
        assert_eq!(result.episode_number, Some(1));
    }

    #[test]
    fn test_supported_media_types() {
        let provider = MovieProvider::new(&config("", "")).unwrap();
        assert!(provider.supports_media_type(MediaType::Movie));
        assert!(provider.supports_media_type(MediaType::TvEpisode));
        assert!(!provider.supports_media_type(MediaType::Music));
        assert!(!provider.supports_media_type(MediaType::Book));
    }
}
