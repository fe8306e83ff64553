//! Game/software recognition provider
//!
//! Keys on executable and image patterns, platform extensions and release
//! keyword lists; an IGDB-style API refines the heuristic result when
//! configured.

use std::time::Duration;

use serde::Deserialize;

use crate::classify::filename;
use crate::config::RecognitionConfig;
use crate::models::{MediaType, RecognitionRequest, RecognitionResult};

use super::error::ProviderError;
use super::traits::RecognitionProvider;

pub const PROVIDER_NAME: &str = "game_db";

/// Console/handheld image extensions that imply a specific platform
const PLATFORM_EXTENSIONS: [(&str, &str); 8] = [
    ("nes", "NES"),
    ("sfc", "SNES"),
    ("n64", "Nintendo 64"),
    ("gba", "Game Boy Advance"),
    ("nds", "Nintendo DS"),
    ("rvz", "GameCube/Wii"),
    ("chd", "Arcade"),
    ("psx", "PlayStation"),
];

const RELEASE_KEYWORDS: [&str; 6] = ["repack", "gog", "codex", "fitgirl", "skidrow", "plaza"];

/// Game metadata provider
pub struct GameProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GameSearchResponse {
    #[serde(default)]
    games: Vec<GameHit>,
}

#[derive(Debug, Deserialize)]
struct GameHit {
    id: i64,
    name: String,
    first_release_year: Option<i32>,
    summary: Option<String>,
    rating: Option<f64>,
    #[serde(default)]
    genres: Vec<String>,
}

impl GameProvider {
    pub fn new(config: &RecognitionConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| crate::Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.game_api_url.trim_end_matches('/').to_string(),
            api_key: config.game_api_key.clone(),
        })
    }

    async fn search(&self, title: &str) -> Result<Option<RecognitionResult>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/games/search", self.api_url))
            .query(&[("key", self.api_key.as_str()), ("q", title)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Game API returned {}",
                response.status()
            )));
        }

        let body: GameSearchResponse = response.json().await?;
        Ok(body.games.into_iter().next().map(|hit| {
            let mut result = RecognitionResult::new(MediaType::Game, hit.name, PROVIDER_NAME);
            result.year = hit.first_release_year;
            result.description = hit.summary;
            result.genres = hit.genres;
            result.rating = hit.rating;
            result
                .external_ids
                .insert("igdb_id".to_string(), hit.id.to_string());
            result.confidence = 0.85;
            result.recognition_method = "api_search".to_string();
            result
        }))
    }
}

/// Strip release-group noise that the generic cleaner does not know about
fn clean_game_title(name: &str) -> String {
    let cleaned = filename::clean_title(name);
    cleaned
        .split_whitespace()
        .filter(|token| !RELEASE_KEYWORDS.contains(&token.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn platform_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_lowercase())?;
    PLATFORM_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, platform)| *platform)
}

#[async_trait::async_trait]
impl RecognitionProvider for GameProvider {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, ProviderError> {
        let title = clean_game_title(&request.file_name);
        let title = if title.is_empty() {
            request
                .directory_context
                .as_deref()
                .map(clean_game_title)
                .unwrap_or_default()
        } else {
            title
        };
        if title.is_empty() {
            return Err(ProviderError::MissingField("title".to_string()));
        }

        if !self.api_url.is_empty() {
            match self.search(&title).await {
                Ok(Some(mut result)) => {
                    if let Some(platform) = platform_for(&request.file_name) {
                        result
                            .external_ids
                            .insert("platform".to_string(), platform.to_string());
                    }
                    return Ok(result);
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Game lookup failed");
                }
            }
        }

        let parsed = filename::parse(&request.file_name);
        let mut result = RecognitionResult::new(
            request.media_type.unwrap_or(MediaType::Game),
            title,
            PROVIDER_NAME,
        );
        result.year = parsed.year;
        if let Some(platform) = platform_for(&request.file_name) {
            result
                .external_ids
                .insert("platform".to_string(), platform.to_string());
            result.confidence = 0.7;
        } else {
            result.confidence = 0.5;
        }
        result.recognition_method = "filename".to_string();
        Ok(result)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Game | MediaType::Software)
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

    fn config(api: &str) -> RecognitionConfig {
        RecognitionConfig {
            game_api_url: api.to_string(),
            game_api_key: "k".to_string(),
            request_timeout_seconds: 2,
            ..RecognitionConfig::default()
        }
    }

    fn request(file_name: &str) -> RecognitionRequest {
        RecognitionRequest {
            file_name: file_name.to_string(),
            file_hash: "h".to_string(),
            ..RecognitionRequest::default()
        }
    }

    #[test]
    fn test_clean_game_title_drops_release_keywords() {
        assert_eq!(clean_game_title("Cool Game GOG repack.iso"), "Cool Game");
    }

    #[test]
    fn test_platform_from_extension() {
        assert_eq!(platform_for("zelda.n64"), Some("Nintendo 64"));
        assert_eq!(platform_for("game.iso"), None);
    }

    #[tokio::test]
    async fn test_api_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/games/search"))
            .and(query_param("q", "Hollow Knight"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "games": [{
                    "id": 26286,
                    "name": "Hollow Knight",
                    "first_release_year": 2017,
                    "summary": "A challenging action adventure.",
                    "rating": 9.0,
                    "genres": ["Platform", "Adventure"]
                }]
            })))
            .mount(&server)
            .await;

        let provider = GameProvider::new(&config(&server.uri())).unwrap();
        let result = provider
            .recognize(&request("Hollow Knight.exe"))
            .await
            .unwrap();

        assert_eq!(result.external_ids.get("igdb_id").unwrap(), "26286");
        assert_eq!(result.year, Some(2017));
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_heuristic_fallback_with_platform() {
        let provider = GameProvider::new(&config("")).unwrap();
        let result = provider
            .recognize(&request("Super Metroid.sfc"))
            .await
            .unwrap();

        assert_eq!(result.title, "Super Metroid");
        assert_eq!(result.external_ids.get("platform").unwrap(), "SNES");
        assert!((result.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(result.recognition_method, "filename");
    }

    #[test]
    fn test_supported_media_types() {
        let provider = GameProvider::new(&config("")).unwrap();
        assert!(provider.supports_media_type(MediaType::Game));
        assert!(provider.supports_media_type(MediaType::Software));
        assert!(!provider.supports_media_type(MediaType::Music));
    }
}
