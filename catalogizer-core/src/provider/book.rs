//! Book recognition provider
//!
//! Resolution order: an ISBN anywhere in the request short-circuits to an
//! ISBN lookup; an OCR result drives title/author extraction from the
//! scanned cover; otherwise the filename is parsed for author/title
//! shapes. External lookups go to a Google-Books-style API with an
//! Open-Library-style fallback.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::classify::filename;
use crate::config::RecognitionConfig;
use crate::models::{MediaType, OcrResult, RecognitionRequest, RecognitionResult};

use super::error::ProviderError;
use super::traits::RecognitionProvider;

pub const PROVIDER_NAME: &str = "book_db";

/// OCR blocks below this confidence are never title candidates
const OCR_TITLE_CONFIDENCE: f64 = 0.8;

static BY_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:by|By|BY)\s+([A-Z][\w.]*(?:\s+[A-Z][\w.]*){0,3})").expect("by regex")
});

/// Book metadata provider
pub struct BookProvider {
    client: reqwest::Client,
    primary_url: String,
    fallback_url: String,
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
struct VolumeInfo {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(rename = "industryIdentifiers", default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(rename = "averageRating")]
    average_rating: Option<f64>,
    #[serde(rename = "ratingsCount")]
    ratings_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct FallbackSearchResponse {
    #[serde(default)]
    docs: Vec<FallbackDoc>,
}

#[derive(Debug, Deserialize)]
struct FallbackDoc {
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
}

/// What the pre-lookup extraction stages produced
#[derive(Debug, Default, Clone)]
struct BookHints {
    title: Option<String>,
    author: Option<String>,
    year: Option<i32>,
    isbn: Option<String>,
}

impl BookProvider {
    pub fn new(config: &RecognitionConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| crate::Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            primary_url: config.book_api_url.trim_end_matches('/').to_string(),
            fallback_url: config.book_fallback_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup(&self, query: &str) -> Result<Option<RecognitionResult>, ProviderError> {
        if !self.primary_url.is_empty() {
            match self.lookup_primary(query).await {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Primary book lookup failed");
                }
            }
        }
        if !self.fallback_url.is_empty() {
            match self.lookup_fallback(query).await {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => {}
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_NAME, error = %err, "Fallback book lookup failed");
                }
            }
        }
        Ok(None)
    }

    async fn lookup_primary(&self, query: &str) -> Result<Option<RecognitionResult>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/volumes", self.primary_url))
            .query(&[("q", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Primary book API returned {}",
                response.status()
            )));
        }

        let body: VolumesResponse = response.json().await?;
        let Some(volume) = body.items.into_iter().next() else {
            return Ok(None);
        };
        let info = volume.volume_info;

        let mut result = RecognitionResult::new(MediaType::Book, info.title, PROVIDER_NAME);
        result.author = info.authors.first().cloned();
        result.year = info
            .published_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());
        result.description = info.description;
        result.genres = info.categories;
        result.rating = info.average_rating;
        result.vote_count = info.ratings_count;
        result
            .external_ids
            .insert("book_volume_id".to_string(), volume.id);
        for ident in info.industry_identifiers {
            match ident.kind.as_str() {
                "ISBN_13" => {
                    result.external_ids.insert("isbn_13".to_string(), ident.identifier);
                }
                "ISBN_10" => {
                    result.external_ids.insert("isbn_10".to_string(), ident.identifier);
                }
                _ => {}
            }
        }
        result.confidence = if result.external_ids.contains_key("isbn_13")
            || result.external_ids.contains_key("isbn_10")
        {
            0.9
        } else {
            0.7
        };
        result.recognition_method = "api_search".to_string();
        Ok(Some(result))
    }

    async fn lookup_fallback(&self, query: &str) -> Result<Option<RecognitionResult>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/search.json", self.fallback_url))
            .query(&[("q", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Fallback book API returned {}",
                response.status()
            )));
        }

        let body: FallbackSearchResponse = response.json().await?;
        Ok(body.docs.into_iter().next().map(|doc| {
            let mut result = RecognitionResult::new(MediaType::Book, doc.title, PROVIDER_NAME);
            result.author = doc.author_name.first().cloned();
            result.year = doc.first_publish_year;
            result.confidence = 0.65;
            result.recognition_method = "api_fallback".to_string();
            result
        }))
    }
}

/// Title: the largest-area block among blocks with confidence >= 0.8.
/// Author: a "by <Name>" pattern in any block, else a name-shaped
/// smaller block.
fn extract_from_ocr(ocr: &OcrResult) -> BookHints {
    let mut hints = BookHints::default();

    let title_block = ocr
        .blocks
        .iter()
        .filter(|b| b.confidence >= OCR_TITLE_CONFIDENCE)
        .max_by(|a, b| {
            a.area()
                .partial_cmp(&b.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    if let Some(block) = title_block {
        hints.title = Some(block.text.trim().to_string());
    }

    for block in &ocr.blocks {
        if let Some(caps) = BY_AUTHOR_RE.captures(&block.text) {
            hints.author = Some(caps[1].trim().to_string());
            break;
        }
    }
    if hints.author.is_none() {
        let title_text = hints.title.as_deref().unwrap_or_default();
        hints.author = ocr
            .blocks
            .iter()
            .filter(|b| b.text.trim() != title_text)
            .find(|b| filename::looks_like_name(b.text.trim()))
            .map(|b| b.text.trim().to_string());
    }

    for block in &ocr.blocks {
        if let Some(isbn) = filename::extract_isbn(&block.text) {
            hints.isbn = Some(isbn);
            break;
        }
    }

    hints
}

fn extract_hints(request: &RecognitionRequest) -> BookHints {
    let parsed = filename::parse_book(&request.file_name);
    let mut hints = BookHints {
        title: (!parsed.title.is_empty()).then(|| parsed.title.clone()),
        author: parsed.author.clone(),
        year: parsed.year,
        isbn: parsed.isbn.clone(),
    };

    if let Some(ocr) = &request.ocr {
        let ocr_hints = extract_from_ocr(ocr);
        // OCR sees the actual cover; trust it over the filename
        if ocr_hints.title.is_some() {
            hints.title = ocr_hints.title;
        }
        if ocr_hints.author.is_some() {
            hints.author = ocr_hints.author;
        }
        if ocr_hints.isbn.is_some() {
            hints.isbn = ocr_hints.isbn;
        }
    }

    hints
}

#[async_trait::async_trait]
impl RecognitionProvider for BookProvider {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, ProviderError> {
        let hints = extract_hints(request);

        // ISBN short-circuit: a strong identifier beats any text search
        if let Some(isbn) = &hints.isbn {
            if let Some(mut result) = self.lookup(&format!("isbn:{isbn}")).await? {
                let key = if isbn.len() == 13 { "isbn_13" } else { "isbn_10" };
                result
                    .external_ids
                    .entry(key.to_string())
                    .or_insert_with(|| isbn.clone());
                result.recognition_method = "isbn".to_string();
                result.confidence = result.confidence.max(0.9);
                return Ok(result);
            }
        }

        let Some(title) = hints.title.clone() else {
            return Err(ProviderError::MissingField("title".to_string()));
        };

        let query = match &hints.author {
            Some(author) => format!("intitle:{title}+inauthor:{author}"),
            None => format!("intitle:{title}"),
        };
        if let Some(result) = self.lookup(&query).await? {
            return Ok(result);
        }

        let mut result = RecognitionResult::new(
            request.media_type.unwrap_or(MediaType::Book),
            title,
            PROVIDER_NAME,
        );
        result.author = hints.author;
        result.year = hints.year;
        if let Some(isbn) = hints.isbn {
            let key = if isbn.len() == 13 { "isbn_13" } else { "isbn_10" };
            result.external_ids.insert(key.to_string(), isbn);
            result.confidence = 0.75;
            result.recognition_method = "isbn".to_string();
        } else {
            result.confidence = 0.5;
            result.recognition_method = if request.ocr.is_some() { "ocr" } else { "filename" }.to_string();
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        media_type.is_readable() || media_type == MediaType::Audiobook
    }

    fn confidence_threshold(&self) -> f64 {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OcrTextBlock;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(primary: &str, fallback: &str) -> RecognitionConfig {
        RecognitionConfig {
            book_api_url: primary.to_string(),
            book_fallback_url: fallback.to_string(),
            request_timeout_seconds: 2,
            ..RecognitionConfig::default()
        }
    }

    fn request(file_name: &str, ocr: Option<OcrResult>) -> RecognitionRequest {
        RecognitionRequest {
            file_name: file_name.to_string(),
            file_hash: "h".to_string(),
            ocr,
            ..RecognitionRequest::default()
        }
    }

    fn block(text: &str, w: f64, h: f64, confidence: f64) -> OcrTextBlock {
        OcrTextBlock {
            text: text.to_string(),
            x: 0.0,
            y: 0.0,
            width: w,
            height: h,
            confidence,
        }
    }

    // ========== OCR Extraction ==========

    #[test]
    fn test_ocr_title_is_largest_confident_block() {
        let ocr = OcrResult {
            blocks: vec![
                block("PENGUIN CLASSICS", 100.0, 20.0, 0.95),
                block("DUNE", 300.0, 120.0, 0.92),
                block("GIANT BLURRY TEXT", 400.0, 200.0, 0.4),
            ],
            language: None,
        };
        let hints = extract_from_ocr(&ocr);
        assert_eq!(hints.title.as_deref(), Some("DUNE"));
    }

    #[test]
    fn test_ocr_author_by_pattern() {
        let ocr = OcrResult {
            blocks: vec![
                block("DUNE", 300.0, 120.0, 0.92),
                block("a novel by Frank Herbert", 150.0, 30.0, 0.85),
            ],
            language: None,
        };
        let hints = extract_from_ocr(&ocr);
        assert_eq!(hints.author.as_deref(), Some("Frank Herbert"));
    }

    #[test]
    fn test_ocr_author_name_shaped_block() {
        let ocr = OcrResult {
            blocks: vec![
                block("NEUROMANCER", 300.0, 120.0, 0.92),
                block("William Gibson", 150.0, 30.0, 0.88),
            ],
            language: None,
        };
        let hints = extract_from_ocr(&ocr);
        assert_eq!(hints.author.as_deref(), Some("William Gibson"));
    }

    // ========== ISBN Short-Circuit ==========

    #[tokio::test]
    async fn test_isbn_lookup_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .and(query_param("q", "isbn:9780441013593"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "vol-1",
                    "volumeInfo": {
                        "title": "Dune",
                        "authors": ["Frank Herbert"],
                        "publishedDate": "1965-08-01",
                        "industryIdentifiers": [
                            {"type": "ISBN_13", "identifier": "9780441013593"}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider = BookProvider::new(&config(&server.uri(), "")).unwrap();
        let result = provider
            .recognize(&request("Dune 978-0-441-01359-3.epub", None))
            .await
            .unwrap();

        assert_eq!(result.title, "Dune");
        assert_eq!(result.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(result.recognition_method, "isbn");
        assert_eq!(result.external_ids.get("isbn_13").unwrap(), "9780441013593");
        assert!(result.confidence >= 0.9);
    }

    #[tokio::test]
    async fn test_offline_isbn_still_recognized_from_filename() {
        let provider = BookProvider::new(&config("", "")).unwrap();
        let result = provider
            .recognize(&request("Dune 978-0-441-01359-3.epub", None))
            .await
            .unwrap();

        assert_eq!(result.title, "Dune");
        assert_eq!(result.external_ids.get("isbn_13").unwrap(), "9780441013593");
        assert_eq!(result.recognition_method, "isbn");
    }

    #[tokio::test]
    async fn test_author_title_filename_fallback() {
        let provider = BookProvider::new(&config("", "")).unwrap();
        let result = provider
            .recognize(&request("Frank Herbert - Dune.epub", None))
            .await
            .unwrap();

        assert_eq!(result.title, "Dune");
        assert_eq!(result.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(result.recognition_method, "filename");
    }

    #[tokio::test]
    async fn test_fallback_api_used_when_primary_empty() {
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "docs": [{
                    "title": "Neuromancer",
                    "author_name": ["William Gibson"],
                    "first_publish_year": 1984
                }]
            })))
            .mount(&fallback)
            .await;

        let provider = BookProvider::new(&config(&primary.uri(), &fallback.uri())).unwrap();
        let result = provider
            .recognize(&request("Neuromancer - William Gibson.epub", None))
            .await
            .unwrap();

        assert_eq!(result.recognition_method, "api_fallback");
        assert_eq!(result.year, Some(1984));
    }

    #[test]
    fn test_supported_media_types() {
        let provider = BookProvider::new(&config("", "")).unwrap();
        assert!(provider.supports_media_type(MediaType::Book));
        assert!(provider.supports_media_type(MediaType::ComicBook));
        assert!(provider.supports_media_type(MediaType::Magazine));
        assert!(!provider.supports_media_type(MediaType::Movie));
    }
}
