//! Media catalog models
//!
//! A `MediaItem` is a logical work (movie, album, book); the files that
//! instantiate it are linked through `MediaFile` join rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::id::{FileId, MediaItemId, StorageRootId};

/// Closed enumeration of recognized media types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    TvSeries,
    TvEpisode,
    Concert,
    Documentary,
    Course,
    Training,
    Music,
    Album,
    Audiobook,
    Podcast,
    Book,
    Ebook,
    ComicBook,
    Magazine,
    Newspaper,
    Journal,
    Manual,
    Game,
    Software,
    Document,
    Image,
    Unknown,
}

impl MediaType {
    /// Canonical snake_case name, matching `media_types.name`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::TvSeries => "tv_series",
            Self::TvEpisode => "tv_episode",
            Self::Concert => "concert",
            Self::Documentary => "documentary",
            Self::Course => "course",
            Self::Training => "training",
            Self::Music => "music",
            Self::Album => "album",
            Self::Audiobook => "audiobook",
            Self::Podcast => "podcast",
            Self::Book => "book",
            Self::Ebook => "ebook",
            Self::ComicBook => "comic_book",
            Self::Magazine => "magazine",
            Self::Newspaper => "newspaper",
            Self::Journal => "journal",
            Self::Manual => "manual",
            Self::Game => "game",
            Self::Software => "software",
            Self::Document => "document",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }

    /// Resolve a detection name to a canonical type.
    ///
    /// Directory-level detection emits the aggregate names `tv_show` and
    /// `music_album`; both map onto their canonical entries. Unknown names
    /// resolve to `Unknown` so a stale `media_types` row never aborts a scan.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "movie" => Self::Movie,
            "tv_series" | "tv_show" => Self::TvSeries,
            "tv_episode" => Self::TvEpisode,
            "concert" => Self::Concert,
            "documentary" => Self::Documentary,
            "course" => Self::Course,
            "training" => Self::Training,
            "music" => Self::Music,
            "album" | "music_album" => Self::Album,
            "audiobook" => Self::Audiobook,
            "podcast" => Self::Podcast,
            "book" => Self::Book,
            "ebook" => Self::Ebook,
            "comic_book" => Self::ComicBook,
            "magazine" => Self::Magazine,
            "newspaper" => Self::Newspaper,
            "journal" => Self::Journal,
            "manual" => Self::Manual,
            "game" => Self::Game,
            "software" => Self::Software,
            "document" => Self::Document,
            "image" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Whether items of this type are playable audio tracks
    #[must_use]
    pub const fn is_audio(self) -> bool {
        matches!(self, Self::Music | Self::Audiobook | Self::Podcast)
    }

    /// Whether items of this type are readable documents
    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(
            self,
            Self::Book
                | Self::Ebook
                | Self::ComicBook
                | Self::Magazine
                | Self::Newspaper
                | Self::Journal
                | Self::Manual
                | Self::Document
        )
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row in `media_types`; detection names may alias canonical types
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaTypeRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub detection_patterns: Option<JsonValue>,
    pub metadata_providers: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse map of external provider IDs (`imdb_id`, `tmdb_id`,
/// `musicbrainz_id`, `isbn_13`, `igdb_id`, ...). A strong join key
/// whenever present.
pub type ExternalIds = HashMap<String, String>;

/// A logical media entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaItem {
    pub id: MediaItemId,
    pub media_type_id: i32,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub cast_crew: Option<JsonValue>,
    pub rating: Option<f64>,
    pub runtime: Option<i32>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub status: String,
    /// A TV episode's parent is its series; an album track's parent is
    /// its album; an album's parent is its artist entity.
    pub parent_id: Option<MediaItemId>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub track_number: Option<i32>,
    pub first_detected: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Join row linking a `MediaItem` to one of its files
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaFile {
    pub id: FileId,
    pub media_item_id: MediaItemId,
    pub file_id: FileId,
    pub quality_info: Option<JsonValue>,
    pub language: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Group of files sharing a content hash.
/// A group is deleted when it holds fewer than 2 members.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DuplicateGroup {
    pub id: String,
    pub file_hash: String,
    pub file_count: i32,
    pub total_size: i64,
    pub created_at: DateTime<Utc>,
}

/// In-flight accumulation of a directory's contents during a scan.
/// Produced by the aggregator, consumed by recognition; never persisted.
#[derive(Debug, Clone, Default)]
pub struct DirectoryInfo {
    pub path: String,
    pub name: String,
    pub file_count: usize,
    pub total_size: i64,
    pub file_ids: Vec<FileId>,
    /// extension -> count histogram
    pub file_types: HashMap<String, usize>,
}

impl DirectoryInfo {
    /// Extensions present in this directory, lowercased, unordered
    #[must_use]
    pub fn extensions(&self) -> Vec<String> {
        self.file_types.keys().cloned().collect()
    }

    /// Count of files carrying one of the given extensions
    #[must_use]
    pub fn count_with_extensions(&self, extensions: &[&str]) -> usize {
        extensions
            .iter()
            .filter_map(|ext| self.file_types.get(*ext))
            .sum()
    }
}

/// Per-directory record asserting which `MediaItem` a directory represents.
/// Invariant: one analysis per directory path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryAnalysis {
    pub id: String,
    pub directory_path: String,
    pub storage_root: StorageRootId,
    pub media_item_id: MediaItemId,
    /// in [0, 1]
    pub confidence_score: f64,
    pub detection_method: String,
    pub analysis_data: JsonValue,
    pub last_analyzed: DateTime<Utc>,
    pub files_count: i32,
    pub total_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== MediaType Name Mapping ==========

    #[test]
    fn test_media_type_round_trip() {
        for ty in [
            MediaType::Movie,
            MediaType::TvSeries,
            MediaType::TvEpisode,
            MediaType::Album,
            MediaType::ComicBook,
            MediaType::Unknown,
        ] {
            assert_eq!(MediaType::from_name(ty.as_str()), ty);
        }
    }

    #[test]
    fn test_directory_detection_aliases() {
        assert_eq!(MediaType::from_name("tv_show"), MediaType::TvSeries);
        assert_eq!(MediaType::from_name("music_album"), MediaType::Album);
    }

    #[test]
    fn test_unknown_name_resolves_to_unknown() {
        assert_eq!(MediaType::from_name("hologram"), MediaType::Unknown);
        assert_eq!(MediaType::from_name(""), MediaType::Unknown);
    }

    #[test]
    fn test_type_classes() {
        assert!(MediaType::Music.is_audio());
        assert!(MediaType::Audiobook.is_audio());
        assert!(!MediaType::Movie.is_audio());
        assert!(MediaType::Book.is_readable());
        assert!(MediaType::ComicBook.is_readable());
        assert!(!MediaType::Game.is_readable());
    }

    // ========== DirectoryInfo Histogram ==========

    #[test]
    fn test_directory_info_extension_counts() {
        let mut info = DirectoryInfo {
            path: "/media/show/Season 1".to_string(),
            name: "Season 1".to_string(),
            ..Default::default()
        };
        info.file_types.insert("mkv".to_string(), 8);
        info.file_types.insert("srt".to_string(), 8);
        info.file_count = 16;

        assert_eq!(info.count_with_extensions(&["mkv", "mp4"]), 8);
        assert_eq!(info.count_with_extensions(&["iso"]), 0);
    }
}
