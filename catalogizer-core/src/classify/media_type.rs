//! Media type detection from MIME + filename signals
//!
//! File-level detection walks a fixed rule chain, first match wins.
//! Directory-level detection reclassifies with file-count and
//! extension-histogram heuristics, damping confidence by the fraction of
//! relevant files matching the inferred type.

use crate::models::{DirectoryInfo, MediaType};

use super::filename::{self, ParsedName};

/// A detection with its confidence, always in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub media_type: MediaType,
    pub confidence: f64,
}

impl Detection {
    const fn new(media_type: MediaType, confidence: f64) -> Self {
        Self {
            media_type,
            confidence,
        }
    }
}

/// Directory-level detection keeps the detection *name* since directory
/// aggregates (tv_show, music_album) alias canonical types
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryDetection {
    pub type_name: String,
    pub confidence: f64,
}

const VIDEO_EXTENSIONS: [&str; 9] = [
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg",
];
const AUDIO_EXTENSIONS: [&str; 9] = [
    "mp3", "flac", "ogg", "m4a", "wav", "aac", "wma", "opus", "ape",
];
const EBOOK_EXTENSIONS: [&str; 5] = ["epub", "mobi", "azw", "azw3", "fb2"];
const COMIC_EXTENSIONS: [&str; 4] = ["cbz", "cbr", "cb7", "cbt"];
const EXECUTABLE_EXTENSIONS: [&str; 5] = ["exe", "msi", "apk", "dmg", "deb"];
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Files that accompany media without being media themselves; excluded
/// from the directory match fraction
const COMPANION_EXTENSIONS: [&str; 10] = [
    "srt", "sub", "idx", "nfo", "txt", "jpg", "jpeg", "png", "sfv", "md5",
];

const CONCERT_KEYWORDS: [&str; 4] = ["concert", "live at", "unplugged", "tour"];
const DOCUMENTARY_KEYWORDS: [&str; 3] = ["documentary", "docu", "biography"];
const COURSE_KEYWORDS: [&str; 5] = ["course", "tutorial", "lecture", "lesson", "masterclass"];
const AUDIOBOOK_KEYWORDS: [&str; 3] = ["audiobook", "unabridged", "narrated"];
const PODCAST_KEYWORDS: [&str; 2] = ["podcast", "episode"];
const COMIC_KEYWORDS: [&str; 3] = ["comic", "manga", "graphic novel"];
const MAGAZINE_KEYWORDS: [&str; 3] = ["magazine", "issue", "weekly"];
const MANUAL_KEYWORDS: [&str; 4] = ["manual", "handbook", "reference guide", "documentation"];
const BOOK_KEYWORDS: [&str; 3] = ["novel", "book", "edition"];
const GAME_KEYWORDS: [&str; 5] = ["game", "repack", "gog", "codex", "fitgirl"];

/// Stateless media-type detector
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaTypeDetector;

impl MediaTypeDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Detect a file's media type from its MIME type and name.
    /// Rules apply in order; the first match wins.
    #[must_use]
    pub fn detect(
        &self,
        mime_type: &str,
        file_name: &str,
        directory_context: Option<&str>,
    ) -> Detection {
        let mime = if mime_type.is_empty() {
            // Rule 6: empty MIME falls back to the extension table
            extension_to_mime(file_name)
        } else {
            mime_type.to_lowercase()
        };
        let lower_name = file_name.to_lowercase();
        let context = directory_context.map(str::to_lowercase);
        let haystack = match &context {
            Some(ctx) => format!("{lower_name} {ctx}"),
            None => lower_name.clone(),
        };

        if mime.starts_with("video/") {
            return Self::detect_video(&lower_name, &haystack);
        }
        if mime.starts_with("audio/") {
            return Self::detect_audio(&haystack);
        }
        if is_document_mime(&mime) {
            return Self::detect_document(&lower_name, &haystack);
        }
        if is_executable_mime(&mime) {
            return Self::detect_executable(&haystack);
        }
        if mime.starts_with("image/") {
            return Detection::new(MediaType::Image, 0.9);
        }

        Detection::new(MediaType::Unknown, 0.3)
    }

    fn detect_video(file_name: &str, haystack: &str) -> Detection {
        if filename::extract_season_episode(file_name).is_some() {
            return Detection::new(MediaType::TvEpisode, 0.85);
        }
        if contains_any(haystack, &CONCERT_KEYWORDS) {
            return Detection::new(MediaType::Concert, 0.75);
        }
        if contains_any(haystack, &DOCUMENTARY_KEYWORDS) {
            return Detection::new(MediaType::Documentary, 0.75);
        }
        if contains_any(haystack, &COURSE_KEYWORDS) {
            return Detection::new(MediaType::Course, 0.75);
        }
        Detection::new(MediaType::Movie, 0.7)
    }

    fn detect_audio(haystack: &str) -> Detection {
        if contains_any(haystack, &AUDIOBOOK_KEYWORDS)
            || (haystack.contains("chapter") && haystack.contains("part"))
        {
            return Detection::new(MediaType::Audiobook, 0.75);
        }
        if contains_any(haystack, &PODCAST_KEYWORDS) && haystack.contains("podcast") {
            return Detection::new(MediaType::Podcast, 0.75);
        }
        Detection::new(MediaType::Music, 0.8)
    }

    fn detect_document(file_name: &str, haystack: &str) -> Detection {
        if has_extension(file_name, &COMIC_EXTENSIONS) || contains_any(haystack, &COMIC_KEYWORDS) {
            return Detection::new(MediaType::ComicBook, 0.75);
        }
        if contains_any(haystack, &MAGAZINE_KEYWORDS) && contains_date_token(haystack) {
            return Detection::new(MediaType::Magazine, 0.7);
        }
        if contains_any(haystack, &MANUAL_KEYWORDS) {
            return Detection::new(MediaType::Manual, 0.7);
        }
        if has_extension(file_name, &EBOOK_EXTENSIONS) || contains_any(haystack, &BOOK_KEYWORDS) {
            return Detection::new(MediaType::Book, 0.7);
        }
        Detection::new(MediaType::Document, 0.6)
    }

    fn detect_executable(haystack: &str) -> Detection {
        if contains_any(haystack, &GAME_KEYWORDS) {
            return Detection::new(MediaType::Game, 0.7);
        }
        Detection::new(MediaType::Software, 0.65)
    }

    /// Reclassify at the directory level using the extension histogram.
    ///
    /// Base confidence for a directory-level match is 0.8; it is damped by
    /// the fraction of relevant (non-companion) files matching the
    /// inferred type.
    #[must_use]
    pub fn classify_directory(
        &self,
        info: &DirectoryInfo,
        parsed: &ParsedName,
    ) -> DirectoryDetection {
        const BASE: f64 = 0.8;

        let video_count = info.count_with_extensions(&VIDEO_EXTENSIONS);
        let audio_count = info.count_with_extensions(&AUDIO_EXTENSIONS);
        let ebook_count = info.count_with_extensions(&EBOOK_EXTENSIONS)
            + info.count_with_extensions(&["pdf"]);
        let iso_count = info.count_with_extensions(&["iso"]);
        let companion_count = info.count_with_extensions(&COMPANION_EXTENSIONS);
        let relevant = info.file_count.saturating_sub(companion_count).max(1);

        let season_in_name = parsed.season.is_some()
            || filename::extract_season_episode(&info.name).is_some();
        if video_count >= 5 && season_in_name {
            return DirectoryDetection {
                type_name: "tv_show".to_string(),
                confidence: damp(BASE, video_count, relevant),
            };
        }

        if audio_count >= 3 && filename::has_artist_album_pattern(&info.name) {
            return DirectoryDetection {
                type_name: "music_album".to_string(),
                confidence: damp(BASE, audio_count, relevant),
            };
        }

        if iso_count == 1 && relevant == 1 {
            return DirectoryDetection {
                type_name: "software".to_string(),
                confidence: BASE,
            };
        }

        // Dominant-category fallback
        if video_count > 0 && video_count >= audio_count && video_count >= ebook_count {
            let type_name = if season_in_name { "tv_show" } else { "movie" };
            return DirectoryDetection {
                type_name: type_name.to_string(),
                confidence: damp(BASE, video_count, relevant),
            };
        }
        if audio_count > 0 && audio_count >= ebook_count {
            let type_name = if audio_count >= 3 { "music_album" } else { "music" };
            return DirectoryDetection {
                type_name: type_name.to_string(),
                confidence: damp(BASE, audio_count, relevant),
            };
        }
        if ebook_count > 0 {
            return DirectoryDetection {
                type_name: "book".to_string(),
                confidence: damp(BASE, ebook_count, relevant),
            };
        }

        DirectoryDetection {
            type_name: "unknown".to_string(),
            confidence: 0.3,
        }
    }
}

/// Damp `base` by the matching fraction, clamped to [0, 1]
fn damp(base: f64, matching: usize, relevant: usize) -> f64 {
    let fraction = (matching as f64 / relevant as f64).min(1.0);
    (base * fraction).clamp(0.0, 1.0)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.contains(&ext.to_lowercase().as_str()))
}

/// Month names or a yyyy-mm shape, as seen in magazine issues
fn contains_date_token(haystack: &str) -> bool {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    contains_any(haystack, &MONTHS) || filename::extract_year(haystack).is_some()
}

fn is_document_mime(mime: &str) -> bool {
    matches!(
        mime,
        "application/pdf"
            | "application/epub+zip"
            | "application/x-mobipocket-ebook"
            | "application/vnd.amazon.ebook"
            | "application/vnd.comicbook+zip"
    )
}

fn is_executable_mime(mime: &str) -> bool {
    matches!(
        mime,
        "application/x-msdownload"
            | "application/x-ms-dos-executable"
            | "application/x-executable"
            | "application/x-iso9660-image"
            | "application/vnd.microsoft.portable-executable"
            | "application/vnd.android.package-archive"
    )
}

/// Extension fallback table for files with no MIME information
fn extension_to_mime(file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();
    let ext = ext.as_str();

    if VIDEO_EXTENSIONS.contains(&ext) {
        return "video/x-unknown".to_string();
    }
    if AUDIO_EXTENSIONS.contains(&ext) {
        return "audio/x-unknown".to_string();
    }
    if ext == "pdf" {
        return "application/pdf".to_string();
    }
    if EBOOK_EXTENSIONS.contains(&ext) {
        return "application/epub+zip".to_string();
    }
    if COMIC_EXTENSIONS.contains(&ext) {
        return "application/vnd.comicbook+zip".to_string();
    }
    if EXECUTABLE_EXTENSIONS.contains(&ext) {
        return "application/x-msdownload".to_string();
    }
    if ext == "iso" {
        return "application/x-iso9660-image".to_string();
    }
    if IMAGE_EXTENSIONS.contains(&ext) {
        return "image/x-unknown".to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn detector() -> MediaTypeDetector {
        MediaTypeDetector::new()
    }

    fn dir_info(name: &str, types: &[(&str, usize)]) -> DirectoryInfo {
        let file_types: HashMap<String, usize> = types
            .iter()
            .map(|(ext, count)| ((*ext).to_string(), *count))
            .collect();
        DirectoryInfo {
            path: format!("/media/{name}"),
            name: name.to_string(),
            file_count: file_types.values().sum(),
            total_size: 0,
            file_ids: Vec::new(),
            file_types,
        }
    }

    // ========== File-Level Rules ==========

    #[test]
    fn test_video_without_tv_pattern_is_movie() {
        let d = detector().detect("video/x-matroska", "The.Matrix.1999.1080p.mkv", None);
        assert_eq!(d.media_type, MediaType::Movie);
        assert!(d.confidence >= 0.7);
    }

    #[test]
    fn test_video_with_tv_pattern_is_episode() {
        let d = detector().detect("video/x-matroska", "Breaking Bad S01E01.mkv", None);
        assert_eq!(d.media_type, MediaType::TvEpisode);
    }

    #[test]
    fn test_video_concert_keyword() {
        let d = detector().detect("video/mp4", "Queen Live At Wembley.mp4", None);
        assert_eq!(d.media_type, MediaType::Concert);
    }

    #[test]
    fn test_video_course_keyword_from_context() {
        let d = detector().detect("video/mp4", "01-intro.mp4", Some("Rust Course"));
        assert_eq!(d.media_type, MediaType::Course);
    }

    #[test]
    fn test_audio_defaults_to_music() {
        let d = detector().detect("audio/mpeg", "01 - Speak to Me.mp3", None);
        assert_eq!(d.media_type, MediaType::Music);
        assert!((d.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_audio_audiobook_pattern() {
        let d = detector().detect("audio/mpeg", "Dune Unabridged Part 01.mp3", None);
        assert_eq!(d.media_type, MediaType::Audiobook);
    }

    #[test]
    fn test_pdf_defaults_to_document() {
        let d = detector().detect("application/pdf", "scan-0042.pdf", None);
        assert_eq!(d.media_type, MediaType::Document);
    }

    #[test]
    fn test_epub_extension_is_book() {
        let d = detector().detect("application/epub+zip", "Dune.epub", None);
        assert_eq!(d.media_type, MediaType::Book);
    }

    #[test]
    fn test_comic_extension_wins_over_book() {
        let d = detector().detect("", "Watchmen #1.cbz", None);
        assert_eq!(d.media_type, MediaType::ComicBook);
    }

    #[test]
    fn test_magazine_needs_date_token() {
        let d = detector().detect("application/pdf", "Wired Magazine June.pdf", None);
        assert_eq!(d.media_type, MediaType::Magazine);

        let without_date = detector().detect("application/pdf", "Magazine rack plans.pdf", None);
        assert_ne!(without_date.media_type, MediaType::Magazine);
    }

    #[test]
    fn test_executable_game_keyword() {
        let d = detector().detect("application/x-msdownload", "cool_game_setup.exe", None);
        assert_eq!(d.media_type, MediaType::Game);
    }

    #[test]
    fn test_executable_defaults_to_software() {
        let d = detector().detect("application/x-msdownload", "office_installer.exe", None);
        assert_eq!(d.media_type, MediaType::Software);
    }

    #[test]
    fn test_image_mime() {
        let d = detector().detect("image/png", "cover.png", None);
        assert_eq!(d.media_type, MediaType::Image);
    }

    #[test]
    fn test_empty_mime_uses_extension_table() {
        let d = detector().detect("", "movie.mkv", None);
        assert_eq!(d.media_type, MediaType::Movie);

        let d = detector().detect("", "track.flac", None);
        assert_eq!(d.media_type, MediaType::Music);
    }

    #[test]
    fn test_unmatched_is_unknown() {
        let d = detector().detect("application/octet-stream", "blob.bin", None);
        assert_eq!(d.media_type, MediaType::Unknown);
        assert!((d.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        for (mime, name) in [
            ("video/mp4", "a.mp4"),
            ("audio/mpeg", "b.mp3"),
            ("application/pdf", "c.pdf"),
            ("", "d.unknownext"),
            ("image/png", "e.png"),
        ] {
            let d = detector().detect(mime, name, None);
            assert!((0.0..=1.0).contains(&d.confidence));
        }
    }

    // ========== Directory-Level Rules ==========

    #[test]
    fn test_directory_season_folder_is_tv_show() {
        let info = dir_info("Season 1", &[("mkv", 8), ("srt", 8)]);
        let parsed = filename::parse("Season 1");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "tv_show");
        // all 8 relevant files match
        assert!((d.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_directory_artist_album_is_music_album() {
        let info = dir_info("Pink Floyd - The Wall", &[("flac", 12), ("jpg", 1)]);
        let parsed = filename::parse_music("Pink Floyd - The Wall");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "music_album");
        assert!((d.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_directory_single_iso_is_software() {
        let info = dir_info("SomeTool v2", &[("iso", 1)]);
        let parsed = filename::parse("SomeTool v2");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "software");
    }

    #[test]
    fn test_directory_movie_confidence_ignores_companions() {
        // Scenario: one mkv + one srt; the subtitle is a companion, so the
        // match fraction is 1/1 and confidence stays at 0.8
        let info = dir_info("The Matrix (1999)", &[("mkv", 1), ("srt", 1)]);
        let parsed = filename::parse("The Matrix (1999)");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "movie");
        assert!((d.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_directory_mixed_contents_damp_confidence() {
        // 3 of 6 relevant files are video
        let info = dir_info("Mixed Stuff", &[("mkv", 3), ("pdf", 3)]);
        let parsed = filename::parse("Mixed Stuff");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "movie");
        assert!((d.confidence - 0.4).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&d.confidence));
    }

    #[test]
    fn test_directory_empty_histogram_is_unknown() {
        let info = dir_info("Empty", &[]);
        let parsed = filename::parse("Empty");
        let d = detector().classify_directory(&info, &parsed);
        assert_eq!(d.type_name, "unknown");
    }
}
