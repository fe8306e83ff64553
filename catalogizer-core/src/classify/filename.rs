//! Pure filename/path parsers
//!
//! Deterministic and side-effect-free: identical inputs always produce
//! identical outputs regardless of environment. Release-name noise
//! (quality, codec and audio tags, bracketed groups) is stripped before
//! a title is extracted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Free-standing 19xx/20xx token; the last occurrence wins
static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s._\-\(\)\[\]])((?:19|20)\d{2})(?:[\s._\-\(\)\[\]]|$)")
        .expect("year regex")
});

/// S01E02-style episode marker
static SEASON_EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})[\s._-]?E(\d{1,2})\b").expect("sXXeYY regex"));

/// 1x02-style episode marker
static CROSS_EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})x(\d{1,2})\b").expect("NxM regex"));

/// Bare "Season N" marker (common on directories)
static SEASON_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bseason[\s._-]*(\d{1,2})\b").expect("season regex"));

/// ISBN-13 with optional separators
static ISBN13_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b97[89](?:[\s-]?\d){10}\b").expect("isbn13 regex"));

/// ISBN-10 with optional separators; the check digit may be X
static ISBN10_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[\s-]?){9}[\dXx]\b").expect("isbn10 regex"));

/// Release noise removed before title extraction
static NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(720p|1080p|4k|hdtv|webrip|bluray|dvdrip|xvid|x264|h264|h265|hevc|aac|ac3|dts|mp3)\b",
    )
    .expect("noise regex")
});

/// Bracketed/parenthesized release-group content
static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").expect("bracket regex"));

/// "Author (YYYY) Title" book naming
static AUTHOR_YEAR_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\(((?:19|20)\d{2})\)\s*(.+)$").expect("author-year regex"));

/// "Title by Author" book naming
static TITLE_BY_AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+by\s+(.+)$").expect("by-author regex"));

/// Season/episode extracted from a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonEpisode {
    pub season: u32,
    /// None for bare "Season N" markers
    pub episode: Option<u32>,
}

/// Everything the classifier could read out of one name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedName {
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub isbn: Option<String>,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Coarse hint: tv_show, book, music_album
    pub type_hint: Option<&'static str>,
}

/// Extract the year: the last free-standing `(19|20)\d{2}` token
#[must_use]
pub fn extract_year(name: &str) -> Option<i32> {
    // Overlapping boundaries ("1999.2003") defeat captures_iter, so walk
    // manually from each match end.
    let mut last = None;
    let mut start = 0;
    while let Some(caps) = YEAR_RE.captures(&name[start..]) {
        let m = caps.get(1).expect("year group");
        last = m.as_str().parse::<i32>().ok();
        start += m.end();
        if start >= name.len() {
            break;
        }
    }
    last
}

/// Extract a season/episode marker: `S01E02`, `1x02` or `Season 1`
#[must_use]
pub fn extract_season_episode(name: &str) -> Option<SeasonEpisode> {
    if let Some(caps) = SEASON_EPISODE_RE.captures(name) {
        return Some(SeasonEpisode {
            season: caps[1].parse().ok()?,
            episode: Some(caps[2].parse().ok()?),
        });
    }
    if let Some(caps) = CROSS_EPISODE_RE.captures(name) {
        return Some(SeasonEpisode {
            season: caps[1].parse().ok()?,
            episode: Some(caps[2].parse().ok()?),
        });
    }
    if let Some(caps) = SEASON_ONLY_RE.captures(name) {
        return Some(SeasonEpisode {
            season: caps[1].parse().ok()?,
            episode: None,
        });
    }
    None
}

/// Extract an ISBN, normalized to digits only (uppercase X preserved)
#[must_use]
pub fn extract_isbn(name: &str) -> Option<String> {
    if let Some(m) = ISBN13_RE.find(name) {
        return Some(normalize_isbn(m.as_str()));
    }
    if let Some(m) = ISBN10_RE.find(name) {
        let normalized = normalize_isbn(m.as_str());
        // A bare 10-digit run is more often a phone number or id than an
        // ISBN; require a separator or the X check digit as evidence.
        if m.as_str().contains('-') || m.as_str().contains(' ') || normalized.ends_with('X') {
            return Some(normalized);
        }
    }
    None
}

fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Strip the extension, release noise, year/episode markers and bracketed
/// content; normalize `._-` to spaces and collapse whitespace.
#[must_use]
pub fn clean_title(name: &str) -> String {
    let stem = strip_extension(name);
    let mut s = BRACKETED_RE.replace_all(stem, " ").into_owned();
    s = ISBN13_RE.replace_all(&s, " ").into_owned();
    s = ISBN10_RE.replace_all(&s, " ").into_owned();
    s = SEASON_EPISODE_RE.replace_all(&s, " ").into_owned();
    s = CROSS_EPISODE_RE.replace_all(&s, " ").into_owned();
    s = SEASON_ONLY_RE.replace_all(&s, " ").into_owned();
    s = NOISE_RE.replace_all(&s, " ").into_owned();
    s = s.replace(['.', '_', '-'], " ");
    // Year tokens are now space-delimited; drop the last one, which is
    // the extracted release year ("2001 A Space Odyssey 1968" keeps its
    // leading 2001)
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    if let Some(idx) = tokens.iter().rposition(|t| is_year_token(t)) {
        tokens.remove(idx);
    }
    tokens.join(" ").trim().to_string()
}

fn is_year_token(token: &str) -> bool {
    token.len() == 4
        && (token.starts_with("19") || token.starts_with("20"))
        && token.chars().all(|c| c.is_ascii_digit())
}

/// Remove a trailing `.ext` when it looks like a file extension
#[must_use]
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    }
}

/// Whether a string is shaped like a person's name:
/// 2-4 tokens, each starting with an uppercase letter.
#[must_use]
pub fn looks_like_name(s: &str) -> bool {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    tokens
        .iter()
        .all(|t| t.chars().next().is_some_and(char::is_uppercase))
}

/// Parse a filename or directory name with no domain assumption
#[must_use]
pub fn parse(name: &str) -> ParsedName {
    let year = extract_year(name);
    let se = extract_season_episode(name);
    let isbn = extract_isbn(name);
    let title = clean_title(name);

    let type_hint = if se.is_some() {
        Some("tv_show")
    } else if isbn.is_some() {
        Some("book")
    } else {
        None
    };

    ParsedName {
        title,
        year,
        season: se.map(|v| v.season),
        episode: se.and_then(|v| v.episode),
        isbn,
        author: None,
        artist: None,
        album: None,
        type_hint,
    }
}

/// Parse a book name: `Author - Title`, `Title - Author`,
/// `Author (YYYY) Title`, `Title by Author`. An ambiguous `X - Y` split
/// treats X as the author iff it is shaped like a name.
#[must_use]
pub fn parse_book(name: &str) -> ParsedName {
    let mut parsed = parse(name);
    parsed.type_hint = Some("book");

    // Work on the de-noised stem but retain separators for splitting
    let stem = strip_extension(name);
    let without_isbn = ISBN13_RE.replace_all(stem, " ").into_owned();
    let without_isbn = ISBN10_RE.replace_all(&without_isbn, " ").into_owned();

    if let Some(caps) = AUTHOR_YEAR_TITLE_RE.captures(without_isbn.trim()) {
        let candidate_author = clean_fragment(&caps[1]);
        let candidate_title = clean_fragment(&caps[3]);
        if looks_like_name(&candidate_author) && !candidate_title.is_empty() {
            parsed.author = Some(candidate_author);
            parsed.title = candidate_title;
            parsed.year = caps[2].parse().ok();
            return parsed;
        }
    }

    if let Some((left, right)) = split_once_dash(&without_isbn) {
        let left = clean_fragment(&left);
        let right = clean_fragment(&right);
        if !left.is_empty() && !right.is_empty() {
            if looks_like_name(&left) {
                parsed.author = Some(left);
                parsed.title = right;
            } else if looks_like_name(&right) {
                parsed.title = left;
                parsed.author = Some(right);
            } else {
                parsed.title = format!("{left} {right}");
            }
            return parsed;
        }
    }

    if let Some(caps) = TITLE_BY_AUTHOR_RE.captures(without_isbn.trim()) {
        let title = clean_fragment(&caps[1]);
        let author = clean_fragment(&caps[2]);
        if !title.is_empty() && !author.is_empty() {
            parsed.title = title;
            parsed.author = Some(author);
            return parsed;
        }
    }

    parsed
}

/// Parse a music name: `Artist - Album` with the name-shape heuristic
#[must_use]
pub fn parse_music(name: &str) -> ParsedName {
    let mut parsed = parse(name);

    if let Some((left, right)) = split_once_dash(strip_extension(name)) {
        let left = clean_fragment(&left);
        let right = clean_fragment(&right);
        if !left.is_empty() && !right.is_empty() {
            parsed.artist = Some(left);
            parsed.album = Some(right.clone());
            parsed.title = right;
            parsed.type_hint = Some("music_album");
        }
    }

    parsed
}

/// Whether a name carries the `Artist - Album` shape
#[must_use]
pub fn has_artist_album_pattern(name: &str) -> bool {
    split_once_dash(name).is_some()
}

/// Split on the first " - " separator (spaced dash only, so hyphenated
/// words survive)
fn split_once_dash(s: &str) -> Option<(String, String)> {
    s.split_once(" - ")
        .map(|(a, b)| (a.to_string(), b.to_string()))
}

fn clean_fragment(fragment: &str) -> String {
    clean_title(fragment.trim())
}
