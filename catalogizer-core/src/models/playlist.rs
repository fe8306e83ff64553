//! Playlist models and smart-playlist criteria

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::id::{MediaItemId, PlaylistId, UserId};

/// A user playlist; membership is explicit unless `is_smart_playlist`,
/// in which case `smart_criteria` defines it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub is_smart_playlist: bool,
    pub smart_criteria: Option<SmartPlaylistCriteria>,
    pub track_count: i32,
    pub total_duration: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Playlist membership row.
/// Invariant: positions within a playlist form `{1..N}` with no gaps
/// after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlaylistItem {
    pub id: String,
    pub playlist_id: PlaylistId,
    pub media_item_id: MediaItemId,
    /// 1-based, dense
    pub position: i32,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
    pub custom_title: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

/// How a rule set combines its rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLogic {
    And,
    Or,
}

impl Default for RuleLogic {
    fn default() -> Self {
        Self::And
    }
}

/// A single declarative membership rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartRule {
    /// One of: genre, artist, album, year, rating, play_count, date_added
    pub field: String,
    /// String fields: equals, contains, in, starts_with.
    /// Numeric fields: equals, greater_than, less_than, between.
    pub operator: String,
    pub value: JsonValue,
}

/// Declarative membership definition for a smart playlist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartPlaylistCriteria {
    #[serde(default)]
    pub rules: Vec<SmartRule>,
    #[serde(default)]
    pub logic: RuleLogic,
    /// Applied iff > 0
    #[serde(default)]
    pub limit: i64,
    /// One of: added_desc, added_asc, play_count_desc, rating_desc,
    /// random, title_asc, artist_asc. Unknown falls back to added_desc.
    #[serde(default)]
    pub order: String,
}

/// Request to create a playlist
#[derive(Debug, Clone)]
pub struct CreatePlaylistRequest {
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub smart_criteria: Option<SmartPlaylistCriteria>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_logic_serde_uppercase() {
        let and: RuleLogic = serde_json::from_str("\"AND\"").unwrap();
        assert_eq!(and, RuleLogic::And);
        let or: RuleLogic = serde_json::from_str("\"OR\"").unwrap();
        assert_eq!(or, RuleLogic::Or);
    }

    #[test]
    fn test_criteria_defaults() {
        let criteria: SmartPlaylistCriteria = serde_json::from_str("{}").unwrap();
        assert!(criteria.rules.is_empty());
        assert_eq!(criteria.logic, RuleLogic::And);
        assert_eq!(criteria.limit, 0);
        assert!(criteria.order.is_empty());
    }
}
