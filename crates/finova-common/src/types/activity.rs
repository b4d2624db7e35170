//! Activity events reported from linked social platforms and the app itself

use super::ids::{EventId, UserId};
use crate::error::{FinovaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source platform of an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    TikTok,
    Instagram,
    YouTube,
    X,
    Facebook,
    /// Native Finova app activity (logins, quests, milestones)
    App,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
            Platform::X => "x",
            Platform::Facebook => "facebook",
            Platform::App => "app",
        };
        f.write_str(name)
    }
}

/// Kind of activity performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    OriginalPost,
    PhotoPost,
    VideoPost,
    Story,
    Comment,
    Like,
    Share,
    Follow,
    DailyLogin,
    DailyQuest,
    Milestone,
    ViralContent,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActivityType::OriginalPost => "original_post",
            ActivityType::PhotoPost => "photo_post",
            ActivityType::VideoPost => "video_post",
            ActivityType::Story => "story",
            ActivityType::Comment => "comment",
            ActivityType::Like => "like",
            ActivityType::Share => "share",
            ActivityType::Follow => "follow",
            ActivityType::DailyLogin => "daily_login",
            ActivityType::DailyQuest => "daily_quest",
            ActivityType::Milestone => "milestone",
            ActivityType::ViralContent => "viral_content",
        };
        f.write_str(name)
    }
}

/// Versioned activity metadata
///
/// The required fields for each (platform, activity type) pair come from
/// policy; the payload itself is an open map validated against that list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// Schema version the client encoded the fields with
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    /// Content metadata (engagement signals, content ids, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

fn default_schema_version() -> u16 {
    1
}

impl ActivityPayload {
    pub fn new() -> Self {
        Self {
            schema_version: default_schema_version(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Numeric field in [0, 1], if present and well-formed
    pub fn unit_value(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
    }

    /// Check that every required field is present and non-null
    pub fn require(&self, required: &[String]) -> Result<()> {
        for key in required {
            match self.fields.get(key) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(FinovaError::InvalidInput(format!(
                        "payload missing required field '{}'",
                        key
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Immutable activity fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Globally unique id; replays with the same id are no-ops
    pub event_id: EventId,
    pub user_id: UserId,
    pub platform: Platform,
    pub activity_type: ActivityType,
    /// Server receive time (Unix millis); client times are never used for math
    pub timestamp: i64,
    pub payload: ActivityPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_require() {
        let payload = ActivityPayload::new().with("content_id", "abc");
        assert!(payload.require(&["content_id".to_string()]).is_ok());
        assert!(payload.require(&["views".to_string()]).is_err());
    }

    #[test]
    fn test_payload_unit_value_clamps() {
        let payload = ActivityPayload::new()
            .with("engagement", 1.7)
            .with("originality", "high");
        assert_eq!(payload.unit_value("engagement"), Some(1.0));
        assert_eq!(payload.unit_value("originality"), None);
        assert_eq!(payload.unit_value("missing"), None);
    }

    #[test]
    fn test_payload_default_schema_version() {
        let payload: ActivityPayload = serde_json::from_str(r#"{"fields":{}}"#).unwrap();
        assert_eq!(payload.schema_version, 1);
    }
}
