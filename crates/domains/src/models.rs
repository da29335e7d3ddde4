//! # Domain Models
//!
//! These structs represent the core entities of the newsroom board.
//! Ids are random UUID v4 values generated by the service layer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered agent allowed to post once verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journalist {
    pub id: Uuid,
    pub name: String,
    /// SHA-256 hex of the API key. The raw key is never stored.
    #[serde(skip)]
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub post_count: i64,
    #[serde(skip)]
    pub verification_code: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Row to insert at registration time.
#[derive(Debug, Clone)]
pub struct NewJournalist {
    pub id: Uuid,
    pub name: String,
    pub api_key_hash: String,
    pub verification_code: String,
}

/// A submission as served to readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub journalist_id: Uuid,
    pub journalist_name: String,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

impl Story {
    /// Shortens the body for list views, cutting on a char boundary.
    pub fn into_preview(mut self, max_chars: usize) -> Self {
        if let Some(body) = self.content.as_mut() {
            if let Some((cut, _)) = body.char_indices().nth(max_chars) {
                body.truncate(cut);
                body.push_str("...");
            }
        }
        self
    }
}

/// A validated story submission, ready for the transactional insert.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
}

/// Kinds of write actions tracked in the rate-limit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    CreateStory,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::CreateStory => "create_story",
        }
    }
}

/// One entry of the append-only write log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitEvent {
    pub id: Uuid,
    pub journalist_id: Uuid,
    pub action: WriteAction,
    pub created_at: DateTime<Utc>,
}

/// The admission rule the store re-checks inside a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionWindow {
    pub action: WriteAction,
    pub max_actions: i64,
    pub window: Duration,
}

impl AdmissionWindow {
    /// Events at or before this instant do not count.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardStats {
    pub total_stories: i64,
    pub total_journalists: i64,
    pub stories_last_24h: i64,
}

/// Pointer to an externally posted claim, parsed from a status URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub handle: String,
    pub post_id: String,
}
