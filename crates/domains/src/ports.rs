//! # Ports
//!
//! Adapters implement these traits; services only ever see `Arc<dyn Port>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CacheError, FetchError, Result};
use crate::models::{
    AdmissionWindow, BoardStats, Journalist, NewJournalist, PostRef, Story, StoryDraft,
    WriteAction,
};

/// Persistence contract for journalists.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JournalistRepository: Send + Sync {
    /// Inserts a new journalist. A taken name yields `DomainError::DuplicateName`.
    async fn insert(&self, new: NewJournalist) -> Result<Journalist>;

    async fn find_by_api_key_hash(&self, hash: &str) -> Result<Option<Journalist>>;

    /// Active journalist matching both name and verification code.
    async fn find_for_verification(&self, name: &str, code: &str) -> Result<Option<Journalist>>;

    /// One-way transition to verified. A journalist that is already verified
    /// yields `DomainError::AlreadyVerified`.
    async fn mark_verified(&self, id: Uuid, handle: &str) -> Result<Journalist>;

    /// Newest first.
    async fn list(&self, limit: i64) -> Result<Vec<Journalist>>;

    /// Returns false when no row matched.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool>;

    /// Operator override of the claim workflow. Returns false when no row matched.
    async fn force_verify(&self, id: Uuid, handle: Option<String>) -> Result<bool>;
}

/// Persistence contract for stories and votes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Inserts the story, bumps the owner's post count and appends a write-log
    /// entry in one transaction. The admission window is re-checked inside
    /// the same transaction; exceeding it yields `PostRateLimitExceeded`.
    async fn create(
        &self,
        author: &Journalist,
        draft: StoryDraft,
        window: AdmissionWindow,
    ) -> Result<Story>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Story>>;

    async fn get(&self, id: Uuid) -> Result<Option<Story>>;

    async fn has_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<bool>;

    /// Inserts the vote and increments points in one transaction.
    /// Duplicate votes yield `AlreadyUpvoted`, a vanished story `NotFound`.
    async fn record_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<()>;

    /// Returns false when no row matched.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn stats(&self, since: DateTime<Utc>) -> Result<BoardStats>;
}

/// The append-only write log backing the sliding-window limiter.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn count_since(
        &self,
        journalist_id: Uuid,
        action: WriteAction,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Deletes entries created before `cutoff`, returning how many went.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Shared key/value cache with per-entry TTL. Best effort, never authoritative.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration)
        -> std::result::Result<(), CacheError>;

    async fn delete(&self, key: &str) -> std::result::Result<(), CacheError>;

    /// Deletes every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> std::result::Result<(), CacheError>;

    async fn healthy(&self) -> bool;
}

/// One way of retrieving the text of an external post.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &str;

    async fn fetch(&self, post: &PostRef) -> std::result::Result<String, FetchError>;
}

/// A freshly issued API key. `raw` leaves the process exactly once.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub raw: String,
    pub hash: String,
}

/// Credential material generation and one-way hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CredentialIssuer: Send + Sync {
    fn issue_api_key(&self) -> Result<IssuedKey>;

    fn issue_claim_code(&self) -> Result<String>;

    fn hash_api_key(&self, raw: &str) -> String;
}

/// Verifies the operator credential guarding admin routes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AdminAuthenticator: Send + Sync {
    async fn verify_admin_key(&self, presented: &str) -> bool;
}
