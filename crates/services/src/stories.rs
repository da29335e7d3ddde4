//! # Story service
//!
//! The authenticated write path for stories plus the cached read path.
//! Cache traffic always happens after the store has committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::error::{AuthFailure, DomainError, Result};
use domains::models::{BoardStats, Journalist, Story, StoryDraft};
use domains::ports::StoryRepository;
use uuid::Uuid;

use crate::cache_aside::{self, CacheAside, Cached};
use crate::ip_hash::AddressHasher;
use crate::moderation::{ModerationFilter, Verdict};
use crate::rate_limit::WriteLimiter;

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 300;
pub const URL_MAX: usize = 2048;
pub const CONTENT_MAX: usize = 50_000;

/// A story submission as received from a journalist.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorySettings {
    pub preview_chars: usize,
    pub default_per_page: i64,
    pub max_per_page: i64,
    pub list_ttl: Duration,
    pub story_ttl: Duration,
    pub stats_ttl: Duration,
}

impl Default for StorySettings {
    fn default() -> Self {
        Self {
            preview_chars: 500,
            default_per_page: 30,
            max_per_page: 100,
            list_ttl: Duration::from_secs(30),
            story_ttl: Duration::from_secs(120),
            stats_ttl: Duration::from_secs(60),
        }
    }
}

pub struct StoryService {
    stories: Arc<dyn StoryRepository>,
    limiter: Arc<WriteLimiter>,
    moderation: Arc<ModerationFilter>,
    cache: CacheAside,
    hasher: AddressHasher,
    settings: StorySettings,
}

impl StoryService {
    pub fn new(
        stories: Arc<dyn StoryRepository>,
        limiter: Arc<WriteLimiter>,
        moderation: Arc<ModerationFilter>,
        cache: CacheAside,
        hasher: AddressHasher,
        settings: StorySettings,
    ) -> Self {
        Self {
            stories,
            limiter,
            moderation,
            cache,
            hasher,
            settings,
        }
    }

    pub async fn create(&self, author: &Journalist, submission: Submission) -> Result<Story> {
        if !author.active {
            return Err(DomainError::Unauthorized(AuthFailure::Deactivated));
        }
        if !author.verified {
            return Err(DomainError::Unauthorized(AuthFailure::NotVerified));
        }

        self.limiter.check(author.id).await?;

        let draft = validate(submission)?;

        let verdict = self.moderation.validate(
            &draft.title,
            draft.content.as_deref().unwrap_or_default(),
            draft.url.as_deref().unwrap_or_default(),
        );
        if let Verdict::Rejected { field, matched } = &verdict {
            tracing::info!(journalist_id = %author.id, %field, matched, "story rejected by moderation");
        }
        if let Some(reason) = verdict.reason() {
            return Err(DomainError::ContentRejected(reason));
        }

        let story = self
            .stories
            .create(author, draft, self.limiter.window())
            .await?;

        tracing::info!(story_id = %story.id, journalist_id = %author.id, "story created");
        self.cache.invalidate_listings().await;
        Ok(story)
    }

    /// Newest-first page of previews.
    pub async fn list(&self, page: Option<i64>, per_page: Option<i64>) -> Result<Cached<Vec<Story>>> {
        let (page, per_page) = self.paging(page, per_page);
        let key = cache_aside::stories_list_key(page, per_page);

        if let Some(stories) = self.cache.get::<Vec<Story>>(&key).await {
            return Ok(Cached::hit(stories));
        }

        let preview_chars = self.settings.preview_chars;
        let stories: Vec<Story> = self
            .stories
            .list(per_page, (page - 1) * per_page)
            .await?
            .into_iter()
            .map(|s| s.into_preview(preview_chars))
            .collect();

        self.cache.put(&key, &stories, self.settings.list_ttl).await;
        Ok(Cached::miss(stories))
    }

    pub fn paging(&self, page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(self.settings.default_per_page)
            .clamp(1, self.settings.max_per_page);
        (page, per_page)
    }

    pub async fn get(&self, id: Uuid) -> Result<Cached<Story>> {
        let key = cache_aside::story_key(&id);
        if let Some(story) = self.cache.get::<Story>(&key).await {
            return Ok(Cached::hit(story));
        }

        let story = self
            .stories
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("story".into(), id.to_string()))?;

        self.cache.put(&key, &story, self.settings.story_ttl).await;
        Ok(Cached::miss(story))
    }

    /// One vote per (story, client address).
    pub async fn upvote(&self, id: Uuid, client_ip: &str) -> Result<()> {
        let ip_hash = self.hasher.hash(client_ip);

        if self.stories.has_upvote(id, &ip_hash).await? {
            return Err(DomainError::AlreadyUpvoted(id.to_string()));
        }
        self.stories.record_upvote(id, &ip_hash).await?;

        tracing::debug!(story_id = %id, "story upvoted");
        self.cache.invalidate_story(&id).await;
        Ok(())
    }

    pub async fn stats(&self) -> Result<Cached<BoardStats>> {
        if let Some(stats) = self.cache.get::<BoardStats>(cache_aside::KEY_STATS).await {
            return Ok(Cached::hit(stats));
        }
        let stats = self
            .stories
            .stats(Utc::now() - chrono::Duration::hours(24))
            .await?;
        self.cache
            .put(cache_aside::KEY_STATS, &stats, self.settings.stats_ttl)
            .await;
        Ok(Cached::miss(stats))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.stories.delete(id).await? {
            return Err(DomainError::NotFound("story".into(), id.to_string()));
        }
        tracing::info!(story_id = %id, "story deleted by operator");
        self.cache.invalidate_story(&id).await;
        Ok(())
    }
}

fn validate(submission: Submission) -> Result<StoryDraft> {
    let title = submission.title.trim().to_string();
    let title_len = title.chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&title_len) {
        return Err(DomainError::Validation(format!(
            "title must be between {TITLE_MIN} and {TITLE_MAX} characters"
        )));
    }

    let url = submission
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(url) = &url {
        if url.len() > URL_MAX {
            return Err(DomainError::Validation(format!(
                "url must be at most {URL_MAX} characters"
            )));
        }
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(DomainError::Validation("url must use http or https".into()));
        }
    }

    let content = submission.content.filter(|c| !c.trim().is_empty());
    if let Some(content) = &content {
        if content.chars().count() > CONTENT_MAX {
            return Err(DomainError::Validation(format!(
                "content must be at most {CONTENT_MAX} characters"
            )));
        }
    }

    if url.is_none() && content.is_none() {
        return Err(DomainError::MissingContent);
    }

    Ok(StoryDraft {
        id: Uuid::new_v4(),
        title,
        url,
        content,
    })
}
