//! In-memory stand-in for the Postgres store.
//!
//! Every operation runs under one mutex, which gives the same atomicity the
//! SQL transactions provide: a story insert, its post-count bump and its
//! write-log entry land together, and vote uniqueness holds under races.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::error::{AuthFailure, DomainError, Result};
use domains::models::{
    AdmissionWindow, BoardStats, Journalist, NewJournalist, RateLimitEvent, Story, StoryDraft,
    WriteAction,
};
use domains::ports::{JournalistRepository, RateLimitRepository, StoryRepository};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    journalists: HashMap<Uuid, Journalist>,
    stories: HashMap<Uuid, Story>,
    upvotes: HashSet<(Uuid, String)>,
    events: Vec<RateLimitEvent>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn journalist(&self, id: Uuid) -> Option<Journalist> {
        self.tables().journalists.get(&id).cloned()
    }

    pub fn story_count(&self) -> usize {
        self.tables().stories.len()
    }

    pub fn event_count(&self) -> usize {
        self.tables().events.len()
    }

    pub fn upvote_hashes(&self, story_id: Uuid) -> Vec<String> {
        self.tables()
            .upvotes
            .iter()
            .filter(|(id, _)| *id == story_id)
            .map(|(_, hash)| hash.clone())
            .collect()
    }

    /// Moves a story's creation time, for ordering and stats tests.
    pub fn backdate_story(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(story) = self.tables().stories.get_mut(&id) {
            story.created_at = created_at;
        }
    }

    /// Moves every write-log entry of a journalist back in time.
    pub fn backdate_events(&self, journalist_id: Uuid, by: chrono::Duration) {
        for event in self
            .tables()
            .events
            .iter_mut()
            .filter(|e| e.journalist_id == journalist_id)
        {
            event.created_at -= by;
        }
    }
}

#[async_trait]
impl JournalistRepository for InMemoryStore {
    async fn insert(&self, new: NewJournalist) -> Result<Journalist> {
        let mut t = self.tables();
        if t.journalists.values().any(|j| j.name == new.name) {
            return Err(DomainError::DuplicateName(new.name));
        }
        let journalist = Journalist {
            id: new.id,
            name: new.name,
            api_key_hash: new.api_key_hash,
            created_at: Utc::now(),
            active: true,
            post_count: 0,
            verification_code: new.verification_code,
            verified: false,
            twitter_handle: None,
            claimed_at: None,
        };
        t.journalists.insert(journalist.id, journalist.clone());
        Ok(journalist)
    }

    async fn find_by_api_key_hash(&self, hash: &str) -> Result<Option<Journalist>> {
        Ok(self
            .tables()
            .journalists
            .values()
            .find(|j| j.api_key_hash == hash)
            .cloned())
    }

    async fn find_for_verification(&self, name: &str, code: &str) -> Result<Option<Journalist>> {
        Ok(self
            .tables()
            .journalists
            .values()
            .find(|j| j.name == name && j.verification_code == code)
            .cloned())
    }

    async fn mark_verified(&self, id: Uuid, handle: &str) -> Result<Journalist> {
        let mut t = self.tables();
        match t.journalists.get_mut(&id) {
            Some(j) if !j.verified => {
                j.verified = true;
                j.twitter_handle = Some(handle.to_string());
                j.claimed_at = Some(Utc::now());
                Ok(j.clone())
            }
            _ => Err(DomainError::AlreadyVerified(id.to_string())),
        }
    }

    async fn list(&self, limit: i64) -> Result<Vec<Journalist>> {
        let mut all: Vec<Journalist> = self.tables().journalists.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        Ok(match self.tables().journalists.get_mut(&id) {
            Some(j) => {
                j.active = active;
                true
            }
            None => false,
        })
    }

    async fn force_verify(&self, id: Uuid, handle: Option<String>) -> Result<bool> {
        Ok(match self.tables().journalists.get_mut(&id) {
            Some(j) => {
                j.verified = true;
                if handle.is_some() {
                    j.twitter_handle = handle;
                }
                j.claimed_at.get_or_insert_with(Utc::now);
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl StoryRepository for InMemoryStore {
    async fn create(
        &self,
        author: &Journalist,
        draft: StoryDraft,
        window: AdmissionWindow,
    ) -> Result<Story> {
        let mut t = self.tables();
        let now = Utc::now();

        let owner = t
            .journalists
            .get(&author.id)
            .ok_or_else(|| DomainError::NotFound("journalist".into(), author.id.to_string()))?;
        if !owner.active {
            return Err(DomainError::Unauthorized(AuthFailure::Deactivated));
        }
        if !owner.verified {
            return Err(DomainError::Unauthorized(AuthFailure::NotVerified));
        }
        let name = owner.name.clone();

        let since = window.since(now);
        let recent = t
            .events
            .iter()
            .filter(|e| {
                e.journalist_id == author.id && e.action == window.action && e.created_at > since
            })
            .count() as i64;
        if recent >= window.max_actions {
            return Err(DomainError::PostRateLimitExceeded {
                max_actions: window.max_actions,
                window_secs: window.window.num_seconds(),
            });
        }

        let story = Story {
            id: draft.id,
            title: draft.title,
            url: draft.url,
            content: draft.content,
            journalist_id: author.id,
            journalist_name: name,
            points: 1,
            created_at: now,
        };
        t.stories.insert(story.id, story.clone());
        if let Some(owner) = t.journalists.get_mut(&author.id) {
            owner.post_count += 1;
        }
        t.events.push(RateLimitEvent {
            id: Uuid::new_v4(),
            journalist_id: author.id,
            action: window.action,
            created_at: now,
        });
        Ok(story)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Story>> {
        let mut all: Vec<Story> = self.tables().stories.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        Ok(self.tables().stories.get(&id).cloned())
    }

    async fn has_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<bool> {
        Ok(self
            .tables()
            .upvotes
            .contains(&(story_id, ip_hash.to_string())))
    }

    async fn record_upvote(&self, story_id: Uuid, ip_hash: &str) -> Result<()> {
        let mut t = self.tables();
        if !t.stories.contains_key(&story_id) {
            return Err(DomainError::NotFound("story".into(), story_id.to_string()));
        }
        if !t.upvotes.insert((story_id, ip_hash.to_string())) {
            return Err(DomainError::AlreadyUpvoted(story_id.to_string()));
        }
        if let Some(story) = t.stories.get_mut(&story_id) {
            story.points += 1;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut t = self.tables();
        let existed = t.stories.remove(&id).is_some();
        t.upvotes.retain(|(story_id, _)| *story_id != id);
        Ok(existed)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<BoardStats> {
        let t = self.tables();
        Ok(BoardStats {
            total_stories: t.stories.len() as i64,
            total_journalists: t.journalists.len() as i64,
            stories_last_24h: t.stories.values().filter(|s| s.created_at > since).count() as i64,
        })
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryStore {
    async fn count_since(
        &self,
        journalist_id: Uuid,
        action: WriteAction,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .tables()
            .events
            .iter()
            .filter(|e| e.journalist_id == journalist_id && e.action == action && e.created_at > since)
            .count() as i64)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut t = self.tables();
        let before = t.events.len();
        t.events.retain(|e| e.created_at >= cutoff);
        Ok((before - t.events.len()) as u64)
    }
}
