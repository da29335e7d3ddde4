//! Round trips against a live Postgres. Skipped unless `DATABASE_URL` is set.

use chrono::{Duration, Utc};
use domains::error::DomainError;
use domains::models::{AdmissionWindow, NewJournalist, StoryDraft, WriteAction};
use domains::ports::{JournalistRepository, RateLimitRepository, StoryRepository};
use storage_adapters::{PgStore, PoolOptions};
use uuid::Uuid;

async fn store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let options = PoolOptions {
        max_connections: 5,
        min_connections: 1,
        ..PoolOptions::default()
    };
    let store = PgStore::connect(&url, &options).await.expect("connect");
    store.migrate().await.expect("migrate");
    Some(store)
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..8])
}

async fn verified_journalist(store: &PgStore) -> domains::models::Journalist {
    let j = store
        .insert(NewJournalist {
            id: Uuid::new_v4(),
            name: unique_name("pg"),
            api_key_hash: Uuid::new_v4().simple().to_string(),
            verification_code: "abc123".into(),
        })
        .await
        .unwrap();
    store.mark_verified(j.id, "owner").await.unwrap()
}

fn window() -> AdmissionWindow {
    AdmissionWindow {
        action: WriteAction::CreateStory,
        max_actions: 1,
        window: Duration::seconds(60),
    }
}

fn draft(title: &str) -> StoryDraft {
    StoryDraft {
        id: Uuid::new_v4(),
        title: title.into(),
        url: None,
        content: Some("body".into()),
    }
}

#[tokio::test]
async fn duplicate_names_conflict() {
    let Some(store) = store().await else { return };
    let name = unique_name("dup");
    let new = |name: &str| NewJournalist {
        id: Uuid::new_v4(),
        name: name.into(),
        api_key_hash: Uuid::new_v4().simple().to_string(),
        verification_code: "abc".into(),
    };
    store.insert(new(&name)).await.unwrap();
    let err = store.insert(new(&name)).await.unwrap_err();
    assert!(matches!(err, DomainError::DuplicateName(_)));
}

#[tokio::test]
async fn verification_is_one_way() {
    let Some(store) = store().await else { return };
    let j = verified_journalist(&store).await;
    assert!(j.verified);
    assert!(j.claimed_at.is_some());
    let err = store.mark_verified(j.id, "other").await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyVerified(_)));
}

#[tokio::test]
async fn story_write_is_atomic_and_rate_limited() {
    let Some(store) = store().await else { return };
    let j = verified_journalist(&store).await;

    let story = store.create(&j, draft("First"), window()).await.unwrap();
    assert_eq!(story.points, 1);
    assert_eq!(
        store
            .count_since(j.id, WriteAction::CreateStory, Utc::now() - Duration::seconds(60))
            .await
            .unwrap(),
        1
    );

    let err = store.create(&j, draft("Second"), window()).await.unwrap_err();
    assert!(matches!(err, DomainError::PostRateLimitExceeded { .. }));

    let listed = StoryRepository::list(&store, 100, 0).await.unwrap();
    assert!(listed.iter().any(|s| s.id == story.id && s.journalist_name == j.name));
    assert!(!listed.iter().any(|s| s.title == "Second" && s.journalist_id == j.id));
}

#[tokio::test]
async fn votes_are_unique_per_address() {
    let Some(store) = store().await else { return };
    let j = verified_journalist(&store).await;
    let story = store.create(&j, draft("Vote me"), window()).await.unwrap();
    let hash = "a".repeat(64);

    store.record_upvote(story.id, &hash).await.unwrap();
    assert!(store.has_upvote(story.id, &hash).await.unwrap());
    let err = store.record_upvote(story.id, &hash).await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyUpvoted(_)));
    assert_eq!(store.get(story.id).await.unwrap().unwrap().points, 2);

    let err = store.record_upvote(Uuid::new_v4(), &hash).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(..)));

    assert!(store.delete(story.id).await.unwrap());
    assert!(!store.has_upvote(story.id, &hash).await.unwrap());
}
