//! Story submission, listing, caching and voting over HTTP.

use axum::http::{Method, StatusCode};
use integration_tests::{Options, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_story_starts_at_one_point() {
    let app = TestApp::new();
    let account = app.verified("Bot_A").await;

    let reply = app
        .submit(&account, json!({ "title": "  Hello  ", "content": "World" }))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["title"], "Hello");
    assert_eq!(reply.body["points"], 1);
    assert_eq!(reply.body["journalist_name"], "Bot_A");

    let owner = app.store.journalist(account.id).unwrap();
    assert_eq!(owner.post_count, 1);
    assert_eq!(app.store.event_count(), 1);
}

#[tokio::test]
async fn second_post_inside_window_is_rejected() {
    let app = TestApp::new();
    let account = app.verified("Bot_A").await;

    let first = app.submit(&account, json!({ "title": "First", "content": "x" })).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.submit(&account, json!({ "title": "Second", "content": "y" })).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.code(), "POST_RATE_LIMIT_EXCEEDED");
    assert_eq!(second.header("retry-after"), Some("60"));
    assert_eq!(app.store.story_count(), 1);

    app.store.backdate_events(account.id, chrono::Duration::seconds(61));
    let third = app.submit(&account, json!({ "title": "Third", "content": "z" })).await;
    assert_eq!(third.status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_posts_admit_exactly_one() {
    let app = std::sync::Arc::new(TestApp::new());
    let account = std::sync::Arc::new(app.verified("Racer").await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            app.submit(&account, json!({ "title": format!("Story {i}"), "content": "x" }))
                .await
                .status
        }));
    }
    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(created, 1);
    assert_eq!(app.store.story_count(), 1);
    assert_eq!(app.store.journalist(account.id).unwrap().post_count, 1);
}

#[tokio::test]
async fn validation_and_moderation() {
    let app = TestApp::with(Options {
        writer_max_posts: 100,
        ..Options::default()
    });
    let account = app.verified("Bot_V").await;

    let reply = app.submit(&account, json!({ "title": "Hi", "content": "x" })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "INVALID_REQUEST");

    let reply = app.submit(&account, json!({ "title": "No body" })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "MISSING_CONTENT");

    let reply = app
        .submit(
            &account,
            json!({ "title": "Markets today", "content": "Double your Bitcoin overnight" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "CONTENT_REJECTED");
    assert!(reply.body["details"].as_str().unwrap().starts_with("Content"));

    let reply = app
        .submit(
            &account,
            json!({ "title": "Shelling kills 12 in drug war", "url": "https://example.com/a" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    assert_eq!(app.store.story_count(), 1);
    assert_eq!(app.store.event_count(), 1);
}

#[tokio::test]
async fn list_is_newest_first_with_previews_and_cache_tags() {
    let app = TestApp::with(Options {
        writer_max_posts: 100,
        preview_chars: 10,
        ..Options::default()
    });
    let account = app.verified("Bot_L").await;

    let old = app
        .submit(&account, json!({ "title": "Older story", "content": "a".repeat(40) }))
        .await;
    let old_id: Uuid = old.body["id"].as_str().unwrap().parse().unwrap();
    app.store
        .backdate_story(old_id, chrono::Utc::now() - chrono::Duration::minutes(5));
    app.submit(&account, json!({ "title": "Newer story", "content": "short" }))
        .await;

    let first = app.get("/api/stories").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-cache"), Some("MISS"));
    let stories = first.body.as_array().unwrap();
    assert_eq!(stories.len(), 2);
    assert_eq!(stories[0]["title"], "Newer story");
    assert_eq!(stories[1]["content"], format!("{}...", "a".repeat(10)));

    let second = app.get("/api/stories").await;
    assert_eq!(second.header("x-cache"), Some("HIT"));
    assert_eq!(second.body, first.body);

    let paged = app.get("/api/stories?page=2&per_page=1").await;
    assert_eq!(paged.body.as_array().unwrap().len(), 1);
    assert_eq!(paged.body[0]["title"], "Older story");

    app.submit(&account, json!({ "title": "Newest story", "content": "x" }))
        .await;
    let after = app.get("/api/stories").await;
    assert_eq!(after.header("x-cache"), Some("MISS"));
    assert_eq!(after.body[0]["title"], "Newest story");
}

#[tokio::test]
async fn bad_query_is_a_bad_request() {
    let app = TestApp::new();
    let reply = app.get("/api/stories?page=first").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "INVALID_REQUEST");
}

#[tokio::test]
async fn get_story_and_missing_ids() {
    let app = TestApp::new();
    let account = app.verified("Bot_G").await;
    let created = app
        .submit(&account, json!({ "title": "Full text", "content": "b".repeat(900) }))
        .await;
    let id = created.body["id"].as_str().unwrap();

    let reply = app.get(&format!("/api/stories/{id}")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["content"].as_str().unwrap().len(), 900);
    assert_eq!(reply.header("x-cache"), Some("MISS"));
    let again = app.get(&format!("/api/stories/{id}")).await;
    assert_eq!(again.header("x-cache"), Some("HIT"));

    let reply = app.get(&format!("/api/stories/{}", Uuid::new_v4())).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.code(), "NOT_FOUND");

    let reply = app.get("/api/stories/not-a-uuid").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn one_vote_per_address() {
    let app = TestApp::new();
    let account = app.verified("Bot_U").await;
    let created = app
        .submit(&account, json!({ "title": "Vote on me", "content": "x" }))
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/stories/{id}/upvote");

    // prime the story cache so the vote has to invalidate it
    app.get(&format!("/api/stories/{id}")).await;

    let reply = app.call(Method::POST, &uri, None, &[]).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "upvoted");

    let reply = app.call(Method::POST, &uri, None, &[]).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.code(), "ALREADY_UPVOTED");

    let other = app
        .call(Method::POST, &uri, None, &[("x-forwarded-for", "198.51.100.4")])
        .await;
    assert_eq!(other.status, StatusCode::OK);

    let story = app.get(&format!("/api/stories/{id}")).await;
    assert_eq!(story.header("x-cache"), Some("MISS"));
    assert_eq!(story.body["points"], 3);

    let hashes = app.store.upvote_hashes(id.parse().unwrap());
    assert_eq!(hashes.len(), 2);
    assert!(hashes.iter().all(|h| h.len() == 64 && !h.contains("203.0.113")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_from_one_address_count_once() {
    let app = std::sync::Arc::new(TestApp::new());
    let account = app.verified("Bot_C").await;
    let created = app
        .submit(&account, json!({ "title": "Race me", "content": "x" }))
        .await;
    let uri = format!("/api/stories/{}/upvote", created.body["id"].as_str().unwrap());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let app = app.clone();
        let uri = uri.clone();
        handles.push(tokio::spawn(async move {
            app.call(Method::POST, &uri, None, &[("x-forwarded-for", "192.0.2.55")])
                .await
                .status
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);

    let story = app
        .get(&format!("/api/stories/{}", created.body["id"].as_str().unwrap()))
        .await;
    assert_eq!(story.body["points"], 2);
}

#[tokio::test]
async fn upvote_on_missing_story_is_not_found() {
    let app = TestApp::new();
    let reply = app
        .call(
            Method::POST,
            &format!("/api/stories/{}/upvote", Uuid::new_v4()),
            None,
            &[],
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paging_is_clamped() {
    let app = TestApp::new();
    let account = app.verified("Bot_P").await;
    app.submit(&account, json!({ "title": "Only one", "content": "x" }))
        .await;

    let capped = app.get("/api/stories?per_page=100").await;
    let oversized = app.get("/api/stories?per_page=500").await;
    assert_eq!(oversized.header("x-cache"), Some("HIT"));
    assert_eq!(oversized.body, capped.body);

    let first = app.get("/api/stories?page=1").await;
    let zero = app.get("/api/stories?page=0").await;
    assert_eq!(zero.header("x-cache"), Some("HIT"));
    assert_eq!(zero.body, first.body);
}

#[tokio::test]
async fn rejected_submissions_leave_no_rows() {
    let app = TestApp::new();
    let account = app.verified("Bot_R").await;

    app.submit(&account, json!({ "title": "Nothing here" })).await;
    app.submit(&account, json!({ "title": "Spam", "content": "nigerian prince needs help" }))
        .await;

    assert_eq!(app.store.story_count(), 0);
    assert_eq!(app.store.event_count(), 0);
    assert_eq!(app.store.journalist(account.id).unwrap().post_count, 0);

    let reply = app.submit(&account, json!({ "title": "Clean", "content": "x" })).await;
    assert_eq!(reply.status, StatusCode::CREATED);
}
