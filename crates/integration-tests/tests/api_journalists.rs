//! Registration, claim verification and credential checks over HTTP.

use axum::http::{Method, StatusCode};
use integration_tests::{Options, TestApp};
use serde_json::json;

#[tokio::test]
async fn register_returns_key_code_and_instructions() {
    let app = TestApp::new();
    let reply = app
        .post("/api/journalists/register", json!({ "name": "Night Desk!" }))
        .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["name"], "Night Desk");
    assert_eq!(reply.body["verified"], false);
    let key = reply.body["api_key"].as_str().unwrap();
    assert!(!key.is_empty());
    let code = reply.body["verification_code"].as_str().unwrap();
    let instructions = reply.body["instructions"].as_str().unwrap();
    assert!(instructions.contains("I claim this agent: Night Desk"));
    assert!(instructions.contains(code));

    let id = reply.body["id"].as_str().unwrap().parse().unwrap();
    let stored = app.store.journalist(id).unwrap();
    assert_ne!(stored.api_key_hash, key);
}

#[tokio::test]
async fn short_or_duplicate_names_are_refused() {
    let app = TestApp::new();

    let reply = app
        .post("/api/journalists/register", json!({ "name": "a!" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "INVALID_NAME");

    app.register("Wire_Service").await;
    let reply = app
        .post("/api/journalists/register", json!({ "name": "Wire_Service" }))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.code(), "DUPLICATE_NAME");
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::new();
    let reply = app
        .post("/api/journalists/register", json!({ "nom": "Wire" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "INVALID_REQUEST");
    assert!(reply.body["details"].is_string());
}

#[tokio::test]
async fn confirmed_post_sets_handle_from_url() {
    let app = TestApp::new();
    let account = app.register("Bot_A").await;
    app.posts.publish(app.claim_for(&account));

    let reply = app
        .post(
            "/api/journalists/verify",
            json!({
                "journalist_name": "Bot_A",
                "verification_code": account.verification_code,
                "tweet_url": "https://x.com/bot_owner/status/1234567890",
                "twitter_handle": "someone_else",
            }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "verified");
    assert_eq!(reply.body["twitter_handle"], "bot_owner");
    assert_eq!(reply.body["journalist_id"], account.id.to_string());

    let stored = app.store.journalist(account.id).unwrap();
    assert!(stored.verified);
    assert!(stored.claimed_at.is_some());
}

#[tokio::test]
async fn unreachable_post_falls_back_to_asserted_handle() {
    let app = TestApp::new();
    let account = app.register("Bot_B").await;

    let reply = app
        .post(
            "/api/journalists/verify",
            json!({
                "journalist_name": "Bot_B",
                "verification_code": account.verification_code,
                "tweet_url": "https://twitter.com/owner_b/status/99",
                "twitter_handle": "@asserted_b",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["twitter_handle"], "asserted_b");
}

#[tokio::test]
async fn strict_mode_rejects_unconfirmed_claims() {
    let app = TestApp::with(Options {
        require_confirmed_claim: true,
        ..Options::default()
    });
    let account = app.register("Bot_C").await;
    app.posts.publish("just a normal tweet");

    let reply = app
        .post(
            "/api/journalists/verify",
            json!({
                "journalist_name": "Bot_C",
                "verification_code": account.verification_code,
                "tweet_url": "https://x.com/owner_c/status/7",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.code(), "TWEET_UNVERIFIABLE");
    assert!(!app.store.journalist(account.id).unwrap().verified);
}

#[tokio::test]
async fn verification_failures() {
    let app = TestApp::new();
    let account = app.register("Bot_D").await;

    let reply = app
        .post(
            "/api/journalists/verify",
            json!({
                "journalist_name": "Bot_D",
                "verification_code": "not-the-code",
                "twitter_handle": "x",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.code(), "VERIFICATION_FAILED");

    let reply = app
        .post(
            "/api/journalists/verify",
            json!({
                "journalist_name": "Bot_D",
                "verification_code": account.verification_code,
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.code(), "MISSING_TWITTER_INFO");

    let body = json!({
        "journalist_name": "Bot_D",
        "verification_code": account.verification_code,
        "twitter_handle": "owner_d",
    });
    assert_eq!(app.post("/api/journalists/verify", body.clone()).await.status, StatusCode::OK);
    let reply = app.post("/api/journalists/verify", body).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.code(), "ALREADY_VERIFIED");
}

#[tokio::test]
async fn credential_failures_on_story_creation() {
    let app = TestApp::new();
    let story = json!({ "title": "Hello", "content": "World" });

    let reply = app.call(Method::POST, "/api/stories", Some(story.clone()), &[]).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "MISSING_API_KEY");

    let reply = app
        .call(
            Method::POST,
            "/api/stories",
            Some(story.clone()),
            &[("authorization", "Bearer nope")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "INVALID_API_KEY");

    let pending = app.register("Unverified").await;
    let reply = app.submit(&pending, story.clone()).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "NOT_VERIFIED");

    let account = app.verified("Bearer_Bot").await;
    let reply = app
        .call(
            Method::POST,
            "/api/stories",
            Some(story),
            &[("authorization", format!("Bearer {}", account.api_key).as_str())],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}
