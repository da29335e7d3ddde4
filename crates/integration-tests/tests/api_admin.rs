//! Operator routes behind the admin key.

use axum::http::{Method, StatusCode};
use integration_tests::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admin_routes_require_the_operator_key() {
    let app = TestApp::new();

    let reply = app.get("/api/admin/stats").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "INVALID_ADMIN_KEY");

    let reply = app
        .call(Method::GET, "/api/admin/journalists", None, &[("x-api-key", "guess")])
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let journalist = app.verified("Not_An_Admin").await;
    let reply = app
        .call(
            Method::GET,
            "/api/admin/stats",
            None,
            &[("x-api-key", journalist.api_key.as_str())],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lists_journalists_without_secrets() {
    let app = TestApp::new();
    app.register("First_Bot").await;
    app.register("Second_Bot").await;

    let reply = app.admin(Method::GET, "/api/admin/journalists?limit=1", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let listed = reply.body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].get("api_key_hash").is_none());
    assert!(listed[0].get("verification_code").is_none());

    let reply = app.admin(Method::GET, "/api/admin/journalists", None).await;
    assert_eq!(reply.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deactivation_blocks_posting_until_reactivated() {
    let app = TestApp::new();
    let account = app.verified("Flaky_Bot").await;

    let reply = app
        .admin(
            Method::POST,
            &format!("/api/admin/journalists/{}/deactivate", account.id),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "deactivated");

    let reply = app.submit(&account, json!({ "title": "Blocked", "content": "x" })).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.code(), "ACCOUNT_DEACTIVATED");

    let reply = app
        .admin(
            Method::POST,
            &format!("/api/admin/journalists/{}/activate", account.id),
            None,
        )
        .await;
    assert_eq!(reply.body["status"], "activated");
    let reply = app.submit(&account, json!({ "title": "Back again", "content": "x" })).await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

#[tokio::test]
async fn force_verify_with_and_without_body() {
    let app = TestApp::new();
    let first = app.register("Manual_One").await;
    let second = app.register("Manual_Two").await;

    let reply = app
        .admin(
            Method::POST,
            &format!("/api/admin/journalists/{}/verify", first.id),
            Some(json!({ "twitter_handle": "@manual_one" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "verified");
    let stored = app.store.journalist(first.id).unwrap();
    assert!(stored.verified);
    assert_eq!(stored.twitter_handle.as_deref(), Some("manual_one"));

    let reply = app
        .admin(
            Method::POST,
            &format!("/api/admin/journalists/{}/verify", second.id),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let stored = app.store.journalist(second.id).unwrap();
    assert!(stored.verified);
    assert!(stored.twitter_handle.is_none());

    let reply = app
        .admin(
            Method::POST,
            &format!("/api/admin/journalists/{}/verify", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_story_and_stats() {
    let app = TestApp::new();
    let account = app.verified("Stats_Bot").await;
    let created = app
        .submit(&account, json!({ "title": "Short lived", "content": "x" }))
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let stats = app.admin(Method::GET, "/api/admin/stats", None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["total_stories"], 1);
    assert_eq!(stats.body["total_journalists"], 1);
    assert_eq!(stats.body["stories_last_24h"], 1);
    assert_eq!(stats.header("x-cache"), Some("MISS"));

    app.get(&format!("/api/stories/{id}")).await;

    let reply = app
        .admin(Method::DELETE, &format!("/api/admin/stories/{id}"), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "deleted");

    let reply = app.get(&format!("/api/stories/{id}")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .admin(Method::DELETE, &format!("/api/admin/stories/{id}"), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let listed = app.get("/api/stories").await;
    assert!(listed.body.as_array().unwrap().is_empty());
}
