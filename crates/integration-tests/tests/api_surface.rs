//! Health, metrics, response headers and the reader rate limit.

use axum::http::{Method, StatusCode};
use integration_tests::{Options, TestApp};
use serde_json::json;

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::new();
    let reply = app.get("/api/health").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["version"], "test");
    assert!(reply.body["timestamp"].is_string());
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let app = TestApp::new();
    let reply = app.get("/api/health").await;
    assert_eq!(reply.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(reply.header("x-frame-options"), Some("DENY"));
    assert!(reply.header("x-request-id").is_some());

    let reply = app.get("/api/stories/nope").await;
    assert_eq!(reply.header("x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = TestApp::new();
    let reply = app.get("/api/nowhere").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reader_bucket_limits_per_address() {
    // 60 rpm gives a burst of 6
    let app = TestApp::with(Options {
        reader_rpm: 60,
        ..Options::default()
    });

    for _ in 0..6 {
        assert_eq!(app.get("/api/health").await.status, StatusCode::OK);
    }
    let limited = app.get("/api/health").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.code(), "RATE_LIMIT_EXCEEDED");
    let retry: u64 = limited.header("retry-after").unwrap().parse().unwrap();
    assert!(retry >= 1);

    let other = app
        .call(Method::GET, "/api/health", None, &[("x-forwarded-for", "198.51.100.9")])
        .await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn untrusted_forwarded_headers_share_one_bucket() {
    let app = TestApp::with(Options {
        reader_rpm: 30,
        trust_forwarded_headers: false,
        ..Options::default()
    });

    for ip in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        let reply = app
            .call(Method::GET, "/api/health", None, &[("x-forwarded-for", ip)])
            .await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let spoofed = app
        .call(Method::GET, "/api/health", None, &[("x-forwarded-for", "198.51.100.4")])
        .await;
    assert_eq!(spoofed.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn credentialed_routes_bypass_the_reader_bucket() {
    let app = TestApp::with(Options {
        reader_rpm: 30,
        ..Options::default()
    });
    // burst of 3: register and verify spend two
    let account = app.verified("Busy_Bot").await;
    app.get("/api/health").await;
    assert_eq!(
        app.get("/api/health").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    let reply = app.submit(&account, json!({ "title": "Still open", "content": "x" })).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = app.admin(Method::GET, "/api/admin/stats", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(app.get("/metrics").await.status, StatusCode::OK);
}

#[tokio::test]
async fn metrics_count_writes_and_cache_lookups() {
    let app = TestApp::new();
    let account = app.verified("Metric_Bot").await;
    app.submit(&account, json!({ "title": "Counted", "content": "x" })).await;
    app.submit(&account, json!({ "title": "Refused", "content": "x" })).await;
    app.get("/api/stories").await;
    app.get("/api/stories").await;

    let reply = app.get("/metrics").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply
        .header("content-type")
        .unwrap()
        .starts_with("application/openmetrics-text"));
    let text = reply.body.as_str().unwrap();
    assert!(text.contains("newsroom_stories_created_total 1"));
    assert!(text.contains(r#"newsroom_rate_limited_total{path="write"} 1"#));
    assert!(text.contains(r#"newsroom_verifications_total{outcome="asserted"} 1"#));
    assert!(text.contains(r#"newsroom_cache_lookups_total{result="hit"} 1"#));
}
