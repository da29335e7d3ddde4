//! # integration-tests
//!
//! Drives the full axum router over in-process port implementations:
//! an in-memory store standing in for Postgres, `MemoryCache` for Redis,
//! a scripted claim-post fetcher and a mocked operator check.

pub mod store;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_adapters::http::{router, AppState};
use api_adapters::Metrics;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use domains::error::{FetchError, Result as DomainResult};
use domains::models::PostRef;
use domains::ports::{CredentialIssuer, IssuedKey, MockAdminAuthenticator, PostFetcher};
use serde_json::{json, Value};
use services::identity::claim::{ClaimTemplate, ClaimVerifier};
use services::{
    AddressHasher, CacheAside, IdentityService, ModerationFilter, ReadLimitConfig, ReadLimiter,
    StoryService, StorySettings, WriteLimiter,
};
use storage_adapters::MemoryCache;
use tower::ServiceExt;
use uuid::Uuid;

pub use store::InMemoryStore;

pub const ADMIN_KEY: &str = "operator-secret";
pub const CLAIM_TAG: &str = "@10_X_eng";
pub const DEFAULT_IP: &str = "203.0.113.10";

/// Serves whatever claim post was last published, for every post id.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    body: Arc<Mutex<Option<String>>>,
}

impl ScriptedFetcher {
    pub fn publish(&self, body: impl Into<String>) {
        *self.lock() = Some(body.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.body.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PostFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, _post: &PostRef) -> std::result::Result<String, FetchError> {
        self.lock().clone().ok_or(FetchError::Status(503))
    }
}

/// UUID-based keys; hashing is the identity with a prefix so tests can
/// reason about stored hashes.
struct TestIssuer;

impl CredentialIssuer for TestIssuer {
    fn issue_api_key(&self) -> DomainResult<IssuedKey> {
        let raw = Uuid::new_v4().simple().to_string();
        Ok(IssuedKey {
            hash: self.hash_api_key(&raw),
            raw,
        })
    }

    fn issue_claim_code(&self) -> DomainResult<String> {
        Ok(Uuid::new_v4().simple().to_string()[..24].to_string())
    }

    fn hash_api_key(&self, raw: &str) -> String {
        format!("h:{raw}")
    }
}

/// Knobs a test may turn before the router is built.
pub struct Options {
    pub reader_rpm: u32,
    pub writer_max_posts: i64,
    pub writer_window: chrono::Duration,
    pub require_confirmed_claim: bool,
    pub preview_chars: usize,
    pub trust_forwarded_headers: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reader_rpm: 100_000,
            writer_max_posts: 1,
            writer_window: chrono::Duration::seconds(60),
            require_confirmed_claim: false,
            preview_chars: 500,
            trust_forwarded_headers: true,
        }
    }
}

/// A parsed response.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<MemoryCache>,
    /// Claim posts visible to the verifier. Empty means every fetch fails.
    pub posts: ScriptedFetcher,
}

/// A journalist created through the public endpoints.
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub verification_code: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    pub fn with(options: Options) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let cache = Arc::new(MemoryCache::new());

        let mut admin = MockAdminAuthenticator::new();
        admin
            .expect_verify_admin_key()
            .returning(|presented| presented == ADMIN_KEY);

        let posts = ScriptedFetcher::default();
        let verifier = ClaimVerifier::new(
            vec![Arc::new(posts.clone()) as Arc<dyn PostFetcher>],
            ClaimTemplate::new(CLAIM_TAG),
            Duration::from_secs(5),
        );
        let identity = IdentityService::new(
            store.clone(),
            Arc::new(TestIssuer),
            verifier,
            options.require_confirmed_claim,
        );

        let read_limiter = Arc::new(ReadLimiter::new(ReadLimitConfig::from_rpm(
            options.reader_rpm,
            10_000,
        )));
        let write_limiter = Arc::new(WriteLimiter::new(
            store.clone(),
            options.writer_max_posts,
            options.writer_window,
        ));
        let moderation = match ModerationFilter::with_default_lexicon() {
            Ok(filter) => Arc::new(filter),
            Err(e) => panic!("embedded lexicon: {e}"),
        };
        let stories = StoryService::new(
            store.clone(),
            write_limiter,
            moderation,
            CacheAside::new(cache.clone()),
            AddressHasher::new(b"test-key".to_vec()),
            StorySettings {
                preview_chars: options.preview_chars,
                ..StorySettings::default()
            },
        );

        let state = AppState {
            identity: Arc::new(identity),
            stories: Arc::new(stories),
            read_limiter,
            admin: Arc::new(admin),
            metrics: Arc::new(Metrics::new()),
            version: "test",
            trust_forwarded: options.trust_forwarded_headers,
        };

        Self {
            router: router(state, Duration::from_secs(30)),
            store,
            cache,
            posts,
        }
    }

    /// The claim post text for an account.
    pub fn claim_for(&self, account: &Account) -> String {
        ClaimTemplate::new(CLAIM_TAG).render(&account.name, &account.verification_code)
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("x-forwarded-for")) {
            builder = builder.header("x-forwarded-for", DEFAULT_IP);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.call(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> Reply {
        self.call(method, uri, body, &[("x-api-key", ADMIN_KEY)]).await
    }

    pub async fn register(&self, name: &str) -> Account {
        let reply = self
            .post("/api/journalists/register", json!({ "name": name }))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "register: {}", reply.body);
        Account {
            id: reply.body["id"].as_str().and_then(|s| s.parse().ok()).expect("id"),
            name: reply.body["name"].as_str().expect("name").to_string(),
            api_key: reply.body["api_key"].as_str().expect("api_key").to_string(),
            verification_code: reply.body["verification_code"]
                .as_str()
                .expect("code")
                .to_string(),
        }
    }

    /// Registers and verifies with an asserted handle.
    pub async fn verified(&self, name: &str) -> Account {
        let account = self.register(name).await;
        let reply = self
            .post(
                "/api/journalists/verify",
                json!({
                    "journalist_name": account.name,
                    "verification_code": account.verification_code,
                    "twitter_handle": "@newsdesk",
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "verify: {}", reply.body);
        account
    }

    pub async fn submit(&self, account: &Account, story: Value) -> Reply {
        self.call(
            Method::POST,
            "/api/stories",
            Some(story),
            &[("x-api-key", account.api_key.as_str())],
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
