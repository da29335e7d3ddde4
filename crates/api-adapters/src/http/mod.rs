//! # HTTP Surface
//!
//! Axum router for the board. Reader routes share a per-address token
//! bucket; story creation is admitted by the writer window instead and
//! admin routes by the operator key.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

use handlers::{admin, health, journalists, stories};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(extract::API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/journalists/register", post(journalists::register))
        .route("/journalists/verify", post(journalists::verify))
        .route("/stories", get(stories::list).post(stories::create))
        .route("/stories/{id}", get(stories::get))
        .route("/stories/{id}/upvote", post(stories::upvote))
        .route("/admin/journalists", get(admin::list_journalists))
        .route("/admin/journalists/{id}/deactivate", post(admin::deactivate))
        .route("/admin/journalists/{id}/activate", post(admin::activate))
        .route("/admin/journalists/{id}/verify", post(admin::force_verify))
        .route("/admin/stories/{id}", delete(admin::delete_story))
        .route("/admin/stats", get(admin::stats))
}

/// Full application router with every cross-cutting layer applied.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/api", api_routes())
        .route("/metrics", get(health::metrics))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::read_limit,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state);

    middleware::with_security_headers(app)
}
