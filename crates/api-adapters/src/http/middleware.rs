//! Read-path admission control and response hardening.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use domains::error::DomainError;
use services::ReadDecision;
use tower_http::set_header::SetResponseHeaderLayer;

use super::extract::client_ip;
use super::state::AppState;
use crate::error::ApiError;

/// Routes guarded by their own credential instead of the reader bucket.
fn skips_read_limit(method: &Method, path: &str) -> bool {
    path == "/metrics"
        || path.starts_with("/api/admin")
        || (*method == Method::POST && path == "/api/stories")
}

pub async fn read_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if skips_read_limit(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, state.trust_forwarded);

    match state.read_limiter.check(&ip) {
        ReadDecision::Allowed { .. } => next.run(request).await,
        ReadDecision::Limited { retry_after } => {
            state.metrics.rate_limited("read");
            tracing::warn!(ip = %ip, retry_after_ms = retry_after.as_millis() as u64, "reader rate limit exceeded");
            let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            ApiError::from(DomainError::RateLimitExceeded { retry_after_secs }).into_response()
        }
    }
}

/// Hardening headers added to every response that lacks them.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}
