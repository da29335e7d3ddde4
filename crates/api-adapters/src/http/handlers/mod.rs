pub mod admin;
pub mod health;
pub mod journalists;
pub mod stories;

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use services::Cached;

use super::state::AppState;

pub const X_CACHE: &str = "x-cache";

/// JSON response tagged with `X-Cache: HIT|MISS`.
pub(crate) fn cached_json<T: Serialize>(state: &AppState, cached: Cached<T>) -> Response {
    state.metrics.cache_lookup(cached.hit);
    let mut response = Json(cached.value).into_response();
    let tag = if cached.hit { "HIT" } else { "MISS" };
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(tag));
    response
}
