//! Operator routes. Every handler takes an `AdminGuard` first.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use domains::models::Journalist;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::cached_json;
use crate::error::ApiError;
use crate::http::extract::AdminGuard;
use crate::http::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// `GET /api/admin/journalists`
pub async fn list_journalists(
    _: AdminGuard,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Journalist>>, ApiError> {
    let Query(params) = params?;
    let journalists = state.identity.list(params.limit.unwrap_or(100)).await?;
    Ok(Json(journalists))
}

/// `POST /api/admin/journalists/{id}/deactivate`
pub async fn deactivate(
    _: AdminGuard,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.identity.set_active(id, false).await?;
    Ok(Json(json!({ "status": "deactivated" })))
}

/// `POST /api/admin/journalists/{id}/activate`
pub async fn activate(
    _: AdminGuard,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.identity.set_active(id, true).await?;
    Ok(Json(json!({ "status": "activated" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceVerifyBody {
    #[serde(default)]
    pub twitter_handle: Option<String>,
}

/// `POST /api/admin/journalists/{id}/verify`; the body is optional.
pub async fn force_verify(
    _: AdminGuard,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ForceVerifyBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let handle = match body {
        Ok(Json(body)) => body.twitter_handle,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(e) => return Err(e.into()),
    };
    state.identity.force_verify(id, handle).await?;
    Ok(Json(json!({ "status": "verified" })))
}

/// `DELETE /api/admin/stories/{id}`
pub async fn delete_story(
    _: AdminGuard,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.stories.delete(id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

/// `GET /api/admin/stats`
pub async fn stats(_: AdminGuard, State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.stories.stats().await?;
    Ok(cached_json(&state, stats))
}
