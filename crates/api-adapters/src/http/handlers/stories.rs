use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use domains::error::DomainError;
use domains::models::Story;
use serde::Deserialize;
use serde_json::{json, Value};
use services::Submission;
use uuid::Uuid;

use super::cached_json;
use crate::error::ApiError;
use crate::http::extract::{AuthedJournalist, ClientIp};
use crate::http::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// `GET /api/stories?page&per_page`
pub async fn list(
    State(state): State<AppState>,
    paging: Result<Query<Paging>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(paging) = paging?;
    let page = state.stories.list(paging.page, paging.per_page).await?;
    Ok(cached_json(&state, page))
}

/// `GET /api/stories/{id}`
pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let story = state.stories.get(id).await?;
    Ok(cached_json(&state, story))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// `POST /api/stories`
pub async fn create(
    State(state): State<AppState>,
    AuthedJournalist(author): AuthedJournalist,
    body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Story>), ApiError> {
    let Json(body) = body?;
    let created = state
        .stories
        .create(
            &author,
            Submission {
                title: body.title,
                url: body.url,
                content: body.content,
            },
        )
        .await;

    match created {
        Ok(story) => {
            state.metrics.story_created();
            Ok((StatusCode::CREATED, Json(story)))
        }
        Err(e @ DomainError::PostRateLimitExceeded { .. }) => {
            state.metrics.rate_limited("write");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/stories/{id}/upvote`
pub async fn upvote(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.stories.upvote(id, &ip).await?;
    state.metrics.upvoted();
    Ok(Json(json!({ "status": "upvoted" })))
}
