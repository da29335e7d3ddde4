//! Registration and verification. Both sit behind the reader bucket only.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::state::AppState;
use services::VerifyRequest;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub verification_code: String,
    pub verified: bool,
    pub instructions: String,
}

/// `POST /api/journalists/register`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(body) = body?;
    let reg = state.identity.register(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: reg.journalist.id,
            name: reg.journalist.name,
            api_key: reg.api_key,
            verification_code: reg.journalist.verification_code,
            verified: reg.journalist.verified,
            instructions: reg.instructions,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub journalist_name: String,
    pub verification_code: String,
    #[serde(default)]
    pub tweet_url: Option<String>,
    #[serde(default)]
    pub twitter_handle: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    pub journalist_id: Uuid,
    pub name: String,
    pub twitter_handle: String,
    pub message: String,
}

/// `POST /api/journalists/verify`
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(body) = body?;
    let outcome = state
        .identity
        .verify(VerifyRequest {
            journalist_name: body.journalist_name,
            verification_code: body.verification_code,
            tweet_url: body.tweet_url,
            twitter_handle: body.twitter_handle,
        })
        .await;

    let verified = match outcome {
        Ok(v) => {
            state.metrics.verification(v.handle_source.as_str());
            v
        }
        Err(e) => {
            state.metrics.verification("failed");
            return Err(e.into());
        }
    };

    let handle = verified.journalist.twitter_handle.unwrap_or_default();
    Ok(Json(VerifyResponse {
        status: "verified".into(),
        journalist_id: verified.journalist.id,
        message: format!(
            "{} is now verified as @{handle} and can post stories",
            verified.journalist.name
        ),
        name: verified.journalist.name,
        twitter_handle: handle,
    }))
}
