//! # ApiError
//!
//! Maps domain failures onto HTTP status codes and the machine-readable
//! `code` field of the error body:
//!
//! ```json
//! {"error": "Invalid API key", "code": "INVALID_API_KEY"}
//! ```

use domains::error::{AuthFailure, DomainError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    /// Body, query or path that could not be parsed.
    BadRequest(String),
    /// Path parameter that names nothing that could exist.
    NotFound,
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::Domain(e)
    }
}

/// Status, body and optional `Retry-After` seconds for an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: u16,
    pub body: ErrorBody,
    pub retry_after_secs: Option<u64>,
}

fn body(error: impl Into<String>, code: &str, details: Option<String>) -> ErrorBody {
    ErrorBody {
        error: error.into(),
        code: code.to_string(),
        details,
    }
}

impl ApiError {
    pub fn render(&self) -> Rendered {
        let (status, body, retry_after_secs) = match self {
            ApiError::BadRequest(details) => (
                400,
                body("Invalid request", "INVALID_REQUEST", Some(details.clone())),
                None,
            ),
            ApiError::NotFound => (404, body("Resource not found", "NOT_FOUND", None), None),
            ApiError::Domain(e) => match e {
                DomainError::NotFound(kind, _) => {
                    (404, body(format!("{} not found", capitalize(kind)), "NOT_FOUND", None), None)
                }
                DomainError::Validation(msg) => (
                    400,
                    body("Invalid request", "INVALID_REQUEST", Some(msg.clone())),
                    None,
                ),
                DomainError::InvalidName(msg) => (
                    400,
                    body("Invalid journalist name", "INVALID_NAME", Some(msg.clone())),
                    None,
                ),
                DomainError::MissingContent => (
                    400,
                    body("Either url or content is required", "MISSING_CONTENT", None),
                    None,
                ),
                DomainError::ContentRejected(reason) => (
                    400,
                    body(
                        "Content rejected by moderation",
                        "CONTENT_REJECTED",
                        Some(reason.clone()),
                    ),
                    None,
                ),
                DomainError::Unauthorized(failure) => {
                    let (status, message, code) = match failure {
                        AuthFailure::MissingCredential => (401, "API key required", "MISSING_API_KEY"),
                        AuthFailure::InvalidCredential => (401, "Invalid API key", "INVALID_API_KEY"),
                        AuthFailure::NotVerified => (
                            401,
                            "Journalist not verified; complete Twitter verification first",
                            "NOT_VERIFIED",
                        ),
                        AuthFailure::Deactivated => {
                            (403, "Journalist account is deactivated", "ACCOUNT_DEACTIVATED")
                        }
                        AuthFailure::InvalidAdminKey => {
                            (401, "Invalid admin key", "INVALID_ADMIN_KEY")
                        }
                    };
                    (status, body(message, code, None), None)
                }
                DomainError::DuplicateName(name) => (
                    409,
                    body(format!("Journalist name '{name}' is already taken"), "DUPLICATE_NAME", None),
                    None,
                ),
                DomainError::AlreadyUpvoted(_) => (
                    409,
                    body("You have already upvoted this story", "ALREADY_UPVOTED", None),
                    None,
                ),
                DomainError::AlreadyVerified(_) => (
                    409,
                    body("Journalist is already verified", "ALREADY_VERIFIED", None),
                    None,
                ),
                DomainError::VerificationFailed => (
                    404,
                    body(
                        "No journalist matches that name and verification code",
                        "VERIFICATION_FAILED",
                        None,
                    ),
                    None,
                ),
                DomainError::MissingHandle => (
                    400,
                    body(
                        "A tweet_url or twitter_handle is required",
                        "MISSING_TWITTER_INFO",
                        None,
                    ),
                    None,
                ),
                DomainError::ClaimUnverifiable(detail) => (
                    422,
                    body(
                        "Could not verify tweet content",
                        "TWEET_UNVERIFIABLE",
                        Some(detail.clone()),
                    ),
                    None,
                ),
                DomainError::RateLimitExceeded { retry_after_secs } => (
                    429,
                    body("Too many requests", "RATE_LIMIT_EXCEEDED", None),
                    Some(*retry_after_secs),
                ),
                DomainError::PostRateLimitExceeded {
                    max_actions,
                    window_secs,
                } => (
                    429,
                    body(
                        format!("Post rate limit exceeded: {max_actions} per {window_secs} seconds"),
                        "POST_RATE_LIMIT_EXCEEDED",
                        None,
                    ),
                    Some((*window_secs).max(1) as u64),
                ),
                DomainError::RateCheckFailed(_) => (
                    503,
                    body("Rate limit check failed, try again", "RATE_CHECK_FAILED", None),
                    None,
                ),
                DomainError::Unavailable(_) => (
                    503,
                    body("Service temporarily unavailable", "SERVICE_UNAVAILABLE", None),
                    None,
                ),
                DomainError::Internal(_) => (
                    500,
                    body("Internal server error", "INTERNAL_ERROR", None),
                    None,
                ),
            },
        };
        Rendered {
            status,
            body,
            retry_after_secs,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(feature = "web-axum")]
mod into_response {
    use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
    use axum::http::{header, HeaderValue, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::Json;

    use super::*;

    impl From<JsonRejection> for ApiError {
        fn from(rejection: JsonRejection) -> Self {
            ApiError::BadRequest(rejection.body_text())
        }
    }

    impl From<QueryRejection> for ApiError {
        fn from(rejection: QueryRejection) -> Self {
            ApiError::BadRequest(rejection.body_text())
        }
    }

    impl From<PathRejection> for ApiError {
        fn from(_: PathRejection) -> Self {
            ApiError::NotFound
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            if let ApiError::Domain(e) = &self {
                match e {
                    DomainError::Internal(_)
                    | DomainError::Unavailable(_)
                    | DomainError::RateCheckFailed(_) => {
                        tracing::error!(error = %e, "request failed");
                    }
                    _ => tracing::debug!(error = %e, "request rejected"),
                }
            }

            let rendered = self.render();
            let status =
                StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = (status, Json(rendered.body)).into_response();
            if let Some(secs) = rendered.retry_after_secs {
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            response
        }
    }
}
