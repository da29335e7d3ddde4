//! Request-part extractors: client address, journalist credential and
//! operator credential.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use domains::error::{AuthFailure, DomainError};
use domains::models::Journalist;

use super::state::AppState;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
/// With `trust_forwarded` off the proxy headers are ignored entirely.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    };
    trust_forwarded
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `X-API-Key`, or the token of `Authorization: Bearer`. Blank values count as absent.
pub fn presented_key(headers: &HeaderMap) -> Option<String> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());
    if let Some(key) = api_key {
        return Some(key.to_string());
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, peer, state.trust_forwarded)))
    }
}

/// A verified, active journalist resolved from the request credential.
pub struct AuthedJournalist(pub Journalist);

impl FromRequestParts<AppState> for AuthedJournalist {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = presented_key(&parts.headers);
        let journalist = state.identity.authenticate(key.as_deref()).await?;
        Ok(AuthedJournalist(journalist))
    }
}

/// Passes only when the operator key verifies.
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = presented_key(&parts.headers).unwrap_or_default();
        if state.admin.verify_admin_key(&key).await {
            Ok(AdminGuard)
        } else {
            tracing::warn!("rejected admin request");
            Err(DomainError::Unauthorized(AuthFailure::InvalidAdminKey).into())
        }
    }
}
