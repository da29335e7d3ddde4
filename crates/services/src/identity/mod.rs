//! # Identity & verification
//!
//! Issues credentials at registration, authenticates API keys, and moves a
//! journalist from unverified to verified once a claim post checks out.
//!
//! Verification degrades gracefully: every fetch strategy is tried before
//! giving up, and unless strict mode is on an asserted handle is accepted
//! when the claim post cannot be confirmed.

pub mod claim;

use std::sync::Arc;

use domains::error::{AuthFailure, DomainError, Result};
use domains::models::{Journalist, NewJournalist};
use domains::ports::{CredentialIssuer, JournalistRepository};
use uuid::Uuid;

pub use claim::{ClaimOutcome, ClaimTemplate, ClaimVerifier};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 100;

/// Keeps `[A-Za-z0-9 _-]` and drops everything else.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Returned once at registration; the only time `api_key` is ever visible.
#[derive(Debug, Clone)]
pub struct Registration {
    pub journalist: Journalist,
    pub api_key: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub journalist_name: String,
    pub verification_code: String,
    pub tweet_url: Option<String>,
    pub twitter_handle: Option<String>,
}

/// How the accepted handle was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSource {
    ConfirmedPost,
    Asserted,
    UrlOnly,
}

impl HandleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleSource::ConfirmedPost => "confirmed",
            HandleSource::Asserted => "asserted",
            HandleSource::UrlOnly => "url_only",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Verified {
    pub journalist: Journalist,
    pub handle_source: HandleSource,
}

pub struct IdentityService {
    journalists: Arc<dyn JournalistRepository>,
    issuer: Arc<dyn CredentialIssuer>,
    verifier: ClaimVerifier,
    require_confirmed_claim: bool,
}

impl IdentityService {
    pub fn new(
        journalists: Arc<dyn JournalistRepository>,
        issuer: Arc<dyn CredentialIssuer>,
        verifier: ClaimVerifier,
        require_confirmed_claim: bool,
    ) -> Self {
        Self {
            journalists,
            issuer,
            verifier,
            require_confirmed_claim,
        }
    }

    pub async fn register(&self, raw_name: &str) -> Result<Registration> {
        if raw_name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::Validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        let name = sanitize_name(raw_name).trim().to_string();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(DomainError::InvalidName(format!(
                "name must be at least {MIN_NAME_LEN} characters after sanitization"
            )));
        }

        let key = self.issuer.issue_api_key()?;
        let code = self.issuer.issue_claim_code()?;

        let journalist = self
            .journalists
            .insert(NewJournalist {
                id: Uuid::new_v4(),
                name,
                api_key_hash: key.hash,
                verification_code: code,
            })
            .await?;

        tracing::info!(journalist_id = %journalist.id, name = %journalist.name, "journalist registered");

        let instructions = self.instructions(&journalist);
        Ok(Registration {
            journalist,
            api_key: key.raw,
            instructions,
        })
    }

    fn instructions(&self, journalist: &Journalist) -> String {
        let claim = self
            .verifier
            .template()
            .render(&journalist.name, &journalist.verification_code);
        format!(
            "To verify your journalist account, post on Twitter/X:\n\n{claim}\n\n\
             Then call the verification endpoint with the tweet URL:\n\
             POST /api/journalists/verify\n\
             {{\"journalist_name\": \"{name}\", \"verification_code\": \"{code}\", \
             \"tweet_url\": \"https://x.com/yourhandle/status/123456789\"}}",
            name = journalist.name,
            code = journalist.verification_code,
        )
    }

    /// Resolves an API key to a journalist allowed to write.
    pub async fn authenticate(&self, raw_key: Option<&str>) -> Result<Journalist> {
        let raw_key = raw_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(DomainError::Unauthorized(AuthFailure::MissingCredential))?;

        let hash = self.issuer.hash_api_key(raw_key);
        let journalist = self
            .journalists
            .find_by_api_key_hash(&hash)
            .await?
            .ok_or(DomainError::Unauthorized(AuthFailure::InvalidCredential))?;

        if !journalist.active {
            return Err(DomainError::Unauthorized(AuthFailure::Deactivated));
        }
        if !journalist.verified {
            return Err(DomainError::Unauthorized(AuthFailure::NotVerified));
        }
        Ok(journalist)
    }

    pub async fn verify(&self, req: VerifyRequest) -> Result<Verified> {
        let journalist = self
            .journalists
            .find_for_verification(&req.journalist_name, &req.verification_code)
            .await?
            .ok_or(DomainError::VerificationFailed)?;

        if journalist.verified {
            return Err(DomainError::AlreadyVerified(journalist.name));
        }

        let tweet_url = req
            .tweet_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());
        let asserted = req
            .twitter_handle
            .as_deref()
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty());

        let mut confirmed = None;
        if let Some(url) = tweet_url {
            match claim::parse_status_url(url) {
                Some(post) => {
                    let outcome = self
                        .verifier
                        .confirm(&post, &journalist.name, &journalist.verification_code)
                        .await;
                    match outcome {
                        ClaimOutcome::Confirmed { source } => {
                            tracing::info!(name = %journalist.name, handle = %post.handle, %source, "claim post confirmed");
                            confirmed = Some(post.handle);
                        }
                        ClaimOutcome::Mismatch { attempts } => {
                            tracing::warn!(name = %journalist.name, attempts, "claim phrase not found in fetched post");
                            if self.require_confirmed_claim {
                                return Err(DomainError::ClaimUnverifiable(
                                    "the post does not contain the expected claim".into(),
                                ));
                            }
                        }
                        ClaimOutcome::Unreachable { attempts } => {
                            tracing::warn!(name = %journalist.name, attempts, "no fetch strategy could retrieve the claim post");
                            if self.require_confirmed_claim {
                                return Err(DomainError::ClaimUnverifiable(
                                    "no source could retrieve the post".into(),
                                ));
                            }
                        }
                    }
                }
                None => {
                    tracing::warn!(name = %journalist.name, url, "tweet url is not a status link");
                    if self.require_confirmed_claim {
                        return Err(DomainError::ClaimUnverifiable(
                            "the tweet URL is not a status link".into(),
                        ));
                    }
                }
            }
        } else if self.require_confirmed_claim {
            return Err(DomainError::ClaimUnverifiable("a tweet URL is required".into()));
        }

        let (handle, handle_source) = match (confirmed, asserted, tweet_url.and_then(claim::handle_from_url)) {
            (Some(h), _, _) => (h, HandleSource::ConfirmedPost),
            (None, Some(h), _) => (h, HandleSource::Asserted),
            (None, None, Some(h)) => (h, HandleSource::UrlOnly),
            (None, None, None) => return Err(DomainError::MissingHandle),
        };

        if handle_source != HandleSource::ConfirmedPost {
            tracing::warn!(
                name = %journalist.name,
                handle = %handle,
                source = handle_source.as_str(),
                "accepting unconfirmed handle"
            );
        }

        let journalist = self.journalists.mark_verified(journalist.id, &handle).await?;
        tracing::info!(journalist_id = %journalist.id, handle = %handle, "journalist verified");

        Ok(Verified {
            journalist,
            handle_source,
        })
    }

    // ── Admin operations ────────────────────────────────────────────────────

    pub async fn list(&self, limit: i64) -> Result<Vec<Journalist>> {
        self.journalists.list(limit.clamp(1, 100)).await
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        if !self.journalists.set_active(id, active).await? {
            return Err(DomainError::NotFound("journalist".into(), id.to_string()));
        }
        tracing::info!(journalist_id = %id, active, "journalist activation changed");
        Ok(())
    }

    pub async fn force_verify(&self, id: Uuid, handle: Option<String>) -> Result<()> {
        let handle = handle
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty());
        if !self.journalists.force_verify(id, handle).await? {
            return Err(DomainError::NotFound("journalist".into(), id.to_string()));
        }
        tracing::info!(journalist_id = %id, "journalist verified by operator");
        Ok(())
    }
}
