//! # DomainError
//!
//! Centralized error handling for the newsroom workspace.
//! Every port and service returns this type; the HTTP layer maps each
//! variant to a status code and a machine-readable code.

use thiserror::Error;

/// Why a credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredential,
    InvalidCredential,
    NotVerified,
    Deactivated,
    InvalidAdminKey,
}

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Story, Journalist)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Malformed or out-of-bounds request field
    #[error("validation error: {0}")]
    Validation(String),

    /// Registration name is too short once sanitized
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A story needs a url or a body
    #[error("either url or content is required")]
    MissingContent,

    /// Moderation refused a field; the string is the human-readable reason
    #[error("content rejected: {0}")]
    ContentRejected(String),

    /// Credential missing, unknown, unverified or deactivated
    #[error("unauthorized: {0:?}")]
    Unauthorized(AuthFailure),

    /// Display name already taken
    #[error("conflict: journalist name {0} already exists")]
    DuplicateName(String),

    /// The (story, address) pair already voted
    #[error("conflict: story {0} already upvoted from this address")]
    AlreadyUpvoted(String),

    /// Verification is a one-way transition
    #[error("conflict: journalist {0} is already verified")]
    AlreadyVerified(String),

    /// No active journalist matches the (name, code) pair
    #[error("no journalist matches the given name and verification code")]
    VerificationFailed,

    /// Neither a tweet URL nor an asserted handle yielded a handle
    #[error("a twitter handle or tweet URL is required for verification")]
    MissingHandle,

    /// Strict verification could not confirm the claim post
    #[error("could not verify tweet content: {0}")]
    ClaimUnverifiable(String),

    /// Read-path admission control refused the request
    #[error("too many requests, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Write-path admission control refused the request
    #[error("post rate limit exceeded: {max_actions} per {window_secs}s")]
    PostRateLimitExceeded { max_actions: i64, window_secs: i64 },

    /// The write limiter could not consult its log
    #[error("rate limit check failed: {0}")]
    RateCheckFailed(String),

    /// Durable store unreachable or failing (retryable)
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Anything else that is our fault
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Transient failures a caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Unavailable(_)
                | DomainError::RateCheckFailed(_)
                | DomainError::RateLimitExceeded { .. }
                | DomainError::PostRateLimitExceeded { .. }
        )
    }
}

/// Failure of the shared cache. Never fatal for a request.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure of a single post-fetch strategy.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned an empty body")]
    Empty,
}

/// A specialized Result type for newsroom logic.
pub type Result<T> = std::result::Result<T, DomainError>;
