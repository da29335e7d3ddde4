//! # auth-adapters
//!
//! Credential issuing, operator authentication and the outbound fetch
//! strategies used to confirm claim posts.

pub mod admin;
#[cfg(feature = "claim-http")]
pub mod claim_fetch;
pub mod credentials;

pub use admin::{hash_admin_key, Argon2AdminVerifier};
#[cfg(feature = "claim-http")]
pub use claim_fetch::{default_sources, FetchSource, HttpPostFetcher};
pub use credentials::RandomCredentialIssuer;
