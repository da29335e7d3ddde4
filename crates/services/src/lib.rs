//! # services
//!
//! Business rules of the newsroom write path. Everything here talks to the
//! outside world through the ports in `domains`, so every service can be
//! exercised against mocks.

pub mod cache_aside;
pub mod identity;
pub mod ip_hash;
pub mod moderation;
pub mod rate_limit;
pub mod stories;

pub use cache_aside::{CacheAside, Cached};
pub use identity::{IdentityService, Registration, Verified, VerifyRequest};
pub use ip_hash::AddressHasher;
pub use moderation::{Lexicon, ModerationFilter, Verdict};
pub use rate_limit::{ReadDecision, ReadLimitConfig, ReadLimiter, WriteLimiter};
pub use stories::{StoryService, StorySettings, Submission};
