//! `Cache` port implementations.
//!
//! `RedisCache` is the shared cache for multi-instance deployments,
//! `MemoryCache` serves single-process setups and tests, and `NoopCache`
//! stands in when no backend is configured or reachable.

mod memory;
mod noop;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCache;
pub use noop::NoopCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;
