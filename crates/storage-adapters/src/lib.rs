//! # storage-adapters
//!
//! Concrete implementations of the persistence and cache ports.
//! Backends are compiled to order:
//!
//! | feature       | adapter                         |
//! |---------------|---------------------------------|
//! | `db-postgres` | [`postgres::PgStore`]           |
//! | `redis`       | [`cache::RedisCache`]           |
//! | (always)      | [`cache::MemoryCache`], [`cache::NoopCache`] |

pub mod cache;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use cache::{MemoryCache, NoopCache};
#[cfg(feature = "db-postgres")]
pub use postgres::{PgStore, PoolOptions};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
