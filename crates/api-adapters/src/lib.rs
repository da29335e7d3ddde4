//! # api-adapters
//!
//! Transport layer for the newsroom board: error rendering, metrics and,
//! behind `web-axum`, the HTTP router and handlers.

pub mod error;
pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod http;

pub use error::{ApiError, ErrorBody};
pub use metrics::Metrics;
