use std::sync::Arc;

use domains::ports::AdminAuthenticator;
use services::{IdentityService, ReadLimiter, StoryService};

use crate::metrics::Metrics;

/// Shared by every handler. All members are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub stories: Arc<StoryService>,
    pub read_limiter: Arc<ReadLimiter>,
    pub admin: Arc<dyn AdminAuthenticator>,
    pub metrics: Arc<Metrics>,
    pub version: &'static str,
    /// Honour `X-Forwarded-For` / `X-Real-IP` when resolving the client address.
    pub trust_forwarded: bool,
}
