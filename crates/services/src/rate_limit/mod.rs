//! Admission control: a token bucket per address for reads, a sliding
//! window per identity for writes, and the sweeper that keeps both bounded.

mod read;
mod sweeper;
mod write;

pub use read::{ReadDecision, ReadLimitConfig, ReadLimiter};
pub use sweeper::{spawn_sweeper, sweep_once};
pub use write::WriteLimiter;
