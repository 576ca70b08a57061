//! Scheduler layer
//!
//! This layer decides when the engine talks to the remote source. It owns
//! the poll timer, applies the four-tier interval policy and the idle
//! backoff, and is the only place the run fetcher is called from.

pub mod policy;
pub mod poller;

pub use policy::{PollTier, PollingState};
pub use poller::{PollScheduler, SkipReason, TickOutcome};
