//! Runwatch Engine
//!
//! Keeps a local view of background job runs in sync with the remote API
//! and tells interested parties when a run finishes.
//!
//! Architecture:
//! - Configuration: Poll intervals and backoff bounds, from env or defaults
//! - Repository: Reading run pages from the remote source
//! - Services: Run store, exactly-once lifecycle notifier, activity tracker
//! - Scheduler: Adaptive poll timer, the only caller of the repository
//! - Engine: Composition root handed out to callers
//!
//! The engine polls fast right after a run is announced, slower while runs
//! are in flight, and backs off exponentially when nothing happens and no
//! one is looking.

pub mod config;
pub mod engine;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use config::Config;
pub use engine::{PollingSnapshot, SyncEngine};
pub use repository::RunFetcher;
pub use scheduler::{PollTier, SkipReason, TickOutcome};
pub use service::SubscriptionId;
