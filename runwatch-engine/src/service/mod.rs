//! Service layer
//!
//! Services hold the engine's state and business rules: the run store and
//! its merge policy, exactly-once event delivery, and presence detection.
//! The scheduler drives them; none of them talk to the remote source.

mod activity;
mod notifier;
mod store;

pub use activity::ActivityTracker;
pub use notifier::{Notifier, SubscriptionId};
pub use store::RunStore;

use std::sync::{Mutex, MutexGuard};

/// Locks a mutex, recovering the data if a consumer panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
