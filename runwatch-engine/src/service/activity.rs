//! Activity tracker
//!
//! Derives a coarse "user is present" flag from interaction signals. Every
//! signal keeps the user active for `timeout`; once the timeout elapses
//! without a new signal the user counts as inactive.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::service::lock;

/// Presence detection with a trailing inactivity timeout
#[derive(Debug)]
pub struct ActivityTracker {
    timeout: Duration,
    status: Arc<watch::Sender<bool>>,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl ActivityTracker {
    /// Creates a tracker
    ///
    /// # Arguments
    /// * `timeout` - How long a signal keeps the user active
    /// * `initially_active` - Starting value, no timer is armed
    pub fn new(timeout: Duration, initially_active: bool) -> Self {
        let (status, _) = watch::channel(initially_active);
        Self {
            timeout,
            status: Arc::new(status),
            expiry: Mutex::new(None),
        }
    }

    /// Whether the user currently counts as active
    pub fn is_active(&self) -> bool {
        *self.status.borrow()
    }

    /// Watches the active flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Records an interaction: active now, inactive after the timeout
    ///
    /// Must be called from within a tokio runtime.
    pub fn mark_active(&self) {
        self.set_status(true);
        self.arm_timer();
    }

    /// Sets the flag directly
    ///
    /// Setting it to `true` behaves like [`mark_active`](Self::mark_active);
    /// setting it to `false` cancels the pending timer.
    ///
    /// # Returns
    /// The previous value
    pub fn set_active(&self, active: bool) -> bool {
        let previous = self.set_status(active);
        if active {
            self.arm_timer();
        } else {
            self.cancel_timer();
        }
        previous
    }

    /// Cancels the pending inactivity timer, leaving the flag as it is
    pub fn cancel_timer(&self) {
        if let Some(handle) = lock(&self.expiry).take() {
            handle.abort();
        }
    }

    /// Receivers are only woken when the value actually flips
    fn set_status(&self, active: bool) -> bool {
        let changed = self.status.send_if_modified(|current| {
            let flipped = *current != active;
            *current = active;
            flipped
        });
        if changed {
            debug!("User activity changed: active={}", active);
            !active
        } else {
            active
        }
    }

    fn arm_timer(&self) {
        let status = Arc::clone(&self.status);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!("No user activity for {:?}", timeout);
            status.send_if_modified(|current| std::mem::replace(current, false));
        });

        if let Some(previous) = lock(&self.expiry).replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for ActivityTracker {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
