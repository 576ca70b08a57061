//! Lifecycle notifier
//!
//! Delivers `RunCompleted` / `RunFailed` events to registered consumers,
//! at most once per run and terminal status for the lifetime of the process.

use runwatch_core::domain::event::{RunEvent, Transition};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::service::lock;

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Consumer = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Exactly-once lifecycle event dispatcher
pub struct Notifier {
    /// Consumers in registration order
    subscribers: Mutex<Vec<(SubscriptionId, Consumer)>>,

    /// Idempotency keys of every event emitted so far. Never pruned.
    emitted: Mutex<HashSet<String>>,

    next_id: AtomicU64,
}

impl Notifier {
    /// Creates a notifier with no consumers
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            emitted: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a consumer
    ///
    /// Consumers are called synchronously, in registration order, from the
    /// task that emits the event. They must not block.
    pub fn subscribe<F>(&self, consumer: F) -> SubscriptionId
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push((id, Arc::new(consumer)));
        debug!("Consumer {:?} subscribed", id);
        id
    }

    /// Registers a consumer that receives events through a channel
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            // A dropped receiver just stops listening.
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    /// Removes a consumer, returns false if it was not registered
    ///
    /// Safe to call from inside a consumer while an event is being delivered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Detaches every consumer
    pub fn clear_subscribers(&self) {
        lock(&self.subscribers).clear();
    }

    /// Number of registered consumers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Whether an event was already emitted for this transition
    pub fn has_emitted(&self, transition: &Transition) -> bool {
        lock(&self.emitted).contains(&transition.key())
    }

    /// Number of distinct events emitted so far
    pub fn emitted_count(&self) -> usize {
        lock(&self.emitted).len()
    }

    /// Emits the event for a transition unless it was emitted before
    ///
    /// # Returns
    /// `true` if the event was delivered, `false` for a suppressed duplicate
    pub fn emit(&self, transition: Transition) -> bool {
        let key = transition.key();

        if !lock(&self.emitted).insert(key.clone()) {
            debug!("Suppressed duplicate lifecycle event {}", key);
            return false;
        }

        let event = transition.into_event();

        // Deliver over a snapshot so consumers may unsubscribe mid-dispatch.
        let consumers: Vec<Consumer> = lock(&self.subscribers)
            .iter()
            .map(|(_, consumer)| Arc::clone(consumer))
            .collect();

        debug!("Emitting {} to {} consumer(s)", key, consumers.len());

        for consumer in consumers {
            consumer(&event);
        }

        true
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .field("emitted", &self.emitted_count())
            .finish()
    }
}
