//! Synchronization engine
//!
//! Composition root of the run tracking machinery. A [`SyncEngine`] is
//! built once, handed out by clone to whoever needs it (job launcher hooks,
//! consumers, UI), and torn down with [`SyncEngine::stop`] or
//! [`SyncEngine::close`].

use anyhow::Result;
use runwatch_client::RunsClient;
use runwatch_core::domain::event::RunEvent;
use runwatch_core::domain::run::Run;
use runwatch_core::dto::run::RunAnnounced;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::repository::RunFetcher;
use crate::scheduler::poller::{self, Trigger};
use crate::scheduler::{PollScheduler, PollTier, PollingState, TickOutcome};
use crate::service::{ActivityTracker, Notifier, RunStore, SubscriptionId, lock};

/// State shared between the engine handle and its poll loop
#[derive(Debug)]
pub(crate) struct EngineInner {
    pub(crate) config: Config,
    pub(crate) store: Mutex<RunStore>,
    pub(crate) notifier: Notifier,
    pub(crate) activity: ActivityTracker,
    pub(crate) scheduler: PollScheduler,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct PollingSnapshot {
    pub state: PollingState,
    pub user_active: bool,
    pub tier: PollTier,
    /// Interval the tier calls for right now
    pub interval: Duration,
    pub running: bool,
}

/// Run status synchronization engine
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Creates a stopped engine reading runs through `fetcher`
    pub fn new(config: Config, fetcher: Arc<dyn RunFetcher>) -> Self {
        let inner = EngineInner {
            store: Mutex::new(RunStore::new(config.completion_epsilon)),
            notifier: Notifier::new(),
            activity: ActivityTracker::new(config.inactivity_timeout, false),
            scheduler: PollScheduler::new(fetcher, PollingState::new(&config)),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a stopped engine reading runs from the HTTP API in the config
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let client = RunsClient::new(config.remote_url.clone());
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Starts tracking: fresh polling state, initial fetch, poll timer armed
    ///
    /// Calling it while running re-arms the timer with a freshly computed
    /// interval instead of starting a second loop. Must be called from within
    /// a tokio runtime.
    ///
    /// # Returns
    /// `true` if tracking was started, `false` if it was already running
    pub fn start(&self) -> bool {
        if !self.inner.scheduler.is_running() && self.inner.config.assume_active_on_start {
            self.inner.activity.mark_active();
        }
        self.inner.scheduler.start(&self.inner)
    }

    /// Stops tracking; a no-op when already stopped
    ///
    /// Timers are cancelled synchronously. A fetch already in flight may
    /// complete, but its result is discarded. Known runs and the record of
    /// emitted events are kept.
    pub fn stop(&self) -> bool {
        let stopped = self.inner.scheduler.stop();
        self.inner.activity.cancel_timer();
        stopped
    }

    /// Stops tracking and detaches every consumer
    pub fn close(&self) {
        self.stop();
        self.inner.notifier.clear_subscribers();
        info!("Run tracking closed");
    }

    /// Whether tracking is running
    pub fn is_running(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    // =============================================================================
    // External triggers
    // =============================================================================

    /// Handles a run announced by the job launcher
    ///
    /// The run shows up immediately as a provisional entry, the scheduler
    /// moves to the fast tier, and one fetch is made right away regardless
    /// of the debounce floor.
    pub async fn announce(&self, announced: RunAnnounced) -> TickOutcome {
        let run: Run = announced.into();
        info!("Run {} announced ({})", run.id, run.status);

        let has_active = {
            let mut store = lock(&self.inner.store);
            store.upsert_provisional(run);
            store.has_active()
        };

        self.inner.scheduler.update_polling(|state| {
            state.last_new_run = Some(Instant::now());
            state.has_active_runs = has_active;
            state.reset_backoff(&self.inner.config);
        });

        self.inner.scheduler.restart();

        poller::tick(&self.inner, Trigger::Announcement).await
    }

    /// Forces a poll now, subject to the debounce floor
    pub async fn refresh(&self) -> TickOutcome {
        poller::tick(&self.inner, Trigger::Manual).await
    }

    /// Sets user presence directly
    ///
    /// Becoming active resets the idle backoff and triggers a fetch.
    pub fn set_user_active(&self, active: bool) {
        self.inner.activity.set_active(active);
    }

    /// Records a user interaction
    pub fn mark_user_activity(&self) {
        self.inner.activity.mark_active();
    }

    // =============================================================================
    // Consumers
    // =============================================================================

    /// Registers a lifecycle event consumer
    pub fn subscribe<F>(&self, consumer: F) -> SubscriptionId
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(consumer)
    }

    /// Registers a consumer fed through a channel
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<RunEvent>) {
        self.inner.notifier.subscribe_channel()
    }

    /// Removes a consumer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    // =============================================================================
    // Queries
    // =============================================================================

    /// All known runs, most recent first
    pub fn runs(&self) -> Vec<Run> {
        lock(&self.inner.store).all()
    }

    /// A single run by id
    pub fn run(&self, id: &str) -> Option<Run> {
        lock(&self.inner.store).get(id).cloned()
    }

    /// Number of runs in flight
    pub fn active_count(&self) -> usize {
        lock(&self.inner.store).active_count()
    }

    /// Whether any run is in flight
    pub fn has_active(&self) -> bool {
        lock(&self.inner.store).has_active()
    }

    /// Error of the last fetch, if it failed
    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.store).last_error().map(str::to_string)
    }

    /// Current scheduler state
    pub fn polling_snapshot(&self) -> PollingSnapshot {
        let user_active = self.inner.activity.is_active();
        let state = self.inner.scheduler.polling_state();
        let (tier, interval) = state.next_interval(user_active, Instant::now(), &self.inner.config);

        PollingSnapshot {
            state,
            user_active,
            tier,
            interval,
            running: self.inner.scheduler.is_running(),
        }
    }
}
