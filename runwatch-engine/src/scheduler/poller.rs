//! Poll scheduler
//!
//! Owns the single poll timer and the remote fetcher. Every fetch in the
//! engine goes through [`tick`], whether it comes from the timer, a manual
//! refresh, a run announcement or the user coming back.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::engine::EngineInner;
use crate::repository::RunFetcher;
use crate::scheduler::policy::PollingState;
use crate::service::lock;

/// What caused a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// First fetch when tracking starts
    Startup,
    /// The poll timer fired
    Timer,
    /// An external caller forced a refresh
    Manual,
    /// The user became active again
    Activity,
    /// The job launcher announced a run
    Announcement,
}

impl Trigger {
    /// Announcements bypass the debounce floor, nothing else does
    fn bypasses_debounce(self) -> bool {
        matches!(self, Trigger::Announcement)
    }

    /// Only timer ticks are subject to the idle should-fetch gate
    fn gated_when_idle(self) -> bool {
        matches!(self, Trigger::Timer)
    }
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A page was fetched and reconciled
    Fetched {
        /// Lifecycle events delivered during this tick
        emitted: usize,
    },
    /// The fetch failed, state is unchanged
    Failed,
    /// No fetch was made
    Skipped(SkipReason),
    /// The engine stopped while the fetch was in flight
    Discarded,
}

/// Why a tick did not fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Tracking is not running
    Stopped,
    /// The previous attempt was less than the debounce floor ago
    Debounced,
    /// Idle and inactive, the backoff interval has not elapsed
    Idle,
}

#[derive(Debug, Default)]
struct Lifecycle {
    timer: Option<JoinHandle<()>>,
    /// Bumped on every start and stop so stale fetch results can be detected
    generation: u64,
    current_interval: Option<Duration>,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.timer.is_some() && self.generation == generation
    }
}

/// Adaptive poll scheduler
pub struct PollScheduler {
    fetcher: Arc<dyn RunFetcher>,
    polling: Mutex<PollingState>,
    lifecycle: Mutex<Lifecycle>,
    reschedule: Notify,
}

impl PollScheduler {
    /// Creates a stopped scheduler
    pub fn new(fetcher: Arc<dyn RunFetcher>, initial: PollingState) -> Self {
        Self {
            fetcher,
            polling: Mutex::new(initial),
            lifecycle: Mutex::new(Lifecycle::default()),
            reschedule: Notify::new(),
        }
    }

    /// Starts the poll loop, or re-arms the timer if it is already running
    ///
    /// # Returns
    /// `true` if a new loop was spawned
    pub(crate) fn start(&self, engine: &Arc<EngineInner>) -> bool {
        let mut lifecycle = lock(&self.lifecycle);

        if lifecycle.timer.is_some() {
            drop(lifecycle);
            debug!("Poll loop already running, re-arming timer");
            self.restart();
            return false;
        }

        lifecycle.generation += 1;
        lifecycle.current_interval = None;
        *lock(&self.polling) = PollingState::new(&engine.config);

        let activity = engine.activity.subscribe();
        lifecycle.timer = Some(tokio::spawn(run_loop(Arc::clone(engine), activity)));

        info!("Run tracking started");
        true
    }

    /// Cancels the poll timer; no-op when stopped
    ///
    /// # Returns
    /// `true` if a running loop was stopped
    pub fn stop(&self) -> bool {
        let timer = {
            let mut lifecycle = lock(&self.lifecycle);
            lifecycle.generation += 1;
            lifecycle.current_interval = None;
            lifecycle.timer.take()
        };

        match timer {
            Some(handle) => {
                handle.abort();
                info!("Run tracking stopped");
                true
            }
            None => false,
        }
    }

    /// Wakes the loop so it recomputes its interval right away
    pub fn restart(&self) {
        self.reschedule.notify_one();
    }

    /// Whether the poll loop is running
    pub fn is_running(&self) -> bool {
        lock(&self.lifecycle).timer.is_some()
    }

    /// Interval the timer is currently armed with
    pub fn current_interval(&self) -> Option<Duration> {
        lock(&self.lifecycle).current_interval
    }

    /// Copy of the polling state
    pub fn polling_state(&self) -> PollingState {
        lock(&self.polling).clone()
    }

    /// Applies a change to the polling state
    pub(crate) fn update_polling<R>(&self, f: impl FnOnce(&mut PollingState) -> R) -> R {
        f(&mut lock(&self.polling))
    }

    fn running_generation(&self) -> Option<u64> {
        let lifecycle = lock(&self.lifecycle);
        lifecycle.timer.as_ref().map(|_| lifecycle.generation)
    }

    /// Computes the next interval and records it as the armed one
    fn next_interval(&self, engine: &EngineInner) -> Duration {
        let user_active = engine.activity.is_active();
        let (tier, interval) =
            lock(&self.polling).next_interval(user_active, Instant::now(), &engine.config);

        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.current_interval != Some(interval) {
            debug!("Poll interval now {:?} ({:?})", interval, tier);
            lifecycle.current_interval = Some(interval);
        }
        interval
    }

    /// Wakes the loop if the state changed the interval it should sleep
    fn reschedule_if_changed(&self, engine: &EngineInner) {
        let user_active = engine.activity.is_active();
        let (_, interval) =
            lock(&self.polling).next_interval(user_active, Instant::now(), &engine.config);

        if self.current_interval().is_some_and(|current| current != interval) {
            self.restart();
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("polling", &self.polling_state())
            .field("running", &self.is_running())
            .field("current_interval", &self.current_interval())
            .finish()
    }
}

/// The poll loop: one timer, re-armed after every tick or state change
async fn run_loop(engine: Arc<EngineInner>, mut activity: watch::Receiver<bool>) {
    tick(&engine, Trigger::Startup).await;

    loop {
        let interval = engine.scheduler.next_interval(&engine);

        tokio::select! {
            _ = time::sleep(interval) => {
                tick(&engine, Trigger::Timer).await;
            }
            _ = engine.scheduler.reschedule.notified() => {
                debug!("Poll timer re-armed");
            }
            changed = activity.changed() => {
                if changed.is_err() {
                    warn!("Activity tracker went away, stopping poll loop");
                    return;
                }
                if *activity.borrow_and_update() {
                    engine.scheduler.update_polling(|state| state.reset_backoff(&engine.config));
                    tick(&engine, Trigger::Activity).await;
                }
            }
        }
    }
}

/// Runs one poll cycle: guard, fetch, reconcile, notify, settle backoff
///
/// The debounce check and the `last_fetch_attempt` write happen under one
/// lock, so concurrent callers cannot both pass the guard. The lock is not
/// held across the fetch.
pub(crate) async fn tick(engine: &EngineInner, trigger: Trigger) -> TickOutcome {
    let scheduler = &engine.scheduler;
    let config = &engine.config;

    let Some(generation) = scheduler.running_generation() else {
        return TickOutcome::Skipped(SkipReason::Stopped);
    };

    let user_active = engine.activity.is_active();

    {
        let now = Instant::now();
        let mut polling = lock(&scheduler.polling);

        if !trigger.bypasses_debounce() && polling.is_debounced(now, config.debounce_floor) {
            debug!("Skipping {:?} tick: debounced", trigger);
            return TickOutcome::Skipped(SkipReason::Debounced);
        }

        if trigger.gated_when_idle() && !polling.should_fetch(user_active, now) {
            debug!("Skipping {:?} tick: idle", trigger);
            return TickOutcome::Skipped(SkipReason::Idle);
        }

        polling.last_fetch_attempt = Some(now);
    }

    debug!("Fetching runs ({:?})", trigger);
    let result = scheduler.fetcher.fetch(config.page_limit, 0).await;

    let now = Instant::now();

    // Holding the lifecycle lock while applying keeps a concurrent stop()
    // from slipping in between the generation check and the store update.
    // Lock order: lifecycle, then store, then polling.
    let applied = {
        let lifecycle = lock(&scheduler.lifecycle);
        if !lifecycle.is_current(generation) {
            None
        } else {
            let mut store = lock(&engine.store);
            match result {
                Ok(page) => {
                    let fetched = page.len();
                    let transitions = store.reconcile(page, |t| engine.notifier.has_emitted(t));
                    store.clear_last_error();
                    let has_active = store.has_active();
                    lock(&scheduler.polling).record_success(has_active, user_active, now, config);
                    Some(Ok((transitions, fetched, has_active)))
                }
                Err(e) => {
                    store.set_last_error(format!("{:#}", e));
                    lock(&scheduler.polling).record_failure(user_active, now, config);
                    Some(Err(e))
                }
            }
        }
    };

    let Some(applied) = applied else {
        debug!("Discarding fetch result: tracking stopped meanwhile");
        return TickOutcome::Discarded;
    };

    match applied {
        Ok((transitions, fetched, has_active)) => {
            // Consumers run without any engine lock held.
            let mut emitted = 0;
            for transition in transitions {
                if engine.notifier.emit(transition) {
                    emitted += 1;
                }
            }

            debug!(
                "Reconciled {} record(s), {} event(s), active={}",
                fetched, emitted, has_active
            );

            if trigger == Trigger::Manual {
                scheduler.reschedule_if_changed(engine);
            }

            TickOutcome::Fetched { emitted }
        }
        Err(e) => {
            warn!("Failed to fetch runs: {:#}", e);
            TickOutcome::Failed
        }
    }
}
