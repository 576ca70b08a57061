//! Polling policy
//!
//! Pure decision logic of the scheduler: which tier applies, how long to
//! sleep, whether a tick should fetch, and how the idle backoff evolves.
//! Kept free of timers and I/O so it can be tested with plain instants.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::Config;

/// Polling tiers, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTier {
    /// A run was announced recently
    NewRun,
    /// Runs are in flight
    ActiveRuns,
    /// Nothing running and nobody watching: exponential backoff
    IdleBackoff,
    /// Nothing running, user present
    Default,
}

/// Mutable polling state, one per tracking session
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState {
    /// When the last fetch was started
    pub last_fetch_attempt: Option<Instant>,

    /// When the last fetch succeeded
    pub last_fetch_success: Option<Instant>,

    /// When the job launcher last announced a run
    pub last_new_run: Option<Instant>,

    /// Cached from the store after every successful fetch or announcement
    pub has_active_runs: bool,

    /// Fetches performed on the idle tier in a row
    pub consecutive_empty_fetches: u32,

    /// Current idle interval
    pub backoff_interval: Duration,
}

impl PollingState {
    /// Fresh state for a new tracking session
    pub fn new(config: &Config) -> Self {
        Self {
            last_fetch_attempt: None,
            last_fetch_success: None,
            last_new_run: None,
            has_active_runs: false,
            consecutive_empty_fetches: 0,
            backoff_interval: config.initial_backoff,
        }
    }

    /// Selects the tier, first match wins
    pub fn tier(&self, user_active: bool, now: Instant, config: &Config) -> PollTier {
        let recent_announcement = self
            .last_new_run
            .is_some_and(|at| now.saturating_duration_since(at) < config.new_run_window);

        if recent_announcement {
            PollTier::NewRun
        } else if self.has_active_runs {
            PollTier::ActiveRuns
        } else if !user_active {
            PollTier::IdleBackoff
        } else {
            PollTier::Default
        }
    }

    /// Time until the next tick, never below the debounce floor
    pub fn next_interval(
        &self,
        user_active: bool,
        now: Instant,
        config: &Config,
    ) -> (PollTier, Duration) {
        let tier = self.tier(user_active, now, config);
        let interval = match tier {
            PollTier::NewRun => config.fast_poll_interval,
            PollTier::ActiveRuns => config.running_poll_interval,
            PollTier::IdleBackoff => self.backoff_interval,
            PollTier::Default => config.check_interval,
        };
        (tier, interval.max(config.debounce_floor))
    }

    /// Whether a timer tick should hit the remote
    ///
    /// Idle, inactive sessions only fetch once per backoff interval, which
    /// still guarantees eventual convergence.
    pub fn should_fetch(&self, user_active: bool, now: Instant) -> bool {
        user_active
            || self.has_active_runs
            || self
                .last_fetch_attempt
                .is_none_or(|at| now.saturating_duration_since(at) >= self.backoff_interval)
    }

    /// Whether the previous attempt is too recent for another one
    pub fn is_debounced(&self, now: Instant, floor: Duration) -> bool {
        self.last_fetch_attempt
            .is_some_and(|at| now.saturating_duration_since(at) < floor)
    }

    /// Back to the first backoff step
    pub fn reset_backoff(&mut self, config: &Config) {
        if self.backoff_interval != config.initial_backoff {
            debug!("Idle backoff reset to {:?}", config.initial_backoff);
        }
        self.backoff_interval = config.initial_backoff;
        self.consecutive_empty_fetches = 0;
    }

    /// Records a successful fetch and settles the backoff
    ///
    /// The new-run window closes early once nothing is in flight anymore.
    pub fn record_success(
        &mut self,
        has_active_runs: bool,
        user_active: bool,
        now: Instant,
        config: &Config,
    ) {
        self.last_fetch_success = Some(now);
        self.has_active_runs = has_active_runs;
        if !has_active_runs {
            self.last_new_run = None;
        }
        self.settle_backoff(user_active, now, config, true);
    }

    /// Records a failed fetch; state is kept and the backoff never resets
    pub fn record_failure(&mut self, user_active: bool, now: Instant, config: &Config) {
        self.settle_backoff(user_active, now, config, false);
    }

    fn settle_backoff(&mut self, user_active: bool, now: Instant, config: &Config, succeeded: bool) {
        if self.tier(user_active, now, config) == PollTier::IdleBackoff {
            self.consecutive_empty_fetches += 1;
            let grown = self.backoff_interval.saturating_mul(2).min(config.max_backoff);
            if grown != self.backoff_interval {
                debug!(
                    "Idle backoff {:?} -> {:?} after {} idle fetch(es)",
                    self.backoff_interval, grown, self.consecutive_empty_fetches
                );
            }
            self.backoff_interval = grown;
        } else if succeeded {
            self.reset_backoff(config);
        }
    }
}
