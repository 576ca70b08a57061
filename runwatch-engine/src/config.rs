//! Engine configuration
//!
//! Defines every tunable of the synchronization engine: the remote
//! endpoint, the four polling tiers, the debounce floor, the idle backoff
//! bounds and the inactivity timeout.

use std::time::Duration;

/// Synchronization engine configuration
///
/// All intervals are configurable to allow tuning for different deployment
/// scenarios (local dev against a fast API vs. a rate-limited production API).
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote run API base URL (e.g., "http://localhost:8080")
    pub remote_url: String,

    /// Number of most recent runs requested per fetch
    pub page_limit: usize,

    /// Interval used right after a run was announced
    pub fast_poll_interval: Duration,

    /// How long an announcement keeps the scheduler on the fast tier
    pub new_run_window: Duration,

    /// Interval used while runs are in flight
    pub running_poll_interval: Duration,

    /// Interval used when nothing is running but the user is present
    pub check_interval: Duration,

    /// Minimum time between two fetch attempts, whatever triggers them
    pub debounce_floor: Duration,

    /// First idle backoff step
    pub initial_backoff: Duration,

    /// Idle backoff cap
    pub max_backoff: Duration,

    /// Time without interaction after which the user counts as inactive
    pub inactivity_timeout: Duration,

    /// Minimum duration given to a finished run whose remote timestamps
    /// report zero or negative elapsed time
    pub completion_epsilon: Duration,

    /// Whether tracking starts with the user considered present
    pub assume_active_on_start: bool,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(remote_url: String) -> Self {
        Self {
            remote_url,
            page_limit: 20,
            fast_poll_interval: Duration::from_secs(3),
            new_run_window: Duration::from_secs(60),
            running_poll_interval: Duration::from_secs(10),
            check_interval: Duration::from_secs(5),
            debounce_floor: Duration::from_secs(1),
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(300), // 5 minutes
            inactivity_timeout: Duration::from_secs(300),
            completion_epsilon: Duration::from_secs(1),
            assume_active_on_start: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNWATCH_URL (required)
    /// - RUNWATCH_PAGE_LIMIT (optional, default: 20)
    /// - RUNWATCH_FAST_POLL_INTERVAL (optional, seconds, default: 3)
    /// - RUNWATCH_RUNNING_POLL_INTERVAL (optional, seconds, default: 10)
    /// - RUNWATCH_CHECK_INTERVAL (optional, seconds, default: 5)
    /// - RUNWATCH_DEBOUNCE_MS (optional, milliseconds, default: 1000)
    /// - RUNWATCH_INITIAL_BACKOFF (optional, seconds, default: 60)
    /// - RUNWATCH_MAX_BACKOFF (optional, seconds, default: 300)
    /// - RUNWATCH_INACTIVITY_TIMEOUT (optional, seconds, default: 300)
    pub fn from_env() -> anyhow::Result<Self> {
        let remote_url = std::env::var("RUNWATCH_URL")
            .map_err(|_| anyhow::anyhow!("RUNWATCH_URL environment variable not set"))?;

        Ok(Self::new(remote_url).with_env_overrides())
    }

    /// Applies the optional `RUNWATCH_*` tuning variables on top of this
    /// configuration. The URL is left alone, so callers that take it from
    /// elsewhere still get the tuning.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides), reading
    /// variables through `lookup`. Unset or unparsable values are ignored.
    pub fn with_overrides_from<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());
        let secs = |key: &str| number(key).map(Duration::from_secs);

        Self {
            page_limit: number("RUNWATCH_PAGE_LIMIT")
                .and_then(|limit| usize::try_from(limit).ok())
                .unwrap_or(self.page_limit),
            fast_poll_interval: secs("RUNWATCH_FAST_POLL_INTERVAL")
                .unwrap_or(self.fast_poll_interval),
            running_poll_interval: secs("RUNWATCH_RUNNING_POLL_INTERVAL")
                .unwrap_or(self.running_poll_interval),
            check_interval: secs("RUNWATCH_CHECK_INTERVAL").unwrap_or(self.check_interval),
            debounce_floor: number("RUNWATCH_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(self.debounce_floor),
            initial_backoff: secs("RUNWATCH_INITIAL_BACKOFF").unwrap_or(self.initial_backoff),
            max_backoff: secs("RUNWATCH_MAX_BACKOFF").unwrap_or(self.max_backoff),
            inactivity_timeout: secs("RUNWATCH_INACTIVITY_TIMEOUT")
                .unwrap_or(self.inactivity_timeout),
            ..self
        }
    }

    /// Sets the number of runs requested per fetch
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// Sets the idle backoff bounds
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Sets the inactivity timeout
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Sets whether the user counts as present when tracking starts
    pub fn with_assume_active_on_start(mut self, active: bool) -> Self {
        self.assume_active_on_start = active;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.remote_url.is_empty() {
            anyhow::bail!("remote_url cannot be empty");
        }

        if !self.remote_url.starts_with("http://") && !self.remote_url.starts_with("https://") {
            anyhow::bail!("remote_url must start with http:// or https://");
        }

        if self.page_limit == 0 {
            anyhow::bail!("page_limit must be greater than 0");
        }

        for (name, interval) in [
            ("fast_poll_interval", self.fast_poll_interval),
            ("running_poll_interval", self.running_poll_interval),
            ("check_interval", self.check_interval),
            ("debounce_floor", self.debounce_floor),
            ("initial_backoff", self.initial_backoff),
            ("inactivity_timeout", self.inactivity_timeout),
            ("completion_epsilon", self.completion_epsilon),
        ] {
            if interval.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.max_backoff < self.initial_backoff {
            anyhow::bail!("max_backoff must not be smaller than initial_backoff");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fast_poll_interval, Duration::from_secs(3));
        assert_eq!(config.running_poll_interval, Duration::from_secs(10));
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.debounce_floor, Duration::from_secs(1));
        assert_eq!(config.initial_backoff, Duration::from_secs(60));
        assert_eq!(config.max_backoff, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.remote_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.remote_url = "https://runs.example.com".to_string();
        assert!(config.validate().is_ok());

        config.page_limit = 0;
        assert!(config.validate().is_err());
        config.page_limit = 20;

        config.debounce_floor = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_bounds_must_be_ordered() {
        let config = Config::default()
            .with_backoff(Duration::from_secs(120), Duration::from_secs(60));
        assert!(config.validate().is_err());

        let config = Config::default()
            .with_backoff(Duration::from_secs(60), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_completion_epsilon_is_rejected() {
        let mut config = Config::default();
        config.completion_epsilon = Duration::ZERO;
        assert!(config.validate().is_err());

        config.completion_epsilon = Duration::from_millis(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_without_url() {
        let vars = std::collections::HashMap::from([
            ("RUNWATCH_CHECK_INTERVAL", "42"),
            ("RUNWATCH_DEBOUNCE_MS", "250"),
            ("RUNWATCH_MAX_BACKOFF", "not-a-number"),
        ]);

        let config = Config::new("http://runs.internal:9000".to_string())
            .with_overrides_from(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.remote_url, "http://runs.internal:9000");
        assert_eq!(config.check_interval, Duration::from_secs(42));
        assert_eq!(config.debounce_floor, Duration::from_millis(250));
        assert_eq!(config.max_backoff, Duration::from_secs(300));
        assert_eq!(config.page_limit, 20);
    }
}
