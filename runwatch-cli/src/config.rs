//! Configuration module
//!
//! Handles CLI configuration and derives the engine configuration from it.

use anyhow::{Context, Result};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the remote run API
    pub remote_url: String,
}

impl Config {
    /// Builds the engine configuration for a watch session
    ///
    /// Tuning variables (`RUNWATCH_CHECK_INTERVAL`, ...) are read from the
    /// environment; the URL and page size given on the command line win.
    pub fn engine_config(&self, page_limit: usize) -> Result<runwatch_engine::Config> {
        self.engine_config_from(page_limit, |key| std::env::var(key).ok())
    }

    fn engine_config_from<F>(&self, page_limit: usize, lookup: F) -> Result<runwatch_engine::Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = runwatch_engine::Config::new(self.remote_url.clone())
            .with_overrides_from(lookup)
            .with_page_limit(page_limit);

        config.validate().context("Invalid watch configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_uses_cli_values() {
        let config = Config {
            remote_url: "http://runs.internal:9000".to_string(),
        };

        let engine = config.engine_config_from(50, |_| None).unwrap();
        assert_eq!(engine.remote_url, "http://runs.internal:9000");
        assert_eq!(engine.page_limit, 50);
    }

    #[test]
    fn test_engine_config_keeps_env_tuning() {
        let config = Config {
            remote_url: "http://runs.internal:9000".to_string(),
        };

        let engine = config
            .engine_config_from(20, |key| {
                (key == "RUNWATCH_CHECK_INTERVAL").then(|| "42".to_string())
            })
            .unwrap();

        assert_eq!(engine.check_interval, std::time::Duration::from_secs(42));
        assert_eq!(engine.remote_url, "http://runs.internal:9000");
    }

    #[test]
    fn test_page_limit_flag_beats_env() {
        let config = Config {
            remote_url: "http://runs.internal:9000".to_string(),
        };

        let engine = config
            .engine_config_from(50, |key| (key == "RUNWATCH_PAGE_LIMIT").then(|| "5".to_string()))
            .unwrap();

        assert_eq!(engine.page_limit, 50);
    }

    #[test]
    fn test_engine_config_rejects_bad_url() {
        let config = Config {
            remote_url: "runs.internal".to_string(),
        };

        assert!(config.engine_config_from(20, |_| None).is_err());
        assert!(config.engine_config_from(0, |_| None).is_err());
    }
}
