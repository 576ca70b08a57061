//! Runs repository
//!
//! Handles reading run pages from the authoritative remote source.

use anyhow::{Context, Result};
use async_trait::async_trait;
use runwatch_client::RunsClient;
use runwatch_core::dto::run::RunRecord;

/// Repository trait for reading runs from the remote source
#[async_trait]
pub trait RunFetcher: Send + Sync {
    /// Fetches one page of the most recent runs
    ///
    /// # Arguments
    /// * `limit` - Maximum number of runs in the page
    /// * `offset` - Number of most recent runs to skip
    ///
    /// Runs are ordered by recency, newest first.
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>>;
}

#[async_trait]
impl RunFetcher for RunsClient {
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>> {
        self.list_runs(limit, offset)
            .await
            .with_context(|| format!("Failed to fetch runs from {}", self.base_url()))
    }
}
