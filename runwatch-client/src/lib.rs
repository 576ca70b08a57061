//! Runwatch HTTP Client
//!
//! A small, type-safe HTTP client for the remote run API.
//!
//! The engine only ever reads from the remote source, so the client exposes
//! the read side: paged run listings and single-run lookups.
//!
//! # Example
//!
//! ```no_run
//! use runwatch_client::RunsClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), runwatch_client::ClientError> {
//!     let client = RunsClient::new("http://localhost:8080");
//!
//!     let page = client.list_runs(20, 0).await?;
//!     println!("Fetched {} run record(s)", page.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod runs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use runwatch_core::dto::run::RunRecord;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client for the remote run API
#[derive(Debug, Clone)]
pub struct RunsClient {
    /// Base URL of the remote API (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl RunsClient {
    /// Create a client for the run API at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Same as [`new`](Self::new) over a preconfigured `reqwest` client
    /// (timeouts, proxies, TLS)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the remote API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Maps a non-2xx status to [`ClientError::ApiError`], otherwise decodes
    /// the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let url = response.url().clone();
        debug!("{} answered {}", url, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            };
            debug!("Run API error from {}: {}", url, message);
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Invalid run payload from {}: {}", url, e)))
    }
}
