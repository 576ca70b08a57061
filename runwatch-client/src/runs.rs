//! Run-related API endpoints

use crate::RunsClient;
use crate::error::Result;
use runwatch_core::dto::run::RunRecord;
use serde_json::Value;
use tracing::{debug, warn};

impl RunsClient {
    /// List the most recent runs, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of runs to return
    /// * `offset` - Number of most recent runs to skip
    ///
    /// # Returns
    /// One page of raw run records. Entries that are not JSON objects are
    /// dropped with a warning; the rest are not validated here, the engine
    /// skips malformed records during reconciliation.
    pub async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>> {
        let url = format!("{}/api/runs", self.base_url);
        debug!("GET {} (limit={}, offset={})", url, limit, offset);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let page: Vec<Value> = self.handle_response(response).await?;
        Ok(parse_page(page))
    }

    /// Get a single run by ID
    ///
    /// # Arguments
    /// * `run_id` - The run identifier
    pub async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        let url = format!("{}/api/runs/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

/// Converts page entries one by one so a bad entry does not sink the page
fn parse_page(page: Vec<Value>) -> Vec<RunRecord> {
    page.into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping run entry {} of page: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use reqwest::Client;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with `status` and `body`, returns the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn client(base_url: String) -> RunsClient {
        RunsClient::with_client(base_url, Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn test_list_runs_keeps_good_records() {
        let base_url = serve_once(
            "200 OK",
            r#"[{"id":"job-1","status":"running","createdAt":"2024-01-01T00:00:00Z"},
                {"id":"job-2","status":"completed","createdAt":"2024-01-01T00:00:00Z","completedAt":"not-a-date"},
                7]"#,
        )
        .await;

        let records = client(base_url).list_runs(20, 0).await.unwrap();

        let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["job-1", "job-2"]);
    }

    #[tokio::test]
    async fn test_error_status_without_body_uses_reason() {
        let base_url = serve_once("503 Service Unavailable", "").await;

        let err = client(base_url).list_runs(20, 0).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::ApiError { status: 503, ref message } if message == "Service Unavailable"
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_bad_entries_do_not_sink_the_page() {
        let page = vec![
            json!({"id": "job-1", "status": "running", "createdAt": "2024-01-01T00:00:00Z"}),
            json!({"id": "job-2", "status": "completed", "createdAt": "2024-01-01T00:00:00Z",
                   "completedAt": "not-a-date"}),
            json!("job-3"),
            json!(null),
        ];

        let records = parse_page(page);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("job-1"));
        assert_eq!(records[1].id.as_deref(), Some("job-2"));
        assert_eq!(records[1].completed_at, None);
    }
}
