use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::SnapshotSource;
use crate::engine::SnapshotBatch;

/// Polls a data-provider endpoint that serves a `{ games, quotes }` document.
pub struct HttpSnapshotSource {
    http: Client,
    url: String,
    max_attempts: u32,
}

impl HttpSnapshotSource {
    pub fn new(url: &str, timeout: Duration, max_attempts: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpSnapshotSource {
            http,
            url: url.to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    async fn fetch_once(&self) -> Result<SnapshotBatch> {
        debug!("Fetching snapshot from {}", self.url);
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("Snapshot request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Snapshot provider error {}: {}", status, body);
        }

        resp.json::<SnapshotBatch>()
            .await
            .context("Failed to parse snapshot response")
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_batch(&self) -> Result<SnapshotBatch> {
        let mut backoff_ms = 250u64;
        let mut attempt = 1;
        loop {
            match self.fetch_once().await {
                Ok(batch) => return Ok(batch),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "Snapshot fetch attempt {}/{} failed: {:#}; retrying in {}ms",
                        attempt, self.max_attempts, e, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(4_000);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
