use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::provider::SnapshotSource;
use crate::engine::SnapshotBatch;

/// Reads a `{ games, quotes }` JSON document from disk on every fetch, so an
/// external process can keep rewriting it between cycles.
pub struct FileSnapshotSource {
    path: PathBuf,
    name: String,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        FileSnapshotSource { path, name }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_batch(&self) -> Result<SnapshotBatch> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot file {}", self.path.display()))?;
        let batch: SnapshotBatch = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot file {}", self.path.display()))?;
        debug!(
            "Loaded {} games and {} loose quotes from {}",
            batch.games.len(),
            batch.quotes.len(),
            self.path.display()
        );
        Ok(batch)
    }
}
