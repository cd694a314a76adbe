use anyhow::Result;
use async_trait::async_trait;

use crate::engine::SnapshotBatch;

/// Trait that every game/quote data provider must implement.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Return the current games and quotes as one batch.
    async fn fetch_batch(&self) -> Result<SnapshotBatch>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
