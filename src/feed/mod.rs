pub mod file;
pub mod http;
pub mod provider;

pub use file::FileSnapshotSource;
pub use http::HttpSnapshotSource;
pub use provider::SnapshotSource;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Build the snapshot source selected on the command line.
pub fn source_from_config(config: &Config) -> Result<Arc<dyn SnapshotSource>> {
    if let Some(url) = &config.snapshot_url {
        let timeout = Duration::from_secs(config.cycle_timeout_secs.max(1));
        return Ok(Arc::new(HttpSnapshotSource::new(url, timeout, 3)?));
    }
    match &config.snapshot_path {
        Some(path) => Ok(Arc::new(FileSnapshotSource::new(path))),
        None => anyhow::bail!("no snapshot source configured"),
    }
}
