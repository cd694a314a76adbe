use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use linescout::api::{self, AppState};
use linescout::config::Config;
use linescout::db::FlagStore;
use linescout::feed::source_from_config;
use linescout::runner::{CycleRunner, FlagHistory, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let engine = config.engine_config();

    info!(
        "Fairline cascade: algo={:?}, reference books={:?}, median>={}, best price>={}",
        engine.algo_fairline_source,
        engine.reference_books,
        engine.median_min_quotes,
        engine.best_price_min_quotes
    );

    let store = FlagStore::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let source = source_from_config(&config)?;
    info!("Snapshot source: {}", source.name());

    let retention = chrono::Duration::days(config.flag_retention_days);
    let shared = Arc::new(SharedState::new(FlagHistory::new(
        config.flag_history_cap,
        retention,
    )));

    // Start the results API
    let app = api::router(AppState {
        store: store.clone(),
        shared: Arc::clone(&shared),
    });
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("Results API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Refresh cycles run in their own task; a slow cycle skips ticks rather
    // than queueing them.
    let runner = CycleRunner::new(
        source,
        engine,
        store,
        shared,
        Duration::from_secs(config.cycle_timeout_secs),
        config.flag_history_cap,
        retention,
    );
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            runner.run_once().await;
        }
    });

    // Run API server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}
