//! Refresh-cycle orchestration: fetch, evaluate under a compute budget,
//! persist flags and publish the outcome for the API.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::db::models::CycleRun;
use crate::db::FlagStore;
use crate::engine::{assemble_snapshots, evaluate, CycleReport, EngineError, FlaggedRecord};
use crate::feed::SnapshotSource;

/// Bounded review list of flagged records, capped by count and by age. This
/// is the only engine state that outlives a cycle.
#[derive(Debug, Clone)]
pub struct FlagHistory {
    records: VecDeque<FlaggedRecord>,
    cap: usize,
    max_age: chrono::Duration,
}

impl FlagHistory {
    pub fn new(cap: usize, max_age: chrono::Duration) -> Self {
        FlagHistory {
            records: VecDeque::with_capacity(cap),
            cap,
            max_age,
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = FlaggedRecord>, now: DateTime<Utc>) {
        self.records.extend(records);
        let cutoff = now - self.max_age;
        self.records.retain(|r| r.flagged_at >= cutoff);
        while self.records.len() > self.cap {
            self.records.pop_front();
        }
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<FlaggedRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of the latest cycle, as served by the API.
#[derive(Debug, Clone)]
pub enum CycleStatus {
    Pending,
    Completed {
        report: Arc<CycleReport>,
        elapsed_ms: u128,
    },
    TimedOut {
        at: DateTime<Utc>,
        message: String,
    },
    Failed {
        at: DateTime<Utc>,
        message: String,
    },
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Pending => "pending",
            CycleStatus::Completed { .. } => "completed",
            CycleStatus::TimedOut { .. } => "timed_out",
            CycleStatus::Failed { .. } => "failed",
        }
    }
}

/// State shared between the cycle loop and the API handlers.
pub struct SharedState {
    pub status: RwLock<CycleStatus>,
    pub history: Mutex<FlagHistory>,
}

impl SharedState {
    pub fn new(history: FlagHistory) -> Self {
        SharedState {
            status: RwLock::new(CycleStatus::Pending),
            history: Mutex::new(history),
        }
    }
}

pub struct CycleRunner {
    source: Arc<dyn SnapshotSource>,
    engine: Arc<EngineConfig>,
    store: FlagStore,
    state: Arc<SharedState>,
    budget: Duration,
    history_cap: usize,
    retention: chrono::Duration,
}

impl CycleRunner {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        engine: EngineConfig,
        store: FlagStore,
        state: Arc<SharedState>,
        budget: Duration,
        history_cap: usize,
        retention: chrono::Duration,
    ) -> Self {
        CycleRunner {
            source,
            engine: Arc::new(engine),
            store,
            state,
            budget,
            history_cap,
            retention,
        }
    }

    /// Run one refresh cycle and publish its status.
    pub async fn run_once(&self) -> CycleStatus {
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = started + self.budget;

        let outcome = self.fetch_and_evaluate(started_at, deadline).await;
        let elapsed_ms = started.elapsed().as_millis();

        let (status, run) = match outcome {
            Ok(report) => {
                self.persist_flags(&report.flagged, started_at).await;
                let run = CycleRun {
                    id: None,
                    started_at,
                    status: "completed".into(),
                    games: report.games_seen as i64,
                    ev_count: report.ev_opportunities.len() as i64,
                    arb_count: report.arbitrage_opportunities.len() as i64,
                    flag_count: report.flagged.len() as i64,
                    elapsed_ms: elapsed_ms as i64,
                    detail: None,
                };
                let status = CycleStatus::Completed {
                    report: Arc::new(report),
                    elapsed_ms,
                };
                (status, run)
            }
            Err(CycleFailure::Timeout(e)) => {
                error!("Cycle aborted: {}", e);
                let message = e.to_string();
                (
                    CycleStatus::TimedOut {
                        at: started_at,
                        message: message.clone(),
                    },
                    failed_run(started_at, "timed_out", elapsed_ms, message),
                )
            }
            Err(CycleFailure::Other(e)) => {
                error!("Cycle failed: {:#}", e);
                let message = format!("{:#}", e);
                (
                    CycleStatus::Failed {
                        at: started_at,
                        message: message.clone(),
                    },
                    failed_run(started_at, "failed", elapsed_ms, message),
                )
            }
        };

        if let Err(e) = self.store.record_cycle(&run) {
            error!("Failed to record cycle: {}", e);
        }
        *self.state.status.write().await = status.clone();
        status
    }

    async fn fetch_and_evaluate(
        &self,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> Result<CycleReport, CycleFailure> {
        let batch = match tokio::time::timeout(self.budget, self.source.fetch_batch()).await {
            Ok(result) => result.map_err(CycleFailure::Other)?,
            Err(_) => {
                return Err(CycleFailure::Other(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    self.source.name(),
                    self.budget
                )))
            }
        };
        let games = assemble_snapshots(batch).map_err(CycleFailure::from)?;

        let engine = Arc::clone(&self.engine);
        let report = tokio::task::spawn_blocking(move || evaluate(&games, &engine, now, Some(deadline)))
            .await
            .map_err(|e| CycleFailure::Other(anyhow::anyhow!("evaluation task failed: {}", e)))?
            .map_err(CycleFailure::from)?;

        info!(
            "Cycle complete from {}: {} +EV, {} arbitrage, {} flagged",
            self.source.name(),
            report.ev_opportunities.len(),
            report.arbitrage_opportunities.len(),
            report.flagged.len()
        );
        Ok(report)
    }

    async fn persist_flags(&self, flagged: &[FlaggedRecord], now: DateTime<Utc>) {
        self.state
            .history
            .lock()
            .await
            .extend(flagged.iter().cloned(), now);

        if let Err(e) = self.store.insert_flags(flagged) {
            error!("Failed to store flagged records: {}", e);
        }
        match self.store.prune(self.history_cap, now - self.retention) {
            Ok(0) => {}
            Ok(n) => info!("Pruned {} flagged records", n),
            Err(e) => error!("Failed to prune flagged records: {}", e),
        }
    }
}

enum CycleFailure {
    Timeout(EngineError),
    Other(anyhow::Error),
}

impl From<EngineError> for CycleFailure {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Timeout { .. } => CycleFailure::Timeout(e),
            other => CycleFailure::Other(other.into()),
        }
    }
}

fn failed_run(started_at: DateTime<Utc>, status: &str, elapsed_ms: u128, detail: String) -> CycleRun {
    CycleRun {
        id: None,
        started_at,
        status: status.to_string(),
        games: 0,
        ev_count: 0,
        arb_count: 0,
        flag_count: 0,
        elapsed_ms: elapsed_ms as i64,
        detail: Some(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{AuditSnapshot, OpportunityKind, Severity, SnapshotBatch};
    use crate::engine::testutil::{game, now, quote};
    use async_trait::async_trait;

    struct StaticSource(Option<SnapshotBatch>);

    #[async_trait]
    impl SnapshotSource for StaticSource {
        async fn fetch_batch(&self) -> anyhow::Result<SnapshotBatch> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("provider offline"))
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// A fresh game whose only arbitrage is implausibly large.
    fn flagged_batch() -> SnapshotBatch {
        let fresh = |mut q: crate::engine::Quote| {
            q.captured_at = Utc::now();
            q
        };
        SnapshotBatch {
            games: vec![game(vec![
                fresh(quote("BookA", Some(150.0), None, None)),
                fresh(quote("BookB", None, Some(150.0), None)),
            ])],
            quotes: vec![],
        }
    }

    fn runner(source: Option<SnapshotBatch>, budget: Duration) -> (CycleRunner, Arc<SharedState>, FlagStore) {
        let store = FlagStore::open(":memory:").unwrap();
        let state = Arc::new(SharedState::new(FlagHistory::new(10, chrono::Duration::days(7))));
        let runner = CycleRunner::new(
            Arc::new(StaticSource(source)),
            EngineConfig::default(),
            store.clone(),
            Arc::clone(&state),
            budget,
            10,
            chrono::Duration::days(7),
        );
        (runner, state, store)
    }

    fn history_record(minutes_ago: i64) -> FlaggedRecord {
        FlaggedRecord {
            kind: OpportunityKind::Arb,
            severity: Severity::Extreme,
            game: game(vec![]).reference(),
            value: 12.0,
            threshold: 10.0,
            excluded: false,
            reason: format!("record {}", minutes_ago),
            flagged_at: now() - chrono::Duration::minutes(minutes_ago),
            inputs: AuditSnapshot::default(),
        }
    }

    #[test]
    fn history_is_bounded_by_count_and_age() {
        let mut history = FlagHistory::new(3, chrono::Duration::hours(1));
        history.extend((0..5).rev().map(|i| history_record(i * 10)), now());
        assert_eq!(history.len(), 3);
        let recent = history.recent(10);
        assert_eq!(recent[0].reason, "record 0");
        assert_eq!(recent[2].reason, "record 20");

        history.extend([history_record(90)], now());
        assert_eq!(history.len(), 3);
        assert!(history.recent(10).iter().all(|r| r.reason != "record 90"));
    }

    #[tokio::test]
    async fn completed_cycle_publishes_report_and_flags() {
        let (runner, state, store) = runner(Some(flagged_batch()), Duration::from_secs(5));
        let status = runner.run_once().await;

        match &status {
            CycleStatus::Completed { report, .. } => {
                assert_eq!(report.games_seen, 1);
                assert_eq!(report.flagged.len(), 1);
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(state.status.read().await.as_str(), "completed");
        assert_eq!(state.history.lock().await.len(), 1);
        assert_eq!(store.list_recent_flags(10, None).unwrap().len(), 1);
        assert_eq!(store.list_cycles(10).unwrap()[0].status, "completed");
    }

    #[tokio::test]
    async fn exhausted_budget_reports_timeout() {
        let (runner, state, store) = runner(Some(flagged_batch()), Duration::ZERO);
        let status = runner.run_once().await;
        assert!(matches!(status, CycleStatus::TimedOut { .. }));
        assert_eq!(state.status.read().await.as_str(), "timed_out");
        assert!(state.history.lock().await.is_empty());
        assert_eq!(store.list_cycles(10).unwrap()[0].status, "timed_out");
    }

    #[tokio::test]
    async fn provider_failure_marks_cycle_failed() {
        let (runner, state, store) = runner(None, Duration::from_secs(5));
        let status = runner.run_once().await;
        match status {
            CycleStatus::Failed { message, .. } => assert!(message.contains("provider offline")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(state.status.read().await.as_str(), "failed");
        let runs = store.list_cycles(10).unwrap();
        assert_eq!(runs[0].detail.as_deref(), Some("provider offline"));
    }
}
