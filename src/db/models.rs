use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary row for a persisted flagged record. The full record, audit
/// snapshot included, is fetched separately by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFlag {
    pub id: i64,
    pub kind: String,
    pub severity: String,
    pub game_id: String,
    pub game_label: String,
    pub value: f64,
    pub threshold: f64,
    pub excluded: bool,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

/// One refresh cycle as recorded in `cycle_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRun {
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    /// `completed`, `timed_out` or `failed`
    pub status: String,
    pub games: i64,
    pub ev_count: i64,
    pub arb_count: i64,
    pub flag_count: i64,
    pub elapsed_ms: i64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub suspicious: i64,
    pub extreme: i64,
    pub rejected: i64,
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS flagged_records (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind        TEXT    NOT NULL,
    severity    TEXT    NOT NULL,
    game_id     TEXT    NOT NULL,
    game_label  TEXT    NOT NULL,
    value       REAL    NOT NULL,
    threshold   REAL    NOT NULL,
    excluded    INTEGER NOT NULL,
    reason      TEXT    NOT NULL,
    flagged_at  TEXT    NOT NULL,
    record_json TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS cycle_runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at  TEXT    NOT NULL,
    status      TEXT    NOT NULL,
    games       INTEGER NOT NULL DEFAULT 0,
    ev_count    INTEGER NOT NULL DEFAULT 0,
    arb_count   INTEGER NOT NULL DEFAULT 0,
    flag_count  INTEGER NOT NULL DEFAULT 0,
    elapsed_ms  INTEGER NOT NULL DEFAULT 0,
    detail      TEXT
);

CREATE INDEX IF NOT EXISTS idx_flagged_at ON flagged_records(flagged_at);
CREATE INDEX IF NOT EXISTS idx_flagged_game ON flagged_records(game_id);
CREATE INDEX IF NOT EXISTS idx_cycle_runs_started ON cycle_runs(started_at);
"#;
