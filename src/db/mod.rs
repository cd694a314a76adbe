use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::engine::FlaggedRecord;

/// Audit trail for flagged records and cycle outcomes (single connection
/// behind a mutex).
#[derive(Clone)]
pub struct FlagStore {
    conn: Arc<Mutex<Connection>>,
}

impl FlagStore {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = FlagStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Flagged records ───────────────────────────────────────────────────────

    /// Append a cycle's flagged records in one transaction
    pub fn insert_flags(&self, records: &[FlaggedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO flagged_records (
                    kind, severity, game_id, game_label, value, threshold,
                    excluded, reason, flagged_at, record_json
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for record in records {
                let json = serde_json::to_string(record)?;
                stmt.execute(params![
                    record.kind.as_str(),
                    record.severity.as_str(),
                    record.game.game_id,
                    record.game.label,
                    record.value,
                    record.threshold,
                    record.excluded,
                    record.reason,
                    record.flagged_at,
                    json,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Drop records older than `cutoff`, then keep only the newest `cap`.
    /// Old cycle rows go with the same cutoff.
    pub fn prune(&self, cap: usize, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let aged = conn.execute(
            "DELETE FROM flagged_records WHERE flagged_at < ?1",
            params![cutoff],
        )?;
        let overflow = conn.execute(
            "DELETE FROM flagged_records WHERE id NOT IN (
                SELECT id FROM flagged_records ORDER BY flagged_at DESC, id DESC LIMIT ?1
             )",
            params![cap as i64],
        )?;
        conn.execute("DELETE FROM cycle_runs WHERE started_at < ?1", params![cutoff])?;
        Ok(aged + overflow)
    }

    /// Most recent flags first, optionally filtered by severity
    pub fn list_recent_flags(&self, limit: i64, severity: Option<&str>) -> Result<Vec<StoredFlag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, severity, game_id, game_label, value, threshold,
                    excluded, reason, flagged_at
             FROM flagged_records
             WHERE ?1 IS NULL OR severity = ?1
             ORDER BY flagged_at DESC, id DESC LIMIT ?2",
        )?;
        let flags = stmt
            .query_map(params![severity, limit], map_flag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flags)
    }

    /// Full record with its audit snapshot
    pub fn get_flag(&self, id: i64) -> Result<Option<FlaggedRecord>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM flagged_records WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).context("Corrupt flagged record JSON"))
            .transpose()
    }

    pub fn severity_counts(&self) -> Result<SeverityCounts> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT severity, COUNT(*) FROM flagged_records GROUP BY severity")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut counts = SeverityCounts::default();
        for (severity, n) in rows {
            match severity.as_str() {
                "suspicious" => counts.suspicious = n,
                "extreme" => counts.extreme = n,
                "rejected" => counts.rejected = n,
                _ => {}
            }
        }
        Ok(counts)
    }

    // ── Cycles ────────────────────────────────────────────────────────────────

    pub fn record_cycle(&self, run: &CycleRun) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cycle_runs (
                started_at, status, games, ev_count, arb_count,
                flag_count, elapsed_ms, detail
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                run.started_at,
                run.status,
                run.games,
                run.ev_count,
                run.arb_count,
                run.flag_count,
                run.elapsed_ms,
                run.detail,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_cycles(&self, limit: i64) -> Result<Vec<CycleRun>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, status, games, ev_count, arb_count,
                    flag_count, elapsed_ms, detail
             FROM cycle_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit], map_cycle)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_flag(row: &rusqlite::Row) -> rusqlite::Result<StoredFlag> {
    Ok(StoredFlag {
        id: row.get(0)?,
        kind: row.get(1)?,
        severity: row.get(2)?,
        game_id: row.get(3)?,
        game_label: row.get(4)?,
        value: row.get(5)?,
        threshold: row.get(6)?,
        excluded: row.get(7)?,
        reason: row.get(8)?,
        flagged_at: row.get(9)?,
    })
}

fn map_cycle(row: &rusqlite::Row) -> rusqlite::Result<CycleRun> {
    Ok(CycleRun {
        id: row.get(0)?,
        started_at: row.get(1)?,
        status: row.get(2)?,
        games: row.get(3)?,
        ev_count: row.get(4)?,
        arb_count: row.get(5)?,
        flag_count: row.get(6)?,
        elapsed_ms: row.get(7)?,
        detail: row.get(8)?,
    })
}
