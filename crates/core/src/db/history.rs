use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::report::{Finding, SweepReport, SweepStatus};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for sweep history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A finding could not be encoded as JSON.
    #[error("failed to encode finding: {0}")]
    Encode(#[from] serde_json::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Current UTC time in RFC 3339 form, as stored in `started_at`/`finished_at`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// One sweep as stored in the history database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepRunRecord {
    /// Row id; `None` until stored.
    pub id: Option<i64>,
    pub snapshot: String,
    pub snapshot_hash: Option<String>,
    pub status: SweepStatus,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: u64,
    pub segments: u64,
    pub addresses_visited: u64,
    pub wordlist_entries: u64,
    pub findings: u64,
}

impl SweepRunRecord {
    /// Record for `report`, produced from the snapshot at `snapshot`.
    pub fn from_report(
        snapshot: impl Into<String>,
        snapshot_hash: Option<String>,
        started_at: impl Into<String>,
        finished_at: impl Into<String>,
        report: &SweepReport,
    ) -> Self {
        Self {
            id: None,
            snapshot: snapshot.into(),
            snapshot_hash,
            status: report.status,
            started_at: started_at.into(),
            finished_at: finished_at.into(),
            elapsed_ms: report.elapsed_ms,
            segments: report.segments as u64,
            addresses_visited: report.addresses_visited,
            wordlist_entries: report.wordlist_entries as u64,
            findings: report.findings.len() as u64,
        }
    }
}

/// One stored finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingRecord {
    pub run_id: i64,
    pub seq: i64,
    pub kind: String,
    pub address: u64,
    pub message: String,
    /// The full finding as JSON.
    pub payload: String,
}

impl FindingRecord {
    /// Decode the stored payload back into a [`Finding`].
    pub fn finding(&self) -> HistoryResult<Finding> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// SQLite-backed record of past sweeps.
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open (or create) a history database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> HistoryResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> HistoryResult<i32> {
        current_schema_version(&self.conn)
    }

    /// Insert a sweep run and return its row id.
    pub fn insert_sweep_run(&self, record: &SweepRunRecord) -> HistoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO sweep_runs (snapshot, snapshot_hash, status, started_at, finished_at, elapsed_ms, segments, addresses_visited, findings, wordlist_entries)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.snapshot,
                record.snapshot_hash,
                record.status.as_str(),
                record.started_at,
                record.finished_at,
                record.elapsed_ms as i64,
                record.segments as i64,
                record.addresses_visited as i64,
                record.findings as i64,
                record.wordlist_entries as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Persist the findings of run `run_id`, in order. Returns how many were stored.
    pub fn insert_findings(&self, run_id: i64, findings: &[Finding]) -> HistoryResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO findings (run_id, seq, kind, address, message, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (seq, finding) in findings.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    seq as i64,
                    finding.kind().as_str(),
                    finding.address().value() as i64,
                    finding.message(),
                    serde_json::to_string(finding)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(findings.len())
    }

    /// List all sweep runs (ordered by id).
    pub fn list_sweep_runs(&self) -> HistoryResult<Vec<SweepRunRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, snapshot, snapshot_hash, status, started_at, finished_at, elapsed_ms, segments, addresses_visited, findings, wordlist_entries
            FROM sweep_runs
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(3)?;
            Ok(SweepRunRecord {
                id: Some(row.get(0)?),
                snapshot: row.get(1)?,
                snapshot_hash: row.get(2)?,
                status: SweepStatus::from_name(&status),
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                elapsed_ms: row.get::<_, i64>(6)? as u64,
                segments: row.get::<_, i64>(7)? as u64,
                addresses_visited: row.get::<_, i64>(8)? as u64,
                findings: row.get::<_, i64>(9)? as u64,
                wordlist_entries: row.get::<_, i64>(10)? as u64,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Findings of run `run_id`, in the order they were recorded.
    pub fn list_findings(&self, run_id: i64) -> HistoryResult<Vec<FindingRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT run_id, seq, kind, address, message, payload
            FROM findings
            WHERE run_id = ?1
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(FindingRecord {
                run_id: row.get(0)?,
                seq: row.get(1)?,
                kind: row.get(2)?,
                address: row.get::<_, i64>(3)? as u64,
                message: row.get(4)?,
                payload: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// Version map:
/// - 0: no schema
/// - 1: sweep_runs and findings tables
/// - 2: add wordlist_entries column to sweep_runs
fn apply_migrations(conn: &Connection) -> HistoryResult<()> {
    let mut current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(HistoryError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS sweep_runs (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot          TEXT NOT NULL,
                snapshot_hash     TEXT,
                status            TEXT NOT NULL,
                started_at        TEXT NOT NULL,
                finished_at       TEXT NOT NULL,
                elapsed_ms        INTEGER NOT NULL,
                segments          INTEGER NOT NULL,
                addresses_visited INTEGER NOT NULL,
                findings          INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS findings (
                run_id  INTEGER NOT NULL,
                seq     INTEGER NOT NULL,
                kind    TEXT NOT NULL,
                address INTEGER NOT NULL,
                message TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY(run_id, seq)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        if !column_exists(conn, "sweep_runs", "wordlist_entries")? {
            conn.execute(
                "ALTER TABLE sweep_runs ADD COLUMN wordlist_entries INTEGER NOT NULL DEFAULT 0;",
                [],
            )?;
        }
        conn.execute("PRAGMA user_version = 2;", [])?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> HistoryResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> HistoryResult<bool> {
    let pragma = format!("PRAGMA table_info({table});");
    let mut stmt = conn.prepare(&pragma)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in rows {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
