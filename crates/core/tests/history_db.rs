use rusqlite::Connection;
use tempfile::tempdir;
use wax_core::db::history::CURRENT_SCHEMA_VERSION;
use wax_core::db::{HistoryDb, HistoryError, SweepRunRecord};
use wax_core::model::Address;
use wax_core::services::{Finding, SweepReport, SweepStatus};

fn sample_report() -> SweepReport {
    let mut report = SweepReport::new();
    report.segments = 2;
    report.addresses_visited = 64;
    report.elapsed_ms = 3;
    report.record(Finding::FunctionRemoved { address: Address(0x1006) });
    report.record(Finding::FunctionExtended {
        start: Address(0x1000),
        from: Address(0x1006),
        to: Address(0x1008),
        listing: vec!["\t00001006    pop".into(), "\t00001007    retn".into()],
    });
    report.record(Finding::FunctionReference { address: Address(0x2000) });
    report
}

#[test]
fn history_db_records_runs_and_findings() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("history.db");
    let report = sample_report();

    let run_id = {
        let db = HistoryDb::open(&db_path).expect("open history");
        assert_eq!(db.schema_version().expect("version"), CURRENT_SCHEMA_VERSION);

        let record = SweepRunRecord::from_report(
            "image.json",
            Some("abc123".into()),
            "2024-01-01T00:00:00+00:00",
            "2024-01-01T00:00:01+00:00",
            &report,
        );
        let run_id = db.insert_sweep_run(&record).expect("insert run");
        assert!(run_id > 0);
        assert_eq!(db.insert_findings(run_id, &report.findings).expect("insert findings"), 3);
        run_id
    };

    // Reopen to check persistence.
    let db = HistoryDb::open(&db_path).expect("re-open history");
    let runs = db.list_sweep_runs().expect("list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, Some(run_id));
    assert_eq!(runs[0].snapshot, "image.json");
    assert_eq!(runs[0].snapshot_hash.as_deref(), Some("abc123"));
    assert_eq!(runs[0].status, SweepStatus::Completed);
    assert_eq!(runs[0].segments, 2);
    assert_eq!(runs[0].addresses_visited, 64);
    assert_eq!(runs[0].findings, 3);

    let findings = db.list_findings(run_id).expect("list findings");
    assert_eq!(findings.len(), 3);
    assert_eq!(findings[0].kind, "function_removed");
    assert_eq!(findings[0].address, 0x1006);
    assert_eq!(findings[0].message, "Removed bad function at 0x1006");
    assert_eq!(findings[1].finding().expect("decode payload"), report.findings[1]);
    assert_eq!(findings[2].message, "Function reference detected at 0x2000");

    assert!(db.list_findings(run_id + 1).expect("list other").is_empty());
}

#[test]
fn declined_runs_keep_their_status() {
    let dir = tempdir().expect("tempdir");
    let db = HistoryDb::open(&dir.path().join("history.db")).expect("open history");
    let report = SweepReport { status: SweepStatus::Declined, ..SweepReport::default() };
    let record = SweepRunRecord::from_report("image.json", None, "t0", "t1", &report);

    db.insert_sweep_run(&record).expect("insert run");

    let runs = db.list_sweep_runs().expect("list runs");
    assert_eq!(runs[0].status, SweepStatus::Declined);
    assert_eq!(runs[0].snapshot_hash, None);
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("history.db");
    {
        let conn = Connection::open(&db_path).expect("open sqlite");
        conn.execute_batch("PRAGMA user_version = 99;").expect("set version");
    }

    match HistoryDb::open(&db_path) {
        Err(HistoryError::UnsupportedSchemaVersion { found, max_supported, .. }) => {
            assert_eq!(found, 99);
            assert_eq!(max_supported, CURRENT_SCHEMA_VERSION);
        }
        other => panic!("expected UnsupportedSchemaVersion, got {other:?}"),
    }
}

#[test]
fn version_one_database_is_migrated() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("history.db");
    {
        let conn = Connection::open(&db_path).expect("open sqlite");
        conn.execute_batch(
            r#"
            CREATE TABLE sweep_runs (
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
            INSERT INTO sweep_runs (snapshot, status, started_at, finished_at, elapsed_ms, segments, addresses_visited, findings)
            VALUES ('old.json', 'completed', 't0', 't1', 1, 1, 1, 0);
            PRAGMA user_version = 1;
            "#,
        )
        .expect("create v1 schema");
    }

    let db = HistoryDb::open(&db_path).expect("open history");
    assert_eq!(db.schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    let runs = db.list_sweep_runs().expect("list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].snapshot, "old.json");
    assert_eq!(runs[0].wordlist_entries, 0);
}
