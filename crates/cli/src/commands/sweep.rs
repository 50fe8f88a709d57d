use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wax_core::db::{
    load_snapshot, save_snapshot, timestamp_now, HistoryDb, MemoryDb, SweepRunRecord,
};
use wax_core::services::{FindingKind, SweepReport, SweepStatus, Sweeper};

use crate::commands::resolve_config;
use crate::sha256_file;

/// Inputs of `wax sweep`.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub snapshot: PathBuf,
    /// Where to write the repaired snapshot; the input is updated in place when absent.
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Overrides the config's word list.
    pub wordlist: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub json: bool,
    /// Sweep even when the snapshot says auto-analysis has not finished.
    pub yes: bool,
}

const SUMMARY_KINDS: [FindingKind; 10] = [
    FindingKind::XrefRemoved,
    FindingKind::AlignmentCreated,
    FindingKind::FunctionCreated,
    FindingKind::FunctionRemoved,
    FindingKind::PartialFunction,
    FindingKind::FunctionExtended,
    FindingKind::TagDetected,
    FindingKind::FunctionReference,
    FindingKind::DataReference,
    FindingKind::Defect,
];

/// Load a snapshot, sweep it, and write back the results.
pub fn sweep_command(opts: &SweepOptions) -> Result<SweepReport> {
    let mut config = resolve_config(opts.config.as_deref())?;
    if let Some(wordlist) = &opts.wordlist {
        config.wordlist = Some(wordlist.clone());
    }

    let snapshot_hash = sha256_file(&opts.snapshot)?;
    let snapshot = load_snapshot(&opts.snapshot)?;
    let mut db = MemoryDb::from_snapshot(snapshot);

    let started_at = timestamp_now();
    let yes = opts.yes;
    let mut confirm = |question: &str| {
        if !yes {
            tracing::warn!("{}", question.replace('\n', " "));
            tracing::warn!("Pass --yes to sweep anyway");
        }
        yes
    };
    let report = Sweeper::new(&mut db, &config).run(&mut confirm);
    let finished_at = timestamp_now();

    if report.status == SweepStatus::Completed {
        let out = opts.out.as_deref().unwrap_or(opts.snapshot.as_path());
        save_snapshot(out, &db.to_snapshot())?;
    }

    if let Some(path) = &opts.report {
        write_report(path, &report)?;
    }

    if let Some(path) = &opts.history {
        let history = HistoryDb::open(path)
            .with_context(|| format!("Failed to open history database at {}", path.display()))?;
        let record = SweepRunRecord::from_report(
            opts.snapshot.display().to_string(),
            Some(snapshot_hash),
            started_at,
            finished_at,
            &report,
        );
        let run_id = history.insert_sweep_run(&record).context("Failed to record sweep run")?;
        history
            .insert_findings(run_id, &report.findings)
            .context("Failed to record sweep findings")?;
        tracing::debug!("recorded sweep run {run_id} in {}", path.display());
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(report)
}

fn write_report(path: &Path, report: &SweepReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write sweep report at {}", path.display()))
}

fn print_summary(report: &SweepReport) {
    if report.status == SweepStatus::Declined {
        println!("Sweep declined: auto-analysis has not finished");
        return;
    }
    println!("Sweep {}:", report.status.as_str());
    println!("  Segments: {}", report.segments);
    println!("  Addresses visited: {}", report.addresses_visited);
    println!("  Elapsed: {} ms", report.elapsed_ms);
    println!("  Findings: {}", report.findings.len());
    for kind in SUMMARY_KINDS {
        let count = report.count(kind);
        if count > 0 {
            println!("    {}: {count}", kind.as_str());
        }
    }
}
