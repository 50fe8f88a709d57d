use std::path::Path;

use anyhow::{anyhow, Context, Result};
use wax_core::db::HistoryDb;

/// List past sweeps, or the findings of one of them.
pub fn history_command(db_path: &Path, run: Option<i64>, json: bool) -> Result<()> {
    if !db_path.exists() {
        return Err(anyhow!("History database not found: {}", db_path.display()));
    }
    let db = HistoryDb::open(db_path)
        .with_context(|| format!("Failed to open history database at {}", db_path.display()))?;

    match run {
        Some(run_id) => {
            let findings = db.list_findings(run_id).context("Failed to list findings")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&findings)?);
                return Ok(());
            }
            if findings.is_empty() {
                println!("No findings recorded for run {run_id}.");
                return Ok(());
            }
            println!("Findings for run {run_id}:");
            for f in findings {
                println!("- 0x{:X} [{}] {}", f.address, f.kind, f.message);
            }
        }
        None => {
            let runs = db.list_sweep_runs().context("Failed to list sweep runs")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
                return Ok(());
            }
            if runs.is_empty() {
                println!("No sweeps recorded.");
                return Ok(());
            }
            println!("Sweeps:");
            for r in runs {
                println!(
                    "- #{} {} [{}] {} findings, {} ms ({})",
                    r.id.unwrap_or_default(),
                    r.started_at,
                    r.status.as_str(),
                    r.findings,
                    r.elapsed_ms,
                    r.snapshot
                );
            }
        }
    }
    Ok(())
}
