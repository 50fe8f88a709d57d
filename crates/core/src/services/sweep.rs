//! Whole-database cleanup sweep.
//!
//! A sweep walks every segment once, in address order, and hands each location
//! to the [`CleanupDriver`]. It is single-threaded and synchronous; every
//! mutation is visible to the steps that follow it.

use std::time::Instant;

use crate::analysis::driver::CleanupDriver;
use crate::db::{AnalysisDb, SweepConfig};
use crate::model::{Address, Segment};
use crate::services::report::{SweepReport, SweepStatus};
use crate::services::wordlist::Wordlist;

/// Question asked when auto-analysis has not finished yet.
pub const UNFINISHED_ANALYSIS_PROMPT: &str =
    "The autoanalysis has not finished yet.\nThe result might be incomplete.\nDo you want to continue?";

/// Answers the yes/no question asked before sweeping an unfinished database.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// How one segment takes part in the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub segment: Segment,
    pub has_code: bool,
    pub has_data: bool,
}

/// Runs the cleanup over a whole database.
pub struct Sweeper<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    config: &'a SweepConfig,
}

impl<'a, D: AnalysisDb + ?Sized> Sweeper<'a, D> {
    pub fn new(db: &'a mut D, config: &'a SweepConfig) -> Self {
        Self { db, config }
    }

    /// Segment classification, taken once before anything is changed.
    pub fn plan(&self) -> Vec<SegmentPlan> {
        let rules = &self.config.segments;
        self.db
            .segments()
            .into_iter()
            .map(|segment| SegmentPlan {
                has_code: rules.has_code(&segment),
                has_data: rules.has_data(&segment),
                segment,
            })
            .collect()
    }

    /// Run the sweep. Never fails; problems end up as defects in the report.
    pub fn run(&mut self, confirm: &mut dyn Confirm) -> SweepReport {
        let mut report = SweepReport::new();
        if !self.db.auto_analysis_idle() && !confirm.confirm(UNFINISHED_ANALYSIS_PROMPT) {
            tracing::info!("Cleanup declined while auto-analysis is running");
            report.status = SweepStatus::Declined;
            return report;
        }

        let started = Instant::now();

        let wordlist = Wordlist::load_or_empty(self.config.wordlist.as_deref());
        report.wordlist_entries = wordlist.len();

        let plans = self.plan();
        report.segments = plans.len();
        for plan in &plans {
            self.sweep_segment(plan, &mut report);
        }

        // Our edits queue more auto-analysis; none of it is wanted.
        self.db.cancel_pending_analysis();

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!("Cleanup finished in {} milliseconds", report.elapsed_ms);
        report
    }

    fn sweep_segment(&mut self, plan: &SegmentPlan, report: &mut SweepReport) {
        let segment = &plan.segment;
        if !plan.has_code && !plan.has_data {
            tracing::debug!(
                "skipping segment {} ({}..{})",
                segment.name,
                segment.start,
                segment.end
            );
            return;
        }
        tracing::debug!(
            "sweeping segment {} ({}..{}) code={} data={}",
            segment.name,
            segment.start,
            segment.end,
            plan.has_code,
            plan.has_data
        );

        let config: &'a SweepConfig = self.config;
        let render = &config.render;
        let mut ea = segment.start;
        while ea < segment.end {
            let mut driver = CleanupDriver::new(&mut *self.db, &mut *report, render);
            if plan.has_code {
                driver.process_code(ea);
            }
            if plan.has_data {
                driver.process_data(ea);
            }
            report.addresses_visited += 1;
            ea = step(&*self.db, ea);
        }
    }
}

/// Next location to visit after `ea`, always moving forward.
fn step<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> Address {
    let next = db.next_head(ea);
    if next > ea {
        next
    } else {
        ea.offset(1)
    }
}

/// Sweep `db` with `config`, declining if auto-analysis is still running.
pub fn run_sweep<D: AnalysisDb + ?Sized>(db: &mut D, config: &SweepConfig) -> SweepReport {
    Sweeper::new(db, config).run(&mut |_: &str| false)
}
