//! Repair of truncated functions.
//!
//! A function is truncated when its last instruction is neither a return nor
//! an unconditional jump. Auto-analysis usually leaves the rest of the body
//! either as a separate function starting right at the cut, or as code that
//! belongs to no function. Repair first absorbs the former, then scans forward
//! for a plausible end.

use crate::analysis::classify;
use crate::db::AnalysisDb;
use crate::model::{Address, Function};
use crate::services::report::{Finding, SweepReport};

/// Upper bound on repair rounds per function.
pub const MAX_REPAIR_ATTEMPTS: usize = 5;

/// Upper bound on instructions decoded by one forward scan.
pub const MAX_SCAN_STEPS: usize = 100;

/// Why a forward scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    /// Just past a return, jump or trap.
    Terminator(Address),
    /// At the first padding instruction.
    Padding(Address),
    /// At a location already owned by another function.
    OwnedByFunction(Address),
}

impl ScanStop {
    pub fn address(self) -> Address {
        match self {
            ScanStop::Terminator(ea) | ScanStop::Padding(ea) | ScanStop::OwnedByFunction(ea) => ea,
        }
    }
}

/// Decode forward from `from` until a terminator, padding or another
/// function is reached. `None` if the budget runs out or decoding fails.
pub fn scan_for_end<D: AnalysisDb + ?Sized>(db: &D, from: Address) -> Option<ScanStop> {
    let mut cursor = from;
    for _ in 0..MAX_SCAN_STEPS {
        let ins = db.decode(cursor)?;
        if ins.len == 0 {
            return None;
        }
        cursor = ins.next();
        if classify::is_function_terminator(&ins) {
            return Some(ScanStop::Terminator(cursor));
        }
        if classify::is_alignment_padding(db, cursor) {
            return Some(ScanStop::Padding(cursor));
        }
        if db.function_at(cursor).is_some() {
            return Some(ScanStop::OwnedByFunction(cursor));
        }
    }
    None
}

/// Grows truncated functions in place.
pub struct FunctionRepairer<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    report: &'a mut SweepReport,
}

impl<'a, D: AnalysisDb + ?Sized> FunctionRepairer<'a, D> {
    pub fn new(db: &'a mut D, report: &'a mut SweepReport) -> Self {
        Self { db, report }
    }

    /// Repair the function starting at `start`.
    ///
    /// Returns the function's end after repair, or `None` when a round made
    /// no progress and the repair was abandoned (the function keeps whatever
    /// end it had at that point).
    pub fn repair(&mut self, start: Address) -> Option<Address> {
        let mut func = self.db.function_at(start)?;
        for attempt in 0..MAX_REPAIR_ATTEMPTS {
            if classify::ends_validly(&*self.db, &func) {
                break;
            }
            tracing::debug!("repairing {} (attempt {})", func.start, attempt + 1);

            if self.absorb_next(&func) || self.extend_by_scan(&func) {
                func = self.db.function_at(start)?;
                continue;
            }

            tracing::debug!("giving up on truncated function at {}", func.start);
            return None;
        }
        Some(self.db.function_at(start)?.end)
    }

    /// Merge the function that starts exactly at `func.end` into `func`.
    pub fn absorb_next(&mut self, func: &Function) -> bool {
        let Some(next) = self.db.next_function(func.start) else { return false };
        if next.start != func.end {
            return false;
        }
        if self.db.delete_function(next.start).is_err() {
            return false;
        }
        self.report.record(Finding::FunctionRemoved { address: next.start });
        if let Err(e) = self.db.delete_name(next.start) {
            tracing::debug!("no name removed at {}: {e}", next.start);
        }

        match self.db.set_function_end(func.start, next.end) {
            Ok(()) => true,
            Err(e) => {
                self.report.defect(func.start, format!("Failed to absorb {}: {e}", next.start));
                false
            }
        }
    }

    /// Move the end of `func` to wherever a forward scan from its end stops.
    pub fn extend_by_scan(&mut self, func: &Function) -> bool {
        let Some(stop) = scan_for_end(&*self.db, func.end) else {
            tracing::debug!("forward scan from {} found no end", func.end);
            return false;
        };
        if stop.address() <= func.end {
            return false;
        }
        match self.db.set_function_end(func.start, stop.address()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("cannot end {} at {}: {e}", func.start, stop.address());
                false
            }
        }
    }
}
