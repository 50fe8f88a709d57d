//! Detection and creation of inter-function alignment padding.

use crate::analysis::classify;
use crate::analysis::xrefs::{is_jump_table, XrefSanitizer};
use crate::db::AnalysisDb;
use crate::model::Address;
use crate::services::report::{Finding, SweepReport};

/// Alignment boundary, in bytes, that padding runs fill up to.
pub const ALIGNMENT: u64 = 16;

/// Whether `ea` starts a run of padding instructions that ends exactly on the
/// next 16-byte boundary, with a non-padding instruction at that boundary.
///
/// Only locations outside functions qualify.
pub fn is_padding_run<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    if db.function_at(ea).is_some() {
        return false;
    }
    if db.flags(ea).is_align() && db.alignment(ea) == Some(ALIGNMENT) {
        return false;
    }
    if ea.is_aligned(ALIGNMENT) {
        return false;
    }

    let boundary = ea.align_up(ALIGNMENT);
    let mut pos = ea;
    while pos < boundary {
        let Some(ins) = db.decode(pos) else { return false };
        if !db.is_padding_insn(pos) || is_jump_table(db, pos) || ins.len == 0 {
            return false;
        }
        pos = ins.next();
    }

    // Padding followed by more padding is handled from the later position.
    pos == boundary && !classify::is_alignment_padding(db, pos)
}

/// Result of an alignment attempt at one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOutcome {
    NotPadding,
    Created,
    /// Created after clearing references and items that occupied the range.
    CreatedAfterClearing,
    Failed,
}

impl AlignOutcome {
    pub fn created(self) -> bool {
        matches!(self, AlignOutcome::Created | AlignOutcome::CreatedAfterClearing)
    }
}

/// Turns detected padding runs into alignment items.
pub struct AlignmentMaterializer<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    report: &'a mut SweepReport,
}

impl<'a, D: AnalysisDb + ?Sized> AlignmentMaterializer<'a, D> {
    pub fn new(db: &'a mut D, report: &'a mut SweepReport) -> Self {
        Self { db, report }
    }

    pub fn materialize(&mut self, ea: Address) -> AlignOutcome {
        if !is_padding_run(&*self.db, ea) {
            return AlignOutcome::NotPadding;
        }
        tracing::debug!("Creating alignment at address {ea}");

        let boundary = ea.align_up(ALIGNMENT);
        let size = boundary - ea;
        if self.db.create_alignment(ea, size, ALIGNMENT).is_ok() {
            self.report.record(Finding::AlignmentCreated { address: ea, size });
            return AlignOutcome::Created;
        }

        // Something already occupies the padding: drop references into it,
        // undefine it, and try once more.
        XrefSanitizer::new(&mut *self.db, &mut *self.report).remove_all_refs_to(ea, boundary);
        if let Err(e) = self.db.delete_items(ea, size) {
            tracing::debug!("undefining padding at {ea} failed: {e}");
        }
        match self.db.create_alignment(ea, size, ALIGNMENT) {
            Ok(()) => {
                self.report.record(Finding::AlignmentCreated { address: ea, size });
                AlignOutcome::CreatedAfterClearing
            }
            Err(e) => {
                self.report.defect(ea, format!("Failed to create alignment: {e}"));
                AlignOutcome::Failed
            }
        }
    }
}
