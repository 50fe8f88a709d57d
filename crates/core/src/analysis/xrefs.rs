//! Removal of spurious data cross-references.
//!
//! Auto-analysis sometimes records a data reference from a location whose
//! encoding merely happens to contain a value that looks like a code address.
//! Such an edge is deleted and the referencing operand is retyped as a plain
//! number so that no typed reference is left dangling.

use crate::analysis::classify;
use crate::db::AnalysisDb;
use crate::model::{Address, OperandRepr};
use crate::services::report::{Finding, SweepReport};

/// Comment text the host writes on jump tables.
///
/// Known to be fragile: it is the only jump-table signal available.
pub const JUMP_TABLE_MARKER: &str = "table for switch";

/// Whether `ea` is the base of a switch jump table.
pub fn is_jump_table<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> bool {
    let flags = db.flags(ea);
    if !flags.is_data() || !flags.has_comment() || !flags.has_xref() {
        return false;
    }
    db.comment(ea).is_some_and(|cmt| cmt.contains(JUMP_TABLE_MARKER))
}

/// Whether references to a target address are examined at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVerdict {
    Examine,
    /// Target is data; only code targets are handled here.
    SkipData,
    SkipUnreferenced,
    /// Function entries are presumed legitimately referenced.
    SkipFunctionEntry,
    SkipJumpTable,
}

/// Decision for one `source -> target` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceVerdict {
    Remove,
    KeepSameFunction,
    /// Exception scope tables and similar structures.
    KeepStructMember,
    KeepSwitch,
    KeepBranch,
}

pub fn target_verdict<D: AnalysisDb + ?Sized>(db: &D, target: Address) -> TargetVerdict {
    let flags = db.flags(target);
    if flags.is_data() {
        return TargetVerdict::SkipData;
    }
    if !flags.has_xref() {
        return TargetVerdict::SkipUnreferenced;
    }
    // TODO: 4K-aligned references to function entries are often spurious too,
    // except at segment starts; filter those once segment bounds are checked here.
    if db.function_at(target).is_some_and(|f| f.start == target) {
        return TargetVerdict::SkipFunctionEntry;
    }
    if is_jump_table(db, target) {
        return TargetVerdict::SkipJumpTable;
    }
    TargetVerdict::Examine
}

pub fn source_verdict<D: AnalysisDb + ?Sized>(
    db: &D,
    source: Address,
    target: Address,
) -> SourceVerdict {
    if db.same_function(target, source) {
        return SourceVerdict::KeepSameFunction;
    }
    if db.flags(source).is_struct() {
        return SourceVerdict::KeepStructMember;
    }
    if db.switch_parent(target).is_some() {
        return SourceVerdict::KeepSwitch;
    }
    if classify::is_branch_at(db, source) {
        return SourceVerdict::KeepBranch;
    }
    SourceVerdict::Remove
}

/// Deletes spurious references and repairs the referencing operands.
///
/// Deletions are committed one by one; a failure part-way leaves the earlier
/// deletions in place.
pub struct XrefSanitizer<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    report: &'a mut SweepReport,
}

impl<'a, D: AnalysisDb + ?Sized> XrefSanitizer<'a, D> {
    pub fn new(db: &'a mut D, report: &'a mut SweepReport) -> Self {
        Self { db, report }
    }

    /// Examine every incoming data reference to `target`. Returns how many were removed.
    pub fn sanitize(&mut self, target: Address) -> usize {
        let verdict = target_verdict(&*self.db, target);
        if verdict != TargetVerdict::Examine {
            tracing::trace!("xrefs to {target}: {verdict:?}");
            return 0;
        }

        let mut removed = 0;
        for source in self.db.data_refs_to(target) {
            match source_verdict(&*self.db, source, target) {
                SourceVerdict::Remove => {
                    if self.remove_ref(source, target) {
                        removed += 1;
                    }
                }
                keep => tracing::debug!("keeping xref {source} -> {target}: {keep:?}"),
            }
        }
        removed
    }

    /// Delete the edge `from -> to` and retype the operand that encoded it.
    pub fn remove_ref(&mut self, from: Address, to: Address) -> bool {
        if let Err(e) = self.db.delete_data_ref(from, to) {
            self.report.defect(from, format!("Failed to remove xref to {to}: {e}"));
            return false;
        }
        self.report.record(Finding::XrefRemoved { from, to });

        let Some(n) = self.referencing_operand(from, to) else {
            tracing::debug!("no operand at {from} encodes {to}; nothing to retype");
            return true;
        };
        if let Err(e) = self.db.set_operand_repr(from, n, OperandRepr::Number) {
            self.report.defect(from, format!("Failed to retype operand {n} as a number: {e}"));
        }
        true
    }

    /// Delete every incoming data reference to each address in `[start, end)`.
    pub fn remove_all_refs_to(&mut self, start: Address, end: Address) -> usize {
        let mut removed = 0;
        let mut ea = start;
        while ea < end {
            for source in self.db.data_refs_to(ea) {
                if self.remove_ref(source, ea) {
                    removed += 1;
                }
            }
            ea = ea.offset(1);
        }
        removed
    }

    /// Operand index to retype at `from`. Data items always use operand 0;
    /// array elements are not told apart.
    fn referencing_operand(&self, from: Address, to: Address) -> Option<usize> {
        if !self.db.flags(from).is_code() {
            return Some(0);
        }
        let ins = self.db.decode(from)?;
        if ins.operand(0).references(to) {
            Some(0)
        } else if ins.operand(1).references(to) {
            Some(1)
        } else {
            None
        }
    }
}
