//! Per-address classification driver.
//!
//! The sweep calls [`CleanupDriver::process_code`] and/or
//! [`CleanupDriver::process_data`] for every location of a segment, in
//! address order. Each step re-queries the database, so edits made by one
//! detector are visible to the next: alignment is materialized before
//! functions are created, and references are cleaned up before operands are
//! checked for tags.

use crate::analysis::align::AlignmentMaterializer;
use crate::analysis::classify;
use crate::analysis::functions::FunctionRepairer;
use crate::analysis::listing::render_listing;
use crate::analysis::tags::TagDetector;
use crate::analysis::xrefs::{is_jump_table, XrefSanitizer};
use crate::db::{AnalysisDb, DbError, RenderOptions};
use crate::model::Address;
use crate::services::report::{Finding, SweepReport};

/// Width of the pointers recognized in data segments.
pub const POINTER_SIZE: u64 = 4;

/// What the data path makes of one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataVerdict {
    /// Already classified or referenced; left alone.
    Skip,
    FunctionPointer(Address),
    DataPointer(Address),
    /// Nothing recognizable. Width inference for plain scalars is not done.
    Unresolved,
    /// Part of an array; arrays are never retyped element by element.
    Array,
}

/// Whether an item of `total` bytes holds more than one `element`-sized value.
pub fn is_array(total: u64, element: u64) -> bool {
    total > element.max(1)
}

/// Decide what an unexplored location in a data segment holds.
pub fn classify_data<D: AnalysisDb + ?Sized>(db: &D, ea: Address) -> DataVerdict {
    let flags = db.flags(ea);
    if !flags.is_unknown() || flags.has_xref() {
        return DataVerdict::Skip;
    }
    let array = is_array(db.item_size(ea), db.element_size(ea));
    let leftover = if array { DataVerdict::Array } else { DataVerdict::Unresolved };

    let Some(value) = db.read_u32(ea) else { return leftover };
    if !ea.is_aligned(POINTER_SIZE) {
        return leftover;
    }

    let target = Address::from(value);
    if db.function_at(target).is_some_and(|f| f.start == target) {
        return DataVerdict::FunctionPointer(target);
    }
    let target_flags = db.flags(target);
    if target_flags.is_data()
        && (target_flags.has_xref() || target_flags.is_strlit() || target_flags.is_offset(0))
    {
        return DataVerdict::DataPointer(target);
    }
    leftover
}

/// Applies every detector to one location at a time.
pub struct CleanupDriver<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    report: &'a mut SweepReport,
    render: &'a RenderOptions,
}

impl<'a, D: AnalysisDb + ?Sized> CleanupDriver<'a, D> {
    pub fn new(db: &'a mut D, report: &'a mut SweepReport, render: &'a RenderOptions) -> Self {
        Self { db, report, render }
    }

    /// Code path for `ea`.
    pub fn process_code(&mut self, ea: Address) {
        if is_jump_table(&*self.db, ea) {
            tracing::trace!("skipping jump table at {ea}");
            return;
        }

        if self.db.function_at(ea).is_none() {
            let aligned = AlignmentMaterializer::new(&mut *self.db, &mut *self.report)
                .materialize(ea)
                .created();
            if !aligned {
                self.detect_function(ea);
            }
        }

        let Some(func) = self.db.function_at(ea) else { return };

        // Data inside a function pointing back into it is most likely an
        // undetected jump table entry.
        if self.db.flags(ea).is_data()
            && self
                .db
                .read_u32(ea)
                .is_some_and(|value| self.db.same_function(func.start, Address::from(value)))
        {
            tracing::debug!("skipping probable jump table entry at {ea}");
            return;
        }

        if func.start == ea && classify::is_truncated(&*self.db, &func) {
            self.extend_partial_function(ea, func.end);
        }

        let insn = self.db.decode(ea);

        let flags = self.db.flags(ea);
        if !flags.is_code() && !flags.is_align() {
            self.force_instruction(ea);
        }

        XrefSanitizer::new(&mut *self.db, &mut *self.report).sanitize(ea);
        if let Some(insn) = insn {
            TagDetector::new(&mut *self.db, &mut *self.report).detect(&insn);
        }
    }

    /// Data path for `ea`.
    pub fn process_data(&mut self, ea: Address) {
        let finding = match classify_data(&*self.db, ea) {
            DataVerdict::Skip => return,
            DataVerdict::Unresolved => {
                tracing::trace!("leaving unexplored data at {ea}");
                return;
            }
            DataVerdict::Array => {
                tracing::trace!("leaving array at {ea}");
                return;
            }
            DataVerdict::FunctionPointer(_) => Finding::FunctionReference { address: ea },
            DataVerdict::DataPointer(_) => Finding::DataReference { address: ea },
        };
        self.report.record(finding);
        if let Err(e) = self.db.create_scalar(ea, POINTER_SIZE) {
            self.report.defect(ea, format!("Failed to create pointer: {e}"));
        }
    }

    /// Create a function at `ea` unless one exists or the location is not code.
    pub fn detect_function(&mut self, ea: Address) -> bool {
        if self.db.function_at(ea).is_some() {
            return false;
        }
        let flags = self.db.flags(ea);
        if flags.is_align() || flags.is_data() {
            return false;
        }
        if self.db.decode(ea).is_none() || classify::is_alignment_padding(&*self.db, ea) {
            return false;
        }

        tracing::debug!("Creating function at {ea}");
        match self.db.create_function(ea) {
            Ok(()) => {
                self.report.record(Finding::FunctionCreated { address: ea });
                true
            }
            Err(e) => {
                self.report.defect(ea, format!("Failed to create function: {e}"));
                false
            }
        }
    }

    fn extend_partial_function(&mut self, start: Address, orig_end: Address) {
        self.report.record(Finding::PartialFunction { address: start });

        let repaired = FunctionRepairer::new(&mut *self.db, &mut *self.report).repair(start);
        let Some(new_end) = repaired.filter(|end| *end > orig_end) else { return };

        let listing = render_listing(&*self.db, orig_end, new_end, self.render);
        self.report.record(Finding::FunctionExtended {
            start,
            from: orig_end,
            to: new_end,
            listing,
        });
    }

    /// Define an instruction at `ea`, clearing whatever item is in the way once.
    fn force_instruction(&mut self, ea: Address) {
        match self.db.create_instruction(ea) {
            Ok(()) => {}
            Err(DbError::Conflict { existing, .. }) => {
                let len = self.db.decode(ea).map_or(1, |insn| insn.len.max(1));
                tracing::debug!("undefining {existing} to make room for code at {ea}");
                if let Err(e) =
                    self.db.delete_items(ea, len).and_then(|()| self.db.create_instruction(ea))
                {
                    self.report.defect(ea, format!("Failed to create instruction: {e}"));
                }
            }
            Err(e) => tracing::debug!("no instruction created at {ea}: {e}"),
        }
    }
}
