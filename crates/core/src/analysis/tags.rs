//! Detection of four-character ASCII tags stored as immediates.
//!
//! Code often compares against or stores multi-character constants such as
//! `'RIFF'`. The database shows these as plain numbers; retyping the operand as
//! a character literal makes them readable. Floats whose bit pattern happens to
//! be printable are left alone.

use crate::db::AnalysisDb;
use crate::model::{Instruction, OperandRepr};
use crate::services::report::{Finding, SweepReport};

/// Comment that marks an immediate as a float constant.
pub const FLOAT_HINT_COMMENT: &str = "float";

/// Open range of magnitudes treated as plausible float constants.
pub const FLOAT_MAGNITUDE_MIN: f64 = 0.0001;
pub const FLOAT_MAGNITUDE_MAX: f64 = 10000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagVerdict {
    NotText,
    FloatComment,
    PlausibleFloat,
    Tag(String),
}

/// The four characters of `value` in source order, if all are printable
/// letters, digits or punctuation.
pub fn candidate_tag(value: u32) -> Option<String> {
    let bytes = value.to_be_bytes();
    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || b.is_ascii_punctuation())
        .then(|| bytes.iter().map(|&b| char::from(b)).collect())
}

/// Whether the bits of `value`, read as an `f32`, fall in the plausible float range.
pub fn is_plausible_float(value: u32) -> bool {
    let magnitude = f64::from(f32::from_bits(value).abs());
    magnitude > FLOAT_MAGNITUDE_MIN && magnitude < FLOAT_MAGNITUDE_MAX
}

/// Decide whether the first operand of `ins` is a tag.
pub fn tag_verdict<D: AnalysisDb + ?Sized>(db: &D, ins: &Instruction) -> TagVerdict {
    let value = ins.operand(0).value as u32;
    let Some(tag) = candidate_tag(value) else { return TagVerdict::NotText };
    if db.comment(ins.address).as_deref() == Some(FLOAT_HINT_COMMENT) {
        return TagVerdict::FloatComment;
    }
    if is_plausible_float(value) {
        return TagVerdict::PlausibleFloat;
    }
    TagVerdict::Tag(tag)
}

/// Retypes tag immediates as character literals.
pub struct TagDetector<'a, D: AnalysisDb + ?Sized> {
    db: &'a mut D,
    report: &'a mut SweepReport,
}

impl<'a, D: AnalysisDb + ?Sized> TagDetector<'a, D> {
    pub fn new(db: &'a mut D, report: &'a mut SweepReport) -> Self {
        Self { db, report }
    }

    /// Returns the tag when the operand was retyped.
    pub fn detect(&mut self, ins: &Instruction) -> Option<String> {
        let TagVerdict::Tag(tag) = tag_verdict(&*self.db, ins) else { return None };
        if let Err(e) = self.db.set_operand_repr(ins.address, 0, OperandRepr::Char) {
            self.report.defect(ins.address, format!("Failed to retype '{tag}' as characters: {e}"));
            return None;
        }
        self.report.record(Finding::TagDetected { address: ins.address, tag: tag.clone() });
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_tag_reads_big_endian_characters() {
        assert_eq!(candidate_tag(0x5249_4646).as_deref(), Some("RIFF"));
        assert_eq!(candidate_tag(0x4142_4344).as_deref(), Some("ABCD"));
        assert_eq!(candidate_tag(0x4142_4300), None);
        // Space is neither alphanumeric nor punctuation.
        assert_eq!(candidate_tag(0x4142_2044), None);
    }

    #[test]
    fn plausible_float_range_is_open() {
        assert!(is_plausible_float(1.5f32.to_bits()));
        assert!(is_plausible_float((-1.5f32).to_bits()));
        assert!(!is_plausible_float(10000.0f32.to_bits()));
        assert!(!is_plausible_float(0.0f32.to_bits()));
        // 'ABCD' reads as ~12.14 and is therefore a plausible float.
        assert!(is_plausible_float(0x4142_4344));
        // 'RIFF' reads as ~2.2e11.
        assert!(!is_plausible_float(0x5249_4646));
    }
}
