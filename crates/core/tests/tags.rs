use wax_core::analysis::{tag_verdict, TagDetector, TagVerdict};
use wax_core::db::MemoryDb;
use wax_core::model::{Address, Instruction, Operand, OperandRepr};
use wax_core::services::SweepReport;

fn push_imm(db: &mut MemoryDb, ea: u64, value: u32) -> Instruction {
    let insn = Instruction::new(Address(ea), "push", 5)
        .with_operands(vec![Operand::imm(u64::from(value))]);
    db.add_code(insn.clone());
    insn
}

#[test]
fn printable_immediate_is_retyped_as_characters() {
    let mut db = MemoryDb::new();
    let insn = push_imm(&mut db, 0x1000, 0x5249_4646);
    let mut report = SweepReport::new();

    let tag = TagDetector::new(&mut db, &mut report).detect(&insn);

    assert_eq!(tag.as_deref(), Some("RIFF"));
    assert_eq!(db.operand_repr(0x1000u64, 0), OperandRepr::Char);
    assert_eq!(report.messages(), vec!["Found 'RIFF' tag at 0x1000".to_string()]);
}

#[test]
fn printable_value_that_reads_as_a_small_float_is_left_alone() {
    let mut db = MemoryDb::new();
    // 'ABCD' is also ~12.14 as an f32.
    let insn = push_imm(&mut db, 0x1000, 0x4142_4344);
    let mut report = SweepReport::new();

    assert_eq!(tag_verdict(&db, &insn), TagVerdict::PlausibleFloat);
    assert_eq!(TagDetector::new(&mut db, &mut report).detect(&insn), None);
    assert_eq!(db.operand_repr(0x1000u64, 0), OperandRepr::Default);
    assert!(report.findings.is_empty());
}

#[test]
fn float_comment_blocks_tagging() {
    let mut db = MemoryDb::new();
    let insn = push_imm(&mut db, 0x1000, 0x5249_4646);
    db.set_comment(0x1000u64, "float");

    assert_eq!(tag_verdict(&db, &insn), TagVerdict::FloatComment);
}

#[test]
fn real_float_constant_is_not_text() {
    let mut db = MemoryDb::new();
    let insn = push_imm(&mut db, 0x1000, 1.5f32.to_bits());
    let mut report = SweepReport::new();

    assert_eq!(tag_verdict(&db, &insn), TagVerdict::NotText);
    assert_eq!(TagDetector::new(&mut db, &mut report).detect(&insn), None);
}

#[test]
fn only_the_first_operand_is_inspected() {
    let mut db = MemoryDb::new();
    let insn = Instruction::new(Address(0x1000), "cmp", 6)
        .with_operands(vec![Operand::reg(), Operand::imm(0x5249_4646)]);
    db.add_code(insn.clone());

    assert_eq!(tag_verdict(&db, &insn), TagVerdict::NotText);
}
