use wax_core::analysis::{is_padding_run, AlignOutcome, AlignmentMaterializer, ALIGNMENT};
use wax_core::db::snapshot::{Item, Xref};
use wax_core::db::{AnalysisDb, MemoryDb};
use wax_core::model::{Address, Function, Instruction};
use wax_core::services::{Finding, FindingKind, SweepReport};

fn ins(ea: u64, mnemonic: &str, len: u64) -> Instruction {
    Instruction::new(Address(ea), mnemonic, len)
}

/// A function ending at 0x100D, three `nop`s up to 0x1010, then `next_mnemonic`.
fn padded(next_mnemonic: &str) -> MemoryDb {
    let mut db = MemoryDb::new();
    db.add_code(ins(0x1000, "mov", 12))
        .add_code(ins(0x100C, "retn", 1))
        .add_function(Function::new(0x1000u64, 0x100Du64));
    for ea in 0x100D..0x1010 {
        db.add_instruction(ins(ea, "nop", 1));
    }
    db.add_instruction(ins(0x1010, next_mnemonic, 1));
    db
}

#[test]
fn padding_up_to_a_real_instruction_is_a_padding_run() {
    let db = padded("push");
    assert!(is_padding_run(&db, Address(0x100D)));
    assert!(is_padding_run(&db, Address(0x100E)));
}

#[test]
fn padding_followed_by_more_padding_is_deferred() {
    let db = padded("int3");
    assert!(!is_padding_run(&db, Address(0x100D)));
}

#[test]
fn aligned_addresses_and_function_bodies_are_not_padding_runs() {
    let mut db = padded("push");
    assert!(!is_padding_run(&db, Address(0x1010)));
    assert!(!is_padding_run(&db, Address(0x1004)));

    db.add_instruction(ins(0x100E, "mov", 1));
    assert!(!is_padding_run(&db, Address(0x100D)));
}

#[test]
fn undecodable_gap_is_not_a_padding_run() {
    let mut db = MemoryDb::new();
    db.add_instruction(ins(0x100D, "nop", 1));
    db.add_instruction(ins(0x1010, "push", 1));
    assert!(!is_padding_run(&db, Address(0x100D)));
}

#[test]
fn materialize_creates_one_alignment_item_and_is_idempotent() {
    let mut db = padded("push");
    let mut report = SweepReport::new();

    let first = AlignmentMaterializer::new(&mut db, &mut report).materialize(Address(0x100D));
    assert_eq!(first, AlignOutcome::Created);
    assert!(db.flags(Address(0x100D)).is_align());
    assert_eq!(db.alignment(Address(0x100D)), Some(ALIGNMENT));
    assert_eq!(db.item_at(0x100Du64).map(|item| item.size), Some(3));

    let second = AlignmentMaterializer::new(&mut db, &mut report).materialize(Address(0x100D));
    assert_eq!(second, AlignOutcome::NotPadding);
    assert_eq!(
        report.findings,
        vec![Finding::AlignmentCreated { address: Address(0x100D), size: 3 }]
    );
    assert_eq!(db.items().filter(|item| db.alignment(item.address).is_some()).count(), 1);
}

#[test]
fn occupied_padding_is_cleared_and_retried() {
    let mut db = padded("push");
    for ea in 0x100Du64..0x1010 {
        db.add_item(Item::code(ea, 1));
    }
    db.add_item(Item::data(0x5000u64, 4, 4)).add_xref(Xref::data(0x5000u64, 0x100Eu64));
    let mut report = SweepReport::new();

    let outcome = AlignmentMaterializer::new(&mut db, &mut report).materialize(Address(0x100D));

    assert_eq!(outcome, AlignOutcome::CreatedAfterClearing);
    assert!(!db.has_data_ref(0x5000u64, 0x100Eu64));
    assert!(db.item_at(0x100Eu64).is_none());
    assert_eq!(db.alignment(Address(0x100D)), Some(ALIGNMENT));
    assert_eq!(report.count(FindingKind::XrefRemoved), 1);
    assert_eq!(report.count(FindingKind::AlignmentCreated), 1);
    assert_eq!(report.count(FindingKind::Defect), 0);
}

#[test]
fn padding_that_cannot_be_cleared_is_a_defect() {
    // A stray one-byte function sits inside the padding and survives undefining.
    let mut db = padded("push");
    db.add_code(ins(0x100F, "nop", 1)).add_function(Function::new(0x100Fu64, 0x1010u64));
    let mut report = SweepReport::new();

    let outcome = AlignmentMaterializer::new(&mut db, &mut report).materialize(Address(0x100D));

    assert_eq!(outcome, AlignOutcome::Failed);
    assert!(!outcome.created());
    assert!(db.alignment(Address(0x100D)).is_none());
    assert_eq!(report.count(FindingKind::AlignmentCreated), 0);
    assert_eq!(report.count(FindingKind::Defect), 1);
    assert!(report.messages().iter().any(|m| m.contains("Failed to create alignment")));
}
