#![cfg(feature = "capstone-decoder")]

use std::sync::Arc;

use wax_core::analysis::classify;
use wax_core::backends::{CapstoneDecoder, DecoderMode, InstructionDecoder};
use wax_core::db::snapshot::Item;
use wax_core::db::{AnalysisDb, MemoryDb, Snapshot};
use wax_core::model::{Address, OperandKind, Segment, SegmentKind};

#[test]
fn decodes_returns_padding_and_jumps() {
    let decoder = CapstoneDecoder::new(DecoderMode::X86);

    let ret = decoder.decode(Address(0x1000), &[0xC3]).expect("ret");
    assert_eq!(ret.mnemonic, "ret");
    assert_eq!(ret.len, 1);
    assert!(classify::is_return(&ret));

    let nop = decoder.decode(Address(0x1000), &[0x90]).expect("nop");
    assert_eq!(nop.mnemonic, "nop");

    // jmp rel32 to 0x1010
    let jmp = decoder.decode(Address(0x1000), &[0xE9, 0x0B, 0x00, 0x00, 0x00]).expect("jmp");
    assert_eq!(jmp.mnemonic, "jmp");
    assert_eq!(jmp.len, 5);
    assert_eq!(jmp.operand(0).kind, OperandKind::Near);
    assert_eq!(jmp.operand(0).addr, 0x1010);
}

#[test]
fn push_immediate_keeps_its_bit_pattern() {
    let decoder = CapstoneDecoder::new(DecoderMode::X86);
    let push = decoder.decode(Address(0x1000), &[0x68, 0x46, 0x46, 0x49, 0x52]).expect("push");
    assert_eq!(push.mnemonic, "push");
    assert_eq!(push.operand(0).kind, OperandKind::Imm);
    assert_eq!(push.operand(0).value, 0x5249_4646);
}

#[test]
fn empty_input_does_not_decode() {
    let decoder = CapstoneDecoder::default();
    assert!(decoder.decode(Address(0x1000), &[]).is_none());
    assert_eq!(decoder.name(), "capstone");
}

#[test]
fn memory_db_decodes_raw_bytes_for_known_arch() {
    let snapshot = Snapshot {
        arch: Some("x86".into()),
        segments: vec![Segment::new(".text", SegmentKind::Code, 0x1000u64, 0x1010u64)],
        ..Snapshot::default()
    };
    let mut db = MemoryDb::from_snapshot(snapshot);
    db.load_bytes(0x1000u64, &[0x55, 0x90, 0x90, 0xC3]);

    assert_eq!(db.decode(Address(0x1000)).map(|i| i.mnemonic), Some("push".to_string()));
    assert!(db.is_padding_insn(Address(0x1001)));
    assert!(classify::is_return_at(&db, Address(0x1003)));
}

#[test]
fn function_creation_walks_decoded_bytes() {
    let mut db = MemoryDb::new();
    db.set_decoder(Arc::new(CapstoneDecoder::new(DecoderMode::X86)));
    db.add_segment(Segment::new(".text", SegmentKind::Code, 0x1000u64, 0x1010u64));
    // push ebp; mov ebp, esp; pop ebp; ret; int3
    db.load_bytes(0x1000u64, &[0x55, 0x89, 0xE5, 0x5D, 0xC3, 0xCC]);

    db.create_function(Address(0x1000)).expect("create function");

    assert_eq!(db.function_at(Address(0x1000)).map(|f| f.end), Some(Address(0x1005)));
    assert!(matches!(db.item_at(0x1001u64), Some(Item { size: 2, .. })));
    assert!(db.item_at(0x1005u64).is_none());
}

#[test]
fn decoder_mode_from_arch_hint() {
    assert_eq!(DecoderMode::from_hint("x86"), Some(DecoderMode::X86));
    assert_eq!(DecoderMode::from_hint("I386"), Some(DecoderMode::X86));
    assert_eq!(DecoderMode::from_hint("amd64"), Some(DecoderMode::X86_64));
    assert_eq!(DecoderMode::from_hint("arm"), None);
}

#[test]
fn each_mode_keeps_its_own_handle() {
    let x86 = CapstoneDecoder::new(DecoderMode::X86);
    let x64 = CapstoneDecoder::new(DecoderMode::X86_64);
    let bytes = [0x48, 0x89, 0xE5];

    for _ in 0..3 {
        let narrow = x86.decode(Address(0x1000), &bytes).expect("dec");
        assert_eq!((narrow.mnemonic.as_str(), narrow.len), ("dec", 1));

        let wide = x64.decode(Address(0x1000), &bytes).expect("mov");
        assert_eq!((wide.mnemonic.as_str(), wide.len), ("mov", 3));
    }
}

#[test]
fn decoders_work_from_several_threads() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                CapstoneDecoder::new(DecoderMode::X86)
                    .decode(Address(0x1000), &[0xC3])
                    .map(|insn| insn.mnemonic)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("decoder thread"), Some("ret".to_string()));
    }
}
