use tempfile::tempdir;
use wax_core::db::snapshot::{Item, Xref};
use wax_core::db::{
    load_config, load_snapshot, save_config, save_snapshot, MemoryDb, SegmentRules, Snapshot,
    SweepConfig,
};
use wax_core::model::{Address, Function, Instruction, Operand, OperandRepr, Segment, SegmentKind};

#[test]
fn config_round_trips_through_json_and_yaml() {
    let dir = tempdir().expect("tempdir");
    let mut config = SweepConfig::default();
    config.wordlist = Some("words.txt".into());
    config.render.indent = false;

    for name in ["wax.json", "wax.yaml"] {
        let path = dir.path().join(name);
        save_config(&path, &config).expect("save config");
        let loaded = load_config(&path).expect("load config");
        assert_eq!(loaded, config, "{name}");
    }
}

#[test]
fn partial_yaml_config_keeps_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("partial.yml");
    std::fs::write(&path, "render:\n  strip_comments: false\n").expect("write");

    let config = load_config(&path).expect("load config");
    assert!(!config.render.strip_comments);
    assert!(config.render.indent);
    assert_eq!(config.segments, SegmentRules::default());
    assert!(config.wordlist.is_none());
}

#[test]
fn malformed_config_reports_the_format() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").expect("write");

    let err = load_config(&path).expect_err("should fail");
    assert!(err.to_string().contains("Failed to parse sweep config JSON"));
}

#[test]
fn segment_rules_match_engine_segments() {
    let rules = SegmentRules::default();
    let seg = |name: &str, kind| Segment::new(name, kind, 0u64, 0x100u64);

    let bink = seg("BINK", SegmentKind::Other);
    assert!(rules.has_code(&bink));
    assert!(!rules.has_data(&bink));

    let bink_data = seg("BINKDATA", SegmentKind::Other);
    assert!(!rules.has_code(&bink_data));
    assert!(rules.has_data(&bink_data));

    let d3d = seg("D3D", SegmentKind::Other);
    assert!(!rules.has_code(&d3d));
    assert!(rules.has_data(&d3d));

    assert!(rules.has_code(&seg(".text", SegmentKind::Code)));
    assert!(rules.has_data(&seg(".rdata", SegmentKind::Data)));
    let other = seg(".reloc", SegmentKind::Other);
    assert!(!rules.has_code(&other) && !rules.has_data(&other));
}

fn sample_db() -> MemoryDb {
    let mut db = MemoryDb::new();
    db.add_segment(Segment::new(".text", SegmentKind::Code, 0x1000u64, 0x1010u64))
        .add_segment(Segment::new(".data", SegmentKind::Data, 0x2000u64, 0x2010u64))
        .load_bytes(0x2000u64, &[0x00, 0x10, 0x00, 0x00])
        .add_code(
            Instruction::new(Address(0x1000), "mov", 5)
                .with_operands(vec![Operand::reg(), Operand::mem(0x2000)])
                .with_text("eax, dword_2000"),
        )
        .add_code(Instruction::new(Address(0x1005), "retn", 1))
        .add_item(Item::data(0x2004u64, 4, 4).with_operand(0, OperandRepr::Offset))
        .add_function(Function::new(0x1000u64, 0x1006u64))
        .add_xref(Xref::data(0x1000u64, 0x2000u64))
        .set_comment(0x1000u64, "load")
        .set_name(0x1000u64, "sub_1000")
        .add_switch_table(0x2008u64, 0x1000u64)
        .set_auto_analysis_complete(false);
    db
}

#[test]
fn memory_db_survives_a_snapshot_file() {
    let dir = tempdir().expect("tempdir");
    let original = sample_db().to_snapshot();

    for name in ["db.json", "db.yaml"] {
        let path = dir.path().join(name);
        save_snapshot(&path, &original).expect("save snapshot");
        let loaded = load_snapshot(&path).expect("load snapshot");
        assert_eq!(loaded, original, "{name}");

        let rebuilt = MemoryDb::from_snapshot(loaded);
        assert_eq!(rebuilt.to_snapshot(), original, "{name}");
        assert_eq!(rebuilt.name_at(0x1000u64), Some("sub_1000"));
        assert!(rebuilt.has_data_ref(0x1000u64, 0x2000u64));
        assert_eq!(rebuilt.operand_repr(0x2004u64, 0), OperandRepr::Offset);
    }
}

#[test]
fn minimal_snapshot_json_fills_defaults() {
    let json = r#"{
        "segments": [
            { "name": ".text", "kind": "code", "start": 4096, "end": 4112 }
        ],
        "instructions": [
            { "address": 4096, "mnemonic": "retn", "len": 1 }
        ],
        "items": [
            { "address": 4096, "size": 1, "data": { "type": "code" } }
        ],
        "functions": [ { "start": 4096, "end": 4097 } ],
        "xrefs": [ { "from": 4096, "to": 8192 } ]
    }"#;

    let snapshot: Snapshot = serde_json::from_str(json).expect("parse snapshot");
    assert!(snapshot.auto_analysis_complete);
    assert!(snapshot.arch.is_none());
    assert!(snapshot.chunks.is_empty());

    let db = MemoryDb::from_snapshot(snapshot);
    assert_eq!(db.functions(), vec![Function::new(0x1000u64, 0x1001u64)]);
    assert!(db.has_data_ref(0x1000u64, 0x2000u64));
    assert_eq!(db.item_at(0x1000u64).map(|i| i.size), Some(1));
}

#[test]
fn missing_snapshot_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_snapshot(&dir.path().join("absent.json")).expect_err("should fail");
    assert!(err.to_string().contains("Failed to read snapshot"));
}
