//! GIVEN a hash-chained batch-error log
//! WHEN a line is edited or removed
//! THEN verification reports the first broken line

use bol_audit::{verify_hash_chain, AuditWriter, VerifyResult};
use serde_json::json;

fn write_five(path: &std::path::Path) {
    let mut w = AuditWriter::open(path, true).unwrap();
    for i in 0..5 {
        w.append("NOTE", json!({"index": i, "data": format!("payload_{i}")}))
            .unwrap();
    }
}

#[test]
fn untampered_chain_verifies_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five(&path);

    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 5 });
}

#[test]
fn tampered_payload_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five(&path);

    let content = std::fs::read_to_string(&path).unwrap();
    let tampered: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, l)| if i == 2 { l.replace("payload_2", "payload_X") } else { l.to_string() })
        .collect();
    std::fs::write(&path, tampered.join("\n")).unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 3);
            assert!(reason.contains("hash_self"), "{reason}");
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
}

#[test]
fn deleted_line_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    write_five(&path);

    let content = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = content
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, l)| l)
        .collect();
    std::fs::write(&path, kept.join("\n")).unwrap();

    match verify_hash_chain(&path).unwrap() {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 2);
            assert!(reason.contains("hash_prev"), "{reason}");
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
}
