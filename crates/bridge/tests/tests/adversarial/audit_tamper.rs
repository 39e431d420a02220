// ----------------------------------------------------------------------------
// Persisted audit log tampering
// ----------------------------------------------------------------------------

use std::sync::Arc;

use bridge_core::{AuditLog, BridgeConfig, BridgeError, InMemoryAuditLog, LayerBridge};
use bridge_tests::{cooling_program, double_program, init_tracing, registry_with};

fn populated() -> Arc<InMemoryAuditLog> {
    let audit = Arc::new(InMemoryAuditLog::new());
    let shared: Arc<dyn AuditLog> = audit.clone();
    let bridge =
        LayerBridge::with_audit(BridgeConfig::default(), registry_with(&[("1.0", "0.9")]), shared)
            .unwrap();
    bridge.translate_and_admit(&cooling_program()).unwrap();
    bridge.translate_and_admit(&double_program()).unwrap();
    audit
}

#[test]
fn exported_log_reimports_cleanly() {
    init_tracing();
    let audit = populated();
    assert_eq!(audit.len(), 4);

    let jsonl = audit.export_jsonl().unwrap();
    assert_eq!(jsonl.lines().count(), 4);
    let restored = InMemoryAuditLog::import_jsonl(&jsonl).unwrap();
    assert_eq!(restored.entries().unwrap(), audit.entries().unwrap());
    restored.validate_chain().unwrap();
}

#[test]
fn edited_decision_breaks_the_chain() {
    init_tracing();
    let jsonl = populated().export_jsonl().unwrap();
    let mut lines: Vec<String> = jsonl.lines().map(String::from).collect();

    let mut entry: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    entry["event"]["decision"] = serde_json::json!({
        "decision": "rejected",
        "reason": "semantic-mismatch"
    });
    lines[1] = entry.to_string();

    let err = InMemoryAuditLog::import_jsonl(&lines.join("\n")).unwrap_err();
    assert!(matches!(err, BridgeError::AuditIntegrity { seq: 2, .. }));
}

#[test]
fn dropped_entry_breaks_the_chain() {
    let jsonl = populated().export_jsonl().unwrap();
    let kept: Vec<&str> = jsonl
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, l)| l)
        .collect();

    let err = InMemoryAuditLog::import_jsonl(&kept.join("\n")).unwrap_err();
    assert!(matches!(err, BridgeError::AuditIntegrity { .. }));
}

#[test]
fn reordered_entries_break_the_chain() {
    let jsonl = populated().export_jsonl().unwrap();
    let mut lines: Vec<&str> = jsonl.lines().collect();
    lines.swap(0, 2);

    let err = InMemoryAuditLog::import_jsonl(&lines.join("\n")).unwrap_err();
    assert!(matches!(err, BridgeError::AuditIntegrity { .. }));
}

#[test]
fn garbage_line_is_a_persistence_error() {
    let err = InMemoryAuditLog::import_jsonl("{\"seq\": 1}\n").unwrap_err();
    assert!(matches!(err, BridgeError::Persistence(_)));
}
