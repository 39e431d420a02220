// ----------------------------------------------------------------------------
// Mixed program round trip
// ----------------------------------------------------------------------------

use bridge_core::{extract_surface, AuditEvent, Direction, TranslationEngine};
use bridge_tests::{init_tracing, thermostat_program};
use deep_repr::DrNodeKind;

#[test]
fn mixed_program_roundtrips_structurally() {
    init_tracing();
    let engine = TranslationEngine::with_defaults();
    let program = thermostat_program();

    let fwd = engine.translate_forward(&program).unwrap();
    assert!(fwd.is_verified(), "forward mismatch: {:?}", fwd.mismatch);
    assert_eq!(fwd.document.count_by_kind(DrNodeKind::FunctionDefinition), 2);
    assert_eq!(fwd.document.count_by_kind(DrNodeKind::SharedState), 2);
    assert_eq!(fwd.document.count_by_kind(DrNodeKind::StructuredKnowledge), 1);

    let rev = engine.translate_reverse(&fwd.document).unwrap();
    assert!(rev.is_verified(), "reverse mismatch: {:?}", rev.mismatch);
    assert!(rev.program.structurally_eq(&program));
    assert_eq!(
        extract_surface(&rev.program).unwrap().fingerprint,
        extract_surface(&program).unwrap().fingerprint
    );
}

#[test]
fn mixed_program_digest_facts() {
    let program = thermostat_program();
    let digest = extract_surface(&program).unwrap();

    let clamp = digest.function("clamp").unwrap();
    assert_eq!(clamp.signature, "fn(v, lo: Int, hi: Int) -> Int");
    assert!(clamp.side_effects.is_pure());
    assert_eq!(clamp.control.ifs, 2);

    let heat = digest.function("heat").unwrap();
    assert_eq!(heat.control.loops, 1);
    assert!(heat.side_effects.targets.contains("ignite"));

    let entry = digest.entry().unwrap();
    assert!(entry.side_effects.targets.contains("sense_temperature"));
    assert!(entry.side_effects.targets.contains("log_idle"));
}

#[test]
fn audit_records_both_directions_in_completion_order() {
    init_tracing();
    let engine = TranslationEngine::with_defaults();
    let fwd = engine.translate_forward(&thermostat_program()).unwrap();
    let rev = engine.translate_reverse(&fwd.document).unwrap();

    let entries = engine.audit().entries().unwrap();
    assert_eq!(entries.len(), 2);
    let directions: Vec<Direction> = entries
        .iter()
        .map(|e| match &e.event {
            AuditEvent::Verification { direction, .. } => *direction,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(directions, vec![Direction::Forward, Direction::Reverse]);

    let tokens = engine.audit().tokens().unwrap();
    assert_eq!(tokens[0], fwd.proof);
    assert_eq!(tokens[1], rev.proof);
    engine.audit().validate_chain().unwrap();

    let summary = engine.summary();
    assert_eq!(summary.total_translations, 2);
    assert_eq!(summary.verified, 2);
}

#[test]
fn documents_survive_json_persistence() {
    let engine = TranslationEngine::with_defaults();
    let fwd = engine.translate_forward(&thermostat_program()).unwrap();

    let json = fwd.document.to_json().unwrap();
    let restored = deep_repr::DrDocument::from_json(&json).unwrap();
    assert_eq!(restored, fwd.document);

    let rev = engine.translate_reverse(&restored).unwrap();
    assert!(rev.is_verified());
}
