// ----------------------------------------------------------------------------
// Proof and document tampering
// ----------------------------------------------------------------------------

use bridge_core::{AdmissionDecision, Fingerprint, RejectionReason};
use bridge_tests::{bridge, cooling_program, double_program, init_tracing, registry_with};
use deep_repr::{Attribution, DrExpr, DrNode, DrNodeBody, DrNodeId, DrStmt};

fn rejected(reason: RejectionReason) -> AdmissionDecision {
    AdmissionDecision::Rejected(reason)
}

#[test]
fn single_byte_flip_in_combined_fingerprint_is_tampering() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();

    let mut token = fwd.proof.clone();
    let mut bytes = *token.combined_fingerprint.as_bytes();
    bytes[0] ^= 0x01;
    token.combined_fingerprint = Fingerprint::from_bytes(bytes);

    let decision = bridge
        .trust()
        .admit_for_execution(&fwd.document, &token, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));
}

#[test]
fn swapped_source_fingerprint_is_tampering() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();
    let other = bridge.engine().translate_forward(&double_program()).unwrap();

    let mut token = fwd.proof.clone();
    token.source_fingerprint = other.proof.source_fingerprint;

    let decision = bridge
        .trust()
        .admit_for_execution(&fwd.document, &token, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));
}

#[test]
fn token_from_another_document_is_tampering() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let cooling = bridge.engine().translate_forward(&cooling_program()).unwrap();
    let double = bridge.engine().translate_forward(&double_program()).unwrap();

    let decision = bridge
        .trust()
        .admit_for_execution(&cooling.document, &double.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));
}

#[test]
fn edited_intent_action_is_tampering() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();

    let mut doc = fwd.document.clone();
    let intent_id = doc
        .nodes()
        .find(|n| matches!(n.body, DrNodeBody::Intent { .. }))
        .map(|n| n.id.clone())
        .unwrap();
    if let Some(node) = doc.get_mut(&intent_id) {
        if let DrNodeBody::Intent { action, .. } = &mut node.body {
            *action = "open_vents".into();
        }
    }

    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));
}

#[test]
fn dangling_reference_is_malformed() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();

    let mut doc = fwd.document.clone();
    let function_id = doc
        .function("regulate")
        .map(|n| n.id.clone())
        .unwrap();
    if let Some(node) = doc.get_mut(&function_id) {
        if let DrNodeBody::FunctionDefinition { body, .. } = &mut node.body {
            body.push(DrStmt::Act {
                intent: DrNodeId::from("intent-99"),
            });
        }
    }

    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::MalformedDocument));
}

#[test]
fn inconsistent_unverified_token_is_not_a_semantic_mismatch() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&double_program()).unwrap();

    // Claim disagreement while the fingerprints still match.
    let mut token = fwd.proof.clone();
    token.verdict = false;
    token.combined_fingerprint = bridge_core::recompute_combined(
        &token.source_fingerprint,
        &token.target_fingerprint,
        false,
    );

    let decision = bridge
        .trust()
        .admit_for_execution(&fwd.document, &token, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));
}

#[test]
fn rewritten_literal_argument_changes_nothing_structural() {
    // Argument values are not part of the invariant digest; the document
    // is still admitted when only a literal changes.
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();

    let mut doc = fwd.document.clone();
    let intent_id = doc
        .nodes()
        .find(|n| matches!(n.body, DrNodeBody::Intent { .. }))
        .map(|n| n.id.clone())
        .unwrap();
    if let Some(node) = doc.get_mut(&intent_id) {
        if let DrNodeBody::Intent { arguments, .. } = &mut node.body {
            arguments[0] = DrExpr::Literal {
                value: surface_ast::Literal::Str("boiler_room".into()),
            };
        }
    }

    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, AdmissionDecision::Accepted);
}

#[test]
fn decided_id_does_not_admit_edited_document() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let (fwd, first) = bridge.translate_and_admit(&double_program()).unwrap();
    assert!(first.is_accepted());
    let audited = bridge.engine().audit().len();

    // Same id, one extra intent, and a token nobody computed.
    let mut doc = fwd.document.clone();
    let launch = DrNodeId::from("intent-99");
    doc.insert(DrNode::new(
        launch.clone(),
        Attribution::HumanContributed,
        DrNodeBody::Intent {
            action: "launch".into(),
            arguments: vec![],
        },
    ))
    .unwrap();
    let function_id = doc.function("double").map(|n| n.id.clone()).unwrap();
    if let Some(node) = doc.get_mut(&function_id) {
        if let DrNodeBody::FunctionDefinition { body, .. } = &mut node.body {
            body.insert(0, DrStmt::Act { intent: launch });
        }
    }
    let mut token = fwd.proof.clone();
    token.combined_fingerprint = Fingerprint::zero();

    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &token, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));

    // Even the untouched token does not carry the edit through.
    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision, rejected(RejectionReason::ProofTampered));

    // Both attempts are audited; the original artifact is still admitted.
    assert_eq!(bridge.engine().audit().len(), audited + 2);
    let again = bridge
        .trust()
        .admit_for_execution(&fwd.document, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(again, AdmissionDecision::Accepted);
    assert_eq!(bridge.engine().audit().len(), audited + 2);
}
