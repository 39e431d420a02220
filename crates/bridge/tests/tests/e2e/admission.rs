// ----------------------------------------------------------------------------
// Trust boundary through the layer bridge
// ----------------------------------------------------------------------------

use bridge_core::{AdmissionDecision, AdmissionState, AuditEvent, RejectionReason};
use bridge_tests::{bridge, cooling_program, init_tracing, registry_with};

#[test]
fn registered_pair_is_admitted() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let (fwd, decision) = bridge.translate_and_admit(&cooling_program()).unwrap();

    assert_eq!(decision, AdmissionDecision::Accepted);
    assert_eq!(
        bridge.trust().state(&fwd.document.id),
        AdmissionState::Decided(AdmissionDecision::Accepted)
    );

    let audit = bridge.engine().audit();
    assert_eq!(audit.len(), 2);
    audit.validate_chain().unwrap();
    let entries = audit.entries().unwrap();
    assert!(matches!(entries[0].event, AuditEvent::Verification { .. }));
    match &entries[1].event {
        AuditEvent::Admission {
            decision,
            surface_version,
            dr_version,
            combined_fingerprint,
            ..
        } => {
            assert!(decision.is_accepted());
            assert_eq!(surface_version, "1.0");
            assert_eq!(dr_version, "0.9");
            assert_eq!(*combined_fingerprint, fwd.proof.combined_fingerprint);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn unregistered_pair_is_rejected_as_incompatible() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.8")]));
    let (fwd, decision) = bridge.translate_and_admit(&cooling_program()).unwrap();

    assert_eq!(
        decision,
        AdmissionDecision::Rejected(RejectionReason::VersionIncompatible)
    );
    let record = bridge.trust().record(&fwd.document.id).unwrap();
    assert_eq!(record.surface_version, "1.0");
    assert_eq!(record.dr_version, "0.9");
}

#[test]
fn undecided_documents_are_pending() {
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let fwd = bridge.engine().translate_forward(&cooling_program()).unwrap();
    assert_eq!(bridge.trust().state(&fwd.document.id), AdmissionState::Pending);
    assert!(bridge.trust().record(&fwd.document.id).is_none());
}
