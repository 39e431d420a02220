// ----------------------------------------------------------------------------
// Any single-bit change to a proof token is caught at the boundary
// ----------------------------------------------------------------------------

use bridge_core::{AdmissionDecision, Fingerprint, RejectionReason};
use bridge_tests::{bridge, registry_with};
use proptest::prelude::*;

use crate::shapes::arb_program;

/// Which token field to corrupt.
#[derive(Clone, Copy, Debug)]
enum Field {
    Source,
    Target,
    Combined,
}

fn arb_field() -> impl Strategy<Value = Field> {
    prop_oneof![Just(Field::Source), Just(Field::Target), Just(Field::Combined)]
}

fn flip(fp: &Fingerprint, byte: usize, bit: u8) -> Fingerprint {
    let mut bytes = *fp.as_bytes();
    bytes[byte] ^= 1 << bit;
    Fingerprint::from_bytes(bytes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn flipped_bit_is_proof_tampered(
        shape in arb_program(),
        field in arb_field(),
        byte in 0usize..32,
        bit in 0u8..8,
    ) {
        let bridge = bridge(registry_with(&[("1.0", "0.9")]));
        let fwd = bridge.engine().translate_forward(&shape.build()).unwrap();
        prop_assert!(fwd.proof.is_consistent());

        let mut token = fwd.proof.clone();
        match field {
            Field::Source => token.source_fingerprint = flip(&token.source_fingerprint, byte, bit),
            Field::Target => token.target_fingerprint = flip(&token.target_fingerprint, byte, bit),
            Field::Combined => {
                token.combined_fingerprint = flip(&token.combined_fingerprint, byte, bit)
            }
        }
        prop_assert!(!token.is_consistent());

        let decision = bridge
            .trust()
            .admit_for_execution(&fwd.document, &token, "1.0", "0.9")
            .unwrap();
        prop_assert_eq!(decision, AdmissionDecision::Rejected(RejectionReason::ProofTampered));
    }

    #[test]
    fn untouched_token_is_accepted(shape in arb_program()) {
        let bridge = bridge(registry_with(&[("1.0", "0.9")]));
        let (_, decision) = bridge.translate_and_admit(&shape.build()).unwrap();
        prop_assert_eq!(decision, AdmissionDecision::Accepted);
    }
}
