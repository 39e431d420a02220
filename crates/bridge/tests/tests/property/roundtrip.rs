// ----------------------------------------------------------------------------
// Round trip, determinism and order invariance
// ----------------------------------------------------------------------------

use bridge_core::{extract_deep, extract_surface, MismatchCategory, TranslationEngine};
use deep_repr::{DrNodeBody, DrNodeId};
use proptest::prelude::*;

use crate::shapes::{arb_program, StmtShape};

fn structure(doc: &deep_repr::DrDocument) -> Vec<(DrNodeId, DrNodeBody)> {
    doc.nodes().map(|n| (n.id.clone(), n.body.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Forward then reverse reproduces the program up to ids and spans.
    #[test]
    fn forward_reverse_roundtrip(shape in arb_program()) {
        let engine = TranslationEngine::with_defaults();
        let program = shape.build();

        let fwd = engine.translate_forward(&program).unwrap();
        prop_assert!(fwd.is_verified(), "forward mismatch: {:?}", fwd.mismatch);
        let rev = engine.translate_reverse(&fwd.document).unwrap();
        prop_assert!(rev.is_verified(), "reverse mismatch: {:?}", rev.mismatch);
        prop_assert!(rev.program.structurally_eq(&program));
        prop_assert_eq!(rev.proof.target_fingerprint, fwd.proof.source_fingerprint);
    }

    /// Two passes over the same program give the same nodes and digests.
    #[test]
    fn forward_is_deterministic(shape in arb_program()) {
        let engine = TranslationEngine::with_defaults();
        let program = shape.build();

        let a = engine.translate_forward(&program).unwrap();
        let b = engine.translate_forward(&program).unwrap();
        prop_assert_eq!(structure(&a.document), structure(&b.document));
        prop_assert_eq!(a.proof.combined_fingerprint, b.proof.combined_fingerprint);
        prop_assert_eq!(
            extract_deep(&a.document).unwrap(),
            extract_deep(&b.document).unwrap()
        );
        prop_assert_ne!(a.document.id, b.document.id);
    }

    /// Reordering top-level items never changes either digest.
    #[test]
    fn digest_ignores_item_order(shape in arb_program(), seed in any::<u64>()) {
        let n = shape.items();
        let mut order: Vec<usize> = (0..n).collect();
        // Deterministic Fisher-Yates driven by the generated seed.
        let mut state = seed | 1;
        for i in (1..n).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            order.swap(i, (state % (i as u64 + 1)) as usize);
        }

        let original = shape.build();
        let shuffled = shape.build_in_order(&order);
        prop_assert_eq!(
            extract_surface(&original).unwrap().fingerprint,
            extract_surface(&shuffled).unwrap().fingerprint
        );

        let engine = TranslationEngine::with_defaults();
        let a = engine.translate_forward(&original).unwrap();
        let b = engine.translate_forward(&shuffled).unwrap();
        prop_assert_eq!(a.proof.target_fingerprint, b.proof.target_fingerprint);
    }

    /// Removing a function is always reported as a missing fact.
    #[test]
    fn dropped_function_is_a_missing_fact(shape in arb_program()) {
        let program = shape.build();
        let mut pruned = program.clone();
        let victim = pruned.items.iter().position(|i| i.function_name().is_some()).unwrap();
        let name = pruned.items.remove(victim).function_name().map(String::from);

        let engine = TranslationEngine::with_defaults();
        let fwd = engine.translate_forward(&program).unwrap();
        let verification = bridge_core::EquivalenceVerifier::new().verify(
            &extract_deep(&fwd.document).unwrap(),
            &extract_surface(&pruned).unwrap(),
        );
        prop_assert!(!verification.token.verdict);
        let report = verification.mismatch.unwrap();
        prop_assert!(report.has(MismatchCategory::MissingFact));
        prop_assert!(report.diffs.iter().any(|d| Some(&d.name) == name.as_ref()));
    }

    /// Nesting depth of every function is what the shape built, on both layers.
    #[test]
    fn control_depth_follows_nesting(shape in arb_program()) {
        let program = shape.build();
        let surface = extract_surface(&program).unwrap();
        let fwd = TranslationEngine::with_defaults().translate_forward(&program).unwrap();
        let deep = extract_deep(&fwd.document).unwrap();

        for (i, f) in shape.functions.iter().enumerate() {
            let name = format!("f{}", i);
            let want = f.body.iter().map(StmtShape::depth).max().unwrap_or(0);
            prop_assert_eq!(surface.function(&name).unwrap().control.max_depth, want);
            prop_assert_eq!(deep.function(&name).unwrap().control.max_depth, want);
        }
    }
}
