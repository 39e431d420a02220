// ----------------------------------------------------------------------------
// The registry only answers yes for pairs registered compatible
// ----------------------------------------------------------------------------

use std::collections::HashMap;

use bridge_core::CompatibilityRegistry;
use proptest::prelude::*;

fn arb_version() -> impl Strategy<Value = String> {
    "[0-3]\\.[0-3]"
}

/// Registrations applied in order; later ones replace earlier ones.
fn arb_registrations() -> impl Strategy<Value = Vec<(String, String, bool)>> {
    prop::collection::vec((arb_version(), arb_version(), any::<bool>()), 0..12)
}

proptest! {
    #[test]
    fn lookup_matches_last_registration(
        registrations in arb_registrations(),
        surface in arb_version(),
        dr in arb_version(),
    ) {
        let registry = CompatibilityRegistry::new();
        let mut expected: HashMap<(String, String), bool> = HashMap::new();
        for (s, d, compatible) in &registrations {
            registry.register(s, d, *compatible, "generated").unwrap();
            expected.insert((s.clone(), d.clone()), *compatible);
        }

        let want = expected.get(&(surface.clone(), dr.clone())).copied().unwrap_or(false);
        prop_assert_eq!(registry.is_compatible(&surface, &dr), want);
        prop_assert_eq!(registry.snapshot().unwrap().is_compatible(&surface, &dr), want);
        prop_assert_eq!(registry.len(), expected.len());
    }

    #[test]
    fn revocation_always_wins(
        registrations in arb_registrations(),
        surface in arb_version(),
        dr in arb_version(),
    ) {
        let registry = CompatibilityRegistry::new();
        for (s, d, compatible) in &registrations {
            registry.register(s, d, *compatible, "generated").unwrap();
        }
        registry.revoke(&surface, &dr, "withdrawn").unwrap();

        prop_assert!(!registry.is_compatible(&surface, &dr));
        let entry = registry.entry(&surface, &dr).unwrap().unwrap();
        prop_assert!(entry.revoked_at.is_some());
        prop_assert!(!registry.compatible_targets(&surface).unwrap().iter().any(|v| v.as_str() == dr));
    }

    #[test]
    fn labels_outside_the_version_alphabet_are_rejected(label in "[ !@#$%]{1,4}") {
        let registry = CompatibilityRegistry::new();
        prop_assert!(registry.register(&label, "0.9", true, "generated").is_err());
        prop_assert!(!registry.is_compatible(&label, "0.9"));
    }
}
