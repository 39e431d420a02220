//! End-to-end scenarios across translation, verification and admission.

#[path = "e2e/admission.rs"]
mod admission;
#[path = "e2e/cooling.rs"]
mod cooling;
#[path = "e2e/double.rs"]
mod double;
#[path = "e2e/roundtrip.rs"]
mod roundtrip;
