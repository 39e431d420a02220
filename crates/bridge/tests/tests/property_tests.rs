//! Property suites over generated programs.

#[path = "property/fail_closed.rs"]
mod fail_closed;
#[path = "property/roundtrip.rs"]
mod roundtrip;
#[path = "property/shapes.rs"]
mod shapes;
#[path = "property/tamper.rs"]
mod tamper;
