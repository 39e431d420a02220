// ----------------------------------------------------------------------------
// Cancellation leaves no trace in the audit log
// ----------------------------------------------------------------------------

use bridge_core::{BridgeError, CancellationToken, TranslationEngine};
use bridge_tests::{init_tracing, thermostat_program};

#[test]
fn cancelled_forward_appends_nothing() {
    init_tracing();
    let engine = TranslationEngine::with_defaults();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .translate_forward_cancellable(&thermostat_program(), &cancel)
        .unwrap_err();
    assert_eq!(err, BridgeError::Cancelled);
    assert!(engine.audit().is_empty());

    let summary = engine.summary();
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.verified, 0);
}

#[test]
fn cancelled_reverse_appends_nothing() {
    init_tracing();
    let engine = TranslationEngine::with_defaults();
    let fwd = engine.translate_forward(&thermostat_program()).unwrap();
    assert_eq!(engine.audit().len(), 1);

    let cancel = CancellationToken::new();
    let observer = cancel.clone();
    cancel.cancel();
    assert!(observer.is_cancelled());

    let err = engine
        .translate_reverse_cancellable(&fwd.document, &observer)
        .unwrap_err();
    assert_eq!(err, BridgeError::Cancelled);
    assert_eq!(engine.audit().len(), 1);
}

#[test]
fn uncancelled_token_behaves_like_plain_call() {
    let engine = TranslationEngine::with_defaults();
    let cancel = CancellationToken::new();
    let fwd = engine
        .translate_forward_cancellable(&thermostat_program(), &cancel)
        .unwrap();
    assert!(fwd.is_verified());
    assert_eq!(engine.audit().len(), 1);
}
