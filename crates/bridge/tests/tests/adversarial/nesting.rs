// ----------------------------------------------------------------------------
// Control nesting edits in the DR
// ----------------------------------------------------------------------------

use bridge_core::{extract_deep, extract_surface, EquivalenceVerifier, MismatchCategory, RejectionReason};
use bridge_tests::{bridge, init_tracing, registry_with};
use deep_repr::{DrDocument, DrNodeBody, DrNodeId, DrStmt};
use surface_ast::{AstBuilder, BinaryOp, Param, Program};

/// `if read_sensor(zone) > 30 { if read_sensor(zone) > 40 { activate_cooling_system(zone); } }`
fn staged_cooling_program() -> Program {
    let mut b = AstBuilder::new();
    let zone = b.ident("zone");
    let read = b.call("read_sensor", vec![zone]);
    let warm = b.int(30);
    let outer_cond = b.binary(BinaryOp::Gt, read, warm);
    let zone = b.ident("zone");
    let read = b.call("read_sensor", vec![zone]);
    let hot = b.int(40);
    let inner_cond = b.binary(BinaryOp::Gt, read, hot);
    let zone = b.ident("zone");
    let act = b.call("activate_cooling_system", vec![zone]);
    let inner = b.if_(inner_cond, vec![act], None);
    let outer = b.if_(outer_cond, vec![inner], None);
    let f = b.function("regulate", vec![Param::typed("zone", "Str")], None, vec![outer]);
    b.program("1.0", vec![f])
}

fn outer_guard(doc: &DrDocument) -> DrNodeId {
    let Some(DrNodeBody::FunctionDefinition { body, .. }) = doc.function("regulate").map(|n| &n.body)
    else {
        panic!("regulate is not a function definition");
    };
    body.iter()
        .find_map(|s| match s {
            DrStmt::Guard { context } => Some(context.clone()),
            _ => None,
        })
        .expect("regulate starts with a guard")
}

/// Lift the inner guard out of its parent, next to it in the function body.
fn flatten_inner_guard(doc: &mut DrDocument) {
    let outer = outer_guard(doc);
    let lifted = match doc.get_mut(&outer).map(|n| &mut n.body) {
        Some(DrNodeBody::ReasoningContext { then_branch, .. }) => {
            let pos = then_branch
                .iter()
                .position(|s| matches!(s, DrStmt::Guard { .. }))
                .expect("outer guard holds the inner guard");
            then_branch.remove(pos)
        }
        _ => panic!("outer guard is not a reasoning context"),
    };
    let function_id = doc.function("regulate").map(|n| n.id.clone()).unwrap();
    if let Some(node) = doc.get_mut(&function_id) {
        if let DrNodeBody::FunctionDefinition { body, .. } = &mut node.body {
            body.push(lifted);
        }
    }
}

#[test]
fn nested_guards_keep_depth_two() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let program = staged_cooling_program();
    let (fwd, decision) = bridge.translate_and_admit(&program).unwrap();
    assert!(decision.is_accepted());

    let deep = extract_deep(&fwd.document).unwrap();
    let fact = deep.function("regulate").unwrap();
    assert_eq!(fact.control.ifs, 2);
    assert_eq!(fact.control.max_depth, 2);
    assert_eq!(deep.fingerprint, extract_surface(&program).unwrap().fingerprint);
}

#[test]
fn lifted_guard_is_a_control_shape_mismatch() {
    init_tracing();
    let bridge = bridge(registry_with(&[("1.0", "0.9")]));
    let program = staged_cooling_program();
    let fwd = bridge.engine().translate_forward(&program).unwrap();

    let mut doc = fwd.document.clone();
    flatten_inner_guard(&mut doc);
    doc.validate().unwrap();

    let verification = EquivalenceVerifier::new().verify(
        &extract_surface(&program).unwrap(),
        &extract_deep(&doc).unwrap(),
    );
    assert!(!verification.token.verdict);
    let report = verification.mismatch.unwrap();
    assert!(report.has(MismatchCategory::ControlShapeMismatch));
    assert!(!report.has(MismatchCategory::SideEffectMismatch));
    let diff = report
        .diffs
        .iter()
        .find(|d| d.category == MismatchCategory::ControlShapeMismatch)
        .unwrap();
    assert_eq!(diff.name, "regulate");

    // The original token no longer describes the edited document.
    let decision = bridge
        .trust()
        .admit_for_execution(&doc, &fwd.proof, "1.0", "0.9")
        .unwrap();
    assert_eq!(decision.reason(), Some(RejectionReason::ProofTampered));
}
