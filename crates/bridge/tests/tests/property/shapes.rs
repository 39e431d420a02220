//! Program-shape strategies shared by the property suites.

use proptest::prelude::*;
use surface_ast::{AstBuilder, BinaryOp, Param, Program, SurfaceNode};

const ACTIONS: &[&str] = &["notify", "ignite", "open_valve"];
const SENSORS: &[&str] = &["read_sensor", "sense_humidity"];

/// One generated statement inside a function body.
#[derive(Clone, Debug)]
pub enum StmtShape {
    /// `notify(k);`
    Act { action: usize, arg: i64 },
    /// `let v{slot} = read_sensor(k);`
    Observe { sensor: usize, arg: i64 },
    /// `if read_sensor(k) > t { notify(k); }`
    Guard {
        sensor: usize,
        action: usize,
        threshold: i64,
    },
    /// `if k > t { let y = k; } else { let y = t; }`
    PureIf { k: i64, t: i64 },
    /// `var i = 0; while i < n { i = i + 1; }`
    Loop { bound: i64 },
    /// `f{j}();`
    Internal { callee: usize },
    /// `if read_sensor(k) > t { .. }` or `while k > t { .. }` around inner statements.
    Nested {
        sensor: usize,
        threshold: i64,
        looped: bool,
        inner: Vec<StmtShape>,
    },
}

impl StmtShape {
    /// Deepest if/while nesting this statement builds.
    pub fn depth(&self) -> u32 {
        match self {
            Self::Guard { .. } | Self::PureIf { .. } | Self::Loop { .. } => 1,
            Self::Nested { inner, .. } => 1 + inner.iter().map(Self::depth).max().unwrap_or(0),
            Self::Act { .. } | Self::Observe { .. } | Self::Internal { .. } => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionShape {
    pub typed_params: usize,
    pub untyped_params: usize,
    pub returns: bool,
    pub body: Vec<StmtShape>,
}

/// A whole program: functions `f0..fN` then top-level statements.
#[derive(Clone, Debug)]
pub struct ProgramShape {
    pub functions: Vec<FunctionShape>,
    pub globals: Vec<i64>,
    pub entry: Vec<StmtShape>,
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_leaf() -> impl Strategy<Value = StmtShape> {
    prop_oneof![
        (0..ACTIONS.len(), -100i64..100).prop_map(|(action, arg)| StmtShape::Act { action, arg }),
        (0..SENSORS.len(), -100i64..100).prop_map(|(sensor, arg)| StmtShape::Observe { sensor, arg }),
        (0..SENSORS.len(), 0..ACTIONS.len(), -100i64..100).prop_map(
            |(sensor, action, threshold)| StmtShape::Guard {
                sensor,
                action,
                threshold
            }
        ),
        (-100i64..100, -100i64..100).prop_map(|(k, t)| StmtShape::PureIf { k, t }),
        (1i64..10).prop_map(|bound| StmtShape::Loop { bound }),
        (0usize..8).prop_map(|callee| StmtShape::Internal { callee }),
    ]
}

pub fn arb_stmt() -> impl Strategy<Value = StmtShape> {
    arb_leaf().prop_recursive(2, 12, 3, |inner| {
        (
            0..SENSORS.len(),
            -100i64..100,
            any::<bool>(),
            prop::collection::vec(inner, 1..3),
        )
            .prop_map(|(sensor, threshold, looped, inner)| StmtShape::Nested {
                sensor,
                threshold,
                looped,
                inner,
            })
    })
}

pub fn arb_function() -> impl Strategy<Value = FunctionShape> {
    (
        0usize..3,
        0usize..2,
        any::<bool>(),
        prop::collection::vec(arb_stmt(), 0..5),
    )
        .prop_map(|(typed_params, untyped_params, returns, body)| FunctionShape {
            typed_params,
            untyped_params,
            returns,
            body,
        })
}

pub fn arb_program() -> impl Strategy<Value = ProgramShape> {
    (
        prop::collection::vec(arb_function(), 1..5),
        prop::collection::vec(-100i64..100, 0..3),
        prop::collection::vec(arb_stmt(), 0..4),
    )
        .prop_map(|(functions, globals, entry)| ProgramShape {
            functions,
            globals,
            entry,
        })
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl ProgramShape {
    pub fn build(&self) -> Program {
        let order: Vec<usize> = (0..self.items()).collect();
        self.build_in_order(&order)
    }

    /// Number of top-level items.
    pub fn items(&self) -> usize {
        self.functions.len() + self.globals.len() + self.entry.len()
    }

    /// Build with top-level items emitted in `order`.
    pub fn build_in_order(&self, order: &[usize]) -> Program {
        let mut b = AstBuilder::new();
        let mut items: Vec<Option<SurfaceNode>> = Vec::with_capacity(self.items());
        let defined = self.functions.len();

        for (i, f) in self.functions.iter().enumerate() {
            let mut params = Vec::new();
            for p in 0..f.typed_params {
                params.push(Param::typed(format!("p{}", p), "Int"));
            }
            for p in 0..f.untyped_params {
                params.push(Param::untyped(format!("u{}", p)));
            }
            let mut body: Vec<SurfaceNode> = f
                .body
                .iter()
                .enumerate()
                .map(|(slot, s)| build_stmt(&mut b, s, defined, slot))
                .collect();
            let return_type = if f.returns {
                let zero = b.int(0);
                body.push(b.ret(Some(zero)));
                Some("Int")
            } else {
                None
            };
            items.push(Some(b.function(format!("f{}", i), params, return_type, body)));
        }
        for (i, value) in self.globals.iter().enumerate() {
            let init = b.int(*value);
            items.push(Some(b.binding(i % 2 == 0, format!("g{}", i), Some("Int"), init)));
        }
        for (slot, s) in self.entry.iter().enumerate() {
            items.push(Some(build_stmt(&mut b, s, defined, slot)));
        }

        let ordered = order.iter().filter_map(|&i| items[i].take()).collect();
        b.program("1.0", ordered)
    }
}

/// `slot` keeps binding names distinct among siblings.
fn build_stmt(b: &mut AstBuilder, shape: &StmtShape, defined: usize, slot: usize) -> SurfaceNode {
    match shape {
        StmtShape::Act { action, arg } => {
            let arg = b.int(*arg);
            b.call(ACTIONS[*action], vec![arg])
        }
        StmtShape::Observe { sensor, arg } => {
            let arg = b.int(*arg);
            let read = b.call(SENSORS[*sensor], vec![arg]);
            b.let_(format!("v{}", slot), read)
        }
        StmtShape::Guard {
            sensor,
            action,
            threshold,
        } => {
            let zone = b.str_("zone");
            let read = b.call(SENSORS[*sensor], vec![zone]);
            let limit = b.int(*threshold);
            let cond = b.binary(BinaryOp::Gt, read, limit);
            let zone = b.str_("zone");
            let act = b.call(ACTIONS[*action], vec![zone]);
            b.if_(cond, vec![act], None)
        }
        StmtShape::PureIf { k, t } => {
            let lhs = b.int(*k);
            let rhs = b.int(*t);
            let cond = b.binary(BinaryOp::Gt, lhs, rhs);
            let then_val = b.int(*k);
            let then_bind = b.let_("y", then_val);
            let else_val = b.int(*t);
            let else_bind = b.let_("y", else_val);
            b.if_(cond, vec![then_bind], Some(vec![else_bind]))
        }
        StmtShape::Loop { bound } => {
            // The counter declaration and loop share one block.
            let zero = b.int(0);
            let decl = b.var("i", zero);
            let i = b.ident("i");
            let n = b.int(*bound);
            let cond = b.binary(BinaryOp::Lt, i, n);
            let i = b.ident("i");
            let one = b.int(1);
            let next = b.binary(BinaryOp::Add, i, one);
            let step = b.assign("i", next);
            let lp = b.while_(cond, vec![step]);
            b.block(vec![decl, lp])
        }
        StmtShape::Internal { callee } => b.call(format!("f{}", callee % defined.max(1)), vec![]),
        StmtShape::Nested {
            sensor,
            threshold,
            looped,
            inner,
        } => {
            // Inner slots never collide with the enclosing level's names.
            let body: Vec<SurfaceNode> = inner
                .iter()
                .enumerate()
                .map(|(j, s)| build_stmt(b, s, defined, (slot + 1) * 100 + j))
                .collect();
            let limit = b.int(*threshold);
            if *looped {
                let k = b.int(*threshold / 2);
                let cond = b.binary(BinaryOp::Gt, k, limit);
                b.while_(cond, body)
            } else {
                let zone = b.str_("zone");
                let read = b.call(SENSORS[*sensor], vec![zone]);
                let cond = b.binary(BinaryOp::Gt, read, limit);
                b.if_(cond, body, None)
            }
        }
    }
}
