//! Render a surface AST back to source text.

use crate::node::{NodeKind, Program, SurfaceNode};

const INDENT: &str = "    ";

/// Render a whole program, one top-level item per line group.
pub fn render_program(program: &Program) -> String {
    let mut out = String::new();
    for item in &program.items {
        render_statement(item, 0, &mut out);
    }
    out
}

/// Render a single expression without a trailing newline.
pub fn render_expression(node: &SurfaceNode) -> String {
    let mut out = String::new();
    write_expr(node, 0, &mut out);
    out
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn render_statement(node: &SurfaceNode, depth: usize, out: &mut String) {
    indent(depth, out);
    match &node.kind {
        NodeKind::FunctionDecl {
            name,
            params,
            return_type,
            body,
        } => {
            let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
            out.push_str(&format!("fn {}({})", name, params.join(", ")));
            if let Some(rt) = return_type {
                out.push_str(&format!(" -> {}", rt));
            }
            out.push(' ');
            write_block(body, depth, out);
            out.push('\n');
        }
        NodeKind::Binding {
            mutable,
            name,
            declared_type,
            value,
        } => {
            out.push_str(if *mutable { "var " } else { "let " });
            out.push_str(name);
            if let Some(t) = declared_type {
                out.push_str(&format!(": {}", t));
            }
            out.push_str(" = ");
            write_expr(value, 0, out);
            out.push_str(";\n");
        }
        NodeKind::Assign { name, value } => {
            out.push_str(&format!("{} = ", name));
            write_expr(value, 0, out);
            out.push_str(";\n");
        }
        NodeKind::IfExpr {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("if ");
            write_expr(condition, 0, out);
            out.push(' ');
            write_block(then_branch, depth, out);
            if let Some(e) = else_branch {
                out.push_str(" else ");
                write_block(e, depth, out);
            }
            out.push('\n');
        }
        NodeKind::WhileLoop { condition, body } => {
            out.push_str("while ");
            write_expr(condition, 0, out);
            out.push(' ');
            write_block(body, depth, out);
            out.push('\n');
        }
        NodeKind::Return(value) => {
            out.push_str("return");
            if let Some(v) = value {
                out.push(' ');
                write_expr(v, 0, out);
            }
            out.push_str(";\n");
        }
        NodeKind::Block(_) => {
            write_block(node, depth, out);
            out.push('\n');
        }
        _ => {
            write_expr(node, 0, out);
            out.push_str(";\n");
        }
    }
}

fn write_block(node: &SurfaceNode, depth: usize, out: &mut String) {
    match &node.kind {
        NodeKind::Block(stmts) => {
            out.push_str("{\n");
            for stmt in stmts {
                render_statement(stmt, depth + 1, out);
            }
            indent(depth, out);
            out.push('}');
        }
        _ => {
            // Parser guarantees blocks here; degrade to an inline statement.
            out.push_str("{ ");
            write_expr(node, 0, out);
            out.push_str(" }");
        }
    }
}

/// `parent_prec` is the precedence of the enclosing operator (0 at top).
fn write_expr(node: &SurfaceNode, parent_prec: u8, out: &mut String) {
    match &node.kind {
        NodeKind::Literal(lit) => out.push_str(&lit.to_string()),
        NodeKind::Identifier(name) => out.push_str(name),
        NodeKind::Call { callee, args } => {
            out.push_str(callee);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(arg, 0, out);
            }
            out.push(')');
        }
        NodeKind::BinaryOp { op, lhs, rhs } => {
            let prec = op.precedence();
            let wrap = prec <= parent_prec && parent_prec != 0;
            if wrap {
                out.push('(');
            }
            write_expr(lhs, prec.saturating_sub(1), out);
            out.push_str(&format!(" {} ", op));
            write_expr(rhs, prec, out);
            if wrap {
                out.push(')');
            }
        }
        NodeKind::Unary { op, operand } => {
            out.push_str(op.symbol());
            let needs_parens = matches!(operand.kind, NodeKind::BinaryOp { .. });
            if needs_parens {
                out.push('(');
            }
            write_expr(operand, 0, out);
            if needs_parens {
                out.push(')');
            }
        }
        other => out.push_str(&format!("/* {} */", other.label())),
    }
}
