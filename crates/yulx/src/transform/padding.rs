//! Inline-suppression padding (§4.4 "noinline"): a function tagged
//! `noinline` gets enough `pop(codesize())` no-ops appended that a
//! downstream inliner's op-count heuristic sees it as too large to fold
//! away. Runs once, over the fully-lowered tree, after every other pass.

use std::collections::HashSet;

use crate::ast::{Block, Case, Expr, FunctionDef, FunctionModifier, If, Root, Stmt, StructInitArg, Switch};

const ZERO_ARG_THRESHOLD: u32 = 8;
const N_ARG_THRESHOLD: u32 = 16;

/// Per-statement op-count weight (§4.4): assignment=0, call=1, if=2,
/// switch=1+2·cases(+2 for a default), for-loop=3, break/continue/leave=2,
/// each distinct non-zero literal=1, everything else=0.
pub fn pad_noninlinable_functions(root: &mut Root) {
    for item in &mut root.items {
        pad_stmt(item);
    }
}

fn pad_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::FunctionDef(def) => pad_function(def),
        Stmt::ObjectBlock(obj) => pad_block(&mut obj.body),
        Stmt::CodeBlock(code) => pad_block(&mut code.body),
        Stmt::Block(b) => pad_block(b),
        _ => {}
    }
}

fn pad_block(block: &mut Block) {
    for stmt in &mut block.stmts {
        pad_stmt(stmt);
    }
}

fn pad_function(def: &mut FunctionDef) {
    if def.modifier != FunctionModifier::Noinline {
        return;
    }
    let mut seen = HashSet::new();
    let current = block_weight(&def.body, &mut seen);
    let threshold = if def.params.is_empty() { ZERO_ARG_THRESHOLD } else { N_ARG_THRESHOLD };
    let filename = def.at.filename.clone();
    let line = def.at.line;
    let mut accumulated = current;
    while accumulated < threshold {
        def.body.stmts.push(Stmt::Expr(Expr::call(
            "pop",
            vec![Expr::call("codesize", vec![], filename.clone(), line)],
            filename.clone(),
            line,
        )));
        accumulated += 2;
    }
}

fn block_weight(block: &Block, seen: &mut HashSet<String>) -> u32 {
    block.stmts.iter().map(|s| stmt_weight(s, seen)).sum()
}

fn stmt_weight(stmt: &Stmt, seen: &mut HashSet<String>) -> u32 {
    match stmt {
        Stmt::Assignment(a) => expr_weight(&a.rhs, seen),
        Stmt::MemberAssignment(ma) => expr_weight(&ma.rhs, seen),
        Stmt::VariableDeclaration(vd) => vd.init.as_ref().map_or(0, |e| expr_weight(e, seen)),
        Stmt::If(If { cond, body, .. }) => 2 + expr_weight(cond, seen) + block_weight(body, seen),
        Stmt::Switch(Switch { expr, cases, default, .. }) => {
            let mut w = 1 + 2 * cases.len() as u32 + expr_weight(expr, seen);
            if default.is_some() {
                w += 2;
            }
            w += cases.iter().map(|Case { body, .. }| block_weight(body, seen)).sum::<u32>();
            w += default.as_ref().map_or(0, |d| block_weight(d, seen));
            w
        }
        Stmt::ForLoop(f) => 3 + block_weight(&f.init, seen) + expr_weight(&f.cond, seen) + block_weight(&f.post, seen) + block_weight(&f.body, seen),
        Stmt::While(w) => 3 + expr_weight(&w.cond, seen) + block_weight(&w.body, seen),
        Stmt::DoWhile(d) => 3 + block_weight(&d.body, seen) + expr_weight(&d.cond, seen),
        Stmt::Break | Stmt::Continue | Stmt::Leave => 2,
        Stmt::Expr(e) => expr_weight(e, seen),
        Stmt::Block(b) => block_weight(b, seen),
        _ => 0,
    }
}

fn expr_weight(expr: &Expr, seen: &mut HashSet<String>) -> u32 {
    match expr {
        Expr::FunctionCall(call) => 1 + call.args.iter().map(|a| expr_weight(a, seen)).sum::<u32>(),
        Expr::InterfaceCall(ic) => 1 + ic.args.iter().map(|a| expr_weight(a, seen)).sum::<u32>(),
        Expr::StructInitializer(init) => init
            .args
            .iter()
            .map(|a| match a {
                StructInitArg::Expr(e) => expr_weight(e, seen),
                StructInitArg::Default => 0,
            })
            .sum(),
        Expr::Literal(lit) => {
            if !lit.is_zero() && seen.insert(lit.text.clone()) {
                1
            } else {
                0
            }
        }
        Expr::Identifier(_) | Expr::MemberIdentifier(_) | Expr::CallDataIdentifier(_) => 0,
    }
}
