//! Interface-call thunk synthesis (§4.4 "Interface"): one helper function
//! per constructor/method entry point, built the first time anything in the
//! compilation unit reaches for it and cached in `Transformer::materialised`
//! exactly like an emit/throw helper.
//!
//! Thunks don't marshal true ABI-encoded constructor arguments for
//! `create`/`create2` — there is no accessible target bytecode/data block in
//! this pass to size an args region against, so the thunk forwards the
//! caller's already-laid-out `(value, argsOffset, argsSize[, salt])`
//! straight to the opcode. Documented as a simplification in DESIGN.md.

use crate::{
    ast::{Assignment, Block, Expr, FunctionDef, FunctionModifier, IdentifierList, If, Interface, Literal, MethodDecl, Mutability, Stmt, TypedIdentifier, TypedIdentifierList, VariableDeclaration},
    digest,
    error::SourceSpan,
    mangle,
};

use super::Transformer;

impl Transformer {
    /// Builds and materialises every thunk an `interface` declaration can
    /// need, ahead of any call site actually reaching for one.
    pub(super) fn synthesize_interface_thunks(&mut self, iface: &Interface) {
        if iface.constructor.is_some() {
            self.ensure_create_helper(&iface.name, false);
            self.ensure_create_helper(&iface.name, true);
        }
        for method in iface.methods.clone() {
            self.ensure_call_helper(&iface.name, &method, false);
            self.ensure_call_helper(&iface.name, &method, true);
        }
    }

    pub(super) fn ensure_create_helper(&mut self, interface: &str, salted: bool) -> String {
        let name = if salted { mangle::interface_create2(interface) } else { mangle::interface_create(interface) };
        if !self.materialised.contains_key(&name) {
            let def = self.build_create_thunk(interface, salted);
            self.materialised.insert(name.clone(), def);
        }
        name
    }

    pub(super) fn ensure_call_helper(&mut self, interface: &str, method: &MethodDecl, is_try: bool) -> String {
        let name = if is_try {
            mangle::interface_trycall(interface, &method.name)
        } else {
            mangle::interface_call(interface, &method.name)
        };
        if !self.materialised.contains_key(&name) {
            let def = self.build_call_thunk(interface, method, is_try);
            self.materialised.insert(name.clone(), def);
        }
        name
    }

    fn build_create_thunk(&self, interface: &str, salted: bool) -> FunctionDef {
        let filename = self.filename.clone();
        let at = SourceSpan::new(filename.clone(), 0, 0);
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), 0);

        let mut params = vec!["value".to_owned(), "argsOffset".to_owned(), "argsSize".to_owned()];
        let mut args = vec![Expr::ident("value"), Expr::ident("argsOffset"), Expr::ident("argsSize")];
        let opcode = if salted {
            params.push("salt".to_owned());
            args.push(Expr::ident("salt"));
            "create2"
        } else {
            "create"
        };
        let name = if salted { mangle::interface_create2(interface) } else { mangle::interface_create(interface) };
        FunctionDef {
            name,
            params,
            returns: vec!["addr".to_owned()],
            modifier: FunctionModifier::None,
            body: Block::new(vec![Stmt::Assignment(Assignment {
                lhs: IdentifierList { names: vec!["addr".to_owned()] },
                rhs: call(opcode, args),
                at: at.clone(),
            })]),
            builtin: true,
            at,
        }
    }

    /// Builds a thunk that ABI-encodes the selector and arguments into
    /// scratch memory, performs the `call`/`staticcall`, and on failure
    /// (`call`/`attempt=false` paths only) bubbles up the callee's revert
    /// reason via `returndatacopy`.
    fn build_call_thunk(&self, interface: &str, method: &MethodDecl, is_try: bool) -> FunctionDef {
        let filename = self.filename.clone();
        let at = SourceSpan::new(filename.clone(), 0, 0);
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), 0);
        let num = |v: u64| Expr::literal(Literal::number(v.into()));

        let signature = format!(
            "{}({})",
            method.name,
            method.params.params.iter().map(|p| p.ty.canonical()).collect::<Vec<_>>().join(",")
        );
        let selector = digest::selector4(&signature);
        let selector_word = num_bigint::BigUint::from_bytes_be(&selector) << 224u32;

        let mut params = vec!["addr".to_owned()];
        let mut body = vec![Stmt::Expr(call("mstore", vec![num(0), Expr::literal(Literal::number(selector_word))]))];
        for i in 0..method.params.params.len() {
            let pname = format!("a{i}");
            params.push(pname.clone());
            body.push(Stmt::Expr(call("mstore", vec![num(4 + i as u64 * 32), Expr::ident(pname)])));
        }
        let args_size = num(4 + method.params.params.len() as u64 * 32);
        let ret_size = num(method.returns.len() as u64 * 32);

        let call_expr = if matches!(method.mutability, Mutability::View | Mutability::Pure) {
            call("staticcall", vec![call("gas", vec![]), Expr::ident("addr"), num(0), args_size, num(0), ret_size.clone()])
        } else {
            call(
                "call",
                vec![call("gas", vec![]), Expr::ident("addr"), num(0), num(0), args_size, num(0), ret_size.clone()],
            )
        };

        let r_names: Vec<String> = (0..method.returns.len()).map(|i| format!("r{i}")).collect();
        let returns = if is_try {
            std::iter::once("ok".to_owned()).chain(r_names.clone()).collect()
        } else {
            r_names.clone()
        };

        if is_try {
            body.push(Stmt::Assignment(Assignment {
                lhs: IdentifierList { names: vec!["ok".to_owned()] },
                rhs: call_expr,
                at: at.clone(),
            }));
        } else {
            body.push(Stmt::VariableDeclaration(VariableDeclaration {
                idents: TypedIdentifierList { idents: vec![TypedIdentifier { name: "__ok".to_owned(), ty: None }] },
                init: Some(call_expr),
                at: at.clone(),
            }));
            body.push(Stmt::If(If {
                cond: call("iszero", vec![Expr::ident("__ok")]),
                body: Block::new(vec![
                    Stmt::Expr(call("returndatacopy", vec![num(0), num(0), call("returndatasize", vec![])])),
                    Stmt::Expr(call("revert", vec![num(0), call("returndatasize", vec![])])),
                ]),
                at: at.clone(),
            }));
        }

        for (i, rn) in r_names.iter().enumerate() {
            body.push(Stmt::Assignment(Assignment {
                lhs: IdentifierList { names: vec![rn.clone()] },
                rhs: call("mload", vec![num(i as u64 * 32)]),
                at: at.clone(),
            }));
        }

        let name = if is_try { mangle::interface_trycall(interface, &method.name) } else { mangle::interface_call(interface, &method.name) };
        FunctionDef {
            name,
            params,
            returns,
            modifier: FunctionModifier::None,
            body: Block::new(body),
            builtin: true,
            at,
        }
    }
}
