//! Contract-level codegen: the constructor's deployment-arg decode preamble
//! and the method dispatcher switch (§4.4 "ConstructorDefinition", "Method
//! dispatcher"). Both need the full scope/materialisation machinery, so they
//! live on `Transformer` rather than as free functions like `fold`/`structs`.

use crate::{
    ast::{
        AbiBase, Assignment, Block, Case, ConstructorDef, Expr, FunctionDef, FunctionModifier, If,
        IdentifierList, Literal, MethodDef, Stmt, Switch, TypedIdentifier, TypedIdentifierList, VariableDeclaration,
        Visibility,
    },
    digest,
    error::{Result, SourceSpan},
    mangle,
};

use super::Transformer;

fn let_decl(name: impl Into<String>, init: Expr, at: SourceSpan) -> Stmt {
    Stmt::VariableDeclaration(VariableDeclaration {
        idents: TypedIdentifierList {
            idents: vec![TypedIdentifier { name: name.into(), ty: None }],
        },
        init: Some(init),
        at,
    })
}

fn revert0(filename: std::rc::Rc<str>, line: u32) -> Stmt {
    Stmt::Expr(Expr::call(
        "revert",
        vec![Expr::literal(Literal::number(0u32.into())), Expr::literal(Literal::number(0u32.into()))],
        filename,
        line,
    ))
}

impl Transformer {
    /// Builds the statements a constructor needs before its own body runs:
    /// copy the deployment arg-tail into memory, length-check it, range- or
    /// bounds-check each parameter, and bind the decoded values (§4.4
    /// "ConstructorDefinition"). `unchecked` skips every check and just
    /// decodes.
    pub(super) fn synthesize_constructor_preamble(&mut self, contract_name: &str, def: &ConstructorDef) -> Result<Vec<Stmt>> {
        let filename = self.filename.clone();
        let at = def.at.clone();
        let line = at.line;
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), line);
        let num = |v: u32| Expr::literal(Literal::number(v.into()));
        let strlit = |s: &str| Expr::literal(Literal::string(s.to_owned()));

        let mut stmts = Vec::new();
        stmts.push(let_decl(
            "__ctorArgSize",
            call("sub", vec![call("codesize", vec![]), call("datasize", vec![strlit(contract_name)])]),
            at.clone(),
        ));
        stmts.push(let_decl("__ctorArgPtr", call("mload", vec![num(64)]), at.clone()));
        stmts.push(Stmt::Expr(call(
            "codecopy",
            vec![Expr::ident("__ctorArgPtr"), call("datasize", vec![strlit(contract_name)]), Expr::ident("__ctorArgSize")],
        )));
        stmts.push(Stmt::Expr(call(
            "mstore",
            vec![num(64), call("add", vec![Expr::ident("__ctorArgPtr"), Expr::ident("__ctorArgSize")])],
        )));

        let fixed_len = num(def.params.params.len() as u32 * 32);
        let has_dynamic = def.params.params.iter().any(|p| p.ty.is_array || matches!((p.ty.base, p.ty.width), (AbiBase::Bytes, 0)));

        if !def.unchecked {
            let size_ok = if has_dynamic {
                call("iszero", vec![call("lt", vec![Expr::ident("__ctorArgSize"), fixed_len.clone()])])
            } else {
                call("eq", vec![Expr::ident("__ctorArgSize"), fixed_len.clone()])
            };
            stmts.push(Stmt::If(If {
                cond: call("iszero", vec![size_ok]),
                body: Block::new(vec![revert0(filename.clone(), line)]),
                at: at.clone(),
            }));
        }

        for (i, param) in def.params.params.iter().enumerate() {
            let Some(name) = &param.name else { continue };
            let decoded = call("mload", vec![call("add", vec![Expr::ident("__ctorArgPtr"), num(i as u32 * 32)])]);
            stmts.push(let_decl(name.clone(), decoded, at.clone()));

            if def.unchecked {
                continue;
            }

            let bits = param.ty.bit_width();
            if matches!(param.ty.base, AbiBase::Uint | AbiBase::Int) && bits < 256 {
                if let Some(helper) = self.builtins.lookup_helper("__check_int") {
                    self.materialise_helper(helper);
                }
                self.scopes.record_dependency("__check_int");
                stmts.push(Stmt::If(If {
                    cond: call("iszero", vec![call("__check_int", vec![Expr::ident(name.clone()), num(u32::from(bits))])]),
                    body: Block::new(vec![revert0(filename.clone(), line)]),
                    at: at.clone(),
                }));
            } else if param.ty.is_array {
                if let Some(helper) = self.builtins.lookup_helper("__check_memory_array") {
                    self.materialise_helper(helper);
                }
                self.scopes.record_dependency("__check_memory_array");
                stmts.push(Stmt::If(If {
                    cond: call("iszero", vec![call("__check_memory_array", vec![Expr::ident(name.clone()), fixed_len.clone()])]),
                    body: Block::new(vec![revert0(filename.clone(), line)]),
                    at: at.clone(),
                }));
            }
        }

        Ok(stmts)
    }

    /// Builds `function __lockkey_0() -> key { key := <fixed slot> }`, the
    /// non-inlinable zero-argument mutex-key function `pragma lock` (§4.4)
    /// describes, materialising it at most once.
    fn ensure_lock_key_helper(&mut self) -> String {
        let name = mangle::lock_key_helper(0);
        if !self.materialised.contains_key(&name) {
            let at = SourceSpan::new(self.filename.clone(), 0, 0);
            let slot = num_bigint::BigUint::from_bytes_be(&digest::keccak256(b"yulx.dispatcher.lock"));
            let def = FunctionDef {
                name: name.clone(),
                params: vec![],
                returns: vec!["key".to_owned()],
                modifier: FunctionModifier::Noinline,
                body: Block::new(vec![Stmt::Assignment(Assignment {
                    lhs: IdentifierList { names: vec!["key".to_owned()] },
                    rhs: Expr::literal(Literal::number(slot)),
                    at: at.clone(),
                })]),
                builtin: true,
                at,
            };
            self.materialised.insert(name.clone(), def);
        }
        name
    }

    /// Builds the full selector switch (§4.4 "Method dispatcher"): a
    /// `calldatasize` guard, one `case` per external/public method (locked
    /// methods wrapped in the mutex helper), a reverting default, and a
    /// trailing `stop`.
    pub(super) fn synthesize_dispatcher(&mut self, methods: &[MethodDef]) -> Stmt {
        let filename = self.filename.clone();
        let at = methods.first().map(|m| m.at.clone()).unwrap_or_else(|| SourceSpan::new(filename.clone(), 0, 0));
        let line = at.line;
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), line);
        let num = |v: u64| Expr::literal(Literal::number(v.into()));

        let mut stmts = vec![Stmt::If(If {
            cond: call("lt", vec![call("calldatasize", vec![]), num(4)]),
            body: Block::new(vec![revert0(filename.clone(), line)]),
            at: at.clone(),
        })];

        let selector_expr = call("shr", vec![num(224), call("calldataload", vec![num(0)])]);

        let mut cases = Vec::new();
        for method in methods {
            if method.visibility != Visibility::External && method.visibility != Visibility::Public {
                continue;
            }
            let args = method.params.params.iter().map(|p| p.ty.canonical()).collect::<Vec<_>>().join(",");
            let signature = format!("{}({args})", method.name);
            let selector = digest::selector4(&signature);
            let value = Literal::parse_hex(&digest::to_hex(&selector), &method.at).expect("digest hex is well-formed");
            cases.push(Case {
                value,
                body: Block::new(self.synthesize_method_arm(method)),
            });
        }

        stmts.push(Stmt::Switch(Switch {
            expr: selector_expr,
            cases,
            default: Some(Block::new(vec![revert0(filename.clone(), line)])),
            at: at.clone(),
        }));
        stmts.push(Stmt::Expr(call("stop", vec![])));
        Stmt::Block(Block::new(stmts))
    }

    /// A method's declared body is itself compiled to a void Yul function
    /// (`method_to_function_def`); returning a value is the body's own job,
    /// via the `returns(...)` builtin, which halts with `return` directly.
    /// This arm only needs to decode calldata args, optionally take the
    /// reentrancy-lock mutex, invoke that function, and leave the trailing
    /// `stop()` after the switch to cover a method that produced no output.
    fn synthesize_method_arm(&mut self, method: &MethodDef) -> Vec<Stmt> {
        let filename = self.filename.clone();
        let line = method.at.line;
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), line);
        let num = |v: u64| Expr::literal(Literal::number(v.into()));

        let mut body = Vec::new();
        let mut call_args = Vec::new();
        for (i, _) in method.params.params.iter().enumerate() {
            let var = format!("__arg{i}");
            body.push(let_decl(var.clone(), call("calldataload", vec![num(4 + i as u64 * 32)]), method.at.clone()));
            call_args.push(Expr::ident(var));
        }

        let helper_name = mangle::method_helper(&method.name);
        let invoke = Stmt::Expr(call(&helper_name, call_args));

        if method.locked {
            let key_helper = self.ensure_lock_key_helper();
            let key_call = || call(&key_helper, vec![]);
            body.push(let_decl("__locked", call("sload", vec![key_call()]), method.at.clone()));
            body.push(Stmt::If(If {
                cond: Expr::ident("__locked"),
                body: Block::new(vec![revert0(filename.clone(), line)]),
                at: method.at.clone(),
            }));
            body.push(Stmt::Expr(call("sstore", vec![key_call(), num(1)])));
            body.push(invoke);
            body.push(Stmt::Expr(call("sstore", vec![key_call(), num(0)])));
        } else {
            body.push(invoke);
        }
        body
    }
}

/// Lowers one contract method into a plain, nameless-output Yul function
/// (§4.4 "Method dispatcher"): parameters keep the method's own declared
/// names so the body can refer to them unchanged.
pub(super) fn method_to_function_def(method: MethodDef) -> FunctionDef {
    let params = method
        .params
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| p.name.clone().unwrap_or_else(|| format!("__unused{i}")))
        .collect();
    FunctionDef {
        name: mangle::method_helper(&method.name),
        params,
        returns: vec![],
        modifier: FunctionModifier::None,
        body: method.body,
        builtin: false,
        at: method.at,
    }
}
