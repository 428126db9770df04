//! The lowering transformer: walks a parsed `Root`, resolves every symbol
//! through `scope::ScopeStack`, and rewrites the tree into plain Yul (§4.4).
//! Submodules own one self-contained concern each; this module is the
//! orchestrator that runs them in the fixed pass order the grammar's
//! precedence implies: pragma/version check, preprocessor fold, struct
//! packing, interface thunk synthesis, macro/const expansion, constant
//! folding, then emit/throw/member codegen and dependency materialisation.

pub mod dispatch;
pub mod fold;
pub mod interfaces;
pub mod padding;
pub mod structs;

use std::{collections::BTreeMap, rc::Rc};

use indexmap::IndexMap;

use crate::{
    abi::{AbiCollector, error_signature, event_signature},
    ast::{
        Block, Case, ConstructorDef, Contract, Emit, Expr, FunctionCall, FunctionDef, If, MemberAssignment,
        MemberIdentifier, MethodDef, Pragma, PragmaName, Root, Stmt, StructInitArg, Switch, Throw,
    },
    builtins::BuiltinLibrary,
    error::{Error, Result, SourceSpan},
    evm_version::HardFork,
    mangle,
    scope::{ScopeKind, ScopeStack},
    semver,
};

/// Compile-time configuration threaded through the whole pipeline (SPEC_FULL
/// §2's `CompileOptions`).
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub evm_version: HardFork,
    pub solc_version: Option<String>,
    pub debug: bool,
    /// Pre-read `include` targets, keyed by the literal path named in source.
    /// File I/O is out of scope for this crate; callers resolve includes and
    /// hand the already-read text in.
    pub include_sources: BTreeMap<String, String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            evm_version: HardFork::default(),
            solc_version: None,
            debug: false,
            include_sources: BTreeMap::new(),
        }
    }
}

pub struct Transformer {
    options: CompileOptions,
    scopes: ScopeStack,
    builtins: BuiltinLibrary,
    pub abi: AbiCollector,
    /// Library helper functions cloned into the output so far, keyed by
    /// their mangled name, to make materialisation idempotent.
    materialised: IndexMap<String, crate::ast::FunctionDef>,
    filename: Rc<str>,
}

impl Transformer {
    #[must_use]
    pub fn new(options: CompileOptions, filename: Rc<str>) -> Self {
        Self {
            options,
            scopes: ScopeStack::new(),
            builtins: BuiltinLibrary::preloaded(),
            abi: AbiCollector::default(),
            materialised: IndexMap::new(),
            filename,
        }
    }

    pub fn run(&mut self, root: Root) -> Result<Root> {
        let items = self.transform_stmts(root.items)?;
        let helpers = self.materialised.drain(..).map(|(_, f)| Stmt::FunctionDef(f));
        let mut result = Root {
            items: items.into_iter().chain(helpers).collect(),
        };
        padding::pad_noninlinable_functions(&mut result);
        Ok(result)
    }

    fn transform_block(&mut self, block: Block) -> Result<Block> {
        Ok(Block::new(self.transform_stmts(block.stmts)?))
    }

    fn transform_stmts(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            if let Some(rewritten) = self.transform_stmt(stmt)? {
                out.push(rewritten);
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_lines)]
    fn transform_stmt(&mut self, stmt: Stmt) -> Result<Option<Stmt>> {
        match stmt {
            Stmt::Pragma(p) => {
                self.check_pragma(&p)?;
                Ok(None)
            }
            Stmt::Include(inc) => {
                let src = self.options.include_sources.get(&inc.filename).cloned().ok_or_else(|| {
                    Error::resolution(format!("include target '{}' was not supplied", inc.filename), Some(inc.at.clone()))
                })?;
                let included = crate::parser::Parser::parse_str(&src, &inc.filename)?;
                let expanded = self.transform_stmts(included.items)?;
                // Splice inline: the caller sees one `Stmt` slot, so wrap in
                // a transparent block the serializer can flatten.
                Ok(Some(Stmt::Block(Block::new(expanded))))
            }
            Stmt::Fold(fold) => {
                let taken = self.eval_fold_condition(&fold.expr)?;
                let chosen = if taken {
                    Some(fold.block)
                } else {
                    let mut picked = None;
                    for branch in fold.elifs {
                        if self.eval_fold_condition(&branch.expr)? {
                            picked = Some(branch.block);
                            break;
                        }
                    }
                    picked.or(fold.else_block)
                };
                match chosen {
                    Some(block) => Ok(Some(Stmt::Block(self.transform_block(block)?))),
                    None => Ok(None),
                }
            }
            Stmt::StructDefinition(def) => {
                structs::pack_struct(&def)?;
                self.scopes.add_struct(def, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::Enum(decl) => {
                self.expand_enum(decl)?;
                Ok(None)
            }
            Stmt::Interface(iface) => {
                self.abi.register_interface(&iface)?;
                self.synthesize_interface_thunks(&iface);
                self.scopes.add_interface(iface, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::Contract(contract) => self.transform_contract(contract).map(Some),
            Stmt::ObjectBlock(mut obj) => {
                self.scopes.push(ScopeKind::Object);
                obj.body = self.transform_block(obj.body)?;
                self.scopes.pop();
                Ok(Some(Stmt::ObjectBlock(obj)))
            }
            Stmt::CodeBlock(mut code) => {
                self.scopes.push(ScopeKind::Code);
                code.body = self.transform_block(code.body)?;
                self.scopes.pop();
                Ok(Some(Stmt::CodeBlock(code)))
            }
            Stmt::MacroConstant(mc) => {
                self.scopes.add_const(
                    crate::ast::ConstDeclaration {
                        name: mc.name,
                        params: None,
                        expr: mc.expr,
                        is_function: false,
                        at: mc.at,
                    },
                    SourceSpan::new(self.filename.clone(), 0, 0),
                )?;
                Ok(None)
            }
            Stmt::MacroDefinition(def) => {
                self.scopes.add_macro(def, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::ConstDeclaration(decl) => {
                self.scopes.add_const(decl, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::EventDecl(decl) => {
                self.abi.register_event(&decl)?;
                self.scopes.add_event(decl, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::ErrorDecl(decl) => {
                self.abi.register_error(&decl)?;
                self.scopes.add_error(decl, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            Stmt::FunctionDef(mut def) => {
                self.scopes.push(ScopeKind::Block);
                def.body = self.transform_block(def.body)?;
                self.scopes.pop();
                let at = def.at.clone();
                self.scopes.add_function(def.clone(), at)?;
                Ok(Some(Stmt::FunctionDef(def)))
            }
            Stmt::ConstructorDef(def) => self.transform_constructor(def).map(Some),
            Stmt::MethodDef(def) => self.transform_method(def).map(Some),
            Stmt::VariableDeclaration(mut vd) => {
                for ident in &vd.idents.idents {
                    self.scopes.register_var(ident.name.clone(), ident.ty.clone());
                }
                vd.init = vd.init.map(|e| self.transform_expr(e)).transpose()?;
                Ok(Some(Stmt::VariableDeclaration(vd)))
            }
            Stmt::Assignment(mut a) => {
                a.rhs = self.transform_expr(a.rhs)?;
                Ok(Some(Stmt::Assignment(a)))
            }
            Stmt::MemberAssignment(ma) => self.transform_member_assignment(ma).map(Some),
            Stmt::If(mut i) => {
                i.cond = self.transform_expr(i.cond)?;
                i.body = self.transform_block(i.body)?;
                Ok(Some(Stmt::If(i)))
            }
            Stmt::Switch(sw) => self.transform_switch(sw).map(Some),
            Stmt::ForLoop(mut f) => {
                self.scopes.push(ScopeKind::Block);
                f.init = self.transform_block(f.init)?;
                f.cond = self.transform_expr(f.cond)?;
                f.post = self.transform_block(f.post)?;
                f.body = self.transform_block(f.body)?;
                self.scopes.pop();
                Ok(Some(Stmt::ForLoop(f)))
            }
            Stmt::While(mut w) => {
                w.cond = self.transform_expr(w.cond)?;
                w.body = self.transform_block(w.body)?;
                Ok(Some(Stmt::While(w)))
            }
            Stmt::DoWhile(mut d) => {
                d.body = self.transform_block(d.body)?;
                d.cond = self.transform_expr(d.cond)?;
                Ok(Some(Stmt::DoWhile(d)))
            }
            Stmt::Emit(emit) => self.transform_emit(emit).map(Some),
            Stmt::Throw(throw) => self.transform_throw(throw).map(Some),
            Stmt::Expr(Expr::FunctionCall(call)) if matches!(call.name.as_str(), "returns" | "mstores") => {
                self.build_store_sequence(call).map(Some)
            }
            Stmt::Expr(e) => Ok(Some(Stmt::Expr(self.transform_expr(e)?))),
            other @ (Stmt::Block(_)
            | Stmt::ConstructorDecl(_)
            | Stmt::MethodDecl(_)
            | Stmt::DataValue(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Leave) => self.transform_passthrough(other),
        }
    }

    fn transform_passthrough(&mut self, stmt: Stmt) -> Result<Option<Stmt>> {
        match stmt {
            Stmt::Block(b) => Ok(Some(Stmt::Block(self.transform_block(b)?))),
            Stmt::MethodDecl(decl) => {
                self.abi.register_method(&decl)?;
                self.scopes.add_method(decl, SourceSpan::new(self.filename.clone(), 0, 0))?;
                Ok(None)
            }
            other => Ok(Some(other)),
        }
    }

    fn check_pragma(&mut self, p: &Pragma) -> Result<()> {
        match p.name {
            PragmaName::Evm => {
                let required = HardFork::parse(&p.value)?;
                if required.ordinal() > self.options.evm_version.ordinal() {
                    return Err(Error::version(format!(
                        "source requires EVM version '{}' but target is configured for an earlier fork",
                        p.value
                    )));
                }
            }
            PragmaName::Solc => {
                if let Some(actual) = &self.options.solc_version {
                    let version = semver::Version::parse(actual)?;
                    semver::satisfies(version, &p.value)?;
                }
            }
            PragmaName::License | PragmaName::Yulc | PragmaName::Optimize | PragmaName::Deoptimize | PragmaName::Lock => {}
        }
        Ok(())
    }

    /// `@if`/`@elif` conditions must reduce to a compile-time boolean; any
    /// non-literal leaves the fold unresolved, which is an error (the
    /// preprocessor cannot defer folding to the emitted Yul).
    fn eval_fold_condition(&mut self, expr: &Expr) -> Result<bool> {
        let resolved = self.transform_expr(expr.clone())?;
        let folded = fold::fold_expr(resolved);
        match folded.as_literal().and_then(crate::ast::Literal::as_bool) {
            Some(b) => Ok(b),
            None => Err(Error::static_abort(
                "preprocessor condition did not reduce to a compile-time boolean",
                None,
            )),
        }
    }

    /// Expands an `enum` block into plain `const` bindings, auto-numbering
    /// any member that didn't supply an explicit value (§4.4 "Enum").
    fn expand_enum(&mut self, decl: crate::ast::EnumDecl) -> Result<()> {
        let mut next = num_bigint::BigUint::from(0u32);
        for member in decl.members {
            let name = match &decl.prefix {
                Some(prefix) => format!("{prefix}.{}", member.name),
                None => member.name.clone(),
            };
            let expr = match member.expr {
                Some(e) => e,
                None => Expr::literal(crate::ast::Literal::number(next.clone())),
            };
            let folded = fold::fold_expr(self.transform_expr(expr)?);
            if let Some(lit) = folded.as_literal() {
                if let Some(v) = &lit.value {
                    next = v + num_bigint::BigUint::from(1u32);
                }
            }
            self.scopes.add_const(
                crate::ast::ConstDeclaration {
                    name,
                    params: None,
                    expr: folded,
                    is_function: false,
                    at: decl.at.clone(),
                },
                decl.at.clone(),
            )?;
        }
        Ok(())
    }

    /// Desugars `contract Name { ... }` into an outer `object "Name"`
    /// holding the constructor's deployment sequence and a nested
    /// `object "NameRuntime"` whose code block ends in the synthesised
    /// method dispatcher (§4.4 "Contract"). Methods/events/errors declared
    /// at contract level were already lifted into the ABI during
    /// `transform_method`/registration; this pass just arranges the code.
    fn transform_contract(&mut self, contract: Contract) -> Result<Stmt> {
        self.scopes.push(ScopeKind::Contract);
        let transformed = self.transform_stmts(contract.body.stmts)?;
        self.scopes.pop();

        let mut constructor = None;
        let mut methods = Vec::new();
        let mut shared = Vec::new();
        for stmt in transformed {
            match stmt {
                Stmt::ConstructorDef(def) => constructor = Some(def),
                Stmt::MethodDef(def) => methods.push(def),
                other => shared.push(other),
            }
        }

        let runtime_name = format!("{}Runtime", contract.name);
        let dispatcher = self.synthesize_dispatcher(&methods);

        let mut runtime_body = shared.clone();
        runtime_body.extend(methods.into_iter().map(|m| Stmt::FunctionDef(dispatch::method_to_function_def(m))));
        runtime_body.push(dispatcher);

        let runtime_object = Stmt::ObjectBlock(crate::ast::ObjectBlock {
            name: runtime_name.clone(),
            body: Block::new(vec![Stmt::CodeBlock(crate::ast::CodeBlock {
                body: Block::new(runtime_body),
                at: contract.at.clone(),
            })]),
            at: contract.at.clone(),
        });

        let mut deploy_body = shared;
        if let Some(ctor) = &constructor {
            deploy_body.extend(self.synthesize_constructor_preamble(&contract.name, ctor)?);
        }
        if let Some(ctor) = constructor {
            deploy_body.extend(ctor.body.stmts);
        }

        let filename = self.filename.clone();
        let line = contract.at.line;
        let runtime_lit = || Expr::literal(crate::ast::Literal::string(runtime_name.clone()));
        deploy_body.push(Stmt::Expr(Expr::call(
            "datacopy",
            vec![
                Expr::literal(crate::ast::Literal::number(0u32.into())),
                Expr::call("dataoffset", vec![runtime_lit()], filename.clone(), line),
                Expr::call("datasize", vec![runtime_lit()], filename.clone(), line),
            ],
            filename.clone(),
            line,
        )));
        deploy_body.push(Stmt::Expr(Expr::call(
            "return",
            vec![
                Expr::literal(crate::ast::Literal::number(0u32.into())),
                Expr::call("datasize", vec![runtime_lit()], filename.clone(), line),
            ],
            filename,
            line,
        )));
        deploy_body.push(runtime_object);

        Ok(Stmt::ObjectBlock(crate::ast::ObjectBlock {
            name: contract.name,
            body: Block::new(vec![Stmt::CodeBlock(crate::ast::CodeBlock {
                body: Block::new(deploy_body),
                at: contract.at.clone(),
            })]),
            at: contract.at,
        }))
    }

    fn transform_constructor(&mut self, mut def: ConstructorDef) -> Result<Stmt> {
        self.scopes.push(ScopeKind::Block);
        for param in &def.params.params {
            if let Some(name) = &param.name {
                self.scopes.register_var(name.clone(), Some(param.ty.canonical()));
            }
        }
        def.body = self.transform_block(def.body)?;
        self.scopes.pop();
        Ok(Stmt::ConstructorDef(def))
    }

    fn transform_method(&mut self, mut def: MethodDef) -> Result<Stmt> {
        self.abi.register_method_def(&def)?;
        self.scopes.push(ScopeKind::Block);
        for param in &def.params.params {
            if let Some(name) = &param.name {
                self.scopes.register_var(name.clone(), Some(param.ty.canonical()));
            }
        }
        def.body = self.transform_block(def.body)?;
        self.scopes.pop();
        Ok(Stmt::MethodDef(def))
    }

    fn transform_switch(&mut self, mut sw: Switch) -> Result<Stmt> {
        sw.expr = self.transform_expr(sw.expr)?;
        sw.cases = sw
            .cases
            .into_iter()
            .map(|Case { value, body }| -> Result<Case> { Ok(Case { value, body: self.transform_block(body)? }) })
            .collect::<Result<Vec<_>>>()?;
        sw.default = sw.default.map(|b| self.transform_block(b)).transpose()?;
        Ok(Stmt::Switch(sw))
    }

    /// Expands `returns(offset, v0, v1, ...)`/`mstores(offset, v0, v1, ...)`
    /// (§4.4 "Builtins: returns/mstores") into a bound offset local plus one
    /// `mstore` per value; `returns` additionally appends the `return`.
    fn build_store_sequence(&mut self, mut call: FunctionCall) -> Result<Stmt> {
        let is_returns = call.name == "returns";
        call.args = call.args.into_iter().map(|a| self.transform_expr(a)).collect::<Result<_>>()?;
        if call.args.is_empty() {
            return Err(Error::resolution(
                format!("'{}' requires an offset argument", call.name),
                Some(SourceSpan::new(call.filename.clone(), call.line, 0)),
            ));
        }
        let filename = call.filename.clone();
        let line = call.line;
        let at = SourceSpan::new(filename.clone(), line, 0);
        let mut args = call.args.into_iter();
        let offset_expr = args.next().expect("checked non-empty above");
        let values: Vec<Expr> = args.collect();

        let mut stmts = vec![Stmt::VariableDeclaration(crate::ast::VariableDeclaration {
            idents: crate::ast::TypedIdentifierList {
                idents: vec![crate::ast::TypedIdentifier { name: "__storesOffset".to_owned(), ty: None }],
            },
            init: Some(offset_expr),
            at: at.clone(),
        })];
        for (i, value) in values.iter().enumerate() {
            let addr = if i == 0 {
                Expr::ident("__storesOffset")
            } else {
                Expr::call(
                    "add",
                    vec![Expr::ident("__storesOffset"), Expr::literal(crate::ast::Literal::number((i as u32 * 32).into()))],
                    filename.clone(),
                    line,
                )
            };
            stmts.push(Stmt::Expr(Expr::call("mstore", vec![addr, value.clone()], filename.clone(), line)));
        }
        if is_returns {
            let size = Expr::literal(crate::ast::Literal::number((values.len() as u32 * 32).into()));
            stmts.push(Stmt::Expr(Expr::call("return", vec![Expr::ident("__storesOffset"), size], filename, line)));
        }
        Ok(Stmt::Block(Block::new(stmts)))
    }

    /// Lowers `base->member := rhs` / `base->member |= rhs` into a plain
    /// reassignment of `base` (§4.4 "MemberAssignment"): a full-word field is
    /// an overwrite, `|=` OR-merges the shifted value in directly, and a
    /// plain `:=` first clears the field's bits before OR-ing the shifted
    /// value back in.
    fn transform_member_assignment(&mut self, mut ma: MemberAssignment) -> Result<Stmt> {
        ma.rhs = self.transform_expr(ma.rhs)?;
        let layout = self.struct_layout_for(&ma.target)?;
        let (shift, width) = layout.unwrap_or((0, 256));
        let filename = self.filename.clone();
        let line = ma.at.line;
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), line);

        if width >= 256 {
            let value = fold::fold_expr(ma.rhs);
            return Ok(Stmt::Assignment(crate::ast::Assignment {
                lhs: crate::ast::IdentifierList { names: vec![ma.target.base.clone()] },
                rhs: value,
                at: ma.at,
            }));
        }

        let base = Expr::ident(ma.target.base.clone());
        let shifted = if shift == 0 {
            ma.rhs
        } else {
            call("shl", vec![Expr::literal(crate::ast::Literal::number(u32::from(shift).into())), ma.rhs])
        };

        let new_value = if ma.or_flag {
            call("or", vec![base, shifted])
        } else {
            let mask = ((num_bigint::BigUint::from(1u32) << u32::from(width)) - num_bigint::BigUint::from(1u32)) << u32::from(shift);
            let full_mask = (num_bigint::BigUint::from(1u32) << 256u32) - num_bigint::BigUint::from(1u32);
            let not_mask = full_mask ^ mask;
            let cleared = call("and", vec![base, Expr::literal(crate::ast::Literal::number(not_mask))]);
            call("or", vec![cleared, shifted])
        };

        Ok(Stmt::Assignment(crate::ast::Assignment {
            lhs: crate::ast::IdentifierList { names: vec![ma.target.base.clone()] },
            rhs: fold::fold_expr(new_value),
            at: ma.at,
        }))
    }

    fn struct_layout_for(&self, member: &MemberIdentifier) -> Result<Option<(u16, u16)>> {
        let Some(ty_name) = member.cast.clone().or_else(|| self.scopes.resolve_var_type(&member.base)) else {
            return Ok(None);
        };
        let Some(def) = self.scopes.resolve_struct(&ty_name) else {
            return Ok(None);
        };
        let layout = structs::pack_struct(def)?;
        let Some(field) = def
            .members
            .iter()
            .position(|m| m.name == member.member)
            .and_then(|idx| layout.fields.iter().find(|f| f.name_index == idx))
        else {
            return Err(Error::resolution(
                format!("struct '{ty_name}' has no member '{}'", member.member),
                Some(member.at.clone()),
            ));
        };
        Ok(Some((field.shift, field.width)))
    }

    /// Lowers a struct-member read (§4.4 "MemberIdentifier"): a full word
    /// reads `base` directly, a byte-aligned single-byte field uses `byte`,
    /// and everything else is a `shr`-then-`and` (the shift is omitted at
    /// bit offset zero, the mask at a full 256-bit width).
    fn member_read_expr(&mut self, mi: MemberIdentifier, shift: u16, width: u16) -> Expr {
        let filename = self.filename.clone();
        let line = mi.at.line;
        let call = |name: &str, args: Vec<Expr>| Expr::call(name, args, filename.clone(), line);
        let base = Expr::ident(mi.base.clone());

        if width >= 256 {
            return base;
        }
        if width == 8 && shift % 8 == 0 {
            let byte_index = (256 - u32::from(shift) - 8) / 8;
            return call("byte", vec![Expr::literal(crate::ast::Literal::number(byte_index.into())), base]);
        }

        let shifted = if shift == 0 {
            base
        } else {
            call("shr", vec![Expr::literal(crate::ast::Literal::number(u32::from(shift).into())), base])
        };
        let mask = (num_bigint::BigUint::from(1u32) << u32::from(width)) - num_bigint::BigUint::from(1u32);
        call("and", vec![shifted, Expr::literal(crate::ast::Literal::number(mask))])
    }

    fn transform_emit(&mut self, mut emit: Emit) -> Result<Stmt> {
        let Some(decl) = self.scopes.resolve_event(&emit.name).cloned() else {
            return Err(Error::resolution(format!("undefined event '{}'", emit.name), Some(emit.at.clone())));
        };
        if emit.args.len() != decl.params.len() {
            return Err(Error::resolution(
                format!(
                    "event '{}' expects {} argument(s), found {}",
                    emit.name,
                    decl.params.len(),
                    emit.args.len()
                ),
                Some(emit.at.clone()),
            ));
        }
        emit.offset = Box::new(self.transform_expr(*emit.offset)?);
        emit.args = emit.args.into_iter().map(|a| self.transform_expr(a)).collect::<Result<_>>()?;
        let helper = mangle::emit_helper(&emit.name, 0);
        if !self.materialised.contains_key(&helper) {
            let def = self.synthesize_emit_helper(&helper, &decl);
            self.materialised.insert(helper.clone(), def);
        }
        self.scopes.record_dependency(&helper);
        let mut args = vec![*emit.offset];
        args.extend(emit.args);
        Ok(Stmt::Expr(Expr::call(helper, args, self.filename.clone(), emit.at.line)))
    }

    /// Builds `function __emit_Event_0(offset, v0, v1, ...) { ... }`: the
    /// indexed parameters become `logN` topics in declaration order, the
    /// remaining parameters are written back-to-back into memory at
    /// `offset` as the log's data region (§4.4 "Emit").
    fn synthesize_emit_helper(&self, helper_name: &str, decl: &crate::ast::EventDecl) -> FunctionDef {
        let filename = self.filename.clone();
        let mut params = vec!["offset".to_owned()];
        let mut topics = Vec::new();
        if !decl.anonymous {
            topics.push(Expr::literal(crate::ast::Literal::parse_hex(
                &crate::digest::to_hex(&crate::digest::topic0(&event_signature(decl))),
                &decl.at,
            )
            .expect("digest hex is well-formed")));
        }
        let mut body = Vec::new();
        let mut data_idx: u32 = 0;
        for (i, param) in decl.params.iter().enumerate() {
            let pname = format!("v{i}");
            params.push(pname.clone());
            if param.indexed {
                topics.push(Expr::ident(pname));
            } else {
                body.push(Stmt::Expr(Expr::call(
                    "mstore",
                    vec![
                        Expr::call(
                            "add",
                            vec![Expr::ident("offset"), Expr::literal(crate::ast::Literal::number((data_idx * 32).into()))],
                            filename.clone(),
                            decl.at.line,
                        ),
                        Expr::ident(pname),
                    ],
                    filename.clone(),
                    decl.at.line,
                )));
                data_idx += 1;
            }
        }
        let log_opcode = format!("log{}", topics.len());
        let mut log_args = vec![Expr::ident("offset"), Expr::literal(crate::ast::Literal::number((data_idx * 32).into()))];
        log_args.extend(topics);
        body.push(Stmt::Expr(Expr::call(log_opcode, log_args, filename, decl.at.line)));
        FunctionDef {
            name: helper_name.to_owned(),
            params,
            returns: vec![],
            modifier: crate::ast::FunctionModifier::None,
            body: Block::new(body),
            builtin: true,
            at: decl.at.clone(),
        }
    }

    fn transform_throw(&mut self, mut throw: Throw) -> Result<Stmt> {
        let Some(decl) = self.scopes.resolve_error(&throw.name).cloned() else {
            return Err(Error::resolution(format!("undefined error '{}'", throw.name), Some(throw.at.clone())));
        };
        if throw.args.len() != decl.params.len() {
            return Err(Error::resolution(
                format!(
                    "error '{}' expects {} argument(s), found {}",
                    throw.name,
                    decl.params.len(),
                    throw.args.len()
                ),
                Some(throw.at.clone()),
            ));
        }
        throw.args = throw.args.into_iter().map(|a| self.transform_expr(a)).collect::<Result<_>>()?;
        let helper = mangle::throw_helper(&throw.name, 0);
        if !self.materialised.contains_key(&helper) {
            let def = self.synthesize_throw_helper(&helper, &decl);
            self.materialised.insert(helper.clone(), def);
        }
        self.scopes.record_dependency(&helper);
        Ok(Stmt::Expr(Expr::call(helper, throw.args, self.filename.clone(), throw.at.line)))
    }

    /// Builds `function __throw_Error_0(v0, v1, ...) { ... revert(0, size) }`:
    /// the selector occupies the top 4 bytes of word 0, each parameter is
    /// written into its own following word (§4.4 "Throw").
    fn synthesize_throw_helper(&self, helper_name: &str, decl: &crate::ast::ErrorDecl) -> FunctionDef {
        let filename = self.filename.clone();
        let selector = crate::digest::selector4(&error_signature(decl));
        let selector_word = num_bigint::BigUint::from_bytes_be(&selector) << 224u32;
        let mut params = Vec::new();
        let mut body = vec![Stmt::Expr(Expr::call(
            "mstore",
            vec![Expr::literal(crate::ast::Literal::number(0u32.into())), Expr::literal(crate::ast::Literal::number(selector_word))],
            filename.clone(),
            decl.at.line,
        ))];
        for i in 0..decl.params.len() {
            let pname = format!("v{i}");
            params.push(pname.clone());
            body.push(Stmt::Expr(Expr::call(
                "mstore",
                vec![Expr::literal(crate::ast::Literal::number((4 + i as u32 * 32).into())), Expr::ident(pname)],
                filename.clone(),
                decl.at.line,
            )));
        }
        let size = 4 + decl.params.len() as u32 * 32;
        body.push(Stmt::Expr(Expr::call(
            "revert",
            vec![Expr::literal(crate::ast::Literal::number(0u32.into())), Expr::literal(crate::ast::Literal::number(size.into()))],
            filename,
            decl.at.line,
        )));
        FunctionDef {
            name: helper_name.to_owned(),
            params,
            returns: vec![],
            modifier: crate::ast::FunctionModifier::None,
            body: Block::new(body),
            builtin: true,
            at: decl.at.clone(),
        }
    }

    fn transform_expr(&mut self, expr: Expr) -> Result<Expr> {
        let rewritten = match expr {
            Expr::FunctionCall(call) => self.transform_call(call)?,
            Expr::StructInitializer(init) => self.transform_struct_initializer(init)?,
            Expr::InterfaceCall(ic) => self.transform_interface_call(ic)?,
            Expr::MemberIdentifier(mi) => match self.struct_layout_for(&mi)? {
                Some((shift, width)) => self.member_read_expr(mi, shift, width),
                None => Expr::MemberIdentifier(mi),
            },
            Expr::Identifier(ident) => self.resolve_identifier(ident)?,
            other => other,
        };
        Ok(fold::fold_expr(rewritten))
    }

    /// A bare identifier that isn't a local variable and resolves to a
    /// zero-argument `const` is replaced by that const's (recursively
    /// resolved) value; everything else passes through as a plain Yul
    /// identifier reference.
    fn resolve_identifier(&mut self, ident: crate::ast::Identifier) -> Result<Expr> {
        if self.scopes.resolve_var(&ident.value) {
            return Ok(Expr::Identifier(ident));
        }
        if let Some(decl) = self.scopes.resolve_const(&ident.value).cloned() {
            if decl.is_function {
                return Ok(Expr::Identifier(ident));
            }
            return self.transform_expr(decl.expr);
        }
        Ok(Expr::Identifier(ident))
    }

    fn transform_call(&mut self, mut call: FunctionCall) -> Result<Expr> {
        call.args = call.args.into_iter().map(|a| self.transform_expr(a)).collect::<Result<_>>()?;
        if self.builtins.is_intrinsic(&call.name) {
            let lowered = self.builtins.lower_intrinsic(call, &self.options)?;
            self.materialise_referenced_helpers(&lowered);
            return Ok(lowered);
        }
        if self.scopes.resolve_function(&call.name).is_none() {
            if let Some(def) = self.builtins.lookup_helper(&call.name) {
                self.materialise_helper(def);
            }
        }
        if let Some(decl) = self.scopes.resolve_const(&call.name).cloned() {
            if decl.is_function {
                return self.expand_const_function(decl, call.args);
            }
        }
        self.scopes.record_dependency(&call.name);
        if let Some(mac) = self.scopes.resolve_macro(&call.name).cloned() {
            return self.expand_macro(mac, call.args);
        }
        Ok(Expr::FunctionCall(call))
    }

    /// `const foo(a, b) := ...` is a pure, hygiene-free expression macro:
    /// substitute parameters and fold, identically to `expand_macro` but
    /// over a single expression body rather than a block.
    fn expand_const_function(&mut self, decl: crate::ast::ConstDeclaration, args: Vec<Expr>) -> Result<Expr> {
        let params = decl.params.unwrap_or_default();
        if args.len() != params.len() {
            return Err(Error::resolution(
                format!("const function '{}' expects {} argument(s), found {}", decl.name, params.len(), args.len()),
                Some(decl.at.clone()),
            ));
        }
        let substitutions: IndexMap<String, Expr> = params.into_iter().zip(args).collect();
        let substituted = substitute_expr(decl.expr, &substitutions);
        self.transform_expr(substituted)
    }

    fn expand_macro(&mut self, mac: crate::ast::MacroDefinition, args: Vec<Expr>) -> Result<Expr> {
        if args.len() != mac.params.len() {
            return Err(Error::resolution(
                format!("macro '{}' expects {} argument(s), found {}", mac.name, mac.params.len(), args.len()),
                Some(mac.at.clone()),
            ));
        }
        let substitutions: IndexMap<String, Expr> = mac.params.into_iter().zip(args).collect();
        let body = substitute_block(mac.body, &substitutions);
        self.scopes.push(ScopeKind::Block);
        let transformed = self.transform_block(body)?;
        self.scopes.pop();
        // Macro expansion is statement-shaped in source but used in
        // expression position here; by convention the body's final bare
        // expression statement, if any, is the macro's value.
        let value = transformed.stmts.into_iter().rev().find_map(|s| match s {
            Stmt::Expr(e) => Some(e),
            _ => None,
        });
        Ok(value.unwrap_or_else(|| Expr::literal(crate::ast::Literal::number(0u32.into()))))
    }

    fn transform_struct_initializer(&mut self, init: crate::ast::StructInitializer) -> Result<Expr> {
        let Some(def) = self.scopes.resolve_struct(&init.struct_name).cloned() else {
            return Err(Error::resolution(format!("undefined struct '{}'", init.struct_name), Some(init.at.clone())));
        };
        if init.args.len() != def.members.len() {
            return Err(Error::resolution(
                format!(
                    "struct '{}' has {} member(s), found {} initialiser argument(s)",
                    init.struct_name,
                    def.members.len(),
                    init.args.len()
                ),
                Some(init.at.clone()),
            ));
        }
        let layout = structs::pack_struct(&def)?;
        let mut packed = Expr::literal(crate::ast::Literal::number(0u32.into()));
        for (idx, arg) in init.args.into_iter().enumerate() {
            let value = match arg {
                StructInitArg::Expr(e) => self.transform_expr(e)?,
                StructInitArg::Default => match &def.members[idx].default {
                    Some(default) => self.transform_expr(default.clone())?,
                    None => Expr::literal(crate::ast::Literal::number(0u32.into())),
                },
            };
            if def.members[idx].is_padding() {
                continue;
            }
            let field = layout.fields.iter().find(|f| f.name_index == idx).expect("every member has a packed field");
            let shifted = if field.shift == 0 {
                value
            } else {
                Expr::call("shl", vec![Expr::literal(crate::ast::Literal::number(u32::from(field.shift).into())), value], self.filename.clone(), init.at.line)
            };
            packed = Expr::call("or", vec![packed, shifted], self.filename.clone(), init.at.line);
        }
        Ok(fold::fold_expr(packed))
    }

    /// Routes a `new Interface(...)`/`Interface(addr).method(...)` call
    /// through the lazily-materialised thunk for that entry point (§4.4
    /// "InterfaceCall"), checking it's declared and called with the right
    /// argument count first.
    fn transform_interface_call(&mut self, ic: crate::ast::InterfaceCall) -> Result<Expr> {
        let Some(iface) = self.scopes.resolve_interface(&ic.name).cloned() else {
            return Err(Error::resolution(format!("undefined interface '{}'", ic.name), Some(ic.at.clone())));
        };
        let args = ic.args.into_iter().map(|a| self.transform_expr(a)).collect::<Result<Vec<_>>>()?;
        let helper = match ic.kind {
            crate::ast::InterfaceCallKind::Create | crate::ast::InterfaceCallKind::Create2 => {
                if iface.constructor.is_none() {
                    return Err(Error::resolution(
                        format!("interface '{}' has no constructor to create", ic.name),
                        Some(ic.at.clone()),
                    ));
                }
                let salted = ic.kind == crate::ast::InterfaceCallKind::Create2;
                let expected = if salted { 4 } else { 3 };
                if args.len() != expected {
                    return Err(Error::resolution(
                        format!("interface '{}' create expects {expected} argument(s), found {}", ic.name, args.len()),
                        Some(ic.at.clone()),
                    ));
                }
                self.ensure_create_helper(&ic.name, salted)
            }
            crate::ast::InterfaceCallKind::Call => {
                let method_name = ic.method.as_deref().unwrap_or_default();
                let Some(method) = iface.methods.iter().find(|m| m.name == method_name).cloned() else {
                    return Err(Error::resolution(
                        format!("interface '{}' has no method '{method_name}'", ic.name),
                        Some(ic.at.clone()),
                    ));
                };
                let expected = method.params.params.len() + 1;
                if args.len() != expected {
                    return Err(Error::resolution(
                        format!(
                            "interface '{}' method '{method_name}' expects {expected} argument(s), found {}",
                            ic.name,
                            args.len()
                        ),
                        Some(ic.at.clone()),
                    ));
                }
                self.ensure_call_helper(&ic.name, &method, ic.attempt)
            }
        };
        self.scopes.record_dependency(&helper);
        Ok(Expr::call(helper, args, self.filename.clone(), ic.at.line))
    }

    /// Adds a prelude helper to the output, then walks its own body for
    /// further helper calls it depends on (e.g. `__ecverify` calling
    /// `__ecrecover`) so those get pulled in transitively.
    fn materialise_helper(&mut self, def: crate::ast::FunctionDef) {
        if self.materialised.contains_key(&def.name) || self.scopes.depends_on(&def.name) {
            return;
        }
        let body = def.body.clone();
        self.materialised.insert(def.name.clone(), def);
        self.scan_block_for_dependencies(&body);
    }

    fn scan_block_for_dependencies(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.scan_stmt_for_dependencies(stmt);
        }
    }

    fn scan_stmt_for_dependencies(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) | Stmt::Assignment(crate::ast::Assignment { rhs: e, .. }) | Stmt::MemberAssignment(MemberAssignment { rhs: e, .. }) => {
                self.materialise_referenced_helpers(e);
            }
            Stmt::VariableDeclaration(vd) => {
                if let Some(init) = &vd.init {
                    self.materialise_referenced_helpers(init);
                }
            }
            Stmt::If(i) => {
                self.materialise_referenced_helpers(&i.cond);
                self.scan_block_for_dependencies(&i.body);
            }
            Stmt::Switch(sw) => {
                self.materialise_referenced_helpers(&sw.expr);
                for case in &sw.cases {
                    self.scan_block_for_dependencies(&case.body);
                }
                if let Some(default) = &sw.default {
                    self.scan_block_for_dependencies(default);
                }
            }
            Stmt::ForLoop(f) => {
                self.scan_block_for_dependencies(&f.init);
                self.materialise_referenced_helpers(&f.cond);
                self.scan_block_for_dependencies(&f.post);
                self.scan_block_for_dependencies(&f.body);
            }
            Stmt::While(w) => {
                self.materialise_referenced_helpers(&w.cond);
                self.scan_block_for_dependencies(&w.body);
            }
            Stmt::DoWhile(d) => {
                self.scan_block_for_dependencies(&d.body);
                self.materialise_referenced_helpers(&d.cond);
            }
            Stmt::Block(b) => self.scan_block_for_dependencies(b),
            _ => {}
        }
    }

    /// Intrinsics can lower to a call of a prelude helper (e.g. `require.eq`
    /// -> `__require(...)`); walk the lowered expression and materialise any
    /// such helper the same way a direct user call would.
    fn materialise_referenced_helpers(&mut self, expr: &Expr) {
        if let Expr::FunctionCall(call) = expr {
            if let Some(def) = self.builtins.lookup_helper(&call.name) {
                self.scopes.record_dependency(&call.name);
                self.materialise_helper(def);
            }
            for arg in &call.args {
                self.materialise_referenced_helpers(arg);
            }
        }
    }
}

/// Substitutes macro parameter names for their argument expressions
/// throughout a cloned body (§4.4 "Macro": substitution is syntactic and
/// unhygienic by design — a macro argument that shadows an outer name will
/// capture it, matching the dialect's documented limitation).
fn substitute_block(block: Block, subs: &IndexMap<String, Expr>) -> Block {
    Block::new(block.stmts.into_iter().map(|s| substitute_stmt(s, subs)).collect())
}

fn substitute_stmt(stmt: Stmt, subs: &IndexMap<String, Expr>) -> Stmt {
    match stmt {
        Stmt::Expr(e) => Stmt::Expr(substitute_expr(e, subs)),
        Stmt::VariableDeclaration(mut vd) => {
            vd.init = vd.init.map(|e| substitute_expr(e, subs));
            Stmt::VariableDeclaration(vd)
        }
        Stmt::Assignment(mut a) => {
            a.rhs = substitute_expr(a.rhs, subs);
            Stmt::Assignment(a)
        }
        Stmt::If(mut i) => {
            i.cond = substitute_expr(i.cond, subs);
            i.body = substitute_block(i.body, subs);
            Stmt::If(i)
        }
        Stmt::Block(b) => Stmt::Block(substitute_block(b, subs)),
        other => other,
    }
}

fn substitute_expr(expr: Expr, subs: &IndexMap<String, Expr>) -> Expr {
    match expr {
        Expr::Identifier(ident) => subs.get(&ident.value).cloned().unwrap_or(Expr::Identifier(ident)),
        Expr::FunctionCall(mut call) => {
            call.args = call.args.into_iter().map(|a| substitute_expr(a, subs)).collect();
            Expr::FunctionCall(call)
        }
        other => other,
    }
}
