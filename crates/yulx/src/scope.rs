//! Lexically-scoped symbol tables (§4.3). A `Vec<Scope>` stack mirrors block
//! nesting; each `Scope` holds one `IndexMap` per symbol kind so iteration
//! order is deterministic (insertion order), which matters for dependency
//! flush ordering (§4.4 "Dependency materialisation").

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{
        ConstDeclaration, ErrorDecl, EventDecl, FunctionDef, Interface, MacroDefinition, MethodDecl, StructDefinition,
    },
    error::{Error, Result, SourceSpan},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Top-level file scope.
    Root,
    /// Inside an `object { ... }` block.
    Object,
    /// Inside a `code { ... }` block.
    Code,
    /// Inside a `contract { ... }` block.
    Contract,
    /// Any other nested block (function body, loop body, branch).
    Block,
}

#[derive(Debug, Default)]
pub struct Scope {
    pub kind: Option<ScopeKind>,
    pub consts: IndexMap<String, ConstDeclaration>,
    pub structs: IndexMap<String, StructDefinition>,
    pub macros: IndexMap<String, MacroDefinition>,
    pub functions: IndexMap<String, FunctionDef>,
    pub interfaces: IndexMap<String, Interface>,
    pub methods: IndexMap<String, MethodDecl>,
    pub events: IndexMap<String, EventDecl>,
    pub errors: IndexMap<String, ErrorDecl>,
    pub vars: IndexMap<String, Option<String>>,
    /// Names of library functions this scope's code has called, recorded in
    /// call order so dependency materialisation (§4.4) clones them in a
    /// deterministic, stable order at scope exit.
    pub depends: IndexSet<String>,
    /// `object`/`data` block names declared directly under this scope.
    pub data: IndexSet<String>,
    /// Calldata members required by `constructor`/`method` bodies under this
    /// scope, used to size the dispatcher's calldata bounds check.
    pub calldata: IndexSet<String>,
    /// Storage slots reserved as `immutable` under this scope.
    pub immutable: IndexSet<String>,
}

impl Scope {
    fn new(kind: Option<ScopeKind>) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// The live scope stack during a single transform pass over one file.
pub struct ScopeStack {
    stack: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![Scope::new(Some(ScopeKind::Root))],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.stack.push(Scope::new(Some(kind)));
    }

    /// Pops the innermost scope, returning it so the caller can flush its
    /// `depends` set into materialised helper clones before it is dropped.
    pub fn pop(&mut self) -> Scope {
        self.stack.pop().expect("scope stack underflow: popped the root scope")
    }

    pub fn current(&self) -> &Scope {
        self.stack.last().expect("scope stack is never empty")
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.stack.last_mut().expect("scope stack is never empty")
    }

    /// Innermost scope first, root last.
    fn scopes_inner_to_outer(&self) -> impl Iterator<Item = &Scope> {
        self.stack.iter().rev()
    }

    /// Walks outward from the current scope to find the nearest `Code`
    /// scope, used to resolve `returns()`/`mstores()` intrinsics that only
    /// make sense inside an object's runtime code block.
    #[must_use]
    pub fn find_code_scope(&self) -> Option<&Scope> {
        self.scopes_inner_to_outer().find(|s| s.kind == Some(ScopeKind::Code))
    }

    #[must_use]
    pub fn find_object_scope(&self) -> Option<&Scope> {
        self.scopes_inner_to_outer().find(|s| s.kind == Some(ScopeKind::Object))
    }

    #[must_use]
    pub fn find_contract_block(&self) -> Option<&Scope> {
        self.scopes_inner_to_outer().find(|s| s.kind == Some(ScopeKind::Contract))
    }

    pub fn register_var(&mut self, name: String, ty: Option<String>) {
        self.current_mut().vars.insert(name, ty);
    }

    pub fn record_dependency(&mut self, name: &str) {
        self.current_mut().depends.insert(name.to_owned());
    }

    #[must_use]
    pub fn resolve_var(&self, name: &str) -> bool {
        self.scopes_inner_to_outer().any(|s| s.vars.contains_key(name))
    }

    /// The declared type annotation of a variable, if any was given at its
    /// `let` binding. Used to resolve which struct layout a bare
    /// `x.field` member access packs against.
    #[must_use]
    pub fn resolve_var_type(&self, name: &str) -> Option<String> {
        self.scopes_inner_to_outer().find_map(|s| s.vars.get(name)).cloned().flatten()
    }

    #[must_use]
    pub fn resolve_const(&self, name: &str) -> Option<&ConstDeclaration> {
        self.scopes_inner_to_outer().find_map(|s| s.consts.get(name))
    }

    #[must_use]
    pub fn resolve_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.scopes_inner_to_outer().find_map(|s| s.structs.get(name))
    }

    #[must_use]
    pub fn resolve_macro(&self, name: &str) -> Option<&MacroDefinition> {
        self.scopes_inner_to_outer().find_map(|s| s.macros.get(name))
    }

    #[must_use]
    pub fn resolve_function(&self, name: &str) -> Option<&FunctionDef> {
        self.scopes_inner_to_outer().find_map(|s| s.functions.get(name))
    }

    #[must_use]
    pub fn resolve_interface(&self, name: &str) -> Option<&Interface> {
        self.scopes_inner_to_outer().find_map(|s| s.interfaces.get(name))
    }

    #[must_use]
    pub fn resolve_event(&self, name: &str) -> Option<&EventDecl> {
        self.scopes_inner_to_outer().find_map(|s| s.events.get(name))
    }

    #[must_use]
    pub fn resolve_error(&self, name: &str) -> Option<&ErrorDecl> {
        self.scopes_inner_to_outer().find_map(|s| s.errors.get(name))
    }

    pub fn add_const(&mut self, decl: ConstDeclaration, at: SourceSpan) -> Result<()> {
        if self.current().consts.contains_key(&decl.name) {
            return Err(Error::resolution(format!("duplicate const '{}'", decl.name), Some(at)));
        }
        self.current_mut().consts.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn add_struct(&mut self, def: StructDefinition, at: SourceSpan) -> Result<()> {
        if self.current().structs.contains_key(&def.name) {
            return Err(Error::resolution(format!("duplicate struct '{}'", def.name), Some(at)));
        }
        self.current_mut().structs.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn add_macro(&mut self, def: MacroDefinition, at: SourceSpan) -> Result<()> {
        if self.current().macros.contains_key(&def.name) {
            return Err(Error::resolution(format!("duplicate macro '{}'", def.name), Some(at)));
        }
        self.current_mut().macros.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn add_function(&mut self, def: FunctionDef, at: SourceSpan) -> Result<()> {
        if self.current().functions.contains_key(&def.name) {
            return Err(Error::resolution(format!("duplicate function '{}'", def.name), Some(at)));
        }
        self.current_mut().functions.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn add_interface(&mut self, iface: Interface, at: SourceSpan) -> Result<()> {
        if self.current().interfaces.contains_key(&iface.name) {
            return Err(Error::resolution(format!("duplicate interface '{}'", iface.name), Some(at)));
        }
        self.current_mut().interfaces.insert(iface.name.clone(), iface);
        Ok(())
    }

    pub fn add_method(&mut self, decl: MethodDecl, at: SourceSpan) -> Result<()> {
        if self.current().methods.contains_key(&decl.name) {
            return Err(Error::resolution(format!("duplicate method '{}'", decl.name), Some(at)));
        }
        self.current_mut().methods.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn add_event(&mut self, decl: EventDecl, at: SourceSpan) -> Result<()> {
        if self.current().events.contains_key(&decl.name) {
            return Err(Error::resolution(format!("duplicate event '{}'", decl.name), Some(at)));
        }
        self.current_mut().events.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn add_error(&mut self, decl: ErrorDecl, at: SourceSpan) -> Result<()> {
        if self.current().errors.contains_key(&decl.name) {
            return Err(Error::resolution(format!("duplicate error '{}'", decl.name), Some(at)));
        }
        self.current_mut().errors.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// True if `name` is reachable as a library dependency from any
    /// enclosing scope (used to avoid re-materialising a helper that an
    /// outer scope already cloned in).
    #[must_use]
    pub fn depends_on(&self, name: &str) -> bool {
        self.scopes_inner_to_outer().any(|s| s.depends.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;

    fn span() -> SourceSpan {
        SourceSpan::new("t.yulx", 1, 1)
    }

    #[test]
    fn nested_scope_resolves_through_parent_chain() {
        let mut stack = ScopeStack::new();
        stack.register_var("outer".to_owned(), None);
        stack.push(ScopeKind::Block);
        stack.register_var("inner".to_owned(), None);
        assert!(stack.resolve_var("outer"));
        assert!(stack.resolve_var("inner"));
        let popped = stack.pop();
        assert!(popped.vars.contains_key("inner"));
        assert!(!stack.resolve_var("inner"));
        assert!(stack.resolve_var("outer"));
    }

    #[test]
    fn duplicate_const_in_same_scope_is_rejected() {
        let mut stack = ScopeStack::new();
        let decl = ConstDeclaration {
            name: "X".to_owned(),
            params: None,
            expr: crate::ast::Expr::literal(crate::ast::Literal::number(0u32.into())),
            is_function: false,
            at: span(),
        };
        stack.add_const(decl.clone(), span()).unwrap();
        assert!(stack.add_const(decl, span()).is_err());
    }

    #[test]
    fn find_code_scope_skips_intermediate_blocks() {
        let mut stack = ScopeStack::new();
        stack.push(ScopeKind::Object);
        stack.push(ScopeKind::Code);
        stack.push(ScopeKind::Block);
        assert!(stack.find_code_scope().is_some());
        assert!(stack.find_object_scope().is_some());
    }
}
