//! The tagged AST (§3). One `Stmt`/`Expr` pair of enums covers every node
//! kind in the distilled spec's table; each variant carries only the fields
//! that table lists. Cloning is cheap enough to be the macro-expansion
//! strategy (§4.4 Macro): substitution clones the body, rewrites
//! `Identifier` leaves, and hands the clone to the transformer recursively.

pub mod types;

use std::rc::Rc;

use indexmap::IndexMap;

pub use types::{AbiBase, AbiType, Literal, LiteralKind, LiteralUnit};

use crate::error::SourceSpan;

/// A whole parsed file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Root {
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    #[must_use]
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

/// Accepted pragma names (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum PragmaName {
    License,
    Solc,
    Yulc,
    Evm,
    Optimize,
    Deoptimize,
    Lock,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Pragma {
    pub name: PragmaName,
    pub value: String,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ElifBranch {
    pub expr: Expr,
    pub block: Block,
}

/// `@if / elif / else` (§4.4 Preprocessor Fold).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Fold {
    pub expr: Expr,
    pub block: Block,
    pub elifs: Vec<ElifBranch>,
    pub else_block: Option<Block>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IncludeCall {
    pub base_dir: String,
    pub filename: String,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnumDecl {
    pub prefix: Option<String>,
    pub members: Vec<EnumMember>,
    pub at: SourceSpan,
}

/// `+` as a member name marks padding (§3 `StructMember`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StructMember {
    pub ty: AbiType,
    pub name: String,
    pub default: Option<Expr>,
}

impl StructMember {
    #[must_use]
    pub fn is_padding(&self) -> bool {
        self.name == "+"
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub members: Vec<StructMember>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mutability {
    NonPayable,
    Payable,
    View,
    Pure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    External,
    Public,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypedParam {
    pub ty: AbiType,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MethodParams {
    pub params: Vec<TypedParam>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstructorDecl {
    pub params: MethodParams,
    pub payable: bool,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstructorDef {
    pub params: MethodParams,
    pub payable: bool,
    pub unchecked: bool,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub params: MethodParams,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub returns: Vec<AbiType>,
    pub doc: Option<String>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: MethodParams,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub locked: bool,
    pub returns: Vec<AbiType>,
    pub body: Block,
    pub doc: Option<String>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventParam {
    pub ty: AbiType,
    pub name: String,
    pub indexed: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub params: Vec<EventParam>,
    pub anonymous: bool,
    pub packed: bool,
    pub inline: bool,
    pub doc: Option<String>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorParam {
    pub ty: AbiType,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorDecl {
    pub name: String,
    pub params: Vec<ErrorParam>,
    pub doc: Option<String>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Interface {
    pub name: String,
    pub constructor: Option<ConstructorDecl>,
    pub methods: Vec<MethodDecl>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Contract {
    pub name: String,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ObjectBlock {
    pub name: String,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodeBlock {
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DataValue {
    pub name: String,
    /// raw bytes for a `hex"..."` literal, or the UTF-8 bytes of a string literal
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MacroConstant {
    pub name: String,
    pub expr: Expr,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MacroDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FunctionModifier {
    None,
    Noinline,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub modifier: FunctionModifier,
    pub body: Block,
    /// Marks library helpers preloaded from the built-ins file (§4.4
    /// "Dependency materialisation"): these are cloned and α-renamed rather
    /// than referenced directly.
    pub builtin: bool,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypedIdentifier {
    pub name: String,
    pub ty: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TypedIdentifierList {
    pub idents: Vec<TypedIdentifier>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VariableDeclaration {
    pub idents: TypedIdentifierList,
    pub init: Option<Expr>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstDeclaration {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub expr: Expr,
    /// `true` when declared as a hidden zero-arg function (`const x() := ...`).
    pub is_function: bool,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct IdentifierList {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Assignment {
    pub lhs: IdentifierList,
    pub rhs: Expr,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberAssignment {
    pub target: MemberIdentifier,
    pub rhs: Expr,
    /// `true` for `|=` (OR-merge write), `false` for `:=` (mask-then-OR write).
    pub or_flag: bool,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct If {
    pub cond: Expr,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Case {
    pub value: Literal,
    pub body: Block,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Switch {
    pub expr: Expr,
    pub cases: Vec<Case>,
    pub default: Option<Block>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForLoop {
    pub init: Block,
    pub cond: Expr,
    pub post: Block,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct While {
    pub cond: Expr,
    pub body: Block,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DoWhile {
    pub body: Block,
    pub cond: Expr,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Emit {
    pub name: String,
    pub offset: Box<Expr>,
    pub args: Vec<Expr>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Throw {
    pub name: String,
    pub args: Vec<Expr>,
    pub at: SourceSpan,
}

/// `@` is the sentinel in §3's `StructInitializer` meaning "use this
/// member's declared default".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StructInitArg {
    Expr(Expr),
    Default,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StructInitializer {
    pub struct_name: String,
    pub args: Vec<StructInitArg>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterfaceCallKind {
    Create,
    Create2,
    Call,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InterfaceCall {
    pub kind: InterfaceCallKind,
    pub attempt: bool,
    pub name: String,
    pub method: Option<String>,
    pub args: Vec<Expr>,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub filename: Rc<str>,
    pub line: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberIdentifier {
    pub base: String,
    /// Cast type applied before reading, e.g. `(addr as address)->balance`.
    pub cast: Option<String>,
    pub member: String,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CallDataIdentifier {
    pub member: String,
    /// `true` for the `&calldata.foo` offset-of form.
    pub by_ref: bool,
    pub at: SourceSpan,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Identifier {
    pub value: String,
    /// Set for macro-substituted identifiers during expansion, so a second
    /// substitution pass inside nested macro calls knows it may rewrite
    /// this leaf again.
    pub replaceable: bool,
}

impl Identifier {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            replaceable: false,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Literal),
    Identifier(Identifier),
    MemberIdentifier(MemberIdentifier),
    CallDataIdentifier(CallDataIdentifier),
    FunctionCall(FunctionCall),
    InterfaceCall(InterfaceCall),
    StructInitializer(StructInitializer),
}

impl Expr {
    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier(Identifier::new(name))
    }

    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Expr>, filename: Rc<str>, line: u32) -> Self {
        Self::FunctionCall(FunctionCall {
            name: name.into(),
            args,
            filename,
            line,
        })
    }

    #[must_use]
    pub fn literal(lit: Literal) -> Self {
        Self::Literal(lit)
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(l) => Some(l),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    Block(Block),
    Pragma(Pragma),
    Fold(Fold),
    Include(IncludeCall),
    Enum(EnumDecl),
    StructDefinition(StructDefinition),
    Interface(Interface),
    Contract(Contract),
    ObjectBlock(ObjectBlock),
    CodeBlock(CodeBlock),
    ConstructorDecl(ConstructorDecl),
    ConstructorDef(ConstructorDef),
    MethodDecl(MethodDecl),
    MethodDef(MethodDef),
    EventDecl(EventDecl),
    ErrorDecl(ErrorDecl),
    DataValue(DataValue),
    MacroConstant(MacroConstant),
    MacroDefinition(MacroDefinition),
    FunctionDef(FunctionDef),
    VariableDeclaration(VariableDeclaration),
    ConstDeclaration(ConstDeclaration),
    Assignment(Assignment),
    MemberAssignment(MemberAssignment),
    If(If),
    Switch(Switch),
    ForLoop(ForLoop),
    While(While),
    DoWhile(DoWhile),
    Break,
    Continue,
    Leave,
    Emit(Emit),
    Throw(Throw),
    /// A bare expression statement, e.g. `stop()` or `method.select()`.
    Expr(Expr),
}

/// Per-item ABI-relevant documentation collected during parsing, consumed by
/// the ABI collector when rendering Solidity-interface stubs (§4.6,
/// SPEC_FULL §3).
pub type DocMap = IndexMap<String, String>;
