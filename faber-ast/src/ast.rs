//! Resolved Faber syntax tree
//!
//! The tree arrives from the upstream parser and resolver already type-correct.
//! Nodes are never mutated by the generators; the few rewrites they need
//! (filter predicates, for instance) work on clones.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// One compiled source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// Built-in type names of the Faber surface language
pub mod builtin {
    pub const TEXT: &str = "textus";
    pub const NUMBER: &str = "numerus";
    pub const FLOAT: &str = "fractus";
    pub const BOOL: &str = "bivalens";
    pub const VOID: &str = "vacuum";
    pub const NIL: &str = "nihil";
    pub const ANY: &str = "quodlibet";
    pub const UNKNOWN: &str = "ignotum";
    pub const LIST: &str = "lista";
    pub const MAP: &str = "tabula";
    pub const SET: &str = "copia";
    pub const BYTES: &str = "octeti";
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum TypeExpr {
    /// `textus`, `lista<numerus>`, user types
    Named {
        name: String,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    /// `T?`
    Nullable { inner: Box<TypeExpr> },
    /// `(A, B) -> R`
    Function {
        #[serde(default)]
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    /// `A | B`
    Union { members: Vec<TypeExpr> },
    /// A literal type such as `"ok"`
    Literal { value: String },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args,
        }
    }

    pub fn nullable(inner: TypeExpr) -> Self {
        TypeExpr::Nullable {
            inner: Box::new(inner),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeExpr::Named { name, args } if name == builtin::VOID && args.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    #[serde(default)]
    pub default: Option<Expr>,
    #[serde(default)]
    pub rest: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Option<TypeExpr>) -> Self {
        Param {
            name: name.into(),
            ty,
            default: None,
            rest: false,
        }
    }
}

/// `functio`, also used for methods and contract signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<TypeExpr>,
    /// `None` for abstract, external and contract members
    #[serde(default)]
    pub body: Option<Block>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_external: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    #[serde(default)]
    pub default: Option<Expr>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_static: bool,
}

/// `genus`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<FunctionDecl>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_abstract: bool,
    pub span: Span,
}

/// `pactum`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<String>,
    #[serde(default)]
    pub methods: Vec<FunctionDecl>,
    #[serde(default)]
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub value: Option<Expr>,
}

/// `ordo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    #[serde(default)]
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantField {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<VariantField>,
    pub span: Span,
}

fn default_tag_field() -> String {
    "tag".to_string()
}

/// `discretio`: a closed set of labelled variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionDecl {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<String>,
    /// Name of the discriminant field in backends that store the tag as data
    #[serde(default = "default_tag_field")]
    pub tag_field: String,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub is_public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportItem {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// `importa`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub source: String,
    #[serde(default)]
    pub items: Vec<ImportItem>,
    /// `importa * ut ns ex "..."`
    #[serde(default)]
    pub namespace: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// `fixum`
    Fixum,
    /// `varia`
    Varia,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    #[serde(default)]
    pub value: Option<Expr>,
    #[serde(default)]
    pub is_public: bool,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Block { stmts, span }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IterMode {
    /// `ex items fixum x`: iterate values
    #[default]
    Values,
    /// `de items fixum k`: iterate keys
    Keys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintLevel {
    /// `scribe`
    #[default]
    Log,
    /// `vide`
    Debug,
    /// `mone`
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardClause {
    pub cond: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub binding: String,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Pattern {
    /// `casu Circle(radius)`
    Variant {
        name: String,
        #[serde(default)]
        bindings: Vec<String>,
    },
    /// `ceterum`
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
    pub span: Span,
}

/// `discerne`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStmt {
    pub subject: Expr,
    /// Union the subject resolved to
    #[serde(default)]
    pub union: Option<String>,
    pub arms: Vec<MatchArm>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocatorKind {
    Arena,
    Page,
}

impl AllocatorKind {
    pub fn keyword(self) -> &'static str {
        match self {
            AllocatorKind::Arena => "arena",
            AllocatorKind::Page => "pagina",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Resource {
    /// `cura arena fixum alloc { ... }`
    Allocator { kind: AllocatorKind },
    /// `cura aperi(path) fixum fh { ... }`
    Value {
        init: Expr,
        /// Release method invoked on scope exit, `close` when absent
        #[serde(default)]
        release: Option<String>,
    },
}

/// `cura`: a resource bound for the extent of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeStmt {
    pub resource: Resource,
    #[serde(default)]
    pub binding: Option<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Stmt {
    Block(Block),
    Expr {
        expr: Expr,
        span: Span,
    },
    Var(VarDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    Union(UnionDecl),
    TypeAlias {
        name: String,
        #[serde(default)]
        generics: Vec<String>,
        ty: TypeExpr,
        #[serde(default)]
        is_public: bool,
        span: Span,
    },
    Import(ImportDecl),
    /// `si`; `otherwise` holds either a block or a nested `If`
    If {
        cond: Expr,
        then: Block,
        #[serde(default)]
        otherwise: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    DoWhile {
        body: Block,
        cond: Expr,
        span: Span,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Block,
        #[serde(default)]
        mode: IterMode,
        #[serde(default)]
        is_async: bool,
        span: Span,
    },
    /// `elige`
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default: Option<Block>,
        span: Span,
    },
    Match(MatchStmt),
    /// `custodi`: early-exit clauses
    Guard {
        clauses: Vec<GuardClause>,
        span: Span,
    },
    Try {
        body: Block,
        #[serde(default)]
        catch: Option<CatchClause>,
        #[serde(default)]
        finally: Option<Block>,
        span: Span,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
        span: Span,
    },
    /// `iace`, or `mori` when fatal
    Throw {
        value: Expr,
        #[serde(default)]
        fatal: bool,
        span: Span,
    },
    Print {
        #[serde(default)]
        level: PrintLevel,
        args: Vec<Expr>,
        span: Span,
    },
    Assert {
        cond: Expr,
        #[serde(default)]
        message: Option<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    /// `incipit`, or `incipiet` when async
    Entry {
        body: Block,
        #[serde(default)]
        is_async: bool,
        span: Span,
    },
    Scope(ScopeStmt),
    /// `probandum`
    TestSuite {
        name: String,
        body: Vec<Stmt>,
        span: Span,
    },
    /// `proba`
    Test {
        name: String,
        body: Block,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(block) => block.span,
            Stmt::Var(decl) => decl.span,
            Stmt::Function(decl) => decl.span,
            Stmt::Class(decl) => decl.span,
            Stmt::Interface(decl) => decl.span,
            Stmt::Enum(decl) => decl.span,
            Stmt::Union(decl) => decl.span,
            Stmt::Import(decl) => decl.span,
            Stmt::Match(stmt) => stmt.span,
            Stmt::Scope(stmt) => stmt.span,
            Stmt::Expr { span, .. }
            | Stmt::TypeAlias { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Guard { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Print { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Entry { span, .. }
            | Stmt::TestSuite { span, .. }
            | Stmt::Test { span, .. } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Data-structure kind of a built-in method receiver, as resolved upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    /// `lista`
    Sequence,
    /// `tabula`
    Map,
    /// `copia`
    Set,
    /// `textus`, `numerus` and friends
    Scalar,
}

impl StructureKind {
    pub fn type_name(self) -> &'static str {
        match self {
            StructureKind::Sequence => builtin::LIST,
            StructureKind::Map => builtin::MAP,
            StructureKind::Set => builtin::SET,
            StructureKind::Scalar => builtin::TEXT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `et`
    And,
    /// `aut`
    Or,
    /// `vel`
    Coalesce,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitXor => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::Eq | BinaryOp::NotEq => 7,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 8,
            BinaryOp::Shl | BinaryOp::Shr => 9,
            BinaryOp::Add | BinaryOp::Sub => 10,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 11,
        }
    }

    /// Operator text shared by the C-family targets
    pub fn c_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `non`
    Not,
    Neg,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ClosureBody {
    Expr(Box<Expr>),
    Block(Block),
}

/// `clausura`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<TypeExpr>,
    pub body: ClosureBody,
    /// Explicit async marker; suspension points in the body also make it async
    #[serde(default)]
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionKind {
    /// `numeratum`
    Integer,
    /// `fractatum`
    Float,
    /// `textatum`
    Text,
    /// `bivalentum`
    Bool,
}

impl ConversionKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ConversionKind::Integer => "numeratum",
            ConversionKind::Float => "fractatum",
            ConversionKind::Text => "textatum",
            ConversionKind::Bool => "bivalentum",
        }
    }
}

/// Radix annotation on integer conversions, `numeratum<Hex>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Radix {
    Dec,
    Hex,
    Oct,
    Bin,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Dec => 10,
            Radix::Hex => 16,
            Radix::Oct => 8,
            Radix::Bin => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Radix::Dec => "Dec",
            Radix::Hex => "Hex",
            Radix::Oct => "Oct",
            Radix::Bin => "Bin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub expr: Box<Expr>,
    pub kind: ConversionKind,
    #[serde(default)]
    pub radix: Option<Radix>,
    /// `vel fallback`
    #[serde(default)]
    pub fallback: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FilterKind {
    /// `ubi <expr>`
    Condition(Box<Expr>),
    /// A bare boolean property of the element
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionFilter {
    #[serde(default)]
    pub negated: bool,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    /// `prima n`
    First,
    /// `ultima n`
    Last,
    /// `summa`
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTransform {
    pub kind: TransformKind,
    #[serde(default)]
    pub arg: Option<Box<Expr>>,
}

fn default_element() -> String {
    "item".to_string()
}

/// `ab source [non] ubi cond prima n`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub source: Box<Expr>,
    #[serde(default)]
    pub filter: Option<CollectionFilter>,
    #[serde(default)]
    pub transforms: Vec<CollectionTransform>,
    /// Binding used for the element in generated predicates
    #[serde(default = "default_element")]
    pub element: String,
    /// Identifiers in the predicate that resolve outside the element
    #[serde(default)]
    pub outer: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathConstant {
    Pi,
    Tau,
    Euler,
}

impl MathConstant {
    pub fn name(self) -> &'static str {
        match self {
            MathConstant::Pi => "PI",
            MathConstant::Tau => "TAU",
            MathConstant::Euler => "EULER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Expr {
    Ident {
        name: String,
        span: Span,
    },
    /// `ego`
    SelfRef {
        span: Span,
    },
    Literal {
        value: Literal,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    /// `cond sic a secus b`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        /// Set when the callee is a member of a built-in collection or scalar
        #[serde(default)]
        receiver: Option<StructureKind>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        name: String,
        #[serde(default)]
        optional: bool,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Array {
        #[serde(default)]
        elements: Vec<Expr>,
        span: Span,
    },
    Object {
        #[serde(default)]
        fields: Vec<ObjectField>,
        span: Span,
    },
    Closure(Closure),
    /// `novum Class(args)`
    New {
        class: String,
        #[serde(default)]
        args: Vec<Expr>,
        span: Span,
    },
    /// `finge Variant { field: value }`
    Construct {
        #[serde(default)]
        union: Option<String>,
        variant: String,
        #[serde(default)]
        fields: Vec<ObjectField>,
        span: Span,
    },
    /// `cede`: await, or yield inside a generator
    Await {
        operand: Box<Expr>,
        span: Span,
    },
    /// `qua`
    Cast {
        expr: Box<Expr>,
        ty: TypeExpr,
        span: Span,
    },
    /// `innatum`
    Native {
        expr: Box<Expr>,
        ty: TypeExpr,
        span: Span,
    },
    Convert(Conversion),
    /// `scriptum("§ and §1", a, b)`
    Format {
        template: String,
        #[serde(default)]
        args: Vec<Expr>,
        span: Span,
    },
    /// `start usque end` (inclusive) or `start ante end`
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        #[serde(default)]
        inclusive: bool,
        span: Span,
    },
    Filter(FilterExpr),
    /// `lege`, or `lege lineam` for a single line
    Read {
        #[serde(default)]
        line: bool,
        span: Span,
    },
    Constant {
        constant: MathConstant,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Closure(closure) => closure.span,
            Expr::Convert(conversion) => conversion.span,
            Expr::Filter(filter) => filter.span,
            Expr::Ident { span, .. }
            | Expr::SelfRef { span }
            | Expr::Literal { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::New { span, .. }
            | Expr::Construct { span, .. }
            | Expr::Await { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Native { span, .. }
            | Expr::Format { span, .. }
            | Expr::Range { span, .. }
            | Expr::Read { span, .. }
            | Expr::Constant { span, .. } => *span,
        }
    }

    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Expr::Ident {
            name: name.into(),
            span,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            _ => None,
        }
    }
}
