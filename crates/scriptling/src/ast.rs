//! The abstract syntax tree produced by the parser.
//!
//! Every statement and expression node carries the 1-indexed source line of
//! its first token so runtime errors and lint diagnostics can point at the
//! offending line.

use std::rc::Rc;

/// A parsed source file.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub line: u32,
    pub node: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    /// `a = b = value` keeps every target; plain assignment has one.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    If {
        /// `(condition, suite)` for the `if` and each `elif`, in order.
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    FuncDef(Rc<FuncDef>),
    ClassDef {
        name: String,
        base: Option<Expr>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
    Import {
        /// Dotted module path, e.g. `scriptling.mcp.tool`.
        module: String,
        alias: Option<String>,
    },
    FromImport {
        module: String,
        /// `(name, alias)` pairs.
        names: Vec<(String, Option<String>)>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        finally: Vec<Stmt>,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    With {
        context: Expr,
        alias: Option<String>,
        body: Vec<Stmt>,
    },
}

/// One `except` clause. `exc` is `None` for a bare `except:`.
#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub exc: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// A `def` or `lambda`. Lambdas have a synthesized single-`Return` body.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<ParamSpec>,
    /// `*args` parameter name, if declared.
    pub vararg: Option<String>,
    /// `**kwargs` parameter name, if declared.
    pub kwarg: Option<String>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    /// Default expression, evaluated once at `def` time.
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub line: u32,
    pub node: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    NoneLit,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    FString(Vec<FStringPart>),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Bool {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Left-chained comparison: `a < b <= c` keeps `a` and `[(Lt, b), (LtEq, c)]`.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    /// `body if test else orelse`.
    Cond {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda(Rc<FuncDef>),
    Call {
        func: Box<Expr>,
        args: Vec<CallArg>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Index>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    ListComp {
        elt: Box<Expr>,
        clauses: Vec<CompClause>,
    },
    SetComp {
        elt: Box<Expr>,
        clauses: Vec<CompClause>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<CompClause>,
    },
}

#[derive(Debug, Clone)]
pub enum Index {
    Single(Expr),
    Slice {
        start: Option<Expr>,
        stop: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub enum CallArg {
    Pos(Expr),
    Keyword(String, Expr),
    /// `*expr` spread.
    Star(Expr),
    /// `**expr` spread.
    DoubleStar(Expr),
}

/// One `for target in iter [if cond]*` clause of a comprehension.
#[derive(Debug, Clone)]
pub struct CompClause {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Expr {
        expr: Expr,
        /// `!r` requests repr conversion.
        conversion: Option<char>,
        /// Raw format spec after `:`, e.g. `.2f` or `>8`.
        format: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "//")]
    FloorDiv,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CmpOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtEq,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
}
