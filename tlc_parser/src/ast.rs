//! The TL abstract syntax tree.
//!
//! The tree is owned top to bottom (`Vec`/`Box`); nothing here borrows from
//! the source text or the token stream, so a `Program` can outlive the
//! lexer/parser that built it and is dropped exactly once, by ordinary
//! `Drop`, with no paired destroy call.

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// The closed set of TL data types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Array(Box<DataType>),
    Void,
    /// The type of the `null` literal; assignable to anything, promoted to
    /// the target type on use.
    Null,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Bool => write!(f, "bool"),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::String => write!(f, "string"),
            DataType::Array(elem) => write!(f, "{elem}[]"),
            DataType::Void => write!(f, "void"),
            DataType::Null => write!(f, "null"),
        }
    }
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float | DataType::Double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// An expression. Every variant carries the span of the whole expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLit {
        value: i64,
        span: Span,
    },
    FloatLit {
        value: f64,
        span: Span,
    },
    BoolLit {
        value: bool,
        span: Span,
    },
    StringLit {
        value: String,
        span: Span,
    },
    NullLit {
        span: Span,
    },
    Variable {
        name: String,
        span: Span,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `name(args...)`. Whether `name` resolves to a user function, a
    /// built-in, or nothing at all is decided during semantic analysis,
    /// not here.
    Call {
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// `( expr )`, kept distinct from its inner expression so diagnostics
    /// and the `--ast` dump can show the source grouping.
    Group {
        inner: Box<Expr>,
        span: Span,
    },
    /// `base[index]`. Whether this indexes an array or a string is a
    /// typing concern resolved against `base`'s declared type, not a
    /// syntactic one — TL has one index expression, not two.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::NullLit { span }
            | Expr::Variable { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Group { span, .. }
            | Expr::Index { span, .. } => *span,
        }
    }
}

/// An inline-assembly output or input operand: `"constraint"(expr)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsmOperand {
    pub constraint: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineAsm {
    pub code: String,
    pub volatile: bool,
    pub outputs: Vec<AsmOperand>,
    pub inputs: Vec<AsmOperand>,
    pub clobbers: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
}

/// A statement. Carries a span except for `Block`, whose position is the
/// span of its first statement (or a dummy span for an empty block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    VarDecl {
        name: String,
        ty: DataType,
        init: Option<Expr>,
        span: Span,
    },
    ArrayDecl {
        name: String,
        elem_ty: DataType,
        size: i64,
        /// A single expression broadcast to every element, per the array
        /// initializer semantics recorded in DESIGN.md.
        init: Option<Expr>,
        span: Span,
    },
    Assign {
        name: String,
        value: Expr,
        span: Span,
    },
    IndexAssign {
        base: Expr,
        index: Expr,
        value: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Print {
        args: Vec<Expr>,
        span: Span,
    },
    Include {
        path: String,
        is_system: bool,
        span: Span,
    },
    Block {
        stmts: Vec<Stmt>,
        span: Span,
    },
    InlineAsm(InlineAsm),
}

impl Stmt {
    /// Whether this statement unconditionally transfers control out of the
    /// enclosing block (used to suppress spurious unreachable-code
    /// warnings and to elide redundant jumps in the IR builder).
    pub fn always_returns(&self) -> bool {
        match self {
            Stmt::Return { .. } => true,
            Stmt::Block { stmts, .. } => stmts.last().is_some_and(Stmt::always_returns),
            Stmt::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => then_branch.always_returns() && else_branch.always_returns(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: DataType,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// `true` for a header-only declaration (`... -> T;`, no body); used by
    /// the module resolver, never seen by the semantic analyzer as a
    /// callable body.
    pub is_declaration_only: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfiFunction {
    pub name: String,
    pub library: String,
    pub calling_convention: String,
    pub params: Vec<Param>,
    pub return_type: DataType,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeDirective {
    pub path: String,
    pub is_system: bool,
    pub span: Span,
}

/// A single parsed compilation unit. The module resolver concatenates
/// several of these (per §1, full module linkage is a non-goal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    pub includes: Vec<IncludeDirective>,
    pub ffi_functions: Vec<FfiFunction>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}
