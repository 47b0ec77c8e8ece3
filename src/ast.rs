//! The abstract syntax tree produced by the parser (spec §3, §4.4).
//!
//! Every [`Expr`] carries its resolved `CType` and an `is_lvalue` flag,
//! computed as the expression is built rather than in a separate pass —
//! there is no untyped AST stage in this crate.

use crate::ctype::CType;
use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    AddrOf,
    Deref,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&&" => BinaryOp::LogAnd,
            "||" => BinaryOp::LogOr,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    /// Whether this operator is one of the relational/equality comparisons
    /// `gen_condition` can lower directly to a `CJump` (spec §6.3).
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    CharLiteral(i8),
    StringLiteral(String),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs OP= rhs`, desugared at codegen time to `lhs = lhs OP rhs` with a
    /// single evaluation of `lhs`'s address (spec §4.4).
    CompoundAssign {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    FieldSelect {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    ArrayIndex {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
    },
    Sizeof {
        operand: Option<Box<Expr>>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub typ: CType,
    pub is_lvalue: bool,
    pub loc: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, typ: CType, is_lvalue: bool, loc: SourceLocation) -> Self {
        Expr {
            kind,
            typ,
            is_lvalue,
            loc,
        }
    }

    pub fn literal_int(value: i64, loc: SourceLocation) -> Self {
        Expr::new(ExprKind::IntLiteral(value), CType::int(), false, loc)
    }

    /// Build a typed `lhs OP rhs` node directly from operator text, used by
    /// callers (e.g. implicit enum-constant values) that do not go through
    /// the Pratt parser's precedence climbing.
    pub fn binop(lhs: Expr, op: &str, rhs: Expr, loc: SourceLocation) -> Self {
        let op = BinaryOp::from_text(op).expect("known operator text");
        let typ = lhs.typ.clone();
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            typ,
            false,
            loc,
        )
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Decl(Vec<LocalDecl>),
    Compound(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    /// Recognized but not lowered (spec §4.5 Open Question: `switch`/`goto`
    /// stay unimplemented).
    Goto {
        label: String,
        loc: SourceLocation,
    },
    Labeled {
        label: String,
        stmt: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        body: Box<Stmt>,
        loc: SourceLocation,
    },
    Empty,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub ty: CType,
    pub init: Option<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: CType,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub body: Stmt,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub name: String,
    pub ty: CType,
    pub init: Option<Expr>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum ExternalDecl {
    Function(FunctionDef),
    FunctionPrototype { name: String, ty: CType, loc: SourceLocation },
    Global(GlobalVar),
    /// Tag and typedef declarations with no associated code (e.g. a bare
    /// `struct foo { ... };` or `typedef ...;` at file scope).
    Noop,
}

#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    pub decls: Vec<ExternalDecl>,
}
