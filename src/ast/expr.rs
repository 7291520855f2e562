use std::fmt;

use crate::ast::{NodeId, NodeIdGen};
use crate::diag::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    Deref,
    AddrOf,
    BitNot,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
            UnaryOp::BitNot => "~",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    /// `..`, an exclusive range.
    RangeExcl,
    /// `...`, an inclusive range.
    RangeIncl,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_range(self) -> bool {
        matches!(self, BinaryOp::RangeExcl | BinaryOp::RangeIncl)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::RangeExcl => "..",
            BinaryOp::RangeIncl => "...",
        };
        write!(f, "{symbol}")
    }
}

/// A call argument: optionally labeled, owning its value expression.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

impl Argument {
    pub fn unnamed(value: Expr) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Argument>,
    pub generic_args: Vec<Type>,
}

impl CallExpr {
    /// The identifier a named call refers to.
    pub fn function_name(&self) -> &str {
        match &self.callee.kind {
            ExprKind::Var { name } => name,
            ExprKind::Member { member, .. } => member,
            _ => "(anonymous function)",
        }
    }

    pub fn calls_named_function(&self) -> bool {
        matches!(
            self.callee.kind,
            ExprKind::Var { .. } | ExprKind::Member { .. }
        )
    }

    /// The receiver expression. Meaningful only when the callee is a member
    /// access.
    pub fn receiver(&self) -> Option<&Expr> {
        match &self.callee.kind {
            ExprKind::Member { base, .. } => Some(base),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Var { name: String },
    StringLit { value: String },
    CharLit { value: char },
    IntLit { value: i128 },
    FloatLit { value: f64 },
    BoolLit { value: bool },
    NullLit,
    ArrayLit { elements: Vec<Expr> },
    TupleLit { elements: Vec<Expr> },
    Prefix { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call(CallExpr),
    Cast { target: Type, operand: Box<Expr> },
    Sizeof { target: Type },
    Member { base: Box<Expr>, member: String },
    Subscript { base: Box<Expr>, index: Box<Expr> },
    Unwrap { operand: Box<Expr> },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(id_gen: &mut NodeIdGen, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: id_gen.next(),
            kind,
            span,
        }
    }

    /// An expression is an lvalue iff its evaluation yields a storage
    /// location: variables, string and array literals, member accesses,
    /// subscripts, and pointer dereferences.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Var { .. }
            | ExprKind::StringLit { .. }
            | ExprKind::ArrayLit { .. }
            | ExprKind::Member { .. }
            | ExprKind::Subscript { .. } => true,
            ExprKind::Prefix { op, .. } => *op == UnaryOp::Deref,
            _ => false,
        }
    }

    pub fn is_int_literal(&self) -> bool {
        matches!(self.kind, ExprKind::IntLit { .. })
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::NullLit)
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match &self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }
}
