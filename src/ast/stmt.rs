use crate::ast::{DeclId, Expr, NodeId, NodeIdGen};
use crate::diag::Span;

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Return {
        value: Option<Expr>,
    },
    /// A local variable declaration; the binding lives in the decl table.
    Var {
        decl: DeclId,
    },
    Increment {
        operand: Expr,
    },
    Decrement {
        operand: Expr,
    },
    Expr {
        expr: Expr,
    },
    Defer {
        expr: Expr,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Switch {
        condition: Expr,
        cases: Vec<SwitchCase>,
        default_stmts: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    /// `for <binding> in <range>`; the binding is a var decl typed by the
    /// range's element type during checking.
    For {
        binding: DeclId,
        range: Expr,
        body: Vec<Stmt>,
    },
    Break,
    /// Plain or compound assignment; compound forms arrive pre-desugared as
    /// `lhs = lhs op rhs` with the flag set.
    Assign {
        lhs: Expr,
        rhs: Expr,
        compound: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(id_gen: &mut NodeIdGen, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: id_gen.next(),
            kind,
            span,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return { .. })
    }

    pub fn is_break(&self) -> bool {
        matches!(self.kind, StmtKind::Break)
    }
}
