mod decl;
mod expr;
mod stmt;

pub use decl::{
    Decl, DeclKind, DeclTable, EnumCase, EnumDecl, FieldDecl, FunctionDecl, FunctionKind,
    FunctionTemplateDecl, GenericParamDecl, ImportDecl, ParamDecl, TypeDecl, TypeTag,
    TypeTemplateDecl, VarDecl,
};
pub use expr::{Argument, BinaryOp, CallExpr, Expr, ExprKind, UnaryOp};
pub use stmt::{Stmt, StmtKind, SwitchCase};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

impl DeclId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

impl ModuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Hands out fresh expression/statement node ids. The parser owns one per
/// compilation; generic instantiation draws from the same generator so cloned
/// bodies get ids distinct from their templates.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}
