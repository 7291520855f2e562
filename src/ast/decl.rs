use std::rc::Rc;

use crate::ast::{DeclId, Expr, ModuleId, Stmt};
use crate::diag::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Struct,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Method,
    Init,
    Deinit,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub ty: Option<Type>,
    pub initializer: Option<Expr>,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub kind: FunctionKind,
    /// The receiver type decl for methods, initializers, and deinitializers.
    pub receiver: Option<DeclId>,
    pub params: Vec<DeclId>,
    pub return_type: Type,
    pub body: Option<Vec<Stmt>>,
    pub mutating: bool,
    pub variadic: bool,
    pub is_extern: bool,
    pub asm_label: Option<String>,
}

impl FunctionDecl {
    pub fn is_member(&self) -> bool {
        self.receiver.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GenericParamDecl {
    /// Name of the interface the argument must implement, if constrained.
    pub constraint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionTemplateDecl {
    pub generic_params: Vec<DeclId>,
    pub function: DeclId,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub tag: TypeTag,
    pub fields: Vec<DeclId>,
    pub methods: Vec<DeclId>,
    pub generic_params: Vec<DeclId>,
    /// Concrete generic-argument bindings for instantiated clones of a type
    /// template; empty on plain declarations and on templates themselves.
    pub generic_args: Vec<Type>,
    /// Whether values of this type are passed by value at call boundaries.
    pub pass_by_value: bool,
    pub interface: bool,
}

impl TypeDecl {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TypeTemplateDecl {
    pub generic_params: Vec<DeclId>,
    pub type_decl: DeclId,
}

#[derive(Debug, Clone)]
pub struct EnumCase {
    pub name: String,
    pub value: i128,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub cases: Vec<EnumCase>,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub target: String,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Var(VarDecl),
    Param(ParamDecl),
    Field(FieldDecl),
    Function(FunctionDecl),
    GenericParam(GenericParamDecl),
    FunctionTemplate(FunctionTemplateDecl),
    Type(TypeDecl),
    TypeTemplate(TypeTemplateDecl),
    Enum(EnumDecl),
    Import(ImportDecl),
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub id: DeclId,
    pub name: String,
    pub module: ModuleId,
    pub span: Span,
    pub kind: DeclKind,
}

impl Decl {
    pub fn is_var(&self) -> bool {
        matches!(self.kind, DeclKind::Var(_))
    }

    pub fn is_param(&self) -> bool {
        matches!(self.kind, DeclKind::Param(_))
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, DeclKind::Field(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, DeclKind::Function(_))
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Type(_))
    }

    pub fn as_var(&self) -> Option<&VarDecl> {
        match &self.kind {
            DeclKind::Var(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_param(&self) -> Option<&ParamDecl> {
        match &self.kind {
            DeclKind::Param(param) => Some(param),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDecl> {
        match &self.kind {
            DeclKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeDecl> {
        match &self.kind {
            DeclKind::Type(type_decl) => Some(type_decl),
            _ => None,
        }
    }

    pub fn as_function_template(&self) -> Option<&FunctionTemplateDecl> {
        match &self.kind {
            DeclKind::FunctionTemplate(template) => Some(template),
            _ => None,
        }
    }

    pub fn as_type_template(&self) -> Option<&TypeTemplateDecl> {
        match &self.kind {
            DeclKind::TypeTemplate(template) => Some(template),
            _ => None,
        }
    }

    pub fn as_generic_param(&self) -> Option<&GenericParamDecl> {
        match &self.kind {
            DeclKind::GenericParam(param) => Some(param),
            _ => None,
        }
    }
}

/// Owns every declaration of a compilation, addressed by `DeclId`. Decls are
/// immutable once added; analysis results live in side tables. `Rc` lets the
/// analyzer hold a decl's body while mutating the table (lazy instantiation
/// appends new decls mid-check).
#[derive(Debug, Default)]
pub struct DeclTable {
    decls: Vec<Rc<Decl>>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, module: ModuleId, kind: DeclKind) -> DeclId {
        self.add_spanned(name, module, kind, Span::default())
    }

    pub fn add_spanned(
        &mut self,
        name: impl Into<String>,
        module: ModuleId,
        kind: DeclKind,
        span: Span,
    ) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Rc::new(Decl {
            id,
            name: name.into(),
            module,
            span,
            kind,
        }));
        id
    }

    pub fn get(&self, id: DeclId) -> &Rc<Decl> {
        &self.decls[id.index()]
    }

    /// Reserves an id before the decl's contents exist, for declarations that
    /// participate in reference cycles (a type decl lists its members, and
    /// each member names the type decl as its receiver). The reserved decl
    /// must be completed with `set_kind` before anyone reads it.
    pub fn add_reserved(&mut self, name: impl Into<String>, module: ModuleId) -> DeclId {
        self.add(
            name,
            module,
            DeclKind::Type(TypeDecl {
                tag: TypeTag::Struct,
                fields: Vec::new(),
                methods: Vec::new(),
                generic_params: Vec::new(),
                generic_args: Vec::new(),
                pass_by_value: false,
                interface: false,
            }),
        )
    }

    pub fn set_kind(&mut self, id: DeclId, kind: DeclKind) {
        let decl = Rc::get_mut(&mut self.decls[id.index()])
            .expect("decl completed after its id escaped");
        decl.kind = kind;
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
