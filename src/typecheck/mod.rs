mod call;
mod convert;
mod errors;
mod expr;
mod instantiate;
mod stmt;

pub use convert::Convertibility;
pub use errors::{TypeCheckError, TypeCheckErrorKind};

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::ast::{
    DeclId, DeclKind, FunctionKind, NodeId, ParamDecl, Stmt, TypeDecl,
};
use crate::context::{FileRef, Session};
use crate::diag::Span;
use crate::mangle::mangle_function;
use crate::types::Type;

use errors::TypeCheckErrorKind as TEK;

/// The facts recorded for a resolved call site.
#[derive(Debug, Clone)]
pub struct ResolvedCallee {
    pub decl: DeclId,
    pub generic_args: Vec<Type>,
    pub receiver_type: Option<Type>,
    pub mangled_name: String,
}

/// Analysis results for one checked compilation: every expression's type,
/// every call site's resolved callee, every variable reference's declaration,
/// and the inferred types of bindings. Consumed by the IR generator.
#[derive(Debug, Default)]
pub struct TypeCheckedContext {
    pub expr_types: HashMap<NodeId, Type>,
    pub callees: HashMap<NodeId, ResolvedCallee>,
    pub var_decls: HashMap<NodeId, DeclId>,
    pub binding_types: HashMap<DeclId, Type>,
}

impl TypeCheckedContext {
    /// The checked type of an expression. Missing entries are a compiler bug:
    /// the analyzer visits every expression before IR generation starts.
    pub fn expr_type(&self, id: NodeId) -> &Type {
        self.expr_types
            .get(&id)
            .unwrap_or_else(|| panic!("missing checked type for {id}"))
    }

    pub fn callee(&self, id: NodeId) -> Option<&ResolvedCallee> {
        self.callees.get(&id)
    }

    pub fn var_decl(&self, id: NodeId) -> DeclId {
        *self
            .var_decls
            .get(&id)
            .unwrap_or_else(|| panic!("missing resolved decl for {id}"))
    }

    /// The effective type of a binding: recorded during checking for vars,
    /// loop counters, and params.
    pub fn binding_type(&self, decl: DeclId) -> &Type {
        self.binding_types
            .get(&decl)
            .unwrap_or_else(|| panic!("missing binding type for {decl}"))
    }
}

/// Type-checks every top-level declaration of `file`, then drains the
/// deferred-work queue (lazily instantiated generics) to a fixed point.
pub fn type_check(
    session: &mut Session,
    file: FileRef,
) -> Result<TypeCheckedContext, TypeCheckError> {
    let mut sema = Sema::new(session, file);
    sema.typecheck_module()?;
    Ok(sema.tables)
}

pub(crate) struct Sema<'a> {
    pub(crate) session: &'a mut Session,
    pub(crate) file: FileRef,
    pub(crate) tables: TypeCheckedContext,
    pub(crate) moved: HashSet<DeclId>,
    /// Innermost-last stack of local scopes (params, locals, loop bindings,
    /// `this`, implicit fields).
    scopes: Vec<IndexMap<String, DeclId>>,
    /// Freshly created generic instantiations awaiting a check of their own.
    pub(crate) decls_to_typecheck: VecDeque<DeclId>,
    /// Function-template instantiation cache, keyed by generic arguments.
    pub(crate) function_insts: HashMap<(DeclId, Vec<Type>), DeclId>,
    current_function: Option<DeclId>,
    checked: HashSet<DeclId>,
}

impl<'a> Sema<'a> {
    fn new(session: &'a mut Session, file: FileRef) -> Self {
        Self {
            session,
            file,
            tables: TypeCheckedContext::default(),
            moved: HashSet::new(),
            scopes: Vec::new(),
            decls_to_typecheck: VecDeque::new(),
            function_insts: HashMap::new(),
            current_function: None,
            checked: HashSet::new(),
        }
    }

    pub(crate) fn typecheck_module(&mut self) -> Result<(), TypeCheckError> {
        let top_level = self.session.file(self.file).decls.clone();
        for decl_id in top_level {
            self.typecheck_decl(decl_id)?;
        }
        while let Some(decl_id) = self.decls_to_typecheck.pop_front() {
            self.typecheck_decl(decl_id)?;
        }
        Ok(())
    }

    pub(crate) fn typecheck_decl(&mut self, decl_id: DeclId) -> Result<(), TypeCheckError> {
        if !self.checked.insert(decl_id) {
            return Ok(());
        }
        let decl = self.session.decl(decl_id);
        match &decl.kind {
            DeclKind::Function(func) => self.typecheck_function_decl(decl_id, func),
            DeclKind::Type(type_decl) => self.typecheck_type_decl(type_decl),
            DeclKind::Var(_) => self.typecheck_var_decl(decl_id),
            // Templates are checked per instantiation.
            DeclKind::FunctionTemplate(_) | DeclKind::TypeTemplate(_) => Ok(()),
            DeclKind::Enum(_) | DeclKind::Import(_) => Ok(()),
            DeclKind::Param(_) | DeclKind::Field(_) | DeclKind::GenericParam(_) => Ok(()),
        }
    }

    fn typecheck_function_decl(
        &mut self,
        decl_id: DeclId,
        func: &crate::ast::FunctionDecl,
    ) -> Result<(), TypeCheckError> {
        let previous_function = self.current_function.replace(decl_id);
        self.push_scope();

        if let Some(receiver) = func.receiver {
            let receiver_decl = self.session.decl(receiver);
            // A generic receiver means this is a template member; its
            // instantiations are checked instead.
            if receiver_decl
                .as_type()
                .is_some_and(|type_decl| type_decl.is_generic())
            {
                self.pop_scope();
                self.current_function = previous_function;
                return Ok(());
            }

            let this_mutable = func.mutating || matches!(func.kind, FunctionKind::Init | FunctionKind::Deinit);
            let this_type = self.type_decl_self_type(receiver).with_mutability(this_mutable);
            let this_decl = self.session.decl_table.add(
                "this",
                receiver_decl.module,
                DeclKind::Param(ParamDecl { ty: this_type }),
            );
            self.insert_binding("this", this_decl);

            // Fields are in scope unqualified inside member functions.
            if let Some(type_decl) = receiver_decl.as_type() {
                for &field in &type_decl.fields {
                    let name = self.session.decl(field).name.clone();
                    self.insert_binding(name, field);
                }
            }
        }

        for &param in &func.params {
            let decl = self.session.decl(param);
            let ty = decl.as_param().expect("function param decl").ty.clone();
            self.tables.binding_types.insert(param, ty);
            self.insert_binding(decl.name.clone(), param);
        }

        if let Some(body) = &func.body {
            self.typecheck_stmts(body)?;
        }

        self.pop_scope();
        self.current_function = previous_function;
        Ok(())
    }

    fn typecheck_type_decl(&mut self, type_decl: &TypeDecl) -> Result<(), TypeCheckError> {
        if type_decl.is_generic() {
            return Ok(());
        }
        for &method in &type_decl.methods {
            self.typecheck_decl(method)?;
        }
        Ok(())
    }

    fn typecheck_var_decl(&mut self, decl_id: DeclId) -> Result<(), TypeCheckError> {
        self.typecheck_var_binding(decl_id)
    }

    pub(crate) fn typecheck_stmts(&mut self, stmts: &[Stmt]) -> Result<(), TypeCheckError> {
        self.push_scope();
        for stmt in stmts {
            self.typecheck_stmt(stmt)?;
        }
        self.pop_scope();
        Ok(())
    }

    // Scope management

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn insert_binding(&mut self, name: impl Into<String>, decl: DeclId) {
        self.scopes
            .last_mut()
            .expect("binding inserted outside any scope")
            .insert(name.into(), decl);
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Resolves an identifier: local scopes innermost-first, then the file's
    /// module and its imports.
    pub(crate) fn find_decl(&self, name: &str, span: Span) -> Result<DeclId, TypeCheckError> {
        if let Some(decl) = self.lookup_local(name) {
            return Ok(decl);
        }
        let decls = self.session.find_decls(self.file, name);
        decls
            .first()
            .copied()
            .ok_or_else(|| TEK::UnknownIdentifier(name.to_string()).at(span))
    }

    // Declaration type queries

    pub(crate) fn current_function_decl(&self) -> Option<std::rc::Rc<crate::ast::Decl>> {
        self.current_function.map(|id| self.session.decl(id))
    }

    pub(crate) fn in_init_or_deinit(&self) -> bool {
        self.current_function_decl()
            .and_then(|decl| decl.as_function().map(|f| f.kind))
            .is_some_and(|kind| matches!(kind, FunctionKind::Init | FunctionKind::Deinit))
    }

    pub(crate) fn in_mutating_function(&self) -> bool {
        self.current_function_decl()
            .and_then(|decl| decl.as_function().map(|f| f.mutating))
            .unwrap_or(false)
    }

    pub(crate) fn current_return_type(&self) -> Option<Type> {
        self.current_function_decl()
            .and_then(|decl| decl.as_function().map(|f| f.return_type.clone()))
    }

    /// The nominal type a type declaration introduces. Instantiated clones
    /// carry their concrete bindings; templates expose their parameters as
    /// type names.
    pub(crate) fn type_decl_self_type(&self, decl_id: DeclId) -> Type {
        let decl = self.session.decl(decl_id);
        let type_decl = decl.as_type().expect("self type of non-type decl");
        let generic_args = if !type_decl.generic_args.is_empty() {
            type_decl.generic_args.clone()
        } else {
            type_decl
                .generic_params
                .iter()
                .map(|&param| Type::basic(self.session.decl(param).name.clone()))
                .collect()
        };
        Type::Basic {
            name: decl.name.clone(),
            generic_args,
            mutable: false,
        }
    }

    /// The signature type of a function declaration.
    pub(crate) fn function_type(&self, decl_id: DeclId) -> Type {
        let decl = self.session.decl(decl_id);
        let func = decl.as_function().expect("function type of non-function");
        let param_types = func
            .params
            .iter()
            .map(|&param| self.session.decl(param).as_param().unwrap().ty.clone())
            .collect();
        Type::function(func.return_type.clone(), param_types)
    }

    pub(crate) fn param_type(&self, decl_id: DeclId) -> Type {
        self.session
            .decl(decl_id)
            .as_param()
            .expect("param decl")
            .ty
            .clone()
    }

    /// Computes the canonical mangled name for a resolved callee.
    pub(crate) fn mangled_callee_name(&self, decl_id: DeclId, generic_args: &[Type]) -> String {
        let decl = self.session.decl(decl_id);
        let Some(func) = decl.as_function() else {
            return decl.name.clone();
        };
        let param_types: Vec<Type> = func
            .params
            .iter()
            .map(|&param| self.param_type(param))
            .collect();
        let (receiver_name, receiver_args) = match func.receiver {
            Some(receiver) => {
                let receiver_decl = self.session.decl(receiver);
                let args = receiver_decl
                    .as_type()
                    .map(|t| t.generic_args.clone())
                    .unwrap_or_default();
                (Some(receiver_decl.name.clone()), args)
            }
            None => (None, Vec::new()),
        };
        if func.kind == FunctionKind::Deinit {
            let receiver_name = receiver_name.as_deref().unwrap_or(&decl.name);
            return crate::mangle::mangle_deinit(receiver_name, &receiver_args);
        }
        // An initializer's generic arguments are its type's; they already
        // live on the receiver side of the mangle.
        let (name, generic_args) = match func.kind {
            FunctionKind::Init => ("init", &[][..]),
            _ => (decl.name.as_str(), generic_args),
        };
        mangle_function(
            receiver_name.as_deref(),
            &receiver_args,
            name,
            generic_args,
            &param_types,
        )
    }

    /// Finds the type declaration behind a basic type, instantiating type
    /// templates on demand for generic instantiations like `Box<int>`.
    pub(crate) fn type_decl_for(&mut self, ty: &Type) -> Result<Option<DeclId>, TypeCheckError> {
        let Type::Basic {
            name, generic_args, ..
        } = ty
        else {
            return Ok(None);
        };
        if !generic_args.is_empty() {
            let mangled = crate::mangle::mangle_type(name, generic_args);
            if let Some(&existing) = self.session.find_decls_everywhere(&mangled).first() {
                return Ok(Some(existing));
            }
            let candidates = self.session.find_decls(self.file, name);
            for candidate in candidates {
                if self.session.decl(candidate).as_type_template().is_some() {
                    let instantiated = self.instantiate_type_template(candidate, generic_args)?;
                    return Ok(Some(instantiated));
                }
            }
            return Ok(None);
        }
        let decls = self.session.find_decls(self.file, name);
        Ok(decls
            .into_iter()
            .find(|&id| self.session.decl(id).is_type()))
    }
}
