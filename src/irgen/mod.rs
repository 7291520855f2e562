//! Lowers the checked AST to SSA IR.
//!
//! The generator walks top-level declarations, materializing function
//! prototypes on demand at call sites, then repeatedly lowers the bodies of
//! pending instantiations until no new ones appear.

mod call;
mod errors;
mod expr;
mod stmt;
mod types;

pub use errors::{IrGenError, IrGenErrorKind};

use indexmap::IndexMap;

use crate::ast::{Decl, DeclId, DeclKind, Expr, ExprKind, FunctionKind};
use crate::context::{FileRef, Session};
use crate::diag::CompileError;
use crate::ir::{
    self, verify_function, verify_module, BlockId, FuncId, IrBuilder, IrType, ValueId,
};
use crate::irgen::errors::IrGenErrorKind as GEK;
use crate::mangle::{mangle_deinit, mangle_type};
use crate::typecheck::TypeCheckedContext;
use crate::types::Type;

/// A function the generator has created a prototype for, together with the
/// generic arguments its body must be lowered under.
#[derive(Debug, Clone)]
pub struct FunctionInstantiation {
    pub decl: DeclId,
    pub receiver_generic_args: Vec<Type>,
    pub generic_args: Vec<Type>,
    pub func: FuncId,
}

/// A lexical scope during lowering: local SSA bindings plus the work to emit
/// when the scope ends, in reverse order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope<'a> {
    locals: IndexMap<String, ValueId>,
    deferred_exprs: Vec<&'a Expr>,
    deinits_to_call: Vec<(FuncId, ValueId)>,
}

impl Scope<'_> {
    fn clear(&mut self) {
        self.deferred_exprs.clear();
        self.deinits_to_call.clear();
    }
}

pub struct IrGen<'a> {
    pub(crate) session: &'a Session,
    pub(crate) checked: &'a TypeCheckedContext,
    pub(crate) builder: IrBuilder,
    pub(crate) scopes: Vec<Scope<'a>>,
    /// Keyed by the parameter-name-extended mangled name, so overloads that
    /// differ only in parameter labels coexist.
    pub(crate) function_instantiations: IndexMap<String, FunctionInstantiation>,
    /// Lowered nominal types, keyed by mangled name.
    pub(crate) structs: IndexMap<String, DeclId>,
    /// Generic-parameter substitution for the lowering in progress.
    pub(crate) current_generic_args: IndexMap<String, IrType>,
    /// Innermost-last targets for `break`.
    pub(crate) break_targets: Vec<BlockId>,
}

/// Lowers every declaration of a checked file and returns the IR module.
pub fn generate(
    session: &Session,
    checked: &TypeCheckedContext,
    file: FileRef,
) -> Result<ir::Module, CompileError> {
    let mut gen = IrGen::new(session, checked);

    let top_level = session.file(file).decls.clone();
    for decl_id in top_level {
        gen.codegen_decl(decl_id)?;
    }
    gen.instantiation_fixpoint()?;

    let module = gen.builder.into_module();
    verify_module(&module)?;
    Ok(module)
}

impl<'a> IrGen<'a> {
    fn new(session: &'a Session, checked: &'a TypeCheckedContext) -> Self {
        Self {
            session,
            checked,
            builder: IrBuilder::new(),
            scopes: vec![Scope::default()],
            function_instantiations: IndexMap::new(),
            structs: IndexMap::new(),
            current_generic_args: IndexMap::new(),
            break_targets: Vec::new(),
        }
    }

    pub(crate) fn decl(&self, id: DeclId) -> &'a Decl {
        let session: &'a Session = self.session;
        session.decl_table.get(id).as_ref()
    }

    pub(crate) fn codegen_decl(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        match &decl.kind {
            DeclKind::Function(func) => match func.kind {
                FunctionKind::Init => self.codegen_init_decl(decl_id),
                _ => self.codegen_function_decl(decl_id),
            },
            DeclKind::Type(_) => self.codegen_type_decl(decl_id),
            DeclKind::Var(_) => self.codegen_global_var(decl_id),
            DeclKind::FunctionTemplate(_)
            | DeclKind::TypeTemplate(_)
            | DeclKind::Enum(_)
            | DeclKind::Import(_)
            | DeclKind::Param(_)
            | DeclKind::Field(_)
            | DeclKind::GenericParam(_) => Ok(()),
        }
    }

    fn codegen_function_decl(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("function decl");

        // Members of still-generic types are lowered per instantiation.
        if let Some(receiver) = func.receiver {
            if self
                .decl(receiver)
                .as_type()
                .is_some_and(|t| t.is_generic())
            {
                return Ok(());
            }
        }

        let func_id = self.function_proto(decl_id, &[])?;
        if !func.is_extern && func.body.is_some() {
            self.codegen_function_body(decl_id, func_id)?;
            verify_function(&self.builder.module, self.builder.module.func(func_id))
                .unwrap_or_else(|e| panic!("{e}"));
        }
        Ok(())
    }

    fn codegen_init_decl(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("init decl");
        let receiver = func.receiver.expect("initializer without receiver");
        if self
            .decl(receiver)
            .as_type()
            .is_some_and(|t| t.is_generic())
        {
            return Ok(());
        }

        let func_id = self.function_proto(decl_id, &[])?;
        self.codegen_init_body(decl_id, func_id)?;
        verify_function(&self.builder.module, self.builder.module.func(func_id))
            .unwrap_or_else(|e| panic!("{e}"));
        Ok(())
    }

    pub(crate) fn codegen_type_decl(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let type_decl = decl.as_type().expect("type decl");
        if type_decl.is_generic() {
            return Ok(());
        }
        let key = mangle_type(&decl.name, &type_decl.generic_args);
        if self.structs.contains_key(&key) {
            return Ok(());
        }

        let mut fields = Vec::with_capacity(type_decl.fields.len());
        for &field_id in &type_decl.fields {
            let ty = self.decl(field_id).as_field().unwrap().ty.clone();
            fields.push(self.to_ir(&ty)?);
        }
        self.builder.module.add_struct(key.clone(), fields);
        self.structs.insert(key, decl_id);

        let insert_point_backup = self.builder.insert_point();
        for &member in &type_decl.methods {
            self.codegen_decl(member)?;
        }
        match insert_point_backup {
            Some((func, block)) => self.builder.position_at_end(func, block),
            None => self.builder.clear_insert_point(),
        }
        Ok(())
    }

    fn codegen_global_var(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let var = decl.as_var().expect("var decl");

        // Immutable globals with constant initializers fold into their uses;
        // everything else gets storage.
        if !var.mutable && var.initializer.as_ref().is_some_and(is_constant_initializer) {
            return Ok(());
        }
        if self.builder.module.globals.contains_key(&decl.name) {
            return Ok(());
        }
        let ty = self.global_var_type(decl_id);
        let ir_ty = self.to_ir(&ty)?;
        self.builder.module.add_global(decl.name.clone(), ir_ty);
        Ok(())
    }

    fn global_var_type(&self, decl_id: DeclId) -> Type {
        if let Some(ty) = self.checked.binding_types.get(&decl_id) {
            return ty.clone();
        }
        self.decl(decl_id)
            .as_var()
            .and_then(|var| var.ty.clone())
            .expect("global var without a checked type")
    }

    /// Lowers bodies of pending instantiations until a pass adds nothing
    /// new; each freshly lowered function is verified.
    fn instantiation_fixpoint(&mut self) -> Result<(), IrGenError> {
        loop {
            let snapshot: Vec<FunctionInstantiation> =
                self.function_instantiations.values().cloned().collect();
            let before = self.function_instantiations.len();

            for inst in snapshot {
                if !self.builder.module.func(inst.func).is_empty() {
                    continue;
                }
                let decl = self.decl(inst.decl);
                let Some(func) = decl.as_function() else {
                    continue;
                };
                if func.is_extern || func.body.is_none() {
                    continue;
                }

                let previous_generic_args = std::mem::take(&mut self.current_generic_args);
                match func.kind {
                    FunctionKind::Init => self.codegen_init_body(inst.decl, inst.func)?,
                    _ => self.codegen_function_body(inst.decl, inst.func)?,
                }
                self.current_generic_args = previous_generic_args;

                verify_function(&self.builder.module, self.builder.module.func(inst.func))
                    .unwrap_or_else(|e| panic!("{e}"));
            }

            if self.function_instantiations.len() == before {
                return Ok(());
            }
        }
    }

    pub(crate) fn codegen_function_body(
        &mut self,
        decl_id: DeclId,
        func_id: FuncId,
    ) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("function decl");
        let body = func.body.as_ref().expect("body of bodiless function");

        let entry = self.builder.create_block(func_id);
        self.builder.position_at_end(func_id, entry);
        self.begin_scope();

        let mut next_param = 0u32;
        if func.is_member() {
            self.set_local_value(None, "this".to_string(), ValueId(next_param))?;
            next_param += 1;
        }
        for &param_id in &func.params {
            let param = self.decl(param_id);
            let ty = param.as_param().unwrap().ty.clone();
            self.set_local_value(Some(&ty), param.name.clone(), ValueId(next_param))?;
            next_param += 1;
        }

        for stmt in body {
            self.codegen_stmt(stmt)?;
            if stmt.is_return() || stmt.is_break() {
                break;
            }
        }
        self.end_scope()?;
        self.finish_function_body(func_id, entry)
    }

    /// An initializer allocates its receiver, runs the body against it, and
    /// returns the constructed aggregate.
    pub(crate) fn codegen_init_body(
        &mut self,
        decl_id: DeclId,
        func_id: FuncId,
    ) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("init decl");
        let receiver = func.receiver.expect("initializer without receiver");
        let body = func.body.as_ref().expect("bodiless initializer");

        let entry = self.builder.create_block(func_id);
        self.builder.position_at_end(func_id, entry);
        self.begin_scope();

        let self_type = self.type_decl_self_type(receiver);
        let struct_ty = self.to_ir(&self_type)?;
        let this = self.builder.entry_alloca(struct_ty, "this");
        self.set_local_value(None, "this".to_string(), this)?;

        for (index, &param_id) in func.params.iter().enumerate() {
            let param = self.decl(param_id);
            let ty = param.as_param().unwrap().ty.clone();
            self.set_local_value(Some(&ty), param.name.clone(), ValueId(index as u32))?;
        }

        for stmt in body {
            self.codegen_stmt(stmt)?;
        }
        self.end_scope()?;

        if !self.builder.has_terminator() {
            let result = self.builder.load(this);
            self.builder.ret(Some(result));
        }
        Ok(())
    }

    fn finish_function_body(&mut self, func_id: FuncId, entry: BlockId) -> Result<(), IrGenError> {
        if self.builder.has_terminator() {
            return Ok(());
        }
        let (_, current) = self.builder.insert_point().expect("active insertion point");

        // A fall-off block nothing branches to is dead.
        if current != entry && !self.block_has_predecessors(func_id, current) {
            self.builder.unreachable();
            return Ok(());
        }

        let ret_is_void = self.builder.module.func(func_id).ret_ty.is_void();
        if self.func_is_main(func_id) {
            let zero = self.builder.int_const(IrType::Int(32), 0);
            self.builder.ret(Some(zero));
        } else if ret_is_void {
            self.builder.ret(None);
        } else {
            self.builder.unreachable();
        }
        Ok(())
    }

    fn block_has_predecessors(&self, func_id: FuncId, block: BlockId) -> bool {
        use crate::ir::Terminator;
        self.builder
            .module
            .func(func_id)
            .blocks
            .iter()
            .any(|b| match &b.term {
                Some(Terminator::Br { target }) => *target == block,
                Some(Terminator::CondBr { then_bb, else_bb, .. }) => {
                    *then_bb == block || *else_bb == block
                }
                Some(Terminator::Switch { cases, default, .. }) => {
                    *default == block || cases.iter().any(|(_, t)| *t == block)
                }
                _ => false,
            })
    }

    pub(crate) fn func_is_main(&self, func_id: FuncId) -> bool {
        let name = &self.builder.module.func(func_id).name;
        name == "main()" || name.starts_with("main(")
    }

    // Scope management

    pub(crate) fn begin_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub(crate) fn end_scope(&mut self) -> Result<(), IrGenError> {
        let scope = self.scopes.pop().expect("unbalanced scope pop");
        self.emit_scope_end(&scope)
    }

    /// Emits a scope's pending work: deferred expressions in reverse
    /// declaration order, then deinit calls in reverse declaration order.
    fn emit_scope_end(&mut self, scope: &Scope<'a>) -> Result<(), IrGenError> {
        for expr in scope.deferred_exprs.iter().rev() {
            self.codegen_expr_discard(expr)?;
        }
        for &(deinit, value) in scope.deinits_to_call.iter().rev() {
            self.create_deinit_call(deinit, value)?;
        }
        Ok(())
    }

    /// On `return`, every live scope runs its pending work, innermost first,
    /// without popping; the innermost is then cleared so the enclosing
    /// block-end emission stays silent.
    pub(crate) fn emit_all_scopes_for_return(&mut self) -> Result<(), IrGenError> {
        let snapshot: Vec<Scope<'a>> = self.scopes.iter().rev().cloned().collect();
        for scope in &snapshot {
            self.emit_scope_end(scope)?;
        }
        if let Some(innermost) = self.scopes.last_mut() {
            innermost.clear();
        }
        Ok(())
    }

    pub(crate) fn defer_evaluation_of(&mut self, expr: &'a Expr) {
        self.scopes
            .last_mut()
            .expect("defer outside any scope")
            .deferred_exprs
            .push(expr);
    }

    pub(crate) fn defer_deinit_call(&mut self, deinit: FuncId, value: ValueId) {
        self.scopes
            .last_mut()
            .expect("deinit registered outside any scope")
            .deinits_to_call
            .push((deinit, value));
    }

    /// Binds a name to an SSA value in the current scope; basic-typed values
    /// whose type declares a deinitializer get a pending deinit call.
    pub(crate) fn set_local_value(
        &mut self,
        ty: Option<&Type>,
        name: String,
        value: ValueId,
    ) -> Result<(), IrGenError> {
        self.scopes
            .last_mut()
            .expect("local bound outside any scope")
            .locals
            .insert(name, value);

        if let Some(ty) = ty {
            if ty.is_basic() && !ty.is_builtin_scalar() {
                if let Some(deinit) = self.deinitializer_for(ty)? {
                    self.defer_deinit_call(deinit, value);
                }
            }
        }
        Ok(())
    }

    /// Finds the lowered deinitializer for a nominal type, creating its
    /// prototype on demand. `None` when the type declares no deinitializer.
    pub(crate) fn deinitializer_for(&mut self, ty: &Type) -> Result<Option<FuncId>, IrGenError> {
        let mangled = mangle_deinit(ty.name(), ty.generic_args());
        if let Some(inst) = self.function_instantiations.get(&mangled) {
            return Ok(Some(inst.func));
        }
        let decls = self.session.find_decls_everywhere(&mangled);
        let deinit = decls.into_iter().find(|&id| {
            self.decl(id)
                .as_function()
                .is_some_and(|f| f.kind == FunctionKind::Deinit)
        });
        match deinit {
            Some(decl_id) => Ok(Some(self.function_proto(decl_id, &[])?)),
            None => Ok(None),
        }
    }

    /// Calls a deinitializer on a value, loading or refusing as the ABI
    /// demands. Skips the call when the value is the receiver argument of
    /// the deinitializer being lowered, so a type cannot destroy itself
    /// recursively.
    pub(crate) fn create_deinit_call(
        &mut self,
        deinit: FuncId,
        value: ValueId,
    ) -> Result<(), IrGenError> {
        let current = self.builder.current_func();
        if self.builder.module.func(current).name.ends_with(".deinit")
            && self.builder.module.func(current).is_param(value)
        {
            return Ok(());
        }

        let value_is_ptr = self.builder.value_type(value).is_ptr();
        let param_is_ptr = self.builder.module.func(deinit).param_types[0].is_ptr();
        if value_is_ptr && !param_is_ptr {
            let loaded = self.builder.load(value);
            self.builder.call(deinit, vec![loaded]);
        } else if !value_is_ptr && param_is_ptr {
            return Err(GEK::ByValueDeinitParam.at(crate::diag::Span::default()));
        } else {
            self.builder.call(deinit, vec![value]);
        }
        Ok(())
    }

    /// Looks a name up through the scope stack, innermost first; fields fall
    /// back to an access through `this`, globals to their storage or folded
    /// constant.
    pub(crate) fn find_value(
        &mut self,
        name: &str,
        decl: Option<DeclId>,
    ) -> Result<ValueId, IrGenError> {
        for scope in self.scopes.iter().rev() {
            if let Some(&value) = scope.locals.get(name) {
                return Ok(value);
            }
        }

        let decl_id = decl.unwrap_or_else(|| panic!("no value bound for '{name}'"));
        let decl = self.decl(decl_id);
        match &decl.kind {
            DeclKind::Field(field) => {
                let ty = field.ty.clone();
                let this = self.find_value("this", None)?;
                self.member_access(this, &ty, &decl.name)
            }
            DeclKind::Var(var) => {
                if !var.mutable
                    && var.initializer.as_ref().is_some_and(is_constant_initializer)
                {
                    let init = var.initializer.as_ref().unwrap();
                    return self.codegen_expr(init);
                }
                if !self.builder.module.globals.contains_key(&decl.name) {
                    self.codegen_global_var(decl_id)?;
                }
                Ok(self.builder.global_addr(decl.name.clone()))
            }
            _ => panic!("no value for declaration '{}'", decl.name),
        }
    }

    pub(crate) fn type_decl_self_type(&self, decl_id: DeclId) -> Type {
        let decl = self.decl(decl_id);
        let type_decl = decl.as_type().expect("self type of non-type decl");
        Type::Basic {
            name: decl.name.clone(),
            generic_args: type_decl.generic_args.clone(),
            mutable: false,
        }
    }
}

fn is_constant_initializer(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::IntLit { .. }
            | ExprKind::FloatLit { .. }
            | ExprKind::BoolLit { .. }
            | ExprKind::CharLit { .. }
    )
}
