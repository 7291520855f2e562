//! Call lowering: builtin conversions, reserved intrinsics, on-demand
//! prototype materialization, and argument assembly.

use crate::ast::{CallExpr, DeclId, Expr, FunctionKind};
use crate::ir::{CastKind, FuncId, GepIndex, IrType, ValueId};
use crate::irgen::errors::IrGenErrorKind as GEK;
use crate::irgen::{FunctionInstantiation, IrGen, IrGenError};
use crate::mangle::{mangle_deinit, mangle_function, mangle_type};
use crate::typecheck::ResolvedCallee;
use crate::types::{is_builtin_scalar_name, Type};

impl<'a> IrGen<'a> {
    pub(crate) fn codegen_call(
        &mut self,
        expr: &'a Expr,
        call: &'a CallExpr,
    ) -> Result<Option<ValueId>, IrGenError> {
        let name = call.function_name();

        if is_builtin_scalar_name(name) {
            let target = self.expr_type(expr).clone();
            let value = self.codegen_builtin_conversion(&call.args[0].value, &target)?;
            return Ok(Some(value));
        }

        // Reserved intrinsics have no declaration.
        if self.checked.callee(expr.id).is_none() {
            if name == "sizeOf" {
                let ty = self.to_ir(&call.generic_args[0])?;
                return Ok(Some(self.builder.size_of(ty)));
            }
            if name == "offsetUnsafely" {
                let receiver = call.receiver().expect("offsetUnsafely without a receiver");
                let pointer = self.codegen_expr(receiver)?;
                let offset = self.codegen_expr(&call.args[0].value)?;
                return Ok(Some(self.builder.gep(pointer, vec![GepIndex::Value(offset)])));
            }
            panic!("unresolved call to '{name}'");
        }

        let callee = self.checked.callee(expr.id).cloned().unwrap();
        let args: Vec<&'a Expr> = call.args.iter().map(|arg| &arg.value).collect();
        self.codegen_resolved_call(expr, &callee, call.receiver(), &args)
    }

    /// Lowers a resolved call: materializes the callee, prepends the
    /// receiver (or `this`), and passes each argument through the
    /// by-value/by-reference machinery.
    pub(crate) fn codegen_resolved_call(
        &mut self,
        expr: &'a Expr,
        callee: &ResolvedCallee,
        receiver: Option<&'a Expr>,
        args: &[&'a Expr],
    ) -> Result<Option<ValueId>, IrGenError> {
        let decl = self.decl(callee.decl);
        let Some(func_decl) = decl.as_function() else {
            // Function-typed values are checked but not lowered.
            return Err(GEK::Unimplemented("function values").at(expr.span));
        };

        let func_id = self.function_proto(callee.decl, &callee.generic_args)?;
        let param_tys = self.builder.module.func(func_id).param_types.clone();

        let mut arg_values = Vec::with_capacity(args.len() + 1);
        let mut param_index = 0usize;

        let takes_receiver = func_decl.is_member() && func_decl.kind != FunctionKind::Init;
        if takes_receiver {
            let force_by_reference = func_decl.mutating;
            let value = match receiver {
                Some(receiver_expr) => {
                    self.codegen_expr_for_passing(receiver_expr, &param_tys[0], force_by_reference)?
                }
                None => {
                    // Implicit receiver: a sibling-method call through `this`.
                    let this = self.find_value("this", None)?;
                    if self.builder.value_type(this).is_ptr() && !param_tys[0].is_ptr() {
                        self.builder.load(this)
                    } else {
                        this
                    }
                }
            };
            arg_values.push(value);
            param_index = 1;
        }

        for arg in args {
            match param_tys.get(param_index) {
                Some(target) => {
                    let target = target.clone();
                    arg_values.push(self.codegen_expr_for_passing(arg, &target, false)?);
                }
                // Variadic tail: no declared parameter to convert towards.
                None => arg_values.push(self.codegen_expr(arg)?),
            }
            param_index += 1;
        }

        Ok(self.builder.call(func_id, arg_values))
    }

    /// A call whose callee names a builtin scalar converts its argument,
    /// picking the instruction from source and target signedness.
    fn codegen_builtin_conversion(
        &mut self,
        arg: &'a Expr,
        target: &Type,
    ) -> Result<ValueId, IrGenError> {
        let source = self.expr_type(arg).clone();
        let value = self.codegen_expr(arg)?;
        let target_ir = self.to_ir(target)?;

        let target_int_like = target.is_integer() || target.is_char() || target.is_bool();

        if source.is_floating_point() {
            if target.is_signed() {
                return Ok(self.builder.cast(CastKind::FpToSi, value, target_ir));
            }
            if target.is_unsigned() {
                return Ok(self.builder.cast(CastKind::FpToUi, value, target_ir));
            }
            if target.is_floating_point() {
                return Ok(self.builder.cast(CastKind::FpCast, value, target_ir));
            }
        } else if target.is_floating_point() {
            let kind = if source.is_signed() {
                CastKind::SiToFp
            } else {
                CastKind::UiToFp
            };
            return Ok(self.builder.cast(kind, value, target_ir));
        } else if target_int_like {
            return Ok(self.builder.int_cast(value, target_ir, source.is_signed()));
        }

        Err(GEK::UnsupportedConversion(source, target.clone()).at(arg.span))
    }

    /// Looks up or creates the IR prototype for a function declaration,
    /// cached under its parameter-name-extended mangled name so overloads
    /// differing only in labels stay distinct during lowering.
    pub(crate) fn function_proto(
        &mut self,
        decl_id: DeclId,
        generic_args: &[Type],
    ) -> Result<FuncId, IrGenError> {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("prototype of a non-function");

        let receiver_generic_args: Vec<Type> = func
            .receiver
            .and_then(|r| self.decl(r).as_type().map(|t| t.generic_args.clone()))
            .unwrap_or_default();

        let key = self.mangle_with_params(decl_id, generic_args);
        if let Some(inst) = self.function_instantiations.get(&key) {
            return Ok(inst.func);
        }

        let mut param_types = Vec::new();
        let mut param_names = Vec::new();

        if func.is_member() && func.kind != FunctionKind::Init {
            let receiver = func.receiver.unwrap();
            let receiver_decl = self.decl(receiver);
            let receiver_key = mangle_type(&receiver_decl.name, &receiver_generic_args);
            if !self.structs.contains_key(&receiver_key) {
                self.codegen_type_decl(receiver)?;
                // Lowering the receiver lowers its members too; this very
                // prototype may exist now.
                if let Some(inst) = self.function_instantiations.get(&key) {
                    return Ok(inst.func);
                }
            }
            param_types.push(self.ir_type_for_passing(&receiver_key, func.mutating));
            param_names.push("this".to_string());
        }

        for &param_id in &func.params {
            let param = self.decl(param_id);
            param_types.push(self.to_ir(&param.as_param().unwrap().ty)?);
            param_names.push(param.name.clone());
        }

        let ret_ty = match func.kind {
            FunctionKind::Init => {
                let receiver = func.receiver.expect("initializer without receiver");
                let self_type = self.type_decl_self_type(receiver);
                self.to_ir(&self_type)?
            }
            _ => {
                let mut ret = self.to_ir(&func.return_type)?;
                if decl.name == "main" && ret.is_void() {
                    ret = IrType::Int(32);
                }
                ret
            }
        };

        // Type lowering above may have lowered this function on demand.
        if let Some(inst) = self.function_instantiations.get(&key) {
            return Ok(inst.func);
        }

        let mangled = self.mangled_function_name(decl_id, generic_args);
        let func_id = self
            .builder
            .module
            .add_function(mangled, param_types, param_names, ret_ty);
        if func.variadic {
            self.builder.module.func_mut(func_id).variadic = true;
        }

        self.function_instantiations.insert(
            key,
            FunctionInstantiation {
                decl: decl_id,
                receiver_generic_args,
                generic_args: generic_args.to_vec(),
                func: func_id,
            },
        );
        Ok(func_id)
    }

    /// Structs that pass by value are taken directly unless the method
    /// mutates its receiver; everything else goes behind a pointer.
    fn ir_type_for_passing(&self, struct_key: &str, mutating: bool) -> IrType {
        let pass_by_value = self
            .structs
            .get(struct_key)
            .and_then(|&decl_id| self.decl(decl_id).as_type().map(|t| t.pass_by_value))
            .unwrap_or(false);
        if pass_by_value && !mutating {
            IrType::Struct(struct_key.to_string())
        } else {
            IrType::Struct(struct_key.to_string()).ptr_to()
        }
    }

    /// The canonical mangled name for a lowered function.
    pub(crate) fn mangled_function_name(&self, decl_id: DeclId, generic_args: &[Type]) -> String {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("mangle of a non-function");

        let (receiver_name, receiver_args) = match func.receiver {
            Some(receiver) => {
                let receiver_decl = self.decl(receiver);
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
            return mangle_deinit(receiver_name, &receiver_args);
        }

        let param_types: Vec<Type> = func
            .params
            .iter()
            .map(|&p| self.decl(p).as_param().unwrap().ty.clone())
            .collect();
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

    /// Extends the mangle with parameter names, the instantiation-cache key.
    fn mangle_with_params(&self, decl_id: DeclId, generic_args: &[Type]) -> String {
        let decl = self.decl(decl_id);
        let func = decl.as_function().expect("mangle of a non-function");
        let mut key = self.mangled_function_name(decl_id, generic_args);
        for &param in &func.params {
            key.push('$');
            key.push_str(&self.decl(param).name);
        }
        key
    }
}
