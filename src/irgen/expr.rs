//! Expression lowering. `codegen_expr` produces a value, `codegen_lvalue_expr`
//! an address; the two recurse into each other through loads and
//! address-of.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::ir::{CastKind, FCmpCond, GepIndex, ICmpCond, IntBinOp, IrType, ValueId};
use crate::irgen::errors::IrGenErrorKind as GEK;
use crate::irgen::{IrGen, IrGenError};
use crate::mangle::mangle_type;
use crate::types::{ArraySize, Type};

impl<'a> IrGen<'a> {
    pub(crate) fn expr_type(&self, expr: &Expr) -> &Type {
        self.checked.expr_type(expr.id)
    }

    pub(crate) fn codegen_expr(&mut self, expr: &'a Expr) -> Result<ValueId, IrGenError> {
        match &expr.kind {
            ExprKind::Var { name } => self.codegen_var_expr(expr, name),
            ExprKind::StringLit { value } => self.codegen_string_literal(expr, value),
            ExprKind::CharLit { value } => {
                let checked = self.expr_type(expr).clone();
                let ty = self.to_ir(&checked)?;
                Ok(self.builder.int_const(ty, *value as u8 as i128))
            }
            ExprKind::IntLit { value } => {
                let checked = self.expr_type(expr).clone();
                let ty = self.to_ir(&checked)?;
                // Integer literals may be typed as floating-point when used
                // in a context that requires a floating-point value.
                if checked.is_floating_point() {
                    Ok(self.builder.float_const(ty, *value as f64))
                } else {
                    Ok(self.builder.int_const(ty, *value))
                }
            }
            ExprKind::FloatLit { value } => {
                let ty = self.to_ir(&self.expr_type(expr).clone())?;
                Ok(self.builder.float_const(ty, *value))
            }
            ExprKind::BoolLit { value } => Ok(self.builder.bool_const(*value)),
            ExprKind::NullLit => self.codegen_null_literal(expr),
            ExprKind::ArrayLit { elements } => self.codegen_array_literal(expr, elements),
            ExprKind::TupleLit { .. } => {
                Err(GEK::Unimplemented("tuple values").at(expr.span))
            }
            ExprKind::Prefix { op, operand } => self.codegen_prefix_expr(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.codegen_binary_expr(expr, *op, lhs, rhs),
            ExprKind::Call(call) => match self.codegen_call(expr, call)? {
                Some(value) => Ok(value),
                None => panic!("void call used as a value"),
            },
            ExprKind::Cast { target, operand } => self.codegen_cast_expr(target, operand),
            ExprKind::Sizeof { target } => {
                let ty = self.to_ir(target)?;
                Ok(self.builder.size_of(ty))
            }
            ExprKind::Member { base, member } => self.codegen_member_expr(expr, base, member),
            ExprKind::Subscript { base, index } => {
                let addr = self.codegen_lvalue_subscript(base, index)?;
                Ok(self.builder.load(addr))
            }
            // The non-null assertion is deferred.
            ExprKind::Unwrap { operand } => self.codegen_expr(operand),
        }
    }

    /// Lowers an expression evaluated for effect, tolerating void calls.
    pub(crate) fn codegen_expr_discard(&mut self, expr: &'a Expr) -> Result<(), IrGenError> {
        if let ExprKind::Call(call) = &expr.kind {
            self.codegen_call(expr, call)?;
            return Ok(());
        }
        self.codegen_expr(expr)?;
        Ok(())
    }

    /// Produces the address of an lvalue expression.
    pub(crate) fn codegen_lvalue_expr(&mut self, expr: &'a Expr) -> Result<ValueId, IrGenError> {
        match &expr.kind {
            ExprKind::Var { name } => {
                let decl = self.checked.var_decls.get(&expr.id).copied();
                self.find_value(name, decl)
            }
            ExprKind::Member { base, member } => self.codegen_lvalue_member(expr, base, member),
            ExprKind::Subscript { base, index } => self.codegen_lvalue_subscript(base, index),
            ExprKind::Prefix {
                op: UnaryOp::Deref,
                operand,
            } => self.codegen_expr(operand),
            ExprKind::Unwrap { operand } => self.codegen_lvalue_expr(operand),
            other => panic!("no lvalue lowering for {other:?}"),
        }
    }

    fn codegen_var_expr(&mut self, expr: &Expr, name: &str) -> Result<ValueId, IrGenError> {
        let decl = self.checked.var_decls.get(&expr.id).copied();
        let value = self.find_value(name, decl)?;
        // Arguments are used directly; anything held in storage is loaded.
        if self.builder.is_param(value) || !self.builder.value_type(value).is_ptr() {
            Ok(value)
        } else {
            Ok(self.builder.load(value))
        }
    }

    fn codegen_string_literal(
        &mut self,
        expr: &Expr,
        value: &str,
    ) -> Result<ValueId, IrGenError> {
        if self.expr_type(expr).is_string() {
            let string_ty = self.string_type();
            let ptr = self.builder.global_string(value);
            let len = self.builder.int_const(IrType::Int(32), value.len() as i128);
            let agg = self.builder.undef(string_ty);
            let agg = self.builder.insert_value(agg, ptr, 0);
            Ok(self.builder.insert_value(agg, len, 1))
        } else {
            // Retyped to a C string by implicit conversion.
            Ok(self.builder.global_string(value))
        }
    }

    fn codegen_null_literal(&mut self, expr: &Expr) -> Result<ValueId, IrGenError> {
        let checked = self.expr_type(expr).clone();
        let unwrapped = checked.remove_optional();
        if unwrapped.is_pointer() && unwrapped.pointee().is_unsized_array() {
            let fat = self.fat_pointer_type(unwrapped.pointee().element_type())?;
            let IrType::Struct(fat_name) = &fat else {
                unreachable!("fat pointer lowered to a non-struct");
            };
            let elem_ptr_ty = self
                .builder
                .module
                .struct_fields(fat_name)
                .expect("unregistered fat pointer struct")[0]
                .clone();
            let null_ptr = self.builder.null_const(elem_ptr_ty);
            let zero = self.builder.int_const(IrType::Int(32), 0);
            let agg = self.builder.undef(fat);
            let agg = self.builder.insert_value(agg, null_ptr, 0);
            return Ok(self.builder.insert_value(agg, zero, 1));
        }
        let ty = self.to_ir(&checked)?;
        Ok(self.builder.null_const(ty))
    }

    fn codegen_array_literal(
        &mut self,
        expr: &Expr,
        elements: &'a [Expr],
    ) -> Result<ValueId, IrGenError> {
        let ty = self.to_ir(&self.expr_type(expr).clone())?;
        let mut agg = self.builder.undef(ty);
        for (index, element) in elements.iter().enumerate() {
            let value = self.codegen_expr(element)?;
            agg = self.builder.insert_value(agg, value, index as u32);
        }
        Ok(agg)
    }

    fn codegen_prefix_expr(
        &mut self,
        op: UnaryOp,
        operand: &'a Expr,
    ) -> Result<ValueId, IrGenError> {
        match op {
            UnaryOp::Plus => self.codegen_expr(operand),
            UnaryOp::Minus => {
                let value = self.codegen_expr(operand)?;
                if self.expr_type(operand).is_floating_point() {
                    Ok(self.builder.fneg(value))
                } else {
                    Ok(self.builder.neg(value))
                }
            }
            UnaryOp::Deref => {
                let ptr = self.codegen_expr(operand)?;
                Ok(self.builder.load(ptr))
            }
            UnaryOp::AddrOf => self.codegen_lvalue_expr(operand),
            UnaryOp::Not | UnaryOp::BitNot => {
                let value = self.codegen_expr(operand)?;
                Ok(self.builder.not(value))
            }
        }
    }

    fn codegen_binary_expr(
        &mut self,
        expr: &'a Expr,
        op: BinaryOp,
        lhs: &'a Expr,
        rhs: &'a Expr,
    ) -> Result<ValueId, IrGenError> {
        // Operator overloads were resolved to calls during checking.
        if let Some(callee) = self.checked.callee(expr.id).cloned() {
            let args = vec![lhs, rhs];
            return match self.codegen_resolved_call(expr, &callee, None, &args)? {
                Some(value) => Ok(value),
                None => panic!("void operator call used as a value"),
            };
        }

        match op {
            BinaryOp::And => self.codegen_logical_and(lhs, rhs),
            BinaryOp::Or => self.codegen_logical_or(lhs, rhs),
            // Ranges only exist as `for` bounds; a first-class range value
            // has no lowering.
            BinaryOp::RangeExcl | BinaryOp::RangeIncl => {
                Err(GEK::Unimplemented("range values").at(expr.span))
            }
            _ => {
                let lhs_value = self.codegen_expr(lhs)?;
                let rhs_value = self.codegen_expr(rhs)?;
                let lhs_ty = self.expr_type(lhs).clone();
                Ok(self.codegen_binary_op(op, lhs_value, rhs_value, &lhs_ty))
            }
        }
    }

    /// Short-circuit `&&`: the right side runs in its own block, and the
    /// result merges through a phi.
    fn codegen_logical_and(&mut self, lhs: &'a Expr, rhs: &'a Expr) -> Result<ValueId, IrGenError> {
        let func = self.builder.current_func();
        let lhs_value = self.codegen_expr(lhs)?;
        let lhs_block = self.builder.insert_point().unwrap().1;

        let rhs_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);
        self.builder.cond_br(lhs_value, rhs_block, end_block);

        self.builder.position_at_end(func, rhs_block);
        let rhs_value = self.codegen_expr(rhs)?;
        let rhs_end = self.builder.insert_point().unwrap().1;
        self.builder.br(end_block);

        self.builder.position_at_end(func, end_block);
        Ok(self.builder.phi(
            IrType::Int(1),
            vec![(lhs_block, lhs_value), (rhs_end, rhs_value)],
        ))
    }

    /// Short-circuit `||`: mirror image of `&&`.
    fn codegen_logical_or(&mut self, lhs: &'a Expr, rhs: &'a Expr) -> Result<ValueId, IrGenError> {
        let func = self.builder.current_func();
        let lhs_value = self.codegen_expr(lhs)?;
        let lhs_block = self.builder.insert_point().unwrap().1;

        let rhs_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);
        self.builder.cond_br(lhs_value, end_block, rhs_block);

        self.builder.position_at_end(func, rhs_block);
        let rhs_value = self.codegen_expr(rhs)?;
        let rhs_end = self.builder.insert_point().unwrap().1;
        self.builder.br(end_block);

        self.builder.position_at_end(func, end_block);
        Ok(self.builder.phi(
            IrType::Int(1),
            vec![(lhs_block, lhs_value), (rhs_end, rhs_value)],
        ))
    }

    /// Selects the operation from the lhs's checked type: float paths use
    /// ordered compares and float arithmetic, integer paths pick signed or
    /// unsigned variants.
    pub(crate) fn codegen_binary_op(
        &mut self,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        lhs_ty: &Type,
    ) -> ValueId {
        if self.builder.value_type(lhs).is_float() {
            return match op {
                BinaryOp::Eq => self.builder.fcmp(FCmpCond::Oeq, lhs, rhs),
                BinaryOp::Ne => self.builder.fcmp(FCmpCond::One, lhs, rhs),
                BinaryOp::Lt => self.builder.fcmp(FCmpCond::Olt, lhs, rhs),
                BinaryOp::Le => self.builder.fcmp(FCmpCond::Ole, lhs, rhs),
                BinaryOp::Gt => self.builder.fcmp(FCmpCond::Ogt, lhs, rhs),
                BinaryOp::Ge => self.builder.fcmp(FCmpCond::Oge, lhs, rhs),
                BinaryOp::Add => self.builder.bin_op(IntBinOp::FAdd, lhs, rhs),
                BinaryOp::Sub => self.builder.bin_op(IntBinOp::FSub, lhs, rhs),
                BinaryOp::Mul => self.builder.bin_op(IntBinOp::FMul, lhs, rhs),
                BinaryOp::Div => self.builder.bin_op(IntBinOp::FDiv, lhs, rhs),
                BinaryOp::Rem => self.builder.bin_op(IntBinOp::FRem, lhs, rhs),
                other => panic!("invalid float binary operator {other}"),
            };
        }

        let signed = lhs_ty.is_signed();
        match op {
            BinaryOp::Eq => self.builder.icmp(ICmpCond::Eq, lhs, rhs),
            BinaryOp::Ne => self.builder.icmp(ICmpCond::Ne, lhs, rhs),
            BinaryOp::Lt => {
                let cond = if signed { ICmpCond::Slt } else { ICmpCond::Ult };
                self.builder.icmp(cond, lhs, rhs)
            }
            BinaryOp::Le => {
                let cond = if signed { ICmpCond::Sle } else { ICmpCond::Ule };
                self.builder.icmp(cond, lhs, rhs)
            }
            BinaryOp::Gt => {
                let cond = if signed { ICmpCond::Sgt } else { ICmpCond::Ugt };
                self.builder.icmp(cond, lhs, rhs)
            }
            BinaryOp::Ge => {
                let cond = if signed { ICmpCond::Sge } else { ICmpCond::Uge };
                self.builder.icmp(cond, lhs, rhs)
            }
            BinaryOp::Add => self.builder.bin_op(IntBinOp::Add, lhs, rhs),
            BinaryOp::Sub => self.builder.bin_op(IntBinOp::Sub, lhs, rhs),
            BinaryOp::Mul => self.builder.bin_op(IntBinOp::Mul, lhs, rhs),
            BinaryOp::Div => {
                let op = if signed { IntBinOp::SDiv } else { IntBinOp::UDiv };
                self.builder.bin_op(op, lhs, rhs)
            }
            BinaryOp::Rem => {
                let op = if signed { IntBinOp::SRem } else { IntBinOp::URem };
                self.builder.bin_op(op, lhs, rhs)
            }
            BinaryOp::BitAnd => self.builder.bin_op(IntBinOp::And, lhs, rhs),
            BinaryOp::BitOr => self.builder.bin_op(IntBinOp::Or, lhs, rhs),
            BinaryOp::BitXor => self.builder.bin_op(IntBinOp::Xor, lhs, rhs),
            BinaryOp::Shl => self.builder.bin_op(IntBinOp::Shl, lhs, rhs),
            BinaryOp::Shr => {
                let op = if signed { IntBinOp::AShr } else { IntBinOp::LShr };
                self.builder.bin_op(op, lhs, rhs)
            }
            other => panic!("invalid integer binary operator {other}"),
        }
    }

    fn codegen_cast_expr(
        &mut self,
        target: &Type,
        operand: &'a Expr,
    ) -> Result<ValueId, IrGenError> {
        let mut value = self.codegen_expr(operand)?;
        let target_ir = self.to_ir(target)?;
        let source_ty = self.expr_type(operand).clone();

        if self.builder.value_type(value).is_int() && target_ir.is_int() {
            return Ok(self
                .builder
                .int_cast(value, target_ir, source_ty.is_signed()));
        }
        // Fat pointers shed their length when cast to a raw pointer.
        if source_ty.is_pointer() && source_ty.pointee().is_unsized_array() {
            value = self.builder.extract_value(value, 0);
        }
        Ok(self.builder.cast(CastKind::Bitcast, value, target_ir))
    }

    // Member access

    fn codegen_member_expr(
        &mut self,
        expr: &'a Expr,
        base: &'a Expr,
        member: &str,
    ) -> Result<ValueId, IrGenError> {
        let mut base_ty = self.expr_type(base).clone();
        if base_ty.is_pointer() {
            base_ty = base_ty.pointee().clone();
        }

        if base_ty.is_array() || base_ty.is_string() {
            if member == "data" {
                return self.array_or_string_data(base, &base_ty);
            }
            if member == "count" {
                return self.array_or_string_length(base, &base_ty);
            }
        }

        let value = self.codegen_lvalue_member(expr, base, member)?;
        if self.builder.value_type(value).is_ptr() {
            Ok(self.builder.load(value))
        } else {
            Ok(value)
        }
    }

    fn codegen_lvalue_member(
        &mut self,
        expr: &'a Expr,
        base: &'a Expr,
        member: &str,
    ) -> Result<ValueId, IrGenError> {
        let base_value = self.codegen_lvalue_expr(base)?;
        let member_ty = self.expr_type(expr).clone();
        self.member_access(base_value, &member_ty, member)
    }

    /// Dereferences through pointers to the aggregate, then produces the
    /// member's address (or extracts the field from an aggregate value).
    /// Union members always live at index 0 behind a cast of the storage.
    pub(crate) fn member_access(
        &mut self,
        base_value: ValueId,
        member_ty: &Type,
        member: &str,
    ) -> Result<ValueId, IrGenError> {
        let base_ty = self.builder.value_type(base_value).clone();
        if let IrType::Ptr(pointee) = &base_ty {
            let mut base_value = base_value;
            let mut pointee = pointee.as_ref().clone();
            if pointee.is_ptr() {
                base_value = self.builder.load(base_value);
                pointee = pointee.pointee().clone();
            }
            let IrType::Struct(struct_name) = &pointee else {
                panic!("member access through non-aggregate {pointee}");
            };
            let (index, is_union) = self.member_index(struct_name, member);
            let gep = self.builder.gep(
                base_value,
                vec![GepIndex::Const(0), GepIndex::Const(index as i64)],
            );
            if is_union {
                let member_ptr = self.to_ir(member_ty)?.ptr_to();
                return Ok(self.builder.cast(CastKind::Bitcast, gep, member_ptr));
            }
            return Ok(gep);
        }

        let IrType::Struct(struct_name) = &base_ty else {
            panic!("member access on non-aggregate {base_ty}");
        };
        let (index, _) = self.member_index(struct_name, member);
        Ok(self.builder.extract_value(base_value, index))
    }

    fn member_index(&self, struct_name: &str, member: &str) -> (u32, bool) {
        let decl_id = *self
            .structs
            .get(struct_name)
            .unwrap_or_else(|| panic!("unknown struct {struct_name}"));
        let decl = self.decl(decl_id);
        let type_decl = decl.as_type().expect("struct entry");
        let is_union = type_decl.tag == crate::ast::TypeTag::Union;
        if is_union {
            return (0, true);
        }
        let index = type_decl
            .fields
            .iter()
            .position(|&field| self.decl(field).name == member)
            .unwrap_or_else(|| panic!("no field {member} in {struct_name}"));
        (index as u32, false)
    }

    /// `.data` on arrays and strings: field 0 of a fat aggregate, or the
    /// decayed element pointer of a sized array.
    fn array_or_string_data(
        &mut self,
        object: &'a Expr,
        object_ty: &Type,
    ) -> Result<ValueId, IrGenError> {
        if object_ty.is_string() || object_ty.is_unsized_array() {
            let value = self.codegen_expr(object)?;
            return Ok(self.builder.extract_value(value, 0));
        }
        let value = self.codegen_expr(object)?;
        if self.builder.value_type(value).is_ptr() {
            Ok(self
                .builder
                .gep(value, vec![GepIndex::Const(0), GepIndex::Const(0)]))
        } else {
            let ty = self.builder.value_type(value).clone();
            let slot = self.builder.entry_alloca(ty, "");
            self.builder.store(value, slot);
            Ok(self
                .builder
                .gep(slot, vec![GepIndex::Const(0), GepIndex::Const(0)]))
        }
    }

    /// `.count`: field 1 of a fat aggregate, or the compile-time size.
    fn array_or_string_length(
        &mut self,
        object: &'a Expr,
        object_ty: &Type,
    ) -> Result<ValueId, IrGenError> {
        if object_ty.is_string() || object_ty.is_unsized_array() {
            let value = self.codegen_expr(object)?;
            return Ok(self.builder.extract_value(value, 1));
        }
        let ArraySize::Fixed(len) = object_ty.array_size() else {
            panic!("length of unsized array without a fat pointer");
        };
        Ok(self.builder.int_const(IrType::Int(32), len as i128))
    }

    // Subscripts

    fn codegen_lvalue_subscript(
        &mut self,
        base: &'a Expr,
        index: &'a Expr,
    ) -> Result<ValueId, IrGenError> {
        let mut value = self.codegen_lvalue_expr(base)?;
        let base_ty = self.expr_type(base).clone();

        if base_ty.is_pointer() && base_ty.pointee().is_unsized_array() {
            if self.builder.value_type(value).is_ptr() {
                value = self.builder.load(value);
            }
            let data = self.builder.extract_value(value, 0);
            let index_value = self.codegen_expr(index)?;
            return Ok(self.builder.gep(data, vec![GepIndex::Value(index_value)]));
        }

        // An array behind a pointer needs one load to reach the array.
        if self.builder.value_type(value).pointee().is_ptr() {
            value = self.builder.load(value);
        }
        let index_value = self.codegen_expr(index)?;
        Ok(self.builder.gep(
            value,
            vec![GepIndex::Const(0), GepIndex::Value(index_value)],
        ))
    }

    // Argument materialization

    /// Lowers an argument expression for a call: fat-pointer construction for
    /// sized-to-unsized array passing, by-value or by-reference aggregates
    /// per the receiver type's calling convention, and implicit loads.
    pub(crate) fn codegen_expr_for_passing(
        &mut self,
        expr: &'a Expr,
        target_ty: &IrType,
        force_by_reference: bool,
    ) -> Result<ValueId, IrGenError> {
        let checked_ty = self.expr_type(expr).clone();

        if self.is_fat_pointer_struct(target_ty) {
            if let Some(value) = self.codegen_fat_pointer_conversion(expr, &checked_ty, target_ty)? {
                return Ok(value);
            }
        }

        let mut expr_ty = checked_ty.clone();
        if expr_ty.is_pointer() {
            expr_ty = expr_ty.pointee().clone();
        }

        if !expr.is_lvalue() || !expr_ty.is_basic() {
            return self.codegen_expr(expr);
        }

        let key = mangle_type(expr_ty.name(), expr_ty.generic_args());
        let pass_by_value = match self.structs.get(&key) {
            Some(&decl_id) => self
                .decl(decl_id)
                .as_type()
                .map(|t| t.pass_by_value)
                .unwrap_or(true),
            None => true,
        };

        if pass_by_value && !force_by_reference {
            if checked_ty.is_pointer() && !target_ty.is_ptr() {
                let value = self.codegen_expr(expr)?;
                return Ok(self.builder.load(value));
            }
        } else if !checked_ty.is_pointer() {
            return self.codegen_lvalue_expr(expr);
        }
        self.codegen_expr(expr)
    }

    fn is_fat_pointer_struct(&self, ty: &IrType) -> bool {
        let IrType::Struct(name) = ty else {
            return false;
        };
        match self.builder.module.struct_fields(name) {
            Some(fields) => {
                fields.len() == 2 && fields[0].is_ptr() && fields[1] == IrType::Int(32)
            }
            None => false,
        }
    }

    /// Builds a `{data, count}` fat pointer from a sized array (or a pointer
    /// to one).
    fn codegen_fat_pointer_conversion(
        &mut self,
        expr: &'a Expr,
        checked_ty: &Type,
        target_ty: &IrType,
    ) -> Result<Option<ValueId>, IrGenError> {
        let array_ty = if checked_ty.is_pointer() && checked_ty.pointee().is_array() {
            checked_ty.pointee()
        } else if checked_ty.is_array() {
            checked_ty
        } else {
            return Ok(None);
        };
        let ArraySize::Fixed(len) = array_ty.array_size() else {
            return Ok(None);
        };

        let base = if checked_ty.is_pointer() {
            self.codegen_expr(expr)?
        } else {
            self.codegen_lvalue_expr(expr)?
        };
        let elem_ptr = self
            .builder
            .gep(base, vec![GepIndex::Const(0), GepIndex::Const(0)]);
        let len_value = self.builder.int_const(IrType::Int(32), len as i128);
        let agg = self.builder.undef(target_ty.clone());
        let agg = self.builder.insert_value(agg, elem_ptr, 0);
        Ok(Some(self.builder.insert_value(agg, len_value, 1)))
    }
}

