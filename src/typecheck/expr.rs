//! Expression type checking. Every visited expression gets its checked type
//! recorded in the side tables; `Var` references additionally record their
//! resolved declaration.

use crate::ast::{BinaryOp, DeclId, DeclKind, Expr, ExprKind, UnaryOp};
use crate::diag::Span;
use crate::typecheck::call::CallSite;
use crate::typecheck::errors::TypeCheckErrorKind as TEK;
use crate::typecheck::{Sema, TypeCheckError};
use crate::types::{ArraySize, Type};

impl Sema<'_> {
    /// Checks an expression, records its type, and returns it. `write_only`
    /// accesses (assignment targets) skip the use-after-move check.
    pub(crate) fn typecheck_expr(
        &mut self,
        expr: &Expr,
        write_only: bool,
    ) -> Result<Type, TypeCheckError> {
        let ty = self.typecheck_expr_kind(expr, write_only)?;
        self.tables.expr_types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn typecheck_expr_kind(
        &mut self,
        expr: &Expr,
        write_only: bool,
    ) -> Result<Type, TypeCheckError> {
        match &expr.kind {
            ExprKind::Var { name } => self.typecheck_var_expr(expr, name, write_only),
            ExprKind::StringLit { .. } => Ok(Type::string()),
            ExprKind::CharLit { .. } => Ok(Type::char()),
            ExprKind::IntLit { value } => {
                if Type::int().int_in_range(*value) {
                    Ok(Type::int())
                } else if Type::int64().int_in_range(*value) {
                    Ok(Type::int64())
                } else {
                    Err(TEK::IntLiteralTooLarge.at(expr.span))
                }
            }
            ExprKind::FloatLit { .. } => Ok(Type::float64()),
            ExprKind::BoolLit { .. } => Ok(Type::bool()),
            ExprKind::NullLit => Ok(Type::Null),
            ExprKind::ArrayLit { elements } => self.typecheck_array_literal(expr.span, elements),
            ExprKind::TupleLit { elements } => {
                let mut subtypes = Vec::with_capacity(elements.len());
                for element in elements {
                    subtypes.push(self.typecheck_expr(element, false)?);
                }
                Ok(Type::tuple(subtypes))
            }
            ExprKind::Prefix { op, operand } => self.typecheck_prefix_expr(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.typecheck_binary_expr(expr, *op, lhs, rhs),
            ExprKind::Call(call) => self.typecheck_call_expr(expr, call),
            ExprKind::Cast { target, operand } => {
                let source = self.typecheck_expr(operand, false)?;
                if is_valid_cast(&source, target) {
                    Ok(target.clone())
                } else {
                    Err(TEK::IllegalCast(source, target.clone()).at(expr.span))
                }
            }
            ExprKind::Sizeof { .. } => Ok(Type::uint64()),
            ExprKind::Member { base, member } => self.typecheck_member_expr(expr, base, member),
            ExprKind::Subscript { base, index } => self.typecheck_subscript_expr(base, index),
            ExprKind::Unwrap { operand } => {
                let ty = self.typecheck_expr(operand, false)?;
                if !ty.is_optional() {
                    return Err(TEK::UnwrapNonOptional(ty).at(expr.span));
                }
                Ok(ty.wrapped_type().clone())
            }
        }
    }

    fn typecheck_var_expr(
        &mut self,
        expr: &Expr,
        name: &str,
        write_only: bool,
    ) -> Result<Type, TypeCheckError> {
        let decl_id = self.find_decl(name, expr.span)?;
        self.tables.var_decls.insert(expr.id, decl_id);
        let decl = self.session.decl(decl_id);

        match &decl.kind {
            DeclKind::Var(_) => {
                if !write_only {
                    self.check_not_moved(decl_id, name, expr.span)?;
                }
                self.binding_type_of(decl_id)
            }
            DeclKind::Param(param) => {
                if !write_only {
                    self.check_not_moved(decl_id, name, expr.span)?;
                }
                Ok(param.ty.clone())
            }
            DeclKind::Function(_) => Ok(self.function_type(decl_id)),
            DeclKind::Field(field) => {
                let ty = field.ty.clone();
                if self.in_init_or_deinit() {
                    Ok(ty.as_mutable())
                } else if self.in_mutating_function() {
                    Ok(ty)
                } else {
                    Ok(ty.as_immutable())
                }
            }
            DeclKind::Type(_) | DeclKind::TypeTemplate(_) | DeclKind::Enum(_) => {
                Err(TEK::NotAVariable(name.to_string()).at(expr.span))
            }
            DeclKind::GenericParam(_)
            | DeclKind::FunctionTemplate(_)
            | DeclKind::Import(_) => Err(TEK::NotAVariable(name.to_string()).at(expr.span)),
        }
    }

    fn check_not_moved(
        &self,
        decl_id: DeclId,
        name: &str,
        span: Span,
    ) -> Result<(), TypeCheckError> {
        if self.moved.contains(&decl_id) {
            let ty = self.tables.binding_types.get(&decl_id).cloned();
            return Err(TEK::UseAfterMove {
                name: name.to_string(),
                ty,
            }
            .at(span));
        }
        Ok(())
    }

    /// The effective type of a var binding: annotation or the recorded
    /// inferred type, checked on demand for globals referenced before their
    /// declaration is visited.
    pub(crate) fn binding_type_of(&mut self, decl_id: DeclId) -> Result<Type, TypeCheckError> {
        if let Some(ty) = self.tables.binding_types.get(&decl_id) {
            return Ok(ty.clone());
        }
        self.typecheck_var_binding(decl_id)?;
        Ok(self.tables.binding_types[&decl_id].clone())
    }

    fn typecheck_array_literal(
        &mut self,
        span: Span,
        elements: &[Expr],
    ) -> Result<Type, TypeCheckError> {
        let Some(first) = elements.first() else {
            return Err(TEK::EmptyArrayLiteral.at(span));
        };
        let first_type = self.typecheck_expr(first, false)?;
        for element in &elements[1..] {
            let ty = self.typecheck_expr(element, false)?;
            if ty != first_type {
                return Err(TEK::ArrayElementTypeMismatch(first_type, ty).at(element.span));
            }
        }
        Ok(Type::sized_array(first_type, elements.len() as u64))
    }

    fn typecheck_prefix_expr(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
    ) -> Result<Type, TypeCheckError> {
        let operand_type = self.typecheck_expr(operand, false)?;

        match op {
            UnaryOp::Not => {
                if !operand_type.is_bool() {
                    return Err(TEK::LogicalNotOperandNotBool(operand_type).at(operand.span));
                }
                Ok(operand_type)
            }
            UnaryOp::Deref => {
                if operand_type.is_optional() && operand_type.wrapped_type().is_pointer() {
                    return Err(TEK::DerefOptionalPointer(operand_type).at(operand.span));
                }
                if !operand_type.is_pointer() {
                    return Err(TEK::DerefNonPointer(operand_type).at(operand.span));
                }
                Ok(operand_type.pointee().clone())
            }
            UnaryOp::AddrOf => {
                let mutable = operand_type.is_mutable();
                Ok(Type::Pointer {
                    pointee: Box::new(operand_type),
                    mutable,
                })
            }
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => Ok(operand_type),
        }
    }

    fn typecheck_binary_expr(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Type, TypeCheckError> {
        let left_type = self.typecheck_expr(lhs, false)?;
        let right_type = self.typecheck_expr(rhs, false)?;

        if op.is_range() {
            return self.typecheck_range_expr(op, lhs, rhs, left_type, right_type);
        }

        // Operators over user-defined operands resolve as a call to the
        // operator's name.
        if !is_builtin_operand(&left_type) || !is_builtin_operand(&right_type) {
            let site = CallSite {
                node: expr.id,
                span: expr.span,
                name: op.to_string(),
                args: vec![(None, lhs), (None, rhs)],
                generic_args: Vec::new(),
                receiver: None,
            };
            return self.typecheck_call_site(site);
        }

        if op.is_logical() {
            if left_type.is_bool() && right_type.is_bool() {
                return Ok(Type::bool());
            }
            return Err(self.invalid_operands(op, lhs, rhs, left_type, right_type));
        }

        if left_type.is_pointer()
            && right_type.is_integer()
            && matches!(op, BinaryOp::Add | BinaryOp::Sub)
        {
            return Ok(left_type);
        }

        if op.is_bitwise() && (left_type.is_floating_point() || right_type.is_floating_point()) {
            return Err(self.invalid_operands(op, lhs, rhs, left_type, right_type));
        }

        // Conversion is attempted right-to-left first; the order is observable
        // in which side ends up retyped.
        if self.convert_or_retype(rhs, &right_type, &left_type)? {
            // converted
        } else if self.convert_or_retype(lhs, &left_type, &right_type)? {
            // converted
        } else {
            return Err(self.invalid_operands(op, lhs, rhs, left_type, right_type));
        }

        if op.is_comparison() {
            Ok(Type::bool())
        } else {
            // Both sides now agree; the common type is the lhs's final type.
            Ok(self.tables.expr_type(lhs.id).clone())
        }
    }

    fn typecheck_range_expr(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        left_type: Type,
        right_type: Type,
    ) -> Result<Type, TypeCheckError> {
        if !left_type.is_integer() || !right_type.is_integer() {
            return Err(self.invalid_operands(op, lhs, rhs, left_type, right_type));
        }
        if !self.convert_or_retype(rhs, &right_type, &left_type)?
            && !self.convert_or_retype(lhs, &left_type, &right_type)?
        {
            return Err(self.invalid_operands(op, lhs, rhs, left_type, right_type));
        }
        let elem = self.tables.expr_type(lhs.id).clone();
        Ok(Type::range(elem, op == BinaryOp::RangeExcl))
    }

    fn invalid_operands(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        left_type: Type,
        right_type: Type,
    ) -> TypeCheckError {
        // Comparing a non-optional against null gets a dedicated hint.
        let null_operand = if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            if rhs.is_null_literal() {
                Some(left_type.clone())
            } else if lhs.is_null_literal() {
                Some(right_type.clone())
            } else {
                None
            }
        } else {
            None
        };
        TEK::InvalidBinaryOperands {
            lhs: left_type,
            rhs: right_type,
            op: op.to_string(),
            null_operand,
        }
        .at(lhs.span)
    }

    fn typecheck_member_expr(
        &mut self,
        expr: &Expr,
        base: &Expr,
        member: &str,
    ) -> Result<Type, TypeCheckError> {
        let mut base_type = self.typecheck_expr(base, false)?;
        if base_type.is_pointer() {
            base_type = base_type.pointee().clone();
        }

        if base_type.is_optional() {
            return Err(TEK::MemberOfOptional(base_type).at(base.span));
        }

        if base_type.is_array() {
            let mutable = self.expr_mutability(base);
            return match member {
                "data" => Ok(Type::Pointer {
                    pointee: Box::new(base_type.element_type().clone()),
                    mutable,
                }),
                "count" => Ok(Type::int()),
                _ => Err(TEK::NoSuchMember(member.to_string(), base_type).at(expr.span)),
            };
        }

        if base_type.is_string() {
            return match member {
                "data" => Ok(Type::pointer(Type::char())),
                "count" => Ok(Type::int()),
                _ => Err(TEK::NoSuchMember(member.to_string(), base_type).at(expr.span)),
            };
        }

        if base_type.is_basic() && !base_type.is_builtin_scalar() {
            if let Some(type_decl_id) = self.type_decl_for(&base_type)? {
                let type_decl = self.session.decl(type_decl_id);
                if let Some(type_data) = type_decl.as_type() {
                    for &field_id in &type_data.fields {
                        let field = self.session.decl(field_id);
                        if field.name != member {
                            continue;
                        }
                        let field_type = field.as_field().unwrap().ty.clone();
                        return Ok(if base_type.is_mutable() {
                            let base_is_this = matches!(
                                &base.kind,
                                ExprKind::Var { name } if name == "this"
                            );
                            if base_is_this && self.in_init_or_deinit() {
                                field_type.as_mutable()
                            } else {
                                field_type
                            }
                        } else {
                            field_type.as_immutable()
                        });
                    }
                }
            }
        }

        Err(TEK::NoSuchMember(member.to_string(), base_type).at(expr.span))
    }

    /// Structural mutability of an lvalue, for assignment-target checks.
    /// Flag-bearing checked types answer directly; arrays and tuples defer to
    /// the place they were derived from (their binding's `var`/`let`, or the
    /// base of the access chain). A pointer to an array stands for a view of
    /// the array, so its own flag decides.
    pub(crate) fn expr_mutability(&self, expr: &Expr) -> bool {
        if let Some(ty) = self.tables.expr_types.get(&expr.id) {
            if matches!(
                ty,
                Type::Basic { .. } | Type::Pointer { .. } | Type::Optional { .. }
            ) {
                return ty.is_mutable();
            }
        }
        match &expr.kind {
            ExprKind::Var { .. } => {
                let Some(&decl_id) = self.tables.var_decls.get(&expr.id) else {
                    return false;
                };
                let decl = self.session.decl(decl_id);
                match &decl.kind {
                    DeclKind::Var(var) => var.mutable,
                    DeclKind::Param(param) => param.ty.is_mutable(),
                    DeclKind::Field(_) => self.in_init_or_deinit() || self.in_mutating_function(),
                    _ => false,
                }
            }
            ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. } => {
                self.expr_mutability(base)
            }
            ExprKind::Prefix {
                op: UnaryOp::Deref,
                operand,
            } => match self.tables.expr_types.get(&operand.id) {
                Some(Type::Pointer { pointee, mutable }) => {
                    if pointee.is_basic() || pointee.is_pointer() || pointee.is_optional() {
                        pointee.is_mutable()
                    } else {
                        *mutable
                    }
                }
                _ => false,
            },
            ExprKind::Unwrap { operand } => self.expr_mutability(operand),
            _ => false,
        }
    }

    fn typecheck_subscript_expr(
        &mut self,
        base: &Expr,
        index: &Expr,
    ) -> Result<Type, TypeCheckError> {
        let base_type = self.typecheck_expr(base, false)?;

        let array_type = if base_type.is_array() {
            base_type.clone()
        } else if base_type.is_pointer() && base_type.pointee().is_array() {
            base_type.pointee().clone()
        } else {
            return Err(TEK::InvalidSubscriptTarget(base_type).at(base.span));
        };

        let index_type = self.typecheck_expr(index, false)?;
        if !self.convert_or_retype(index, &index_type, &Type::int())? {
            return Err(TEK::SubscriptIndexNotInt(index_type).at(index.span));
        }

        if let ArraySize::Fixed(size) = array_type.array_size() {
            if let ExprKind::IntLit { value } = &index.kind {
                if *value >= size as i128 {
                    return Err(TEK::SubscriptOutOfBounds(*value, size).at(index.span));
                }
            }
        }

        // Elements inherit the mutability of the place they live in.
        let elem = array_type.element_type().clone();
        let mutable = self.expr_mutability(base);
        Ok(elem.with_mutability(mutable))
    }
}

/// An operand type counts as builtin for operator purposes unless it is a
/// user-defined nominal type.
fn is_builtin_operand(ty: &Type) -> bool {
    !ty.is_basic() || ty.is_builtin_scalar()
}

/// Only pointer-shaped casts are legal: `void*` and `T*` interconvert when
/// the target's mutability is contained in the source's; optional pointers
/// follow the same rule pairwise.
fn is_valid_cast(source: &Type, target: &Type) -> bool {
    match source {
        Type::Pointer { pointee, .. } => {
            if let Type::Pointer {
                pointee: target_pointee,
                ..
            } = target
            {
                if pointee.is_void() && (!target_pointee.is_mutable() || pointee.is_mutable()) {
                    return true;
                }
                if target_pointee.is_void()
                    && (!target_pointee.is_mutable() || pointee.is_mutable())
                {
                    return true;
                }
            }
            false
        }
        Type::Optional { wrapped, .. } => {
            if let Type::Optional {
                wrapped: target_wrapped,
                ..
            } = target
            {
                wrapped.is_pointer()
                    && target_wrapped.is_pointer()
                    && is_valid_cast(wrapped, target_wrapped)
            } else {
                false
            }
        }
        _ => false,
    }
}
