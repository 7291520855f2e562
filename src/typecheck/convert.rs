//! Implicit convertibility: the type system's unidirectional
//! "assign-without-cast" relation, plus the copyability predicate used by
//! move checking.

use crate::ast::{DeclId, DeclKind, Expr, ExprKind};
use crate::typecheck::errors::TypeCheckErrorKind as TEK;
use crate::typecheck::{Sema, TypeCheckError};
use crate::types::{ArraySize, Type};

/// Result of an implicit-conversion test. `Yes(Some(ty))` means the source
/// expression should be retyped to `ty`.
#[derive(Debug, Clone, PartialEq)]
pub enum Convertibility {
    No,
    Yes(Option<Type>),
}

impl Convertibility {
    pub fn is_yes(&self) -> bool {
        matches!(self, Convertibility::Yes(_))
    }
}

impl Sema<'_> {
    /// Tests whether `source` implicitly converts to `target`. The rules are
    /// ordered; reorderings change overload resolution and error messages.
    ///
    /// Out-of-range integer literals against a requested integer type are a
    /// hard error, not a failed conversion.
    pub(crate) fn is_convertible(
        &mut self,
        source_expr: Option<&Expr>,
        source: &Type,
        target: &Type,
    ) -> Result<Convertibility, TypeCheckError> {
        // An optional target accepts anything its wrapped type accepts.
        if target.is_optional() {
            let wrapped = target.wrapped_type().clone();
            let inner = self.is_convertible(source_expr, source, &wrapped)?;
            if inner.is_yes() {
                return Ok(inner);
            }
        }

        // Structural congruence by source kind.
        match source {
            Type::Basic {
                name, generic_args, ..
            } => {
                if let Type::Basic {
                    name: target_name,
                    generic_args: target_args,
                    ..
                } = target
                {
                    if name == target_name && generic_args == target_args {
                        return Ok(Convertibility::Yes(None));
                    }
                }
            }
            Type::Array { elem, size } => {
                if let Type::Array {
                    elem: target_elem,
                    size: target_size,
                } = target
                {
                    let size_ok = size == target_size || *target_size == ArraySize::Unsized;
                    if size_ok {
                        let elem = elem.as_ref().clone();
                        let target_elem = target_elem.as_ref().clone();
                        if self.is_convertible(None, &elem, &target_elem)?.is_yes() {
                            return Ok(Convertibility::Yes(None));
                        }
                    }
                }
            }
            Type::Tuple { subtypes } => {
                if let Type::Tuple {
                    subtypes: target_subtypes,
                } = target
                {
                    if subtypes == target_subtypes {
                        return Ok(Convertibility::Yes(None));
                    }
                }
            }
            Type::Function {
                return_type,
                param_types,
            } => {
                if let Type::Function {
                    return_type: target_return,
                    param_types: target_params,
                } = target
                {
                    if return_type == target_return && param_types == target_params {
                        return Ok(Convertibility::Yes(None));
                    }
                }
            }
            Type::Pointer { pointee, .. } => {
                if let Type::Pointer {
                    pointee: target_pointee,
                    ..
                } = target
                {
                    // A mutable pointee converts to an immutable view, never
                    // the other way.
                    if pointee.is_mutable() || !target_pointee.is_mutable() {
                        let pointee = pointee.as_ref().clone();
                        let target_pointee = target_pointee.as_ref().clone();
                        if self.is_convertible(None, &pointee, &target_pointee)?.is_yes() {
                            return Ok(Convertibility::Yes(None));
                        }
                    }
                }
            }
            Type::Optional { wrapped, .. } => {
                if let Type::Optional {
                    wrapped: target_wrapped,
                    ..
                } = target
                {
                    if wrapped.is_mutable() || !target_wrapped.is_mutable() {
                        let wrapped = wrapped.as_ref().clone();
                        let target_wrapped = target_wrapped.as_ref().clone();
                        if self.is_convertible(None, &wrapped, &target_wrapped)?.is_yes() {
                            return Ok(Convertibility::Yes(None));
                        }
                    }
                }
            }
            Type::Range { .. } | Type::Null => {}
        }

        // Interface subtyping.
        if source.is_basic() && self.is_interface(target)? {
            let source_decl = self.type_decl_for(source)?;
            let target_decl = self.type_decl_for(target)?;
            if let (Some(source_decl), Some(target_decl)) = (source_decl, target_decl) {
                if self.implements_interface(source_decl, target_decl) {
                    return Ok(Convertibility::Yes(None));
                }
            }
        }

        if let Some(expr) = source_expr {
            // Autocast integer and character literals to the requested
            // integer type if within range; error out if not.
            let literal_value = match &expr.kind {
                ExprKind::IntLit { value } => Some(*value),
                ExprKind::CharLit { value } => Some(*value as u8 as i128),
                _ => None,
            };
            if let Some(value) = literal_value {
                if target.is_integer() {
                    if target.int_in_range(value) {
                        return Ok(Convertibility::Yes(Some(target.clone())));
                    }
                    return Err(TEK::LiteralOutOfRange(value, target.clone()).at(expr.span));
                }
                if target.is_floating_point() && expr.is_int_literal() {
                    return Ok(Convertibility::Yes(Some(target.clone())));
                }
            }

            if expr.is_null_literal() && target.is_optional() {
                return Ok(Convertibility::Yes(Some(target.clone())));
            }

            // String literals pass as C strings (const char pointers),
            // optionally wrapped.
            if matches!(expr.kind, ExprKind::StringLit { .. }) {
                let unwrapped = target.remove_optional();
                if unwrapped.is_pointer()
                    && unwrapped.pointee().is_char()
                    && !unwrapped.pointee().is_mutable()
                {
                    return Ok(Convertibility::Yes(Some(target.clone())));
                }
            }
        }

        // By-reference argument passing: a basic value converts to a pointer
        // to a compatible pointee.
        let unwrapped_target = target.remove_optional().clone();
        if source.is_basic() && unwrapped_target.is_pointer() {
            let pointee = unwrapped_target.pointee().clone();
            if self.is_convertible(source_expr, source, &pointee)?.is_yes() {
                return Ok(Convertibility::Yes(Some(source.clone())));
            }
        }

        if source.is_array() && unwrapped_target.is_pointer() && unwrapped_target.pointee().is_array()
        {
            let elem = source.element_type().clone();
            let target_elem = unwrapped_target.pointee().element_type().clone();
            if self.is_convertible(None, &elem, &target_elem)?.is_yes() {
                return Ok(Convertibility::Yes(Some(source.clone())));
            }
        }

        // Element-wise tuple conversion, driven by the literal's elements.
        if let (Type::Tuple { subtypes }, Type::Tuple { subtypes: target_subtypes }) =
            (source, target)
        {
            if subtypes.len() == target_subtypes.len() {
                let elements: Vec<Option<&Expr>> = match source_expr.map(|e| &e.kind) {
                    Some(ExprKind::TupleLit { elements }) => elements.iter().map(Some).collect(),
                    _ => vec![None; subtypes.len()],
                };
                let mut converted = Vec::with_capacity(subtypes.len());
                let mut all_convertible = true;
                for ((element, sub), target_sub) in
                    elements.into_iter().zip(subtypes).zip(target_subtypes)
                {
                    match self.is_convertible(element, sub, target_sub)? {
                        Convertibility::Yes(retyped) => {
                            converted.push(retyped.unwrap_or_else(|| sub.clone()));
                        }
                        Convertibility::No => {
                            all_convertible = false;
                            break;
                        }
                    }
                }
                if all_convertible {
                    return Ok(Convertibility::Yes(Some(Type::tuple(converted))));
                }
            }
        }

        Ok(Convertibility::No)
    }

    /// Tests convertibility and retypes the source expression on success.
    pub(crate) fn convert_or_retype(
        &mut self,
        expr: &Expr,
        source: &Type,
        target: &Type,
    ) -> Result<bool, TypeCheckError> {
        match self.is_convertible(Some(expr), source, target)? {
            Convertibility::Yes(converted) => {
                let final_type = converted.unwrap_or_else(|| source.clone());
                self.tables.expr_types.insert(expr.id, final_type);
                Ok(true)
            }
            Convertibility::No => Ok(false),
        }
    }

    pub(crate) fn is_interface(&mut self, ty: &Type) -> Result<bool, TypeCheckError> {
        if !ty.is_basic() || ty.is_builtin_scalar() {
            return Ok(false);
        }
        let decl = self.type_decl_for(ty)?;
        Ok(decl.is_some_and(|id| {
            self.session
                .decl(id)
                .as_type()
                .is_some_and(|type_decl| type_decl.interface)
        }))
    }

    /// A type implements an interface iff it declares every required field
    /// (matched by name and type) and every required method (matched by
    /// signature).
    pub(crate) fn implements_interface(&self, type_decl: DeclId, interface: DeclId) -> bool {
        let type_data = self.session.decl(type_decl);
        let interface_data = self.session.decl(interface);
        let (Some(type_decl), Some(interface_decl)) =
            (type_data.as_type(), interface_data.as_type())
        else {
            return false;
        };

        for &required_field in &interface_decl.fields {
            let required = self.session.decl(required_field);
            let required_ty = &required.as_field().unwrap().ty;
            let satisfied = type_decl.fields.iter().any(|&field| {
                let field_data = self.session.decl(field);
                field_data.name == required.name
                    && &field_data.as_field().unwrap().ty == required_ty
            });
            if !satisfied {
                return false;
            }
        }

        for &required_method in &interface_decl.methods {
            let required = self.session.decl(required_method);
            let Some(required_func) = required.as_function() else {
                continue;
            };
            let required_params: Vec<Type> = required_func
                .params
                .iter()
                .map(|&p| self.param_type(p))
                .collect();
            let satisfied = type_decl.methods.iter().any(|&method| {
                let method_data = self.session.decl(method);
                let Some(func) = method_data.as_function() else {
                    return false;
                };
                let params: Vec<Type> = func.params.iter().map(|&p| self.param_type(p)).collect();
                method_data.name == required.name
                    && params == required_params
                    && func.return_type == required_func.return_type
            });
            if !satisfied {
                return false;
            }
        }
        true
    }

    /// Whether values of this type copy implicitly at call boundaries.
    /// Non-copyable arguments are moved into the callee.
    pub(crate) fn is_implicitly_copyable(&mut self, ty: &Type) -> Result<bool, TypeCheckError> {
        Ok(match ty {
            Type::Basic { .. } => {
                if ty.is_builtin_scalar() {
                    true
                } else {
                    match self.type_decl_for(ty)? {
                        Some(decl) => match &self.session.decl(decl).kind {
                            DeclKind::Type(type_decl) => type_decl.pass_by_value,
                            _ => true,
                        },
                        None => true,
                    }
                }
            }
            Type::Array { .. } => false,
            Type::Tuple { subtypes } => {
                let subtypes = subtypes.clone();
                let mut all = true;
                for sub in &subtypes {
                    if !self.is_implicitly_copyable(sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            Type::Function { .. } => true,
            Type::Pointer { .. } => true,
            Type::Optional { wrapped, .. } => {
                let wrapped = wrapped.as_ref().clone();
                self.is_implicitly_copyable(&wrapped)?
            }
            Type::Range { .. } | Type::Null => true,
        })
    }
}
