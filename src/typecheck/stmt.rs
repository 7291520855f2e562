//! Statement type checking.

use crate::ast::{DeclId, Stmt, StmtKind};
use crate::typecheck::errors::TypeCheckErrorKind as TEK;
use crate::typecheck::{Sema, TypeCheckError};
use crate::types::Type;

impl Sema<'_> {
    pub(crate) fn typecheck_stmt(&mut self, stmt: &Stmt) -> Result<(), TypeCheckError> {
        match &stmt.kind {
            StmtKind::Return { value } => {
                let return_type = self.current_return_type().unwrap_or_else(Type::void);
                match value {
                    Some(expr) => {
                        if return_type.is_void() {
                            return Err(TEK::ReturnValueUnexpected.at(expr.span));
                        }
                        let ty = self.typecheck_expr(expr, false)?;
                        if !self.convert_or_retype(expr, &ty, &return_type)? {
                            return Err(TEK::ReturnTypeMismatch(return_type, ty).at(expr.span));
                        }
                        Ok(())
                    }
                    None => {
                        if !return_type.is_void() {
                            return Err(TEK::ReturnValueMissing(return_type).at(stmt.span));
                        }
                        Ok(())
                    }
                }
            }
            StmtKind::Var { decl } => {
                self.typecheck_var_binding(*decl)?;
                let name = self.session.decl(*decl).name.clone();
                self.insert_binding(name, *decl);
                Ok(())
            }
            StmtKind::Increment { operand } => {
                let ty = self.typecheck_expr(operand, false)?;
                if !ty.is_integer() {
                    return Err(TEK::IncrementNonInteger(ty).at(operand.span));
                }
                if !self.expr_mutability(operand) {
                    return Err(TEK::AssignToImmutable(ty).at(operand.span));
                }
                Ok(())
            }
            StmtKind::Decrement { operand } => {
                let ty = self.typecheck_expr(operand, false)?;
                if !ty.is_integer() {
                    return Err(TEK::DecrementNonInteger(ty).at(operand.span));
                }
                if !self.expr_mutability(operand) {
                    return Err(TEK::AssignToImmutable(ty).at(operand.span));
                }
                Ok(())
            }
            StmtKind::Expr { expr } | StmtKind::Defer { expr } => {
                self.typecheck_expr(expr, false)?;
                Ok(())
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let cond_type = self.typecheck_expr(condition, false)?;
                if !cond_type.is_bool() {
                    return Err(TEK::CondNotBool(cond_type).at(condition.span));
                }
                self.typecheck_stmts(then_body)?;
                self.typecheck_stmts(else_body)
            }
            StmtKind::Switch {
                condition,
                cases,
                default_stmts,
            } => {
                let cond_type = self.typecheck_expr(condition, false)?;
                for case in cases {
                    let case_type = self.typecheck_expr(&case.value, false)?;
                    if !self.convert_or_retype(&case.value, &case_type, &cond_type)? {
                        return Err(
                            TEK::SwitchCaseTypeMismatch(case_type, cond_type).at(case.value.span)
                        );
                    }
                    self.typecheck_stmts(&case.stmts)?;
                }
                self.typecheck_stmts(default_stmts)
            }
            StmtKind::While { condition, body } => {
                let cond_type = self.typecheck_expr(condition, false)?;
                if !cond_type.is_bool() {
                    return Err(TEK::CondNotBool(cond_type).at(condition.span));
                }
                self.typecheck_stmts(body)
            }
            StmtKind::For {
                binding,
                range,
                body,
            } => {
                let range_type = self.typecheck_expr(range, false)?;
                let Some(elem) = range_type.iterable_element_type() else {
                    return Err(TEK::NonIterableRange(range_type).at(range.span));
                };
                self.tables.binding_types.insert(*binding, elem.clone());
                self.push_scope();
                let name = self.session.decl(*binding).name.clone();
                self.insert_binding(name, *binding);
                for inner in body {
                    self.typecheck_stmt(inner)?;
                }
                self.pop_scope();
                Ok(())
            }
            StmtKind::Break => Ok(()),
            StmtKind::Assign { lhs, rhs, .. } => {
                let lhs_type = self.typecheck_expr(lhs, true)?;
                if !lhs.is_lvalue() {
                    return Err(TEK::InvalidAssignmentTarget.at(lhs.span));
                }
                if !self.expr_mutability(lhs) {
                    return Err(TEK::AssignToImmutable(lhs_type).at(lhs.span));
                }
                let rhs_type = self.typecheck_expr(rhs, false)?;
                if !self.convert_or_retype(rhs, &rhs_type, &lhs_type)? {
                    let null_operand = if rhs.is_null_literal() && !lhs_type.is_optional() {
                        Some(lhs_type.clone())
                    } else {
                        None
                    };
                    return Err(
                        TEK::AssignTypeMismatch(lhs_type, rhs_type, null_operand).at(stmt.span)
                    );
                }
                Ok(())
            }
        }
    }

    /// Checks a var binding and records its effective type: the annotation
    /// when present (with the initializer converted to it), the initializer's
    /// type otherwise.
    pub(crate) fn typecheck_var_binding(&mut self, decl_id: DeclId) -> Result<(), TypeCheckError> {
        if self.tables.binding_types.contains_key(&decl_id) {
            return Ok(());
        }
        let decl = self.session.decl(decl_id);
        let var = decl.as_var().expect("var binding decl").clone();

        let ty = match (&var.ty, &var.initializer) {
            (Some(annotated), Some(init)) => {
                let init_type = self.typecheck_expr(init, false)?;
                if !self.convert_or_retype(init, &init_type, annotated)? {
                    return Err(
                        TEK::VarInitTypeMismatch(annotated.clone(), init_type).at(init.span)
                    );
                }
                annotated.clone()
            }
            (None, Some(init)) => {
                let init_type = self.typecheck_expr(init, false)?;
                if init_type.is_null() {
                    return Err(TEK::VarMissingType(decl.name.clone()).at(init.span));
                }
                init_type
            }
            (Some(annotated), None) => annotated.clone(),
            (None, None) => {
                return Err(TEK::VarMissingType(decl.name.clone()).at(decl.span));
            }
        };

        self.tables
            .binding_types
            .insert(decl_id, ty.with_mutability(var.mutable));
        Ok(())
    }
}
