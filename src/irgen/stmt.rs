//! Statement lowering.

use crate::ast::{BinaryOp, DeclId, Expr, ExprKind, Stmt, StmtKind, SwitchCase};
use crate::ir::{BlockId, ICmpCond, IntBinOp, IrType};
use crate::irgen::errors::IrGenErrorKind as GEK;
use crate::irgen::{IrGen, IrGenError};

impl<'a> IrGen<'a> {
    pub(crate) fn codegen_stmt(&mut self, stmt: &'a Stmt) -> Result<(), IrGenError> {
        match &stmt.kind {
            StmtKind::Return { value } => self.codegen_return_stmt(value.as_ref()),
            StmtKind::Var { decl } => self.codegen_var_stmt(*decl),
            StmtKind::Increment { operand } => self.codegen_step_stmt(operand, IntBinOp::Add),
            StmtKind::Decrement { operand } => self.codegen_step_stmt(operand, IntBinOp::Sub),
            StmtKind::Expr { expr } => self.codegen_expr_discard(expr),
            StmtKind::Defer { expr } => {
                self.defer_evaluation_of(expr);
                Ok(())
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => self.codegen_if_stmt(condition, then_body, else_body),
            StmtKind::Switch {
                condition,
                cases,
                default_stmts,
            } => self.codegen_switch_stmt(condition, cases, default_stmts),
            StmtKind::While { condition, body } => self.codegen_while_stmt(condition, body),
            StmtKind::For {
                binding,
                range,
                body,
            } => self.codegen_for_stmt(*binding, range, body),
            StmtKind::Break => {
                let target = *self.break_targets.last().expect("break outside a loop");
                self.builder.br(target);
                Ok(())
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                let addr = self.codegen_lvalue_expr(lhs)?;
                let value = self.codegen_expr(rhs)?;
                self.builder.store(value, addr);
                Ok(())
            }
        }
    }

    /// Every live scope runs its deferred expressions and deinit calls
    /// before the return, innermost outward, without popping.
    fn codegen_return_stmt(&mut self, value: Option<&'a Expr>) -> Result<(), IrGenError> {
        self.emit_all_scopes_for_return()?;

        match value {
            Some(expr) => {
                let result = self.codegen_expr(expr)?;
                self.builder.ret(Some(result));
            }
            None => {
                let func = self.builder.current_func();
                if self.func_is_main(func) {
                    let zero = self.builder.int_const(IrType::Int(32), 0);
                    self.builder.ret(Some(zero));
                } else {
                    self.builder.ret(None);
                }
            }
        }
        Ok(())
    }

    fn codegen_var_stmt(&mut self, decl_id: DeclId) -> Result<(), IrGenError> {
        let decl = self.decl(decl_id);
        let var = decl.as_var().expect("var statement decl");
        let ty = self.checked.binding_type(decl_id).clone();
        let ir_ty = self.to_ir(&ty)?;

        let alloca = self.builder.entry_alloca(ir_ty.clone(), decl.name.clone());
        self.set_local_value(Some(&ty), decl.name.clone(), alloca)?;

        if let Some(init) = &var.initializer {
            let value = self.codegen_expr_for_passing(init, &ir_ty, false)?;
            self.builder.store(value, alloca);
        }
        Ok(())
    }

    fn codegen_step_stmt(&mut self, operand: &'a Expr, op: IntBinOp) -> Result<(), IrGenError> {
        let addr = self.codegen_lvalue_expr(operand)?;
        let value = self.builder.load(addr);
        let one_ty = self.builder.value_type(value).clone();
        let one = self.builder.int_const(one_ty, 1);
        let result = self.builder.bin_op(op, value, one);
        self.builder.store(result, addr);
        Ok(())
    }

    /// Lowers a statement list into `destination`, closing the scope on
    /// exit and falling through to `continuation` when the block doesn't
    /// end in its own terminator.
    fn codegen_block(
        &mut self,
        stmts: &'a [Stmt],
        destination: BlockId,
        continuation: BlockId,
    ) -> Result<(), IrGenError> {
        let func = self.builder.current_func();
        self.builder.position_at_end(func, destination);

        self.begin_scope();
        for stmt in stmts {
            self.codegen_stmt(stmt)?;
            if stmt.is_return() || stmt.is_break() {
                break;
            }
        }
        self.end_scope()?;

        if !self.builder.has_terminator() {
            self.builder.br(continuation);
        }
        Ok(())
    }

    fn codegen_if_stmt(
        &mut self,
        condition: &'a Expr,
        then_body: &'a [Stmt],
        else_body: &'a [Stmt],
    ) -> Result<(), IrGenError> {
        let cond = self.codegen_expr(condition)?;
        let func = self.builder.current_func();
        let then_block = self.builder.create_block(func);
        let else_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);

        self.builder.cond_br(cond, then_block, else_block);
        self.codegen_block(then_body, then_block, end_block)?;
        self.codegen_block(else_body, else_block, end_block)?;
        self.builder.position_at_end(func, end_block);
        Ok(())
    }

    fn codegen_switch_stmt(
        &mut self,
        condition: &'a Expr,
        cases: &'a [SwitchCase],
        default_stmts: &'a [Stmt],
    ) -> Result<(), IrGenError> {
        let cond = self.codegen_expr(condition)?;
        let func = self.builder.current_func();

        let mut case_table = Vec::with_capacity(cases.len());
        for case in cases {
            let value = self.const_int_value(&case.value)?;
            let block = self.builder.create_block(func);
            case_table.push((value, block));
        }

        let default_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);
        self.break_targets.push(end_block);
        self.builder.switch(cond, case_table.clone(), default_block);

        for (case, (_, block)) in cases.iter().zip(&case_table) {
            self.codegen_block(&case.stmts, *block, end_block)?;
        }
        self.codegen_block(default_stmts, default_block, end_block)?;

        self.break_targets.pop();
        self.builder.position_at_end(func, end_block);
        Ok(())
    }

    /// Switch case values must be compile-time integer constants: literals,
    /// or immutable bindings initialized with one (imported enum cases).
    fn const_int_value(&self, expr: &Expr) -> Result<i128, IrGenError> {
        match &expr.kind {
            ExprKind::IntLit { value } => Ok(*value),
            ExprKind::CharLit { value } => Ok(*value as u8 as i128),
            ExprKind::Var { .. } => {
                let decl_id = self.checked.var_decl(expr.id);
                let decl = self.decl(decl_id);
                if let Some(var) = decl.as_var() {
                    if !var.mutable {
                        if let Some(Expr {
                            kind: ExprKind::IntLit { value },
                            ..
                        }) = var.initializer.as_ref()
                        {
                            return Ok(*value);
                        }
                    }
                }
                Err(GEK::NonConstantSwitchCase.at(expr.span))
            }
            _ => Err(GEK::NonConstantSwitchCase.at(expr.span)),
        }
    }

    fn codegen_while_stmt(
        &mut self,
        condition: &'a Expr,
        body: &'a [Stmt],
    ) -> Result<(), IrGenError> {
        let func = self.builder.current_func();
        let cond_block = self.builder.create_block(func);
        let body_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);
        self.break_targets.push(end_block);

        self.builder.br(cond_block);
        self.builder.position_at_end(func, cond_block);
        let cond = self.codegen_expr(condition)?;
        self.builder.cond_br(cond, body_block, end_block);

        self.codegen_block(body, body_block, cond_block)?;

        self.break_targets.pop();
        self.builder.position_at_end(func, end_block);
        Ok(())
    }

    /// `for id in lo..hi` desugars to a counter loop:
    ///
    /// ```text
    /// var id = lo;
    /// while (id < hi) {   // <= for inclusive ranges
    ///     ...body...
    ///     id++;
    /// }
    /// ```
    fn codegen_for_stmt(
        &mut self,
        binding: DeclId,
        range: &'a Expr,
        body: &'a [Stmt],
    ) -> Result<(), IrGenError> {
        let range_ty = self.expr_type(range).clone();
        if !range_ty.is_range() {
            return Err(GEK::NonRangeForLoop.at(range.span));
        }
        let elem = range_ty
            .iterable_element_type()
            .expect("range without an element type")
            .clone();
        if !elem.is_integer() {
            return Err(GEK::NonIntegerRange.at(range.span));
        }

        let ExprKind::Binary { op, lhs, rhs } = &range.kind else {
            panic!("range expression without bounds");
        };
        let exclusive = *op == BinaryOp::RangeExcl;

        self.begin_scope();
        let elem_ir = self.to_ir(&elem)?;
        let name = self.decl(binding).name.clone();
        let counter = self.builder.entry_alloca(elem_ir, name.clone());
        self.set_local_value(Some(&elem), name, counter)?;

        let start = self.codegen_expr(lhs)?;
        self.builder.store(start, counter);
        let last = self.codegen_expr(rhs)?;

        let func = self.builder.current_func();
        let cond_block = self.builder.create_block(func);
        let body_block = self.builder.create_block(func);
        let end_block = self.builder.create_block(func);
        self.break_targets.push(end_block);

        self.builder.br(cond_block);
        self.builder.position_at_end(func, cond_block);
        let current = self.builder.load(counter);
        let signed = self.expr_type(lhs).is_signed();
        let cond = match (exclusive, signed) {
            (true, true) => ICmpCond::Slt,
            (true, false) => ICmpCond::Ult,
            (false, true) => ICmpCond::Sle,
            (false, false) => ICmpCond::Ule,
        };
        let cmp = self.builder.icmp(cond, current, last);
        self.builder.cond_br(cmp, body_block, end_block);

        self.builder.position_at_end(func, body_block);
        self.begin_scope();
        for stmt in body {
            self.codegen_stmt(stmt)?;
            if stmt.is_return() || stmt.is_break() {
                break;
            }
        }
        self.end_scope()?;
        if !self.builder.has_terminator() {
            let value = self.builder.load(counter);
            let one_ty = self.builder.value_type(value).clone();
            let one = self.builder.int_const(one_ty, 1);
            let next = self.builder.bin_op(IntBinOp::Add, value, one);
            self.builder.store(next, counter);
            self.builder.br(cond_block);
        }

        self.break_targets.pop();
        self.builder.position_at_end(func, end_block);
        self.end_scope()
    }
}
