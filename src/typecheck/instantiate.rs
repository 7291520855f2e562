//! Lazy generic instantiation.
//!
//! Instantiations are cloned with fresh node and decl ids, their types
//! rewritten under the generic-argument substitution, then queued for a
//! check of their own. Insertion happens before the body is checked so
//! mutually recursive generics converge.

use indexmap::IndexMap;

use crate::ast::{
    DeclId, DeclKind, Expr, ExprKind, FieldDecl, FunctionDecl, ParamDecl, Stmt, StmtKind,
    SwitchCase, TypeDecl, VarDecl,
};
use crate::mangle::mangle_type;
use crate::typecheck::{Sema, TypeCheckError};
use crate::types::Type;

type Substitutions = IndexMap<String, Type>;

impl Sema<'_> {
    /// Returns the concrete function for a template applied to the given
    /// generic arguments, creating and queueing it on first use.
    pub(crate) fn instantiate_function_template(
        &mut self,
        template_id: DeclId,
        generic_args: &[Type],
    ) -> Result<DeclId, TypeCheckError> {
        let key = (template_id, generic_args.to_vec());
        if let Some(&existing) = self.function_insts.get(&key) {
            return Ok(existing);
        }

        let template_decl = self.session.decl(template_id);
        let template = template_decl
            .as_function_template()
            .expect("instantiating a non-template");
        let subs = self.substitutions_for(&template.generic_params, generic_args);
        let instantiated = self.instantiate_function(template.function, &subs, None);

        self.function_insts.insert(key, instantiated);
        self.decls_to_typecheck.push_back(instantiated);
        Ok(instantiated)
    }

    /// Instantiates a type template: the type declaration is cloned with its
    /// generic parameters substituted and registered in the symbol table
    /// under its mangled name, members included.
    pub(crate) fn instantiate_type_template(
        &mut self,
        template_id: DeclId,
        generic_args: &[Type],
    ) -> Result<DeclId, TypeCheckError> {
        let template_decl = self.session.decl(template_id);
        let template = template_decl
            .as_type_template()
            .expect("instantiating a non-template");
        let inner_decl = self.session.decl(template.type_decl);
        let inner = inner_decl.as_type().expect("type template without a type");

        let mangled = mangle_type(&template_decl.name, generic_args);
        if let Some(&existing) = self.session.find_decls_everywhere(&mangled).first() {
            return Ok(existing);
        }

        let subs = self.substitutions_for(&template.generic_params, generic_args);
        let module = template_decl.module;

        let type_id = self
            .session
            .decl_table
            .add_reserved(inner_decl.name.clone(), module);

        let fields: Vec<DeclId> = inner
            .fields
            .iter()
            .map(|&field_id| {
                let field = self.session.decl(field_id);
                let ty = field.as_field().unwrap().ty.substitute(&subs);
                self.session
                    .decl_table
                    .add(field.name.clone(), module, DeclKind::Field(FieldDecl { ty }))
            })
            .collect();

        let methods: Vec<DeclId> = inner
            .methods
            .iter()
            .map(|&method_id| self.instantiate_function(method_id, &subs, Some(type_id)))
            .collect();

        self.session.decl_table.set_kind(
            type_id,
            DeclKind::Type(TypeDecl {
                tag: inner.tag,
                fields,
                methods: methods.clone(),
                generic_params: Vec::new(),
                generic_args: generic_args.to_vec(),
                pass_by_value: inner.pass_by_value,
                interface: inner.interface,
            }),
        );

        self.session.add_to_symbol_table_as(type_id, mangled);
        for method in methods {
            self.session.add_to_symbol_table(method);
            self.decls_to_typecheck.push_back(method);
        }
        Ok(type_id)
    }

    fn substitutions_for(&self, generic_params: &[DeclId], generic_args: &[Type]) -> Substitutions {
        debug_assert_eq!(generic_params.len(), generic_args.len());
        generic_params
            .iter()
            .zip(generic_args)
            .map(|(&param, arg)| (self.session.decl(param).name.clone(), arg.clone()))
            .collect()
    }

    /// Deep-clones a function declaration, substituting types in its
    /// signature and body and allocating fresh ids throughout.
    fn instantiate_function(
        &mut self,
        func_id: DeclId,
        subs: &Substitutions,
        receiver_override: Option<DeclId>,
    ) -> DeclId {
        let decl = self.session.decl(func_id);
        let func = decl.as_function().expect("instantiating a non-function");

        let params: Vec<DeclId> = func
            .params
            .iter()
            .map(|&param_id| {
                let param = self.session.decl(param_id);
                let ty = param.as_param().unwrap().ty.substitute(subs);
                self.session
                    .decl_table
                    .add(param.name.clone(), decl.module, DeclKind::Param(ParamDecl { ty }))
            })
            .collect();

        let body = func
            .body
            .as_ref()
            .map(|stmts| self.clone_stmts(stmts, subs));

        let instantiated = FunctionDecl {
            kind: func.kind,
            receiver: receiver_override.or(func.receiver),
            params,
            return_type: func.return_type.substitute(subs),
            body,
            mutating: func.mutating,
            variadic: func.variadic,
            is_extern: func.is_extern,
            asm_label: func.asm_label.clone(),
        };
        self.session.decl_table.add(
            decl.name.clone(),
            decl.module,
            DeclKind::Function(instantiated),
        )
    }

    fn clone_stmts(&mut self, stmts: &[Stmt], subs: &Substitutions) -> Vec<Stmt> {
        stmts.iter().map(|stmt| self.clone_stmt(stmt, subs)).collect()
    }

    fn clone_stmt(&mut self, stmt: &Stmt, subs: &Substitutions) -> Stmt {
        let kind = match &stmt.kind {
            StmtKind::Return { value } => StmtKind::Return {
                value: value.as_ref().map(|v| self.clone_expr(v, subs)),
            },
            StmtKind::Var { decl } => StmtKind::Var {
                decl: self.clone_var_decl(*decl, subs),
            },
            StmtKind::Increment { operand } => StmtKind::Increment {
                operand: self.clone_expr(operand, subs),
            },
            StmtKind::Decrement { operand } => StmtKind::Decrement {
                operand: self.clone_expr(operand, subs),
            },
            StmtKind::Expr { expr } => StmtKind::Expr {
                expr: self.clone_expr(expr, subs),
            },
            StmtKind::Defer { expr } => StmtKind::Defer {
                expr: self.clone_expr(expr, subs),
            },
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => StmtKind::If {
                condition: self.clone_expr(condition, subs),
                then_body: self.clone_stmts(then_body, subs),
                else_body: self.clone_stmts(else_body, subs),
            },
            StmtKind::Switch {
                condition,
                cases,
                default_stmts,
            } => StmtKind::Switch {
                condition: self.clone_expr(condition, subs),
                cases: cases
                    .iter()
                    .map(|case| SwitchCase {
                        value: self.clone_expr(&case.value, subs),
                        stmts: self.clone_stmts(&case.stmts, subs),
                    })
                    .collect(),
                default_stmts: self.clone_stmts(default_stmts, subs),
            },
            StmtKind::While { condition, body } => StmtKind::While {
                condition: self.clone_expr(condition, subs),
                body: self.clone_stmts(body, subs),
            },
            StmtKind::For {
                binding,
                range,
                body,
            } => StmtKind::For {
                binding: self.clone_var_decl(*binding, subs),
                range: self.clone_expr(range, subs),
                body: self.clone_stmts(body, subs),
            },
            StmtKind::Break => StmtKind::Break,
            StmtKind::Assign { lhs, rhs, compound } => StmtKind::Assign {
                lhs: self.clone_expr(lhs, subs),
                rhs: self.clone_expr(rhs, subs),
                compound: *compound,
            },
        };
        Stmt {
            id: self.session.node_ids.next(),
            kind,
            span: stmt.span,
        }
    }

    fn clone_var_decl(&mut self, decl_id: DeclId, subs: &Substitutions) -> DeclId {
        let decl = self.session.decl(decl_id);
        let var = decl.as_var().expect("local binding decl");
        let cloned = VarDecl {
            ty: var.ty.as_ref().map(|ty| ty.substitute(subs)),
            initializer: var
                .initializer
                .as_ref()
                .map(|init| self.clone_expr(init, subs)),
            mutable: var.mutable,
        };
        self.session
            .decl_table
            .add(decl.name.clone(), decl.module, DeclKind::Var(cloned))
    }

    fn clone_expr(&mut self, expr: &Expr, subs: &Substitutions) -> Expr {
        let kind = match &expr.kind {
            ExprKind::Var { name } => ExprKind::Var { name: name.clone() },
            ExprKind::StringLit { value } => ExprKind::StringLit {
                value: value.clone(),
            },
            ExprKind::CharLit { value } => ExprKind::CharLit { value: *value },
            ExprKind::IntLit { value } => ExprKind::IntLit { value: *value },
            ExprKind::FloatLit { value } => ExprKind::FloatLit { value: *value },
            ExprKind::BoolLit { value } => ExprKind::BoolLit { value: *value },
            ExprKind::NullLit => ExprKind::NullLit,
            ExprKind::ArrayLit { elements } => ExprKind::ArrayLit {
                elements: elements.iter().map(|e| self.clone_expr(e, subs)).collect(),
            },
            ExprKind::TupleLit { elements } => ExprKind::TupleLit {
                elements: elements.iter().map(|e| self.clone_expr(e, subs)).collect(),
            },
            ExprKind::Prefix { op, operand } => ExprKind::Prefix {
                op: *op,
                operand: Box::new(self.clone_expr(operand, subs)),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: Box::new(self.clone_expr(lhs, subs)),
                rhs: Box::new(self.clone_expr(rhs, subs)),
            },
            ExprKind::Call(call) => ExprKind::Call(crate::ast::CallExpr {
                callee: Box::new(self.clone_expr(&call.callee, subs)),
                args: call
                    .args
                    .iter()
                    .map(|arg| crate::ast::Argument {
                        name: arg.name.clone(),
                        value: self.clone_expr(&arg.value, subs),
                    })
                    .collect(),
                generic_args: call
                    .generic_args
                    .iter()
                    .map(|ty| ty.substitute(subs))
                    .collect(),
            }),
            ExprKind::Cast { target, operand } => ExprKind::Cast {
                target: target.substitute(subs),
                operand: Box::new(self.clone_expr(operand, subs)),
            },
            ExprKind::Sizeof { target } => ExprKind::Sizeof {
                target: target.substitute(subs),
            },
            ExprKind::Member { base, member } => ExprKind::Member {
                base: Box::new(self.clone_expr(base, subs)),
                member: member.clone(),
            },
            ExprKind::Subscript { base, index } => ExprKind::Subscript {
                base: Box::new(self.clone_expr(base, subs)),
                index: Box::new(self.clone_expr(index, subs)),
            },
            ExprKind::Unwrap { operand } => ExprKind::Unwrap {
                operand: Box::new(self.clone_expr(operand, subs)),
            },
        };
        Expr {
            id: self.session.node_ids.next(),
            kind,
            span: expr.span,
        }
    }
}
