//! Shared fixture for cross-module tests.
//!
//! Parsing is an external collaborator, so tests assemble their input the way
//! the parser would: building expressions and statements through the AST
//! constructors and registering declarations in the session's symbol table.

use crate::ast::{
    Argument, BinaryOp, CallExpr, DeclId, DeclKind, Expr, ExprKind, FieldDecl, FunctionDecl,
    FunctionKind, FunctionTemplateDecl, GenericParamDecl, ModuleId, ParamDecl, Stmt, StmtKind,
    TypeDecl, TypeTag, TypeTemplateDecl, VarDecl,
};
use crate::context::{FileRef, Session};
use crate::diag::Span;
use crate::ir;
use crate::irgen::generate;
use crate::typecheck::{type_check, TypeCheckedContext};
use crate::types::Type;

pub(crate) struct Fixture {
    pub session: Session,
    pub module: ModuleId,
    pub file: FileRef,
}

impl Fixture {
    pub fn new() -> Self {
        let mut session = Session::new();
        let module = session.add_module("main");
        let file = session.add_file(module, "main.delta");
        Self {
            session,
            module,
            file,
        }
    }

    pub fn check(&mut self) -> Result<TypeCheckedContext, crate::typecheck::TypeCheckError> {
        type_check(&mut self.session, self.file)
    }

    pub fn compile(&mut self) -> Result<(TypeCheckedContext, ir::Module), crate::diag::CompileError> {
        let checked = type_check(&mut self.session, self.file)?;
        let module = generate(&self.session, &checked, self.file)?;
        Ok((checked, module))
    }

    // Expressions

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr::new(&mut self.session.node_ids, kind, Span::default())
    }

    pub fn int(&mut self, value: i128) -> Expr {
        self.expr(ExprKind::IntLit { value })
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::FloatLit { value })
    }

    pub fn boolean(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::BoolLit { value })
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::StringLit {
            value: value.to_string(),
        })
    }

    pub fn null(&mut self) -> Expr {
        self.expr(ExprKind::NullLit)
    }

    pub fn var(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Var {
            name: name.to_string(),
        })
    }

    pub fn array(&mut self, elements: Vec<Expr>) -> Expr {
        self.expr(ExprKind::ArrayLit { elements })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn prefix(&mut self, op: crate::ast::UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Prefix {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn member(&mut self, base: Expr, name: &str) -> Expr {
        self.expr(ExprKind::Member {
            base: Box::new(base),
            member: name.to_string(),
        })
    }

    pub fn subscript(&mut self, base: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Subscript {
            base: Box::new(base),
            index: Box::new(index),
        })
    }

    pub fn unwrap(&mut self, operand: Expr) -> Expr {
        self.expr(ExprKind::Unwrap {
            operand: Box::new(operand),
        })
    }

    pub fn call(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        let callee = self.var(name);
        self.expr(ExprKind::Call(CallExpr {
            callee: Box::new(callee),
            args: args.into_iter().map(Argument::unnamed).collect(),
            generic_args: Vec::new(),
        }))
    }

    pub fn call_generic(&mut self, name: &str, generic_args: Vec<Type>, args: Vec<Expr>) -> Expr {
        let callee = self.var(name);
        self.expr(ExprKind::Call(CallExpr {
            callee: Box::new(callee),
            args: args.into_iter().map(Argument::unnamed).collect(),
            generic_args,
        }))
    }

    pub fn method_call(&mut self, receiver: Expr, name: &str, args: Vec<Expr>) -> Expr {
        let callee = self.member(receiver, name);
        self.expr(ExprKind::Call(CallExpr {
            callee: Box::new(callee),
            args: args.into_iter().map(Argument::unnamed).collect(),
            generic_args: Vec::new(),
        }))
    }

    // Statements

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt::new(&mut self.session.node_ids, kind, Span::default())
    }

    /// `let name[: ty] = init`, an immutable binding.
    pub fn let_stmt(&mut self, name: &str, ty: Option<Type>, init: Expr) -> (Stmt, DeclId) {
        self.binding_stmt(name, ty, Some(init), false)
    }

    /// `var name[: ty] = init`, a mutable binding.
    pub fn var_stmt(&mut self, name: &str, ty: Option<Type>, init: Expr) -> (Stmt, DeclId) {
        self.binding_stmt(name, ty, Some(init), true)
    }

    fn binding_stmt(
        &mut self,
        name: &str,
        ty: Option<Type>,
        initializer: Option<Expr>,
        mutable: bool,
    ) -> (Stmt, DeclId) {
        let decl = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::Var(VarDecl {
                ty,
                initializer,
                mutable,
            }),
        );
        (self.stmt(StmtKind::Var { decl }), decl)
    }

    pub fn ret(&mut self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return { value })
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr { expr })
    }

    pub fn defer_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Defer { expr })
    }

    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Stmt {
        self.stmt(StmtKind::Assign {
            lhs,
            rhs,
            compound: false,
        })
    }

    pub fn if_stmt(&mut self, condition: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_body,
            else_body,
        })
    }

    pub fn while_stmt(&mut self, condition: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { condition, body })
    }

    pub fn break_stmt(&mut self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn for_stmt(&mut self, binding: &str, range: Expr, body: Vec<Stmt>) -> Stmt {
        let decl = self.session.decl_table.add(
            binding,
            self.module,
            DeclKind::Var(VarDecl {
                ty: None,
                initializer: None,
                mutable: false,
            }),
        );
        self.stmt(StmtKind::For {
            binding: decl,
            range,
            body,
        })
    }

    // Declarations

    fn param_decls(&mut self, module: ModuleId, params: &[(&str, Type)]) -> Vec<DeclId> {
        params
            .iter()
            .map(|(name, ty)| {
                self.session
                    .decl_table
                    .add(*name, module, DeclKind::Param(ParamDecl { ty: ty.clone() }))
            })
            .collect()
    }

    pub fn add_function(
        &mut self,
        name: &str,
        params: &[(&str, Type)],
        return_type: Type,
        body: Vec<Stmt>,
    ) -> DeclId {
        self.add_function_in(self.module, name, params, return_type, Some(body), false)
    }

    pub fn add_extern_function(
        &mut self,
        name: &str,
        params: &[(&str, Type)],
        return_type: Type,
    ) -> DeclId {
        self.add_function_in(self.module, name, params, return_type, None, true)
    }

    pub fn add_function_in(
        &mut self,
        module: ModuleId,
        name: &str,
        params: &[(&str, Type)],
        return_type: Type,
        body: Option<Vec<Stmt>>,
        is_extern: bool,
    ) -> DeclId {
        let param_decls = self.param_decls(module, params);
        let decl = self.session.decl_table.add(
            name,
            module,
            DeclKind::Function(FunctionDecl {
                kind: FunctionKind::Free,
                receiver: None,
                params: param_decls,
                return_type,
                body,
                mutating: false,
                variadic: false,
                is_extern,
                asm_label: None,
            }),
        );
        self.session.add_to_symbol_table(decl);
        if module == self.module {
            self.session.file_mut(self.file).decls.push(decl);
        }
        decl
    }

    /// A generic free function `name<T, ...>(params) -> ret { body }`.
    pub fn add_function_template(
        &mut self,
        name: &str,
        generic_params: &[&str],
        params: &[(&str, Type)],
        return_type: Type,
        body: Vec<Stmt>,
    ) -> DeclId {
        let generic_decls: Vec<DeclId> = generic_params
            .iter()
            .map(|param| {
                self.session.decl_table.add(
                    *param,
                    self.module,
                    DeclKind::GenericParam(GenericParamDecl { constraint: None }),
                )
            })
            .collect();
        let param_decls = self.param_decls(self.module, params);
        let inner = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::Function(FunctionDecl {
                kind: FunctionKind::Free,
                receiver: None,
                params: param_decls,
                return_type,
                body: Some(body),
                mutating: false,
                variadic: false,
                is_extern: false,
                asm_label: None,
            }),
        );
        let template = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::FunctionTemplate(FunctionTemplateDecl {
                generic_params: generic_decls,
                function: inner,
            }),
        );
        self.session.add_to_symbol_table(template);
        self.session.file_mut(self.file).decls.push(template);
        template
    }

    /// A struct with plain fields; members are attached afterwards with
    /// `add_method`/`add_init`/`add_deinit`.
    pub fn add_struct(
        &mut self,
        name: &str,
        fields: &[(&str, Type)],
        pass_by_value: bool,
    ) -> DeclId {
        let field_decls: Vec<DeclId> = fields
            .iter()
            .map(|(field_name, ty)| {
                self.session.decl_table.add(
                    *field_name,
                    self.module,
                    DeclKind::Field(FieldDecl { ty: ty.clone() }),
                )
            })
            .collect();
        let decl = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::Type(TypeDecl {
                tag: TypeTag::Struct,
                fields: field_decls,
                methods: Vec::new(),
                generic_params: Vec::new(),
                generic_args: Vec::new(),
                pass_by_value,
                interface: false,
            }),
        );
        self.session.add_to_symbol_table(decl);
        self.session.file_mut(self.file).decls.push(decl);
        decl
    }

    fn add_member(
        &mut self,
        receiver: DeclId,
        kind: FunctionKind,
        name: &str,
        params: &[(&str, Type)],
        return_type: Type,
        body: Vec<Stmt>,
        mutating: bool,
    ) -> DeclId {
        let param_decls = self.param_decls(self.module, params);
        let decl = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::Function(FunctionDecl {
                kind,
                receiver: Some(receiver),
                params: param_decls,
                return_type,
                body: Some(body),
                mutating,
                variadic: false,
                is_extern: false,
                asm_label: None,
            }),
        );
        self.session.add_to_symbol_table(decl);
        self.attach_member(receiver, decl);
        decl
    }

    /// Re-creates the receiver's type decl with the member attached; members
    /// and their type reference each other, so the fixture rebuilds the decl
    /// the way a parser's second pass would.
    fn attach_member(&mut self, receiver: DeclId, member: DeclId) {
        let mut type_decl = self
            .session
            .decl(receiver)
            .as_type()
            .expect("member on non-type decl")
            .clone();
        type_decl.methods.push(member);
        self.session
            .decl_table
            .set_kind(receiver, DeclKind::Type(type_decl));
    }

    pub fn add_method(
        &mut self,
        receiver: DeclId,
        name: &str,
        params: &[(&str, Type)],
        return_type: Type,
        body: Vec<Stmt>,
        mutating: bool,
    ) -> DeclId {
        self.add_member(
            receiver,
            FunctionKind::Method,
            name,
            params,
            return_type,
            body,
            mutating,
        )
    }

    pub fn add_init(
        &mut self,
        receiver: DeclId,
        params: &[(&str, Type)],
        body: Vec<Stmt>,
    ) -> DeclId {
        let name = self.session.decl(receiver).name.clone();
        self.add_member(
            receiver,
            FunctionKind::Init,
            &name,
            params,
            Type::void(),
            body,
            false,
        )
    }

    pub fn add_deinit(&mut self, receiver: DeclId, body: Vec<Stmt>) -> DeclId {
        self.add_member(
            receiver,
            FunctionKind::Deinit,
            "deinit",
            &[],
            Type::void(),
            body,
            false,
        )
    }

    /// A generic struct template `name<T, ...>` with the given fields.
    pub fn add_type_template(
        &mut self,
        name: &str,
        generic_params: &[&str],
        fields: &[(&str, Type)],
        pass_by_value: bool,
    ) -> (DeclId, DeclId) {
        let generic_decls: Vec<DeclId> = generic_params
            .iter()
            .map(|param| {
                self.session.decl_table.add(
                    *param,
                    self.module,
                    DeclKind::GenericParam(GenericParamDecl { constraint: None }),
                )
            })
            .collect();
        let field_decls: Vec<DeclId> = fields
            .iter()
            .map(|(field_name, ty)| {
                self.session.decl_table.add(
                    *field_name,
                    self.module,
                    DeclKind::Field(FieldDecl { ty: ty.clone() }),
                )
            })
            .collect();
        let inner = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::Type(TypeDecl {
                tag: TypeTag::Struct,
                fields: field_decls,
                methods: Vec::new(),
                generic_params: generic_decls.clone(),
                generic_args: Vec::new(),
                pass_by_value,
                interface: false,
            }),
        );
        let template = self.session.decl_table.add(
            name,
            self.module,
            DeclKind::TypeTemplate(TypeTemplateDecl {
                generic_params: generic_decls,
                type_decl: inner,
            }),
        );
        self.session.add_to_symbol_table(template);
        self.session.file_mut(self.file).decls.push(template);
        (template, inner)
    }

    /// Formats one lowered function by its IR name.
    pub fn format_func(module: &ir::Module, name: &str) -> String {
        let id = module
            .func_by_name(name)
            .unwrap_or_else(|| panic!("no function named {name}"));
        ir::format_function(module, module.func(id))
    }
}
