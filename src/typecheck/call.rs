//! Call checking: candidate collection, argument validation, overload
//! resolution with its tie-breaker ladder, and generic-argument inference.

use crate::ast::{
    CallExpr, DeclId, DeclKind, Expr, ExprKind, FunctionKind, NodeId,
};
use crate::diag::Span;
use crate::mangle::{mangle_member, mangle_type};
use crate::typecheck::errors::TypeCheckErrorKind as TEK;
use crate::typecheck::{Convertibility, ResolvedCallee, Sema, TypeCheckError};
use crate::types::{is_builtin_scalar_name, Type};

/// A call being resolved: either a real call expression or a binary operator
/// reinterpreted as a call to the operator's name.
pub(crate) struct CallSite<'e> {
    pub node: NodeId,
    pub span: Span,
    pub name: String,
    pub args: Vec<(Option<String>, &'e Expr)>,
    pub generic_args: Vec<Type>,
    pub receiver: Option<&'e Expr>,
}

/// A candidate's parameter list, flattened to labels and types.
struct ParamInfo {
    name: String,
    ty: Type,
}

struct Candidate {
    decl: DeclId,
    generic_args: Vec<Type>,
    /// Total conversion cost of the argument match; used to disambiguate
    /// literal autocasts before the tie-breaker ladder runs.
    rank: u32,
}

impl Sema<'_> {
    pub(crate) fn typecheck_call_expr(
        &mut self,
        expr: &Expr,
        call: &CallExpr,
    ) -> Result<Type, TypeCheckError> {
        if !call.calls_named_function() {
            return Err(TEK::AnonymousCallUnsupported.at(expr.span));
        }

        let name = call.function_name().to_string();
        if is_builtin_scalar_name(&name) {
            return self.typecheck_builtin_conversion(expr, call, &name);
        }

        let site = CallSite {
            node: expr.id,
            span: expr.span,
            name,
            args: call
                .args
                .iter()
                .map(|arg| (arg.name.clone(), &arg.value))
                .collect(),
            generic_args: call.generic_args.clone(),
            receiver: call.receiver(),
        };
        self.typecheck_call_site(site)
    }

    /// A call whose callee names a builtin scalar is a conversion.
    fn typecheck_builtin_conversion(
        &mut self,
        expr: &Expr,
        call: &CallExpr,
        name: &str,
    ) -> Result<Type, TypeCheckError> {
        if call.args.len() != 1 {
            return Err(TEK::ConversionArgCount.at(expr.span));
        }
        if !call.generic_args.is_empty() {
            return Err(TEK::ConversionGenericArgs.at(expr.span));
        }
        let arg = &call.args[0];
        if arg.name.is_some() {
            return Err(TEK::ConversionNamedArg.at(expr.span));
        }
        self.typecheck_expr(&arg.value, false)?;
        Ok(Type::basic(name))
    }

    pub(crate) fn typecheck_call_site(
        &mut self,
        site: CallSite<'_>,
    ) -> Result<Type, TypeCheckError> {
        let mut receiver_type = None;

        if let Some(receiver) = site.receiver {
            let ty = self.typecheck_expr(receiver, false)?;
            if ty.is_optional() {
                return Err(TEK::CallOnOptionalReceiver(ty).at(receiver.span));
            }
            if ty.remove_pointer().is_array() {
                if site.name == "size" {
                    self.validate_generic_arg_count(0, &site)?;
                    self.validate_args(&site, false, None, &[], false, Some(&site.name))?;
                    return Ok(Type::int());
                }
                return Err(TEK::NoSuchMethod(ty, site.name.clone()).at(site.span));
            }
            receiver_type = Some(ty);
        }

        if let Some(ty) = self.typecheck_intrinsic_call(&site, receiver_type.as_ref())? {
            return Ok(ty);
        }

        let candidates = self.collect_candidates(&site, receiver_type.as_ref())?;
        let (selected, generic_args, is_init) =
            self.resolve_overload(&site, candidates, receiver_type.as_ref())?;

        // Mark non-copyable arguments as moved into the callee.
        let params = self.callee_param_infos(selected);
        for (param, (_, arg_expr)) in params.iter().zip(&site.args) {
            if !self.is_implicitly_copyable(&param.ty)? {
                self.mark_moved(arg_expr);
            }
        }

        let selected_decl = self.session.decl(selected);
        let func = selected_decl.as_function();

        // Calls to sibling methods without an explicit receiver go through
        // `this`.
        if receiver_type.is_none() {
            if let Some(func) = func {
                if func.is_member() && func.kind != FunctionKind::Init {
                    let Some(this_decl) = self.lookup_local("this") else {
                        return Err(TEK::UnknownIdentifier("this".to_string()).at(site.span));
                    };
                    receiver_type = Some(self.param_type(this_decl));
                }
            }
        }

        if let Some(func) = func {
            if func.kind == FunctionKind::Method && func.mutating {
                if let Some(receiver_ty) = &receiver_type {
                    if !receiver_ty.remove_pointer().is_mutable() {
                        return Err(TEK::MutatingMethodOnImmutable(
                            site.name.clone(),
                            receiver_ty.clone(),
                        )
                        .at(site.span));
                    }
                }
            }
        }

        let mangled_name = self.mangled_callee_name(selected, &generic_args);
        self.tables.callees.insert(
            site.node,
            ResolvedCallee {
                decl: selected,
                generic_args: generic_args.clone(),
                receiver_type: receiver_type.clone(),
                mangled_name,
            },
        );

        // Result type.
        if is_init {
            let receiver = func
                .and_then(|f| f.receiver)
                .expect("initializer without a receiver type");
            return Ok(self.type_decl_self_type(receiver));
        }
        match &selected_decl.kind {
            DeclKind::Function(func) => Ok(func.return_type.clone()),
            DeclKind::Var(_) | DeclKind::Param(_) | DeclKind::Field(_) => {
                let ty = self.callee_function_type(selected);
                Ok(ty.return_type().clone())
            }
            _ => unreachable!("invalid callee decl"),
        }
    }

    /// `sizeOf<T>()` and `pointer.offsetUnsafely(offset)` are reserved; they
    /// have no declaration and lower to dedicated instructions.
    fn typecheck_intrinsic_call(
        &mut self,
        site: &CallSite<'_>,
        receiver_type: Option<&Type>,
    ) -> Result<Option<Type>, TypeCheckError> {
        if site.name == "sizeOf" && site.receiver.is_none() {
            if site.generic_args.len() != 1 {
                return Err(TEK::TooFewGenericArguments(site.name.clone(), 1).at(site.span));
            }
            if !site.args.is_empty() {
                return Err(TEK::TooManyArguments(site.name.clone(), 0).at(site.span));
            }
            return Ok(Some(Type::uint64()));
        }

        if site.name == "offsetUnsafely" {
            if let Some(receiver_ty) = receiver_type {
                if !receiver_ty.is_pointer() {
                    return Ok(None);
                }
                if site.args.len() != 1 {
                    return Err(TEK::TooManyArguments(site.name.clone(), 1).at(site.span));
                }
                let (_, offset) = &site.args[0];
                let offset_ty = self.typecheck_expr(offset, false)?;
                if !self.convert_or_retype(offset, &offset_ty, &Type::int64())? {
                    return Err(
                        TEK::InvalidArgumentType(1, offset_ty, site.name.clone(), Type::int64())
                            .at(offset.span),
                    );
                }
                return Ok(Some(receiver_ty.clone()));
            }
        }

        Ok(None)
    }

    fn collect_candidates(
        &mut self,
        site: &CallSite<'_>,
        receiver_type: Option<&Type>,
    ) -> Result<Vec<DeclId>, TypeCheckError> {
        match receiver_type {
            Some(receiver_ty) => {
                let base = receiver_ty.remove_pointer().clone();
                if !base.is_basic() {
                    return Err(
                        TEK::NoSuchMethod(receiver_ty.clone(), site.name.clone()).at(site.span)
                    );
                }
                let receiver_decl = self.type_decl_for(&base)?;
                let key = mangle_member(
                    &mangle_type(base.name(), base.generic_args()),
                    &site.name,
                );
                let found = match receiver_decl {
                    Some(decl) => self.session.find_decls_with_receiver(self.file, &key, decl),
                    None => self.session.find_decls(self.file, &key),
                };
                if found.is_empty() {
                    return Err(
                        TEK::NoSuchMethod(receiver_ty.clone(), site.name.clone()).at(site.span)
                    );
                }
                Ok(found)
            }
            None => {
                let found = self.session.find_decls(self.file, &site.name);
                if found.is_empty() {
                    return Err(TEK::UnknownIdentifier(site.name.clone()).at(site.span));
                }
                Ok(found)
            }
        }
    }

    fn resolve_overload(
        &mut self,
        site: &CallSite<'_>,
        candidates: Vec<DeclId>,
        receiver_type: Option<&Type>,
    ) -> Result<(DeclId, Vec<Type>, bool), TypeCheckError> {
        let mut matches: Vec<Candidate> = Vec::new();
        let mut is_init_call = false;
        let mut at_least_one_function = false;
        let sole_candidate = candidates.len() == 1;

        for decl_id in candidates {
            let decl = self.session.decl(decl_id);
            match &decl.kind {
                DeclKind::FunctionTemplate(template) => {
                    at_least_one_function = true;
                    let generic_params = template.generic_params.clone();
                    if !site.generic_args.is_empty()
                        && site.generic_args.len() != generic_params.len()
                    {
                        if sole_candidate {
                            self.validate_generic_arg_count(generic_params.len(), site)?;
                        }
                        continue;
                    }

                    let inner = self.session.decl(template.function);
                    let params = inner.as_function().expect("template function").params.clone();
                    let Some(generic_args) =
                        self.generic_args_for_call(&generic_params, site, &params)?
                    else {
                        continue;
                    };

                    let instantiated =
                        self.instantiate_function_template(decl_id, &generic_args)?;
                    let param_infos = self.callee_param_infos(instantiated);
                    let inst_decl = self.session.decl(instantiated);
                    let func = inst_decl.as_function().unwrap();

                    if sole_candidate {
                        self.validate_args(
                            site,
                            func.mutating,
                            receiver_type,
                            &param_infos,
                            func.variadic,
                            Some(&site.name),
                        )?;
                        return Ok((instantiated, generic_args, false));
                    }
                    if let Some(rank) = self.validate_args(
                        site,
                        func.mutating,
                        receiver_type,
                        &param_infos,
                        func.variadic,
                        None,
                    )? {
                        matches.push(Candidate {
                            decl: instantiated,
                            generic_args,
                            rank,
                        });
                    }
                }
                DeclKind::Function(func) => {
                    at_least_one_function = true;
                    let mutating = func.mutating;
                    let variadic = func.variadic;
                    let param_infos = self.callee_param_infos(decl_id);

                    if sole_candidate {
                        self.validate_generic_arg_count(0, site)?;
                        self.validate_args(
                            site,
                            mutating,
                            receiver_type,
                            &param_infos,
                            variadic,
                            Some(&site.name),
                        )?;
                        return Ok((decl_id, Vec::new(), func.kind == FunctionKind::Init));
                    }
                    if func.kind == FunctionKind::Init {
                        is_init_call = true;
                    }
                    if let Some(rank) = self.validate_args(
                        site,
                        mutating,
                        receiver_type,
                        &param_infos,
                        variadic,
                        None,
                    )? {
                        matches.push(Candidate {
                            decl: decl_id,
                            generic_args: Vec::new(),
                            rank,
                        });
                    }
                }
                DeclKind::Type(_) => {
                    is_init_call = true;
                    at_least_one_function = true;
                    self.validate_generic_arg_count(0, site)?;

                    let key = mangle_member(&decl.name, "init");
                    let init_decls = self.session.find_decls(self.file, &key);
                    let report_mode = init_decls.len() == 1;
                    for init_id in init_decls {
                        let init_decl = self.session.decl(init_id);
                        let Some(init_func) = init_decl.as_function() else {
                            continue;
                        };
                        let variadic = init_func.variadic;
                        let param_infos = self.callee_param_infos(init_id);
                        if report_mode {
                            self.validate_args(
                                site,
                                false,
                                receiver_type,
                                &param_infos,
                                variadic,
                                Some(&site.name),
                            )?;
                            return Ok((init_id, Vec::new(), true));
                        }
                        if let Some(rank) = self.validate_args(
                            site,
                            false,
                            receiver_type,
                            &param_infos,
                            variadic,
                            None,
                        )? {
                            matches.push(Candidate {
                                decl: init_id,
                                generic_args: Vec::new(),
                                rank,
                            });
                        }
                    }
                }
                DeclKind::TypeTemplate(template) => {
                    is_init_call = true;
                    at_least_one_function = true;
                    let generic_params = template.generic_params.clone();
                    let inner_type = self.session.decl(template.type_decl);
                    let init_ids: Vec<DeclId> = inner_type
                        .as_type()
                        .map(|t| {
                            t.methods
                                .iter()
                                .copied()
                                .filter(|&m| {
                                    self.session
                                        .decl(m)
                                        .as_function()
                                        .is_some_and(|f| f.kind == FunctionKind::Init)
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    let report_mode = init_ids.len() == 1;

                    for init_id in init_ids {
                        let init_params = self
                            .session
                            .decl(init_id)
                            .as_function()
                            .expect("init decl")
                            .params
                            .clone();
                        let Some(generic_args) =
                            self.generic_args_for_call(&generic_params, site, &init_params)?
                        else {
                            continue;
                        };

                        let inst_type =
                            self.instantiate_type_template(decl_id, &generic_args)?;
                        let inst_inits: Vec<DeclId> = self
                            .session
                            .decl(inst_type)
                            .as_type()
                            .map(|t| {
                                t.methods
                                    .iter()
                                    .copied()
                                    .filter(|&m| {
                                        self.session
                                            .decl(m)
                                            .as_function()
                                            .is_some_and(|f| f.kind == FunctionKind::Init)
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();

                        for inst_init in inst_inits {
                            let variadic = self
                                .session
                                .decl(inst_init)
                                .as_function()
                                .unwrap()
                                .variadic;
                            let param_infos = self.callee_param_infos(inst_init);
                            if report_mode {
                                self.validate_args(
                                    site,
                                    false,
                                    receiver_type,
                                    &param_infos,
                                    variadic,
                                    Some(&site.name),
                                )?;
                                return Ok((inst_init, generic_args, true));
                            }
                            if let Some(rank) = self.validate_args(
                                site,
                                false,
                                receiver_type,
                                &param_infos,
                                variadic,
                                None,
                            )? {
                                matches.push(Candidate {
                                    decl: inst_init,
                                    generic_args: generic_args.clone(),
                                    rank,
                                });
                            }
                        }
                    }
                }
                DeclKind::Var(_) | DeclKind::Param(_) | DeclKind::Field(_) => {
                    let Some(param_infos) = self.function_typed_value_params(decl_id)? else {
                        continue;
                    };
                    if let Some(rank) =
                        self.validate_args(site, false, receiver_type, &param_infos, false, None)?
                    {
                        matches.push(Candidate {
                            decl: decl_id,
                            generic_args: Vec::new(),
                            rank,
                        });
                    }
                }
                _ => continue,
            }
        }

        match matches.len() {
            1 => {
                let selected = matches.remove(0);
                Ok((selected.decl, selected.generic_args, is_init_call))
            }
            0 => {
                if at_least_one_function {
                    let arg_types = site
                        .args
                        .iter()
                        .map(|(_, arg)| {
                            self.tables
                                .expr_types
                                .get(&arg.id)
                                .map(|t| t.to_string())
                                .unwrap_or_else(|| "???".to_string())
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    Err(TEK::NoMatchingOverload {
                        name: site.name.clone(),
                        arg_types,
                        is_init_call,
                    }
                    .at(site.span))
                } else {
                    Err(TEK::NotAFunction(site.name.clone()).at(site.span))
                }
            }
            _ => self.break_overload_tie(site, matches, receiver_type, is_init_call),
        }
    }

    /// Tie-breakers, in order: lowest literal-conversion cost, mutating
    /// methods on mutable receivers, a unique standard-library candidate,
    /// and foreign-header unanimity (accept the first).
    fn break_overload_tie(
        &mut self,
        site: &CallSite<'_>,
        matches: Vec<Candidate>,
        receiver_type: Option<&Type>,
        is_init_call: bool,
    ) -> Result<(DeclId, Vec<Type>, bool), TypeCheckError> {
        let min_rank = matches.iter().map(|m| m.rank).min().unwrap();
        let cheapest: Vec<&Candidate> = matches.iter().filter(|m| m.rank == min_rank).collect();
        if cheapest.len() == 1 {
            let selected = cheapest[0];
            return Ok((selected.decl, selected.generic_args.clone(), is_init_call));
        }

        if site.receiver.is_some()
            && receiver_type.is_some_and(|ty| ty.remove_pointer().is_mutable())
        {
            let mutating_matches: Vec<&Candidate> = matches
                .iter()
                .filter(|m| {
                    let decl = self.session.decl(m.decl);
                    match decl.as_function() {
                        Some(func) if func.kind == FunctionKind::Method => func.mutating,
                        _ => true,
                    }
                })
                .collect();
            if mutating_matches.len() == 1 {
                let selected = mutating_matches[0];
                return Ok((selected.decl, selected.generic_args.clone(), is_init_call));
            }
        }

        let std_matches: Vec<&Candidate> = matches
            .iter()
            .filter(|m| {
                let module = self.session.decl(m.decl).module;
                self.session.module(module).is_std()
            })
            .collect();
        if std_matches.len() == 1 {
            let selected = std_matches[0];
            return Ok((selected.decl, selected.generic_args.clone(), is_init_call));
        }

        let all_foreign = matches.iter().all(|m| {
            let module = self.session.decl(m.decl).module;
            self.session.module(module).is_foreign_header()
        });
        if all_foreign {
            let selected = &matches[0];
            return Ok((selected.decl, selected.generic_args.clone(), is_init_call));
        }

        let name = if is_init_call {
            format!("{}.init", site.name)
        } else {
            site.name.clone()
        };
        Err(TEK::AmbiguousOverload(name).at(site.span))
    }

    /// Validates receiver mutability, arity, labels, and per-argument
    /// convertibility. Reports errors when `report_as` names the callee,
    /// otherwise returns `None` on the first mismatch. On success returns the
    /// total literal-conversion cost of the match.
    fn validate_args(
        &mut self,
        site: &CallSite<'_>,
        is_mutating: bool,
        receiver_type: Option<&Type>,
        params: &[ParamInfo],
        variadic: bool,
        report_as: Option<&str>,
    ) -> Result<Option<u32>, TypeCheckError> {
        if site.receiver.is_some() && is_mutating {
            if let Some(receiver_ty) = receiver_type {
                if !receiver_ty.remove_pointer().is_mutable() {
                    let Some(name) = report_as else {
                        return Ok(None);
                    };
                    return Err(TEK::MutatingMethodOnImmutable(
                        name.to_string(),
                        receiver_ty.clone(),
                    )
                    .at(site.span));
                }
            }
        }

        if site.args.len() < params.len() {
            let Some(name) = report_as else {
                return Ok(None);
            };
            return Err(TEK::TooFewArguments(name.to_string(), params.len(), variadic).at(site.span));
        }
        if !variadic && site.args.len() > params.len() {
            let Some(name) = report_as else {
                return Ok(None);
            };
            return Err(TEK::TooManyArguments(name.to_string(), params.len()).at(site.span));
        }

        let mut rank = 0;
        for (index, (arg_name, arg_expr)) in site.args.iter().enumerate() {
            let param = params.get(index);

            if let Some(arg_name) = arg_name {
                let label_matches = param.is_some_and(|p| &p.name == arg_name);
                if !label_matches {
                    if report_as.is_none() {
                        return Ok(None);
                    }
                    let param_name = param.map(|p| p.name.clone()).unwrap_or_default();
                    return Err(
                        TEK::InvalidArgumentName(arg_name.clone(), param_name).at(arg_expr.span)
                    );
                }
            }

            let arg_type = self.typecheck_expr(arg_expr, false)?;
            if let Some(param) = param {
                let param_ty = param.ty.clone();
                match self.is_convertible(Some(arg_expr), &arg_type, &param_ty)? {
                    Convertibility::Yes(converted) => {
                        let final_type = converted.unwrap_or_else(|| arg_type.clone());
                        self.tables.expr_types.insert(arg_expr.id, final_type);
                        rank += conversion_rank(arg_expr, &param_ty);
                    }
                    Convertibility::No => {
                        let Some(name) = report_as else {
                            return Ok(None);
                        };
                        return Err(TEK::InvalidArgumentType(
                            index + 1,
                            arg_type,
                            name.to_string(),
                            param_ty,
                        )
                        .at(arg_expr.span));
                    }
                }
            }
        }

        Ok(Some(rank))
    }

    fn validate_generic_arg_count(
        &self,
        expected: usize,
        site: &CallSite<'_>,
    ) -> Result<(), TypeCheckError> {
        if site.generic_args.len() < expected {
            return Err(TEK::TooFewGenericArguments(site.name.clone(), expected).at(site.span));
        }
        if site.generic_args.len() > expected {
            return Err(TEK::TooManyGenericArguments(site.name.clone(), expected).at(site.span));
        }
        Ok(())
    }

    // Generic inference

    /// Explicit generic args are taken as-is; otherwise they are inferred
    /// from the argument types. Constraints are checked either way. `None`
    /// means inference failed and the candidate should be discarded.
    fn generic_args_for_call(
        &mut self,
        generic_params: &[DeclId],
        site: &CallSite<'_>,
        params: &[DeclId],
    ) -> Result<Option<Vec<Type>>, TypeCheckError> {
        let generic_args = if site.generic_args.is_empty() {
            if site.args.is_empty() {
                return Err(TEK::CannotInferGenericArgs.at(site.span));
            }
            match self.infer_generic_args(generic_params, site, params)? {
                Some(args) => args,
                None => return Ok(None),
            }
        } else {
            site.generic_args.clone()
        };

        for (&param_id, arg) in generic_params.iter().zip(&generic_args) {
            let param = self.session.decl(param_id);
            let Some(constraint) = param
                .as_generic_param()
                .and_then(|p| p.constraint.clone())
            else {
                continue;
            };
            let interface_decl = self
                .session
                .find_decls(self.file, &constraint)
                .into_iter()
                .find(|&id| self.session.decl(id).is_type());
            let implements = match (arg.is_basic(), interface_decl) {
                (true, Some(interface)) => {
                    match self.type_decl_for(arg)? {
                        Some(arg_decl) => self.implements_interface(arg_decl, interface),
                        None => false,
                    }
                }
                _ => false,
            };
            if !implements {
                return Err(
                    TEK::InterfaceNotImplemented(arg.clone(), constraint.clone()).at(site.span)
                );
            }
        }

        Ok(Some(generic_args))
    }

    /// For each generic parameter, scans parameter types that mention it and
    /// extracts the corresponding shape position from the argument types.
    /// Conflicting bindings are reconciled through implicit convertibility in
    /// either direction, keeping the more general side.
    fn infer_generic_args(
        &mut self,
        generic_params: &[DeclId],
        site: &CallSite<'_>,
        params: &[DeclId],
    ) -> Result<Option<Vec<Type>>, TypeCheckError> {
        if site.args.len() != params.len() {
            return Ok(None);
        }

        let mut inferred = Vec::with_capacity(generic_params.len());

        for &generic_param in generic_params {
            let param_name = self.session.decl(generic_param).name.clone();
            let mut generic_arg: Option<Type> = None;
            let mut generic_arg_expr: Option<&Expr> = None;

            for (&param_id, (_, arg_expr)) in params.iter().zip(&site.args) {
                let param_ty = self.param_type(param_id);
                if !contains_generic_param(&param_ty, &param_name) {
                    continue;
                }

                let arg_ty = self.typecheck_expr(arg_expr, false)?;
                let Some(candidate) = find_generic_arg(&arg_ty, &param_ty, &param_name) else {
                    continue;
                };

                match &generic_arg {
                    None => {
                        generic_arg = Some(candidate);
                        generic_arg_expr = Some(arg_expr);
                    }
                    Some(current) => {
                        let current = current.clone();
                        if self.convert_or_retype(arg_expr, &candidate, &current)? {
                            continue;
                        }
                        let previous_expr = generic_arg_expr.expect("binding without source expr");
                        if self.convert_or_retype(previous_expr, &current, &candidate)? {
                            generic_arg = Some(candidate.with_mutability(current.is_mutable()));
                            generic_arg_expr = Some(arg_expr);
                        } else {
                            return Err(TEK::ConflictingGenericArgs {
                                param: param_name.clone(),
                                function: site.name.clone(),
                                first: current,
                                second: candidate,
                            }
                            .at(site.span));
                        }
                    }
                }
            }

            match generic_arg {
                Some(ty) => inferred.push(ty),
                None => return Ok(None),
            }
        }

        Ok(Some(inferred))
    }

    // Candidate parameter plumbing

    fn callee_param_infos(&self, decl_id: DeclId) -> Vec<ParamInfo> {
        let decl = self.session.decl(decl_id);
        match &decl.kind {
            DeclKind::Function(func) => func
                .params
                .iter()
                .map(|&param| {
                    let param_decl = self.session.decl(param);
                    ParamInfo {
                        name: param_decl.name.clone(),
                        ty: param_decl.as_param().unwrap().ty.clone(),
                    }
                })
                .collect(),
            DeclKind::Var(_) | DeclKind::Param(_) | DeclKind::Field(_) => {
                let ty = self.callee_function_type(decl_id);
                ty.param_types()
                    .iter()
                    .map(|t| ParamInfo {
                        name: String::new(),
                        ty: t.clone(),
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// The function type carried by a function-typed var, param, or field.
    fn callee_function_type(&self, decl_id: DeclId) -> Type {
        let decl = self.session.decl(decl_id);
        match &decl.kind {
            DeclKind::Var(var) => var.ty.clone().expect("function-typed var without a type"),
            DeclKind::Param(param) => param.ty.clone(),
            DeclKind::Field(field) => field.ty.clone(),
            _ => unreachable!("not a value decl"),
        }
    }

    fn function_typed_value_params(
        &mut self,
        decl_id: DeclId,
    ) -> Result<Option<Vec<ParamInfo>>, TypeCheckError> {
        let decl = self.session.decl(decl_id);
        let ty = match &decl.kind {
            DeclKind::Var(var) => match &var.ty {
                Some(ty) => ty.clone(),
                None => self.binding_type_of(decl_id)?,
            },
            DeclKind::Param(param) => param.ty.clone(),
            DeclKind::Field(field) => field.ty.clone(),
            _ => return Ok(None),
        };
        if !ty.is_function() {
            return Ok(None);
        }
        Ok(Some(
            ty.param_types()
                .iter()
                .map(|t| ParamInfo {
                    name: String::new(),
                    ty: t.clone(),
                })
                .collect(),
        ))
    }

    fn mark_moved(&mut self, arg: &Expr) {
        if let ExprKind::Var { .. } = arg.kind {
            if let Some(&decl) = self.tables.var_decls.get(&arg.id) {
                let decl_data = self.session.decl(decl);
                if decl_data.is_var() || decl_data.is_param() {
                    self.moved.insert(decl);
                }
            }
        }
    }
}

/// Conversion cost of one argument: exact or structural matches are free,
/// literal-to-integer autocasts are cheaper than literal-to-float, so
/// `f(3)` prefers `f(x: int64)` over `f(x: float64)`.
fn conversion_rank(arg: &Expr, target: &Type) -> u32 {
    let is_literal = matches!(arg.kind, ExprKind::IntLit { .. } | ExprKind::CharLit { .. });
    if !is_literal {
        return 0;
    }
    if target.is_integer() {
        1
    } else if target.is_floating_point() {
        2
    } else {
        0
    }
}

fn contains_generic_param(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Basic {
            name: type_name,
            generic_args,
            ..
        } => {
            generic_args.iter().any(|arg| contains_generic_param(arg, name)) || type_name == name
        }
        Type::Array { elem, .. } => contains_generic_param(elem, name),
        Type::Pointer { pointee, .. } => contains_generic_param(pointee, name),
        Type::Optional { wrapped, .. } => contains_generic_param(wrapped, name),
        Type::Tuple { subtypes } => subtypes.iter().any(|t| contains_generic_param(t, name)),
        Type::Function {
            return_type,
            param_types,
        } => {
            contains_generic_param(return_type, name)
                || param_types.iter().any(|t| contains_generic_param(t, name))
        }
        Type::Range { elem, .. } => contains_generic_param(elem, name),
        Type::Null => false,
    }
}

/// Extracts the binding for `name` by walking the argument and parameter
/// types in lockstep.
fn find_generic_arg(arg_ty: &Type, param_ty: &Type, name: &str) -> Option<Type> {
    if let Type::Basic {
        name: param_name, ..
    } = param_ty
    {
        if param_name == name {
            return Some(arg_ty.clone());
        }
    }

    match (arg_ty, param_ty) {
        (
            Type::Basic {
                name: arg_name,
                generic_args: arg_args,
                ..
            },
            Type::Basic {
                name: param_name,
                generic_args: param_args,
                ..
            },
        ) if !arg_args.is_empty() && arg_name == param_name => {
            debug_assert_eq!(arg_args.len(), param_args.len());
            arg_args
                .iter()
                .zip(param_args)
                .find_map(|(arg, param)| find_generic_arg(arg, param, name))
        }
        (Type::Array { elem: arg_elem, .. }, Type::Array { elem: param_elem, .. }) => {
            find_generic_arg(arg_elem, param_elem, name)
        }
        (
            Type::Pointer {
                pointee: arg_pointee,
                ..
            },
            Type::Pointer {
                pointee: param_pointee,
                ..
            },
        ) => find_generic_arg(arg_pointee, param_pointee, name),
        (
            Type::Optional {
                wrapped: arg_wrapped,
                ..
            },
            Type::Optional {
                wrapped: param_wrapped,
                ..
            },
        ) => find_generic_arg(arg_wrapped, param_wrapped, name),
        _ => None,
    }
}
