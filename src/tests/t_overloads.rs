//! Overload resolution: candidate validation, the literal-conversion
//! preference, and the tie-breaker ladder.

use crate::test_helpers::Fixture;
use crate::typecheck::TypeCheckErrorKind as TEK;
use crate::types::Type;

#[test]
fn test_literal_autocast_prefers_integer_overload() {
    // With f(int64) and f(float64), f(3) picks the integer overload.
    let mut fx = Fixture::new();
    let int_overload = fx.add_extern_function("f", &[("x", Type::int64())], Type::void());
    fx.add_extern_function("f", &[("x", Type::float64())], Type::void());

    let arg = fx.int(3);
    let call = fx.call("f", vec![arg]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("overloaded call");
    assert_eq!(checked.callee(call_id).unwrap().decl, int_overload);
}

#[test]
fn test_exact_match_beats_conversion() {
    let mut fx = Fixture::new();
    fx.add_extern_function("g", &[("x", Type::int64())], Type::void());
    let exact = fx.add_extern_function("g", &[("x", Type::int())], Type::void());

    let arg = fx.var("v");
    let call = fx.call("g", vec![arg]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[("v", Type::int())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("exact overload");
    assert_eq!(checked.callee(call_id).unwrap().decl, exact);
}

#[test]
fn test_indistinguishable_overloads_are_ambiguous() {
    let mut fx = Fixture::new();
    fx.add_extern_function("h", &[("a", Type::int())], Type::void());
    fx.add_extern_function("h", &[("b", Type::int())], Type::void());

    let arg = fx.var("v");
    let call = fx.call("h", vec![arg]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[("v", Type::int())], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::AmbiguousOverload(name) if name == "h"));
}

#[test]
fn test_standard_library_candidate_wins_ties() {
    let mut fx = Fixture::new();
    let std_module = fx.session.add_module("std");
    let file = fx.file;
    fx.session.file_mut(file).imports.push(std_module);

    fx.add_extern_function("dup", &[("x", Type::int())], Type::void());
    let std_dup =
        fx.add_function_in(std_module, "dup", &[("x", Type::int())], Type::void(), None, true);

    let arg = fx.var("v");
    let call = fx.call("dup", vec![arg]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[("v", Type::int())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("std tie-break");
    assert_eq!(checked.callee(call_id).unwrap().decl, std_dup);
}

#[test]
fn test_foreign_header_overloads_accept_first() {
    let mut fx = Fixture::new();
    let header = fx.session.add_module("stdio.h");
    let file = fx.file;
    fx.session.file_mut(file).imports.push(header);

    let first =
        fx.add_function_in(header, "cfn", &[("x", Type::int())], Type::void(), None, true);
    fx.add_function_in(header, "cfn", &[("y", Type::int())], Type::void(), None, true);

    let arg = fx.var("v");
    let call = fx.call("cfn", vec![arg]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[("v", Type::int())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("foreign tie-break");
    assert_eq!(checked.callee(call_id).unwrap().decl, first);
}

#[test]
fn test_mutating_preference_on_mutable_receiver() {
    let mut fx = Fixture::new();
    let counter = fx.add_struct("Counter", &[("n", Type::int())], false);
    fx.add_init(counter, &[], vec![]);
    fx.add_method(counter, "bump", &[], Type::void(), vec![], false);
    let mutating = fx.add_method(counter, "bump", &[], Type::void(), vec![], true);

    let init = fx.call("Counter", vec![]);
    let (decl_stmt, _) = fx.var_stmt("c", None, init);
    let receiver = fx.var("c");
    let call = fx.method_call(receiver, "bump", vec![]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![decl_stmt, stmt]);

    let checked = fx.check().expect("mutating tie-break");
    assert_eq!(checked.callee(call_id).unwrap().decl, mutating);
}

#[test]
fn test_mutating_method_rejected_on_immutable_receiver() {
    let mut fx = Fixture::new();
    let counter = fx.add_struct("Point", &[("n", Type::int())], false);
    fx.add_init(counter, &[], vec![]);
    fx.add_method(counter, "shift", &[], Type::void(), vec![], true);

    let init = fx.call("Point", vec![]);
    let (decl_stmt, _) = fx.let_stmt("p", None, init);
    let receiver = fx.var("p");
    let call = fx.method_call(receiver, "shift", vec![]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![decl_stmt, stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::MutatingMethodOnImmutable(_, _)));
}

#[test]
fn test_argument_label_mismatch() {
    let mut fx = Fixture::new();
    fx.add_extern_function("move_to", &[("x", Type::int())], Type::void());

    let value = fx.int(1);
    let callee = fx.var("move_to");
    let call = crate::ast::ExprKind::Call(crate::ast::CallExpr {
        callee: Box::new(callee),
        args: vec![crate::ast::Argument::named("y", value)],
        generic_args: Vec::new(),
    });
    let call = crate::ast::Expr::new(&mut fx.session.node_ids, call, crate::diag::Span::default());
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::InvalidArgumentName(given, _) if given == "y"));
}

#[test]
fn test_arity_errors_quote_expectations() {
    let mut fx = Fixture::new();
    fx.add_extern_function("one", &[("x", Type::int())], Type::void());

    let a = fx.int(1);
    let b = fx.int(2);
    let call = fx.call("one", vec![a, b]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::TooManyArguments(name, 1) if name == "one"));
}

#[test]
fn test_no_matching_overload_quotes_argument_types() {
    let mut fx = Fixture::new();
    fx.add_extern_function("q", &[("x", Type::bool())], Type::void());
    fx.add_extern_function("q", &[("x", Type::string())], Type::void());

    let arg = fx.var("v");
    let call = fx.call("q", vec![arg]);
    let stmt = fx.expr_stmt(call);
    fx.add_function(
        "test",
        &[("v", Type::pointer(Type::int()))],
        Type::void(),
        vec![stmt],
    );

    let err = fx.check().unwrap_err();
    match err.kind() {
        TEK::NoMatchingOverload { arg_types, .. } => assert!(arg_types.contains("int*")),
        other => panic!("expected NoMatchingOverload, got {other:?}"),
    }
}

#[test]
fn test_array_size_method() {
    let mut fx = Fixture::new();
    let receiver = fx.var("a");
    let call = fx.method_call(receiver, "size", vec![]);
    let (stmt, decl) = fx.let_stmt("n", None, call);
    fx.add_function(
        "test",
        &[("a", Type::sized_array(Type::int(), 8))],
        Type::void(),
        vec![stmt],
    );

    let checked = fx.check().expect("array size()");
    assert_eq!(checked.binding_type(decl), &Type::int());
}

#[test]
fn test_variadic_accepts_extra_arguments() {
    let mut fx = Fixture::new();
    let printf = fx.add_extern_function(
        "printf",
        &[("format", Type::pointer(Type::char()))],
        Type::int(),
    );
    // Headers mark variadic functions; the fixture flips the flag in place.
    {
        let decl = fx.session.decl_table.get(printf).as_ref().clone();
        let mut func = decl.as_function().unwrap().clone();
        func.variadic = true;
        fx.session
            .decl_table
            .set_kind(printf, crate::ast::DeclKind::Function(func));
    }

    let format = fx.string("%d");
    let value = fx.int(7);
    let call = fx.call("printf", vec![format, value]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    fx.check().expect("variadic call");
}
