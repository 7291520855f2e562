//! Generic inference, instantiation caching, and type templates.

use crate::ast::UnaryOp;
use crate::test_helpers::Fixture;
use crate::typecheck::TypeCheckErrorKind as TEK;
use crate::types::Type;

/// `func id<T>(x: T) -> T { return x }`
fn add_identity_template(fx: &mut Fixture) {
    let read = fx.var("x");
    let body = vec![fx.ret(Some(read))];
    fx.add_function_template("id", &["T"], &[("x", Type::basic("T"))], Type::basic("T"), body);
}

#[test]
fn test_monomorphization_is_cached_per_argument_types() {
    let mut fx = Fixture::new();
    add_identity_template(&mut fx);

    let a = fx.int(5);
    let call_int = fx.call("id", vec![a]);
    let call_int_id = call_int.id;
    let s1 = fx.expr_stmt(call_int);

    let b = fx.boolean(true);
    let call_bool = fx.call("id", vec![b]);
    let call_bool_id = call_bool.id;
    let s2 = fx.expr_stmt(call_bool);

    let c = fx.int(7);
    let call_int_again = fx.call("id", vec![c]);
    let call_int_again_id = call_int_again.id;
    let s3 = fx.expr_stmt(call_int_again);

    fx.add_function("main", &[], Type::void(), vec![s1, s2, s3]);

    let (checked, module) = fx.compile().expect("generic program");

    let int_callee = checked.callee(call_int_id).unwrap();
    let bool_callee = checked.callee(call_bool_id).unwrap();
    let int_again_callee = checked.callee(call_int_again_id).unwrap();

    // Same argument types share one instantiation; different ones don't.
    assert_eq!(int_callee.decl, int_again_callee.decl);
    assert_ne!(int_callee.decl, bool_callee.decl);
    assert_eq!(int_callee.generic_args, vec![Type::int()]);
    assert_eq!(bool_callee.generic_args, vec![Type::bool()]);

    // Exactly two IR instantiations, mangled distinctly.
    assert!(module.func_by_name("id<int>(int)").is_some());
    assert!(module.func_by_name("id<bool>(bool)").is_some());
    let id_instantiations = module
        .funcs
        .iter()
        .filter(|f| f.name.starts_with("id<"))
        .count();
    assert_eq!(id_instantiations, 2);
}

#[test]
fn test_inference_through_pointer_shape() {
    let mut fx = Fixture::new();
    let operand = fx.var("p");
    let deref = fx.prefix(UnaryOp::Deref, operand);
    let body = vec![fx.ret(Some(deref))];
    fx.add_function_template(
        "deref",
        &["T"],
        &[("p", Type::pointer(Type::basic("T")))],
        Type::basic("T"),
        body,
    );

    let target = fx.var("v");
    let addr = fx.prefix(UnaryOp::AddrOf, target);
    let call = fx.call("deref", vec![addr]);
    let (stmt, decl) = fx.let_stmt("out", None, call);
    fx.add_function("main", &[("v", Type::int64())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("shape inference");
    assert_eq!(checked.binding_type(decl), &Type::int64());
}

#[test]
fn test_conflicting_inference_reports_both_types() {
    let mut fx = Fixture::new();
    let body = vec![];
    fx.add_function_template(
        "pair",
        &["T"],
        &[("a", Type::basic("T")), ("b", Type::basic("T"))],
        Type::void(),
        body,
    );

    let a = fx.var("x");
    let b = fx.var("y");
    let call = fx.call("pair", vec![a, b]);
    let stmt = fx.expr_stmt(call);
    fx.add_function(
        "main",
        &[("x", Type::int()), ("y", Type::bool())],
        Type::void(),
        vec![stmt],
    );

    let err = fx.check().unwrap_err();
    assert!(matches!(
        err.kind(),
        TEK::ConflictingGenericArgs { param, .. } if param == "T"
    ));
}

#[test]
fn test_inference_reconciles_literals_with_wider_side() {
    let mut fx = Fixture::new();
    let body = vec![];
    fx.add_function_template(
        "pair",
        &["T"],
        &[("a", Type::basic("T")), ("b", Type::basic("T"))],
        Type::void(),
        body,
    );

    let a = fx.int(1);
    let b = fx.var("y");
    let call = fx.call("pair", vec![a, b]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("main", &[("y", Type::int64())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("literal reconciliation");
    assert_eq!(
        checked.callee(call_id).unwrap().generic_args,
        vec![Type::int64()]
    );
}

#[test]
fn test_unbound_generic_parameter_discards_candidate() {
    let mut fx = Fixture::new();
    let body = vec![];
    // T never appears in the parameter list, so inference can't bind it.
    fx.add_function_template("floating", &["T"], &[("x", Type::int())], Type::void(), body);

    let arg = fx.int(1);
    let call = fx.call("floating", vec![arg]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::NoMatchingOverload { .. }));
}

#[test]
fn test_explicit_generic_args() {
    let mut fx = Fixture::new();
    add_identity_template(&mut fx);

    let arg = fx.int(1);
    let call = fx.call_generic("id", vec![Type::int64()], vec![arg]);
    let call_id = call.id;
    let stmt = fx.expr_stmt(call);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("explicit generic args");
    assert_eq!(
        checked.callee(call_id).unwrap().generic_args,
        vec![Type::int64()]
    );
}

#[test]
fn test_explicit_generic_arg_count_mismatch() {
    let mut fx = Fixture::new();
    add_identity_template(&mut fx);

    let arg = fx.int(1);
    let call = fx.call_generic("id", vec![Type::int(), Type::bool()], vec![arg]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::TooManyGenericArguments(_, 1)));
}

#[test]
fn test_generic_calls_require_arguments_to_infer_from() {
    let mut fx = Fixture::new();
    let body = vec![];
    fx.add_function_template("make", &["T"], &[], Type::basic("T"), body);

    let call = fx.call("make", vec![]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::CannotInferGenericArgs));
}

#[test]
fn test_type_template_instantiation() {
    let mut fx = Fixture::new();
    let (_template, inner) =
        fx.add_type_template("Box", &["T"], &[("value", Type::basic("T"))], true);

    // init(v: T) { this.value = v }
    let this_read = fx.var("this");
    let field = fx.member(this_read, "value");
    let v_read = fx.var("v");
    let assign = fx.assign(field, v_read);
    fx.add_init(inner, &[("v", Type::basic("T"))], vec![assign]);

    // func get() -> T { return value }
    let value_read = fx.var("value");
    let get_body = vec![fx.ret(Some(value_read))];
    fx.add_method(inner, "get", &[], Type::basic("T"), get_body, false);

    let arg = fx.int(5);
    let init_call = fx.call("Box", vec![arg]);
    let init_id = init_call.id;
    let (box_stmt, box_decl) = fx.var_stmt("b", None, init_call);

    let receiver = fx.var("b");
    let get_call = fx.method_call(receiver, "get", vec![]);
    let (get_stmt, get_decl) = fx.let_stmt("out", None, get_call);

    fx.add_function("main", &[], Type::void(), vec![box_stmt, get_stmt]);

    let (checked, module) = fx.compile().expect("type template program");
    assert_eq!(
        checked.expr_type(init_id),
        &Type::basic_with_args("Box", vec![Type::int()])
    );
    assert_eq!(
        checked.binding_type(box_decl).clone().as_immutable(),
        Type::basic_with_args("Box", vec![Type::int()])
    );
    assert_eq!(checked.binding_type(get_decl), &Type::int());

    // The instantiated aggregate and its members exist in the IR.
    assert!(module.struct_fields("Box<int>").is_some());
    assert!(module.func_by_name("Box<int>.init(int)").is_some());
    assert!(module.func_by_name("Box<int>.get()").is_some());
}

#[test]
fn test_interface_subtyping_checks_requirements() {
    let mut fx = Fixture::new();

    // interface Speaker { func speak() -> void }
    let speaker = fx.add_struct("Speaker", &[], false);
    {
        let mut type_decl = fx.session.decl(speaker).as_type().unwrap().clone();
        type_decl.interface = true;
        fx.session
            .decl_table
            .set_kind(speaker, crate::ast::DeclKind::Type(type_decl));
    }
    fx.add_method(speaker, "speak", &[], Type::void(), vec![], false);

    let dog = fx.add_struct("Dog", &[], true);
    fx.add_init(dog, &[], vec![]);
    fx.add_method(dog, "speak", &[], Type::void(), vec![], false);

    let cat = fx.add_struct("Cat", &[], true);
    fx.add_init(cat, &[], vec![]);

    fx.add_extern_function("greet", &[("s", Type::basic("Speaker"))], Type::void());

    let dog_init = fx.call("Dog", vec![]);
    let (dog_stmt, _) = fx.let_stmt("d", None, dog_init);
    let dog_read = fx.var("d");
    let ok_call = fx.call("greet", vec![dog_read]);
    let ok_stmt = fx.expr_stmt(ok_call);

    let cat_init = fx.call("Cat", vec![]);
    let (cat_stmt, _) = fx.let_stmt("c", None, cat_init);

    fx.add_function(
        "main",
        &[],
        Type::void(),
        vec![dog_stmt, ok_stmt, cat_stmt],
    );
    fx.check().expect("Dog implements Speaker");

    // A type missing the required method does not convert.
    let mut fx2 = Fixture::new();
    let speaker = fx2.add_struct("Speaker", &[], false);
    {
        let mut type_decl = fx2.session.decl(speaker).as_type().unwrap().clone();
        type_decl.interface = true;
        fx2.session
            .decl_table
            .set_kind(speaker, crate::ast::DeclKind::Type(type_decl));
    }
    fx2.add_method(speaker, "speak", &[], Type::void(), vec![], false);
    let cat = fx2.add_struct("Cat", &[], true);
    fx2.add_init(cat, &[], vec![]);
    fx2.add_extern_function("greet", &[("s", Type::basic("Speaker"))], Type::void());

    let cat_init = fx2.call("Cat", vec![]);
    let (cat_stmt, _) = fx2.let_stmt("c", None, cat_init);
    let cat_read = fx2.var("c");
    let bad_call = fx2.call("greet", vec![cat_read]);
    let bad_stmt = fx2.expr_stmt(bad_call);
    fx2.add_function("main", &[], Type::void(), vec![cat_stmt, bad_stmt]);

    let err = fx2.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::InvalidArgumentType(..)));
}
