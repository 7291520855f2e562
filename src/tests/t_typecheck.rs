//! Expression and statement checking against programmatically built ASTs.

use crate::ast::{BinaryOp, UnaryOp};
use crate::test_helpers::Fixture;
use crate::typecheck::TypeCheckErrorKind as TEK;
use crate::types::Type;

#[test]
fn test_int_literal_annotated_binding() {
    // let x: int64 = 42
    let mut fx = Fixture::new();
    let init = fx.int(42);
    let init_id = init.id;
    let (stmt, decl) = fx.let_stmt("x", Some(Type::int64()), init);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("failed to type check");
    assert_eq!(checked.binding_type(decl), &Type::int64());
    assert!(!checked.binding_type(decl).is_mutable());
    // The literal is retyped to the annotated type.
    assert_eq!(checked.expr_type(init_id), &Type::int64());
}

#[test]
fn test_int_literal_range_selection() {
    let mut fx = Fixture::new();
    let small = fx.int(i32::MAX as i128);
    let small_id = small.id;
    let (s1, _) = fx.let_stmt("a", None, small);
    let large = fx.int(i32::MAX as i128 + 1);
    let large_id = large.id;
    let (s2, _) = fx.let_stmt("b", None, large);
    fx.add_function("test", &[], Type::void(), vec![s1, s2]);

    let checked = fx.check().expect("failed to type check");
    assert_eq!(checked.expr_type(small_id), &Type::int());
    assert_eq!(checked.expr_type(large_id), &Type::int64());
}

#[test]
fn test_int_literal_too_large() {
    let mut fx = Fixture::new();
    let huge = fx.int(i64::MAX as i128 + 1);
    let (stmt, _) = fx.let_stmt("a", None, huge);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::IntLiteralTooLarge));
}

#[test]
fn test_mutable_binding_type() {
    let mut fx = Fixture::new();
    let init = fx.int(1);
    let (stmt, decl) = fx.var_stmt("n", None, init);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("failed to type check");
    assert!(checked.binding_type(decl).is_mutable());
}

#[test]
fn test_convertibility_is_reflexive_for_bindings() {
    // let y: T = x for a spread of constructible types.
    let types = [
        Type::int(),
        Type::bool(),
        Type::float64(),
        Type::string(),
        Type::pointer(Type::int()),
        Type::optional(Type::pointer(Type::char())),
        Type::sized_array(Type::int(), 3),
    ];
    for ty in types {
        let mut fx = Fixture::new();
        let read = fx.var("x");
        let (stmt, _) = fx.let_stmt("y", Some(ty.clone()), read);
        fx.add_function("test", &[("x", ty.clone())], Type::void(), vec![stmt]);
        fx.check()
            .unwrap_or_else(|e| panic!("{ty} should convert to itself: {e}"));
    }
}

#[test]
fn test_use_after_move() {
    // Aggregates that don't pass by value move on call; the second read
    // fails.
    let mut fx = Fixture::new();
    let resource = fx.add_struct("Resource", &[("id", Type::int())], false);
    fx.add_init(resource, &[], vec![]);
    fx.add_extern_function("consume", &[("r", Type::basic("Resource"))], Type::void());

    let first_read = fx.var("v");
    let first = fx.call("consume", vec![first_read]);
    let first = fx.expr_stmt(first);
    let second_read = fx.var("v");
    let second = fx.call("consume", vec![second_read]);
    let second = fx.expr_stmt(second);
    fx.add_function(
        "test",
        &[("v", Type::basic("Resource"))],
        Type::void(),
        vec![first, second],
    );

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::UseAfterMove { name, .. } if name == "v"));
}

#[test]
fn test_copyable_argument_is_not_moved() {
    let mut fx = Fixture::new();
    fx.add_extern_function("take", &[("x", Type::int())], Type::void());
    let a = fx.var("v");
    let first = fx.call("take", vec![a]);
    let first = fx.expr_stmt(first);
    let b = fx.var("v");
    let second = fx.call("take", vec![b]);
    let second = fx.expr_stmt(second);
    fx.add_function("test", &[("v", Type::int())], Type::void(), vec![first, second]);

    fx.check().expect("copyable args should not move");
}

#[test]
fn test_assign_to_immutable() {
    let mut fx = Fixture::new();
    let init = fx.int(1);
    let (decl_stmt, _) = fx.let_stmt("x", None, init);
    let lhs = fx.var("x");
    let rhs = fx.int(2);
    let assign = fx.assign(lhs, rhs);
    fx.add_function("test", &[], Type::void(), vec![decl_stmt, assign]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::AssignToImmutable(_)));
}

#[test]
fn test_assign_through_mutable_binding() {
    let mut fx = Fixture::new();
    let init = fx.int(1);
    let (decl_stmt, _) = fx.var_stmt("x", None, init);
    let lhs = fx.var("x");
    let rhs = fx.int(2);
    let assign = fx.assign(lhs, rhs);
    fx.add_function("test", &[], Type::void(), vec![decl_stmt, assign]);

    fx.check().expect("assignment to var binding");
}

#[test]
fn test_deref_non_pointer() {
    let mut fx = Fixture::new();
    let operand = fx.var("x");
    let deref = fx.prefix(UnaryOp::Deref, operand);
    let (stmt, _) = fx.let_stmt("y", None, deref);
    fx.add_function("test", &[("x", Type::int())], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::DerefNonPointer(_)));
}

#[test]
fn test_deref_optional_pointer_hints_unwrap() {
    let mut fx = Fixture::new();
    let operand = fx.var("p");
    let deref = fx.prefix(UnaryOp::Deref, operand);
    let (stmt, _) = fx.let_stmt("y", None, deref);
    fx.add_function(
        "test",
        &[("p", Type::optional(Type::pointer(Type::int())))],
        Type::void(),
        vec![stmt],
    );

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::DerefOptionalPointer(_)));
}

#[test]
fn test_unwrap_then_deref_is_allowed() {
    let mut fx = Fixture::new();
    let operand = fx.var("p");
    let unwrapped = fx.unwrap(operand);
    let deref = fx.prefix(UnaryOp::Deref, unwrapped);
    let (stmt, decl) = fx.let_stmt("y", None, deref);
    fx.add_function(
        "test",
        &[("p", Type::optional(Type::pointer(Type::int())))],
        Type::void(),
        vec![stmt],
    );

    let checked = fx.check().expect("unwrap before deref");
    assert_eq!(checked.binding_type(decl), &Type::int());
}

#[test]
fn test_unwrap_non_optional() {
    let mut fx = Fixture::new();
    let operand = fx.var("x");
    let unwrapped = fx.unwrap(operand);
    let (stmt, _) = fx.let_stmt("y", None, unwrapped);
    fx.add_function("test", &[("x", Type::int())], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::UnwrapNonOptional(_)));
}

#[test]
fn test_array_literal_typing() {
    let mut fx = Fixture::new();
    let elements = vec![fx.int(1), fx.int(2), fx.int(3)];
    let lit = fx.array(elements);
    let (stmt, decl) = fx.let_stmt("a", None, lit);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("array literal");
    assert_eq!(
        checked.binding_type(decl),
        &Type::sized_array(Type::int(), 3)
    );
}

#[test]
fn test_array_literal_mixed_elements() {
    let mut fx = Fixture::new();
    let elements = vec![fx.int(1), fx.boolean(true)];
    let lit = fx.array(elements);
    let (stmt, _) = fx.let_stmt("a", None, lit);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::ArrayElementTypeMismatch(_, _)));
}

#[test]
fn test_subscript_constant_index_bounds() {
    let mut fx = Fixture::new();
    let base = fx.var("a");
    let index = fx.int(3);
    let access = fx.subscript(base, index);
    let (stmt, _) = fx.let_stmt("x", None, access);
    fx.add_function(
        "test",
        &[("a", Type::sized_array(Type::int(), 3))],
        Type::void(),
        vec![stmt],
    );

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::SubscriptOutOfBounds(3, 3)));
}

#[test]
fn test_subscript_in_bounds_yields_element() {
    let mut fx = Fixture::new();
    let base = fx.var("a");
    let index = fx.int(2);
    let access = fx.subscript(base, index);
    let (stmt, decl) = fx.let_stmt("x", None, access);
    fx.add_function(
        "test",
        &[("a", Type::sized_array(Type::int64(), 3))],
        Type::void(),
        vec![stmt],
    );

    let checked = fx.check().expect("in-bounds subscript");
    assert_eq!(checked.binding_type(decl), &Type::int64());
}

#[test]
fn test_array_members_data_and_count() {
    let mut fx = Fixture::new();
    let base = fx.var("a");
    let count = fx.member(base, "count");
    let (s1, count_decl) = fx.let_stmt("n", None, count);
    let base = fx.var("a");
    let data = fx.member(base, "data");
    let (s2, data_decl) = fx.let_stmt("d", None, data);
    fx.add_function(
        "test",
        &[("a", Type::sized_array(Type::char(), 4))],
        Type::void(),
        vec![s1, s2],
    );

    let checked = fx.check().expect("array members");
    assert_eq!(checked.binding_type(count_decl), &Type::int());
    assert_eq!(checked.binding_type(data_decl), &Type::pointer(Type::char()));
}

#[test]
fn test_null_comparison_against_non_optional_hints() {
    let mut fx = Fixture::new();
    let lhs = fx.var("x");
    let rhs = fx.null();
    let cmp = fx.binary(BinaryOp::Eq, lhs, rhs);
    let (stmt, _) = fx.let_stmt("e", None, cmp);
    fx.add_function("test", &[("x", Type::int())], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(
        err.kind(),
        TEK::InvalidBinaryOperands {
            null_operand: Some(_),
            ..
        }
    ));
}

#[test]
fn test_logical_operators_require_bool() {
    let mut fx = Fixture::new();
    let lhs = fx.int(1);
    let rhs = fx.boolean(true);
    let and = fx.binary(BinaryOp::And, lhs, rhs);
    let (stmt, _) = fx.let_stmt("b", None, and);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::InvalidBinaryOperands { .. }));
}

#[test]
fn test_binary_literal_widens_to_other_side() {
    let mut fx = Fixture::new();
    let lhs = fx.var("x");
    let rhs = fx.int(1);
    let rhs_id = rhs.id;
    let sum = fx.binary(BinaryOp::Add, lhs, rhs);
    let (stmt, decl) = fx.let_stmt("y", None, sum);
    fx.add_function("test", &[("x", Type::int64())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("literal widening");
    assert_eq!(checked.expr_type(rhs_id), &Type::int64());
    assert_eq!(checked.binding_type(decl), &Type::int64());
}

#[test]
fn test_pointer_arithmetic_keeps_pointer_type() {
    let mut fx = Fixture::new();
    let lhs = fx.var("p");
    let rhs = fx.int(1);
    let sum = fx.binary(BinaryOp::Add, lhs, rhs);
    let (stmt, decl) = fx.let_stmt("q", None, sum);
    fx.add_function(
        "test",
        &[("p", Type::pointer(Type::int()))],
        Type::void(),
        vec![stmt],
    );

    let checked = fx.check().expect("pointer arithmetic");
    assert_eq!(checked.binding_type(decl), &Type::pointer(Type::int()));
}

#[test]
fn test_bitwise_rejects_floats() {
    let mut fx = Fixture::new();
    let lhs = fx.float(1.0);
    let rhs = fx.int(1);
    let xor = fx.binary(BinaryOp::BitXor, lhs, rhs);
    let (stmt, _) = fx.let_stmt("x", None, xor);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::InvalidBinaryOperands { .. }));
}

#[test]
fn test_comparison_yields_bool() {
    let mut fx = Fixture::new();
    let lhs = fx.var("x");
    let rhs = fx.int(0);
    let cmp = fx.binary(BinaryOp::Lt, lhs, rhs);
    let (stmt, decl) = fx.let_stmt("b", None, cmp);
    fx.add_function("test", &[("x", Type::int())], Type::void(), vec![stmt]);

    let checked = fx.check().expect("comparison");
    assert_eq!(checked.binding_type(decl), &Type::bool());
}

#[test]
fn test_string_literal_passes_as_c_string() {
    let mut fx = Fixture::new();
    fx.add_extern_function("puts", &[("s", Type::pointer(Type::char()))], Type::int());
    let arg = fx.string("hello");
    let arg_id = arg.id;
    let call = fx.call("puts", vec![arg]);
    let stmt = fx.expr_stmt(call);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("C string passing");
    assert_eq!(
        checked.expr_type(arg_id),
        &Type::pointer(Type::char())
    );
}

#[test]
fn test_unknown_identifier() {
    let mut fx = Fixture::new();
    let read = fx.var("missing");
    let (stmt, _) = fx.let_stmt("x", None, read);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::UnknownIdentifier(name) if name == "missing"));
}

#[test]
fn test_condition_must_be_bool() {
    let mut fx = Fixture::new();
    let cond = fx.int(1);
    let stmt = fx.if_stmt(cond, vec![], vec![]);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::CondNotBool(_)));
}

#[test]
fn test_return_type_checked() {
    let mut fx = Fixture::new();
    let value = fx.boolean(true);
    let ret = fx.ret(Some(value));
    fx.add_function("test", &[], Type::int(), vec![ret]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::ReturnTypeMismatch(_, _)));
}

#[test]
fn test_for_over_non_range_errors() {
    let mut fx = Fixture::new();
    let range = fx.boolean(true);
    let stmt = fx.for_stmt("i", range, vec![]);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let err = fx.check().unwrap_err();
    assert!(matches!(err.kind(), TEK::NonIterableRange(_)));
}

#[test]
fn test_for_binding_takes_element_type() {
    let mut fx = Fixture::new();
    let lo = fx.int(0);
    let hi = fx.int(10);
    let range = fx.binary(BinaryOp::RangeExcl, lo, hi);
    let read = fx.var("i");
    let (inner, inner_decl) = fx.let_stmt("x", None, read);
    let stmt = fx.for_stmt("i", range, vec![inner]);
    fx.add_function("test", &[], Type::void(), vec![stmt]);

    let checked = fx.check().expect("for over integer range");
    assert_eq!(checked.binding_type(inner_decl), &Type::int());
}
