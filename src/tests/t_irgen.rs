//! Lowering tests comparing generated IR against golden text.

use indoc::indoc;

use crate::ast::BinaryOp;
use crate::test_helpers::Fixture;
use crate::types::Type;

#[test]
fn test_lower_annotated_int_binding() {
    // let x: int64 = 42
    let mut fx = Fixture::new();
    let init = fx.int(42);
    let (stmt, _) = fx.let_stmt("x", Some(Type::int64()), init);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "main()");

    let expected = indoc! {"
        fn main() -> i32 {
          bb0:
            %v0: i64* = alloca i64 ; x
            %v1: i64 = const 42:i64
            store %v1, %v0
            %v2: i32 = const 0:i32
            ret %v2
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_short_circuit_and() {
    // let c = true && side(); the right side only runs on the true branch.
    let mut fx = Fixture::new();
    fx.add_extern_function("side", &[], Type::bool());
    let lhs = fx.boolean(true);
    let rhs = fx.call("side", vec![]);
    let and = fx.binary(BinaryOp::And, lhs, rhs);
    let (stmt, _) = fx.let_stmt("c", None, and);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "main()");

    let expected = indoc! {r#"
        fn main() -> i32 {
          bb0:
            %v0: i1* = alloca i1 ; c
            %v1: i1 = const 1:i1
            condbr %v1, bb1, bb2
          bb1:
            %v2: i1 = call @"side()"()
            br bb2
          bb2:
            %v3: i1 = phi [bb0, %v1], [bb1, %v2]
            store %v3, %v0
            %v4: i32 = const 0:i32
            ret %v4
        }
    "#};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_unsigned_division() {
    let mut fx = Fixture::new();
    let lhs = fx.var("a");
    let rhs = fx.var("b");
    let div = fx.binary(BinaryOp::Div, lhs, rhs);
    let ret = fx.ret(Some(div));
    fx.add_function(
        "quot",
        &[("a", Type::basic("uint")), ("b", Type::basic("uint"))],
        Type::basic("uint"),
        vec![ret],
    );

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "quot(uint, uint)");

    let expected = indoc! {"
        fn quot(%v0: i32, %v1: i32) -> i32 {
          bb0:
            %v2: i32 = udiv %v0, %v1
            ret %v2
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_signed_comparison() {
    let mut fx = Fixture::new();
    let lhs = fx.var("a");
    let rhs = fx.var("b");
    let cmp = fx.binary(BinaryOp::Lt, lhs, rhs);
    let ret = fx.ret(Some(cmp));
    fx.add_function(
        "less",
        &[("a", Type::int()), ("b", Type::int())],
        Type::bool(),
        vec![ret],
    );

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "less(int, int)");

    let expected = indoc! {"
        fn less(%v0: i32, %v1: i32) -> i1 {
          bb0:
            %v2: i1 = icmp slt %v0, %v1
            ret %v2
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_float_arithmetic_uses_float_ops() {
    let mut fx = Fixture::new();
    let lhs = fx.var("a");
    let rhs = fx.var("b");
    let sum = fx.binary(BinaryOp::Add, lhs, rhs);
    let ret = fx.ret(Some(sum));
    fx.add_function(
        "fsum",
        &[("a", Type::float64()), ("b", Type::float64())],
        Type::float64(),
        vec![ret],
    );

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "fsum(float64, float64)");

    let expected = indoc! {"
        fn fsum(%v0: f64, %v1: f64) -> f64 {
          bb0:
            %v2: f64 = fadd %v0, %v1
            ret %v2
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_builtin_conversion_extends_by_signedness() {
    // return int64(x) for a signed operand sign-extends.
    let mut fx = Fixture::new();
    let arg = fx.var("x");
    let conv = fx.call("int64", vec![arg]);
    let ret = fx.ret(Some(conv));
    fx.add_function("widen", &[("x", Type::int())], Type::int64(), vec![ret]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "widen(int)");

    let expected = indoc! {"
        fn widen(%v0: i32) -> i64 {
          bb0:
            %v1: i64 = sext %v0 to i64
            ret %v1
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_for_loop_desugars_to_counter_loop() {
    // for i in 0..3 { }
    let mut fx = Fixture::new();
    let lo = fx.int(0);
    let hi = fx.int(3);
    let range = fx.binary(BinaryOp::RangeExcl, lo, hi);
    let stmt = fx.for_stmt("i", range, vec![]);
    fx.add_function("count", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "count()");

    let expected = indoc! {"
        fn count() -> void {
          bb0:
            %v0: i32* = alloca i32 ; i
            %v1: i32 = const 0:i32
            store %v1, %v0
            %v2: i32 = const 3:i32
            br bb1
          bb1:
            %v3: i32 = load %v0
            %v4: i1 = icmp slt %v3, %v2
            condbr %v4, bb2, bb3
          bb2:
            %v5: i32 = load %v0
            %v6: i32 = const 1:i32
            %v7: i32 = add %v5, %v6
            store %v7, %v0
            br bb1
          bb3:
            ret void
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_inclusive_range_compares_with_le() {
    let mut fx = Fixture::new();
    let lo = fx.int(0);
    let hi = fx.int(3);
    let range = fx.binary(BinaryOp::RangeIncl, lo, hi);
    let stmt = fx.for_stmt("i", range, vec![]);
    fx.add_function("count", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "count()");
    assert!(text.contains("icmp sle"));
}

#[test]
fn test_lower_while_with_break() {
    let mut fx = Fixture::new();
    let cond = fx.boolean(true);
    let brk = fx.break_stmt();
    let stmt = fx.while_stmt(cond, vec![brk]);
    fx.add_function("spin", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "spin()");

    let expected = indoc! {"
        fn spin() -> void {
          bb0:
            br bb1
          bb1:
            %v0: i1 = const 1:i1
            condbr %v0, bb2, bb3
          bb2:
            br bb3
          bb3:
            ret void
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_if_statement_branches_and_merges() {
    let mut fx = Fixture::new();
    fx.add_extern_function("effect", &[], Type::void());
    let cond = fx.var("c");
    let call = fx.call("effect", vec![]);
    let then_stmt = fx.expr_stmt(call);
    let stmt = fx.if_stmt(cond, vec![then_stmt], vec![]);
    fx.add_function("branchy", &[("c", Type::bool())], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "branchy(bool)");

    let expected = indoc! {r#"
        fn branchy(%v0: i1) -> void {
          bb0:
            condbr %v0, bb1, bb2
          bb1:
            call @"effect()"()
            br bb3
          bb2:
            br bb3
          bb3:
            ret void
        }
    "#};
    assert_eq!(text, expected);
}

#[test]
fn test_lower_switch_with_dense_cases() {
    let mut fx = Fixture::new();
    let cond = fx.var("x");
    let case0 = fx.int(0);
    let case1 = fx.int(1);
    let cases = vec![
        crate::ast::SwitchCase {
            value: case0,
            stmts: vec![],
        },
        crate::ast::SwitchCase {
            value: case1,
            stmts: vec![],
        },
    ];
    let stmt = crate::ast::Stmt::new(
        &mut fx.session.node_ids,
        crate::ast::StmtKind::Switch {
            condition: cond,
            cases,
            default_stmts: vec![],
        },
        crate::diag::Span::default(),
    );
    fx.add_function("pick", &[("x", Type::int())], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "pick(int)");
    assert!(text.contains("switch %v0, [0 -> bb1, 1 -> bb2], default bb3"));
}

#[test]
fn test_lower_string_literal_builds_fat_aggregate() {
    let mut fx = Fixture::new();
    let lit = fx.string("hi");
    let (stmt, _) = fx.let_stmt("s", None, lit);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    assert_eq!(
        module.struct_fields("string"),
        Some(&[crate::ir::IrType::Int(8).ptr_to(), crate::ir::IrType::Int(32)][..])
    );
    let text = Fixture::format_func(&module, "main()");
    assert!(text.contains("string \"hi\""));
    assert!(text.contains("insertvalue"));
}

#[test]
fn test_lower_sizeof_intrinsic() {
    let mut fx = Fixture::new();
    let call = fx.call_generic("sizeOf", vec![Type::int64()], vec![]);
    let (stmt, _) = fx.let_stmt("n", None, call);
    fx.add_function("main", &[], Type::void(), vec![stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "main()");
    assert!(text.contains("sizeof i64"));
}

#[test]
fn test_main_synthesizes_zero_return() {
    let mut fx = Fixture::new();
    fx.add_function("main", &[], Type::void(), vec![]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "main()");

    let expected = indoc! {"
        fn main() -> i32 {
          bb0:
            %v0: i32 = const 0:i32
            ret %v0
        }
    "};
    assert_eq!(text, expected);
}

#[test]
fn test_subscript_lowering_uses_gep() {
    let mut fx = Fixture::new();
    let elements = vec![fx.int(1), fx.int(2)];
    let lit = fx.array(elements);
    let (array_stmt, _) = fx.var_stmt("a", None, lit);
    let base = fx.var("a");
    let index = fx.int(1);
    let access = fx.subscript(base, index);
    let (read_stmt, _) = fx.let_stmt("x", None, access);
    fx.add_function("main", &[], Type::void(), vec![array_stmt, read_stmt]);

    let (_, module) = fx.compile().expect("failed to compile");
    let text = Fixture::format_func(&module, "main()");
    assert!(text.contains("gep"));
    assert!(text.contains("[2 x i32]"));
}
