//! Tests for type checking.

use tigerc::ast::Ty;
use tigerc::tck;

mod common;

/// The type assigned to the program's root expression.
fn root_ty(source: &str) -> Ty {
    let (storage, root, _) = common::check(source);
    storage.expr(root).ty.expect("the root expression is typed")
}

#[test]
fn literals_have_their_types() {
    assert_eq!(root_ty("1"), Ty::Int);
    assert_eq!(root_ty("\"hello\""), Ty::String);
}

#[test]
fn arithmetic_on_integers_is_int() {
    assert_eq!(root_ty("1 + 2 * 3 - 4 / 2"), Ty::Int);
}

#[test]
fn comparisons_on_integers_are_int() {
    assert_eq!(root_ty("1 < 2"), Ty::Int);
    assert_eq!(root_ty("1 = 2"), Ty::Int);
}

#[test]
fn comparisons_on_strings_are_int() {
    assert_eq!(root_ty("\"foo\" < \"bar\""), Ty::Int);
    assert_eq!(root_ty("\"foo\" = \"bar\""), Ty::Int);
}

#[test]
fn arithmetic_on_strings_is_rejected() {
    let err = common::check_err("\"a\" + \"b\"");
    assert!(matches!(err, tck::Error::BadOperator { .. }));
}

#[test]
fn mixed_operands_are_rejected() {
    let err = common::check_err("1 + \"a\"");
    assert!(matches!(err, tck::Error::Mismatch { .. }));
}

#[test]
fn sequences_take_the_last_type() {
    assert_eq!(root_ty("(1; \"s\")"), Ty::String);
    assert_eq!(root_ty("()"), Ty::Void);
}

#[test]
fn if_branches_must_agree() {
    assert_eq!(root_ty("if 1 then 2 else 3"), Ty::Int);
    let err = common::check_err("if 1 then 2 else \"x\"");
    assert!(matches!(err, tck::Error::Mismatch { .. }));
}

#[test]
fn if_conditions_must_be_int() {
    let err = common::check_err("if \"yes\" then 1 else 2");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Int, found: Ty::String, .. },
    ));
}

#[test]
fn lets_take_their_body_type() {
    assert_eq!(root_ty("let var x := 1 in x + 2 end"), Ty::Int);
}

#[test]
fn variable_annotations_must_match_initializers() {
    assert_eq!(root_ty("let var x: int := 1 in x end"), Ty::Int);
    let err = common::check_err("let var x: int := \"hi\" in x end");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Int, found: Ty::String, .. },
    ));
}

#[test]
fn variables_need_a_type_or_an_initializer() {
    let err = common::check_err("let var x in x end");
    assert!(matches!(err, tck::Error::MissingType { .. }));
}

#[test]
fn variables_cannot_hold_void() {
    let err = common::check_err("let var x := print(\"hi\") in x end");
    assert!(matches!(err, tck::Error::VoidVariable { .. }));
}

#[test]
fn unknown_type_names_are_rejected() {
    let err = common::check_err("let var x: bool := 1 in x end");
    let tck::Error::UnknownType { name, .. } = err else {
        panic!("expected an unknown type error");
    };
    assert_eq!(name, "bool");
}

#[test]
fn void_is_not_a_variable_type() {
    let err = common::check_err("let var x: void := 1 in x end");
    assert!(matches!(err, tck::Error::UnknownType { .. }));
}

#[test]
fn assignments_are_void_and_must_match() {
    assert_eq!(root_ty("let var x := 1 in x := 2 end"), Ty::Void);
    let err = common::check_err("let var x := 1 in x := \"s\" end");
    assert!(matches!(err, tck::Error::Mismatch { .. }));
}

#[test]
fn while_bodies_must_be_void() {
    assert_eq!(root_ty("while 1 do print_int(1)"), Ty::Void);
    let err = common::check_err("while 1 do 2");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Void, found: Ty::Int, .. },
    ));
}

#[test]
fn for_loops_iterate_over_integers() {
    assert_eq!(root_ty("for i := 0 to 9 do print_int(i)"), Ty::Void);
    let err = common::check_err("for i := \"a\" to 9 do print_int(i)");
    assert!(matches!(err, tck::Error::Mismatch { .. }));
}

#[test]
fn for_bounds_must_be_int() {
    let err = common::check_err("for i := 0 to \"z\" do print_int(i)");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Int, found: Ty::String, .. },
    ));
}

#[test]
fn breaks_are_void() {
    assert_eq!(root_ty("while 1 do break"), Ty::Void);
}

#[test]
fn calls_take_the_declared_result_type() {
    assert_eq!(
        root_ty("let function f(): string = \"s\" in f() end"),
        Ty::String,
    );
    assert_eq!(root_ty("size(\"abc\")"), Ty::Int);
}

#[test]
fn functions_without_a_result_type_are_void() {
    assert_eq!(root_ty("let function f() = print(\"x\") in f() end"), Ty::Void);
}

#[test]
fn function_bodies_must_match_their_declared_type() {
    let err = common::check_err("let function f(): int = \"s\" in f() end");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Int, found: Ty::String, .. },
    ));
}

#[test]
fn arity_mismatches_are_rejected() {
    let err = common::check_err("let function f(a: int): int = a in f() end");
    assert!(matches!(err, tck::Error::Arity { expected: 1, found: 0, .. }));
}

#[test]
fn argument_types_must_match_parameters() {
    let err =
        common::check_err("let function f(a: int): int = a in f(\"s\") end");
    assert!(matches!(
        err,
        tck::Error::Mismatch { expected: Ty::Int, found: Ty::String, .. },
    ));
}

#[test]
fn mutually_recursive_functions_check_in_both_orders() {
    let forward =
        "let function even(n: int): int = if n = 0 then 1 else odd(n - 1) \
             function odd(n: int): int = if n = 0 then 0 else even(n - 1) \
         in even(10) end";
    let backward =
        "let function odd(n: int): int = if n = 0 then 0 else even(n - 1) \
             function even(n: int): int = if n = 0 then 1 else odd(n - 1) \
         in odd(9) end";
    assert_eq!(root_ty(forward), Ty::Int);
    assert_eq!(root_ty(backward), Ty::Int);
}

#[test]
fn checking_is_idempotent() {
    let source = "let var x := 1 in x + 2 end";
    let (mut storage, root, main) = common::check(source);
    let before = storage.expr(root).ty;
    tck::check_program(&mut storage, main).expect("re-checking is a no-op");
    assert_eq!(before, storage.expr(root).ty);
}

#[test]
fn every_expression_ends_up_typed() {
    let source =
        "let var x := 1 \
             function f(n: int): int = if n = 0 then 1 else n * f(n - 1) \
         in while x < 10 do x := x + f(1); x end";
    let (storage, root, main) = common::check(source);
    assert!(storage.expr(root).ty.is_some());
    let body = storage.fun(main).body.unwrap();
    assert!(storage.expr(body).ty.is_some());
}
