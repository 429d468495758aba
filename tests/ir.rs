//! Tests for IR generation.
//!
//! Every emitted function runs through the LLVM verifier inside
//! `emit_program`, so a successful emission already guarantees that all
//! blocks are terminated and allocations sit in entry blocks.  The tests
//! additionally probe the textual IR for the structures the lowering must
//! produce.

use tigerc::lir;

mod common;

/// Compile a program to textual LLVM IR.
fn emit(source: &str) -> String {
    let (storage, _, main) = common::check(source);
    let ctx = lir::Context::new();
    let module = lir::emit_program(&ctx, &storage, main, "test")
        .expect("the program lowers to verified IR");
    module.as_text()
}

/// The body text of one defined function.
fn function_text<'a>(ir: &'a str, name: &str) -> &'a str {
    let needle = format!("@{}(", name);
    let start = ir.match_indices("define ")
        .map(|(index, _)| index)
        .find(|&index| {
            let rest = &ir[index..];
            let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
            line.contains(&needle)
        })
        .expect("the function is defined");
    let end = ir[start..].find("\n}").map(|e| start + e).unwrap_or(ir.len());
    &ir[start..end]
}

#[test]
fn plain_locals_get_stack_slots() {
    let ir = emit("let var x: int := 1 in x + 2 end");
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("%x = alloca i32"));
}

#[test]
fn main_always_returns_an_int() {
    let ir = emit("print(\"hi\")");
    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("ret i32 0"));
}

#[test]
fn entry_blocks_branch_to_body_blocks() {
    let ir = emit("1");
    let main = function_text(&ir, "main");
    assert!(main.contains("entry:"));
    assert!(main.contains("br label %body"));
}

#[test]
fn nested_functions_are_hoisted_with_a_static_link() {
    let ir =
        emit("let function f(n: int): int = if n = 0 then 1 else n * f(n - 1) \
              in f(5) end");

    // `f` is hoisted to the top level under its external name, with the
    // static link as a hidden first parameter before `n`.
    assert!(ir.contains("define internal i32 @main.f("));
    let f = function_text(&ir, "main.f");
    assert!(f.contains("i32 %n"));
    assert!(f.contains("= alloca i32"));
    assert!(f.contains("call i32 @main.f("));
}

#[test]
fn captured_variables_live_in_the_frame() {
    let ir =
        emit("let var c := 0 function bump() = c := c + 1 \
              in bump(); bump(); c end");

    // `c` escapes into main's frame, so the frame struct has one i32
    // field and `c` gets no private alloca.
    assert!(ir.contains("%ft_main = type { i32 }"));
    assert!(!ir.contains("%c = alloca"));
    assert!(ir.contains("define internal void @main.bump("));

    // bump's own frame stores nothing but the static link.
    assert!(ir.contains("%ft_main.bump = type {"));
}

#[test]
fn static_links_are_walked_once_per_level() {
    let ir =
        emit("let function outer(): int = \
                  let var k := 10 function inner(): int = k in inner() end \
              in outer() end");

    // Reading `k` from `inner` walks exactly one static-link level: one
    // load for the link, one for `k` itself.
    let inner = function_text(&ir, "main.outer.inner");
    assert_eq!(inner.matches(" = load ").count(), 2);

    // Reading `k` from `outer` itself would walk zero levels; the frame
    // field is addressed directly off outer's own frame.
    let outer = function_text(&ir, "main.outer");
    assert!(outer.contains("%ft_main.outer"));
}

#[test]
fn whiles_lower_to_test_body_and_end_blocks() {
    let ir = emit("while 1 do (if getchar() = \"q\" then break else ())");
    let main = function_text(&ir, "main");
    assert!(main.contains("loop_test"));
    assert!(main.contains("loop_body"));
    assert!(main.contains("loop_end"));
    assert!(main.contains("br label %loop_end"));
    assert!(ir.contains("declare"));
    assert!(ir.contains("@__getchar"));
    assert!(ir.contains("@__strcmp"));
}

#[test]
fn string_comparisons_call_strcmp() {
    let ir = emit("\"foo\" < \"bar\"");
    assert!(ir.contains("@__strcmp"));
    let main = function_text(&ir, "main");
    assert!(main.contains("icmp slt"));
    assert!(main.contains("zext"));
}

#[test]
fn integer_comparisons_widen_back_to_i32() {
    let ir = emit("1 < 2");
    let main = function_text(&ir, "main");
    assert!(main.contains("icmp slt"));
    assert!(main.contains("zext i1"));
}

#[test]
fn unit_comparisons_fold_to_constants() {
    let ir = emit("let var x := 1 in (x := 1) = (x := 2) end");
    // No __strcmp, no icmp: the result is a constant.
    let main = function_text(&ir, "main");
    assert!(!main.contains("@__strcmp"));
}

#[test]
fn if_results_go_through_a_slot() {
    let ir = emit("if 1 then 2 else 3");
    let main = function_text(&ir, "main");
    assert!(main.contains("%if_result = alloca i32"));
    assert!(main.contains("if_then"));
    assert!(main.contains("if_else"));
    assert!(main.contains("if_end"));
}

#[test]
fn for_loops_count_up_to_their_bound() {
    let ir = emit("for i := 0 to 9 do print_int(i)");
    let main = function_text(&ir, "main");
    assert!(main.contains("icmp sle"));
    assert!(main.contains("loop_body"));
    assert!(main.contains("@__print_int"));
}

#[test]
fn string_literals_become_globals() {
    let ir = emit("print(\"hello\")");
    assert!(ir.contains("hello\\00"));
}

#[test]
fn sibling_calls_pass_the_callers_static_link() {
    // `g` calls its sibling `f`: both are children of main, so the static
    // link for `f` is loaded out of g's own frame.
    let ir =
        emit("let function f(): int = 1 \
                  function g(): int = f() \
              in g() end");
    let g = function_text(&ir, "main.g");
    assert!(g.contains("call i32 @main.f("));
    assert!(g.contains(" = load "));
}

#[test]
fn primitives_are_declared_not_defined() {
    let ir = emit("print(\"x\"); print_int(1); flush()");
    for name in ["__print", "__print_int", "__flush"] {
        assert!(ir.contains(&format!("declare void @{}(", name)));
    }
}
