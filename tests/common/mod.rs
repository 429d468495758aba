//! Shared helpers for driving the compiler in tests.

#![allow(dead_code)]

use pest::Parser as _;

use tigerc::{ast, bind, src, tck};

/// Parse a Tiger program into an AST, returning its root expression.
pub fn parse(source: &str) -> (ast::Storage, ast::ExprId) {
    let mut pairs = src::TigerParser::parse(src::Rule::program, source)
        .expect("the program is grammatical");
    let mut storage = ast::Storage::new();
    let root = ast::Parser::new(&mut storage)
        .parse_program(pairs.next().unwrap())
        .expect("the program parses");
    (storage, root)
}

/// Parse and bind a Tiger program.
pub fn bind(source: &str) -> (ast::Storage, ast::ExprId, ast::FunId) {
    let (mut storage, root) = parse(source);
    let main = bind::bind_program(&mut storage, root)
        .expect("the program binds");
    (storage, root, main)
}

/// Parse a Tiger program and collect its binding error.
pub fn bind_err(source: &str) -> bind::Error {
    let (mut storage, root) = parse(source);
    bind::bind_program(&mut storage, root)
        .expect_err("the program must not bind")
}

/// Parse, bind and type-check a Tiger program.
pub fn check(source: &str) -> (ast::Storage, ast::ExprId, ast::FunId) {
    let (mut storage, root, main) = bind(source);
    tck::check_program(&mut storage, main)
        .expect("the program type-checks");
    (storage, root, main)
}

/// Parse and bind a Tiger program and collect its type error.
pub fn check_err(source: &str) -> tck::Error {
    let (mut storage, _, main) = bind(source);
    tck::check_program(&mut storage, main)
        .expect_err("the program must not type-check")
}

/// Find the unique variable declaration with the given name.
pub fn var_named(storage: &ast::Storage, name: &str) -> ast::VarId {
    storage.var_ids()
        .find(|&v| storage.name(storage.var(v).name) == name)
        .expect("a variable with that name exists")
}

/// Find the unique function declaration with the given name.
pub fn fun_named(storage: &ast::Storage, name: &str) -> ast::FunId {
    storage.fun_ids()
        .find(|&f| storage.name(storage.fun(f).name) == name)
        .expect("a function with that name exists")
}

/// The external name of a function.
pub fn external_name(storage: &ast::Storage, fun: ast::FunId) -> String {
    let symbol = storage.fun(fun).external_name
        .expect("the function was named by the binder");
    storage.name(symbol).to_owned()
}
