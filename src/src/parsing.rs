use pest_derive::Parser;

/// The parser for grammatical Tiger code.
#[derive(Parser)]
#[grammar = "src/tiger.pest"]
pub struct TigerParser;
