use pest::Parser as _;
use tigerc::src;

#[test]
fn debug_parse() {
    let r = src::TigerParser::parse(src::Rule::program, "let var x := 1 in x end");
    println!("{:?}", r);
    r.expect("should parse");
}

#[test]
fn debug_parse2() {
    for s in ["1", "1 + 2", "nil", "x", "let in end", "let var x := 1 in end", "let var x:=1 in x end"] {
        let r = src::TigerParser::parse(src::Rule::expr, s);
        println!("{:?} => {:?}", s, r.is_ok());
        if let Err(e) = &r { println!("{}", e); }
    }
}

#[test]
fn debug_parse3() {
    let cases = [
        (src::Rule::let_expr, "let var x := 1 in x end"),
        (src::Rule::var_decl, "var x := 1"),
        (src::Rule::name, "x"),
        (src::Rule::keyword, "let"),
    ];
    for (rule, s) in cases {
        let r = src::TigerParser::parse(rule, s);
        println!("{:?} {:?} => {:?}", rule, s, r.is_ok());
        if let Err(e) = &r { println!("{}", e); }
    }
}
