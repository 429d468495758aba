use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use pest::Parser as _;

use tigerc::{ast, bind, lir, src, tck};

/// A compiler for the Tiger programming language.
#[derive(Debug, Parser)]
#[command(author, version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a Tiger source file.
    Compile {
        /// The path to the source file.
        path: PathBuf,

        /// Dump the raw AST and stop before name binding.
        #[arg(long)]
        dump_ast: bool,

        /// Stop after name binding and dump the bound AST.
        #[arg(long)]
        bind_only: bool,

        /// Stop after type checking.
        #[arg(long)]
        type_only: bool,
    },
}

pub fn main() {
    let args = Args::parse();

    match args.command {
        Command::Compile { path, dump_ast, bind_only, type_only } => {
            cmd_compile(path, dump_ast, bind_only, type_only)
        },
    }
}

/// Compile a Tiger source file.
fn cmd_compile(path: PathBuf, dump_ast: bool, bind_only: bool, type_only: bool) {
    // Determine the name of the module from its file path.
    let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
        eprintln!("'{}' is not a valid file path!", path.display());
        std::process::exit(1);
    };

    // Open and read the specified file.
    let input = match std::fs::read_to_string(&path) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("error: could not open '{}': {}", path.display(), err);
            std::process::exit(1);
        },
    };

    // Parse the file into a grammatical representation.
    let source = match src::TigerParser::parse(src::Rule::program, &input) {
        Ok(mut pairs) => pairs.next().unwrap(),
        Err(err) => {
            eprintln!("error: could not parse '{}'", path.display());
            eprintln!("{}", err);
            std::process::exit(1);
        },
    };

    // Parse the grammatical representation into an AST.
    let mut storage = ast::Storage::new();
    let root = match ast::Parser::new(&mut storage).parse_program(source) {
        Ok(root) => root,
        Err(err) => fail(&path, &input, err.span(), &err.to_string()),
    };

    if dump_ast {
        println!("{}", ast::print::to_string(&storage, root));
        return;
    }

    // Resolve every name to its declaration.
    let main = match bind::bind_program(&mut storage, root) {
        Ok(main) => main,
        Err(err) => {
            if let bind::Error::Redeclaration { previous, .. } = &err {
                report(&path, &input, Some(err.span()), &err.to_string());
                fail(&path, &input, Some(*previous),
                    "previous declaration was here");
            }
            fail(&path, &input, Some(err.span()), &err.to_string())
        },
    };

    if bind_only {
        println!("{}", ast::print::to_string(&storage, root));
        return;
    }

    // Assign a type to every expression.
    if let Err(err) = tck::check_program(&mut storage, main) {
        fail(&path, &input, Some(err.span()), &err.to_string());
    }

    if type_only {
        return;
    }

    // Lower the program to LLVM IR.
    let ctx = lir::Context::new();
    match lir::emit_program(&ctx, &storage, main, name) {
        Ok(module) => print!("{}", module.as_text()),
        Err(err) => {
            eprintln!("error: could not compile '{}': {}", name, err);
            std::process::exit(1);
        },
    };
}

/// Report a diagnostic against a source location.
fn report(path: &Path, input: &str, span: Option<src::Span>, message: &str) {
    match span {
        Some(span) => {
            let (line, col) = src::line_col(input, span.lo);
            eprintln!("{}:{}:{}: error: {}", path.display(), line, col, message);
        },
        None => eprintln!("error: {}", message),
    }
}

/// Report a diagnostic and abort the compilation.
fn fail(path: &Path, input: &str, span: Option<src::Span>, message: &str) -> ! {
    report(path, input, span, message);
    std::process::exit(1)
}
