//! Syntactic printing for Tiger ASTs.
//!
//! The printed form is Tiger-ish source text.  Once the binder has run,
//! annotations are shown in comments: each identifier carries its use depth,
//! each variable declaration its depth and whether it escapes, and each
//! function its external name and depth.

use std::fmt;

use super::{Decl, ExprId, ExprKind, FunId, Storage, VarId};

/// Render an expression tree to a string.
pub fn to_string(storage: &Storage, root: ExprId) -> String {
    let mut out = String::new();
    Printer::new(storage, &mut out).print_expr(root);
    out
}

/// An AST walker that prints to the given output.
pub struct Printer<'a, 'ast, W: ?Sized + fmt::Write> {
    /// Storage for the AST.
    storage: &'ast Storage,
    /// The writer data is output to, or an error.
    writer: Result<&'a mut W, fmt::Error>,
    /// The indentation at which to write.
    indent: usize,
}

impl<'a, 'ast, W: ?Sized + fmt::Write> Printer<'a, 'ast, W> {
    /// Construct a new [`Printer`].
    pub fn new(storage: &'ast Storage, writer: &'a mut W) -> Self {
        Self {
            storage,
            writer: Ok(writer),
            indent: 0,
        }
    }

    fn write_str(&mut self, data: &str) {
        if let Ok(w) = &mut self.writer {
            if let Err(e) = w.write_str(data) {
                self.writer = Err(e);
            }
        }
    }

    fn write_fmt(&mut self, data: fmt::Arguments<'_>) {
        if let Ok(w) = &mut self.writer {
            if let Err(e) = w.write_fmt(data) {
                self.writer = Err(e);
            }
        }
    }

    fn write_newline(&mut self) {
        self.write_str("\n");
        for _ in 0..self.indent {
            self.write_str("    ");
        }
    }

    pub fn print_expr(&mut self, expr: ExprId) {
        let storage = self.storage;
        match &storage.expr(expr).kind {
            ExprKind::Int(value) => {
                self.write_fmt(format_args!("{}", value));
            },

            ExprKind::Str(value) => {
                self.write_str("\"");
                for ch in storage.name(*value).chars() {
                    match ch {
                        '\n' => self.write_str("\\n"),
                        '\t' => self.write_str("\\t"),
                        '"' => self.write_str("\\\""),
                        '\\' => self.write_str("\\\\"),
                        _ => self.write_fmt(format_args!("{}", ch)),
                    }
                }
                self.write_str("\"");
            },

            ExprKind::Binary(op, lhs, rhs) => {
                self.write_str("(");
                self.print_expr(*lhs);
                self.write_fmt(format_args!(" {} ", op));
                self.print_expr(*rhs);
                self.write_str(")");
            },

            ExprKind::Seq(exprs) => {
                self.write_str("(");
                for (index, expr) in exprs.iter().enumerate() {
                    if index != 0 {
                        self.write_str("; ");
                    }
                    self.print_expr(*expr);
                }
                self.write_str(")");
            },

            ExprKind::If { cond, then, otherwise } => {
                self.write_str("if ");
                self.print_expr(*cond);
                self.write_str(" then ");
                self.print_expr(*then);
                self.write_str(" else ");
                self.print_expr(*otherwise);
            },

            ExprKind::Let { decls, body } => {
                self.write_str("let");
                self.indent += 1;
                for decl in decls {
                    self.write_newline();
                    match decl {
                        Decl::Var(var) => self.print_var(*var),
                        Decl::Fun(fun) => self.print_fun(*fun),
                    }
                }
                self.indent -= 1;
                self.write_newline();
                self.write_str("in ");
                self.print_expr(*body);
                self.write_str(" end");
            },

            ExprKind::Ident { name, decl, depth } => {
                self.write_str(storage.name(*name));
                if decl.is_some() {
                    self.write_fmt(format_args!("/*{}*/", depth));
                }
            },

            ExprKind::Assign { lhs, rhs } => {
                self.print_expr(*lhs);
                self.write_str(" := ");
                self.print_expr(*rhs);
            },

            ExprKind::While { cond, body } => {
                self.write_str("while ");
                self.print_expr(*cond);
                self.write_str(" do ");
                self.print_expr(*body);
            },

            ExprKind::For { var, high, body } => {
                let decl = storage.var(*var);
                self.write_str("for ");
                self.write_str(storage.name(decl.name));
                self.write_str(" := ");
                self.print_expr(decl.init.expect("for loops have a lower bound"));
                self.write_str(" to ");
                self.print_expr(*high);
                self.write_str(" do ");
                self.print_expr(*body);
            },

            ExprKind::Break { .. } => {
                self.write_str("break");
            },

            ExprKind::Call { name, args, .. } => {
                self.write_str(storage.name(*name));
                self.write_str("(");
                for (index, arg) in args.iter().enumerate() {
                    if index != 0 {
                        self.write_str(", ");
                    }
                    self.print_expr(*arg);
                }
                self.write_str(")");
            },
        }
    }

    pub fn print_var(&mut self, var: VarId) {
        let storage = self.storage;
        let decl = storage.var(var);

        self.write_str("var ");
        self.write_str(storage.name(decl.name));
        if decl.depth != 0 || decl.escapes {
            self.write_fmt(format_args!("/*{}", decl.depth));
            if decl.escapes {
                self.write_str(" escapes");
            }
            self.write_str("*/");
        }
        if let Some(type_name) = decl.type_name {
            self.write_str(": ");
            self.write_str(storage.name(type_name));
        }
        if let Some(init) = decl.init {
            self.write_str(" := ");
            self.print_expr(init);
        }
    }

    pub fn print_fun(&mut self, fun: FunId) {
        let storage = self.storage;
        let decl = storage.fun(fun);

        self.write_str("function ");
        self.write_str(storage.name(decl.name));
        if let Some(external_name) = decl.external_name {
            self.write_fmt(format_args!(
                "/*{} {}*/",
                storage.name(external_name),
                decl.depth,
            ));
        }
        self.write_str("(");
        for (index, param) in decl.params.iter().enumerate() {
            if index != 0 {
                self.write_str(", ");
            }
            let param = storage.var(*param);
            self.write_str(storage.name(param.name));
            if let Some(type_name) = param.type_name {
                self.write_str(": ");
                self.write_str(storage.name(type_name));
            }
        }
        self.write_str(")");
        if let Some(type_name) = decl.type_name {
            self.write_str(": ");
            self.write_str(storage.name(type_name));
        }
        if let Some(body) = decl.body {
            self.write_str(" = ");
            self.print_expr(body);
        }
    }
}
