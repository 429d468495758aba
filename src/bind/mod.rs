//! Name resolution for Tiger programs.
//!
//! The binder links every identifier, call and `break` to its declaration,
//! assigns static nesting depths, marks variables captured by deeper
//! functions as escaping, and gives every function a globally unique
//! external name.  It also wraps the whole program in a synthesized `main`
//! function so that downstream passes see all code inside a function.

use rustc_hash::{FxHashMap, FxHashSet};
use symbol_table::Symbol;
use thiserror::Error;

use crate::ast::{
    Decl, ExprId, ExprKind, FunDecl, FunId, Storage, VarDecl, VarId,
};
use crate::src::Span;

/// The runtime primitives entered into the top-level scope.
///
/// Each entry is the Tiger-visible name, the result type name (if any), and
/// the parameter type names.
const PRIMITIVES: &[(&str, Option<&str>, &[&str])] = &[
    ("print_err", None, &["string"]),
    ("print", None, &["string"]),
    ("print_int", None, &["int"]),
    ("flush", None, &[]),
    ("getchar", Some("string"), &[]),
    ("ord", Some("int"), &["string"]),
    ("chr", Some("string"), &["int"]),
    ("size", Some("int"), &["string"]),
    ("substring", Some("string"), &["string", "int", "int"]),
    ("concat", Some("string"), &["string", "string"]),
    ("strcmp", Some("int"), &["string", "string"]),
    ("streq", Some("int"), &["string", "string"]),
    ("not", Some("int"), &["int"]),
    ("exit", None, &["int"]),
];

/// Bind a whole program.
///
/// The root expression is wrapped inside a top-level `main` function
/// returning `int 0`, which is then visited and returned.
pub fn bind_program(ast: &mut Storage, root: ExprId) -> Result<FunId, Error> {
    let span = ast.expr(root).span;
    let zero = ast.add_expr(span, ExprKind::Int(0));
    let body = ast.add_expr(span, ExprKind::Seq(vec![root, zero]));
    let name = ast.intern("main");
    let type_name = ast.intern("int");
    let main = ast.add_fun(FunDecl::new(
        Span::nowhere(),
        name,
        Vec::new(),
        Some(body),
        Some(type_name),
        true,
    ));

    bind_main(ast, main)?;
    Ok(main)
}

/// Bind a program already wrapped in its `main` function.
///
/// Binding is deterministic and idempotent: re-running it over an already
/// bound `main` recomputes the same annotations.
pub fn bind_main(ast: &mut Storage, main: FunId) -> Result<(), Error> {
    Binder::new(ast).bind_fun(main)
}

/// The binding pass.
struct Binder<'ast> {
    /// Storage for the AST.
    ast: &'ast mut Storage,
    /// The stack of open scopes, innermost last.
    scopes: Vec<FxHashMap<Symbol, Decl>>,
    /// The stack of functions currently being visited.
    functions: Vec<FunId>,
    /// The innermost loop currently being visited, if any.
    curr_loop: Option<ExprId>,
    /// Every external name taken so far.
    external_names: FxHashSet<Symbol>,
}

impl<'ast> Binder<'ast> {
    /// Construct a new [`Binder`] with the primitives in scope.
    fn new(ast: &'ast mut Storage) -> Self {
        let mut binder = Self {
            ast,
            scopes: vec![FxHashMap::default()],
            functions: Vec::new(),
            curr_loop: None,
            external_names: FxHashSet::default(),
        };

        for &(name, result, params) in PRIMITIVES {
            binder.enter_primitive(name, result, params);
        }

        binder
    }

    /// Declare a primitive in the current scope.
    fn enter_primitive(
        &mut self,
        name: &str,
        result: Option<&str>,
        params: &[&str],
    ) {
        let params = params.iter().enumerate()
            .map(|(counter, type_name)| {
                let arg_name = self.ast.intern(&format!("a_{}", counter));
                let type_name = self.ast.intern(type_name);
                self.ast.add_var(VarDecl::new(
                    Span::nowhere(),
                    arg_name,
                    Some(type_name),
                    None,
                ))
            })
            .collect();

        let external_name = self.ast.intern(&format!("__{}", name));
        let name = self.ast.intern(name);
        let result = result.map(|r| self.ast.intern(r));
        let fun = self.ast.add_fun(FunDecl::new(
            Span::nowhere(),
            name,
            params,
            None,
            result,
            true,
        ));
        self.ast.fun_mut(fun).external_name = Some(external_name);

        // Primitive names never collide; skip the redeclaration check.
        self.scopes.last_mut().unwrap().insert(name, Decl::Fun(fun));
    }

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Enter a declaration in the current scope.
    ///
    /// Fails if the name is already bound in this scope; shadowing names
    /// from outer scopes is fine.
    fn enter(&mut self, name: Symbol, span: Span, decl: Decl) -> Result<(), Error> {
        let scope = self.scopes.last_mut().unwrap();
        if let Some(&previous) = scope.get(&name) {
            let previous = match previous {
                Decl::Var(v) => self.ast.var(v).span,
                Decl::Fun(f) => self.ast.fun(f).span,
            };
            return Err(Error::Redeclaration {
                name: self.ast.name(name).to_owned(),
                span,
                previous,
            });
        }

        scope.insert(name, decl);
        Ok(())
    }

    /// Find the declaration for a name.
    ///
    /// The scope stack is traversed innermost-first and the first matching
    /// declaration is returned.
    fn find(&self, name: Symbol, span: Span) -> Result<Decl, Error> {
        for scope in self.scopes.iter().rev() {
            if let Some(&decl) = scope.get(&name) {
                return Ok(decl);
            }
        }

        Err(Error::Unbound {
            name: self.ast.name(name).to_owned(),
            span,
        })
    }

    /// Set a function's parent and compute its unique external name.
    fn set_parent_and_external_name(&mut self, fun: FunId) {
        let parent = self.functions.last().copied();
        let mut external_name = match parent {
            Some(parent) => {
                self.ast.fun_mut(fun).parent = Some(parent);
                let parent = self.ast.fun(parent).external_name
                    .expect("parents are named before their children");
                format!(
                    "{}.{}",
                    self.ast.name(parent),
                    self.ast.name(self.ast.fun(fun).name),
                )
            },
            None => self.ast.name(self.ast.fun(fun).name).to_owned(),
        };

        let mut symbol = self.ast.intern(&external_name);
        while self.external_names.contains(&symbol) {
            external_name.push('_');
            symbol = self.ast.intern(&external_name);
        }

        self.external_names.insert(symbol);
        self.ast.fun_mut(fun).external_name = Some(symbol);
    }

    /// Bind a function declaration and its body.
    fn bind_fun(&mut self, fun: FunId) -> Result<(), Error> {
        self.set_parent_and_external_name(fun);
        self.functions.push(fun);
        self.ast.fun_mut(fun).depth = self.functions.len() as u32 - 1;
        self.ast.fun_mut(fun).vars.clear();

        self.push_scope();
        let params = self.ast.fun(fun).params.clone();
        for param in params {
            self.bind_var(param)?;
        }
        if let Some(body) = self.ast.fun(fun).body {
            self.bind_expr(body)?;
        }
        self.pop_scope();

        self.functions.pop();
        Ok(())
    }

    /// Bind a variable declaration.
    ///
    /// The initializer is visited before the name is entered, so it cannot
    /// refer to the variable it initializes.
    fn bind_var(&mut self, var: VarId) -> Result<(), Error> {
        if let Some(init) = self.ast.var(var).init {
            self.bind_expr(init)?;
        }

        let (name, span) = {
            let decl = self.ast.var(var);
            (decl.name, decl.span)
        };
        self.enter(name, span, Decl::Var(var))?;
        self.ast.var_mut(var).depth = self.functions.len() as u32;

        let owner = *self.functions.last()
            .expect("variables are declared inside functions");
        self.ast.fun_mut(owner).vars.push(var);
        Ok(())
    }

    /// Bind an expression.
    fn bind_expr(&mut self, expr: ExprId) -> Result<(), Error> {
        let span = self.ast.expr(expr).span;
        match self.ast.expr(expr).kind.clone() {
            ExprKind::Int(_) | ExprKind::Str(_) => Ok(()),

            ExprKind::Binary(_, lhs, rhs) => {
                self.bind_expr(lhs)?;
                self.bind_expr(rhs)
            },

            ExprKind::Seq(exprs) => {
                for expr in exprs {
                    self.bind_expr(expr)?;
                }
                Ok(())
            },

            ExprKind::If { cond, then, otherwise } => {
                self.bind_expr(cond)?;
                self.bind_expr(then)?;
                self.bind_expr(otherwise)
            },

            ExprKind::Let { decls, body } => {
                self.push_scope();

                // A break in a declaration (which is where nested function
                // bodies live) cannot reach the enclosing loop, but one in
                // the body sequence can.
                let saved_loop = self.curr_loop.take();

                // A maximal run of consecutive function declarations forms
                // a mutually recursive group: all of its headers are entered
                // before any of its bodies is visited.
                let mut index = 0;
                while index < decls.len() {
                    match decls[index] {
                        Decl::Var(var) => {
                            self.bind_var(var)?;
                            index += 1;
                        },
                        Decl::Fun(_) => {
                            let start = index;
                            while let Some(&Decl::Fun(fun)) = decls.get(index) {
                                let (name, span) = {
                                    let decl = self.ast.fun(fun);
                                    (decl.name, decl.span)
                                };
                                self.enter(name, span, Decl::Fun(fun))?;
                                index += 1;
                            }
                            for decl in &decls[start..index] {
                                let Decl::Fun(fun) = *decl else {
                                    unreachable!();
                                };
                                self.bind_fun(fun)?;
                            }
                        },
                    }
                }

                self.curr_loop = saved_loop;
                self.bind_expr(body)?;
                self.pop_scope();
                Ok(())
            },

            ExprKind::Ident { name, .. } => {
                let Decl::Var(var) = self.find(name, span)? else {
                    return Err(Error::NotVariable {
                        name: self.ast.name(name).to_owned(),
                        span,
                    });
                };

                let depth = self.functions.len() as u32;
                if self.ast.var(var).depth < depth {
                    self.ast.var_mut(var).escapes = true;
                }

                let ExprKind::Ident { decl, depth: d, .. } =
                    &mut self.ast.expr_mut(expr).kind
                else {
                    unreachable!();
                };
                *decl = Some(var);
                *d = depth;
                Ok(())
            },

            ExprKind::Assign { lhs, rhs } => {
                self.bind_expr(lhs)?;
                self.bind_expr(rhs)
            },

            ExprKind::While { cond, body } => {
                self.bind_expr(cond)?;

                let saved_loop = self.curr_loop.replace(expr);
                self.bind_expr(body)?;
                self.curr_loop = saved_loop;
                Ok(())
            },

            ExprKind::For { var, high, body } => {
                self.bind_expr(high)?;

                self.push_scope();
                self.bind_var(var)?;
                let saved_loop = self.curr_loop.replace(expr);
                self.bind_expr(body)?;
                self.pop_scope();
                self.curr_loop = saved_loop;
                Ok(())
            },

            ExprKind::Break { .. } => {
                let Some(target) = self.curr_loop else {
                    return Err(Error::BreakOutsideLoop { span });
                };

                let ExprKind::Break { target: t } =
                    &mut self.ast.expr_mut(expr).kind
                else {
                    unreachable!();
                };
                *t = Some(target);
                Ok(())
            },

            ExprKind::Call { name, args, .. } => {
                let Decl::Fun(fun) = self.find(name, span)? else {
                    return Err(Error::NotFunction {
                        name: self.ast.name(name).to_owned(),
                        span,
                    });
                };

                let depth = self.functions.len() as u32;
                let ExprKind::Call { decl, depth: d, .. } =
                    &mut self.ast.expr_mut(expr).kind
                else {
                    unreachable!();
                };
                *decl = Some(fun);
                *d = depth;

                for arg in args {
                    self.bind_expr(arg)?;
                }
                Ok(())
            },
        }
    }
}

/// A binding error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{name} is already defined in this scope")]
    Redeclaration {
        name: String,
        span: Span,
        /// Where the earlier declaration was made.
        previous: Span,
    },

    #[error("{name} cannot be found in this scope")]
    Unbound { name: String, span: Span },

    #[error("{name} does not name a variable")]
    NotVariable { name: String, span: Span },

    #[error("{name} does not name a function")]
    NotFunction { name: String, span: Span },

    #[error("break appears outside of any loop")]
    BreakOutsideLoop { span: Span },
}

impl Error {
    /// The source location of the error.
    pub fn span(&self) -> Span {
        match self {
            Self::Redeclaration { span, .. } => *span,
            Self::Unbound { span, .. } => *span,
            Self::NotVariable { span, .. } => *span,
            Self::NotFunction { span, .. } => *span,
            Self::BreakOutsideLoop { span } => *span,
        }
    }
}
