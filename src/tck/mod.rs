//! Type-checking for Tiger.
//!
//! Every expression is assigned one of `int`, `string` or `void`.  Function
//! declarations are checked lazily and at most once, which makes the pass
//! re-entrant over mutually recursive groups: a function's declared type is
//! recorded before its body is visited, so recursive calls see it.

use thiserror::Error;

use crate::ast::{
    BinOp, Decl, ExprId, ExprKind, FunId, Storage, Ty, VarId,
};
use crate::src::Span;

/// Type-check a bound program.
pub fn check_program(ast: &mut Storage, main: FunId) -> Result<(), Error> {
    Checker { ast }.check_fun(main)
}

/// The type-checking pass.
struct Checker<'ast> {
    /// Storage for the AST.
    ast: &'ast mut Storage,
}

impl<'ast> Checker<'ast> {
    /// Check a function declaration.
    ///
    /// A function whose type is already known is skipped, so re-entry
    /// through recursive calls is a no-op.
    fn check_fun(&mut self, fun: FunId) -> Result<(), Error> {
        if self.ast.fun(fun).ty.is_some() {
            return Ok(());
        }

        let params = self.ast.fun(fun).params.clone();
        for param in params {
            let (name, span, type_name) = {
                let decl = self.ast.var(param);
                (decl.name, decl.span, decl.type_name)
            };
            let Some(type_name) = type_name else {
                return Err(Error::MissingType {
                    name: self.ast.name(name).to_owned(),
                    span,
                });
            };
            let ty = self.value_type(type_name, span)?;
            self.ast.var_mut(param).ty = Some(ty);
        }

        // Record the declared result type before visiting the body.
        let (span, type_name, is_external) = {
            let decl = self.ast.fun(fun);
            (decl.span, decl.type_name, decl.is_external)
        };
        let declared = match type_name {
            Some(type_name) => self.result_type(type_name, is_external, span)?,
            None => Ty::Void,
        };
        self.ast.fun_mut(fun).ty = Some(declared);

        if let Some(body) = self.ast.fun(fun).body {
            let found = self.check_expr(body)?;
            if found != declared {
                return Err(Error::Mismatch {
                    expected: declared,
                    found,
                    span: self.ast.expr(body).span,
                });
            }
        }

        Ok(())
    }

    /// Check a variable declaration.
    ///
    /// The variable's type comes from its annotation or its initializer; at
    /// least one must be present, and when both are, they must agree.
    fn check_var(&mut self, var: VarId) -> Result<(), Error> {
        let (name, span, type_name, init) = {
            let decl = self.ast.var(var);
            (decl.name, decl.span, decl.type_name, decl.init)
        };

        let declared = match type_name {
            Some(type_name) => Some(self.value_type(type_name, span)?),
            None => None,
        };
        let initialized = match init {
            Some(init) => {
                let ty = self.check_expr(init)?;
                if ty == Ty::Void {
                    return Err(Error::VoidVariable {
                        name: self.ast.name(name).to_owned(),
                        span,
                    });
                }
                Some(ty)
            },
            None => None,
        };

        let ty = match (declared, initialized) {
            (None, None) => {
                return Err(Error::MissingType {
                    name: self.ast.name(name).to_owned(),
                    span,
                });
            },
            (Some(declared), Some(initialized)) if declared != initialized => {
                return Err(Error::Mismatch {
                    expected: declared,
                    found: initialized,
                    span,
                });
            },
            (Some(declared), _) => declared,
            (None, Some(initialized)) => initialized,
        };

        self.ast.var_mut(var).ty = Some(ty);
        Ok(())
    }

    /// Check an expression, recording and returning its type.
    fn check_expr(&mut self, expr: ExprId) -> Result<Ty, Error> {
        let span = self.ast.expr(expr).span;
        let ty = match self.ast.expr(expr).kind.clone() {
            ExprKind::Int(_) => Ty::Int,

            ExprKind::Str(_) => Ty::String,

            ExprKind::Binary(op, lhs, rhs) => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                if lhs_ty != rhs_ty {
                    return Err(Error::Mismatch {
                        expected: lhs_ty,
                        found: rhs_ty,
                        span: self.ast.expr(rhs).span,
                    });
                }

                // Integers admit every operator; strings compare only;
                // unit values admit equality only.
                match lhs_ty {
                    Ty::Int => {},
                    Ty::String if op.is_comparison() => {},
                    Ty::Void if op == BinOp::Eq => {},
                    _ => return Err(Error::BadOperator { op, ty: lhs_ty, span }),
                }

                Ty::Int
            },

            ExprKind::Seq(exprs) => {
                let mut ty = Ty::Void;
                for expr in exprs {
                    ty = self.check_expr(expr)?;
                }
                ty
            },

            ExprKind::If { cond, then, otherwise } => {
                let cond_ty = self.check_expr(cond)?;
                if cond_ty != Ty::Int {
                    return Err(Error::Mismatch {
                        expected: Ty::Int,
                        found: cond_ty,
                        span: self.ast.expr(cond).span,
                    });
                }

                let then_ty = self.check_expr(then)?;
                let else_ty = self.check_expr(otherwise)?;
                if then_ty != else_ty {
                    return Err(Error::Mismatch {
                        expected: then_ty,
                        found: else_ty,
                        span,
                    });
                }

                then_ty
            },

            ExprKind::Let { decls, body } => {
                for decl in decls {
                    match decl {
                        Decl::Var(var) => self.check_var(var)?,
                        Decl::Fun(fun) => self.check_fun(fun)?,
                    }
                }
                self.check_expr(body)?
            },

            ExprKind::Ident { decl, .. } => {
                let var = decl.expect("identifiers are resolved before type checking");
                self.ast.var(var).ty
                    .expect("declarations are typed before their uses")
            },

            ExprKind::Assign { lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                if lhs_ty != rhs_ty {
                    return Err(Error::Mismatch {
                        expected: lhs_ty,
                        found: rhs_ty,
                        span,
                    });
                }
                Ty::Void
            },

            ExprKind::While { cond, body } => {
                let cond_ty = self.check_expr(cond)?;
                if cond_ty != Ty::Int {
                    return Err(Error::Mismatch {
                        expected: Ty::Int,
                        found: cond_ty,
                        span: self.ast.expr(cond).span,
                    });
                }

                let body_ty = self.check_expr(body)?;
                if body_ty != Ty::Void {
                    return Err(Error::Mismatch {
                        expected: Ty::Void,
                        found: body_ty,
                        span: self.ast.expr(body).span,
                    });
                }

                Ty::Void
            },

            ExprKind::For { var, high, body } => {
                let high_ty = self.check_expr(high)?;
                if high_ty != Ty::Int {
                    return Err(Error::Mismatch {
                        expected: Ty::Int,
                        found: high_ty,
                        span: self.ast.expr(high).span,
                    });
                }

                self.check_var(var)?;
                let var_ty = self.ast.var(var).ty.unwrap();
                if var_ty != Ty::Int {
                    return Err(Error::Mismatch {
                        expected: Ty::Int,
                        found: var_ty,
                        span: self.ast.var(var).span,
                    });
                }

                let body_ty = self.check_expr(body)?;
                if body_ty != Ty::Void {
                    return Err(Error::Mismatch {
                        expected: Ty::Void,
                        found: body_ty,
                        span: self.ast.expr(body).span,
                    });
                }

                Ty::Void
            },

            ExprKind::Break { .. } => Ty::Void,

            ExprKind::Call { args, decl, .. } => {
                let fun = decl.expect("calls are resolved before type checking");
                self.check_fun(fun)?;

                let params = self.ast.fun(fun).params.clone();
                if args.len() != params.len() {
                    return Err(Error::Arity {
                        expected: params.len(),
                        found: args.len(),
                        span,
                    });
                }

                for (&arg, &param) in args.iter().zip(params.iter()) {
                    let arg_ty = self.check_expr(arg)?;
                    let param_ty = self.ast.var(param).ty
                        .expect("parameters are typed with their function");
                    if arg_ty != param_ty {
                        return Err(Error::Mismatch {
                            expected: param_ty,
                            found: arg_ty,
                            span: self.ast.expr(arg).span,
                        });
                    }
                }

                self.ast.fun(fun).ty.unwrap()
            },
        };

        self.ast.expr_mut(expr).ty = Some(ty);
        Ok(ty)
    }

    /// Resolve a type name in a value position (`int` or `string`).
    fn value_type(&self, type_name: symbol_table::Symbol, span: Span) -> Result<Ty, Error> {
        match self.ast.name(type_name) {
            "int" => Ok(Ty::Int),
            "string" => Ok(Ty::String),
            name => Err(Error::UnknownType { name: name.to_owned(), span }),
        }
    }

    /// Resolve a type name in a result position.
    ///
    /// `void` is permitted only on external primitives; user functions say
    /// nothing instead.
    fn result_type(
        &self,
        type_name: symbol_table::Symbol,
        is_external: bool,
        span: Span,
    ) -> Result<Ty, Error> {
        match self.ast.name(type_name) {
            "int" => Ok(Ty::Int),
            "string" => Ok(Ty::String),
            "void" if is_external => Ok(Ty::Void),
            name => Err(Error::UnknownType { name: name.to_owned(), span }),
        }
    }
}

/// A type-checking error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: Ty, found: Ty, span: Span },

    #[error("operator '{op}' cannot be applied to {ty} operands")]
    BadOperator { op: BinOp, ty: Ty, span: Span },

    #[error("unknown type name '{name}'")]
    UnknownType { name: String, span: Span },

    #[error("variable '{name}' needs a type annotation or an initializer")]
    MissingType { name: String, span: Span },

    #[error("variable '{name}' cannot have type void")]
    VoidVariable { name: String, span: Span },

    #[error("call expects {expected} arguments, found {found}")]
    Arity { expected: usize, found: usize, span: Span },
}

impl Error {
    /// The source location of the error.
    pub fn span(&self) -> Span {
        match self {
            Self::Mismatch { span, .. } => *span,
            Self::BadOperator { span, .. } => *span,
            Self::UnknownType { span, .. } => *span,
            Self::MissingType { span, .. } => *span,
            Self::VoidVariable { span, .. } => *span,
            Self::Arity { span, .. } => *span,
        }
    }
}
