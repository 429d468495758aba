//! Parsing Tiger code into an AST.

use std::iter::Peekable;

use pest::iterators::{Pair, Pairs};
use thiserror::Error;

use crate::src::{Rule, Span};

use super::{
    Assoc, BinOp, Decl, ExprId, ExprKind, FunDecl, Prec, Storage, VarDecl,
    VarId,
};

/// A parser for grammatical Tiger code.
///
/// Given [`pest`]-parsed Tiger code, this type can be used to construct an
/// AST inside a [`Storage`].
pub struct Parser<'s> {
    /// Storage for the AST.
    storage: &'s mut Storage,
}

impl<'s> Parser<'s> {
    /// Construct a new [`Parser`].
    pub fn new(storage: &'s mut Storage) -> Self {
        Self { storage }
    }

    /// Parse a whole program, returning its root expression.
    pub fn parse_program(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::program, input.as_rule());
        self.parse_expr(input.into_inner().next().unwrap())
    }

    /// Parse an expression.
    pub fn parse_expr(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::expr, input.as_rule());

        let inner = input.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::assign => self.parse_assign(inner),
            Rule::binary => self.parse_binary(inner),
            _ => unreachable!(),
        }
    }

    /// Parse an assignment.
    fn parse_assign(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::assign, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner();
        let name = pairs.next().unwrap();
        let lhs_span = Span::from(name.as_span());
        let name = self.parse_name(name);
        let lhs = self.storage.add_expr(
            lhs_span,
            ExprKind::Ident { name, decl: None, depth: 0 },
        );
        let rhs = self.parse_expr(pairs.next().unwrap())?;

        Ok(self.storage.add_expr(span, ExprKind::Assign { lhs, rhs }))
    }

    /// Parse a chain of binary operations.
    fn parse_binary(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::binary, input.as_rule());
        self.parse_binary_inner(None, &mut input.into_inner().peekable())
    }

    fn parse_binary_inner(
        &mut self,
        prev: Option<&Pair<'_, Rule>>,
        input: &mut Peekable<Pairs<'_, Rule>>,
    ) -> Result<ExprId> {
        // The expression parsed thus far.
        let mut expr = self.parse_unit(input.next().unwrap())?;

        // Try parsing another binary operation.
        while let Some(next) = input.peek() {
            // Test that the operator is part of this expression.
            if binop_cmp(prev, next)? == Assoc::Left {
                break;
            }

            let next = input.next().unwrap();
            let op = binop_of(&next);
            let rhs = self.parse_binary_inner(Some(&next), input)?;

            let span = self.storage.expr(expr).span
                .to(self.storage.expr(rhs).span);
            expr = self.storage.add_expr(span, ExprKind::Binary(op, expr, rhs));
        }

        Ok(expr)
    }

    /// Parse an indivisible expression, with any prefixed negations.
    fn parse_unit(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::unit, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner();
        let mut negations = 0;
        let atom = loop {
            let pair = pairs.next().unwrap();
            if pair.as_rule() == Rule::op_neg {
                negations += 1;
            } else {
                break pair;
            }
        };

        // Negation has no node of its own: `-x` is `0 - x`.
        let mut expr = self.parse_atom(atom)?;
        for _ in 0..negations {
            let zero = self.storage.add_expr(span, ExprKind::Int(0));
            expr = self.storage
                .add_expr(span, ExprKind::Binary(BinOp::Sub, zero, expr));
        }

        Ok(expr)
    }

    /// Parse an atomic expression.
    fn parse_atom(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        let span = Span::from(input.as_span());
        match input.as_rule() {
            Rule::int_lit => {
                let value = input.as_str().parse()
                    .map_err(|_| Error::IntOutOfRange { span })?;
                Ok(self.storage.add_expr(span, ExprKind::Int(value)))
            },
            Rule::str_lit => {
                let value = self.parse_string(input)?;
                Ok(self.storage.add_expr(span, ExprKind::Str(value)))
            },
            Rule::call => self.parse_call(input),
            Rule::ident => {
                let name = self.parse_name(input.into_inner().next().unwrap());
                Ok(self.storage.add_expr(
                    span,
                    ExprKind::Ident { name, decl: None, depth: 0 },
                ))
            },
            Rule::if_expr => {
                let mut pairs = input.into_inner();
                let cond = self.parse_expr(pairs.next().unwrap())?;
                let then = self.parse_expr(pairs.next().unwrap())?;
                let otherwise = self.parse_expr(pairs.next().unwrap())?;
                Ok(self.storage
                    .add_expr(span, ExprKind::If { cond, then, otherwise }))
            },
            Rule::while_expr => {
                let mut pairs = input.into_inner();
                let cond = self.parse_expr(pairs.next().unwrap())?;
                let body = self.parse_expr(pairs.next().unwrap())?;
                Ok(self.storage.add_expr(span, ExprKind::While { cond, body }))
            },
            Rule::for_expr => self.parse_for(input),
            Rule::break_expr => {
                Ok(self.storage.add_expr(span, ExprKind::Break { target: None }))
            },
            Rule::let_expr => self.parse_let(input),
            Rule::seq_expr => {
                let exprs = input.into_inner()
                    .map(|p| self.parse_expr(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.storage.add_expr(span, ExprKind::Seq(exprs)))
            },
            _ => unreachable!(),
        }
    }

    /// Parse a function call.
    fn parse_call(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::call, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner();
        let name = self.parse_name(pairs.next().unwrap());
        let args = pairs
            .map(|p| self.parse_expr(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.storage.add_expr(
            span,
            ExprKind::Call { name, args, decl: None, depth: 0 },
        ))
    }

    /// Parse a for loop.
    fn parse_for(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::for_expr, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner();
        let name = pairs.next().unwrap();
        let name_span = Span::from(name.as_span());
        let name = self.parse_name(name);
        let low = self.parse_expr(pairs.next().unwrap())?;
        let high = self.parse_expr(pairs.next().unwrap())?;

        // The induction variable is an ordinary declaration whose
        // initializer is the lower bound.
        let var = self.storage
            .add_var(VarDecl::new(name_span, name, None, Some(low)));
        let body = self.parse_expr(pairs.next().unwrap())?;

        Ok(self.storage.add_expr(span, ExprKind::For { var, high, body }))
    }

    /// Parse a let block.
    fn parse_let(&mut self, input: Pair<'_, Rule>) -> Result<ExprId> {
        assert_eq!(Rule::let_expr, input.as_rule());

        let span = Span::from(input.as_span());
        let mut decls = Vec::new();
        let mut exprs = Vec::new();
        for pair in input.into_inner() {
            match pair.as_rule() {
                Rule::var_decl => decls.push(self.parse_var_decl(pair)?),
                Rule::fun_decl => decls.push(self.parse_fun_decl(pair)?),
                Rule::expr => exprs.push(self.parse_expr(pair)?),
                _ => unreachable!(),
            }
        }

        let body = self.storage.add_expr(span, ExprKind::Seq(exprs));
        Ok(self.storage.add_expr(span, ExprKind::Let { decls, body }))
    }

    /// Parse a variable declaration.
    fn parse_var_decl(&mut self, input: Pair<'_, Rule>) -> Result<Decl> {
        assert_eq!(Rule::var_decl, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner().peekable();
        let name = self.parse_name(pairs.next().unwrap());
        let type_name = pairs
            .next_if(|p| p.as_rule() == Rule::type_name)
            .map(|p| self.parse_type_name(p));
        let init = match pairs.next() {
            Some(p) => Some(self.parse_expr(p)?),
            None => None,
        };

        let var = self.storage.add_var(VarDecl::new(span, name, type_name, init));
        Ok(Decl::Var(var))
    }

    /// Parse a function declaration.
    fn parse_fun_decl(&mut self, input: Pair<'_, Rule>) -> Result<Decl> {
        assert_eq!(Rule::fun_decl, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner().peekable();
        let name = self.parse_name(pairs.next().unwrap());
        let mut params = Vec::new();
        while let Some(p) = pairs.next_if(|p| p.as_rule() == Rule::param) {
            params.push(self.parse_param(p));
        }
        let type_name = pairs
            .next_if(|p| p.as_rule() == Rule::type_name)
            .map(|p| self.parse_type_name(p));
        let body = self.parse_expr(pairs.next().unwrap())?;

        let fun = self.storage.add_fun(FunDecl::new(
            span,
            name,
            params,
            Some(body),
            type_name,
            false,
        ));
        Ok(Decl::Fun(fun))
    }

    /// Parse a function parameter.
    fn parse_param(&mut self, input: Pair<'_, Rule>) -> VarId {
        assert_eq!(Rule::param, input.as_rule());

        let span = Span::from(input.as_span());
        let mut pairs = input.into_inner();
        let name = self.parse_name(pairs.next().unwrap());
        let type_name = self.parse_type_name(pairs.next().unwrap());

        self.storage.add_var(VarDecl::new(span, name, Some(type_name), None))
    }

    /// Parse a type name.
    fn parse_type_name(&mut self, input: Pair<'_, Rule>) -> symbol_table::Symbol {
        assert_eq!(Rule::type_name, input.as_rule());
        self.parse_name(input.into_inner().next().unwrap())
    }

    /// Parse a string literal.
    fn parse_string(&mut self, input: Pair<'_, Rule>) -> Result<symbol_table::Symbol> {
        assert_eq!(Rule::str_lit, input.as_rule());

        let mut value = String::new();
        for pair in input.into_inner() {
            match pair.as_rule() {
                Rule::str_raw => value.push_str(pair.as_str()),
                Rule::str_escape => {
                    let escape = pair.as_str();
                    match &escape[1..] {
                        "n" => value.push('\n'),
                        "t" => value.push('\t'),
                        "\"" => value.push('"'),
                        "\\" => value.push('\\'),
                        code => {
                            let span = Span::from(pair.as_span());
                            let code = code.parse::<u32>().ok()
                                .filter(|&c| c <= 255)
                                .ok_or(Error::BadEscape { span })?;
                            value.push(char::from_u32(code).unwrap());
                        },
                    }
                },
                _ => unreachable!(),
            }
        }

        Ok(self.storage.intern(&value))
    }

    /// Parse a name.
    fn parse_name(&mut self, input: Pair<'_, Rule>) -> symbol_table::Symbol {
        assert_eq!(Rule::name, input.as_rule());
        self.storage.intern(input.as_str())
    }
}

/// The binary operator of an operator pair.
fn binop_of(input: &Pair<'_, Rule>) -> BinOp {
    match input.as_rule() {
        Rule::op_add => BinOp::Add,
        Rule::op_sub => BinOp::Sub,
        Rule::op_mul => BinOp::Mul,
        Rule::op_div => BinOp::Div,
        Rule::op_eq => BinOp::Eq,
        Rule::op_neq => BinOp::Ne,
        Rule::op_lt => BinOp::Lt,
        Rule::op_le => BinOp::Le,
        Rule::op_gt => BinOp::Gt,
        Rule::op_ge => BinOp::Ge,
        _ => unreachable!(),
    }
}

/// Compare two binary operators for associativity.
fn binop_cmp(
    lhs: Option<&Pair<'_, Rule>>,
    rhs: &Pair<'_, Rule>,
) -> Result<Assoc> {
    let lhs_prec = lhs.map_or(Prec::Min, |p| binop_of(p).prec());
    if let Some(assoc) = Prec::cmp(lhs_prec, binop_of(rhs).prec()) {
        // The operators are compatible.
        return Ok(assoc);
    }

    // 'lhs' had to exist for incompatibility to occur.
    let lhs = lhs.unwrap();

    let message = format!(
        "the operators '{}' and '{}' cannot be chained - wrap one or the \
         other in parentheses",
        lhs.as_str(), rhs.as_str());
    Err(Error::Grammar(pest::error::Error::new_from_span(
        pest::error::ErrorVariant::CustomError { message },
        lhs.as_span().start_pos().span(&rhs.as_span().end_pos()),
    )))
}

/// A parsing error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("there was a grammatical error in the source code: {0}")]
    Grammar(#[from] pest::error::Error<Rule>),

    #[error("integer literal does not fit in 32 bits")]
    IntOutOfRange { span: Span },

    #[error("invalid escape in string literal")]
    BadEscape { span: Span },
}

impl Error {
    /// The source location of the error, if it has a single one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Grammar(_) => None,
            Self::IntOutOfRange { span } => Some(*span),
            Self::BadEscape { span } => Some(*span),
        }
    }
}

/// A parsing result.
pub type Result<T> = std::result::Result<T, Error>;
