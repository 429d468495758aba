//! Lowering Tiger to LLVM IR.

use core::ops::Deref;

use thiserror::Error;

use inkwell;

pub mod build;

pub use build::emit_program;

/// The LLVM context behind all IR objects.
pub struct Context {
    inner: inkwell::context::Context,
}

impl Context {
    /// Construct a new [`Context`].
    pub fn new() -> Self {
        Self { inner: inkwell::context::Context::create() }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Context {
    type Target = inkwell::context::Context;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The IR of a compiled program.
pub struct Module<'ctx> {
    inner: inkwell::module::Module<'ctx>,
}

impl<'ctx> Module<'ctx> {
    /// Construct a new [`Module`] of the given name.
    pub fn new(ctx: &'ctx Context, name: &str) -> Self {
        Self {
            inner: ctx.inner.create_module(name),
        }
    }

    /// Render the module as textual LLVM IR.
    pub fn as_text(&self) -> String {
        self.inner.print_to_string().to_string()
    }
}

impl<'ctx> Deref for Module<'ctx> {
    type Target = inkwell::module::Module<'ctx>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// An error involving the IR.
#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred when building the IR: {0}")]
    Builder(#[from] inkwell::builder::BuilderError),

    #[error("The function '{0}' failed IR verification")]
    Verify(String),
}
