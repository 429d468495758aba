//! Building LLVM IR from a bound, typed AST.
//!
//! Every function is lowered to basic blocks with its stack allocations in
//! a dedicated entry block.  Nested functions are hoisted to the top level:
//! each function gets a frame struct holding its escaping variables, and a
//! static-link pointer to its parent's frame is threaded as a hidden first
//! parameter, so inner functions can reach outer variables by walking the
//! chain of frames.

use std::collections::VecDeque;

use inkwell::{
    AddressSpace,
    IntPredicate,
    basic_block::BasicBlock,
    builder::Builder,
    module::Linkage,
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, StructType},
    values::{
        BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue,
    },
};
use rustc_hash::FxHashMap;

use crate::ast::{BinOp, Decl, ExprId, ExprKind, FunId, Storage, Ty, VarId};

use super::{Context, Error, Module};

/// Lower a bound and typed program to an LLVM module.
///
/// The wrapper `main` is generated first; the nested functions it declares
/// are queued and generated after it, in declaration order.
pub fn emit_program<'ctx>(
    ctx: &'ctx Context,
    ast: &Storage,
    main: FunId,
    name: &str,
) -> Result<Module<'ctx>, Error> {
    let mut generator = Generator {
        ast,
        ctx,
        builder: ctx.create_builder(),
        module: Module::new(ctx, name),
        frame_types: FxHashMap::default(),
        frame_fields: FxHashMap::default(),
        slots: FxHashMap::default(),
        loop_exits: FxHashMap::default(),
        pending: VecDeque::new(),
        current: None,
        function: None,
        frame: None,
    };

    generator.declare_fun(main)?;
    while let Some(fun) = generator.pending.pop_front() {
        generator.generate_function(fun)?;
    }

    Ok(generator.module)
}

/// The IR generation pass.
struct Generator<'ctx, 'ast> {
    /// Storage for the AST.
    ast: &'ast Storage,
    /// The LLVM context.
    ctx: &'ctx Context,
    /// The instruction builder.
    builder: Builder<'ctx>,
    /// The module being built.
    module: Module<'ctx>,
    /// The frame struct of every generated function.
    frame_types: FxHashMap<FunId, StructType<'ctx>>,
    /// The frame field of every escaping variable.
    frame_fields: FxHashMap<VarId, u32>,
    /// The storage slot of every variable of the current function.
    slots: FxHashMap<VarId, PointerValue<'ctx>>,
    /// The exit block of every loop of the current function.
    loop_exits: FxHashMap<ExprId, BasicBlock<'ctx>>,
    /// Functions whose prototypes exist but whose bodies are yet to be
    /// generated, oldest first.
    pending: VecDeque<FunId>,
    /// The function currently being generated.
    current: Option<FunId>,
    /// Its LLVM value.
    function: Option<FunctionValue<'ctx>>,
    /// Its frame allocation.
    frame: Option<PointerValue<'ctx>>,
}

impl<'ctx, 'ast> Generator<'ctx, 'ast> {
    /// Translate a Tiger value type to LLVM.
    fn llvm_type(&self, ty: Ty) -> BasicTypeEnum<'ctx> {
        match ty {
            Ty::Int => self.ctx.i32_type().into(),
            Ty::String => self.ctx.i8_type()
                .ptr_type(AddressSpace::default())
                .into(),
            Ty::Void => unreachable!("void values have no storage"),
        }
    }

    /// Register the prototype of a function.
    ///
    /// Non-external functions with a parent take a pointer to the parent's
    /// frame as a hidden first parameter.  Functions with a body are queued
    /// for generation.
    fn declare_fun(&mut self, fun: FunId) -> Result<FunctionValue<'ctx>, Error> {
        let ast = self.ast;
        let decl = ast.fun(fun);

        let mut params: Vec<BasicMetadataTypeEnum> = Vec::new();
        if !decl.is_external {
            if let Some(parent) = decl.parent {
                params.push(self.frame_types[&parent]
                    .ptr_type(AddressSpace::default())
                    .into());
            }
        }
        for &param in &decl.params {
            let ty = ast.var(param).ty
                .expect("parameters are typed before lowering");
            params.push(self.llvm_type(ty).into());
        }

        let returns = decl.ty.expect("functions are typed before lowering");
        let prototype = match returns {
            Ty::Void => self.ctx.void_type().fn_type(&params, false),
            ty => self.llvm_type(ty).fn_type(&params, false),
        };

        let linkage = if decl.is_external {
            Linkage::External
        } else {
            Linkage::Internal
        };
        let name = ast.name(decl.external_name
            .expect("functions are named before lowering"));
        let value = self.module.add_function(name, prototype, Some(linkage));

        if decl.body.is_some() {
            self.pending.push_back(fun);
        }

        Ok(value)
    }

    /// Look up a callee's prototype, registering it on first use.
    ///
    /// Only primitives can be missing here: every other function's
    /// prototype is registered when its declaration is lowered.
    fn callee(&mut self, fun: FunId) -> Result<FunctionValue<'ctx>, Error> {
        let name = self.ast.name(self.ast.fun(fun).external_name
            .expect("functions are named before lowering"));
        match self.module.get_function(name) {
            Some(value) => Ok(value),
            None => self.declare_fun(fun),
        }
    }

    /// Generate the body of a function.
    fn generate_function(&mut self, fun: FunId) -> Result<(), Error> {
        let ast = self.ast;
        let decl = ast.fun(fun);

        // Reset the per-function state.
        self.slots.clear();
        self.loop_exits.clear();
        self.current = Some(fun);

        let name = ast.name(decl.external_name.unwrap());
        let function = self.module.get_function(name)
            .expect("prototypes are registered before bodies are generated");
        self.function = Some(function);

        // The entry block holds the allocations, the body block the code.
        let entry = self.ctx.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.generate_frame(fun)?;

        let body = self.ctx.append_basic_block(function, "body");
        self.builder.position_at_end(body);

        // Spill every argument into its slot.  The static link, if any,
        // goes into field 0 of the frame.
        let has_link = decl.parent.is_some() && !decl.is_external;
        for (index, arg) in function.get_param_iter().enumerate() {
            if has_link && index == 0 {
                arg.set_name("link");
                let slot = self.builder
                    .build_struct_gep(self.frame.unwrap(), 0, "")?;
                self.builder.build_store(slot, arg)?;
            } else {
                let param = decl.params[index - has_link as usize];
                arg.set_name(ast.name(ast.var(param).name));
                let slot = self.var_slot(param)?;
                self.builder.build_store(slot, arg)?;
            }
        }

        // Generate the body and return its value.
        let result = self.gen_expr(decl.body
            .expect("queued functions have a body"))?;
        match decl.ty.unwrap() {
            Ty::Void => self.builder.build_return(None)?,
            _ => {
                let result = result.expect("non-void bodies yield a value");
                self.builder.build_return(Some(&result))?
            },
        };

        // Jump from the allocations to the code.
        self.builder.position_at_end(entry);
        self.builder.build_unconditional_branch(body)?;

        if !function.verify(true) {
            return Err(Error::Verify(name.to_owned()));
        }

        Ok(())
    }

    /// Create and allocate the frame of the current function.
    ///
    /// The frame struct holds a pointer to the parent's frame (if there is
    /// a parent), then every escaping variable of the function, in
    /// declaration order.
    fn generate_frame(&mut self, fun: FunId) -> Result<(), Error> {
        let ast = self.ast;
        let decl = ast.fun(fun);

        let mut fields: Vec<BasicTypeEnum> = Vec::new();
        if let Some(parent) = decl.parent {
            fields.push(self.frame_types[&parent]
                .ptr_type(AddressSpace::default())
                .into());
        }

        let mut position = fields.len() as u32;
        for var in ast.escaping_vars(fun) {
            self.frame_fields.insert(var, position);
            position += 1;
            fields.push(self.llvm_type(ast.var(var).ty.unwrap()));
        }

        let name = ast.name(decl.external_name.unwrap());
        let frame_type = self.ctx.opaque_struct_type(&format!("ft_{}", name));
        frame_type.set_body(&fields, false);
        self.frame_types.insert(fun, frame_type);

        let frame = self.builder
            .build_alloca(frame_type, &format!("frame_{}", name))?;
        self.frame = Some(frame);
        Ok(())
    }

    /// Emit an allocation into the entry block of the current function,
    /// regardless of where the builder currently is.
    fn alloca_in_entry(
        &mut self,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> Result<PointerValue<'ctx>, Error> {
        let saved = self.builder.get_insert_block()
            .expect("the builder is positioned inside a function");
        let entry = self.function.unwrap().get_first_basic_block()
            .expect("the entry block is created first");
        self.builder.position_at_end(entry);
        let slot = self.builder.build_alloca(ty, name)?;
        self.builder.position_at_end(saved);
        Ok(slot)
    }

    /// Create the storage slot for a variable of the current function.
    ///
    /// Non-escaping variables live in a private stack slot; escaping ones
    /// live at their field of the function's frame.
    fn var_slot(&mut self, var: VarId) -> Result<PointerValue<'ctx>, Error> {
        let ast = self.ast;
        let decl = ast.var(var);

        let slot = if !decl.escapes {
            self.alloca_in_entry(
                self.llvm_type(decl.ty.unwrap()),
                ast.name(decl.name),
            )?
        } else {
            self.builder.build_struct_gep(
                self.frame.unwrap(),
                self.frame_fields[&var],
                "",
            )?
        };

        self.slots.insert(var, slot);
        Ok(slot)
    }

    /// Walk the static-link chain.
    ///
    /// Level 0 is the current function's own frame; each further level
    /// loads the static link stored at field 0.  Returns the frame type and
    /// frame pointer reached.
    fn frame_up(
        &mut self,
        levels: u32,
    ) -> Result<(StructType<'ctx>, PointerValue<'ctx>), Error> {
        let ast = self.ast;
        let mut fun = self.current.unwrap();
        let mut frame = self.frame.unwrap();

        for _ in 0..levels {
            let parent = ast.fun(fun).parent
                .expect("static links reach only functions with parents");
            let slot = self.builder.build_struct_gep(frame, 0, "")?;
            frame = self.builder.build_load(slot, "")?
                .into_pointer_value();
            fun = parent;
        }

        Ok((self.frame_types[&fun], frame))
    }

    /// Compute the address of the variable behind an identifier.
    fn address_of(&mut self, expr: ExprId) -> Result<PointerValue<'ctx>, Error> {
        let ast = self.ast;
        let (var, depth) = match &ast.expr(expr).kind {
            ExprKind::Ident { decl, depth, .. } => {
                let var = decl.expect("identifiers are resolved before lowering");
                (var, *depth)
            },
            _ => unreachable!("only identifiers have addresses"),
        };

        let decl = ast.var(var);
        if !decl.escapes {
            // Non-escaping variables are always in the current function.
            Ok(self.slots[&var])
        } else {
            let (_, frame) = self.frame_up(depth - decl.depth)?;
            Ok(self.builder.build_struct_gep(
                frame,
                self.frame_fields[&var],
                "",
            )?)
        }
    }

    /// Lower a variable declaration.
    ///
    /// Declarations of type `void` evaluate their initializer for its side
    /// effects and allocate nothing.
    fn gen_var(&mut self, var: VarId) -> Result<(), Error> {
        let ast = self.ast;
        let decl = ast.var(var);

        if decl.ty == Some(Ty::Void) {
            if let Some(init) = decl.init {
                self.gen_expr(init)?;
            }
            return Ok(());
        }

        let slot = self.var_slot(var)?;
        if let Some(init) = decl.init {
            let value = self.gen_expr(init)?
                .expect("non-void initializers yield a value");
            self.builder.build_store(slot, value)?;
        }
        Ok(())
    }

    /// Lower an expression.
    ///
    /// Expressions of type `void` yield no value.
    fn gen_expr(
        &mut self,
        expr: ExprId,
    ) -> Result<Option<BasicValueEnum<'ctx>>, Error> {
        let ast = self.ast;
        match &ast.expr(expr).kind {
            ExprKind::Int(value) => {
                let value = self.ctx.i32_type()
                    .const_int(*value as i64 as u64, true);
                Ok(Some(value.into()))
            },

            ExprKind::Str(value) => {
                let global = self.builder
                    .build_global_string_ptr(ast.name(*value), "str")?;
                Ok(Some(global.as_pointer_value().into()))
            },

            ExprKind::Binary(op, lhs, rhs) => {
                // Unit values can be compared for equality only; the result
                // is known without generating any code for the operands.
                if ast.expr(*lhs).ty == Some(Ty::Void) {
                    let value = self.ctx.i32_type()
                        .const_int((*op == BinOp::Eq) as u64, false);
                    return Ok(Some(value.into()));
                }

                // Strings are compared by calling the runtime's __strcmp
                // and comparing its result to zero.
                let (lhs_value, rhs_value) = if ast.expr(*lhs).ty
                    == Some(Ty::String)
                {
                    let strcmp = self.strcmp();
                    let lhs = self.gen_expr(*lhs)?.unwrap();
                    let rhs = self.gen_expr(*rhs)?.unwrap();
                    let compared = self.builder
                        .build_call(strcmp, &[lhs.into(), rhs.into()], "")?;
                    let compared = compared.try_as_basic_value().left()
                        .unwrap()
                        .into_int_value();
                    (compared, self.ctx.i32_type().const_zero())
                } else {
                    let lhs = self.gen_expr(*lhs)?.unwrap().into_int_value();
                    let rhs = self.gen_expr(*rhs)?.unwrap().into_int_value();
                    (lhs, rhs)
                };

                let value = match op {
                    BinOp::Add => self.builder
                        .build_int_add(lhs_value, rhs_value, "")?,
                    BinOp::Sub => self.builder
                        .build_int_sub(lhs_value, rhs_value, "")?,
                    BinOp::Mul => self.builder
                        .build_int_mul(lhs_value, rhs_value, "")?,
                    BinOp::Div => self.builder
                        .build_int_signed_div(lhs_value, rhs_value, "")?,
                    _ => {
                        // Comparisons produce an i1 which must widen back
                        // to i32.
                        let predicate = match op {
                            BinOp::Eq => IntPredicate::EQ,
                            BinOp::Ne => IntPredicate::NE,
                            BinOp::Lt => IntPredicate::SLT,
                            BinOp::Le => IntPredicate::SLE,
                            BinOp::Gt => IntPredicate::SGT,
                            BinOp::Ge => IntPredicate::SGE,
                            _ => unreachable!(),
                        };
                        let flag = self.builder.build_int_compare(
                            predicate, lhs_value, rhs_value, "")?;
                        self.builder
                            .build_int_z_extend(flag, self.ctx.i32_type(), "")?
                    },
                };

                Ok(Some(value.into()))
            },

            ExprKind::Seq(exprs) => {
                let mut result = None;
                for &expr in exprs {
                    result = self.gen_expr(expr)?;
                }
                Ok(result)
            },

            ExprKind::If { cond, then, otherwise } => {
                let ty = ast.expr(expr).ty.unwrap();
                let slot = match ty {
                    Ty::Void => None,
                    ty => Some(self.alloca_in_entry(
                        self.llvm_type(ty), "if_result")?),
                };

                let function = self.function.unwrap();
                let then_block = self.ctx
                    .append_basic_block(function, "if_then");
                let else_block = self.ctx
                    .append_basic_block(function, "if_else");
                let end_block = self.ctx
                    .append_basic_block(function, "if_end");

                let cond = self.gen_expr(*cond)?.unwrap().into_int_value();
                let flag = self.builder.build_int_compare(
                    IntPredicate::NE,
                    cond,
                    self.ctx.i32_type().const_zero(),
                    "",
                )?;
                self.builder
                    .build_conditional_branch(flag, then_block, else_block)?;

                self.builder.position_at_end(then_block);
                let value = self.gen_expr(*then)?;
                if let Some(slot) = slot {
                    self.builder.build_store(slot, value.unwrap())?;
                }
                self.builder.build_unconditional_branch(end_block)?;

                self.builder.position_at_end(else_block);
                let value = self.gen_expr(*otherwise)?;
                if let Some(slot) = slot {
                    self.builder.build_store(slot, value.unwrap())?;
                }
                self.builder.build_unconditional_branch(end_block)?;

                self.builder.position_at_end(end_block);
                match slot {
                    Some(slot) => Ok(Some(self.builder
                        .build_load(slot, "")?)),
                    None => Ok(None),
                }
            },

            ExprKind::Let { decls, body } => {
                for decl in decls {
                    match *decl {
                        Decl::Var(var) => self.gen_var(var)?,
                        Decl::Fun(fun) => {
                            self.declare_fun(fun)?;
                        },
                    }
                }
                self.gen_expr(*body)
            },

            ExprKind::Ident { .. } => {
                let ty = ast.expr(expr).ty.unwrap();
                if ty == Ty::Void {
                    return Ok(None);
                }
                let address = self.address_of(expr)?;
                Ok(Some(self.builder
                    .build_load(address, "")?))
            },

            ExprKind::Assign { lhs, rhs } => {
                let value = self.gen_expr(*rhs)?;
                if ast.expr(*lhs).ty == Some(Ty::Void) {
                    return Ok(None);
                }
                let address = self.address_of(*lhs)?;
                self.builder.build_store(
                    address,
                    value.expect("non-void assignments store a value"),
                )?;
                Ok(None)
            },

            ExprKind::While { cond, body } => {
                let function = self.function.unwrap();
                let test_block = self.ctx
                    .append_basic_block(function, "loop_test");
                let body_block = self.ctx
                    .append_basic_block(function, "loop_body");
                let end_block = self.ctx
                    .append_basic_block(function, "loop_end");
                self.loop_exits.insert(expr, end_block);

                self.builder.build_unconditional_branch(test_block)?;
                self.builder.position_at_end(test_block);
                let cond = self.gen_expr(*cond)?.unwrap().into_int_value();
                let flag = self.builder.build_int_compare(
                    IntPredicate::NE,
                    cond,
                    self.ctx.i32_type().const_zero(),
                    "",
                )?;
                self.builder
                    .build_conditional_branch(flag, body_block, end_block)?;

                self.builder.position_at_end(body_block);
                self.gen_expr(*body)?;
                self.builder.build_unconditional_branch(test_block)?;

                self.builder.position_at_end(end_block);
                Ok(None)
            },

            ExprKind::For { var, high, body } => {
                let function = self.function.unwrap();
                let test_block = self.ctx
                    .append_basic_block(function, "loop_test");
                let body_block = self.ctx
                    .append_basic_block(function, "loop_body");
                let end_block = self.ctx
                    .append_basic_block(function, "loop_end");

                // The induction variable starts at the lower bound.
                self.gen_var(*var)?;
                let index = self.slots[var];
                let high = self.gen_expr(*high)?.unwrap().into_int_value();
                self.loop_exits.insert(expr, end_block);

                self.builder.build_unconditional_branch(test_block)?;
                self.builder.position_at_end(test_block);
                let i32_type = self.ctx.i32_type();
                let current = self.builder.build_load(index, "")?
                    .into_int_value();
                let flag = self.builder.build_int_compare(
                    IntPredicate::SLE, current, high, "")?;
                self.builder
                    .build_conditional_branch(flag, body_block, end_block)?;

                self.builder.position_at_end(body_block);
                self.gen_expr(*body)?;
                let current = self.builder.build_load(index, "")?
                    .into_int_value();
                let next = self.builder.build_int_add(
                    current, i32_type.const_int(1, false), "")?;
                self.builder.build_store(index, next)?;
                self.builder.build_unconditional_branch(test_block)?;

                self.builder.position_at_end(end_block);
                Ok(None)
            },

            ExprKind::Break { target } => {
                let target = target.expect("breaks are bound to their loop");
                let exit = self.loop_exits[&target];
                self.builder.build_unconditional_branch(exit)?;

                // Park the builder in a fresh block so whatever follows the
                // break cannot pile up behind the terminator.
                let dead = self.ctx.append_basic_block(
                    self.function.unwrap(), "after_break");
                self.builder.position_at_end(dead);
                Ok(None)
            },

            ExprKind::Call { args, decl, depth, .. } => {
                let fun = decl.expect("calls are resolved before lowering");
                let callee = self.callee(fun)?;
                let decl = ast.fun(fun);

                let mut values: Vec<BasicMetadataValueEnum> = Vec::new();
                if !decl.is_external {
                    // Pass the frame of the callee's parent as its static
                    // link.
                    let (_, frame) = self.frame_up(depth - decl.depth)?;
                    values.push(frame.into());
                }
                for &arg in args {
                    let value = self.gen_expr(arg)?
                        .expect("non-void arguments yield a value");
                    values.push(value.into());
                }

                // Void values cannot carry a name in the IR.
                if decl.ty == Some(Ty::Void) {
                    self.builder.build_call(callee, &values, "")?;
                    Ok(None)
                } else {
                    let call = self.builder.build_call(callee, &values, "call")?;
                    Ok(call.try_as_basic_value().left())
                }
            },
        }
    }

    /// The prototype of the runtime's string comparison helper.
    fn strcmp(&self) -> FunctionValue<'ctx> {
        match self.module.get_function("__strcmp") {
            Some(value) => value,
            None => {
                let string = self.ctx.i8_type()
                    .ptr_type(AddressSpace::default());
                let prototype = self.ctx.i32_type()
                    .fn_type(&[string.into(), string.into()], false);
                self.module.add_function(
                    "__strcmp", prototype, Some(Linkage::External))
            },
        }
    }
}
