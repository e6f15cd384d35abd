//! `cf` dialect: unstructured branches.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{Arity, OpShape};
use crate::refs::{BlockRef, ValueRef};
use crate::symbol::Symbol;

crate::define_op! {
    /// `cf.br`: jump to `dest`, binding `args` to its block arguments.
    pub struct Br = "cf"."br", OpShape {
        operands: Arity::AtLeast(0),
        successors: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `cf.cond_br`: jump to `then_dest` if `cond` holds, else to `else_dest`.
    pub struct CondBr = "cf"."cond_br", OpShape {
        operands: Arity::Exact(1),
        successors: Arity::Exact(2),
        ..OpShape::NULLARY
    };
}

pub fn br(
    ctx: &mut IrContext,
    location: Location,
    args: impl IntoIterator<Item = ValueRef>,
    dest: BlockRef,
) -> Br {
    let data = OperationDataBuilder::new(location, Symbol::new("cf"), Symbol::new("br"))
        .operands(args)
        .successor(dest)
        .build(ctx);
    Br(ctx.create_op(data))
}

pub fn cond_br(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    then_dest: BlockRef,
    else_dest: BlockRef,
) -> CondBr {
    let data = OperationDataBuilder::new(location, Symbol::new("cf"), Symbol::new("cond_br"))
        .operand(cond)
        .successor(then_dest)
        .successor(else_dest)
        .build(ctx);
    CondBr(ctx.create_op(data))
}

impl Br {
    pub fn dest(self, ctx: &IrContext) -> BlockRef {
        ctx.op(self.0).successors[0]
    }

    pub fn args(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

impl CondBr {
    pub fn cond(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn then_dest(self, ctx: &IrContext) -> BlockRef {
        ctx.op(self.0).successors[0]
    }

    pub fn else_dest(self, ctx: &IrContext) -> BlockRef {
        ctx.op(self.0).successors[1]
    }
}
