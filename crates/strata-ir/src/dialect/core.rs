//! `core` dialect: the compilation-unit container.

use smallvec::smallvec;

use super::{ATTR_SYM_NAME, attr, func};
use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::location::Location;
use crate::ops::{Arity, DialectOp, OpShape};
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::define_op! {
    /// `core.module`: one body region whose first block holds the functions.
    pub struct Module = "core"."module", OpShape {
        regions: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

/// Create a detached `core.module` with an empty single-block body.
pub fn module(ctx: &mut IrContext, location: Location, name: Symbol) -> Module {
    let block = ctx.create_block(BlockData::new(location, []));
    let body = ctx.create_region(RegionData {
        location,
        blocks: smallvec![block],
        parent_op: None,
    });
    let data = OperationDataBuilder::new(location, Symbol::new("core"), Symbol::new("module"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .build(ctx);
    Module(ctx.create_op(data))
}

impl Module {
    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.body(ctx))
    }

    /// Top-level operations in the module's first block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        self.first_block(ctx)
            .map(|b| ctx.block(b).ops.to_vec())
            .unwrap_or_default()
    }

    /// `func.func` operations in module order.
    pub fn functions(self, ctx: &IrContext) -> Vec<func::Func> {
        self.ops(ctx)
            .into_iter()
            .filter_map(|op| func::Func::from_op(ctx, op).ok())
            .collect()
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        attr(ctx, self.0, ATTR_SYM_NAME()).and_then(Attribute::as_symbol)
    }
}
