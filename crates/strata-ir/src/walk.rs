//! Recursive operation traversal.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region recursively, pre-order.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block recursively, pre-order.
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &op in &ctx.block(block).ops {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions recursively, pre-order.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in &ctx.op(op).regions {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk operations of a specific dialect type in a region.
pub fn walk_typed<T, B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()>
where
    T: DialectOp,
{
    walk_region(ctx, region, &mut |op| {
        if let Ok(typed) = T::from_op(ctx, op) {
            f(typed)
        } else {
            ControlFlow::Continue(WalkAction::Advance)
        }
    })
}

/// All operations nested in `region`, children before their parent.
///
/// Within a region, blocks and ops keep their order. An operation's nested
/// regions are fully listed before the operation itself, so rewriting in
/// this order handles inner constructs first.
pub fn collect_post_order(ctx: &IrContext, region: RegionRef) -> Vec<OpRef> {
    fn visit_region(ctx: &IrContext, region: RegionRef, out: &mut Vec<OpRef>) {
        for &block in &ctx.region(region).blocks {
            for &op in &ctx.block(block).ops {
                for &nested in &ctx.op(op).regions {
                    visit_region(ctx, nested, out);
                }
                out.push(op);
            }
        }
    }

    let mut out = Vec::new();
    visit_region(ctx, region, &mut out);
    out
}
