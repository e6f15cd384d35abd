//! Block surgery primitives.
//!
//! These operate on `&mut IrContext` and keep every parent link and use-chain
//! consistent when they return. None of them create or drop values, so no
//! operand ever needs rewriting.

use smallvec::SmallVec;

use crate::context::{BlockData, IrContext};
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Split `block` at op index `position`, moving ops `[position..]` into a
/// new block.
///
/// The new block takes the location of `block`, has no arguments and is
/// inserted into the same region immediately after `block`. `position` may
/// equal the op count, producing an empty successor block.
///
/// # Panics
///
/// Panics if `position` is past the end of the block, or if `block` does not
/// belong to a region.
pub fn split_block(ctx: &mut IrContext, block: BlockRef, position: usize) -> BlockRef {
    let len = ctx.block(block).ops.len();
    assert!(
        position <= len,
        "split_block: position {position} out of bounds for {block} with {len} op(s)"
    );
    let Some(region) = ctx.block(block).parent_region else {
        panic!("split_block: {block} must belong to a region");
    };

    let tail_ops: SmallVec<[OpRef; 4]> = ctx.block(block).ops[position..].into();
    ctx.block_mut(block).ops.truncate(position);

    let loc = ctx.block(block).location;
    let new_block = ctx.create_block(BlockData::new(loc, []));
    for &op in &tail_ops {
        ctx.op_mut(op).parent_block = Some(new_block);
    }
    ctx.block_mut(new_block).ops = tail_ops;

    let Some(block_pos) = ctx.region(region).blocks.iter().position(|&b| b == block) else {
        panic!("split_block: {block} not found in its parent {region}");
    };
    ctx.region_mut(region).blocks.insert(block_pos + 1, new_block);
    ctx.block_mut(new_block).parent_region = Some(region);

    tracing::trace!(%block, %new_block, position, "split block");
    new_block
}

/// Split `block` right before `op`; `op` and everything after it move to the
/// new block.
///
/// # Panics
///
/// Panics if `op` is not in `block`.
pub fn split_block_before(ctx: &mut IrContext, block: BlockRef, op: OpRef) -> BlockRef {
    let Some(position) = ctx.block(block).ops.iter().position(|&o| o == op) else {
        panic!("split_block_before: {op} not found in {block}");
    };
    split_block(ctx, block, position)
}

/// Move every block of `region`, in order, into the region of `target`
/// immediately before `target`. Leaves `region` empty and returns the moved
/// blocks.
///
/// Block arguments and the values defined inside the blocks are untouched.
/// Inlining a region into itself is a no-op.
///
/// # Panics
///
/// Panics if `target` does not belong to a region.
pub fn inline_region_before(
    ctx: &mut IrContext,
    region: RegionRef,
    target: BlockRef,
) -> Vec<BlockRef> {
    let Some(dest) = ctx.block(target).parent_region else {
        panic!("inline_region_before: target {target} must belong to a region");
    };
    if dest == region {
        return Vec::new();
    }

    let moved: SmallVec<[BlockRef; 4]> = std::mem::take(&mut ctx.region_mut(region).blocks);
    for &b in &moved {
        ctx.block_mut(b).parent_region = Some(dest);
    }

    let Some(pos) = ctx.region(dest).blocks.iter().position(|&b| b == target) else {
        panic!("inline_region_before: {target} not found in its parent {dest}");
    };
    let dest_blocks = &mut ctx.region_mut(dest).blocks;
    for (i, &b) in moved.iter().enumerate() {
        dest_blocks.insert(pos + i, b);
    }

    tracing::trace!(%region, %dest, count = moved.len(), "inlined region");
    moved.into_vec()
}

/// Erase an operation: detach from its parent block and remove it.
///
/// All result values must have no remaining uses, otherwise this panics.
pub fn erase_op(ctx: &mut IrContext, op: OpRef) {
    ctx.detach_op(op);
    ctx.remove_op(op);
}
