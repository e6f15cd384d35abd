//! Control-flow graph queries over the blocks of one region.
//!
//! Edges come from the successor lists of each block's last operation. A
//! `cf.cond_br` whose two targets coincide contributes two edges.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::context::IrContext;
use crate::refs::{BlockRef, RegionRef};

/// Successor blocks of `block`, in branch order.
pub fn successors(ctx: &IrContext, block: BlockRef) -> SmallVec<[BlockRef; 2]> {
    ctx.block_terminator(block)
        .map(|op| ctx.op(op).successors.iter().copied().collect())
        .unwrap_or_default()
}

/// Map every block of `region` to its predecessors, one entry per edge.
///
/// Blocks without predecessors map to an empty list. Predecessors appear in
/// region order.
pub fn predecessors(ctx: &IrContext, region: RegionRef) -> BTreeMap<BlockRef, Vec<BlockRef>> {
    let blocks = &ctx.region(region).blocks;
    let mut preds: BTreeMap<BlockRef, Vec<BlockRef>> =
        blocks.iter().map(|&b| (b, Vec::new())).collect();
    for &block in blocks {
        for succ in successors(ctx, block) {
            preds.entry(succ).or_default().push(block);
        }
    }
    preds
}

/// Blocks other than the region's entry that no branch targets.
pub fn unreachable_blocks(ctx: &IrContext, region: RegionRef) -> Vec<BlockRef> {
    let entry = ctx.region_entry(region);
    let preds = predecessors(ctx, region);
    ctx.region(region)
        .blocks
        .iter()
        .copied()
        .filter(|&b| Some(b) != entry && preds.get(&b).is_none_or(|p| p.is_empty()))
        .collect()
}
