//! The IR arena.
//!
//! Every op, value, block and region lives in an [`IrContext`] and is named by
//! a `u32` handle. Operand lists and result types share two list pools, and
//! each value keeps the list of operand slots that read it.

use std::collections::BTreeMap;
use std::fmt;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::Location;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

// ============================================================================
// Use-chain
// ============================================================================

/// Operand slot `operand_index` of `user` reads the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

/// Producer of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueDef {
    OpResult(OpRef, u32),
    BlockArg(BlockRef, u32),
}

impl fmt::Display for ValueDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueDef::OpResult(op, idx) => write!(f, "{}#{}", op, idx),
            ValueDef::BlockArg(block, idx) => write!(f, "{}#{}", block, idx),
        }
    }
}

// ============================================================================
// Entity data types
// ============================================================================

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 4]>,
    pub successors: SmallVec<[BlockRef; 4]>,
    pub parent_block: Option<BlockRef>,
}

impl OperationData {
    /// `dialect.name`, for diagnostics.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.dialect, self.name)
    }

    pub fn is(&self, dialect: &str, name: &str) -> bool {
        self.dialect == dialect && self.name == name
    }
}

pub struct BlockData {
    pub location: Location,
    /// Argument types; the values themselves come from [`IrContext::block_args`].
    pub args: Vec<TypeRef>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

impl BlockData {
    /// An empty, detached block with the given argument types.
    pub fn new(location: Location, arg_types: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            location,
            args: arg_types.into_iter().collect(),
            ops: SmallVec::new(),
            parent_region: None,
        }
    }
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 4]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Owner of all IR entities.
///
/// `create_op` and `remove_op` keep the per-value use lists in step with
/// operand lists. Parent links are set by `create_*`, `push_op` and
/// `detach_op`; the `*_mut` accessors bypass them.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueDef>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    pub types: TypeInterner,
    pub paths: PathInterner,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
    /// Operations destroyed by `remove_op`.
    removed: SecondaryMap<OpRef, bool>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
            removed: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Allocate a detached op, its result values and one use per operand.
    /// The op takes ownership of `data.regions`.
    ///
    /// # Panics
    ///
    /// If `data.parent_block` is set or a region already has an owner.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: new operations start detached; attach with push_op",
        );

        let operand_slice: SmallVec<[ValueRef; 8]> =
            data.operands.as_slice(&self.value_pool).into();
        let result_count = data.results.len(&self.type_pool);
        let regions: SmallVec<[RegionRef; 4]> = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!("create_op: region {r} is owned by {existing}, cannot give it to {op}");
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operand_slice.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut result_value_list = EntityList::new();
        for idx in 0..result_count {
            let v = self.values.push(ValueDef::OpResult(op, idx as u32));
            result_value_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_value_list;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Raw access. Editing `operands` here leaves the use lists stale.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    /// Whether `remove_op` has destroyed this operation.
    pub fn is_removed(&self, op: OpRef) -> bool {
        self.removed[op]
    }

    /// Drop a detached op's operand uses and mark it removed.
    ///
    /// # Panics
    ///
    /// If the op is still in a block or one of its results is still read.
    pub fn remove_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            panic!("remove_op: {op} is still in {block}; detach it first");
        }

        let results: SmallVec<[ValueRef; 4]> =
            self.result_values[op].as_slice(&self.value_pool).into();
        for &val in &results {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result {val} still has {} use(s)",
                self.uses[val].len()
            );
        }

        let operands: SmallVec<[ValueRef; 8]> =
            self.ops[op].operands.as_slice(&self.value_pool).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
        self.removed[op] = true;
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v]
    }

    /// Whether the producer is still in the tree: a result of an op that sits
    /// in a block, or an argument of a block that sits in a region.
    pub fn is_value_live(&self, v: ValueRef) -> bool {
        match self.values[v] {
            ValueDef::OpResult(op, _) => !self.removed[op] && self.ops[op].parent_block.is_some(),
            ValueDef::BlockArg(block, _) => self.blocks[block].parent_region.is_some(),
        }
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Allocate a block and one value per argument type. Ops listed in
    /// `data.ops` are adopted.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_count = data.args.len();
        let ops: SmallVec<[OpRef; 4]> = data.ops.clone();
        let block = self.blocks.push(data);

        for op in ops {
            if let Some(existing) = self.ops[op].parent_block {
                panic!("create_block: {op} is already in {existing}");
            }
            self.ops[op].parent_block = Some(block);
        }

        let mut arg_value_list = EntityList::new();
        for idx in 0..arg_count {
            let v = self.values.push(ValueDef::BlockArg(block, idx as u32));
            arg_value_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_value_list;

        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    /// Raw access for block surgery. The caller keeps parent links straight.
    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Last operation of a block, if any.
    pub fn block_terminator(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b].ops.last().copied()
    }

    /// # Panics
    ///
    /// If `op` is already in a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!("push_op: {op} is already in {existing}; detach it first");
        }
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Take `op` out of its block, if any. The op and its uses survive.
    pub fn detach_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block.take() {
            self.blocks[block].ops.retain(|o| *o != op);
        }
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// # Panics
    ///
    /// If a listed block already belongs to a region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let region = self.regions.push(data);

        let blocks: SmallVec<[BlockRef; 4]> = self.regions[region].blocks.clone();
        for &b in &blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!("create_region: block {b} already belongs to region {existing}");
            }
            self.blocks[b].parent_region = Some(region);
        }

        region
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    pub fn region_mut(&mut self, r: RegionRef) -> &mut RegionData {
        &mut self.regions[r]
    }

    /// Entry (first) block of a region.
    pub fn region_entry(&self, r: RegionRef) -> Option<BlockRef> {
        self.regions[r].blocks.first().copied()
    }

    /// Exit (last) block of a region.
    pub fn region_exit(&self, r: RegionRef) -> Option<BlockRef> {
        self.regions[r].blocks.last().copied()
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationDataBuilder
// ============================================================================

/// Collects an op's parts; `build` moves operands and result types into the
/// context's pools.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 4]>,
    successors: SmallVec<[BlockRef; 4]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
            successors: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn successor(mut self, b: BlockRef) -> Self {
        self.successors.push(b);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            successors: self.successors,
            parent_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;
    use smallvec::smallvec;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("file:///context.st".to_owned());
        (ctx, Location::new(path, Span::new(0, 0)))
    }

    fn konst(ctx: &mut IrContext, loc: Location, ty: TypeRef, value: i64) -> OpRef {
        let data = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(ty)
            .attr("value", Attribute::from(value))
            .build(ctx);
        ctx.create_op(data)
    }

    #[test]
    fn use_chain_follows_operands() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let c = konst(&mut ctx, loc, i64_ty, 1);
        let v = ctx.op_result(c, 0);
        assert!(ctx.uses(v).is_empty());

        let data = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("addi"))
            .operand(v)
            .operand(v)
            .result(i64_ty)
            .build(&mut ctx);
        let add = ctx.create_op(data);

        assert_eq!(
            ctx.uses(v),
            &[
                Use { user: add, operand_index: 0 },
                Use { user: add, operand_index: 1 }
            ]
        );
        assert_eq!(ctx.value_def(ctx.op_result(add, 0)), ValueDef::OpResult(add, 0));
    }

    #[test]
    fn liveness_tracks_attachment() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let block = ctx.create_block(BlockData::new(loc, [i64_ty]));
        let arg = ctx.block_arg(block, 0);
        let c = konst(&mut ctx, loc, i64_ty, 7);
        let v = ctx.op_result(c, 0);

        assert!(!ctx.is_value_live(arg), "block is not in a region yet");
        assert!(!ctx.is_value_live(v), "op is not in a block yet");

        ctx.push_op(block, c);
        ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        });
        assert!(ctx.is_value_live(arg));
        assert!(ctx.is_value_live(v));

        ctx.detach_op(c);
        ctx.remove_op(c);
        assert!(ctx.is_removed(c));
        assert!(!ctx.is_value_live(v));
    }

    #[test]
    fn detach_op_clears_parent_link() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let block = ctx.create_block(BlockData::new(loc, []));
        let a = konst(&mut ctx, loc, i64_ty, 1);
        let b = konst(&mut ctx, loc, i64_ty, 2);
        ctx.push_op(block, a);
        ctx.push_op(block, b);

        ctx.detach_op(a);
        assert_eq!(ctx.block(block).ops.as_slice(), &[b]);
        assert_eq!(ctx.op(a).parent_block, None);
        assert_eq!(ctx.block_terminator(block), Some(b));

        ctx.push_op(block, a);
        assert_eq!(ctx.block(block).ops.as_slice(), &[b, a]);
    }

    #[test]
    fn remove_op_releases_operand_uses() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let block = ctx.create_block(BlockData::new(loc, [i64_ty, i64_ty]));
        let (x, y) = (ctx.block_arg(block, 0), ctx.block_arg(block, 1));
        assert_eq!(ctx.value_def(y), ValueDef::BlockArg(block, 1));

        let data = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("addi"))
            .operands([x, y])
            .result(i64_ty)
            .build(&mut ctx);
        let add = ctx.create_op(data);
        assert_eq!(ctx.uses(y).len(), 1);

        ctx.remove_op(add);
        assert!(ctx.uses(x).is_empty());
        assert!(ctx.uses(y).is_empty());
        assert_eq!(ctx.op_operands(add), &[x, y], "operand list is kept for diagnostics");
    }

    #[test]
    fn region_entry_and_exit() {
        let (mut ctx, loc) = test_ctx();
        let b0 = ctx.create_block(BlockData::new(loc, []));
        let b1 = ctx.create_block(BlockData::new(loc, []));
        let region = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![b0, b1],
            parent_op: None,
        });
        assert_eq!(ctx.region_entry(region), Some(b0));
        assert_eq!(ctx.region_exit(region), Some(b1));
        assert_eq!(ctx.block(b1).parent_region, Some(region));
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn remove_op_panics_when_result_has_uses() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let c = konst(&mut ctx, loc, i64_ty, 1);
        let v = ctx.op_result(c, 0);
        let data = OperationDataBuilder::new(loc, Symbol::new("func"), Symbol::new("return"))
            .operand(v)
            .build(&mut ctx);
        let _ret = ctx.create_op(data);
        ctx.remove_op(c);
    }

    #[test]
    #[should_panic(expected = "already belongs to region")]
    fn create_region_panics_when_block_already_owned() {
        let (mut ctx, loc) = test_ctx();
        let block = ctx.create_block(BlockData::new(loc, []));
        let _r1 = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        });
        ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        });
    }
}
