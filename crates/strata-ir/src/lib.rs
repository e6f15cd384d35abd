//! Strata IR: an arena-based, mutable SSA IR with explicit use-chains.
//!
//! Operations, values, blocks and regions live in an [`IrContext`] and are
//! addressed by `u32` handles that stay valid across every surgery step.
//! The [`rewrite::helpers`] module provides the block-level surgery
//! primitives (`split_block`, `inline_region_before`, `erase_op`) that
//! structural lowerings are written against.

pub mod cfg;
pub mod context;
pub mod dialect;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod rewrite;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use context::{
    BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use, ValueDef,
};
pub use location::{Location, Span};
pub use ops::{Arity, ConversionError, DialectOp, OpShape};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, PathInterner, TypeData, TypeDataBuilder, TypeInterner};
