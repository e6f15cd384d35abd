//! In-place rewrite infrastructure: block surgery helpers and legality targets.

pub mod conversion_target;
pub mod helpers;

pub use conversion_target::{ConversionTarget, IllegalOp, LegalityCheck};
pub use helpers::{erase_op, inline_region_before, split_block, split_block_before};
