//! Dialect definitions.
//!
//! Only the closed set of operations the control-flow lowering reads or
//! produces lives here: `core.module`, `func`, a small integer `arith`
//! subset, `cf` branches and the structured `scf` constructs.

pub mod arith;
pub mod cf;
pub mod core;
pub mod func;
pub mod scf;

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::types::Attribute;

crate::symbols! {
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
    ATTR_VALUE => "value",
    ATTR_PREDICATE => "predicate",
}

/// Look up an attribute on an operation by key.
pub(crate) fn attr(ctx: &IrContext, op: OpRef, key: crate::Symbol) -> Option<&Attribute> {
    ctx.op(op).attributes.get(&key)
}

/// Whether `op` ends a block in CFG form.
pub fn is_block_terminator(ctx: &IrContext, op: OpRef) -> bool {
    let data = ctx.op(op);
    data.is("cf", "br") || data.is("cf", "cond_br") || data.is("func", "return")
}
