//! Error types for structured control-flow lowering.

use derive_more::{Display, Error};
use strata_ir::rewrite::IllegalOp;
use strata_ir::{OpRef, Symbol};

/// Why one function could not be lowered.
///
/// Operand and structure errors are detected before any rewrite touches the
/// function, so the function is unchanged when one is returned.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum LoweringError {
    /// A bound, step or condition operand is missing or refers to a value
    /// whose producer is no longer part of the IR.
    #[display("{op}: operand `{operand}` does not resolve to a live value")]
    OperandResolution { op: OpRef, operand: &'static str },

    /// A construct's regions do not have the single-entry/single-exit shape
    /// the lowering relies on.
    #[display("{op}: {reason}")]
    StructuralPrecondition { op: OpRef, reason: String },

    #[display("{} structured operation(s) remain after lowering", ops.len())]
    IllegalOpsRemain { ops: Vec<IllegalOp> },
}

impl LoweringError {
    pub(crate) fn structural(op: OpRef, reason: impl std::fmt::Display) -> Self {
        LoweringError::StructuralPrecondition {
            op,
            reason: reason.to_string(),
        }
    }
}

/// A function of the module failed to lower; later functions were not visited.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("failed to lower control flow in @{function}: {source}")]
pub struct LowerModuleError {
    pub function: Symbol,
    pub source: LoweringError,
}
