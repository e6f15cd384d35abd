//! Strata: structured-to-CFG lowering over an arena SSA IR.
//!
//! The IR lives in [`strata_ir`] and the lowering itself in
//! [`strata_passes`]. This crate ties them together in a caller-held
//! [`Pipeline`] of [`Pass`]es.

pub mod passes;
pub mod pipeline;

pub use passes::{ControlFlowToCfg, VerifyCfg};
pub use pipeline::{Pass, PassError, Pipeline, PipelineError, PipelineOptions, lowering_pipeline};

pub use strata_ir as ir;
pub use strata_passes::{LowerModuleError, LoweringError, LoweringStats, ModuleStats};
