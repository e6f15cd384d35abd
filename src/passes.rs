//! Pipeline adapters for the lowering and the CFG check.

use strata_ir::IrContext;
use strata_ir::dialect::core::Module;
use strata_ir::validation;
use strata_passes::lower_module;
use tracing::{debug, warn};

use crate::pipeline::{Pass, PassError};

/// Lowers `scf.for`, `scf.if` and `scf.terminator` in every function.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlFlowToCfg;

impl Pass for ControlFlowToCfg {
    fn name(&self) -> &'static str {
        "lower-to-cfg"
    }

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        let stats = lower_module(ctx, module)?;
        debug!(
            functions = stats.functions,
            loops = stats.total.loops,
            conditionals = stats.total.conditionals,
            terminators = stats.total.terminators,
            "control flow lowered"
        );
        Ok(())
    }
}

/// Fails unless every function is a flat CFG.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerifyCfg;

impl Pass for VerifyCfg {
    fn name(&self) -> &'static str {
        "verify-cfg"
    }

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
        let errors = validation::validate_cfg_module(ctx, module).cfg_errors;
        if errors.is_empty() {
            return Ok(());
        }
        for err in &errors {
            warn!(%err, "not in CFG form");
        }
        Err(PassError::InvalidCfg(errors))
    }
}
