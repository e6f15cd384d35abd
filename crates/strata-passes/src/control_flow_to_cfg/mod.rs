//! Lower structured control flow (`scf.for`, `scf.if`, `scf.terminator`)
//! to a flat CFG of `cf.br` / `cf.cond_br` blocks.
//!
//! A function is lowered in two phases:
//!
//! 1. Every structured op is collected innermost-first and turned into a
//!    plan. Operand resolution and region shape checks happen here, for all
//!    constructs, before anything is mutated.
//! 2. The plans are applied in the same order. Each rewrite erases its
//!    construct and splices the construct's blocks into the enclosing region,
//!    keeping that region single-entry/single-exit for the constructs
//!    around it.
//!
//! A failing construct therefore leaves its whole function untouched.

mod errors;
mod patterns;


use std::ops::AddAssign;

use strata_ir::dialect::core::Module;
use strata_ir::dialect::func;
use strata_ir::rewrite::ConversionTarget;
use strata_ir::walk::collect_post_order;
use strata_ir::{IrContext, OpRef};
use tracing::{debug, warn};

pub use errors::{LowerModuleError, LoweringError};

use patterns::{Construct, Plan};

/// Rewrites performed on one function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoweringStats {
    pub loops: usize,
    pub conditionals: usize,
    pub terminators: usize,
}

impl LoweringStats {
    pub fn is_empty(&self) -> bool {
        *self == LoweringStats::default()
    }

    fn record(&mut self, plan: &Plan) {
        match plan {
            Plan::Loop(_) => self.loops += 1,
            Plan::Conditional(_) => self.conditionals += 1,
            Plan::Terminator(_) => self.terminators += 1,
        }
    }
}

impl AddAssign for LoweringStats {
    fn add_assign(&mut self, rhs: Self) {
        self.loops += rhs.loops;
        self.conditionals += rhs.conditionals;
        self.terminators += rhs.terminators;
    }
}

/// Rewrites performed on a whole module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleStats {
    pub functions: usize,
    pub total: LoweringStats,
}

/// Legality after lowering: no `scf` operation may remain.
pub fn structured_control_flow_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target
        .add_illegal_op("scf", "for")
        .add_illegal_op("scf", "if")
        .add_illegal_op("scf", "terminator");
    target
}

/// Lower all structured control flow in `function`.
///
/// On error the function is unchanged, except for [`LoweringError::IllegalOpsRemain`]
/// which is only reported after all rewrites ran.
pub fn lower_function(
    ctx: &mut IrContext,
    function: func::Func,
) -> Result<LoweringStats, LoweringError> {
    let name = function.sym_name(ctx);
    let body = function.body(ctx);

    let plans = collect_post_order(ctx, body)
        .into_iter()
        .map(|op| Construct::classify(ctx, op).prepare(ctx))
        .filter_map(Result::transpose)
        .collect::<Result<Vec<Plan>, LoweringError>>()
        .inspect_err(|err| warn!(function = %name, %err, "structured control flow not lowered"))?;

    if plans.is_empty() {
        debug!(function = %name, "no structured control flow");
        return Ok(LoweringStats::default());
    }

    let mut stats = LoweringStats::default();
    for plan in plans {
        stats.record(&plan);
        tracing::trace!(function = %name, op = %plan.op(), "applying plan");
        plan.apply(ctx);
    }

    let illegal = structured_control_flow_target().verify(ctx, body);
    if !illegal.is_empty() {
        return Err(LoweringError::IllegalOpsRemain { ops: illegal });
    }

    debug!(
        function = %name,
        loops = stats.loops,
        conditionals = stats.conditionals,
        terminators = stats.terminators,
        "lowered structured control flow"
    );
    Ok(stats)
}

/// Lower every function of `module`, in module order.
///
/// Stops at the first function that fails. Functions before it stay lowered,
/// functions after it are not visited.
pub fn lower_module(ctx: &mut IrContext, module: Module) -> Result<ModuleStats, LowerModuleError> {
    let mut stats = ModuleStats::default();
    for function in module.functions(ctx) {
        let lowered = lower_function(ctx, function).map_err(|source| LowerModuleError {
            function: function.sym_name(ctx),
            source,
        })?;
        stats.functions += 1;
        stats.total += lowered;
    }
    debug!(
        module = ?module.name(ctx),
        functions = stats.functions,
        "lowered module"
    );
    Ok(stats)
}

/// Whether `op` is one of the structured constructs this pass removes.
pub fn is_structured(ctx: &IrContext, op: OpRef) -> bool {
    !matches!(Construct::classify(ctx, op), Construct::Other)
}
