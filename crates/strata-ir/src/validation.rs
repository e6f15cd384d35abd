//! Value integrity, use-chain and CFG validation.
//!
//! Three kinds of checks:
//!
//! 1. **Scope validation**: every operand in a function references a value
//!    defined within that function's region tree.
//! 2. **Use-chain consistency**: the use-chain stored in `IrContext` exactly
//!    matches the operands of all attached operations.
//! 3. **CFG well-formedness**: a fully lowered function is a flat list of
//!    blocks, each closed by exactly one branch or return.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::context::{IrContext, ValueDef};
use crate::dialect::core::Module;
use crate::dialect::{cf, func, is_block_terminator};
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};
use crate::walk::{self, WalkAction};

// ============================================================================
// Error types
// ============================================================================

/// An operand referencing a value from outside its function.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(
    "stale value in @{function_name}: operand #{operand_index} of {consumer_op} references {stale_value_description}"
)]
pub struct StaleValueError {
    pub function_name: String,
    pub consumer_op: String,
    pub operand_index: usize,
    pub stale_value_description: String,
}

/// A use-chain entry without matching operand, or the reverse.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message}")]
pub struct UseChainError {
    pub message: String,
}

/// A block violating CFG form.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("@{function_name} {block}: {message}")]
pub struct CfgError {
    pub function_name: String,
    pub block: BlockRef,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    pub stale_errors: Vec<StaleValueError>,
    pub use_chain_errors: Vec<UseChainError>,
    pub cfg_errors: Vec<CfgError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.stale_errors.is_empty() && self.use_chain_errors.is_empty() && self.cfg_errors.is_empty()
    }

    fn merge(&mut self, other: ValidationResult) {
        self.stale_errors.extend(other.stale_errors);
        self.use_chain_errors.extend(other.use_chain_errors);
        self.cfg_errors.extend(other.cfg_errors);
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        if !self.stale_errors.is_empty() {
            writeln!(f, "{} stale value(s) found:", self.stale_errors.len())?;
            for err in &self.stale_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        if !self.use_chain_errors.is_empty() {
            writeln!(f, "{} use-chain error(s) found:", self.use_chain_errors.len())?;
            for err in &self.use_chain_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        if !self.cfg_errors.is_empty() {
            writeln!(f, "{} CFG error(s) found:", self.cfg_errors.len())?;
            for err in &self.cfg_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Scope validation
// ============================================================================

fn collect_defined_in_region(ctx: &IrContext, region: RegionRef, defined: &mut HashSet<ValueRef>) {
    for &block in &ctx.region(region).blocks {
        defined.extend(ctx.block_args(block).iter().copied());
        for &op in &ctx.block(block).ops {
            defined.extend(ctx.op_results(op).iter().copied());
            for &nested in &ctx.op(op).regions {
                collect_defined_in_region(ctx, nested, defined);
            }
        }
    }
}

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => format!("result #{idx} of {}", ctx.op(op).full_name()),
        ValueDef::BlockArg(block, idx) => format!("block arg #{idx} of {block}"),
    }
}

/// Check that every operand of every function in `module` is defined inside
/// that function.
pub fn validate_value_integrity(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut result = ValidationResult::default();

    for function in module.functions(ctx) {
        let fn_name = function.sym_name(ctx).to_string();
        let body = function.body(ctx);
        let mut defined = HashSet::new();
        collect_defined_in_region(ctx, body, &mut defined);

        let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
            for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
                if !defined.contains(&operand) {
                    result.stale_errors.push(StaleValueError {
                        function_name: fn_name.clone(),
                        consumer_op: ctx.op(op).full_name(),
                        operand_index: i,
                        stale_value_description: describe_value(ctx, operand),
                    });
                }
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
    }

    result
}

// ============================================================================
// Use-chain consistency validation
// ============================================================================

/// Validate that the use-chain stored in `IrContext` matches the actual operands.
///
/// Checks two directions:
/// 1. For every operand of every op, there must be a corresponding entry in `uses(operand)`.
/// 2. For every use of a value defined in the module, the user must be an
///    attached op in the module whose operand points back.
pub fn validate_use_chains(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut errors = Vec::new();
    let body = module.body(ctx);

    let mut attached: HashSet<OpRef> = HashSet::new();
    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
        attached.insert(op);
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
        }
        ControlFlow::Continue(WalkAction::Advance)
    });

    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(UseChainError {
                message: format!(
                    "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                    ctx.op(op).full_name(),
                ),
            });
        }
    }

    let mut defined = HashSet::new();
    collect_defined_in_region(ctx, body, &mut defined);
    let mut defined: Vec<ValueRef> = defined.into_iter().collect();
    defined.sort();

    for val in defined {
        for u in ctx.uses(val) {
            if !attached.contains(&u.user) {
                errors.push(UseChainError {
                    message: format!(
                        "use-chain of {val} lists {} which is not attached to the module",
                        u.user,
                    ),
                });
                continue;
            }
            if !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(UseChainError {
                    message: format!(
                        "use-chain of {val} lists operand #{} of {} ({}) which holds another value",
                        u.operand_index,
                        ctx.op(u.user).full_name(),
                        u.user,
                    ),
                });
            }
        }
    }

    ValidationResult {
        use_chain_errors: errors,
        ..ValidationResult::default()
    }
}

// ============================================================================
// CFG well-formedness
// ============================================================================

/// Check that a function body is in CFG form.
///
/// Every block is non-empty and ends in exactly one `cf.br`, `cf.cond_br` or
/// `func.return`; no other op is a terminator and no op owns a region.
/// Branch targets lie in the function body and branch arguments match the
/// destination's block arguments.
pub fn validate_cfg(ctx: &IrContext, function: func::Func) -> Vec<CfgError> {
    let function_name = function.sym_name(ctx).to_string();
    let body = function.body(ctx);
    let mut errors = Vec::new();
    let mut error = |block: BlockRef, message: String| {
        errors.push(CfgError {
            function_name: function_name.clone(),
            block,
            message,
        });
    };

    for &block in &ctx.region(body).blocks {
        let ops = &ctx.block(block).ops;
        let Some((&last, init)) = ops.split_last() else {
            error(block, "block is empty".to_owned());
            continue;
        };

        for &op in init {
            if is_block_terminator(ctx, op) {
                error(block, format!("{} is not the last op", ctx.op(op).full_name()));
            }
        }
        for &op in ops.iter() {
            if !ctx.op(op).regions.is_empty() {
                error(block, format!("{} still owns a region", ctx.op(op).full_name()));
            }
        }

        if !is_block_terminator(ctx, last) {
            error(
                block,
                format!("block ends in {} instead of a branch", ctx.op(last).full_name()),
            );
            continue;
        }

        for &succ in &ctx.op(last).successors {
            if ctx.block(succ).parent_region != Some(body) {
                error(block, format!("successor {succ} is outside the function body"));
            }
        }

        if let Ok(br) = cf::Br::from_op(ctx, last) {
            let dest = br.dest(ctx);
            let expected = ctx.block_args(dest).len();
            let actual = br.args(ctx).len();
            if expected != actual {
                error(
                    block,
                    format!("branch passes {actual} argument(s) to {dest} which takes {expected}"),
                );
            }
        } else if let Ok(cond_br) = cf::CondBr::from_op(ctx, last) {
            for dest in [cond_br.then_dest(ctx), cond_br.else_dest(ctx)] {
                if !ctx.block_args(dest).is_empty() {
                    error(block, format!("conditional branch target {dest} takes arguments"));
                }
            }
        } else if !func::Return::matches(ctx, last) {
            error(block, format!("malformed {}", ctx.op(last).full_name()));
        }
    }

    errors
}

/// CFG validation for every function in a module.
pub fn validate_cfg_module(ctx: &IrContext, module: Module) -> ValidationResult {
    ValidationResult {
        cfg_errors: module
            .functions(ctx)
            .into_iter()
            .flat_map(|f| validate_cfg(ctx, f))
            .collect(),
        ..ValidationResult::default()
    }
}

/// Scope and use-chain validation combined.
pub fn validate_all(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut result = validate_value_integrity(ctx, module);
    result.merge(validate_use_chains(ctx, module));
    result
}
