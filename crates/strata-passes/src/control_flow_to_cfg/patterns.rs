//! Per-construct lowerings.
//!
//! Every construct goes through two steps. `prepare` reads the IR only: it
//! resolves operands and checks region shape, producing a plan or an error.
//! `apply` performs the block surgery for a prepared plan and cannot fail.
//!
//! ## scf.for
//! ```text
//! ^init:
//!   scf.for %lb, %ub, %step {
//!   ^body(%iv: i64):
//!     ...
//!     scf.terminator
//!   }
//!   rest...
//! ```
//! becomes:
//! ```text
//! ^init:
//!   cf.br %lb [^cond]
//! ^cond(%iv: i64):
//!   %c = arith.cmpi %iv, %ub {predicate = @slt} : core.i1
//!   cf.cond_br %c [^first_body, ^end]
//! ^first_body:
//!   ...
//!   %next = arith.addi %iv, %step
//!   cf.br %next [^cond]
//! ^end:
//!   rest...
//! ```
//!
//! ## scf.if
//! ```text
//! ^bb:
//!   scf.if %c { then... } { else... }
//!   rest...
//! ```
//! becomes:
//! ```text
//! ^bb:
//!   cf.cond_br %c [^then, ^else]
//! ^then:
//!   then...
//!   cf.br [^continue]
//! ^else:
//!   else...
//!   cf.br [^continue]
//! ^continue:
//!   rest...
//! ```
//! Without a non-empty else region the false edge goes straight to `^continue`.

use strata_ir::dialect::{arith, cf, is_block_terminator, scf};
use strata_ir::rewrite::{erase_op, inline_region_before, split_block, split_block_before};
use strata_ir::{
    BlockRef, ConversionError, DialectOp, IrContext, Location, OpRef, RegionRef, ValueRef,
};

use super::errors::LoweringError;

/// The closed set of operations this pass rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Construct {
    Loop(OpRef),
    Conditional(OpRef),
    Terminator(OpRef),
    Other,
}

impl Construct {
    /// Classify by operation name only; shape problems surface in `prepare`.
    pub(crate) fn classify(ctx: &IrContext, op: OpRef) -> Self {
        if scf::For::matches(ctx, op) {
            Construct::Loop(op)
        } else if scf::If::matches(ctx, op) {
            Construct::Conditional(op)
        } else if scf::Terminator::matches(ctx, op) {
            Construct::Terminator(op)
        } else {
            Construct::Other
        }
    }

    /// Validate the construct and capture everything its rewrite needs.
    ///
    /// Returns `Ok(None)` for `Other`.
    pub(crate) fn prepare(self, ctx: &IrContext) -> Result<Option<Plan>, LoweringError> {
        Ok(Some(match self {
            Construct::Loop(op) => Plan::Loop(LoopPlan::prepare(ctx, op)?),
            Construct::Conditional(op) => Plan::Conditional(ConditionalPlan::prepare(ctx, op)?),
            Construct::Terminator(op) => {
                typed::<scf::Terminator>(ctx, op, &[])?;
                Plan::Terminator(op)
            }
            Construct::Other => return Ok(None),
        }))
    }
}

/// A validated rewrite, ready to apply.
#[derive(Clone, Debug)]
pub(crate) enum Plan {
    Loop(LoopPlan),
    Conditional(ConditionalPlan),
    Terminator(OpRef),
}

impl Plan {
    pub(crate) fn op(&self) -> OpRef {
        match self {
            Plan::Loop(plan) => plan.op,
            Plan::Conditional(plan) => plan.op,
            Plan::Terminator(op) => *op,
        }
    }

    pub(crate) fn apply(self, ctx: &mut IrContext) {
        match self {
            Plan::Loop(plan) => plan.apply(ctx),
            Plan::Conditional(plan) => plan.apply(ctx),
            Plan::Terminator(op) => {
                tracing::trace!(%op, "erasing scf.terminator");
                erase_op(ctx, op);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct LoopPlan {
    op: OpRef,
    location: Location,
    lower_bound: ValueRef,
    upper_bound: ValueRef,
    step: ValueRef,
    body: RegionRef,
}

impl LoopPlan {
    fn prepare(ctx: &IrContext, op: OpRef) -> Result<Self, LoweringError> {
        check_attached(ctx, op)?;
        let for_op = typed::<scf::For>(ctx, op, &["lower_bound", "upper_bound", "step"])?;
        let lower_bound = live(ctx, op, for_op.lower_bound(ctx), "lower_bound")?;
        let upper_bound = live(ctx, op, for_op.upper_bound(ctx), "upper_bound")?;
        let step = live(ctx, op, for_op.step(ctx), "step")?;

        let body = for_op.body(ctx);
        let Some(entry) = ctx.region_entry(body) else {
            return Err(LoweringError::structural(op, "scf.for body has no blocks"));
        };
        let args = ctx.block_args(entry).len();
        if args != 1 {
            return Err(LoweringError::structural(
                op,
                format!(
                    "scf.for body entry must take the induction variable as its only argument, found {args} argument(s)"
                ),
            ));
        }
        check_open_exit(ctx, op, body)?;

        Ok(LoopPlan {
            op,
            location: ctx.op(op).location,
            lower_bound,
            upper_bound,
            step,
            body,
        })
    }

    fn apply(self, ctx: &mut IrContext) {
        let LoopPlan {
            op,
            location,
            lower_bound,
            upper_bound,
            step,
            body,
        } = self;

        let init_block = current_block(ctx, op);
        let end_block = split_block_before(ctx, init_block, op);

        let Some(cond_block) = ctx.region_entry(body) else {
            panic!("scf.for {op}: body emptied after planning");
        };
        let iv = ctx.block_arg(cond_block, 0);
        let first_body = split_block(ctx, cond_block, 0);
        let Some(last_body) = ctx.region_exit(body) else {
            panic!("scf.for {op}: body emptied after planning");
        };

        let next = arith::addi(ctx, location, iv, step);
        ctx.push_op(last_body, next.op_ref());
        let next = next.result(ctx);
        let back_edge = cf::br(ctx, location, [next], cond_block);
        ctx.push_op(last_body, back_edge.op_ref());

        inline_region_before(ctx, body, end_block);

        let enter = cf::br(ctx, location, [lower_bound], cond_block);
        ctx.push_op(init_block, enter.op_ref());

        let in_range = arith::cmpi(ctx, location, arith::CmpPredicate::Slt, iv, upper_bound);
        ctx.push_op(cond_block, in_range.op_ref());
        let in_range = in_range.result(ctx);
        let branch = cf::cond_br(ctx, location, in_range, first_body, end_block);
        ctx.push_op(cond_block, branch.op_ref());

        erase_op(ctx, op);

        tracing::trace!(
            %op,
            %init_block,
            %cond_block,
            %first_body,
            %last_body,
            %end_block,
            "lowered scf.for"
        );
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ConditionalPlan {
    op: OpRef,
    location: Location,
    condition: ValueRef,
    then_region: RegionRef,
    else_region: Option<RegionRef>,
}

impl ConditionalPlan {
    fn prepare(ctx: &IrContext, op: OpRef) -> Result<Self, LoweringError> {
        check_attached(ctx, op)?;
        let if_op = typed::<scf::If>(ctx, op, &["condition"])?;
        let condition = live(ctx, op, if_op.cond(ctx), "condition")?;

        let then_region = if_op.then_region(ctx);
        if ctx.region(then_region).blocks.is_empty() {
            return Err(LoweringError::structural(op, "scf.if then region has no blocks"));
        }
        check_branch_target(ctx, op, then_region, "then")?;

        let else_region = if_op.non_empty_else(ctx);
        if let Some(region) = else_region {
            check_branch_target(ctx, op, region, "else")?;
        }

        Ok(ConditionalPlan {
            op,
            location: ctx.op(op).location,
            condition,
            then_region,
            else_region,
        })
    }

    fn apply(self, ctx: &mut IrContext) {
        let ConditionalPlan {
            op,
            location,
            condition,
            then_region,
            else_region,
        } = self;

        let cond_block = current_block(ctx, op);
        let continue_block = split_block_before(ctx, cond_block, op);

        let then_block = inline_branching_to(ctx, op, location, then_region, continue_block);
        let else_block = match else_region {
            Some(region) => inline_branching_to(ctx, op, location, region, continue_block),
            None => continue_block,
        };

        let branch = cf::cond_br(ctx, location, condition, then_block, else_block);
        ctx.push_op(cond_block, branch.op_ref());

        erase_op(ctx, op);

        tracing::trace!(
            %op,
            %cond_block,
            %then_block,
            %else_block,
            %continue_block,
            "lowered scf.if"
        );
    }
}

/// Close `region`'s exit block with a branch to `continue_block`, move the
/// region's blocks in front of `continue_block` and return its entry.
fn inline_branching_to(
    ctx: &mut IrContext,
    op: OpRef,
    location: Location,
    region: RegionRef,
    continue_block: BlockRef,
) -> BlockRef {
    let (Some(entry), Some(exit)) = (ctx.region_entry(region), ctx.region_exit(region)) else {
        panic!("scf.if {op}: region {region} emptied after planning");
    };
    let br = cf::br(ctx, location, [], continue_block);
    ctx.push_op(exit, br.op_ref());
    inline_region_before(ctx, region, continue_block);
    entry
}

// ============================================================================
// Checks
// ============================================================================

fn current_block(ctx: &IrContext, op: OpRef) -> BlockRef {
    match ctx.op(op).parent_block {
        Some(block) => block,
        None => panic!("{op} was detached after planning"),
    }
}

fn check_attached(ctx: &IrContext, op: OpRef) -> Result<(), LoweringError> {
    let attached = ctx
        .op(op)
        .parent_block
        .is_some_and(|b| ctx.block(b).parent_region.is_some());
    if attached {
        Ok(())
    } else {
        Err(LoweringError::structural(
            op,
            format!("{} is not inside a block of a region", ctx.op(op).full_name()),
        ))
    }
}

/// Shape-check `op` through its typed wrapper.
///
/// `operands` names the expected operands in order; a missing one is
/// reported as unresolved, every other shape mismatch as structural.
fn typed<T: DialectOp>(
    ctx: &IrContext,
    op: OpRef,
    operands: &[&'static str],
) -> Result<T, LoweringError> {
    T::from_op(ctx, op).map_err(|err| match err {
        ConversionError::WrongOperandCount { actual, .. } if actual < operands.len() => {
            LoweringError::OperandResolution {
                op,
                operand: operands[actual],
            }
        }
        other => LoweringError::structural(op, other),
    })
}

fn live(
    ctx: &IrContext,
    op: OpRef,
    value: ValueRef,
    operand: &'static str,
) -> Result<ValueRef, LoweringError> {
    if ctx.is_value_live(value) {
        Ok(value)
    } else {
        Err(LoweringError::OperandResolution { op, operand })
    }
}

/// An `scf.if` region is entered by an argument-less `cf.cond_br` edge: its
/// entry block takes no arguments and its exit block is still open.
fn check_branch_target(
    ctx: &IrContext,
    op: OpRef,
    region: RegionRef,
    which: &str,
) -> Result<(), LoweringError> {
    let Some(entry) = ctx.region_entry(region) else {
        return Ok(());
    };
    let args = ctx.block_args(entry).len();
    if args != 0 {
        return Err(LoweringError::structural(
            op,
            format!("scf.if {which} entry block must not take arguments, found {args}"),
        ));
    }
    check_open_exit(ctx, op, region)
}

/// The exit block of `region` must still be open: once `scf.terminator`
/// markers are gone, its last op must not already branch away.
fn check_open_exit(ctx: &IrContext, op: OpRef, region: RegionRef) -> Result<(), LoweringError> {
    let Some(exit) = ctx.region_exit(region) else {
        return Ok(());
    };
    let closing = ctx
        .block(exit)
        .ops
        .iter()
        .rev()
        .copied()
        .find(|&o| !scf::Terminator::matches(ctx, o));
    match closing {
        Some(last) if is_block_terminator(ctx, last) => Err(LoweringError::structural(
            op,
            format!(
                "exit block {exit} of {region} already ends in {}",
                ctx.op(last).full_name()
            ),
        )),
        _ => Ok(()),
    }
}
