//! `scf` dialect: structured control flow.
//!
//! `scf.for` and `scf.if` own their bodies as nested regions, and every
//! block of those regions is closed by an `scf.terminator` marker instead of
//! a branch. None of these ops produce results.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{Arity, OpShape};
use crate::refs::{RegionRef, ValueRef};
use crate::symbol::Symbol;

crate::define_op! {
    /// `scf.for %lb to %ub step %step`: counted loop whose body entry block
    /// takes the induction variable as its single argument.
    pub struct For = "scf"."for", OpShape {
        operands: Arity::Exact(3),
        regions: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `scf.if %cond`: then region plus an optional else region.
    pub struct If = "scf"."if", OpShape {
        operands: Arity::Exact(1),
        regions: Arity::Between(1, 2),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `scf.terminator`: closes a block of a structured region.
    pub struct Terminator = "scf"."terminator", OpShape::NULLARY;
}

pub fn r#for(
    ctx: &mut IrContext,
    location: Location,
    lower_bound: ValueRef,
    upper_bound: ValueRef,
    step: ValueRef,
    body: RegionRef,
) -> For {
    let data = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("for"))
        .operand(lower_bound)
        .operand(upper_bound)
        .operand(step)
        .region(body)
        .build(ctx);
    For(ctx.create_op(data))
}

pub fn r#if(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    then_region: RegionRef,
    else_region: Option<RegionRef>,
) -> If {
    let mut builder = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("if"))
        .operand(cond)
        .region(then_region);
    if let Some(region) = else_region {
        builder = builder.region(region);
    }
    let data = builder.build(ctx);
    If(ctx.create_op(data))
}

pub fn terminator(ctx: &mut IrContext, location: Location) -> Terminator {
    let data = OperationDataBuilder::new(location, Symbol::new("scf"), Symbol::new("terminator"))
        .build(ctx);
    Terminator(ctx.create_op(data))
}

impl For {
    pub fn lower_bound(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn upper_bound(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn step(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[2]
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    /// First argument of the body's entry block.
    pub fn induction_var(self, ctx: &IrContext) -> Option<ValueRef> {
        let entry = ctx.region_entry(self.body(ctx))?;
        ctx.block_args(entry).first().copied()
    }
}

impl If {
    pub fn cond(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn then_region(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn else_region(self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op(self.0).regions.get(1).copied()
    }

    /// Else region if it exists and holds at least one block.
    pub fn non_empty_else(self, ctx: &IrContext) -> Option<RegionRef> {
        self.else_region(ctx)
            .filter(|&r| !ctx.region(r).blocks.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BlockData, RegionData};
    use crate::dialect::arith;
    use crate::location::Span;
    use crate::ops::{ConversionError, DialectOp};
    use smallvec::smallvec;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("file:///scf.st".to_owned());
        (ctx, Location::new(path, Span::new(0, 0)))
    }

    fn body_with_iv(ctx: &mut IrContext, loc: Location) -> RegionRef {
        let i64_ty = ctx.types.core("i64");
        let block = ctx.create_block(BlockData::new(loc, [i64_ty]));
        let term = terminator(ctx, loc);
        ctx.push_op(block, term.op_ref());
        ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![block],
            parent_op: None,
        })
    }

    #[test]
    fn for_accessors_follow_operand_order() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let lb = arith::r#const(&mut ctx, loc, i64_ty, 0).result(&ctx);
        let ub = arith::r#const(&mut ctx, loc, i64_ty, 10).result(&ctx);
        let step = arith::r#const(&mut ctx, loc, i64_ty, 1).result(&ctx);
        let body = body_with_iv(&mut ctx, loc);

        let for_op = r#for(&mut ctx, loc, lb, ub, step, body);
        let again = For::from_op(&ctx, for_op.op_ref()).expect("should match scf.for");

        assert_eq!(again, for_op);
        assert_eq!(for_op.lower_bound(&ctx), lb);
        assert_eq!(for_op.upper_bound(&ctx), ub);
        assert_eq!(for_op.step(&ctx), step);
        assert_eq!(for_op.body(&ctx), body);
        let entry = ctx.region_entry(body).unwrap();
        assert_eq!(for_op.induction_var(&ctx), Some(ctx.block_arg(entry, 0)));
        assert_eq!(ctx.region(body).parent_op, Some(for_op.op_ref()));
    }

    #[test]
    fn if_without_else_has_no_else_region() {
        let (mut ctx, loc) = test_ctx();
        let i1 = ctx.types.core("i1");
        let cond = arith::r#const(&mut ctx, loc, i1, 1).result(&ctx);
        let then_region = body_with_iv(&mut ctx, loc);
        let empty = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![],
            parent_op: None,
        });

        let bare = r#if(&mut ctx, loc, cond, then_region, None);
        assert_eq!(bare.else_region(&ctx), None);

        let then_region = body_with_iv(&mut ctx, loc);
        let with_empty = r#if(&mut ctx, loc, cond, then_region, Some(empty));
        assert_eq!(with_empty.else_region(&ctx), Some(empty));
        assert_eq!(with_empty.non_empty_else(&ctx), None);
    }

    #[test]
    fn from_op_rejects_wrong_operation() {
        let (mut ctx, loc) = test_ctx();
        let term = terminator(&mut ctx, loc);
        let err = For::from_op(&ctx, term.op_ref()).unwrap_err();
        assert_eq!(
            err,
            ConversionError::WrongOperation {
                expected: "scf.for",
                actual: "scf.terminator".to_owned(),
            }
        );
        assert!(Terminator::matches(&ctx, term.op_ref()));
    }

    #[test]
    fn from_op_rejects_malformed_for() {
        let (mut ctx, loc) = test_ctx();
        let i64_ty = ctx.types.core("i64");
        let lb = arith::r#const(&mut ctx, loc, i64_ty, 0).result(&ctx);
        let body = body_with_iv(&mut ctx, loc);
        let data = OperationDataBuilder::new(loc, Symbol::new("scf"), Symbol::new("for"))
            .operand(lb)
            .region(body)
            .build(&mut ctx);
        let op = ctx.create_op(data);

        assert!(For::matches(&ctx, op));
        let err = For::from_op(&ctx, op).unwrap_err();
        assert_eq!(err.to_string(), "`scf.for` expects 3 operand(s), found 1");
    }
}
