//! `arith` dialect: the integer constant, add and compare ops the loop
//! lowering emits.

use std::fmt;
use std::str::FromStr;

use super::{ATTR_PREDICATE, ATTR_VALUE, attr};
use crate::context::{IrContext, OperationDataBuilder, ValueDef};
use crate::location::Location;
use crate::ops::{Arity, OpShape};
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::define_op! {
    /// `arith.const`: materializes the integer in its `value` attribute.
    pub struct Const = "arith"."const", OpShape {
        results: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `arith.addi`: wrapping integer addition.
    pub struct AddI = "arith"."addi", OpShape {
        operands: Arity::Exact(2),
        results: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `arith.cmpi`: integer comparison producing `core.i1`.
    pub struct CmpI = "arith"."cmpi", OpShape {
        operands: Arity::Exact(2),
        results: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

/// Comparison predicate of `arith.cmpi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl CmpPredicate {
    pub const ALL: [CmpPredicate; 10] = [
        CmpPredicate::Eq,
        CmpPredicate::Ne,
        CmpPredicate::Slt,
        CmpPredicate::Sle,
        CmpPredicate::Sgt,
        CmpPredicate::Sge,
        CmpPredicate::Ult,
        CmpPredicate::Ule,
        CmpPredicate::Ugt,
        CmpPredicate::Uge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::Slt => "slt",
            CmpPredicate::Sle => "sle",
            CmpPredicate::Sgt => "sgt",
            CmpPredicate::Sge => "sge",
            CmpPredicate::Ult => "ult",
            CmpPredicate::Ule => "ule",
            CmpPredicate::Ugt => "ugt",
            CmpPredicate::Uge => "uge",
        }
    }

    /// Evaluate the predicate on two 64-bit operands.
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        let (ul, ur) = (lhs as u64, rhs as u64);
        match self {
            CmpPredicate::Eq => lhs == rhs,
            CmpPredicate::Ne => lhs != rhs,
            CmpPredicate::Slt => lhs < rhs,
            CmpPredicate::Sle => lhs <= rhs,
            CmpPredicate::Sgt => lhs > rhs,
            CmpPredicate::Sge => lhs >= rhs,
            CmpPredicate::Ult => ul < ur,
            CmpPredicate::Ule => ul <= ur,
            CmpPredicate::Ugt => ul > ur,
            CmpPredicate::Uge => ul >= ur,
        }
    }
}

impl fmt::Display for CmpPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CmpPredicate {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CmpPredicate::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(())
    }
}

pub fn r#const(ctx: &mut IrContext, location: Location, ty: TypeRef, value: i64) -> Const {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("const"))
        .attr(ATTR_VALUE(), Attribute::from(value))
        .result(ty)
        .build(ctx);
    Const(ctx.create_op(data))
}

/// `lhs + rhs`; the result has the type of `lhs`.
pub fn addi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> AddI {
    let ty = match ctx.value_def(lhs) {
        ValueDef::OpResult(op, idx) => ctx.op_result_types(op)[idx as usize],
        ValueDef::BlockArg(block, idx) => ctx.block(block).args[idx as usize],
    };
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("addi"))
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .build(ctx);
    AddI(ctx.create_op(data))
}

pub fn cmpi(
    ctx: &mut IrContext,
    location: Location,
    predicate: CmpPredicate,
    lhs: ValueRef,
    rhs: ValueRef,
) -> CmpI {
    let i1 = ctx.types.core("i1");
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("cmpi"))
        .attr(ATTR_PREDICATE(), Attribute::Symbol(Symbol::new(predicate.as_str())))
        .operand(lhs)
        .operand(rhs)
        .result(i1)
        .build(ctx);
    CmpI(ctx.create_op(data))
}

impl Const {
    /// The constant's value, if the attribute is an integer.
    pub fn value(self, ctx: &IrContext) -> Option<i64> {
        attr(ctx, self.0, ATTR_VALUE()).and_then(Attribute::as_i64)
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl AddI {
    pub fn lhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn rhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl CmpI {
    pub fn predicate(self, ctx: &IrContext) -> Option<CmpPredicate> {
        let sym = attr(ctx, self.0, ATTR_PREDICATE()).and_then(Attribute::as_symbol)?;
        sym.with_str(|s| s.parse().ok())
    }

    pub fn lhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn rhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}
