//! Typed operation wrappers.
//!
//! Every dialect operation gets a `Copy` wrapper around its `OpRef` that
//! implements [`DialectOp`]. `from_op` checks both the operation name and
//! its shape (operand, result, region and successor counts), so accessors on
//! a successfully converted wrapper can index without further checks.

use std::fmt;

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when converting an `OpRef` to a dialect-specific wrapper.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Operation name doesn't match expected dialect.operation.
    #[display("expected `{expected}`, found `{actual}`")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    #[display("missing attribute `{name}`")]
    MissingAttribute { name: &'static str },
    #[display("attribute `{name}` has the wrong kind")]
    WrongAttributeType { name: &'static str },
    #[display("`{op}` expects {expected} operand(s), found {actual}")]
    WrongOperandCount {
        op: &'static str,
        expected: Arity,
        actual: usize,
    },
    #[display("`{op}` expects {expected} result(s), found {actual}")]
    WrongResultCount {
        op: &'static str,
        expected: Arity,
        actual: usize,
    },
    #[display("`{op}` expects {expected} region(s), found {actual}")]
    WrongRegionCount {
        op: &'static str,
        expected: Arity,
        actual: usize,
    },
    #[display("`{op}` expects {expected} successor(s), found {actual}")]
    WrongSuccessorCount {
        op: &'static str,
        expected: Arity,
        actual: usize,
    },
}

/// Allowed number of operands, results, regions or successors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn admits(self, n: usize) -> bool {
        match self {
            Arity::Exact(e) => n == e,
            Arity::AtLeast(min) => n >= min,
            Arity::Between(min, max) => (min..=max).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Between(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

/// Expected shape of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpShape {
    pub operands: Arity,
    pub results: Arity,
    pub regions: Arity,
    pub successors: Arity,
}

impl OpShape {
    /// No operands, results, regions or successors.
    pub const NULLARY: OpShape = OpShape {
        operands: Arity::Exact(0),
        results: Arity::Exact(0),
        regions: Arity::Exact(0),
        successors: Arity::Exact(0),
    };

    pub fn check(self, ctx: &IrContext, op: OpRef, name: &'static str) -> Result<(), ConversionError> {
        let data = ctx.op(op);
        let operands = ctx.op_operands(op).len();
        if !self.operands.admits(operands) {
            return Err(ConversionError::WrongOperandCount {
                op: name,
                expected: self.operands,
                actual: operands,
            });
        }
        let results = ctx.op_result_types(op).len();
        if !self.results.admits(results) {
            return Err(ConversionError::WrongResultCount {
                op: name,
                expected: self.results,
                actual: results,
            });
        }
        if !self.regions.admits(data.regions.len()) {
            return Err(ConversionError::WrongRegionCount {
                op: name,
                expected: self.regions,
                actual: data.regions.len(),
            });
        }
        if !self.successors.admits(data.successors.len()) {
            return Err(ConversionError::WrongSuccessorCount {
                op: name,
                expected: self.successors,
                actual: data.successors.len(),
            });
        }
        Ok(())
    }
}

/// Trait for typed dialect operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;
    fn op_ref(&self) -> OpRef;

    /// Name-only check; does not validate shape.
    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        data.dialect == Symbol::new(Self::DIALECT_NAME) && data.name == Symbol::new(Self::OP_NAME)
    }
}

/// Define a typed wrapper struct for one dialect operation.
///
/// ```
/// use strata_ir::ops::{Arity, OpShape};
///
/// strata_ir::define_op! {
///     /// `demo.nop`
///     pub struct Nop = "demo"."nop", OpShape::NULLARY;
/// }
///
/// strata_ir::define_op! {
///     pub struct Sink = "demo"."sink", OpShape {
///         operands: Arity::AtLeast(1),
///         ..OpShape::NULLARY
///     };
/// }
/// ```
#[macro_export]
macro_rules! define_op {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $dialect:literal . $op:literal, $shape:expr;
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis struct $name($crate::refs::OpRef);

        impl $crate::ops::DialectOp for $name {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $op;

            fn from_op(
                ctx: &$crate::context::IrContext,
                op: $crate::refs::OpRef,
            ) -> ::std::result::Result<Self, $crate::ops::ConversionError> {
                if !<Self as $crate::ops::DialectOp>::matches(ctx, op) {
                    return Err($crate::ops::ConversionError::WrongOperation {
                        expected: concat!($dialect, ".", $op),
                        actual: ctx.op(op).full_name(),
                    });
                }
                let shape: $crate::ops::OpShape = $shape;
                shape.check(ctx, op, concat!($dialect, ".", $op))?;
                Ok(Self(op))
            }

            fn op_ref(&self) -> $crate::refs::OpRef {
                self.0
            }
        }
    };
}
