//! Legality rules for dialect conversion.
//!
//! A conversion target says which operations may remain after a lowering.
//! `verify()` walks a region and lists every operation that is still illegal.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::walk::{self, WalkAction};

/// Result of a legality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalityCheck {
    Legal,
    Illegal,
}

type DynamicCheckFn = dyn Fn(&IrContext, OpRef) -> Option<LegalityCheck>;

/// Which ops and dialects are legal, illegal, or dynamically checked.
/// Everything is legal by default.
#[derive(Default)]
pub struct ConversionTarget {
    legal_dialects: HashSet<Symbol>,
    illegal_dialects: HashSet<Symbol>,
    legal_ops: HashSet<(Symbol, Symbol)>,
    illegal_ops: HashSet<(Symbol, Symbol)>,
    dynamic_checks: Vec<Box<DynamicCheckFn>>,
}

impl ConversionTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_legal_dialect(&mut self, dialect: &str) -> &mut Self {
        self.legal_dialects.insert(Symbol::from_dynamic(dialect));
        self
    }

    pub fn add_illegal_dialect(&mut self, dialect: &str) -> &mut Self {
        self.illegal_dialects.insert(Symbol::from_dynamic(dialect));
        self
    }

    pub fn add_legal_op(&mut self, dialect: &str, op_name: &str) -> &mut Self {
        self.legal_ops
            .insert((Symbol::from_dynamic(dialect), Symbol::from_dynamic(op_name)));
        self
    }

    pub fn add_illegal_op(&mut self, dialect: &str, op_name: &str) -> &mut Self {
        self.illegal_ops
            .insert((Symbol::from_dynamic(dialect), Symbol::from_dynamic(op_name)));
        self
    }

    /// Add a dynamic legality check.
    ///
    /// Return `Some(Legal)` or `Some(Illegal)` to override, `None` to defer.
    pub fn add_dynamic_check(
        &mut self,
        f: impl Fn(&IrContext, OpRef) -> Option<LegalityCheck> + 'static,
    ) -> &mut Self {
        self.dynamic_checks.push(Box::new(f));
        self
    }

    /// Check if a specific operation is legal.
    ///
    /// Resolution order:
    /// 1. Dynamic checks (first non-None wins)
    /// 2. Specific op rules
    /// 3. Dialect rules
    /// 4. Default: Legal
    pub fn is_legal(&self, ctx: &IrContext, op: OpRef) -> LegalityCheck {
        for check in &self.dynamic_checks {
            if let Some(result) = check(ctx, op) {
                return result;
            }
        }

        let data = ctx.op(op);
        let key = (data.dialect, data.name);

        if self.legal_ops.contains(&key) {
            return LegalityCheck::Legal;
        }
        if self.illegal_ops.contains(&key) {
            return LegalityCheck::Illegal;
        }

        if self.legal_dialects.contains(&data.dialect) {
            return LegalityCheck::Legal;
        }
        if self.illegal_dialects.contains(&data.dialect) {
            return LegalityCheck::Illegal;
        }

        LegalityCheck::Legal
    }

    /// List every illegal operation nested in `region`, pre-order.
    pub fn verify(&self, ctx: &IrContext, region: RegionRef) -> Vec<IllegalOp> {
        let mut illegal = Vec::new();

        let _ = walk::walk_region::<()>(ctx, region, &mut |op| {
            if self.is_legal(ctx, op) == LegalityCheck::Illegal {
                let data = ctx.op(op);
                illegal.push(IllegalOp {
                    op,
                    dialect: data.dialect,
                    name: data.name,
                });
            }
            ControlFlow::Continue(WalkAction::Advance)
        });

        illegal
    }
}

/// An illegal operation found during verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IllegalOp {
    pub op: OpRef,
    pub dialect: Symbol,
    pub name: Symbol,
}

impl fmt::Display for IllegalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.dialect, self.name, self.op)
    }
}
