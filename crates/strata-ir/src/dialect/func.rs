//! `func` dialect: function definitions and returns.

use super::{ATTR_SYM_NAME, ATTR_TYPE, attr};
use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::{Arity, OpShape};
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::define_op! {
    /// `func.func`: a named function owning one body region.
    pub struct Func = "func"."func", OpShape {
        regions: Arity::Exact(1),
        ..OpShape::NULLARY
    };
}

crate::define_op! {
    /// `func.return`: leaves the function with zero or more values.
    pub struct Return = "func"."return", OpShape {
        operands: Arity::AtLeast(0),
        ..OpShape::NULLARY
    };
}

/// Create a detached `func.func` owning `body`.
pub fn func(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    ty: TypeRef,
    body: RegionRef,
) -> Func {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("func"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .attr(ATTR_TYPE(), Attribute::Type(ty))
        .region(body)
        .build(ctx);
    Func(ctx.create_op(data))
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("return"))
        .operands(values)
        .build(ctx);
    Return(ctx.create_op(data))
}

impl Func {
    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region_entry(self.body(ctx))
    }

    /// Function name; functions built without `sym_name` report `<anonymous>`.
    pub fn sym_name(self, ctx: &IrContext) -> Symbol {
        attr(ctx, self.0, ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
            .unwrap_or_else(|| Symbol::new("<anonymous>"))
    }

    pub fn ty(self, ctx: &IrContext) -> Option<TypeRef> {
        match attr(ctx, self.0, ATTR_TYPE()) {
            Some(Attribute::Type(ty)) => Some(*ty),
            _ => None,
        }
    }
}

impl Return {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}
