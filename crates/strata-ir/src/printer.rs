//! Text printer.
//!
//! ```text
//! core.module @m {
//!   func.func @count() : core.fn {
//!     ^bb0:
//!       %0 = arith.const {value = 0} : core.i64
//!       cf.br %0 [^bb1]
//!     ^bb1(%1: core.i64):
//!       func.return
//!   }
//! }
//! ```
//!
//! Values are numbered `%N` and blocks labeled `^bbN` in print order,
//! restarting at every function, so output is deterministic for a given IR.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, usize>,
    block_labels: HashMap<BlockRef, usize>,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
        }
    }

    fn reset_numbering(&mut self) {
        self.value_names.clear();
        self.block_labels.clear();
    }

    fn assign_value_name(&mut self, v: ValueRef) -> usize {
        let next = self.value_names.len();
        *self.value_names.entry(v).or_insert(next)
    }

    fn write_value(&self, f: &mut impl Write, v: ValueRef) -> fmt::Result {
        match self.value_names.get(&v) {
            Some(n) => write!(f, "%{n}"),
            None => f.write_str("%?"),
        }
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let next = self.block_labels.len();
        self.block_labels.entry(b).or_insert(next);
    }

    fn write_block(&self, f: &mut impl Write, b: BlockRef) -> fmt::Result {
        match self.block_labels.get(&b) {
            Some(n) => write!(f, "^bb{n}"),
            None => f.write_str("^bb?"),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print an operation, including nested regions, as IR text.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print_operation(&mut state, &mut out, op, 0);
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    let _ = write_type(ctx, &mut out, ty);
    out
}

// ============================================================================
// Types and attributes
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        f.write_char('(')?;
        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, param)?;
        }
        f.write_char(')')?;
    }
    Ok(())
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(bits) => write!(f, "{}", *bits as i64),
        Attribute::String(s) => write!(f, "{s:?}"),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::Symbol(sym) => write_symbol(f, *sym),
    }
}

fn write_symbol(f: &mut impl Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        let needs_quoting = s.is_empty() || !s.chars().all(|c| c.is_alphanumeric() || c == '_');
        if needs_quoting {
            write!(f, "@{s:?}")
        } else {
            write!(f, "@{s}")
        }
    })
}

// ============================================================================
// Operations
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let data = state.ctx.op(op);
    if data.is("core", "module") {
        return print_module_op(state, f, op, indent);
    }
    if data.is("func", "func") {
        return print_func_op(state, f, op, indent);
    }
    print_generic_op(state, f, op, indent)
}

fn print_generic_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);
    write!(f, "{:indent$}", "")?;

    let results = ctx.op_results(op);
    if !results.is_empty() {
        for (i, &v) in results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            state.assign_value_name(v);
            state.write_value(f, v)?;
        }
        f.write_str(" = ")?;
    }

    write!(f, "{}.{}", data.dialect, data.name)?;

    let operands = ctx.op_operands(op);
    for (i, &v) in operands.iter().enumerate() {
        f.write_str(if i == 0 { " " } else { ", " })?;
        state.write_value(f, v)?;
    }

    if !data.successors.is_empty() {
        f.write_str(" [")?;
        for (i, &b) in data.successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            state.write_block(f, b)?;
        }
        f.write_char(']')?;
    }

    if !data.attributes.is_empty() {
        f.write_str(" {")?;
        for (i, (key, val)) in data.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }

    let result_types = ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        for (i, &ty) in result_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(ctx, f, ty)?;
        }
    }

    for &region in &data.regions {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2, false)?;
        write!(f, "{:indent$}}}", "")?;
    }

    f.write_char('\n')
}

/// Print the blocks of a region. Single argument-less blocks of structured
/// regions print without a label.
fn print_region(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    region: RegionRef,
    indent: usize,
    always_label: bool,
) -> fmt::Result {
    let ctx = state.ctx;
    let blocks = &ctx.region(region).blocks;
    for &block in blocks {
        state.assign_block_label(block);
    }

    let elide_label =
        !always_label && blocks.len() == 1 && ctx.block_args(blocks[0]).is_empty();

    for &block in blocks {
        if !elide_label {
            write!(f, "{:indent$}", "")?;
            state.write_block(f, block)?;
            let args = ctx.block_args(block);
            if !args.is_empty() {
                f.write_char('(')?;
                for (j, &arg) in args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    state.assign_value_name(arg);
                    state.write_value(f, arg)?;
                    f.write_str(": ")?;
                    write_type(ctx, f, ctx.block(block).args[j])?;
                }
                f.write_char(')')?;
            }
            f.write_str(":\n")?;
        }

        let op_indent = if elide_label { indent } else { indent + 2 };
        for &op in &ctx.block(block).ops {
            print_operation(state, f, op, op_indent)?;
        }
    }

    Ok(())
}

fn print_module_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);
    write!(f, "{:indent$}core.module", "")?;
    if let Some(Attribute::Symbol(name)) = data.attributes.get(&Symbol::new("sym_name")) {
        f.write_char(' ')?;
        write_symbol(f, *name)?;
    }
    f.write_str(" {\n")?;

    if let Some(&region) = data.regions.first() {
        for &block in &ctx.region(region).blocks {
            for &child in &ctx.block(block).ops {
                print_operation(state, f, child, indent + 2)?;
            }
        }
    }

    writeln!(f, "{:indent$}}}", "")
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);
    write!(f, "{:indent$}func.func", "")?;
    if let Some(Attribute::Symbol(name)) = data.attributes.get(&Symbol::new("sym_name")) {
        f.write_char(' ')?;
        write_symbol(f, *name)?;
    }
    f.write_str("()")?;
    if let Some(Attribute::Type(ty)) = data.attributes.get(&Symbol::new("type")) {
        f.write_str(" : ")?;
        write_type(ctx, f, *ty)?;
    }
    f.write_str(" {\n")?;

    state.reset_numbering();
    if let Some(&body) = data.regions.first() {
        print_region(state, f, body, indent + 2, true)?;
    }
    state.reset_numbering();

    writeln!(f, "{:indent$}}}", "")
}
