//! Common test utilities: an IR builder and an interpreter for lowered CFGs.

#![allow(dead_code)]

use std::collections::HashMap;

use strata::ir::dialect::core::{self, Module};
use strata::ir::dialect::{arith, cf, func, scf};
use strata::ir::{
    BlockData, BlockRef, DialectOp, IrContext, Location, OpRef, RegionData, RegionRef, Span,
    Symbol, TypeRef, ValueRef,
};

pub struct Builder {
    pub ctx: IrContext,
    pub loc: Location,
    pub module: Module,
    pub i64: TypeRef,
    pub i1: TypeRef,
}

impl Builder {
    pub fn new() -> Self {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("file:///integration.st".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let module = core::module(&mut ctx, loc, Symbol::new("m"));
        let i64 = ctx.types.core("i64");
        let i1 = ctx.types.core("i1");
        Builder {
            ctx,
            loc,
            module,
            i64,
            i1,
        }
    }

    pub fn block(&mut self, args: &[TypeRef]) -> BlockRef {
        self.ctx
            .create_block(BlockData::new(self.loc, args.iter().copied()))
    }

    pub fn region(&mut self, blocks: &[BlockRef]) -> RegionRef {
        self.ctx.create_region(RegionData {
            location: self.loc,
            blocks: blocks.iter().copied().collect(),
            parent_op: None,
        })
    }

    /// Append `arith.const`; returns the op so tests can count its executions.
    pub fn konst_op(&mut self, block: BlockRef, ty: TypeRef, value: i64) -> (OpRef, ValueRef) {
        let c = arith::r#const(&mut self.ctx, self.loc, ty, value);
        self.ctx.push_op(block, c.op_ref());
        (c.op_ref(), c.result(&self.ctx))
    }

    pub fn konst(&mut self, block: BlockRef, ty: TypeRef, value: i64) -> ValueRef {
        self.konst_op(block, ty, value).1
    }

    /// A detached constant: its value never resolves.
    pub fn dangling(&mut self, ty: TypeRef, value: i64) -> ValueRef {
        arith::r#const(&mut self.ctx, self.loc, ty, value).result(&self.ctx)
    }

    pub fn add(&mut self, block: BlockRef, lhs: ValueRef, rhs: ValueRef) -> (OpRef, ValueRef) {
        let a = arith::addi(&mut self.ctx, self.loc, lhs, rhs);
        self.ctx.push_op(block, a.op_ref());
        (a.op_ref(), a.result(&self.ctx))
    }

    pub fn terminate(&mut self, block: BlockRef) {
        let t = scf::terminator(&mut self.ctx, self.loc);
        self.ctx.push_op(block, t.op_ref());
    }

    pub fn ret(&mut self, block: BlockRef) {
        let r = func::r#return(&mut self.ctx, self.loc, []);
        self.ctx.push_op(block, r.op_ref());
    }

    /// Append `scf.for`; returns the body block (its single argument is the
    /// induction variable) and the induction variable.
    pub fn for_loop(
        &mut self,
        block: BlockRef,
        lb: ValueRef,
        ub: ValueRef,
        step: ValueRef,
    ) -> (BlockRef, ValueRef) {
        let body_block = self.block(&[self.i64]);
        let body = self.region(&[body_block]);
        let op = scf::r#for(&mut self.ctx, self.loc, lb, ub, step, body);
        self.ctx.push_op(block, op.op_ref());
        (body_block, self.ctx.block_arg(body_block, 0))
    }

    /// Append `scf.if`; returns the then block and, if requested, the else block.
    pub fn if_op(
        &mut self,
        block: BlockRef,
        cond: ValueRef,
        with_else: bool,
    ) -> (BlockRef, Option<BlockRef>) {
        let then_block = self.block(&[]);
        let then_region = self.region(&[then_block]);
        let (else_region, else_block) = if with_else {
            let b = self.block(&[]);
            (Some(self.region(&[b])), Some(b))
        } else {
            (None, None)
        };
        let op = scf::r#if(&mut self.ctx, self.loc, cond, then_region, else_region);
        self.ctx.push_op(block, op.op_ref());
        (then_block, else_block)
    }

    pub fn function(&mut self, name: &'static str, blocks: &[BlockRef]) -> func::Func {
        let body = self.region(blocks);
        let fn_ty = self.ctx.types.core("fn");
        let f = func::func(&mut self.ctx, self.loc, Symbol::new(name), fn_ty, body);
        let top = self
            .module
            .first_block(&self.ctx)
            .expect("module has a body block");
        self.ctx.push_op(top, f.op_ref());
        f
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// What one run of a lowered function did.
#[derive(Debug, Default)]
pub struct Trace {
    /// Every value produced, per producing op, in execution order.
    pub produced: HashMap<OpRef, Vec<i64>>,
    pub env: HashMap<ValueRef, i64>,
    pub returned: bool,
}

impl Trace {
    pub fn runs(&self, op: OpRef) -> usize {
        self.produced.get(&op).map_or(0, Vec::len)
    }

    pub fn values(&self, op: OpRef) -> &[i64] {
        self.produced.get(&op).map_or(&[], Vec::as_slice)
    }

    pub fn value(&self, v: ValueRef) -> Option<i64> {
        self.env.get(&v).copied()
    }
}

const FUEL: usize = 100_000;

/// Execute a function that contains only `arith`, `cf` and `func.return`.
///
/// Panics on any other op, on a read of an undefined value, or when the
/// function does not return within a fixed step budget.
pub fn interpret(ctx: &IrContext, function: func::Func) -> Trace {
    let mut trace = Trace::default();
    let mut block = function.entry_block(ctx).expect("function has no entry block");
    let mut steps = 0;

    'blocks: loop {
        for &op in &ctx.block(block).ops {
            steps += 1;
            assert!(steps < FUEL, "@{} did not terminate", function.sym_name(ctx));

            if let Ok(c) = arith::Const::from_op(ctx, op) {
                let value = c.value(ctx).expect("arith.const without value");
                trace.define(op, c.result(ctx), value);
            } else if let Ok(a) = arith::AddI::from_op(ctx, op) {
                let value = trace.read(a.lhs(ctx)) + trace.read(a.rhs(ctx));
                trace.define(op, a.result(ctx), value);
            } else if let Ok(c) = arith::CmpI::from_op(ctx, op) {
                let pred = c.predicate(ctx).expect("arith.cmpi without predicate");
                let value = pred.evaluate(trace.read(c.lhs(ctx)), trace.read(c.rhs(ctx)));
                trace.define(op, c.result(ctx), i64::from(value));
            } else if let Ok(br) = cf::Br::from_op(ctx, op) {
                let dest = br.dest(ctx);
                let args: Vec<i64> = br.args(ctx).iter().map(|&v| trace.read(v)).collect();
                let params = ctx.block_args(dest);
                assert_eq!(args.len(), params.len(), "{op}: argument count mismatch");
                for (&param, value) in params.iter().zip(args) {
                    trace.env.insert(param, value);
                }
                block = dest;
                continue 'blocks;
            } else if let Ok(br) = cf::CondBr::from_op(ctx, op) {
                block = if trace.read(br.cond(ctx)) != 0 {
                    br.then_dest(ctx)
                } else {
                    br.else_dest(ctx)
                };
                continue 'blocks;
            } else if func::Return::matches(ctx, op) {
                trace.returned = true;
                return trace;
            } else {
                panic!("cannot interpret {}", ctx.op(op).full_name());
            }
        }
        panic!("{block} fell off its end");
    }
}

impl Trace {
    fn read(&self, v: ValueRef) -> i64 {
        match self.env.get(&v) {
            Some(&value) => value,
            None => panic!("{v} read before definition"),
        }
    }

    fn define(&mut self, op: OpRef, v: ValueRef, value: i64) {
        self.env.insert(v, value);
        self.produced.entry(op).or_default().push(value);
    }
}
