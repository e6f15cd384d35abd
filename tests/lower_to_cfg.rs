//! End-to-end lowering through the pass pipeline, checked by executing the
//! resulting CFG.

mod common;

use common::{Builder, interpret};
use strata::ir::dialect::{arith, cf, func};
use strata::ir::printer::print_op;
use strata::ir::{DialectOp, OpRef, Symbol, ValueRef, cfg, validation};
use strata::{LoweringError, PassError, Pipeline, PipelineOptions, VerifyCfg, lowering_pipeline};

fn lower(b: &mut Builder) {
    lowering_pipeline()
        .run(&mut b.ctx, b.module)
        .unwrap_or_else(|err| panic!("{err}"));
    let result = validation::validate_all(&b.ctx, b.module);
    assert!(result.is_ok(), "{result}");
}

/// `for %iv = lb to ub step s { %tap = addi %iv, 0 }`, returns the tap op.
fn counting_function(
    b: &mut Builder,
    name: &'static str,
    (lb, ub, step): (i64, i64, i64),
) -> (func::Func, OpRef, ValueRef) {
    let entry = b.block(&[]);
    let zero = b.konst(entry, b.i64, 0);
    let lb = b.konst(entry, b.i64, lb);
    let ub = b.konst(entry, b.i64, ub);
    let step = b.konst(entry, b.i64, step);
    let (body, iv) = b.for_loop(entry, lb, ub, step);
    let (tap, _) = b.add(body, iv, zero);
    b.terminate(body);
    b.ret(entry);
    (b.function(name, &[entry]), tap, iv)
}

#[test]
fn loop_body_runs_once_per_induction_value() {
    let mut b = Builder::new();
    let (f, tap, iv) = counting_function(&mut b, "count", (0, 10, 1));
    lower(&mut b);

    let trace = interpret(&b.ctx, f);
    assert!(trace.returned);
    assert_eq!(trace.values(tap), (0..10).collect::<Vec<_>>());
    assert_eq!(trace.value(iv), Some(10), "exit observed iv == ub");
}

#[test]
fn loop_with_larger_step_and_empty_range() {
    let mut b = Builder::new();
    let (stepped, stepped_tap, _) = counting_function(&mut b, "stepped", (1, 10, 4));
    let (empty, empty_tap, iv) = counting_function(&mut b, "empty", (5, 5, 1));
    lower(&mut b);

    assert_eq!(interpret(&b.ctx, stepped).values(stepped_tap), &[1, 5, 9]);
    let trace = interpret(&b.ctx, empty);
    assert_eq!(trace.runs(empty_tap), 0);
    assert_eq!(trace.value(iv), Some(5));
}

#[test]
fn literal_true_condition_keeps_both_edges() {
    let mut b = Builder::new();
    let entry = b.block(&[]);
    let cond = b.konst(entry, b.i1, 1);
    let (then_block, else_block) = b.if_op(entry, cond, true);
    let else_block = else_block.unwrap();
    let (then_tap, _) = b.konst_op(then_block, b.i64, 10);
    b.terminate(then_block);
    let (else_tap, _) = b.konst_op(else_block, b.i64, 20);
    b.terminate(else_block);
    b.ret(entry);
    let f = b.function("choose", &[entry]);
    lower(&mut b);

    insta::assert_snapshot!(print_op(&b.ctx, b.module.op_ref()), @r"
    core.module @m {
      func.func @choose() : core.fn {
        ^bb0:
          %0 = arith.const {value = 1} : core.i1
          cf.cond_br %0 [^bb1, ^bb2]
        ^bb1:
          %1 = arith.const {value = 10} : core.i64
          cf.br [^bb3]
        ^bb2:
          %2 = arith.const {value = 20} : core.i64
          cf.br [^bb3]
        ^bb3:
          func.return
      }
    }
    ");

    let branch = b.ctx.block_terminator(entry).unwrap();
    let branch = cf::CondBr::from_op(&b.ctx, branch).unwrap();
    assert_ne!(branch.then_dest(&b.ctx), branch.else_dest(&b.ctx));

    let trace = interpret(&b.ctx, f);
    assert_eq!((trace.runs(then_tap), trace.runs(else_tap)), (1, 0));
}

#[test]
fn missing_else_skips_then_on_false() {
    let mut b = Builder::new();
    let entry = b.block(&[]);
    let cond = b.konst(entry, b.i1, 0);
    let (then_block, _) = b.if_op(entry, cond, false);
    let (then_tap, _) = b.konst_op(then_block, b.i64, 1);
    b.terminate(then_block);
    let (after, _) = b.konst_op(entry, b.i64, 2);
    b.ret(entry);
    let f = b.function("skip", &[entry]);
    lower(&mut b);

    let trace = interpret(&b.ctx, f);
    assert_eq!(trace.runs(then_tap), 0);
    assert_eq!(trace.runs(after), 1);
    assert_eq!(b.ctx.region(f.body(&b.ctx)).blocks.len(), 3);
}

#[test]
fn nested_loop_in_if_in_loop_counts() {
    for (flag, expected_inner) in [(1, 12), (0, 0)] {
        let mut b = Builder::new();
        let entry = b.block(&[]);
        let zero = b.konst(entry, b.i64, 0);
        let three = b.konst(entry, b.i64, 3);
        let four = b.konst(entry, b.i64, 4);
        let one = b.konst(entry, b.i64, 1);
        let (outer_body, outer_iv) = b.for_loop(entry, zero, three, one);
        let (outer_tap, _) = b.add(outer_body, outer_iv, zero);
        let cond = b.konst(outer_body, b.i1, flag);
        let (then_block, _) = b.if_op(outer_body, cond, false);
        let (inner_body, inner_iv) = b.for_loop(then_block, zero, four, one);
        let (inner_tap, _) = b.add(inner_body, inner_iv, outer_iv);
        b.terminate(inner_body);
        b.terminate(then_block);
        b.terminate(outer_body);
        b.ret(entry);
        let f = b.function("nested", &[entry]);
        lower(&mut b);

        let body = f.body(&b.ctx);
        assert!(cfg::unreachable_blocks(&b.ctx, body).is_empty());

        let trace = interpret(&b.ctx, f);
        assert_eq!(trace.values(outer_tap), &[0, 1, 2]);
        assert_eq!(trace.runs(inner_tap), expected_inner, "flag = {flag}");
        if flag == 1 {
            let sums: Vec<i64> = (0..3).flat_map(|o| (0..4).map(move |i| i + o)).collect();
            assert_eq!(trace.values(inner_tap), sums);
        }
    }
}

#[test]
fn each_loop_gets_one_compare_and_one_increment() {
    let mut b = Builder::new();
    let (f, _, _) = counting_function(&mut b, "count", (0, 3, 1));
    lower(&mut b);

    let ops: Vec<_> = b
        .ctx
        .region(f.body(&b.ctx))
        .blocks
        .iter()
        .flat_map(|&block| b.ctx.block(block).ops.to_vec())
        .collect();
    let compares = ops
        .iter()
        .filter(|&&op| arith::CmpI::matches(&b.ctx, op))
        .count();
    let increments = ops
        .iter()
        .filter(|&&op| arith::AddI::matches(&b.ctx, op))
        .count();
    // The tap is an addi too.
    assert_eq!((compares, increments), (1, 2));

    let preds = cfg::predecessors(&b.ctx, f.body(&b.ctx));
    let cond_block = b.ctx.region(f.body(&b.ctx)).blocks[1];
    assert_eq!(preds[&cond_block].len(), 2, "entry edge and back edge");
}

#[test]
fn failed_lowering_leaves_ir_untouched() {
    let mut b = Builder::new();
    let entry = b.block(&[]);
    let cond = b.konst(entry, b.i1, 1);
    let (then_block, _) = b.if_op(entry, cond, false);
    b.terminate(then_block);
    let lb = b.konst(entry, b.i64, 0);
    let ub = b.konst(entry, b.i64, 10);
    let step = b.dangling(b.i64, 1);
    let (body, _) = b.for_loop(entry, lb, ub, step);
    b.terminate(body);
    b.ret(entry);
    b.function("broken", &[entry]);

    let before = print_op(&b.ctx, b.module.op_ref());
    let err = lowering_pipeline().run(&mut b.ctx, b.module).unwrap_err();

    assert_eq!(err.pass, "lower-to-cfg");
    let PassError::Lowering(lowered) = &err.source else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(lowered.function, Symbol::new("broken"));
    assert!(matches!(
        lowered.source,
        LoweringError::OperandResolution {
            operand: "step",
            ..
        }
    ));
    assert_eq!(print_op(&b.ctx, b.module.op_ref()), before);
}

#[test]
fn lowering_is_idempotent() {
    let mut b = Builder::new();
    counting_function(&mut b, "count", (0, 10, 1));
    lower(&mut b);
    let once = print_op(&b.ctx, b.module.op_ref());

    lower(&mut b);
    assert_eq!(print_op(&b.ctx, b.module.op_ref()), once);
}

#[test]
fn verify_cfg_rejects_structured_functions() {
    let mut b = Builder::new();
    counting_function(&mut b, "count", (0, 10, 1));

    let err = Pipeline::new(PipelineOptions::default())
        .add(VerifyCfg)
        .run(&mut b.ctx, b.module)
        .unwrap_err();
    assert_eq!(err.pass, "verify-cfg");
    let PassError::InvalidCfg(errors) = &err.source else {
        panic!("unexpected error: {err}");
    };
    assert!(
        errors
            .iter()
            .any(|e| e.message == "scf.for still owns a region"),
        "{errors:?}"
    );
}
