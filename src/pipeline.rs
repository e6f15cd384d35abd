//! Caller-held pass pipeline.
//!
//! There is no global pass registry: the caller builds a [`Pipeline`], adds
//! the passes it wants in the order it wants them, and runs it on a module.
//!
//! ```text
//! Module (func / scf / arith / cf)
//!     │
//!     ▼
//! lower-to-cfg ─► Module (func / arith / cf)
//!     │
//!     ▼
//! verify-cfg ─► same module, every block closed by one branch or return
//! ```

use derive_more::{Display, From};
use strata_ir::IrContext;
use strata_ir::dialect::core::Module;
use strata_ir::validation::{self, CfgError, UseChainError};
use strata_passes::LowerModuleError;
use tracing::debug;

use crate::passes::{ControlFlowToCfg, VerifyCfg};

/// A module-level transformation.
pub trait Pass {
    /// Short kebab-case name used in errors and logs.
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError>;
}

/// Why a single pass failed.
#[derive(Clone, Debug, Display, From, PartialEq)]
pub enum PassError {
    #[display("{_0}")]
    Lowering(LowerModuleError),

    #[from(ignore)]
    #[display("{} block(s) are not in CFG form: {}", _0.len(), join(_0))]
    InvalidCfg(Vec<CfgError>),

    #[from(ignore)]
    #[display("{} use-chain error(s): {}", _0.len(), join(_0))]
    UseChain(Vec<UseChainError>),
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PassError::Lowering(err) => Some(err),
            PassError::InvalidCfg(_) | PassError::UseChain(_) => None,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The first pass that failed, and how.
#[derive(Clone, Debug, Display, PartialEq)]
#[display("pass `{pass}` failed: {source}")]
pub struct PipelineError {
    pub pass: &'static str,
    pub source: PassError,
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Check use-chain consistency after every pass.
    pub verify_after_each_pass: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            verify_after_each_pass: true,
        }
    }
}

/// An ordered list of passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            passes: Vec::new(),
            options,
        }
    }

    pub fn add(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass in order, stopping at the first failure.
    ///
    /// Passes before the failing one keep their effect on the module.
    pub fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PipelineError> {
        for pass in &self.passes {
            let name = pass.name();
            debug!(pass = name, "running pass");
            pass.run(ctx, module)
                .map_err(|source| PipelineError { pass: name, source })?;

            if self.options.verify_after_each_pass {
                let result = validation::validate_use_chains(ctx, module);
                if !result.use_chain_errors.is_empty() {
                    return Err(PipelineError {
                        pass: name,
                        source: PassError::UseChain(result.use_chain_errors),
                    });
                }
            }
        }
        Ok(())
    }
}

/// `lower-to-cfg` followed by `verify-cfg`, with default options.
pub fn lowering_pipeline() -> Pipeline {
    Pipeline::new(PipelineOptions::default())
        .add(ControlFlowToCfg)
        .add(VerifyCfg)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use smallvec::smallvec;
    use strata_ir::dialect::{arith, core, func};
    use strata_ir::{BlockData, DialectOp, Location, RegionData, Span, Symbol};

    use super::*;

    struct Record {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl Pass for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&self, _ctx: &mut IrContext, _module: Module) -> Result<(), PassError> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                Err(PassError::InvalidCfg(Vec::new()))
            } else {
                Ok(())
            }
        }
    }

    /// Detaches the `arith.addi` but leaves its uses of `%0` registered.
    struct DetachAdd;

    impl Pass for DetachAdd {
        fn name(&self) -> &'static str {
            "detach-add"
        }

        fn run(&self, ctx: &mut IrContext, module: Module) -> Result<(), PassError> {
            let function = module.functions(ctx)[0];
            let entry = function.entry_block(ctx).unwrap();
            let add = ctx.block(entry).ops[1];
            ctx.detach_op(add);
            Ok(())
        }
    }

    /// A module with one function: `%0 = const 1; %1 = addi %0, %0; return`.
    fn module_with_add() -> (IrContext, Module) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("file:///pipeline.st".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        let i64 = ctx.types.core("i64");
        let module = core::module(&mut ctx, loc, Symbol::new("m"));

        let entry = ctx.create_block(BlockData::new(loc, []));
        let one = arith::r#const(&mut ctx, loc, i64, 1);
        ctx.push_op(entry, one.op_ref());
        let one = one.result(&ctx);
        let sum = arith::addi(&mut ctx, loc, one, one);
        ctx.push_op(entry, sum.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());

        let body = ctx.create_region(RegionData {
            location: loc,
            blocks: smallvec![entry],
            parent_op: None,
        });
        let fn_ty = ctx.types.core("fn");
        let f = func::func(&mut ctx, loc, Symbol::new("add"), fn_ty, body);
        let top = module.first_block(&ctx).unwrap();
        ctx.push_op(top, f.op_ref());
        (ctx, module)
    }

    fn record(
        name: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    ) -> Record {
        Record {
            name,
            log: Rc::clone(log),
            fail,
        }
    }

    #[test]
    fn default_options_verify() {
        assert!(PipelineOptions::default().verify_after_each_pass);
        assert!(Pipeline::default().options().verify_after_each_pass);
    }

    #[test]
    fn lowering_pipeline_order() {
        assert_eq!(
            lowering_pipeline().pass_names(),
            vec!["lower-to-cfg", "verify-cfg"]
        );
    }

    #[test]
    fn stops_at_first_failing_pass() {
        let (mut ctx, module) = module_with_add();
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = Pipeline::default()
            .add(record("first", &log, false))
            .add(record("second", &log, true))
            .add(record("third", &log, false));

        let err = pipeline.run(&mut ctx, module).unwrap_err();
        assert_eq!(err.pass, "second");
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn broken_use_chain_is_reported_after_the_pass() {
        let (mut ctx, module) = module_with_add();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::default();
        pipeline
            .push(Box::new(DetachAdd))
            .push(Box::new(record("after", &log, false)));

        let err = pipeline.run(&mut ctx, module).unwrap_err();
        assert_eq!(err.pass, "detach-add");
        assert!(matches!(err.source, PassError::UseChain(ref errors) if errors.len() == 2));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn verification_can_be_disabled() {
        let (mut ctx, module) = module_with_add();
        let pipeline = Pipeline::new(PipelineOptions {
            verify_after_each_pass: false,
        })
        .add(DetachAdd);
        pipeline.run(&mut ctx, module).unwrap();
    }

    #[test]
    fn pipeline_error_display_names_the_pass() {
        let err = PipelineError {
            pass: "verify-cfg",
            source: PassError::UseChain(vec![
                UseChainError {
                    message: "first".to_owned(),
                },
                UseChainError {
                    message: "second".to_owned(),
                },
            ]),
        };
        assert_eq!(
            err.to_string(),
            "pass `verify-cfg` failed: 2 use-chain error(s): first; second"
        );
    }
}
