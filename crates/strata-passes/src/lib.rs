//! Lowering passes over strata IR.

pub mod control_flow_to_cfg;

pub use control_flow_to_cfg::{
    LowerModuleError, LoweringError, LoweringStats, ModuleStats, lower_function, lower_module,
};
