//! Optimization passes for kiln IR modules.
//!
//! A [`Pass`] maps an [`IRModule`](kiln_ir::IRModule) to a new module.
//! [`optimize`] runs the default sequence under a [`PassContext`]:
//!
//! 1. `simplify_arithmetic`: identity elimination and constant folding
//! 2. `convert_precision`: narrow intermediate tensors to `precision`
//! 3. `reduce_precision`: retype reduction accumulators
//! 4. `parallel_k`: choose a reduction split factor for kernels
//! 5. `propagate_launch_bound`: copy kernel launch dims onto device functions
//!
//! Rewriting passes are built from matcher [`RewriteRule`]s applied by
//! [`rewrite_bottom_up`].

pub mod config;
pub mod context;
pub mod error;
pub mod instrument;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod rewrite;


pub use config::OptimizeConfig;
pub use context::{ParallelK, PassContext, PassContextGuard};
pub use error::{Error, Result};
pub use instrument::{LoggingInstrument, PassInstrument, ProfileInstrument};
pub use pass::{FunctionPass, Pass, function_pass, run_per_function};
pub use passes::PropagateLaunchBound;
pub use pipeline::{default_passes, optimize, optimize_current, optimize_with};
pub use rewrite::{MAX_REWRITES_PER_NODE, RewriteRule, RuleSet, rewrite_bottom_up};
