//! Copy the kernel's launch configuration onto device functions.
//!
//! Device functions run inside the kernel launch, so code generation needs
//! the same `block_dim`/`grid_dim` when emitting them. Only modules with a
//! single kernel are handled: with zero or several kernels there is no
//! unambiguous launch to inherit and the module is returned unchanged.

use kiln_ir::{AttrValue, BLOCK_DIM, CallGraph, FuncKind, GRID_DIM, IRModule};
use snafu::ResultExt;

use crate::context::PassContext;
use crate::error::{IrSnafu, Result};
use crate::pass::{Pass, run_per_function};

pub const NAME: &str = "propagate_launch_bound";

#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateLaunchBound;

impl PropagateLaunchBound {
    /// Launch attributes of the module's only kernel, or `None` when there
    /// isn't exactly one.
    pub fn launch_attrs(module: &IRModule) -> Option<Vec<(String, AttrValue)>> {
        let mut kernels = module.kernels();
        let (Some(kernel), None) = (kernels.next(), kernels.next()) else {
            return None;
        };
        let attrs = [BLOCK_DIM, GRID_DIM]
            .into_iter()
            .filter_map(|key| kernel.attr(key).map(|v| (key.to_string(), v.clone())))
            .collect();
        Some(attrs)
    }
}

impl Pass for PropagateLaunchBound {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process_module(&self, module: &IRModule, _ctx: &PassContext) -> Result<IRModule> {
        CallGraph::build(module).check_acyclic().context(IrSnafu { pass: NAME })?;

        let Some(attrs) = Self::launch_attrs(module) else {
            tracing::debug!(pass = NAME, kernels = module.kernels().count(), "not exactly one kernel; skipping");
            return Ok(module.clone());
        };
        if attrs.is_empty() {
            return Ok(module.clone());
        }
        run_per_function(NAME, module, |func| {
            Ok((func.kind() == FuncKind::Device).then(|| func.with_merged_attrs(attrs.iter().cloned())))
        })
    }
}
