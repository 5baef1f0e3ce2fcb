//! The `optimize` entry point.

use kiln_ir::IRModule;

use crate::context::PassContext;
use crate::error::Result;
use crate::pass::Pass;
use crate::passes::{PropagateLaunchBound, convert_precision, parallel_k, reduce_precision, simplify_arithmetic};

/// The default pass sequence: rewrites first, then attribute propagation.
pub fn default_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(simplify_arithmetic()),
        Box::new(convert_precision()),
        Box::new(reduce_precision()),
        Box::new(parallel_k()),
        Box::new(PropagateLaunchBound),
    ]
}

/// Run the default pipeline over `module` with `ctx` active.
pub fn optimize(module: &IRModule, ctx: &PassContext) -> Result<IRModule> {
    optimize_with(&default_passes(), module, ctx)
}

/// Run the default pipeline under the innermost entered context.
pub fn optimize_current(module: &IRModule) -> Result<IRModule> {
    optimize(module, &PassContext::current())
}

/// Run `passes` in order, each consuming its predecessor's output.
///
/// `ctx` is entered for the duration of the run, so passes and instruments
/// calling [`PassContext::current`] observe it.
pub fn optimize_with<P: Pass>(passes: &[P], module: &IRModule, ctx: &PassContext) -> Result<IRModule> {
    let _guard = ctx.enter();
    let instruments = ctx.instruments();

    instruments.iter().for_each(|i| i.before_all_passes(module));
    let mut current = module.clone();
    for pass in passes {
        let name = pass.name();
        let _span = tracing::debug_span!("pass", pass = name).entered();

        instruments.iter().for_each(|i| i.before_pass(name, &current));
        current = pass.process_module(&current, ctx)?;
        instruments.iter().for_each(|i| i.after_pass(name, &current));
    }
    instruments.iter().for_each(|i| i.after_all_passes(&current));

    tracing::debug!(passes = passes.len(), functions = current.len(), "optimize finished");
    Ok(current)
}
