//! Pass framework.
//!
//! A [`Pass`] maps one module to another. Most passes only look at one
//! function at a time; [`function_pass`] builds such a pass from a closure
//! and drives it over the module with [`run_per_function`].

use kiln_ir::{Function, IRModule};

use crate::context::PassContext;
use crate::error::Result;

/// Module-to-module transformation.
///
/// Passes are pure: the same module and context always give the same
/// output, and the input module is never modified.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn process_module(&self, module: &IRModule, ctx: &PassContext) -> Result<IRModule>;
}

impl<P: Pass + ?Sized> Pass for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process_module(&self, module: &IRModule, ctx: &PassContext) -> Result<IRModule> {
        (**self).process_module(module, ctx)
    }
}

/// Pass applying a per-function transform to every function of a module.
///
/// The transform returns `None` (or an equal function) to leave a function
/// unchanged; unchanged functions are shared with the input module.
pub struct FunctionPass<F> {
    name: &'static str,
    process_func: F,
}

/// Build a [`FunctionPass`] from `process_func`.
///
/// ```
/// use kiln_transforms::{Pass, PassContext, function_pass};
/// use kiln_ir::IRModule;
///
/// let identity = function_pass("identity", |_func, _ctx| Ok(None));
/// let module = IRModule::new();
/// assert_eq!(identity.process_module(&module, &PassContext::default()).unwrap(), module);
/// ```
pub fn function_pass<F>(name: &'static str, process_func: F) -> FunctionPass<F>
where
    F: Fn(&Function, &PassContext) -> Result<Option<Function>>,
{
    FunctionPass { name, process_func }
}

impl<F> FunctionPass<F>
where
    F: Fn(&Function, &PassContext) -> Result<Option<Function>>,
{
    pub fn process_func(&self, func: &Function, ctx: &PassContext) -> Result<Option<Function>> {
        (self.process_func)(func, ctx)
    }
}

impl<F> Pass for FunctionPass<F>
where
    F: Fn(&Function, &PassContext) -> Result<Option<Function>>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process_module(&self, module: &IRModule, ctx: &PassContext) -> Result<IRModule> {
        run_per_function(self.name, module, |func| (self.process_func)(func, ctx))
    }
}

/// Apply `f` to every function of `module` and reassemble the result.
pub fn run_per_function<F>(pass: &'static str, module: &IRModule, mut f: F) -> Result<IRModule>
where
    F: FnMut(&Function) -> Result<Option<Function>>,
{
    let mut changed = 0usize;
    let out = module.try_map_functions(|func| {
        let updated = f(func)?;
        if let Some(new) = &updated
            && new != func
        {
            changed += 1;
            tracing::debug!(pass, func = func.name(), "function updated");
        }
        Ok(updated)
    })?;
    tracing::debug!(pass, changed, total = module.len(), "pass finished");
    Ok(out)
}
