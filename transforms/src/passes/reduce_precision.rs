//! Set the accumulator type of floating-point reductions.

use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{ExprFilter, ExprKind, Function, Pattern};

use crate::context::PassContext;
use crate::error::Result;
use crate::pass::{FunctionPass, function_pass};
use crate::rewrite::{RewriteRule, RuleSet, rewrite_bottom_up};

pub const NAME: &str = "reduce_precision";

fn retype_accumulator(dtype: DType) -> RewriteRule {
    RewriteRule::new("retype_accumulator", Pattern::any_of(ExprFilter::Reduce), move |_, node| {
        match node.kind() {
            ExprKind::Reduce { acc_dtype, .. } if acc_dtype.is_float() => Some(node.with_acc_dtype(dtype)),
            _ => None,
        }
    })
}

pub fn reduce_precision() -> FunctionPass<impl Fn(&Function, &PassContext) -> Result<Option<Function>> + Send + Sync> {
    function_pass(NAME, |func, ctx| {
        let Some(dtype) = ctx.reduce_precision() else {
            return Ok(None);
        };
        if !dtype.is_float() {
            tracing::warn!(pass = NAME, %dtype, "reduce precision is not a float type; skipping");
            return Ok(None);
        }
        let body = rewrite_bottom_up(&RuleSet::new(vec![retype_accumulator(dtype)]), func.body())?;
        Ok((!Arc::ptr_eq(&body, func.body())).then(|| func.with_body(body)))
    })
}
