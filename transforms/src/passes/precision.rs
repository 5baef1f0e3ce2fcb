//! Narrow intermediate tensor values to the context's `precision`.
//!
//! The root tensor of a function body keeps its dtype, so callers still see
//! the declared result type.

use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{Expr, ExprFilter, ExprKind, Function, Pattern};
use smallvec::SmallVec;

use crate::context::PassContext;
use crate::error::Result;
use crate::pass::{FunctionPass, function_pass};
use crate::rewrite::{RewriteRule, RuleSet, rewrite_bottom_up};

pub const NAME: &str = "convert_precision";

/// True when values of `dtype` should be cast down to `precision`.
pub fn narrows(dtype: DType, precision: DType) -> bool {
    dtype.is_float() && dtype.bytes() > precision.bytes()
}

fn narrow_compute(precision: DType) -> RewriteRule {
    RewriteRule::new("narrow_compute", Pattern::any_of(ExprFilter::TensorCompute), move |_, node| {
        let ExprKind::TensorCompute { axes, value, .. } = node.kind() else {
            return None;
        };
        if !narrows(value.dtype(), precision) {
            return None;
        }
        let children: SmallVec<[Arc<Expr>; 4]> =
            axes.iter().cloned().chain(std::iter::once(Expr::cast(value, precision))).collect();
        Some(node.with_children(&children))
    })
}

/// Narrow every tensor-compute node of `body` except `body` itself.
///
/// The result keeps the dtype of `body`: a value whose type changed because
/// its operands were narrowed is cast back.
pub fn convert_body(body: &Arc<Expr>, precision: DType) -> Result<Arc<Expr>> {
    let rules = RuleSet::new(vec![narrow_compute(precision)]);
    let ExprKind::TensorCompute { axes, value, .. } = body.kind() else {
        let out = rewrite_bottom_up(&rules, body)?;
        return Ok(restore_dtype(out, body.dtype()));
    };
    let mut children = axes.iter().map(|axis| rewrite_bottom_up(&rules, axis)).collect::<Result<SmallVec<[_; 4]>>>()?;
    children.push(restore_dtype(rewrite_bottom_up(&rules, value)?, value.dtype()));
    Ok(body.with_children(&children))
}

fn restore_dtype(expr: Arc<Expr>, dtype: DType) -> Arc<Expr> {
    if expr.dtype() == dtype { expr } else { Expr::cast(expr, dtype) }
}

pub fn convert_precision() -> FunctionPass<impl Fn(&Function, &PassContext) -> Result<Option<Function>> + Send + Sync> {
    function_pass(NAME, |func, ctx| {
        let Some(precision) = ctx.precision() else {
            return Ok(None);
        };
        if !precision.is_float() {
            tracing::warn!(pass = NAME, %precision, "precision is not a float type; skipping");
            return Ok(None);
        }
        let body = convert_body(func.body(), precision)?;
        Ok((!Arc::ptr_eq(&body, func.body())).then(|| func.with_body(body)))
    })
}
