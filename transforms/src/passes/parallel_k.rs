//! Choose how kernel reductions are split along an extra parallel axis.
//!
//! The decision is recorded as function attributes for the scheduler:
//!
//! | mode       | `parallel_k`     | `parallel_k_candidates` |
//! |------------|------------------|-------------------------|
//! | `disabled` | `1`              | -                       |
//! | `default`  | heuristic factor | -                       |
//! | `search`   | `1`              | `1` and every factor    |

use kiln_ir::{AttrValue, ExprKind, Function, ReduceKind};

use crate::context::{ParallelK, PassContext};
use crate::error::Result;
use crate::pass::{FunctionPass, function_pass};

pub const NAME: &str = "parallel_k";

pub const PARALLEL_K: &str = "parallel_k";
pub const PARALLEL_K_CANDIDATES: &str = "parallel_k_candidates";

/// Split factors considered, largest first.
pub const SPLIT_FACTORS: [i64; 4] = [16, 8, 4, 2];

/// Smallest per-split reduction length worth keeping.
pub const MIN_SPLIT_EXTENT: i64 = 64;

/// Total extent of the first `Sum` reduction with concrete extents.
pub fn reduction_extent(func: &Function) -> Option<i64> {
    func.body().toposort().iter().find_map(|node| match node.kind() {
        ExprKind::Reduce { kind: ReduceKind::Sum, extents, .. } => {
            extents.iter().try_fold(1i64, |acc, e| e.as_const()?.as_i64().and_then(|v| acc.checked_mul(v)))
        }
        _ => None,
    })
}

/// Factors of [`SPLIT_FACTORS`] that leave at least [`MIN_SPLIT_EXTENT`] per split, ascending.
pub fn split_candidates(extent: i64) -> Vec<i64> {
    SPLIT_FACTORS.iter().rev().copied().filter(|&f| extent % f == 0 && extent / f >= MIN_SPLIT_EXTENT).collect()
}

fn decide(mode: ParallelK, extent: i64) -> Vec<(String, AttrValue)> {
    match mode {
        ParallelK::Disabled => vec![(PARALLEL_K.to_string(), AttrValue::Int(1))],
        ParallelK::Default => {
            let factor = split_candidates(extent).last().copied().unwrap_or(1);
            vec![(PARALLEL_K.to_string(), AttrValue::Int(factor))]
        }
        ParallelK::Search => {
            let candidates = std::iter::once(1).chain(split_candidates(extent)).collect::<Vec<_>>();
            vec![
                (PARALLEL_K.to_string(), AttrValue::Int(1)),
                (PARALLEL_K_CANDIDATES.to_string(), AttrValue::IntList(candidates)),
            ]
        }
    }
}

pub fn parallel_k() -> FunctionPass<impl Fn(&Function, &PassContext) -> Result<Option<Function>> + Send + Sync> {
    function_pass(NAME, |func, ctx| {
        if !func.is_kernel() {
            return Ok(None);
        }
        let Some(extent) = reduction_extent(func) else {
            return Ok(None);
        };
        let mode = ctx.parallel_k();
        tracing::debug!(pass = NAME, func = func.name(), extent, %mode, "splitting reduction");
        Ok(Some(func.with_merged_attrs(decide(mode, extent))))
    })
}
