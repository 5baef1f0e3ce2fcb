//! Structural unification of patterns against expressions.
//!
//! # Algorithm
//!
//! Matching walks the pattern and target trees in lockstep on an explicit
//! work-stack, so tree depth is not limited by the native stack:
//!
//! - Literal nodes (`Binary`, `Cast`, `Call`, `Const`) require the target to be
//!   of the same kind and recurse positionally into children.
//! - Pattern variables bind the target, or must equal their earlier binding.
//! - `AnyExpr` binds itself after checking its optional kind filter.
//! - `Union` tries its alternatives in order on a copy of the binding; the
//!   first success is kept and the union binds itself. This is the only
//!   point where the matcher backtracks.
//! - `TensorComputeShape` checks rank and axis concreteness only.
//! - `Compute`/`Reduce` destructurers check arity, seed their index variables
//!   to the target's and then match axes and value.
//!
//! Matching is deterministic: the same pattern and target always produce
//! the same binding (in the same order) or the same mismatch.

use std::sync::Arc;

use kiln_dtype::DType;
use snafu::{Snafu, ensure};

use super::binding::Binding;
use super::model::{BindingKey, ExprFilter, Pattern, PatternKind};
use crate::expr::{Expr, ExprKind};
use crate::types::ConstValue;

/// Maximum nesting of `Union` patterns along one path.
pub const MAX_UNION_DEPTH: usize = 256;

/// Why a pattern did not match.
///
/// Mismatches are ordinary results, not failures of the compiler.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Mismatch {
    #[snafu(display("expected {expected} node, found {found}"))]
    KindMismatch { expected: &'static str, found: &'static str },

    #[snafu(display("expected {expected} operation, found {found}"))]
    OpMismatch { expected: &'static str, found: &'static str },

    #[snafu(display("expected constant {expected}, found {found}"))]
    ConstMismatch { expected: ConstValue, found: ConstValue },

    #[snafu(display("expected cast to {expected}, found cast to {found}"))]
    CastMismatch { expected: DType, found: DType },

    #[snafu(display("{key:?} is bound to {existing}, cannot rebind to {target}"))]
    BindingConflict { key: BindingKey, existing: Arc<Expr>, target: Arc<Expr> },

    #[snafu(display("expected {expected} operands, found {found}"))]
    ArityMismatch { expected: usize, found: usize },

    #[snafu(display("expected rank {expected}, found {found}"))]
    RankMismatch { expected: usize, found: usize },

    #[snafu(display("axis {axis} is not a constant"))]
    DynamicAxis { axis: usize },

    #[snafu(display("filter {filter:?} rejects {found} node"))]
    FilterRejected { filter: ExprFilter, found: &'static str },

    #[snafu(display("none of {count} alternatives matched"))]
    NoAlternative { count: usize },

    #[snafu(display("expected call to {expected:?}, found call to {found:?}"))]
    CallTargetMismatch { expected: String, found: String },

    #[snafu(display("union nesting exceeds {limit}"))]
    DepthExceeded { limit: usize },
}

/// Match `pattern` against `target`.
///
/// Returns the binding on success and `None` otherwise. The reason for a
/// failed match is logged at trace level; use [`try_match`] to inspect it.
pub fn match_pattern(pattern: &Pattern, target: &Arc<Expr>) -> Option<Binding> {
    match try_match(pattern, target) {
        Ok(binding) => Some(binding),
        Err(reason) => {
            tracing::trace!(pattern.id = pattern.id(), target.id = target.id(), %reason, "no match");
            None
        }
    }
}

/// Match `pattern` against `target`, reporting why a match failed.
pub fn try_match(pattern: &Pattern, target: &Arc<Expr>) -> Result<Binding, Mismatch> {
    let mut binding = Binding::new();
    unify(pattern, target, &mut binding, 0)?;
    Ok(binding)
}

impl Pattern {
    /// Shorthand for [`match_pattern`].
    pub fn match_expr(&self, target: &Arc<Expr>) -> Option<Binding> {
        match_pattern(self, target)
    }
}

fn kind_mismatch<T>(pattern: &Pattern, target: &Expr) -> Result<T, Mismatch> {
    KindMismatchSnafu { expected: pattern.kind_name(), found: target.kind_name() }.fail()
}

/// Bind each pattern index variable to the target's index variable at the same position.
fn seed_indices(pattern: &[Arc<Expr>], target: &[Arc<Expr>], binding: &mut Binding) -> Result<(), Mismatch> {
    for (p, t) in pattern.iter().zip(target) {
        binding.bind(BindingKey::Var(p.id()), t)?;
    }
    Ok(())
}

/// Record a destructurer's match at `pat`, returning `true` when it was already
/// matched, in which case the new target must equal the first one.
///
/// A second occurrence must not be destructured again: its index variables
/// are already seeded from the first target.
fn reused(pat: &Pattern, tgt: &Arc<Expr>, binding: &mut Binding) -> Result<bool, Mismatch> {
    let seen = binding.contains(pat.binding_key());
    binding.bind(pat.binding_key(), tgt)?;
    Ok(seen)
}

fn unify<'a>(
    pattern: &'a Pattern,
    target: &'a Arc<Expr>,
    binding: &mut Binding,
    union_depth: usize,
) -> Result<(), Mismatch> {
    let mut stack: Vec<(&'a Pattern, &'a Arc<Expr>)> = vec![(pattern, target)];

    while let Some((pat, tgt)) = stack.pop() {
        match pat.kind() {
            PatternKind::Var(var) => binding.bind(BindingKey::Var(var.id()), tgt)?,

            PatternKind::Const(expected) => {
                let ExprKind::Const { value, .. } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(value == expected, ConstMismatchSnafu { expected: *expected, found: *value });
            }

            PatternKind::Binary { op, lhs, rhs } => {
                let ExprKind::Binary { op: found, lhs: tl, rhs: tr } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(op == found, OpMismatchSnafu { expected: <&str>::from(op), found: <&str>::from(found) });
                stack.push((rhs.as_ref(), tr));
                stack.push((lhs.as_ref(), tl));
            }

            PatternKind::Cast { src, dtype } => {
                let ExprKind::Cast { src: ts, dtype: found } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(dtype == found, CastMismatchSnafu { expected: *dtype, found: *found });
                stack.push((src.as_ref(), ts));
            }

            PatternKind::Call { func, args } => {
                let ExprKind::Call { func: found, args: targs, .. } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(func == found, CallTargetMismatchSnafu { expected: func.as_str(), found: found.as_str() });
                ensure!(args.len() == targs.len(), ArityMismatchSnafu { expected: args.len(), found: targs.len() });
                stack.extend(args.iter().zip(targs).rev().map(|(p, t)| (p.as_ref(), t)));
            }

            PatternKind::Compute { axes, indices, value } => {
                let ExprKind::TensorCompute { axes: taxes, indices: tindices, value: tvalue, .. } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(axes.len() == taxes.len(), ArityMismatchSnafu { expected: axes.len(), found: taxes.len() });
                if reused(pat, tgt, binding)? {
                    continue;
                }
                seed_indices(indices, tindices, binding)?;
                stack.push((value.as_ref(), tvalue));
                stack.extend(axes.iter().zip(taxes).rev().map(|(p, t)| (p.as_ref(), t)));
            }

            PatternKind::Reduce { kind, extents, indices, value } => {
                let ExprKind::Reduce { kind: found, extents: textents, indices: tindices, value: tvalue, .. } =
                    tgt.kind()
                else {
                    return kind_mismatch(pat, tgt);
                };
                ensure!(kind == found, OpMismatchSnafu { expected: <&str>::from(kind), found: <&str>::from(found) });
                ensure!(
                    extents.len() == textents.len(),
                    ArityMismatchSnafu { expected: extents.len(), found: textents.len() }
                );
                if reused(pat, tgt, binding)? {
                    continue;
                }
                seed_indices(indices, tindices, binding)?;
                stack.push((value.as_ref(), tvalue));
                stack.extend(extents.iter().zip(textents).rev().map(|(p, t)| (p.as_ref(), t)));
            }

            PatternKind::AnyExpr { filter } => {
                if let Some(filter) = filter {
                    ensure!(filter.admits(tgt), FilterRejectedSnafu { filter: *filter, found: tgt.kind_name() });
                }
                binding.bind(pat.binding_key(), tgt)?;
            }

            PatternKind::Union(alternatives) => {
                ensure!(union_depth < MAX_UNION_DEPTH, DepthExceededSnafu { limit: MAX_UNION_DEPTH });
                let chosen = alternatives.iter().find_map(|alt| {
                    let mut trial = binding.clone();
                    unify(alt, tgt, &mut trial, union_depth + 1).ok().map(|()| trial)
                });
                let Some(trial) = chosen else {
                    return NoAlternativeSnafu { count: alternatives.len() }.fail();
                };
                *binding = trial;
                binding.bind(pat.binding_key(), tgt)?;
            }

            PatternKind::TensorComputeShape { rank, allow_dynamic_axis } => {
                let ExprKind::TensorCompute { axes, .. } = tgt.kind() else {
                    return kind_mismatch(pat, tgt);
                };
                if let Some(rank) = rank {
                    ensure!(axes.len() == *rank, RankMismatchSnafu { expected: *rank, found: axes.len() });
                }
                if !allow_dynamic_axis && let Some(axis) = axes.iter().position(|a| !a.is_const()) {
                    return DynamicAxisSnafu { axis }.fail();
                }
                binding.bind(pat.binding_key(), tgt)?;
            }
        }
    }
    Ok(())
}
