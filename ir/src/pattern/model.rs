//! Pattern trees.
//!
//! A [`Pattern`] mirrors the shape of an [`Expr`] and adds three wildcard
//! kinds: [`PatternKind::AnyExpr`], [`PatternKind::Union`] and
//! [`PatternKind::TensorComputeShape`]. Plain expression variables embedded
//! in a pattern act as binding sites.
//!
//! # Example
//!
//! ```
//! use kiln_ir::{DType, Expr, Pattern};
//!
//! let (a, b) = (Expr::var("a", DType::Int32), Expr::var("b", DType::Int32));
//! // Match `a + b` where `a` and `b` bind to arbitrary sub-expressions.
//! let pat = Pattern::add(&a, &b);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_dtype::DType;

use crate::expr::{Expr, ExprKind, ExprList};
use crate::types::{BinaryOp, ConstValue, ReduceKind};

static PATTERN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_pattern_id() -> u64 {
    PATTERN_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Dynamic-kind constraint for [`PatternKind::AnyExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprFilter {
    Var,
    Const,
    /// Constant with an integral value and integer dtype.
    ConstInt,
    /// Binary expression of exactly this operation.
    Binary(BinaryOp),
    /// Binary expression of any operation.
    AnyBinary,
    Cast,
    TensorCompute,
    Reduce,
    Call,
}

impl ExprFilter {
    /// Check whether `expr` is of the kind this filter admits.
    pub fn admits(&self, expr: &Expr) -> bool {
        match (self, expr.kind()) {
            (Self::Var, ExprKind::Var { .. }) => true,
            (Self::Const, ExprKind::Const { .. }) => true,
            (Self::ConstInt, ExprKind::Const { value, dtype }) => value.is_int() && dtype.is_int(),
            (Self::Binary(want), ExprKind::Binary { op, .. }) => want == op,
            (Self::AnyBinary, ExprKind::Binary { .. }) => true,
            (Self::Cast, ExprKind::Cast { .. }) => true,
            (Self::TensorCompute, ExprKind::TensorCompute { .. }) => true,
            (Self::Reduce, ExprKind::Reduce { .. }) => true,
            (Self::Call, ExprKind::Call { .. }) => true,
            _ => false,
        }
    }
}

/// Pattern node kinds.
#[derive(Debug, Clone, strum::IntoStaticStr)]
pub enum PatternKind {
    /// Pattern variable: binds the target, or must equal its earlier binding.
    Var(Arc<Expr>),
    /// Literal constant, compared by value.
    Const(ConstValue),
    Binary { op: BinaryOp, lhs: Arc<Pattern>, rhs: Arc<Pattern> },
    Cast { src: Arc<Pattern>, dtype: DType },
    /// Tensor-compute destructurer: axis patterns plus a value pattern written
    /// in terms of `indices`, which are seeded to the target's index variables.
    Compute { axes: Vec<Arc<Pattern>>, indices: ExprList, value: Arc<Pattern> },
    Reduce { kind: ReduceKind, extents: Vec<Arc<Pattern>>, indices: ExprList, value: Arc<Pattern> },
    Call { func: String, args: Vec<Arc<Pattern>> },
    /// Matches any expression, optionally of one dynamic kind only.
    AnyExpr { filter: Option<ExprFilter> },
    /// First matching alternative, in listed order, wins.
    Union(Vec<Arc<Pattern>>),
    /// Admissibility filter over tensor-compute targets; binds nothing below itself.
    TensorComputeShape { rank: Option<usize>, allow_dynamic_axis: bool },
}

/// Immutable pattern node.
#[derive(Debug)]
pub struct Pattern {
    id: u64,
    kind: PatternKind,
}

/// Key of a [`Binding`](crate::Binding) entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingKey {
    /// Expression variable used as a pattern variable, by expression id.
    Var(u64),
    /// Wildcard, union or tensor-compute pattern node, by pattern id.
    Pattern(u64),
}

/// Conversion into a pattern.
///
/// Expressions are lifted structurally with [`Pattern::from_expr`]; integers
/// become literal constants.
pub trait IntoPattern {
    fn into_pattern(self) -> Arc<Pattern>;
}

impl IntoPattern for Arc<Pattern> {
    fn into_pattern(self) -> Arc<Pattern> {
        self
    }
}

impl IntoPattern for &Arc<Pattern> {
    fn into_pattern(self) -> Arc<Pattern> {
        self.clone()
    }
}

impl IntoPattern for Arc<Expr> {
    fn into_pattern(self) -> Arc<Pattern> {
        Pattern::from_expr(&self)
    }
}

impl IntoPattern for &Arc<Expr> {
    fn into_pattern(self) -> Arc<Pattern> {
        Pattern::from_expr(self)
    }
}

impl IntoPattern for i64 {
    fn into_pattern(self) -> Arc<Pattern> {
        Pattern::int(self)
    }
}

impl IntoPattern for i32 {
    fn into_pattern(self) -> Arc<Pattern> {
        Pattern::int(self as i64)
    }
}

fn patterns<I>(items: I) -> Vec<Arc<Pattern>>
where
    I: IntoIterator,
    I::Item: IntoPattern,
{
    items.into_iter().map(IntoPattern::into_pattern).collect()
}

fn fresh_indices(rank: usize) -> ExprList {
    (0..rank).map(|k| Expr::var(format!("p{k}"), DType::Index)).collect()
}

impl Pattern {
    fn new(kind: PatternKind) -> Arc<Self> {
        Arc::new(Self { id: next_pattern_id(), kind })
    }

    /// Pattern variable bound to whatever `var` is matched against.
    pub fn var(var: &Arc<Expr>) -> Arc<Self> {
        Self::new(PatternKind::Var(var.clone()))
    }

    pub fn constant(value: ConstValue) -> Arc<Self> {
        Self::new(PatternKind::Const(value))
    }

    pub fn int(value: i64) -> Arc<Self> {
        Self::constant(ConstValue::Int(value))
    }

    pub fn binary(op: BinaryOp, lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::new(PatternKind::Binary { op, lhs: lhs.into_pattern(), rhs: rhs.into_pattern() })
    }

    pub fn add(lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn modulo(lhs: impl IntoPattern, rhs: impl IntoPattern) -> Arc<Self> {
        Self::binary(BinaryOp::Mod, lhs, rhs)
    }

    pub fn cast(src: impl IntoPattern, dtype: DType) -> Arc<Self> {
        Self::new(PatternKind::Cast { src: src.into_pattern(), dtype })
    }

    pub fn call<A>(func: impl Into<String>, args: A) -> Arc<Self>
    where
        A: IntoIterator,
        A::Item: IntoPattern,
    {
        Self::new(PatternKind::Call { func: func.into(), args: patterns(args) })
    }

    /// Wildcard matching any expression.
    pub fn any() -> Arc<Self> {
        Self::new(PatternKind::AnyExpr { filter: None })
    }

    /// Wildcard matching expressions admitted by `filter`.
    pub fn any_of(filter: ExprFilter) -> Arc<Self> {
        Self::new(PatternKind::AnyExpr { filter: Some(filter) })
    }

    /// Wildcard matching any integer constant.
    pub fn any_const_int() -> Arc<Self> {
        Self::any_of(ExprFilter::ConstInt)
    }

    pub fn union<A>(alternatives: A) -> Arc<Self>
    where
        A: IntoIterator,
        A::Item: IntoPattern,
    {
        Self::new(PatternKind::Union(patterns(alternatives)))
    }

    /// Coarse tensor-compute filter.
    ///
    /// `rank` (when given) must equal the target's axis count; with
    /// `allow_dynamic_axis == false` every target axis must be a constant.
    pub fn tensor_compute(rank: Option<usize>, allow_dynamic_axis: bool) -> Arc<Self> {
        Self::new(PatternKind::TensorComputeShape { rank, allow_dynamic_axis })
    }

    /// Tensor-compute destructurer.
    ///
    /// `fvalue` receives one index variable per axis and returns the value
    /// pattern. During matching those variables are pre-bound to the target's
    /// index variables.
    pub fn compute<S, F>(axes: S, fvalue: F) -> Arc<Self>
    where
        S: IntoIterator,
        S::Item: IntoPattern,
        F: FnOnce(&[Arc<Expr>]) -> Arc<Pattern>,
    {
        let axes = patterns(axes);
        let indices = fresh_indices(axes.len());
        let value = fvalue(&indices);
        Self::new(PatternKind::Compute { axes, indices, value })
    }

    /// Reduce destructurer; see [`Pattern::compute`].
    pub fn reduce<S, F>(kind: ReduceKind, extents: S, fvalue: F) -> Arc<Self>
    where
        S: IntoIterator,
        S::Item: IntoPattern,
        F: FnOnce(&[Arc<Expr>]) -> Arc<Pattern>,
    {
        let extents = patterns(extents);
        let indices = fresh_indices(extents.len());
        let value = fvalue(&indices);
        Self::new(PatternKind::Reduce { kind, extents, indices, value })
    }

    /// Lift an expression into its structurally congruent pattern.
    ///
    /// Vars become pattern variables, constants become literals, and every
    /// other node becomes the pattern of the same kind. Compute and reduce
    /// nodes keep their own index variables as the seeded pattern indices.
    /// Shared sub-expressions are lifted once.
    pub fn from_expr(expr: &Arc<Expr>) -> Arc<Self> {
        let mut lifted: HashMap<u64, Arc<Pattern>> = HashMap::new();
        for node in expr.toposort() {
            let sub = |e: &Arc<Expr>| lifted[&e.id()].clone();
            let subs = |es: &[Arc<Expr>]| es.iter().map(sub).collect::<Vec<_>>();
            let pattern = match node.kind() {
                ExprKind::Var { .. } => Self::var(&node),
                ExprKind::Const { value, .. } => Self::constant(*value),
                ExprKind::Binary { op, lhs, rhs } => Self::binary(*op, sub(lhs), sub(rhs)),
                ExprKind::Cast { src, dtype } => Self::cast(sub(src), *dtype),
                ExprKind::TensorCompute { axes, indices, value, .. } => Self::new(PatternKind::Compute {
                    axes: subs(axes),
                    indices: indices.clone(),
                    value: sub(value),
                }),
                ExprKind::Reduce { kind, extents, indices, value, .. } => Self::new(PatternKind::Reduce {
                    kind: *kind,
                    extents: subs(extents),
                    indices: indices.clone(),
                    value: sub(value),
                }),
                ExprKind::Call { func, args, .. } => Self::new(PatternKind::Call { func: func.clone(), args: subs(args) }),
            };
            lifted.insert(node.id(), pattern);
        }
        lifted.remove(&expr.id()).unwrap_or_else(Self::any)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    /// Name of the node kind, e.g. `"Union"`.
    pub fn kind_name(&self) -> &'static str {
        (&self.kind).into()
    }

    /// Key under which a match records this node.
    pub fn binding_key(&self) -> BindingKey {
        match &self.kind {
            PatternKind::Var(var) => BindingKey::Var(var.id()),
            _ => BindingKey::Pattern(self.id),
        }
    }

    /// Axis patterns of a compute destructurer.
    pub fn axes(&self) -> Option<&[Arc<Pattern>]> {
        match &self.kind {
            PatternKind::Compute { axes, .. } => Some(axes),
            _ => None,
        }
    }
}

impl PatternKind {
    /// Move the child patterns into `out`, leaving a leaf.
    fn take_children(&mut self, out: &mut Vec<Arc<Pattern>>) {
        match std::mem::replace(self, PatternKind::AnyExpr { filter: None }) {
            PatternKind::Binary { lhs, rhs, .. } => out.extend([lhs, rhs]),
            PatternKind::Cast { src, .. } => out.push(src),
            PatternKind::Compute { axes, value, .. } | PatternKind::Reduce { extents: axes, value, .. } => {
                out.extend(axes);
                out.push(value);
            }
            PatternKind::Call { args, .. } => out.extend(args),
            PatternKind::Union(alternatives) => out.extend(alternatives),
            PatternKind::Var(_)
            | PatternKind::Const(_)
            | PatternKind::AnyExpr { .. }
            | PatternKind::TensorComputeShape { .. } => {}
        }
    }
}

impl Drop for Pattern {
    /// Iterative teardown, mirroring [`Expr`]'s.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.kind.take_children(&mut pending);
        while let Some(child) = pending.pop() {
            if let Some(mut pattern) = Arc::into_inner(child) {
                pattern.kind.take_children(&mut pending);
            }
        }
    }
}
