//! Expression trees.
//!
//! [`Expr`] nodes are immutable and shared through `Arc<Expr>`. Every node
//! carries a process-unique `id`; only `Var` nodes use it for equality; all
//! other kinds compare structurally. Tensor-compute and reduce nodes own the
//! index variables their value is written in, and two such nodes compare
//! equal when their values agree up to renaming of those indices.
//!
//! # Example
//!
//! ```
//! use kiln_ir::Expr;
//!
//! let c = Expr::compute("C", [10, 10], |i| Expr::add(&i[0], &i[1]));
//! assert_eq!(c.rank(), Some(2));
//! ```

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_dtype::DType;
use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{DTypeMismatchSnafu, Result};
use crate::types::{BinaryOp, ConstValue, ReduceKind};

/// Child list for expression nodes. Most nodes have at most four children.
pub type ExprList = SmallVec<[Arc<Expr>; 4]>;

// Monotonic ids, never reused. Uniqueness is all that matters here, so
// relaxed ordering is enough.
static EXPR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_expr_id() -> u64 {
    EXPR_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Expression node kinds.
#[derive(Debug, Clone, strum::IntoStaticStr)]
pub enum ExprKind {
    /// Named variable. Identity matters: two vars are equal only if they are the same node.
    Var { name: String, dtype: DType },
    Const { value: ConstValue, dtype: DType },
    Binary { op: BinaryOp, lhs: Arc<Expr>, rhs: Arc<Expr> },
    Cast { src: Arc<Expr>, dtype: DType },
    /// Tensor produced by evaluating `value` over the index space spanned by `axes`.
    ///
    /// `indices[k]` is the index variable ranging over `axes[k]`.
    TensorCompute { name: String, axes: ExprList, indices: ExprList, value: Arc<Expr> },
    /// Reduction of `value` over the index space spanned by `extents`.
    Reduce { kind: ReduceKind, extents: ExprList, indices: ExprList, value: Arc<Expr>, acc_dtype: DType },
    /// Call of another function in the module.
    Call { func: String, args: ExprList, ret_dtype: DType },
}

/// Immutable expression node.
#[derive(derive_more::Debug)]
pub struct Expr {
    id: u64,
    kind: ExprKind,
    dtype: DType,
    /// Structural hash, computed once at construction from the children's hashes.
    #[debug(skip)]
    hash: u64,
}

/// Conversion into an expression, used by constructors that accept shapes or operands.
pub trait IntoExpr {
    fn into_expr(self) -> Arc<Expr>;
}

impl IntoExpr for Arc<Expr> {
    fn into_expr(self) -> Arc<Expr> {
        self
    }
}

impl IntoExpr for &Arc<Expr> {
    fn into_expr(self) -> Arc<Expr> {
        self.clone()
    }
}

macro_rules! impl_into_expr_int {
    ($($ty:ty),* $(,)?) => {
        $(impl IntoExpr for $ty {
            fn into_expr(self) -> Arc<Expr> {
                Expr::int(self as i64)
            }
        })*
    };
}

impl_into_expr_int!(i32, i64, usize);

impl IntoExpr for f32 {
    fn into_expr(self) -> Arc<Expr> {
        Expr::constant(ConstValue::Float(self as f64), DType::Float32)
    }
}

impl IntoExpr for f64 {
    fn into_expr(self) -> Arc<Expr> {
        Expr::constant(ConstValue::Float(self), DType::Float64)
    }
}

fn child_hash(state: &mut DefaultHasher, children: &[Arc<Expr>]) {
    children.len().hash(state);
    for child in children {
        child.hash.hash(state);
    }
}

/// Structural hash of a node kind.
///
/// Vars hash by name and dtype, not id, so that index variables of
/// alpha-equivalent computes (which the constructors name by position)
/// hash the same. Compute names are not part of structural identity.
fn content_hash(kind: &ExprKind, dtype: DType) -> u64 {
    let mut state = DefaultHasher::new();
    discriminant(kind).hash(&mut state);
    dtype.hash(&mut state);
    match kind {
        ExprKind::Var { name, .. } => name.hash(&mut state),
        ExprKind::Const { value, .. } => value.hash(&mut state),
        ExprKind::Binary { op, lhs, rhs } => {
            op.hash(&mut state);
            lhs.hash.hash(&mut state);
            rhs.hash.hash(&mut state);
        }
        ExprKind::Cast { src, .. } => src.hash.hash(&mut state),
        ExprKind::TensorCompute { axes, indices, value, .. } => {
            child_hash(&mut state, axes);
            child_hash(&mut state, indices);
            value.hash.hash(&mut state);
        }
        ExprKind::Reduce { kind, extents, indices, value, acc_dtype } => {
            kind.hash(&mut state);
            acc_dtype.hash(&mut state);
            child_hash(&mut state, extents);
            child_hash(&mut state, indices);
            value.hash.hash(&mut state);
        }
        ExprKind::Call { func, args, .. } => {
            func.hash(&mut state);
            child_hash(&mut state, args);
        }
    }
    state.finish()
}

fn binary_dtype(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Option<DType> {
    if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
        return Some(DType::Bool);
    }
    lhs.dtype.least_upper_dtype(rhs.dtype)
}

fn fresh_indices(rank: usize) -> ExprList {
    (0..rank).map(|k| Expr::var(format!("i{k}"), DType::Index)).collect()
}

impl Expr {
    fn new(kind: ExprKind) -> Arc<Self> {
        let dtype = match &kind {
            ExprKind::Var { dtype, .. } | ExprKind::Const { dtype, .. } | ExprKind::Cast { dtype, .. } => *dtype,
            ExprKind::Binary { op, lhs, rhs } => binary_dtype(*op, lhs, rhs).unwrap_or(lhs.dtype),
            ExprKind::TensorCompute { value, .. } | ExprKind::Reduce { value, .. } => value.dtype,
            ExprKind::Call { ret_dtype, .. } => *ret_dtype,
        };
        let hash = content_hash(&kind, dtype);
        Arc::new(Self { id: next_expr_id(), kind, dtype, hash })
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn var(name: impl Into<String>, dtype: DType) -> Arc<Self> {
        Self::new(ExprKind::Var { name: name.into(), dtype })
    }

    /// Scalar `Index` variable, the type of symbolic axis extents.
    pub fn index_var(name: impl Into<String>) -> Arc<Self> {
        Self::var(name, DType::Index)
    }

    pub fn constant(value: ConstValue, dtype: DType) -> Arc<Self> {
        Self::new(ExprKind::Const { value, dtype })
    }

    /// `int32` constant.
    pub fn int(value: i64) -> Arc<Self> {
        Self::constant(ConstValue::Int(value), DType::Int32)
    }

    /// `float32` constant.
    pub fn float(value: f64) -> Arc<Self> {
        Self::constant(ConstValue::Float(value), DType::Float32)
    }

    pub fn bool_(value: bool) -> Arc<Self> {
        Self::constant(ConstValue::Bool(value), DType::Bool)
    }

    /// Binary operation. The result dtype is the promoted operand dtype, or
    /// the left operand's dtype when the operands have no common type.
    pub fn binary(op: BinaryOp, lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::new(ExprKind::Binary { op, lhs: lhs.into_expr(), rhs: rhs.into_expr() })
    }

    /// Binary operation that rejects operands without a common dtype.
    pub fn try_binary(op: BinaryOp, lhs: impl IntoExpr, rhs: impl IntoExpr) -> Result<Arc<Self>> {
        let (lhs, rhs) = (lhs.into_expr(), rhs.into_expr());
        ensure!(binary_dtype(op, &lhs, &rhs).is_some(), DTypeMismatchSnafu { op, lhs: lhs.dtype, rhs: rhs.dtype });
        Ok(Self::new(ExprKind::Binary { op, lhs, rhs }))
    }

    pub fn add(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn modulo(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Mod, lhs, rhs)
    }

    pub fn max(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Max, lhs, rhs)
    }

    pub fn min(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Min, lhs, rhs)
    }

    pub fn lt(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Arc<Self> {
        Self::binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn cast(src: impl IntoExpr, dtype: DType) -> Arc<Self> {
        Self::new(ExprKind::Cast { src: src.into_expr(), dtype })
    }

    /// Tensor-compute node over `shape`.
    ///
    /// `fcompute` receives one fresh `Index` variable per axis and returns the
    /// element value written in terms of them.
    pub fn compute<S, F>(name: impl Into<String>, shape: S, fcompute: F) -> Arc<Self>
    where
        S: IntoIterator,
        S::Item: IntoExpr,
        F: FnOnce(&[Arc<Expr>]) -> Arc<Expr>,
    {
        let axes: ExprList = shape.into_iter().map(IntoExpr::into_expr).collect();
        let indices = fresh_indices(axes.len());
        let value = fcompute(&indices);
        Self::new(ExprKind::TensorCompute { name: name.into(), axes, indices, value })
    }

    /// Reduction over `shape`. The accumulator dtype defaults to the value dtype.
    pub fn reduce<S, F>(kind: ReduceKind, shape: S, acc_dtype: Option<DType>, fcompute: F) -> Arc<Self>
    where
        S: IntoIterator,
        S::Item: IntoExpr,
        F: FnOnce(&[Arc<Expr>]) -> Arc<Expr>,
    {
        let extents: ExprList = shape.into_iter().map(IntoExpr::into_expr).collect();
        let indices = fresh_indices(extents.len());
        let value = fcompute(&indices);
        let acc_dtype = acc_dtype.unwrap_or(value.dtype);
        Self::new(ExprKind::Reduce { kind, extents, indices, value, acc_dtype })
    }

    pub fn call<A>(func: impl Into<String>, args: A, ret_dtype: DType) -> Arc<Self>
    where
        A: IntoIterator,
        A::Item: IntoExpr,
    {
        let args = args.into_iter().map(IntoExpr::into_expr).collect();
        Self::new(ExprKind::Call { func: func.into(), args, ret_dtype })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Name of the node kind, e.g. `"Binary"`.
    pub fn kind_name(&self) -> &'static str {
        (&self.kind).into()
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ExprKind::Var { .. })
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ExprKind::Const { .. })
    }

    pub fn as_const(&self) -> Option<ConstValue> {
        match self.kind {
            ExprKind::Const { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Axis extents of a tensor-compute node.
    pub fn axes(&self) -> Option<&[Arc<Expr>]> {
        match &self.kind {
            ExprKind::TensorCompute { axes, .. } => Some(axes),
            _ => None,
        }
    }

    /// Number of axes of a tensor-compute node.
    pub fn rank(&self) -> Option<usize> {
        self.axes().map(<[_]>::len)
    }

    /// Direct sub-expressions, in positional order.
    ///
    /// Index variables bound by compute and reduce nodes are not children;
    /// they only appear inside `value`.
    pub fn children(&self) -> SmallVec<[&Arc<Expr>; 4]> {
        match &self.kind {
            ExprKind::Var { .. } | ExprKind::Const { .. } => SmallVec::new(),
            ExprKind::Binary { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
            ExprKind::Cast { src, .. } => smallvec::smallvec![src],
            ExprKind::TensorCompute { axes, value, .. } => axes.iter().chain(std::iter::once(value)).collect(),
            ExprKind::Reduce { extents, value, .. } => extents.iter().chain(std::iter::once(value)).collect(),
            ExprKind::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Rebuild this node over new children, given in [`Expr::children`] order.
    ///
    /// Returns `self` unchanged when every child is the same node, and for
    /// leaves. Vars are never recreated, so their identity survives rewrites.
    pub fn with_children(self: &Arc<Self>, children: &[Arc<Expr>]) -> Arc<Self> {
        let old = self.children();
        if old.len() != children.len() || old.iter().zip(children).all(|(a, b)| Arc::ptr_eq(a, b)) {
            return self.clone();
        }
        let split = |n: usize| -> (ExprList, Arc<Expr>) {
            (children[..n].iter().cloned().collect(), children[n].clone())
        };
        let kind = match &self.kind {
            ExprKind::Var { .. } | ExprKind::Const { .. } => return self.clone(),
            ExprKind::Binary { op, .. } => {
                ExprKind::Binary { op: *op, lhs: children[0].clone(), rhs: children[1].clone() }
            }
            ExprKind::Cast { dtype, .. } => ExprKind::Cast { src: children[0].clone(), dtype: *dtype },
            ExprKind::TensorCompute { name, axes, indices, .. } => {
                let (axes, value) = split(axes.len());
                ExprKind::TensorCompute { name: name.clone(), axes, indices: indices.clone(), value }
            }
            ExprKind::Reduce { kind, extents, indices, acc_dtype, .. } => {
                let (extents, value) = split(extents.len());
                ExprKind::Reduce { kind: *kind, extents, indices: indices.clone(), value, acc_dtype: *acc_dtype }
            }
            ExprKind::Call { func, ret_dtype, .. } => {
                ExprKind::Call { func: func.clone(), args: children.iter().cloned().collect(), ret_dtype: *ret_dtype }
            }
        };
        Self::new(kind)
    }

    /// Rebuild a reduce node with a different accumulator dtype.
    pub fn with_acc_dtype(self: &Arc<Self>, dtype: DType) -> Arc<Self> {
        match &self.kind {
            ExprKind::Reduce { kind, extents, indices, value, acc_dtype } if *acc_dtype != dtype => {
                Self::new(ExprKind::Reduce {
                    kind: *kind,
                    extents: extents.clone(),
                    indices: indices.clone(),
                    value: value.clone(),
                    acc_dtype: dtype,
                })
            }
            _ => self.clone(),
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// All distinct nodes reachable from `self`, children before parents.
    ///
    /// Uses an explicit stack, so arbitrarily deep trees are safe.
    pub fn toposort(self: &Arc<Self>) -> Vec<Arc<Expr>> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![(self.clone(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                out.push(node);
                continue;
            }
            if !visited.insert(node.id) {
                continue;
            }
            stack.push((node.clone(), true));
            for child in node.children().into_iter().rev() {
                if !visited.contains(&child.id) {
                    stack.push((child.clone(), false));
                }
            }
        }
        out
    }

    /// Length of the longest root-to-leaf path, counting nodes.
    pub fn depth(self: &Arc<Self>) -> usize {
        let mut depths: HashMap<u64, usize> = HashMap::new();
        for node in self.toposort() {
            let d = 1 + node.children().iter().filter_map(|c| depths.get(&c.id)).copied().max().unwrap_or(0);
            depths.insert(node.id, d);
        }
        depths.get(&self.id).copied().unwrap_or(1)
    }

    /// Names of every function called anywhere inside this expression, in
    /// first-occurrence order.
    pub fn callees(self: &Arc<Self>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for node in self.toposort() {
            if let ExprKind::Call { func, .. } = &node.kind
                && !out.contains(func)
            {
                out.push(func.clone());
            }
        }
        out
    }
}

// =========================================================================
// Structural equality
// =========================================================================

impl PartialEq for Expr {
    /// Structural equality with var identity.
    ///
    /// Index variables bound by corresponding compute/reduce nodes are
    /// treated as equal. Runs on an explicit stack.
    fn eq(&self, other: &Self) -> bool {
        let mut renamed: Vec<(u64, u64)> = Vec::new();
        let mut stack: Vec<(&Expr, &Expr)> = vec![(self, other)];

        while let Some((a, b)) = stack.pop() {
            if a.id == b.id {
                continue;
            }
            if a.hash != b.hash || a.dtype != b.dtype {
                return false;
            }
            match (&a.kind, &b.kind) {
                (ExprKind::Var { .. }, ExprKind::Var { .. }) => {
                    if !renamed.contains(&(a.id, b.id)) {
                        return false;
                    }
                }
                (ExprKind::Const { value: va, .. }, ExprKind::Const { value: vb, .. }) => {
                    if va != vb {
                        return false;
                    }
                }
                (ExprKind::Binary { op: oa, lhs: la, rhs: ra }, ExprKind::Binary { op: ob, lhs: lb, rhs: rb }) => {
                    if oa != ob {
                        return false;
                    }
                    stack.push((ra.as_ref(), rb.as_ref()));
                    stack.push((la.as_ref(), lb.as_ref()));
                }
                (ExprKind::Cast { src: sa, .. }, ExprKind::Cast { src: sb, .. }) => stack.push((sa.as_ref(), sb.as_ref())),
                (
                    ExprKind::TensorCompute { axes: xa, indices: ia, value: va, .. },
                    ExprKind::TensorCompute { axes: xb, indices: ib, value: vb, .. },
                ) => {
                    if xa.len() != xb.len() || ia.len() != ib.len() {
                        return false;
                    }
                    renamed.extend(ia.iter().zip(ib.iter()).map(|(x, y)| (x.id, y.id)));
                    stack.push((va.as_ref(), vb.as_ref()));
                    stack.extend(xa.iter().zip(xb.iter()).map(|(x, y)| (x.as_ref(), y.as_ref())));
                }
                (
                    ExprKind::Reduce { kind: ka, extents: xa, indices: ia, value: va, acc_dtype: da },
                    ExprKind::Reduce { kind: kb, extents: xb, indices: ib, value: vb, acc_dtype: db },
                ) => {
                    if ka != kb || da != db || xa.len() != xb.len() || ia.len() != ib.len() {
                        return false;
                    }
                    renamed.extend(ia.iter().zip(ib.iter()).map(|(x, y)| (x.id, y.id)));
                    stack.push((va.as_ref(), vb.as_ref()));
                    stack.extend(xa.iter().zip(xb.iter()).map(|(x, y)| (x.as_ref(), y.as_ref())));
                }
                (ExprKind::Call { func: fa, args: aa, .. }, ExprKind::Call { func: fb, args: ab, .. }) => {
                    if fa != fb || aa.len() != ab.len() {
                        return false;
                    }
                    stack.extend(aa.iter().zip(ab.iter()).map(|(x, y)| (x.as_ref(), y.as_ref())));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

// =========================================================================
// Drop
// =========================================================================

impl ExprKind {
    /// Move the child `Arc`s (index variables included) into `out`, leaving a leaf.
    fn take_children(&mut self, out: &mut Vec<Arc<Expr>>) {
        let leaf = ExprKind::Const { value: ConstValue::Bool(false), dtype: DType::Bool };
        match std::mem::replace(self, leaf) {
            ExprKind::Var { .. } | ExprKind::Const { .. } => {}
            ExprKind::Binary { lhs, rhs, .. } => out.extend([lhs, rhs]),
            ExprKind::Cast { src, .. } => out.push(src),
            ExprKind::TensorCompute { axes, indices, value, .. } | ExprKind::Reduce { extents: axes, indices, value, .. } => {
                out.extend(axes);
                out.extend(indices);
                out.push(value);
            }
            ExprKind::Call { args, .. } => out.extend(args),
        }
    }
}

impl Drop for Expr {
    /// Tears the tree down iteratively; the derived drop glue would recurse
    /// once per level.
    fn drop(&mut self) {
        if matches!(self.kind, ExprKind::Var { .. } | ExprKind::Const { .. }) {
            return;
        }
        let mut pending = Vec::new();
        self.kind.take_children(&mut pending);
        while let Some(child) = pending.pop() {
            // Shared children stay alive; only the last owner is unpacked.
            if let Some(mut expr) = Arc::into_inner(child) {
                expr.kind.take_children(&mut pending);
            }
        }
    }
}

// =========================================================================
// Display
// =========================================================================

enum Piece<'a> {
    Node(&'a Expr),
    Text(Cow<'a, str>),
}

fn push_list<'a>(out: &mut Vec<Piece<'a>>, items: &'a [Arc<Expr>]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(Piece::Text(", ".into()));
        }
        out.push(Piece::Node(item));
    }
}

impl Expr {
    /// Printed form of this node, with children left as [`Piece::Node`]s.
    fn pieces<'a>(&'a self, out: &mut Vec<Piece<'a>>) {
        use Piece::{Node, Text};
        match &self.kind {
            ExprKind::Var { name, .. } => out.push(Text(name.as_str().into())),
            ExprKind::Const { value, .. } => out.push(Text(value.to_string().into())),
            ExprKind::Binary { op: op @ (BinaryOp::Max | BinaryOp::Min), lhs, rhs } => out.extend([
                Text(format!("{}(", op.symbol()).into()),
                Node(lhs),
                Text(", ".into()),
                Node(rhs),
                Text(")".into()),
            ]),
            ExprKind::Binary { op, lhs, rhs } => out.extend([
                Text("(".into()),
                Node(lhs),
                Text(format!(" {} ", op.symbol()).into()),
                Node(rhs),
                Text(")".into()),
            ]),
            ExprKind::Cast { src, dtype } => {
                out.extend([Text(format!("cast<{dtype}>(").into()), Node(src), Text(")".into())]);
            }
            ExprKind::TensorCompute { name, axes, indices, value } => {
                out.push(Text(format!("{name}[").into()));
                push_list(out, axes);
                out.push(Text("](".into()));
                push_list(out, indices);
                out.extend([Text(") = ".into()), Node(value)]);
            }
            ExprKind::Reduce { kind, extents, indices, value, acc_dtype } => {
                out.push(Text(format!("{}<{acc_dtype}>[", kind.to_string().to_lowercase()).into()));
                push_list(out, extents);
                out.push(Text("](".into()));
                push_list(out, indices);
                out.extend([Text(" => ".into()), Node(value), Text(")".into())]);
            }
            ExprKind::Call { func, args, .. } => {
                out.push(Text(format!("{func}(").into()));
                push_list(out, args);
                out.push(Text(")".into()));
            }
        }
    }
}

impl fmt::Display for Expr {
    /// Prints from an explicit stack, so deep trees are safe to format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Node(self)];
        let mut parts = Vec::new();
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Text(text) => f.write_str(&text)?,
                Piece::Node(expr) => {
                    expr.pieces(&mut parts);
                    stack.extend(parts.drain(..).rev());
                }
            }
        }
        Ok(())
    }
}
