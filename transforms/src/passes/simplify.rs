//! Algebraic simplification.
//!
//! Identity elimination (`x + 0`, `x * 1`, ...), integer annihilation
//! (`x * 0`) and constant folding, applied bottom-up to every function body.

use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{BinaryOp, ConstValue, Expr, ExprFilter, Function, Pattern};
use strum::IntoEnumIterator;

use crate::context::PassContext;
use crate::error::Result;
use crate::pass::{FunctionPass, function_pass};
use crate::rewrite::{RewriteRule, RuleSet, rewrite_bottom_up};

pub const NAME: &str = "simplify_arithmetic";

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// `x op c -> x` (or `c op x -> x`) when `keep(c)` holds.
///
/// Skipped when promotion would change the result dtype.
fn identity(name: &'static str, op: BinaryOp, side: Side, keep: fn(&ConstValue) -> bool) -> RewriteRule {
    let x = Pattern::any();
    let c = Pattern::any_of(ExprFilter::Const);
    let pattern = match side {
        Side::Left => Pattern::binary(op, &c, &x),
        Side::Right => Pattern::binary(op, &x, &c),
    };
    RewriteRule::new(name, pattern, move |binding, node| {
        let value = binding.get(&c)?.as_const()?;
        let x = binding.get(&x)?;
        (keep(&value) && x.dtype() == node.dtype()).then(|| x.clone())
    })
}

/// `x * 0 -> 0` for integers. Floats keep the product for NaN and infinity.
fn annihilate(name: &'static str, side: Side) -> RewriteRule {
    let x = Pattern::any();
    let c = Pattern::any_of(ExprFilter::Const);
    let pattern = match side {
        Side::Left => Pattern::mul(&c, &x),
        Side::Right => Pattern::mul(&x, &c),
    };
    RewriteRule::new(name, pattern, move |binding, node| {
        let value = binding.get(&c)?.as_const()?;
        (value.is_zero() && node.dtype().is_int()).then(|| Expr::constant(ConstValue::zero(node.dtype()), node.dtype()))
    })
}

/// Evaluate `a op b` in `dtype`.
///
/// Integer `Add`/`Sub`/`Mul`/`Div`/`Mod` wrap to the width of `dtype`; float
/// `Add`/`Sub`/`Mul`/`Div` round to it. Division or modulo by zero is not folded.
pub fn fold_binary(op: BinaryOp, a: ConstValue, b: ConstValue, dtype: DType) -> Option<ConstValue> {
    if dtype.is_int() {
        let (a, b) = (a.as_i64()?, b.as_i64()?);
        let v = match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b != 0 => a.checked_div(b)?,
            BinaryOp::Mod if b != 0 => a.checked_rem(b)?,
            _ => return None,
        };
        return ConstValue::Int(v).cast(dtype);
    }
    if dtype.is_float() {
        let as_f64 = |c: ConstValue| match c.cast(DType::Float64)? {
            ConstValue::Float(v) => Some(v),
            _ => None,
        };
        let (a, b) = (as_f64(a)?, as_f64(b)?);
        let v = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div if b != 0.0 => a / b,
            _ => return None,
        };
        return Some(ConstValue::Float(round_to(v, dtype)));
    }
    None
}

fn round_to(v: f64, dtype: DType) -> f64 {
    match dtype {
        DType::Float64 => v,
        // Half types are kept at f32 precision until codegen.
        _ => v as f32 as f64,
    }
}

/// `c1 op c2 -> c` for every foldable operation.
fn fold_constants() -> impl Iterator<Item = RewriteRule> {
    BinaryOp::iter().filter(|op| matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)).map(
        |op| {
            let (a, b) = (Pattern::any_of(ExprFilter::Const), Pattern::any_of(ExprFilter::Const));
            RewriteRule::new("fold_constants", Pattern::binary(op, &a, &b), move |binding, node| {
                let lhs = binding.get(&a)?.as_const()?;
                let rhs = binding.get(&b)?.as_const()?;
                let value = fold_binary(op, lhs, rhs, node.dtype())?;
                Some(Expr::constant(value, node.dtype()))
            })
        },
    )
}

/// Rules applied by [`simplify_arithmetic`], in priority order.
pub fn arithmetic_rules() -> RuleSet {
    let mut rules = vec![
        identity("add_zero", BinaryOp::Add, Side::Right, ConstValue::is_zero),
        identity("zero_add", BinaryOp::Add, Side::Left, ConstValue::is_zero),
        identity("sub_zero", BinaryOp::Sub, Side::Right, ConstValue::is_zero),
        identity("mul_one", BinaryOp::Mul, Side::Right, ConstValue::is_one),
        identity("one_mul", BinaryOp::Mul, Side::Left, ConstValue::is_one),
        identity("div_one", BinaryOp::Div, Side::Right, ConstValue::is_one),
        annihilate("mul_zero", Side::Right),
        annihilate("zero_mul", Side::Left),
    ];
    rules.extend(fold_constants());
    RuleSet::new(rules)
}

/// Simplify one function body, returning `None` when nothing changed.
pub fn simplify_function(rules: &RuleSet, func: &Function) -> Result<Option<Function>> {
    let body = rewrite_bottom_up(rules, func.body())?;
    Ok((!Arc::ptr_eq(&body, func.body())).then(|| func.with_body(body)))
}

/// Algebraic simplification pass.
pub fn simplify_arithmetic() -> FunctionPass<impl Fn(&Function, &PassContext) -> Result<Option<Function>> + Send + Sync> {
    let rules = arithmetic_rules();
    function_pass(NAME, move |func, _ctx| simplify_function(&rules, func))
}
