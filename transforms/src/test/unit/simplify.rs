use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{BinaryOp, ConstValue, Expr, ExprKind, FuncKind, IRModule};
use test_case::test_case;

use super::function;
use crate::context::PassContext;
use crate::pass::Pass;
use crate::passes::simplify::{arithmetic_rules, fold_binary, simplify_arithmetic};
use crate::rewrite::rewrite_bottom_up;

fn simplify(expr: &Arc<Expr>) -> Arc<Expr> {
    rewrite_bottom_up(&arithmetic_rules(), expr).unwrap()
}

#[test_case(BinaryOp::Add, false, 0 ; "x plus zero")]
#[test_case(BinaryOp::Add, true, 0 ; "zero plus x")]
#[test_case(BinaryOp::Sub, false, 0 ; "x minus zero")]
#[test_case(BinaryOp::Mul, false, 1 ; "x times one")]
#[test_case(BinaryOp::Mul, true, 1 ; "one times x")]
#[test_case(BinaryOp::Div, false, 1 ; "x over one")]
fn test_identity_removed(op: BinaryOp, const_first: bool, c: i64) {
    let x = Expr::var("x", DType::Int32);
    let expr = if const_first { Expr::binary(op, c, &x) } else { Expr::binary(op, &x, c) };
    assert!(Arc::ptr_eq(&simplify(&expr), &x));
}

#[test]
fn test_zero_minus_x_kept() {
    let x = Expr::var("x", DType::Int32);
    let expr = Expr::sub(0, &x);
    assert!(Arc::ptr_eq(&simplify(&expr), &expr));
}

#[test]
fn test_identity_skipped_when_promotion_changes_dtype() {
    let x = Expr::var("x", DType::Int8);
    let expr = Expr::add(&x, 0);
    assert_eq!(expr.dtype(), DType::Int32);
    assert!(Arc::ptr_eq(&simplify(&expr), &expr));
}

#[test]
fn test_float_identity_removed() {
    let x = Expr::var("x", DType::Float32);
    assert!(Arc::ptr_eq(&simplify(&Expr::mul(&x, 1.0f32)), &x));
}

#[test]
fn test_integer_times_zero_annihilates() {
    let x = Expr::var("x", DType::Int32);
    assert_eq!(simplify(&Expr::mul(&x, 0)), Expr::int(0));
    assert_eq!(simplify(&Expr::mul(0, &x)), Expr::int(0));
}

#[test]
fn test_float_times_zero_kept() {
    let x = Expr::var("x", DType::Float32);
    let expr = Expr::mul(&x, 0.0f32);
    assert!(Arc::ptr_eq(&simplify(&expr), &expr));
}

#[test_case(BinaryOp::Add, 2, 3, Some(5))]
#[test_case(BinaryOp::Sub, 2, 3, Some(-1))]
#[test_case(BinaryOp::Mul, 4, 5, Some(20))]
#[test_case(BinaryOp::Div, 7, 2, Some(3) ; "div truncates")]
#[test_case(BinaryOp::Div, -7, 2, Some(-3) ; "div truncates toward zero")]
#[test_case(BinaryOp::Mod, -7, 2, Some(-1) ; "mod takes dividend sign")]
#[test_case(BinaryOp::Mod, 7, 0, None ; "mod by zero")]
#[test_case(BinaryOp::Div, 7, 0, None ; "div by zero")]
#[test_case(BinaryOp::Max, 7, 2, None ; "max not folded")]
#[test_case(BinaryOp::Add, i32::MAX as i64, 1, Some(i32::MIN as i64) ; "add wraps at width")]
fn test_fold_int32(op: BinaryOp, a: i64, b: i64, expected: Option<i64>) {
    let folded = fold_binary(op, ConstValue::Int(a), ConstValue::Int(b), DType::Int32);
    assert_eq!(folded, expected.map(ConstValue::Int));
}

#[test_case(BinaryOp::Add, 1.5, 2.25, Some(3.75))]
#[test_case(BinaryOp::Mul, 1.5, 2.0, Some(3.0))]
#[test_case(BinaryOp::Div, 1.0, 4.0, Some(0.25))]
#[test_case(BinaryOp::Div, 1.0, 0.0, None ; "div by zero")]
#[test_case(BinaryOp::Mod, 5.0, 2.0, None ; "float mod not folded")]
fn test_fold_float32(op: BinaryOp, a: f64, b: f64, expected: Option<f64>) {
    let folded = fold_binary(op, ConstValue::Float(a), ConstValue::Float(b), DType::Float32);
    assert_eq!(folded, expected.map(ConstValue::Float));
}

#[test]
fn test_fold_rounds_to_float32() {
    let Some(ConstValue::Float(v)) = fold_binary(BinaryOp::Div, ConstValue::Float(1.0), ConstValue::Float(3.0), DType::Float32)
    else {
        panic!("expected a folded float");
    };
    assert_eq!(v, (1.0f32 / 3.0f32) as f64);
}

#[test]
fn test_fold_unsigned_wraps() {
    let folded = fold_binary(BinaryOp::Sub, ConstValue::UInt(3), ConstValue::UInt(5), DType::UInt8);
    assert_eq!(folded, Some(ConstValue::UInt(254)));
}

#[test]
fn test_constant_expression_folds() {
    let expr = Expr::add(Expr::mul(2, 3), 4);
    assert_eq!(simplify(&expr), Expr::int(10));
}

#[test]
fn test_pass_simplifies_compute_value() {
    let a = Expr::var("a", DType::Float32);
    let body = Expr::compute("C", [4, 4], |_| Expr::add(Expr::mul(&a, 1.0f32), 0.0f32));
    let module = IRModule::from_functions([
        function("k", FuncKind::Kernel, body),
        function("h", FuncKind::Host, Expr::var("y", DType::Int32)),
    ])
    .unwrap();

    let out = simplify_arithmetic().process_module(&module, &PassContext::default()).unwrap();
    let ExprKind::TensorCompute { value, .. } = out.get("k").unwrap().body().kind() else {
        panic!("body is not a tensor compute");
    };
    assert!(Arc::ptr_eq(value, &a));
    assert!(Arc::ptr_eq(out.get("h").unwrap(), module.get("h").unwrap()));
}

#[test]
fn test_pass_is_idempotent() {
    let x = Expr::var("x", DType::Int32);
    let module = IRModule::from_functions([function("k", FuncKind::Kernel, Expr::add(Expr::mul(&x, 1), 3))]).unwrap();
    let pass = simplify_arithmetic();
    let ctx = PassContext::default();

    let once = pass.process_module(&module, &ctx).unwrap();
    let twice = pass.process_module(&once, &ctx).unwrap();
    assert_eq!(once, twice);
    assert!(Arc::ptr_eq(once.get("k").unwrap(), twice.get("k").unwrap()));
}
