use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{Expr, ExprKind, FuncKind, IRModule, ReduceKind};
use tracing_test::traced_test;

use super::function;
use crate::context::PassContext;
use crate::pass::Pass;
use crate::passes::reduce_precision::reduce_precision;

fn accumulators(module: &IRModule) -> Vec<DType> {
    module
        .functions()
        .flat_map(|f| f.body().toposort())
        .filter_map(|node| match node.kind() {
            ExprKind::Reduce { acc_dtype, .. } => Some(*acc_dtype),
            _ => None,
        })
        .collect()
}

fn module_with_sum(value_dtype: DType) -> IRModule {
    let p = Expr::var("p", value_dtype);
    let body = Expr::compute("C", [4], |_| Expr::reduce(ReduceKind::Sum, [128], None, |_| p));
    IRModule::from_functions([function("k", FuncKind::Kernel, body)]).unwrap()
}

#[test]
fn test_float_accumulator_retyped() {
    let module = module_with_sum(DType::Float16);
    let ctx = PassContext::builder().reduce_precision(DType::Float32).build();
    let out = reduce_precision().process_module(&module, &ctx).unwrap();
    assert_eq!(accumulators(&module), [DType::Float16]);
    assert_eq!(accumulators(&out), [DType::Float32]);
}

#[test]
fn test_integer_accumulator_untouched() {
    let module = module_with_sum(DType::Int32);
    let ctx = PassContext::builder().reduce_precision(DType::Float32).build();
    let out = reduce_precision().process_module(&module, &ctx).unwrap();
    assert!(Arc::ptr_eq(out.get("k").unwrap(), module.get("k").unwrap()));
}

#[test]
fn test_unset_option_is_noop() {
    let module = module_with_sum(DType::Float16);
    let out = reduce_precision().process_module(&module, &PassContext::default()).unwrap();
    assert_eq!(out, module);
}

#[test]
#[traced_test]
fn test_non_float_option_skipped() {
    let module = module_with_sum(DType::Float16);
    let ctx = PassContext::builder().reduce_precision(DType::Int32).build();
    let out = reduce_precision().process_module(&module, &ctx).unwrap();
    assert_eq!(accumulators(&out), [DType::Float16]);
    assert!(logs_contain("not a float type"));
}
