use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{AttrValue, Expr, FuncKind, Function, IRModule, ReduceKind};
use test_case::test_case;

use super::function;
use crate::context::{ParallelK, PassContext};
use crate::pass::Pass;
use crate::passes::parallel_k::{PARALLEL_K, PARALLEL_K_CANDIDATES, parallel_k, reduction_extent, split_candidates};

fn matmul_like(kind: FuncKind, reduce: ReduceKind, extents: &[i64]) -> Function {
    let a = Expr::var("a", DType::Float32);
    let extents = extents.to_vec();
    let body = Expr::compute("C", [32, 32], |_| Expr::reduce(reduce, extents, None, |_| a));
    function("matmul", kind, body)
}

fn run(func: Function, mode: ParallelK) -> (IRModule, IRModule) {
    let module = IRModule::from_functions([func]).unwrap();
    let ctx = PassContext::builder().parallel_k(mode).build();
    let out = parallel_k().process_module(&module, &ctx).unwrap();
    (module, out)
}

#[test_case(1024, &[2, 4, 8, 16])]
#[test_case(512, &[2, 4, 8])]
#[test_case(128, &[2])]
#[test_case(96, &[] ; "too short to split")]
#[test_case(1000, &[2, 4, 8] ; "odd multiples")]
fn test_split_candidates(extent: i64, expected: &[i64]) {
    assert_eq!(split_candidates(extent), expected);
}

#[test]
fn test_reduction_extent_multiplies_axes() {
    assert_eq!(reduction_extent(&matmul_like(FuncKind::Kernel, ReduceKind::Sum, &[32, 32])), Some(1024));
    assert_eq!(reduction_extent(&matmul_like(FuncKind::Kernel, ReduceKind::Max, &[1024])), None);
}

#[test]
fn test_symbolic_extent_has_no_split() {
    let n = Expr::index_var("n");
    let body = Expr::reduce(ReduceKind::Sum, [n], None, |_| Expr::var("a", DType::Float32));
    assert_eq!(reduction_extent(&function("k", FuncKind::Kernel, body)), None);
}

#[test_case(1024, 16)]
#[test_case(512, 8)]
#[test_case(192, 2)]
#[test_case(100, 1 ; "no factor fits")]
fn test_default_mode_picks_largest_factor(extent: i64, expected: i64) {
    let (_, out) = run(matmul_like(FuncKind::Kernel, ReduceKind::Sum, &[extent]), ParallelK::Default);
    let func = out.get("matmul").unwrap();
    assert_eq!(func.attr(PARALLEL_K), Some(&AttrValue::Int(expected)));
    assert_eq!(func.attr(PARALLEL_K_CANDIDATES), None);
}

#[test]
fn test_disabled_mode_never_splits() {
    let (_, out) = run(matmul_like(FuncKind::Kernel, ReduceKind::Sum, &[1024]), ParallelK::Disabled);
    assert_eq!(out.get("matmul").unwrap().attr(PARALLEL_K), Some(&AttrValue::Int(1)));
}

#[test]
fn test_search_mode_records_candidates() {
    let (_, out) = run(matmul_like(FuncKind::Kernel, ReduceKind::Sum, &[512]), ParallelK::Search);
    let func = out.get("matmul").unwrap();
    assert_eq!(func.attr(PARALLEL_K), Some(&AttrValue::Int(1)));
    assert_eq!(func.attr(PARALLEL_K_CANDIDATES), Some(&AttrValue::IntList(vec![1, 2, 4, 8])));
}

#[test_case(FuncKind::Device, ReduceKind::Sum ; "device function")]
#[test_case(FuncKind::Host, ReduceKind::Sum ; "host function")]
#[test_case(FuncKind::Kernel, ReduceKind::Max ; "max reduction")]
fn test_untouched(kind: FuncKind, reduce: ReduceKind) {
    let (module, out) = run(matmul_like(kind, reduce, &[1024]), ParallelK::Default);
    assert!(Arc::ptr_eq(out.get("matmul").unwrap(), module.get("matmul").unwrap()));
}

#[test]
fn test_rerun_is_idempotent() {
    let (_, once) = run(matmul_like(FuncKind::Kernel, ReduceKind::Sum, &[1024]), ParallelK::Search);
    let ctx = PassContext::builder().parallel_k(ParallelK::Search).build();
    let twice = parallel_k().process_module(&once, &ctx).unwrap();
    assert!(Arc::ptr_eq(once.get("matmul").unwrap(), twice.get("matmul").unwrap()));
}
