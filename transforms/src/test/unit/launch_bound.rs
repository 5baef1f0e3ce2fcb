use std::sync::Arc;

use kiln_dtype::DType;
use kiln_ir::{AttrValue, Attrs, BLOCK_DIM, Expr, FuncKind, GRID_DIM, IRModule};

use super::{function, function_with_attrs};
use crate::context::PassContext;
use crate::error::Error;
use crate::pass::Pass;
use crate::passes::launch_bound::PropagateLaunchBound;

fn attrs<const N: usize>(entries: [(&str, AttrValue); N]) -> Attrs {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn launch() -> Attrs {
    attrs([(BLOCK_DIM, AttrValue::Dim3([128, 1, 1])), (GRID_DIM, AttrValue::Dim3([64, 2, 1]))])
}

fn propagate(module: &IRModule) -> crate::Result<IRModule> {
    PropagateLaunchBound.process_module(module, &PassContext::default())
}

#[test]
fn test_single_kernel_propagates_to_device() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, launch()),
        function_with_attrs(
            "d",
            FuncKind::Device,
            attrs([(BLOCK_DIM, AttrValue::Dim3([1, 1, 1])), ("inline", AttrValue::Bool(true))]),
        ),
        function_with_attrs("h", FuncKind::Host, attrs([("entry", AttrValue::Bool(true))])),
    ])
    .unwrap();

    let out = propagate(&module).unwrap();

    let device = out.get("d").unwrap();
    assert_eq!(device.attr(BLOCK_DIM), Some(&AttrValue::Dim3([128, 1, 1])));
    assert_eq!(device.attr(GRID_DIM), Some(&AttrValue::Dim3([64, 2, 1])));
    assert_eq!(device.attr("inline"), Some(&AttrValue::Bool(true)));
    assert_eq!(device.attrs().len(), 3);
    assert_eq!(device.body(), module.get("d").unwrap().body());

    assert!(Arc::ptr_eq(out.get("k").unwrap(), module.get("k").unwrap()));
    assert!(Arc::ptr_eq(out.get("h").unwrap(), module.get("h").unwrap()));
    // The input is not modified.
    assert_eq!(module.get("d").unwrap().attr(BLOCK_DIM), Some(&AttrValue::Dim3([1, 1, 1])));
}

#[test]
fn test_every_device_function_updated() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, launch()),
        function_with_attrs("d0", FuncKind::Device, Attrs::new()),
        function_with_attrs("d1", FuncKind::Device, Attrs::new()),
    ])
    .unwrap();

    let out = propagate(&module).unwrap();
    for name in ["d0", "d1"] {
        assert_eq!(out.get(name).unwrap().attrs(), &launch());
    }
}

#[test]
fn test_zero_kernels_unchanged() {
    let module = IRModule::from_functions([
        function_with_attrs("d", FuncKind::Device, Attrs::new()),
        function_with_attrs("h", FuncKind::Host, Attrs::new()),
    ])
    .unwrap();
    assert_eq!(propagate(&module).unwrap(), module);
}

#[test]
fn test_two_kernels_unchanged() {
    let module = IRModule::from_functions([
        function_with_attrs("k0", FuncKind::Kernel, launch()),
        function_with_attrs("k1", FuncKind::Kernel, attrs([(BLOCK_DIM, AttrValue::Dim3([32, 1, 1]))])),
        function_with_attrs("d", FuncKind::Device, Attrs::new()),
    ])
    .unwrap();
    let out = propagate(&module).unwrap();
    assert_eq!(out, module);
    assert!(out.get("d").unwrap().attrs().is_empty());
}

#[test]
fn test_missing_grid_dim_propagates_block_dim_only() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, attrs([(BLOCK_DIM, AttrValue::Dim3([256, 1, 1]))])),
        function_with_attrs("d", FuncKind::Device, attrs([(GRID_DIM, AttrValue::Dim3([9, 9, 9]))])),
    ])
    .unwrap();

    let device = propagate(&module).unwrap().get("d").unwrap().clone();
    assert_eq!(device.attr(BLOCK_DIM), Some(&AttrValue::Dim3([256, 1, 1])));
    assert_eq!(device.attr(GRID_DIM), Some(&AttrValue::Dim3([9, 9, 9])));
}

#[test]
fn test_kernel_without_launch_attrs_is_noop() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, Attrs::new()),
        function_with_attrs("d", FuncKind::Device, attrs([("inline", AttrValue::Bool(false))])),
    ])
    .unwrap();
    assert_eq!(propagate(&module).unwrap(), module);
}

#[test]
fn test_propagation_is_stable() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, launch()),
        function_with_attrs("d", FuncKind::Device, Attrs::new()),
    ])
    .unwrap();
    let once = propagate(&module).unwrap();
    let twice = propagate(&once).unwrap();
    assert!(Arc::ptr_eq(once.get("d").unwrap(), twice.get("d").unwrap()));
}

fn calling(name: &str, kind: FuncKind, callee: &str) -> kiln_ir::Function {
    function(name, kind, Expr::call(callee, [Expr::var("x", DType::Float32)], DType::Float32))
}

#[test]
fn test_call_cycle_reported() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, launch()),
        calling("a", FuncKind::Device, "b"),
        calling("b", FuncKind::Device, "a"),
    ])
    .unwrap();

    let err = propagate(&module).unwrap_err();
    let Error::Ir { pass, source: kiln_ir::Error::CallGraphCycle { cycle } } = &err else {
        panic!("expected a call graph cycle, got {err}");
    };
    assert_eq!(*pass, "propagate_launch_bound");
    assert_eq!(cycle, &["a", "b", "a"]);
}

#[test]
fn test_cycle_checked_before_kernel_count() {
    let module = IRModule::from_functions([calling("a", FuncKind::Device, "a")]).unwrap();
    assert!(matches!(propagate(&module), Err(Error::Ir { .. })));
}

#[test]
fn test_external_call_is_not_a_cycle() {
    let module = IRModule::from_functions([
        function_with_attrs("k", FuncKind::Kernel, launch()),
        calling("d", FuncKind::Device, "expf"),
    ])
    .unwrap();
    let out = propagate(&module).unwrap();
    assert_eq!(out.get("d").unwrap().attrs(), &launch());
}
