use std::sync::Arc;

use crate::{DType, Error, Expr, FuncKind, Function, IRModule};

fn func(name: &str, kind: FuncKind) -> Function {
    Function::builder().name(name).kind(kind).body(Expr::var("x", DType::Float32)).build()
}

#[test]
fn test_from_functions_sorted_by_name() {
    let module = IRModule::from_functions([func("b", FuncKind::Device), func("a", FuncKind::Kernel)]).unwrap();
    assert_eq!(module.names().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(module.kernels().count(), 1);
    assert_eq!(module.of_kind(FuncKind::Host).count(), 0);
}

#[test]
fn test_duplicate_function_rejected() {
    let err = IRModule::from_functions([func("a", FuncKind::Device), func("a", FuncKind::Host)]).unwrap_err();
    assert_eq!(err, Error::DuplicateFunction { name: "a".into() });
}

#[test]
fn test_map_functions_shares_unchanged() {
    let module = IRModule::from_functions([func("a", FuncKind::Kernel), func("b", FuncKind::Device)]).unwrap();
    let mapped = module.map_functions(|f| match f.kind() {
        FuncKind::Device => Some(f.with_body(Expr::int(1))),
        // Equal copies count as unchanged.
        _ => Some(f.clone()),
    });

    assert!(Arc::ptr_eq(mapped.get("a").unwrap(), module.get("a").unwrap()));
    assert!(!Arc::ptr_eq(mapped.get("b").unwrap(), module.get("b").unwrap()));
    assert_eq!(mapped.get("b").unwrap().ret_type(), DType::Int32);
    // The input module is untouched.
    assert_eq!(module.get("b").unwrap().ret_type(), DType::Float32);
}

#[test]
fn test_try_map_functions_propagates_error() {
    let module = IRModule::from_functions([func("a", FuncKind::Kernel)]).unwrap();
    let result: Result<IRModule, &str> = module.try_map_functions(|_| Err("boom"));
    assert_eq!(result.unwrap_err(), "boom");
}

#[test]
fn test_with_function_replaces_by_name() {
    let module = IRModule::from_functions([func("a", FuncKind::Kernel)]).unwrap();
    let replaced = module.with_function(func("a", FuncKind::Host));
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced.get("a").unwrap().kind(), FuncKind::Host);
    assert_eq!(module.get("a").unwrap().kind(), FuncKind::Kernel);
}
