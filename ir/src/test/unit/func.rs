use std::str::FromStr;

use test_case::test_case;

use crate::{AttrValue, Attrs, BLOCK_DIM, DType, Expr, FuncKind, Function, GRID_DIM};

fn kernel() -> Function {
    Function::builder()
        .name("matmul")
        .kind(FuncKind::Kernel)
        .params(vec![Expr::var("a", DType::Float32)])
        .body(Expr::float(0.0))
        .attrs(Attrs::from([(BLOCK_DIM.to_string(), AttrValue::Dim3([128, 1, 1]))]))
        .build()
}

#[test]
fn test_builder_defaults() {
    let f = Function::builder().name("f").kind(FuncKind::Host).body(Expr::int(0)).build();
    assert!(f.params().is_empty());
    assert!(f.attrs().is_empty());
    assert!(f.extern_vars().is_empty());
    assert_eq!(f.ret_type(), DType::Int32);
}

#[test]
fn test_declared_ret_type() {
    let f = Function::builder().name("f").kind(FuncKind::Host).body(Expr::int(0)).ret_type(DType::Void).build();
    assert_eq!(f.ret_type(), DType::Void);
}

#[test]
fn test_with_attrs_leaves_original() {
    let k = kernel();
    let updated = k.with_merged_attrs([(GRID_DIM.to_string(), AttrValue::Dim3([4, 1, 1]))]);

    assert_eq!(k.attrs().len(), 1);
    assert_eq!(updated.attrs().len(), 2);
    assert_eq!(updated.attr(BLOCK_DIM), k.attr(BLOCK_DIM));
    assert_eq!(updated.name(), k.name());
    assert_eq!(updated.params(), k.params());
    assert_ne!(updated, k);
}

#[test]
fn test_merge_overrides_existing_key() {
    let k = kernel().with_merged_attrs([(BLOCK_DIM.to_string(), AttrValue::Dim3([64, 2, 1]))]);
    assert_eq!(k.attr(BLOCK_DIM).and_then(AttrValue::as_dim3), Some([64, 2, 1]));
}

#[test]
fn test_with_body() {
    let k = kernel();
    let body = Expr::call("helper", [Expr::float(1.0)], DType::Float32);
    let updated = k.with_body(body);
    assert_eq!(updated.callees(), vec!["helper".to_string()]);
    assert!(k.callees().is_empty());
}

#[test_case("kernel", FuncKind::Kernel; "kernel")]
#[test_case("device", FuncKind::Device; "device")]
#[test_case("host", FuncKind::Host; "host")]
fn test_func_kind_names(name: &str, kind: FuncKind) {
    assert_eq!(FuncKind::from_str(name).unwrap(), kind);
    assert_eq!(kind.to_string(), name);
}

#[test]
fn test_attr_display() {
    assert_eq!(AttrValue::Dim3([8, 4, 1]).to_string(), "(8, 4, 1)");
    assert_eq!(AttrValue::from(16).to_string(), "16");
    assert_eq!(AttrValue::from(vec![1, 2]).to_string(), "[1, 2]");
}
