use crate::{CallGraph, DType, Error, Expr, FuncKind, Function, IRModule};

fn calling(name: &str, callees: &[&str]) -> Function {
    let x = Expr::var("x", DType::Float32);
    let body = callees.iter().fold(x.clone(), |acc, callee| Expr::add(acc, Expr::call(*callee, [&x], DType::Float32)));
    Function::builder().name(name).kind(FuncKind::Device).body(body).build()
}

fn module(funcs: Vec<Function>) -> IRModule {
    IRModule::from_functions(funcs).unwrap()
}

#[test]
fn test_edges_ignore_external_callees() {
    let graph = CallGraph::build(&module(vec![calling("main", &["helper", "expf"]), calling("helper", &[])]));
    assert_eq!(graph.callees("main"), ["helper".to_string()]);
    assert_eq!(graph.callers("helper"), ["main"]);
    assert!(graph.callees("expf").is_empty());
}

#[test]
fn test_dag_is_acyclic() {
    let graph = CallGraph::build(&module(vec![
        calling("main", &["a", "b"]),
        calling("a", &["c"]),
        calling("b", &["c"]),
        calling("c", &[]),
    ]));
    assert!(graph.check_acyclic().is_ok());
}

#[test]
fn test_cycle_reported_in_call_order() {
    let graph = CallGraph::build(&module(vec![
        calling("main", &["a"]),
        calling("a", &["b"]),
        calling("b", &["a"]),
    ]));
    let err = graph.check_acyclic().unwrap_err();
    assert_eq!(err, Error::CallGraphCycle { cycle: vec!["a".into(), "b".into(), "a".into()] });
    assert_eq!(err.to_string(), "call graph contains a cycle: a -> b -> a");
}

#[test]
fn test_self_recursion_is_a_cycle() {
    let graph = CallGraph::build(&module(vec![calling("f", &["f"])]));
    assert_eq!(graph.check_acyclic().unwrap_err(), Error::CallGraphCycle { cycle: vec!["f".into(), "f".into()] });
}
