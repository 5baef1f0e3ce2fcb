use std::str::FromStr;

use kiln_dtype::DType;
use strum::IntoEnumIterator;
use test_case::test_case;

use crate::context::{ParallelK, PassContext};
use crate::error::Error;

#[test]
fn test_default_context() {
    let ctx = PassContext::default();
    assert_eq!(ctx.precision(), None);
    assert_eq!(ctx.reduce_precision(), None);
    assert_eq!(ctx.parallel_k(), ParallelK::Default);
    assert!(ctx.instruments().is_empty());
}

#[test]
fn test_current_outside_scope_is_default() {
    assert_eq!(PassContext::depth(), 0);
    assert_eq!(PassContext::current().precision(), None);
}

#[test]
fn test_nested_contexts_restore_outer() {
    let outer = PassContext::builder().precision(DType::Float16).build();
    let inner = PassContext::builder().precision(DType::BFloat16).parallel_k(ParallelK::Search).build();

    let _outer_guard = outer.enter();
    {
        let _inner_guard = inner.enter();
        assert_eq!(PassContext::depth(), 2);
        assert_eq!(PassContext::current().precision(), Some(DType::BFloat16));
        assert_eq!(PassContext::current().parallel_k(), ParallelK::Search);
    }
    assert_eq!(PassContext::depth(), 1);
    assert_eq!(PassContext::current().precision(), Some(DType::Float16));
    assert_eq!(PassContext::current().parallel_k(), ParallelK::Default);
}

#[test]
fn test_context_is_thread_local() {
    let ctx = PassContext::builder().precision(DType::Float16).build();
    let _guard = ctx.enter();
    let seen = std::thread::spawn(|| PassContext::current().precision()).join().unwrap();
    assert_eq!(seen, None);
}

#[test_case("disabled", ParallelK::Disabled)]
#[test_case("default", ParallelK::Default)]
#[test_case("Search", ParallelK::Search ; "case insensitive")]
fn test_parallel_k_parse(s: &str, expected: ParallelK) {
    assert_eq!(ParallelK::from_str(s).unwrap(), expected);
}

#[test]
fn test_parallel_k_display_round_trips() {
    for mode in ParallelK::iter() {
        assert_eq!(mode.to_string().parse::<ParallelK>().unwrap(), mode);
    }
}

#[test_case(false, false, ParallelK::Default)]
#[test_case(true, false, ParallelK::Disabled)]
#[test_case(false, true, ParallelK::Search)]
fn test_parallel_k_from_flags(disabled: bool, search: bool, expected: ParallelK) {
    assert_eq!(ParallelK::from_flags(disabled, search).unwrap(), expected);
}

#[test]
fn test_parallel_k_conflicting_flags() {
    assert_eq!(ParallelK::from_flags(true, true).unwrap_err(), Error::ConflictingParallelK);
}
