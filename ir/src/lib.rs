//! Intermediate representation for the kiln compiler.
//!
//! # Module Organization
//!
//! - [`types`] - constant values, binary operations and reduction kinds
//! - [`expr`] - immutable expression trees
//! - [`pattern`] - pattern trees, bindings and the matcher
//! - [`func`] - functions and launch attributes
//! - [`module`] - collections of functions
//! - [`call_graph`] - call edges and cycle detection
//! - [`error`] - error types and result handling

pub mod call_graph;
pub mod error;
pub mod expr;
pub mod func;
pub mod module;
pub mod pattern;
pub mod prelude;
pub mod types;

#[cfg(test)]
pub mod test;

pub use call_graph::CallGraph;
pub use error::{Error, Result};
pub use expr::{Expr, ExprKind, ExprList, IntoExpr};
pub use func::{AttrValue, Attrs, BLOCK_DIM, FuncKind, Function, GRID_DIM};
pub use module::IRModule;
pub use pattern::{
    Binding, BindingKey, ExprFilter, IntoPattern, MAX_UNION_DEPTH, Mismatch, Pattern, PatternKind, match_pattern,
    try_match,
};
pub use types::{BinaryOp, ConstValue, ReduceKind};

pub use kiln_dtype::DType;
