//! Pattern matching over expression trees.
//!
//! - [`model`] - pattern nodes and constructors
//! - [`binding`] - match results
//! - [`matcher`] - the unification algorithm

pub mod binding;
pub mod matcher;
pub mod model;

pub use binding::{Binding, BindingEntry};
pub use matcher::{MAX_UNION_DEPTH, Mismatch, match_pattern, try_match};
pub use model::{BindingKey, ExprFilter, IntoPattern, Pattern, PatternKind};
