//! Common imports for building and matching expressions:
//!
//! ```rust
//! use kiln_ir::prelude::*;
//! ```

pub use crate::expr::{Expr, ExprKind, IntoExpr};
pub use crate::func::{AttrValue, Attrs, FuncKind, Function};
pub use crate::module::IRModule;
pub use crate::pattern::{Binding, ExprFilter, IntoPattern, Pattern, match_pattern};
pub use crate::types::{BinaryOp, ConstValue, ReduceKind};

pub use kiln_dtype::DType;
