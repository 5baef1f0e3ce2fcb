//! Concrete optimization passes, in default pipeline order.

pub mod launch_bound;
pub mod parallel_k;
pub mod precision;
pub mod reduce_precision;
pub mod simplify;

pub use launch_bound::PropagateLaunchBound;
pub use parallel_k::{PARALLEL_K, PARALLEL_K_CANDIDATES, parallel_k};
pub use precision::convert_precision;
pub use reduce_precision::reduce_precision;
pub use simplify::simplify_arithmetic;
