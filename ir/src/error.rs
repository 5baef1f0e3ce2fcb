use snafu::Snafu;

use kiln_dtype::DType;

use crate::BinaryOp;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The call graph of a module contains a cycle.
    #[snafu(display("call graph contains a cycle: {}", cycle.join(" -> ")))]
    CallGraphCycle { cycle: Vec<String> },

    /// Binary operation over operands with no common dtype.
    #[snafu(display("dtype mismatch: cannot apply {op} to {lhs} and {rhs}"))]
    DTypeMismatch { op: BinaryOp, lhs: DType, rhs: DType },

    /// Two functions in one module share a name.
    #[snafu(display("duplicate function {name:?} in module"))]
    DuplicateFunction { name: String },
}
