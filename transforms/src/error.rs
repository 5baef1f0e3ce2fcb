use snafu::Snafu;

use kiln_dtype::DType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Malformed module detected by the IR layer.
    #[snafu(display("{pass}: {source}"))]
    Ir { pass: &'static str, source: kiln_ir::Error },

    #[snafu(display("invalid {option} option: {source}"))]
    UnknownDType { option: &'static str, source: kiln_dtype::Error },

    #[snafu(display("{option} must be a floating-point type, got {dtype}"))]
    NonFloatPrecision { option: &'static str, dtype: DType },

    #[snafu(display("parallel_k cannot be both disabled and searched"))]
    ConflictingParallelK,

    /// A rule set kept rewriting the same node.
    #[snafu(display("rewrite limit ({limit}) exceeded at {node}; rules may be cycling"))]
    RewriteLimit { limit: usize, node: String },
}
