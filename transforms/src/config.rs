//! User-facing optimize options.
//!
//! Provides typed configuration with bon builders and environment variable
//! fallbacks. [`OptimizeConfig::into_context`] validates the options and
//! produces the [`PassContext`] passes consume.

use std::str::FromStr;

use bon::bon;
use kiln_dtype::DType;
use snafu::{ResultExt, ensure};

use crate::context::{ParallelK, PassContext};
use crate::error::{NonFloatPrecisionSnafu, Result, UnknownDTypeSnafu};

/// Unvalidated optimize options, with dtypes given by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeConfig {
    /// Narrow intermediate tensor values to this type, e.g. `"float16"`.
    pub precision: Option<String>,
    /// Accumulate reductions in this type.
    pub reduce_precision: Option<String>,
    pub parallel_k: ParallelK,
}

#[bon]
impl OptimizeConfig {
    #[builder]
    pub fn new(
        #[builder(into)] precision: Option<String>,
        #[builder(into)] reduce_precision: Option<String>,
        #[builder(default)] parallel_k: ParallelK,
    ) -> Self {
        Self { precision, reduce_precision, parallel_k }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_PRECISION` - Intermediate tensor type name
    /// * `KILN_REDUCE_PRECISION` - Reduction accumulator type name
    /// * `KILN_PARALLEL_K` - `disabled`, `default` or `search` (default: `default`)
    pub fn from_env() -> Self {
        let precision = std::env::var("KILN_PRECISION").ok().filter(|s| !s.is_empty());
        let reduce_precision = std::env::var("KILN_REDUCE_PRECISION").ok().filter(|s| !s.is_empty());
        let parallel_k = std::env::var("KILN_PARALLEL_K").ok().and_then(|s| s.parse().ok()).unwrap_or_default();

        Self { precision, reduce_precision, parallel_k }
    }

    /// Validate the options.
    ///
    /// Both precisions must name floating-point types.
    pub fn into_context(self) -> Result<PassContext> {
        let precision = parse_precision("precision", self.precision.as_deref())?;
        let reduce_precision = parse_precision("reduce_precision", self.reduce_precision.as_deref())?;

        Ok(PassContext::builder()
            .maybe_precision(precision)
            .maybe_reduce_precision(reduce_precision)
            .parallel_k(self.parallel_k)
            .build())
    }
}

fn parse_precision(option: &'static str, name: Option<&str>) -> Result<Option<DType>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let dtype = DType::from_str(name).context(UnknownDTypeSnafu { option })?;
    ensure!(dtype.is_float(), NonFloatPrecisionSnafu { option, dtype });
    Ok(Some(dtype))
}
