//! Scalar numeric types shared by every stage of the kiln compiler.
//!
//! The set is closed: expressions, precision options and reduction
//! accumulators all draw from [`DType`].

use std::str::FromStr;

use snafu::Snafu;

pub mod cast;


#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Name does not denote any known dtype.
    #[snafu(display("unknown dtype name {name:?}"))]
    UnknownDType { name: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Scalar data type.
///
/// Declaration order doubles as the promotion priority: lower discriminants
/// are more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter, strum::EnumCount, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    Bool,

    // Interleaved signed/unsigned for correct LUB priority
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,

    Float16,
    BFloat16,
    Float32,
    Float64,

    /// Index type for loop iteration and tensor axes.
    Index,

    /// No value (e.g. a function without a result).
    Void,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
            Self::Index => 8, // Treat as 64-bit index
            Self::Void => 0,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned() || matches!(self, Self::Index)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Canonical lowercase name, e.g. `"float16"`.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl FromStr for DType {
    type Err = Error;

    /// Accepts canonical names (`float16`) and the short forms used on
    /// command lines and in environment variables (`f16`, `fp16`, `i32`).
    fn from_str(s: &str) -> Result<Self> {
        let dtype = match s.trim().to_ascii_lowercase().as_str() {
            "bool" => Self::Bool,
            "int8" | "i8" => Self::Int8,
            "uint8" | "u8" => Self::UInt8,
            "int16" | "i16" => Self::Int16,
            "uint16" | "u16" => Self::UInt16,
            "int32" | "i32" => Self::Int32,
            "uint32" | "u32" => Self::UInt32,
            "int64" | "i64" => Self::Int64,
            "uint64" | "u64" => Self::UInt64,
            "float16" | "f16" | "fp16" | "half" => Self::Float16,
            "bfloat16" | "bf16" => Self::BFloat16,
            "float32" | "f32" | "fp32" | "float" => Self::Float32,
            "float64" | "f64" | "fp64" | "double" => Self::Float64,
            "index" => Self::Index,
            "void" => Self::Void,
            _ => return UnknownDTypeSnafu { name: s }.fail(),
        };
        Ok(dtype)
    }
}
