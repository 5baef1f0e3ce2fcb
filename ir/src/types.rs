//! Type definitions shared by expressions and patterns.
//!
//! Operation kinds, constant values and reduction kinds.

use std::hash::{Hash, Hasher};
use std::mem::discriminant;

use kiln_dtype::DType;

/// Constant value carried by a `Const` expression.
///
/// Equality and hashing use the bit pattern for floats, so `NaN == NaN` and
/// `0.0 != -0.0`. This keeps structural equality reflexive.
#[derive(Debug, Clone, Copy, derive_more::Display)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match *self {
            Self::Int(v) => v.hash(state),
            Self::UInt(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
        }
    }
}

/// Helper macro to cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

impl ConstValue {
    /// Natural dtype of the stored representation.
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int64,
            Self::UInt(_) => DType::UInt64,
            Self::Float(_) => DType::Float64,
            Self::Bool(_) => DType::Bool,
        }
    }

    pub const fn zero(dtype: DType) -> Self {
        match dtype {
            DType::Bool => Self::Bool(false),
            d if d.is_unsigned() => Self::UInt(0),
            d if d.is_float() => Self::Float(0.0),
            _ => Self::Int(0),
        }
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Self::Int(v) => v == 0,
            Self::UInt(v) => v == 0,
            Self::Float(v) => v == 0.0,
            Self::Bool(v) => !v,
        }
    }

    pub fn is_one(&self) -> bool {
        match *self {
            Self::Int(v) => v == 1,
            Self::UInt(v) => v == 1,
            Self::Float(v) => v == 1.0,
            Self::Bool(v) => v,
        }
    }

    /// Convert to the representation of `to`, truncating like a C cast.
    ///
    /// Returns `None` for `Void` and `Index` when the value is not integral.
    pub fn cast(self, to: DType) -> Option<Self> {
        use DType::*;
        let out = match (self, to) {
            (_, Void) => return None,
            (Self::Bool(v), Bool) => Self::Bool(v),
            (Self::Bool(v), d) if d.is_float() => Self::Float(v as u8 as f64),
            (Self::Bool(v), d) if d.is_unsigned() => Self::UInt(v as u64),
            (Self::Bool(v), _) => Self::Int(v as i64),

            (Self::Int(v), Bool) => Self::Bool(v != 0),
            (Self::UInt(v), Bool) => Self::Bool(v != 0),
            (Self::Float(v), Bool) => Self::Bool(v != 0.0),

            (Self::Float(v), d) if d.is_float() => Self::Float(v),
            (Self::Float(_), Index) => return None,
            // Float-to-unsigned: route through i64 first
            (Self::Float(v), d) => return Self::Int(v as i64).cast(d),

            (Self::Int(v), d) if d.is_float() => Self::Float(v as f64),
            (Self::UInt(v), d) if d.is_float() => Self::Float(v as f64),
            (Self::Int(v), d) => Self::UInt(v as u64).cast(d)?,
            (Self::UInt(v), Int8) => Self::Int(cast_via!(v, i8, i64)),
            (Self::UInt(v), Int16) => Self::Int(cast_via!(v, i16, i64)),
            (Self::UInt(v), Int32) => Self::Int(cast_via!(v, i32, i64)),
            (Self::UInt(v), Int64 | Index) => Self::Int(v as i64),
            (Self::UInt(v), UInt8) => Self::UInt(cast_via!(v, u8, u64)),
            (Self::UInt(v), UInt16) => Self::UInt(cast_via!(v, u16, u64)),
            (Self::UInt(v), UInt32) => Self::UInt(cast_via!(v, u32, u64)),
            (Self::UInt(v), _) => Self::UInt(v),
        };
        Some(out)
    }
}

/// Binary operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter, strum::IntoStaticStr)]
pub enum BinaryOp {
    // Arithmetic operations
    Add,
    Sub,
    Mul,
    /// Division: truncating for integers, IEEE for floats.
    Div,
    /// Modulo with C semantics: result has the sign of the dividend.
    Mod,
    Max,
    Min,

    // Comparison operations
    Lt,
    Eq,
    Ne,

    // Logical operations
    And,
    Or,
}

impl BinaryOp {
    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::Lt | Self::Eq | Self::Ne)
    }

    pub const fn is_commutative(&self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Max | Self::Min | Self::Eq | Self::Ne | Self::And | Self::Or)
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Max => "max",
            Self::Min => "min",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Reduction kinds for `Reduce` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum ReduceKind {
    Sum,
    Max,
    Min,
}
