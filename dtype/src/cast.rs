use super::*;

impl DType {
    const fn promotion_lattice(self) -> &'static [Self] {
        use DType::*;
        match self {
            Bool => &[Int8, UInt8],
            Int8 => &[Int16],
            Int16 => &[Int32],
            Int32 => &[Int64],
            Int64 => &[Float16, BFloat16],
            UInt8 => &[Int16, UInt16],
            UInt16 => &[Int32, UInt32],
            UInt32 => &[Int64, UInt64],
            UInt64 => &[Float16, BFloat16],
            Float16 => &[Float32],
            BFloat16 => &[Float32],
            Float32 => &[Float64],
            Float64 | Index | Void => &[],
        }
    }

    /// Every dtype reachable from `self` in the promotion lattice, `self` included.
    fn recursive_parents(self) -> Vec<Self> {
        let mut out = vec![self];
        let mut stack = vec![self];
        while let Some(dtype) = stack.pop() {
            for &parent in dtype.promotion_lattice() {
                if !out.contains(&parent) {
                    out.push(parent);
                    stack.push(parent);
                }
            }
        }
        out
    }

    /// Least upper bound of two dtypes in the promotion lattice.
    ///
    /// `Index` only joins with itself and integers (yielding `Index`); `Void`
    /// joins with nothing but itself.
    pub fn least_upper_dtype(self, other: Self) -> Option<Self> {
        if self == other {
            return Some(self);
        }
        match (self, other) {
            (Self::Index, o) | (o, Self::Index) if o.is_int() || o.is_bool() => return Some(Self::Index),
            (Self::Index, _) | (_, Self::Index) | (Self::Void, _) | (_, Self::Void) => return None,
            _ => {}
        }
        let lhs = self.recursive_parents();
        let rhs = other.recursive_parents();
        lhs.into_iter().filter(|d| rhs.contains(d)).min()
    }
}
