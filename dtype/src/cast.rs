use super::*;
use enumset::EnumSet;

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
            Float64 => &[],
        }
    }

    fn get_recursive_parents(self) -> EnumSet<Self> {
        self.promotion_lattice()
            .iter()
            .fold(EnumSet::only(self), |dtypes, &parent| dtypes.union(parent.get_recursive_parents()))
    }

    /// Whether every value of `self` is exactly representable in `to`.
    pub fn can_safe_cast(self, to: Self) -> bool {
        if self == to || self.is_bool() {
            return true;
        }

        match (self.value_bits(), to.value_bits(), to.mantissa_digits()) {
            // Integers: negative values never fit an unsigned target.
            (Some(from), Some(into), _) => from <= into && !(self.is_signed() && to.is_unsigned()),
            // Integer magnitudes must fit the significand.
            (Some(from), None, Some(digits)) => from <= digits,
            // Floats widen only; f16 and bf16 each lose values of the other.
            (None, None, Some(digits)) => {
                self.bytes() < to.bytes() && self.mantissa_digits().is_some_and(|own| own <= digits)
            }
            _ => false,
        }
    }

    /// Find the least upper bound type for a set of dtypes.
    ///
    /// The runtime never promotes implicitly; this is only used to suggest an
    /// explicit conversion when operands disagree.
    pub fn least_upper_dtype(dtypes: &[Self]) -> Option<Self> {
        dtypes.iter().map(|d| d.get_recursive_parents()).reduce(|lhs, rhs| lhs.intersection(rhs))?.iter().min()
    }
}
