pub mod cast;
pub mod ext;
pub mod scalar;


pub use ext::HasDType;
pub use scalar::Scalar;

/// Element data types.
///
/// Declaration order doubles as promotion priority (lower = more specific),
/// with signed and unsigned integers interleaved.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::Display)]
#[derive(enumset::EnumSetType)]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    Bool,

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
}

impl Default for DType {
    fn default() -> Self {
        Self::Float32
    }
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
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
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Number of significand bits (including the implicit bit) of float dtypes.
    pub const fn mantissa_digits(&self) -> Option<u32> {
        match self {
            Self::Float16 => Some(11),
            Self::BFloat16 => Some(8),
            Self::Float32 => Some(f32::MANTISSA_DIGITS),
            Self::Float64 => Some(f64::MANTISSA_DIGITS),
            _ => None,
        }
    }

    /// Number of magnitude bits of integer dtypes (bool counts as one bit).
    pub const fn value_bits(&self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            _ if self.is_signed() => Some(self.bytes() as u32 * 8 - 1),
            _ if self.is_unsigned() => Some(self.bytes() as u32 * 8),
            _ => None,
        }
    }
}
