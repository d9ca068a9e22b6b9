use half::{bf16, f16};

use super::*;

/// Host element types with a fixed runtime dtype.
pub trait HasDType: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    fn into_scalar(self) -> Scalar;

    fn from_scalar(value: Scalar) -> Self;
}

macro_rules! impl_dtype_ext {
    ($($ty:ty => $dtype:expr, $variant:ident, $conv:ident);* $(;)?) => {
        $(impl HasDType for $ty {
            const DTYPE: DType = $dtype;

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self.into())
            }

            fn from_scalar(value: Scalar) -> Self {
                value.$conv() as $ty
            }
        })*
    };
}

impl_dtype_ext! {
    i8 => DType::Int8, Int, as_i64;
    i16 => DType::Int16, Int, as_i64;
    i32 => DType::Int32, Int, as_i64;
    i64 => DType::Int64, Int, as_i64;
    u8 => DType::UInt8, UInt, as_u64;
    u16 => DType::UInt16, UInt, as_u64;
    u32 => DType::UInt32, UInt, as_u64;
    u64 => DType::UInt64, UInt, as_u64;
    f32 => DType::Float32, Float, as_f64;
    f64 => DType::Float64, Float, as_f64;
}

impl HasDType for bool {
    const DTYPE: DType = DType::Bool;

    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    fn from_scalar(value: Scalar) -> Self {
        value.as_bool()
    }
}

impl HasDType for f16 {
    const DTYPE: DType = DType::Float16;

    fn into_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn from_scalar(value: Scalar) -> Self {
        f16::from_f64(value.as_f64())
    }
}

impl HasDType for bf16 {
    const DTYPE: DType = DType::BFloat16;

    fn into_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn from_scalar(value: Scalar) -> Self {
        bf16::from_f64(value.as_f64())
    }
}
