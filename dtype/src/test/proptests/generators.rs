use crate::*;
use proptest::prelude::*;

pub fn int_dtype() -> impl Strategy<Value = DType> {
    prop_oneof![
        Just(DType::Int8),
        Just(DType::Int16),
        Just(DType::Int32),
        Just(DType::Int64),
        Just(DType::UInt8),
        Just(DType::UInt16),
        Just(DType::UInt32),
        Just(DType::UInt64),
    ]
}

pub fn float_dtype() -> impl Strategy<Value = DType> {
    prop_oneof![Just(DType::Float16), Just(DType::BFloat16), Just(DType::Float32), Just(DType::Float64)]
}

pub fn dtype_generator() -> impl Strategy<Value = DType> {
    prop_oneof![Just(DType::Bool), int_dtype(), float_dtype()]
}

/// A value that is exactly representable in `dtype`.
pub fn scalar_of(dtype: DType) -> BoxedStrategy<Scalar> {
    match dtype {
        DType::Bool => any::<bool>().prop_map(Scalar::Bool).boxed(),
        DType::Int8 => any::<i8>().prop_map(|v| Scalar::Int(v as i64)).boxed(),
        DType::Int16 => any::<i16>().prop_map(|v| Scalar::Int(v as i64)).boxed(),
        DType::Int32 => any::<i32>().prop_map(|v| Scalar::Int(v as i64)).boxed(),
        DType::Int64 => any::<i64>().prop_map(Scalar::Int).boxed(),
        DType::UInt8 => any::<u8>().prop_map(|v| Scalar::UInt(v as u64)).boxed(),
        DType::UInt16 => any::<u16>().prop_map(|v| Scalar::UInt(v as u64)).boxed(),
        DType::UInt32 => any::<u32>().prop_map(|v| Scalar::UInt(v as u64)).boxed(),
        DType::UInt64 => any::<u64>().prop_map(Scalar::UInt).boxed(),
        // Small integers are exact in every float format.
        _ => (-128i32..=128).prop_map(|v| Scalar::Float(v as f64)).boxed(),
    }
}
