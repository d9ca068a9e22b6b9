//! Dtype-independent scalar values and their little-endian byte encoding.
//!
//! Kernels decode every element into a [`Scalar`], compute in the widest
//! representation of its category (`i64`, `u64`, `f64`) and encode the result
//! back into the output dtype. Encoding applies the usual numeric cast rules:
//! integers wrap to narrower widths, floats truncate toward zero (saturating
//! at the `i64`/`u64` range) and bools are stored as `0`/`1`.

use half::{bf16, f16};

use crate::DType;

/// A single element value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Bool(v) => v as u8 as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Bool(v) => v as i64,
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Self::Bool(v) => v as u64,
            Self::Int(v) => v as u64,
            Self::UInt(v) => v,
            Self::Float(v) if v < 0.0 => (v as i64) as u64,
            Self::Float(v) => v as u64,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(v) => v,
            Self::Int(v) => v != 0,
            Self::UInt(v) => v != 0,
            Self::Float(v) => v != 0.0,
        }
    }

    /// Round-trip the value through `dtype`, yielding the value that dtype would store.
    pub fn cast(self, dtype: DType) -> Self {
        let mut bytes = [0u8; 8];
        let width = dtype.bytes();
        dtype.write(self, &mut bytes[..width]);
        dtype.read(&bytes[..width])
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl DType {
    /// Decode one element. `bytes` must hold at least `self.bytes()` bytes.
    pub fn read(self, bytes: &[u8]) -> Scalar {
        match self {
            Self::Bool => Scalar::Bool(bytes[0] != 0),
            Self::Int8 => Scalar::Int(i8::from_le_bytes(le(bytes)) as i64),
            Self::Int16 => Scalar::Int(i16::from_le_bytes(le(bytes)) as i64),
            Self::Int32 => Scalar::Int(i32::from_le_bytes(le(bytes)) as i64),
            Self::Int64 => Scalar::Int(i64::from_le_bytes(le(bytes))),
            Self::UInt8 => Scalar::UInt(bytes[0] as u64),
            Self::UInt16 => Scalar::UInt(u16::from_le_bytes(le(bytes)) as u64),
            Self::UInt32 => Scalar::UInt(u32::from_le_bytes(le(bytes)) as u64),
            Self::UInt64 => Scalar::UInt(u64::from_le_bytes(le(bytes))),
            Self::Float16 => Scalar::Float(f16::from_le_bytes(le(bytes)).to_f64()),
            Self::BFloat16 => Scalar::Float(bf16::from_le_bytes(le(bytes)).to_f64()),
            Self::Float32 => Scalar::Float(f32::from_le_bytes(le(bytes)) as f64),
            Self::Float64 => Scalar::Float(f64::from_le_bytes(le(bytes))),
        }
    }

    /// Encode one element into `out[..self.bytes()]`.
    pub fn write(self, value: Scalar, out: &mut [u8]) {
        match self {
            Self::Bool => out[0] = value.as_bool() as u8,
            Self::Int8 => out[..1].copy_from_slice(&(value.as_i64() as i8).to_le_bytes()),
            Self::Int16 => out[..2].copy_from_slice(&(value.as_i64() as i16).to_le_bytes()),
            Self::Int32 => out[..4].copy_from_slice(&(value.as_i64() as i32).to_le_bytes()),
            Self::Int64 => out[..8].copy_from_slice(&value.as_i64().to_le_bytes()),
            Self::UInt8 => out[0] = value.as_u64() as u8,
            Self::UInt16 => out[..2].copy_from_slice(&(value.as_u64() as u16).to_le_bytes()),
            Self::UInt32 => out[..4].copy_from_slice(&(value.as_u64() as u32).to_le_bytes()),
            Self::UInt64 => out[..8].copy_from_slice(&value.as_u64().to_le_bytes()),
            Self::Float16 => out[..2].copy_from_slice(&f16::from_f64(value.as_f64()).to_le_bytes()),
            Self::BFloat16 => out[..2].copy_from_slice(&bf16::from_f64(value.as_f64()).to_le_bytes()),
            Self::Float32 => out[..4].copy_from_slice(&(value.as_f64() as f32).to_le_bytes()),
            Self::Float64 => out[..8].copy_from_slice(&value.as_f64().to_le_bytes()),
        }
    }

    pub fn zero(self) -> Scalar {
        self.from_f64(0.0)
    }

    pub fn one(self) -> Scalar {
        self.from_f64(1.0)
    }

    /// Scalar of this dtype's category holding `value`.
    pub fn from_f64(self, value: f64) -> Scalar {
        match self {
            Self::Bool => Scalar::Bool(value != 0.0),
            _ if self.is_signed() => Scalar::Int(value as i64),
            _ if self.is_unsigned() => Scalar::UInt(value as u64),
            _ => Scalar::Float(value),
        }
    }
}
