use kiln_dtype::Scalar;

use super::{DivisionByZeroSnafu, Result};
use crate::record::{BinaryOp, UnaryOp};

pub fn unary(op: UnaryOp, x: Scalar) -> Scalar {
    match x {
        Scalar::Float(v) => Scalar::Float(match op {
            UnaryOp::Neg => -v,
            UnaryOp::Abs => v.abs(),
            UnaryOp::Sqrt => v.sqrt(),
            UnaryOp::Exp => v.exp(),
            UnaryOp::Log => v.ln(),
            // NaN stays NaN
            UnaryOp::Relu => {
                if v < 0.0 {
                    0.0
                } else {
                    v
                }
            }
        }),
        Scalar::UInt(v) => match op {
            UnaryOp::Neg => Scalar::UInt(v.wrapping_neg()),
            UnaryOp::Abs | UnaryOp::Relu => Scalar::UInt(v),
            UnaryOp::Sqrt | UnaryOp::Exp | UnaryOp::Log => unary(op, Scalar::Float(v as f64)),
        },
        x => {
            let v = x.as_i64();
            match op {
                UnaryOp::Neg => Scalar::Int(v.wrapping_neg()),
                UnaryOp::Abs => Scalar::Int(v.wrapping_abs()),
                UnaryOp::Relu => Scalar::Int(v.max(0)),
                UnaryOp::Sqrt | UnaryOp::Exp | UnaryOp::Log => unary(op, Scalar::Float(v as f64)),
            }
        }
    }
}

pub fn binary(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
    Ok(match (lhs, rhs) {
        (Scalar::Float(_), _) | (_, Scalar::Float(_)) => Scalar::Float(float_binary(op, lhs.as_f64(), rhs.as_f64())),
        (Scalar::UInt(a), Scalar::UInt(b)) => Scalar::UInt(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div => a.checked_div(b).ok_or_else(|| DivisionByZeroSnafu.build())?,
            BinaryOp::Maximum => a.max(b),
            BinaryOp::Minimum => a.min(b),
        }),
        (a, b) => {
            let (a, b) = (a.as_i64(), b.as_i64());
            Scalar::Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    snafu::ensure!(b != 0, DivisionByZeroSnafu);
                    a.wrapping_div(b)
                }
                BinaryOp::Maximum => a.max(b),
                BinaryOp::Minimum => a.min(b),
            })
        }
    })
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        // NaN propagates through both extrema
        BinaryOp::Maximum if a.is_nan() || b.is_nan() => f64::NAN,
        BinaryOp::Minimum if a.is_nan() || b.is_nan() => f64::NAN,
        BinaryOp::Maximum => a.max(b),
        BinaryOp::Minimum => a.min(b),
    }
}
