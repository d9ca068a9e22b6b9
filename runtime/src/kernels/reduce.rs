use kiln_dtype::{DType, Scalar};
use rayon::prelude::*;

use super::{EmptyReductionSnafu, Result, read_at, split_layout};
use crate::record::{ExtremumOp, ReduceOp, StorageRef};

/// Reduce `axes` of `input`; one value per kept position, row-major.
pub(super) fn reduce(op: ReduceOp, input: &StorageRef, axes: &[usize]) -> Vec<Scalar> {
    let (kept, reduced) = split_layout(&input.layout, axes);
    let dtype = input.dtype();
    let count = reduced.numel();

    input.buffer.with_bytes(|bytes| {
        (0..kept.numel())
            .into_par_iter()
            .map(|position| {
                let base = kept.offset_of(position);
                let values = (0..count).map(|j| read_at(input, bytes, base + reduced.offset_of(j)));
                accumulate(op, dtype, values, count)
            })
            .collect()
    })
}

fn accumulate(op: ReduceOp, dtype: DType, values: impl Iterator<Item = Scalar>, count: usize) -> Scalar {
    if dtype.is_float() {
        let mut acc = match op {
            ReduceOp::Prod => 1.0,
            ReduceOp::Sum | ReduceOp::Mean => 0.0,
        };
        for value in values {
            match op {
                ReduceOp::Prod => acc *= value.as_f64(),
                ReduceOp::Sum | ReduceOp::Mean => acc += value.as_f64(),
            }
        }
        if op == ReduceOp::Mean {
            acc /= count as f64;
        }
        Scalar::Float(acc)
    } else if dtype.is_unsigned() {
        let fold = |acc: u64, v: Scalar| match op {
            ReduceOp::Prod => acc.wrapping_mul(v.as_u64()),
            ReduceOp::Sum | ReduceOp::Mean => acc.wrapping_add(v.as_u64()),
        };
        let acc = values.fold(if op == ReduceOp::Prod { 1 } else { 0 }, fold);
        Scalar::UInt(if op == ReduceOp::Mean { acc.checked_div(count as u64).unwrap_or(0) } else { acc })
    } else {
        let fold = |acc: i64, v: Scalar| match op {
            ReduceOp::Prod => acc.wrapping_mul(v.as_i64()),
            ReduceOp::Sum | ReduceOp::Mean => acc.wrapping_add(v.as_i64()),
        };
        let acc = values.fold(if op == ReduceOp::Prod { 1 } else { 0 }, fold);
        Scalar::Int(if op == ReduceOp::Mean { acc.checked_div(count as i64).unwrap_or(0) } else { acc })
    }
}

/// Extremum along `axis`: values (input dtype) and their first positions (`Int64`).
pub(super) fn extremum(op: ExtremumOp, input: &StorageRef, axis: usize) -> Result<(Vec<Scalar>, Vec<Scalar>)> {
    let (kept, reduced) = split_layout(&input.layout, &[axis]);
    let size = reduced.numel();
    snafu::ensure!(size > 0, EmptyReductionSnafu { axis });

    let winners: Vec<(Scalar, Scalar)> = input.buffer.with_bytes(|bytes| {
        (0..kept.numel())
            .into_par_iter()
            .map(|position| {
                let base = kept.offset_of(position);
                let mut best = read_at(input, bytes, base);
                let mut best_index = 0;
                for j in 1..size {
                    let candidate = read_at(input, bytes, base + reduced.offset_of(j));
                    if beats(op, candidate, best) {
                        best = candidate;
                        best_index = j;
                    }
                }
                (best, Scalar::Int(best_index as i64))
            })
            .collect()
    });

    Ok(winners.into_iter().unzip())
}

/// Whether `candidate` strictly beats `best`; ties keep the earlier element.
fn beats(op: ExtremumOp, candidate: Scalar, best: Scalar) -> bool {
    match (candidate, best) {
        // The first NaN wins and is never displaced.
        (_, Scalar::Float(b)) if b.is_nan() => false,
        (Scalar::Float(c), _) if c.is_nan() => true,
        (Scalar::Float(_), _) | (_, Scalar::Float(_)) => match op {
            ExtremumOp::Max => candidate.as_f64() > best.as_f64(),
            ExtremumOp::Min => candidate.as_f64() < best.as_f64(),
        },
        (Scalar::UInt(c), Scalar::UInt(b)) => match op {
            ExtremumOp::Max => c > b,
            ExtremumOp::Min => c < b,
        },
        _ => match op {
            ExtremumOp::Max => candidate.as_i64() > best.as_i64(),
            ExtremumOp::Min => candidate.as_i64() < best.as_i64(),
        },
    }
}
