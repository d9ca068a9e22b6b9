use kiln_dtype::Scalar;
use rayon::prelude::*;

use super::{binary, read_at};
use crate::record::{BinaryOp, StorageRef};

/// `(m, k) x (k, n)`, row-major `m * n` output.
///
/// Each output element accumulates over `k` in order.
pub(super) fn matmul(lhs: &StorageRef, rhs: &StorageRef) -> Vec<Scalar> {
    let (m, k) = (lhs.layout.shape()[0], lhs.layout.shape()[1]);
    let n = rhs.layout.shape()[1];
    let (ls, rs) = (lhs.layout.strides(), rhs.layout.strides());
    let zero = lhs.dtype().zero();

    lhs.buffer.with_bytes(|lhs_bytes| {
        rhs.buffer.with_bytes(|rhs_bytes| {
            (0..m * n)
                .into_par_iter()
                .map(|position| {
                    let (i, j) = (position / n, position % n);
                    (0..k).fold(zero, |acc, p| {
                        let a = read_at(lhs, lhs_bytes, lhs.layout.offset() + i * ls[0] + p * ls[1]);
                        let b = read_at(rhs, rhs_bytes, rhs.layout.offset() + p * rs[0] + j * rs[1]);
                        // Add and Mul never fail.
                        let product = binary(BinaryOp::Mul, a, b).unwrap_or(zero);
                        binary(BinaryOp::Add, acc, product).unwrap_or(acc)
                    })
                })
                .collect()
        })
    })
}
