use kiln_dtype::Scalar;
use rayon::prelude::*;

use super::{IndexOutOfBoundsSnafu, Result, read_at};
use crate::record::StorageRef;

/// `out[p] = input[p with p[axis] replaced by index[p]]`, shaped like `index`.
pub(super) fn gather(input: &StorageRef, index: &StorageRef, axis: usize) -> Result<Vec<Scalar>> {
    let size = input.layout.shape()[axis];
    let index_shape = index.layout.shape();
    let strides = input.layout.strides();

    index.buffer.with_bytes(|index_bytes| {
        input.buffer.with_bytes(|input_bytes| {
            (0..index.layout.numel())
                .into_par_iter()
                .map(|position| {
                    let target = read_at(index, index_bytes, index.layout.offset_of(position)).as_i64();
                    snafu::ensure!(
                        (0..size as i64).contains(&target),
                        IndexOutOfBoundsSnafu { index: target, axis, size }
                    );

                    let mut offset = input.layout.offset();
                    let mut rest = position;
                    for (d, &dim) in index_shape.iter().enumerate().rev() {
                        let coord = if d == axis { target as usize } else { rest % dim };
                        offset += coord * strides[d];
                        rest /= dim;
                    }
                    Ok(read_at(input, input_bytes, offset))
                })
                .collect()
        })
    })
}
