//! Interpreting kernels executed by device engines.
//!
//! Every element is decoded into a [`Scalar`], computed in the widest type of
//! its category (`i64`, `u64` or `f64`) and encoded into the output dtype.
//! Output positions are processed in parallel with rayon; every reduction
//! accumulates its own elements sequentially in index order, so results do
//! not depend on thread scheduling.
//!
//! Kernels read all inputs before taking the write lock of an output, which
//! keeps in-place operations (output aliasing an input) deadlock-free.

mod elementwise;
mod gather;
mod matmul;
mod reduce;

use kiln_device::Layout;
use kiln_dtype::Scalar;
use rayon::prelude::*;
use snafu::Snafu;

use crate::record::{OpKind, StorageRef};

pub use elementwise::{binary, unary};

/// Failure of a kernel; becomes the `reason` of a device fault.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KernelError {
    #[snafu(display("integer division by zero"))]
    DivisionByZero,

    #[snafu(display("index {index} is out of bounds for axis {axis} with size {size}"))]
    IndexOutOfBounds { index: i64, axis: usize, size: usize },

    #[snafu(display("cannot reduce an empty axis {axis}"))]
    EmptyReduction { axis: usize },

    #[snafu(display("{operation} expects {inputs} input(s) and {outputs} output(s)"))]
    Arity { operation: &'static str, inputs: usize, outputs: usize },
}

pub type Result<T, E = KernelError> = std::result::Result<T, E>;

/// Run `kind` reading `inputs` and writing `outputs`.
pub fn execute(kind: &OpKind, inputs: &[StorageRef], outputs: &[StorageRef]) -> Result<()> {
    match kind {
        OpKind::Unary(op) => {
            let ([input], [out]) = arity::<1, 1>(kind, inputs, outputs)?;
            let values: Vec<Scalar> = load(input).into_par_iter().map(|x| unary(*op, x)).collect();
            store(out, &values);
        }
        OpKind::Binary(op) => {
            let ([lhs, rhs], [out]) = arity::<2, 1>(kind, inputs, outputs)?;
            let (lhs, rhs) = (load(lhs), load(rhs));
            let values = lhs
                .into_par_iter()
                .zip(rhs.into_par_iter())
                .map(|(a, b)| binary(*op, a, b))
                .collect::<Result<Vec<Scalar>>>()?;
            store(out, &values);
        }
        OpKind::Cast | OpKind::Copy => {
            let ([input], [out]) = arity::<1, 1>(kind, inputs, outputs)?;
            store(out, &load(input));
        }
        OpKind::Fill(value) => {
            let ([], [out]) = arity::<0, 1>(kind, inputs, outputs)?;
            store(out, &vec![*value; out.numel()]);
        }
        OpKind::Reduce { op, axes } => {
            let ([input], [out]) = arity::<1, 1>(kind, inputs, outputs)?;
            store(out, &reduce::reduce(*op, input, axes));
        }
        OpKind::Extremum { op, axis, values: true } => {
            let ([input], [values, indices]) = arity::<1, 2>(kind, inputs, outputs)?;
            let (best, positions) = reduce::extremum(*op, input, *axis)?;
            store(values, &best);
            store(indices, &positions);
        }
        OpKind::Extremum { op, axis, values: false } => {
            let ([input], [indices]) = arity::<1, 1>(kind, inputs, outputs)?;
            let (_, positions) = reduce::extremum(*op, input, *axis)?;
            store(indices, &positions);
        }
        OpKind::Matmul => {
            let ([lhs, rhs], [out]) = arity::<2, 1>(kind, inputs, outputs)?;
            store(out, &matmul::matmul(lhs, rhs));
        }
        OpKind::Gather { axis } => {
            let ([input, index], [out]) = arity::<2, 1>(kind, inputs, outputs)?;
            store(out, &gather::gather(input, index, *axis)?);
        }
    }
    Ok(())
}

fn arity<'a, const I: usize, const O: usize>(
    kind: &OpKind,
    inputs: &'a [StorageRef],
    outputs: &'a [StorageRef],
) -> Result<(&'a [StorageRef; I], &'a [StorageRef; O])> {
    match (inputs.try_into(), outputs.try_into()) {
        (Ok(inputs), Ok(outputs)) => Ok((inputs, outputs)),
        _ => AritySnafu { operation: kind.name(), inputs: I, outputs: O }.fail(),
    }
}

/// Decode one element at element offset `offset`.
fn read_at(storage: &StorageRef, bytes: &[u8], offset: usize) -> Scalar {
    let width = storage.dtype().bytes();
    storage.dtype().read(&bytes[offset * width..(offset + 1) * width])
}

/// Decode every element addressed by `storage`, in row-major order.
fn load(storage: &StorageRef) -> Vec<Scalar> {
    let layout = &storage.layout;
    storage.buffer.with_bytes(|bytes| {
        (0..layout.numel()).into_par_iter().map(|i| read_at(storage, bytes, layout.offset_of(i))).collect()
    })
}

/// Encode `values` (row-major) into the elements addressed by `storage`.
fn store(storage: &StorageRef, values: &[Scalar]) {
    let dtype = storage.dtype();
    let width = dtype.bytes();
    let layout: &Layout = &storage.layout;

    storage.buffer.with_bytes_mut(|bytes| {
        if layout.is_contiguous() {
            let start = layout.offset() * width;
            bytes[start..start + values.len() * width]
                .par_chunks_mut(width)
                .zip(values.par_iter())
                .for_each(|(out, &value)| dtype.write(value, out));
        } else {
            for (i, &value) in values.iter().enumerate() {
                let offset = layout.offset_of(i) * width;
                dtype.write(value, &mut bytes[offset..offset + width]);
            }
        }
    });
}

/// Split `layout` into the kept axes (carrying the offset) and the reduced axes.
fn split_layout(layout: &Layout, reduced_axes: &[usize]) -> (Layout, Layout) {
    let (mut kept_shape, mut kept_strides) = (Vec::new(), Vec::new());
    let (mut red_shape, mut red_strides) = (Vec::new(), Vec::new());

    for (axis, (&dim, &stride)) in layout.shape().iter().zip(layout.strides()).enumerate() {
        if reduced_axes.contains(&axis) {
            red_shape.push(dim);
            red_strides.push(stride);
        } else {
            kept_shape.push(dim);
            kept_strides.push(stride);
        }
    }

    (Layout::new(&kept_shape, &kept_strides, layout.offset()), Layout::new(&red_shape, &red_strides, 0))
}
