use snafu::Snafu;

use crate::queue::Fault;
use crate::registry::DeviceSpec;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device does not have enough free memory for the request.
    #[snafu(display("allocation of {requested} bytes on {device} failed: {available} bytes available"))]
    OutOfMemory { device: DeviceSpec, requested: usize, available: usize },

    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// View addresses memory outside of its buffer. `extent` is `None` when
    /// the addressed range overflows `usize`.
    #[snafu(display(
        "invalid view: shape {shape:?} strides {strides:?} offset {offset} addresses {} elements, buffer holds {buffer_len}",
        extent.map_or_else(|| "more than usize::MAX".to_string(), |extent| extent.to_string())
    ))]
    InvalidView { shape: Vec<usize>, strides: Vec<usize>, offset: usize, extent: Option<usize>, buffer_len: usize },

    #[snafu(display("cannot reshape {from:?} into {to:?}"))]
    ReshapeIncompatible { from: Vec<usize>, to: Vec<usize> },

    #[snafu(display("cannot view a non-contiguous layout {shape:?} (strides {strides:?}) as another shape"))]
    NonContiguous { shape: Vec<usize>, strides: Vec<usize> },

    #[snafu(display("axis {axis} is out of range for {ndim} dimensions"))]
    AxisOutOfRange { axis: isize, ndim: usize },

    #[snafu(display("invalid permutation {axes:?} for {ndim} dimensions"))]
    InvalidPermutation { axes: Vec<usize>, ndim: usize },

    #[snafu(display("cannot broadcast {from:?} to {to:?}"))]
    BroadcastIncompatible { from: Vec<usize>, to: Vec<usize> },

    #[snafu(display("cannot squeeze axis {axis}: size is {size}, not 1"))]
    SqueezeNotOne { axis: usize, size: usize },

    #[snafu(display("narrow of axis {axis} with range {start}..{end} exceeds size {size}"))]
    NarrowOutOfRange { axis: usize, start: usize, end: usize, size: usize },

    /// Unparseable device string.
    #[snafu(display("invalid device: {device}"))]
    InvalidDevice { device: String },

    #[snafu(display("failed to spawn execution engine for {device}"))]
    EngineSpawn { device: DeviceSpec, source: std::io::Error },

    /// Failure raised asynchronously by an engine thread.
    #[snafu(display("{fault}"))]
    Deferred { fault: Fault },
}
