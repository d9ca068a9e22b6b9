use kiln_device::{DeviceSpec, Fault};
use kiln_dtype::DType;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Allocation, synchronization or transfer failure, including deferred faults.
    #[snafu(display("{source}"))]
    Runtime { source: kiln_runtime::Error },

    /// View construction failure (out of bounds, non-contiguous reshape, ...).
    #[snafu(display("{source}"))]
    Layout { source: kiln_device::Error },

    #[snafu(display("Operation '{operation}' mixes devices {lhs} and {rhs}; transfer one operand explicitly"))]
    DeviceMismatch { operation: &'static str, lhs: DeviceSpec, rhs: DeviceSpec },

    #[snafu(display(
        "Operation '{operation}' mixes dtypes {lhs} and {rhs}{}",
        hint.map(|dtype| format!("; cast both to {dtype} explicitly")).unwrap_or_default()
    ))]
    DtypeMismatch { operation: &'static str, lhs: DType, rhs: DType, hint: Option<DType> },

    #[snafu(display("Operation '{operation}' cannot combine shapes {lhs:?} and {rhs:?}"))]
    ShapeMismatch { operation: &'static str, lhs: Vec<usize>, rhs: Vec<usize> },

    #[snafu(display("Operation '{operation}' does not support dtype {dtype}"))]
    UnsupportedDtype { operation: &'static str, dtype: DType },

    #[snafu(display(
        "In-place '{operation}' on a layout that addresses elements more than once (shape {shape:?}, strides {strides:?})"
    ))]
    OverlappingWrite { operation: &'static str, shape: Vec<usize>, strides: Vec<usize> },

    #[snafu(display("Axis {axis} is out of range for tensor with {ndim} dimensions"))]
    AxisOutOfRange { axis: isize, ndim: usize },

    #[snafu(display("Invalid permutation: axes {axes:?} is not a valid permutation"))]
    InvalidPermutation { axes: Vec<isize> },

    #[snafu(display("Multiple -1 dimensions in reshape are not allowed"))]
    MultipleInferDimensions,

    #[snafu(display("Negative dimension {dim} is not allowed (except -1 for inference)"))]
    NegativeDimension { dim: isize },

    #[snafu(display("Cannot reshape {from:?} into {to:?}"))]
    ReshapeSizeMismatch { from: Vec<usize>, to: Vec<isize> },

    #[snafu(display("Operation '{operation}' cannot reduce empty axis {axis}"))]
    EmptyReduction { operation: &'static str, axis: usize },

    #[snafu(display("Operation '{operation}' requires {expected} values for shape {shape:?}, got {actual}"))]
    ElementCount { operation: &'static str, shape: Vec<usize>, expected: usize, actual: usize },

    #[snafu(display("Expected a single element, tensor holds {numel}"))]
    NotScalar { numel: usize },

    #[snafu(display(
        "Matrix multiplication supports 1-D and 2-D operands, got lhs: {lhs_dims}D, rhs: {rhs_dims}D"
    ))]
    DotDimension { lhs_dims: usize, rhs_dims: usize },

    #[snafu(display("arange step must be non-zero"))]
    ZeroStep,
}

impl Error {
    /// The engine fault behind a deferred failure, if that is what this is.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Runtime { source: kiln_runtime::Error::Deferred { fault } } => Some(fault),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
