//! Error types for the runtime.

use kiln_device::{DeviceSpec, Fault};
use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Allocation, view or queue failure from the device layer.
    #[snafu(display("{source}"))]
    Device { source: kiln_device::Error },

    /// Logical device is not part of this process' visible set.
    #[snafu(display("{device} is not available: {visible} accelerator(s) visible"))]
    DeviceUnavailable { device: DeviceSpec, visible: usize },

    /// Failure raised by an earlier, asynchronously executed operation.
    #[snafu(display("deferred failure: {fault}"))]
    Deferred { fault: Fault },

    #[snafu(display("runtime owning {device} has been shut down"))]
    RuntimeShutdown { device: DeviceSpec },
}

impl From<kiln_device::Error> for Error {
    /// Deferred device faults surface as [`Error::Deferred`].
    fn from(source: kiln_device::Error) -> Self {
        match source {
            kiln_device::Error::Deferred { fault } => Self::Deferred { fault },
            source => Self::Device { source },
        }
    }
}
