//! Tensors with asynchronous per-device execution.
//!
//! A [`Tensor`] is a handle: a shared device [`Buffer`], a [`Layout`] that
//! addresses it, and the [`DeviceContext`] owning both. Operations validate
//! their operands, allocate the output eagerly, enqueue an operation record on
//! the device queue and return immediately. Reading a result (`to_vec`,
//! `item`, `to_ndarray`, `Display`) or moving it to another device waits for
//! exactly the work that produced it.
//!
//! # Examples
//!
//! ```
//! # use kiln_tensor::Tensor;
//! let a = Tensor::from_slice([1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?.try_reshape(&[2, 3])?;
//! let b = Tensor::from_slice([10.0f32, 20.0, 30.0])?;
//! let c = (&a * &b)?; // enqueued, not yet computed
//! assert_eq!(c.to_vec::<f32>()?, vec![10.0, 40.0, 90.0, 40.0, 100.0, 180.0]);
//! # Ok::<(), kiln_tensor::Error>(())
//! ```
//!
//! Devices and dtypes never mix implicitly: combining operands from different
//! devices or of different dtypes fails at dispatch, and conversions go
//! through [`Tensor::to_device`] and [`Tensor::to_dtype`].

use std::sync::Arc;

use kiln_device::{Buffer, Layout};
use kiln_runtime::{DeviceContext, StorageRef};
use snafu::ResultExt;

pub mod error;
use error::*;

pub mod arithmetic;
pub mod broadcast;
pub mod convert;
pub mod creation;
mod dispatch;
pub mod inplace;
pub mod matmul;
pub mod observe;
pub mod reduce;
pub mod shape_ops;
pub mod traits;

pub use error::{Error, Result};
pub use kiln_device::DeviceSpec;
pub use kiln_dtype::{DType, HasDType, Scalar};
pub use reduce::AxisSpec;

/// Handle to (a view of) a buffer on one device.
///
/// Cloning a tensor clones the handle; both clones address the same memory.
#[derive(Clone)]
pub struct Tensor {
    buffer: Buffer,
    layout: Layout,
    ctx: Arc<DeviceContext>,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("offset", &self.layout.offset())
            .field("dtype", &self.dtype())
            .field("device", &self.device())
            .field("buffer", &self.buffer.id())
            .finish()
    }
}

impl Tensor {
    fn new(buffer: Buffer, layout: Layout, ctx: Arc<DeviceContext>) -> Self {
        Self { buffer, layout, ctx }
    }

    /// Same storage, different layout.
    fn with_layout(&self, layout: Layout) -> Self {
        Self::new(self.buffer.clone(), layout, Arc::clone(&self.ctx))
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn strides(&self) -> &[usize] {
        self.layout.strides()
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    pub fn device(&self) -> DeviceSpec {
        self.ctx.device()
    }

    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Whether both handles address the same buffer.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        self.buffer.same_storage(&other.buffer)
    }

    /// Block until everything enqueued on this tensor's device has completed.
    ///
    /// Reports the first failure recorded on the device since the previous call.
    pub fn synchronize(&self) -> Result<()> {
        self.ctx.synchronize().context(RuntimeSnafu)
    }

    pub(crate) fn storage(&self) -> StorageRef {
        StorageRef::new(self.buffer.clone(), self.layout.clone())
    }
}

/// Context of `device` on the process-global runtime.
pub fn device(device: DeviceSpec) -> Result<Arc<DeviceContext>> {
    kiln_runtime::runtime().context(device).context(RuntimeSnafu)
}

/// Synchronize `device` on the process-global runtime.
pub fn synchronize(device: DeviceSpec) -> Result<()> {
    self::device(device)?.synchronize().context(RuntimeSnafu)
}

#[cfg(test)]
mod test;
