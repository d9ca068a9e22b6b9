//! Conversions that always produce a new, independent buffer.

use kiln_runtime::OpKind;
use tracing::debug;

use super::*;
use crate::dispatch::dispatch;

impl Tensor {
    /// Convert to `dtype` on the same device.
    ///
    /// Always copies, even when `dtype` is the current dtype. Float to
    /// integer truncates toward zero; integer narrowing wraps.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::{DType, Tensor};
    /// let t = Tensor::from_slice([1.9f32, -1.9, 300.0])?;
    /// assert_eq!(t.to_dtype(DType::Int16)?.to_vec::<i16>()?, vec![1, -1, 300]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn to_dtype(&self, dtype: DType) -> Result<Tensor> {
        dispatch(&self.ctx, OpKind::Cast, [self.storage()], self.shape(), dtype)
    }

    /// Alias of [`to_dtype`](Self::to_dtype).
    pub fn cast(&self, dtype: DType) -> Result<Tensor> {
        self.to_dtype(dtype)
    }

    /// Copy to `device`, producing a contiguous tensor with its own buffer.
    ///
    /// Copies on the same device are enqueued like any other operation.
    /// Copies between devices wait only for the write that produced this
    /// tensor, then go through the runtime's transfer engine; a faulted
    /// source fails with its original fault.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::{DeviceSpec, Tensor};
    /// let host = Tensor::from_slice([1u8, 2, 3])?;
    /// let copy = host.to_device(DeviceSpec::Cpu)?;
    /// assert!(!copy.shares_storage(&host));
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn to_device(&self, device: DeviceSpec) -> Result<Tensor> {
        if device == self.device() {
            return self.copy();
        }

        let runtime = self.ctx.runtime().context(RuntimeSnafu)?;
        let target = runtime.context(device).context(RuntimeSnafu)?;
        let buffer = runtime.transfers().transfer(&self.storage(), &self.ctx, &target).context(RuntimeSnafu)?;
        debug!(from = %self.device(), to = %device, bytes = buffer.size(), "tensor transferred");
        Ok(Tensor::new(buffer, Layout::contiguous(self.shape()), target))
    }

    /// Contiguous version of this tensor; shares storage if already contiguous.
    pub fn contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        self.copy()
    }

    /// Contiguous copy on the same device.
    fn copy(&self) -> Result<Tensor> {
        dispatch(&self.ctx, OpKind::Copy, [self.storage()], self.shape(), self.dtype())
    }
}
