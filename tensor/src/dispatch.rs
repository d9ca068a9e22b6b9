//! Operand validation and record submission.

use std::sync::Arc;

use kiln_device::Layout;
use kiln_dtype::DType;
use kiln_runtime::{DeviceContext, OpKind, OperationRecord, StorageRef};
use smallvec::SmallVec;
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::error::*;
use crate::Tensor;

impl Tensor {
    /// Fail unless `other` lives on the same device context.
    pub(crate) fn ensure_same_device(&self, other: &Tensor, operation: &'static str) -> Result<()> {
        ensure!(
            Arc::ptr_eq(&self.ctx, &other.ctx),
            DeviceMismatchSnafu { operation, lhs: self.device(), rhs: other.device() }
        );
        Ok(())
    }

    /// Fail unless `other` has the same dtype, suggesting a common one.
    pub(crate) fn ensure_same_dtype(&self, other: &Tensor, operation: &'static str) -> Result<()> {
        let (lhs, rhs) = (self.dtype(), other.dtype());
        ensure!(
            lhs == rhs,
            DtypeMismatchSnafu { operation, lhs, rhs, hint: DType::least_upper_dtype(&[lhs, rhs]) }
        );
        Ok(())
    }

    pub(crate) fn ensure_float(&self, operation: &'static str) -> Result<()> {
        ensure!(self.dtype().is_float(), UnsupportedDtypeSnafu { operation, dtype: self.dtype() });
        Ok(())
    }

    /// Fail when writing through this layout would hit an element twice.
    pub(crate) fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        ensure!(
            !self.layout.may_overlap(),
            OverlappingWriteSnafu { operation, shape: self.shape().to_vec(), strides: self.strides().to_vec() }
        );
        Ok(())
    }
}

/// Allocate an uninitialized contiguous output on `ctx`.
pub(crate) fn allocate(ctx: &Arc<DeviceContext>, shape: &[usize], dtype: DType) -> Result<Tensor> {
    let layout = Layout::contiguous(shape);
    let buffer = ctx.allocate(dtype, layout.numel(), false).context(RuntimeSnafu)?;
    Ok(Tensor::new(buffer, layout, Arc::clone(ctx)))
}

/// Enqueue `kind` on `ctx` writing `outputs`; never waits for the device.
pub(crate) fn submit<'a>(
    ctx: &DeviceContext,
    kind: OpKind,
    inputs: impl IntoIterator<Item = StorageRef>,
    outputs: impl IntoIterator<Item = &'a Tensor>,
) -> u64 {
    let outputs: SmallVec<[StorageRef; 2]> = outputs.into_iter().map(Tensor::storage).collect();
    let count = outputs.len();
    let name = kind.name();
    let timeline = ctx.enqueue(OperationRecord::new(kind, inputs, outputs));
    debug!(device = %ctx.device(), operation = name, timeline, outputs = count, "dispatched");
    timeline
}

/// Allocate one output, enqueue `kind` into it and return it.
pub(crate) fn dispatch(
    ctx: &Arc<DeviceContext>,
    kind: OpKind,
    inputs: impl IntoIterator<Item = StorageRef>,
    shape: &[usize],
    dtype: DType,
) -> Result<Tensor> {
    let output = allocate(ctx, shape, dtype)?;
    submit(ctx, kind, inputs, [&output]);
    Ok(output)
}

/// Enqueue `kind` writing into `target`'s existing storage.
pub(crate) fn dispatch_into(target: &Tensor, kind: OpKind, inputs: impl IntoIterator<Item = StorageRef>) -> u64 {
    submit(&target.ctx, kind, inputs, [target])
}
