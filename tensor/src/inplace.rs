//! In-place operations.
//!
//! Each writes into the receiver's existing storage through its layout, so a
//! write through a view is visible through every other view of the buffer.
//! The record is enqueued on the receiver's own queue, after every operation
//! already enqueued there (including pending reads of the receiver).
//! Receivers whose layout addresses an element twice (stride-0 broadcast
//! views) are rejected.

use kiln_runtime::{BinaryOp, OpKind};

use super::*;
use crate::dispatch::dispatch_into;

impl Tensor {
    /// `self += other`, broadcasting `other` to the receiver's shape.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::{DType, DeviceSpec, Tensor};
    /// let cpu = kiln_tensor::device(DeviceSpec::Cpu)?;
    /// let t = Tensor::zeros(&[2, 2], DType::Int32, &cpu)?;
    /// t.add_(&Tensor::from_slice([1i32, 2])?)?;
    /// assert_eq!(t.to_vec::<i32>()?, vec![1, 2, 1, 2]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn add_(&self, other: &Tensor) -> Result<&Self> {
        self.binary_(BinaryOp::Add, other)
    }

    /// `self -= other`, broadcasting `other` to the receiver's shape.
    pub fn sub_(&self, other: &Tensor) -> Result<&Self> {
        self.binary_(BinaryOp::Sub, other)
    }

    /// `self *= other`, broadcasting `other` to the receiver's shape.
    pub fn mul_(&self, other: &Tensor) -> Result<&Self> {
        self.binary_(BinaryOp::Mul, other)
    }

    /// `self /= other`, broadcasting `other` to the receiver's shape.
    ///
    /// Integer division by zero is a deferred fault and leaves the receiver
    /// faulted.
    pub fn div_(&self, other: &Tensor) -> Result<&Self> {
        self.binary_(BinaryOp::Div, other)
    }

    /// Set every element addressed by the receiver to `value`, converted to
    /// the receiver's dtype.
    pub fn fill_<T: HasDType>(&self, value: T) -> Result<&Self> {
        self.ensure_writable("fill")?;
        let value = value.into_scalar().cast(self.dtype());
        dispatch_into(self, OpKind::Fill(value), []);
        Ok(self)
    }

    /// Copy `source` into the receiver, broadcasting it to the receiver's
    /// shape. Dtypes must match and both tensors must live on the same device.
    pub fn copy_from(&self, source: &Tensor) -> Result<&Self> {
        let source = self.operand_("copy", source)?;
        dispatch_into(self, OpKind::Copy, [source.storage()]);
        Ok(self)
    }

    fn binary_(&self, op: BinaryOp, other: &Tensor) -> Result<&Self> {
        let other = self.operand_(op.into(), other)?;
        dispatch_into(self, OpKind::Binary(op), [self.storage(), other.storage()]);
        Ok(self)
    }

    /// Validate the receiver and broadcast `other` to its shape.
    fn operand_(&self, operation: &'static str, other: &Tensor) -> Result<Tensor> {
        self.ensure_writable(operation)?;
        self.ensure_same_device(other, operation)?;
        self.ensure_same_dtype(other, operation)?;

        let layout = other.layout.broadcast_to(self.shape()).map_err(|_| Error::ShapeMismatch {
            operation,
            lhs: self.shape().to_vec(),
            rhs: other.shape().to_vec(),
        })?;
        Ok(other.with_layout(layout))
    }
}
