//! Tensor constructors.
//!
//! Constructors taking a [`DeviceContext`] create the tensor on that device.
//! `from_slice` and `arange` are host conveniences on the process-global
//! runtime. Host data bound for an accelerator is assembled on the CPU
//! context first and uploaded through the transfer engine.

use kiln_runtime::OpKind;
use ndarray::{ArrayBase, Data, Dimension};
use snafu::ensure;

use super::*;
use crate::dispatch::{allocate, submit};

impl Tensor {
    /// Allocate a contiguous tensor without initializing it.
    ///
    /// # Errors
    ///
    /// Fails with an out-of-memory runtime error when the device capacity is
    /// exceeded even after its allocation cache has been released.
    pub fn empty(shape: &[usize], dtype: DType, ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        allocate(ctx, shape, dtype)
    }

    pub fn zeros(shape: &[usize], dtype: DType, ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        Self::filled(shape, dtype.zero(), dtype, ctx)
    }

    pub fn ones(shape: &[usize], dtype: DType, ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        Self::filled(shape, dtype.one(), dtype, ctx)
    }

    /// Tensor of `shape` with every element set to `value`; the dtype follows `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::{DeviceSpec, Tensor};
    /// let cpu = kiln_tensor::device(DeviceSpec::Cpu)?;
    /// let t = Tensor::full(&[2, 2], 1.5f64, &cpu)?;
    /// assert_eq!(t.to_vec::<f64>()?, vec![1.5; 4]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn full<T: HasDType>(shape: &[usize], value: T, ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        Self::filled(shape, value.into_scalar(), T::DTYPE, ctx)
    }

    fn filled(shape: &[usize], value: Scalar, dtype: DType, ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        let tensor = allocate(ctx, shape, dtype)?;
        submit(ctx, OpKind::Fill(value), [], [&tensor]);
        Ok(tensor)
    }

    /// Tensor of `shape` holding `values` in row-major order.
    ///
    /// # Errors
    ///
    /// [`Error::ElementCount`] when `values` does not fill `shape` exactly.
    pub fn from_vec<T: HasDType>(values: Vec<T>, shape: &[usize], ctx: &Arc<DeviceContext>) -> Result<Tensor> {
        // An unrepresentable element count can never match.
        let expected = Layout::checked_numel(shape).unwrap_or(usize::MAX);
        ensure!(
            values.len() == expected,
            ElementCountSnafu { operation: "from_vec", shape: shape.to_vec(), expected, actual: values.len() }
        );
        Self::upload(values.into_iter().map(HasDType::into_scalar), T::DTYPE, shape, ctx)
    }

    /// 1-D CPU tensor copied from `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::{DType, Tensor};
    /// let t = Tensor::from_slice([1u16, 2, 3])?;
    /// assert_eq!((t.shape(), t.dtype()), (&[3][..], DType::UInt16));
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn from_slice<T: HasDType>(values: impl AsRef<[T]>) -> Result<Tensor> {
        let values = values.as_ref();
        Self::upload(values.iter().map(|&v| v.into_scalar()), T::DTYPE, &[values.len()], &device(DeviceSpec::Cpu)?)
    }

    /// Tensor with the shape and logical element order of `array`.
    pub fn from_ndarray<T, S, D>(array: &ArrayBase<S, D>, ctx: &Arc<DeviceContext>) -> Result<Tensor>
    where
        T: HasDType,
        S: Data<Elem = T>,
        D: Dimension,
    {
        Self::upload(array.iter().map(|&v| v.into_scalar()), T::DTYPE, array.shape(), ctx)
    }

    /// `Int64` CPU tensor counting from `start` towards `stop` (exclusive) by
    /// `step`. With `stop` omitted the range is `0..start`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// assert_eq!(Tensor::arange(4, None, None)?.to_vec::<i64>()?, vec![0, 1, 2, 3]);
    /// assert_eq!(Tensor::arange(5, Some(0), Some(-2))?.to_vec::<i64>()?, vec![5, 3, 1]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn arange(start: i64, stop: Option<i64>, step: Option<i64>) -> Result<Tensor> {
        let (start, stop) = match stop {
            Some(stop) => (start, stop),
            None => (0, start),
        };
        let step = step.unwrap_or(1);
        ensure!(step != 0, ZeroStepSnafu);

        let ascending = step > 0;
        let len = if (stop > start) == ascending && stop != start {
            stop.abs_diff(start).div_ceil(step.unsigned_abs())
        } else {
            0
        };
        // Every produced value lies between `start` and `stop`, so wrapping is exact.
        let values = (0..len).map(|i| Scalar::Int(start.wrapping_add((i as i64).wrapping_mul(step))));
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        Self::upload(values, DType::Int64, &[len], &device(DeviceSpec::Cpu)?)
    }

    /// Encode `values` on the host and place them on `ctx`'s device.
    fn upload(
        values: impl Iterator<Item = Scalar>,
        dtype: DType,
        shape: &[usize],
        ctx: &Arc<DeviceContext>,
    ) -> Result<Tensor> {
        if ctx.device().is_accelerator() {
            let host = ctx.runtime().context(RuntimeSnafu)?.cpu().context(RuntimeSnafu)?;
            return Self::upload(values, dtype, shape, &host)?.to_device(ctx.device());
        }

        // Fresh buffer: no queued work can touch it yet.
        let tensor = allocate(ctx, shape, dtype)?;
        let width = dtype.bytes();
        tensor.buffer.with_bytes_mut(|bytes| {
            for (chunk, value) in bytes.chunks_exact_mut(width).zip(values) {
                dtype.write(value, chunk);
            }
        });
        Ok(tensor)
    }
}
