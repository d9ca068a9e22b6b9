//! Reading results back to the host.
//!
//! Every observation waits for the write that produced the tensor (not the
//! whole device queue) and fails with the original fault if that write, or
//! anything it was computed from, failed.

use std::fmt;

use ndarray::{ArrayD, IxDyn};
use snafu::{OptionExt, ensure};

use super::*;

impl Tensor {
    /// Elements in row-major order, decoded as dtype-independent scalars.
    pub fn to_scalars(&self) -> Result<Vec<Scalar>> {
        let host = self.on_host()?;
        let dtype = host.dtype();
        let width = dtype.bytes();
        Ok(host.buffer.with_bytes(|bytes| {
            host.layout.offsets().map(|offset| dtype.read(&bytes[offset * width..(offset + 1) * width])).collect()
        }))
    }

    /// Elements in row-major order. `T` must match the tensor's dtype.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::from_slice([1i32, 2, 3, 4])?.try_reshape(&[2, 2])?.try_transpose(0, 1)?;
    /// assert_eq!(t.to_vec::<i32>()?, vec![1, 3, 2, 4]);
    /// assert!(t.to_vec::<i64>().is_err());
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn to_vec<T: HasDType>(&self) -> Result<Vec<T>> {
        ensure!(
            self.dtype() == T::DTYPE,
            DtypeMismatchSnafu { operation: "to_vec", lhs: self.dtype(), rhs: T::DTYPE, hint: None }
        );
        Ok(self.to_scalars()?.into_iter().map(T::from_scalar).collect())
    }

    /// The single element of a one-element tensor.
    pub fn item<T: HasDType>(&self) -> Result<T> {
        let numel = self.numel();
        ensure!(numel == 1, NotScalarSnafu { numel });
        self.to_vec::<T>()?.pop().context(NotScalarSnafu { numel })
    }

    /// Copy into an owned `ndarray` array of the same shape.
    pub fn to_ndarray<T: HasDType>(&self) -> Result<ArrayD<T>> {
        let values = self.to_vec::<T>()?;
        let actual = values.len();
        ArrayD::from_shape_vec(IxDyn(self.shape()), values).map_err(|_| Error::ElementCount {
            operation: "to_ndarray",
            shape: self.shape().to_vec(),
            expected: self.numel(),
            actual,
        })
    }

    /// A handle whose bytes are readable on the host: the tensor itself once
    /// its producing write completed, or a CPU copy of an accelerator tensor.
    fn on_host(&self) -> Result<Tensor> {
        if self.device().is_accelerator() {
            return self.to_device(DeviceSpec::Cpu);
        }
        self.ctx.observe(&self.buffer).context(RuntimeSnafu)?;
        Ok(self.clone())
    }
}

impl fmt::Display for Tensor {
    /// Nested-bracket rendering; waits for the tensor's value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(")?;
        match self.to_scalars() {
            Ok(values) => write_nested(f, self.shape(), &values)?,
            Err(error) => write!(f, "<{error}>")?,
        }
        write!(f, ", dtype={}, device={})", self.dtype(), self.device())
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, shape: &[usize], values: &[Scalar]) -> fmt::Result {
    let Some((&outer, inner)) = shape.split_first() else {
        return match values.first() {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        };
    };

    let chunk = inner.iter().product::<usize>();
    write!(f, "[")?;
    for i in 0..outer {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_nested(f, inner, &values[i * chunk..(i + 1) * chunk])?;
    }
    write!(f, "]")
}
