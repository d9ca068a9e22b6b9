//! Matrix multiplication.
//!
//! The engine multiplies `(m, k) x (k, n)`; vectors are lifted to matrices
//! with stride views before dispatch and the added dimension is dropped from
//! the result.

use kiln_runtime::OpKind;
use snafu::ensure;

use super::*;
use crate::dispatch::dispatch;

impl Tensor {
    /// Dot product / matrix multiplication.
    ///
    /// - 1D @ 1D: dot product (0-d tensor)
    /// - 2D @ 2D: matrix multiplication
    /// - 1D @ 2D: vector @ matrix
    /// - 2D @ 1D: matrix @ vector
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let a = Tensor::from_slice([1.0f32, 2.0, 3.0])?;
    /// let b = Tensor::from_slice([4.0f32, 5.0, 6.0])?;
    /// assert_eq!(a.dot(&b)?.item::<f32>()?, 32.0);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::DotDimension`] for 0-d operands or operands above 2-D
    /// - [`Error::ShapeMismatch`] when the contracted dimensions differ
    pub fn dot(&self, other: &Tensor) -> Result<Tensor> {
        let (dx, dw) = (self.ndim(), other.ndim());
        ensure!((1..=2).contains(&dx) && (1..=2).contains(&dw), DotDimensionSnafu { lhs_dims: dx, rhs_dims: dw });
        self.ensure_same_device(other, "matmul")?;
        self.ensure_same_dtype(other, "matmul")?;

        let lhs = if dx == 1 { self.try_unsqueeze(0)? } else { self.clone() };
        let rhs = if dw == 1 { other.try_unsqueeze(1)? } else { other.clone() };
        let (m, k) = (lhs.shape()[0], lhs.shape()[1]);
        let n = rhs.shape()[1];
        ensure!(
            k == rhs.shape()[0],
            ShapeMismatchSnafu { operation: "matmul", lhs: self.shape().to_vec(), rhs: other.shape().to_vec() }
        );

        let product = dispatch(&self.ctx, OpKind::Matmul, [lhs.storage(), rhs.storage()], &[m, n], self.dtype())?;

        // The output is contiguous, so dropping the lifted dimensions is a view.
        let mut shape = Vec::with_capacity(2);
        if dx == 2 {
            shape.push(m);
        }
        if dw == 2 {
            shape.push(n);
        }
        Ok(product.with_layout(Layout::contiguous(&shape)))
    }

    /// Matrix multiplication. Equivalent to `self.dot(other)`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let a = Tensor::from_slice([1i64, 2, 3, 4, 5, 6])?.try_reshape(&[2, 3])?;
    /// let b = Tensor::from_slice([7i64, 8, 9, 10, 11, 12])?.try_reshape(&[3, 2])?;
    /// assert_eq!(a.matmul(&b)?.to_vec::<i64>()?, vec![58, 64, 139, 154]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        self.dot(other)
    }
}
