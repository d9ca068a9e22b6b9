//! Broadcasting operations for tensors.
//!
//! Implements NumPy-style broadcasting rules:
//! - Shapes are aligned from the right (trailing dimensions)
//! - Missing dimensions are treated as 1
//! - For each dimension, sizes must either match or one must be 1
//!
//! Expansion is virtual: broadcast dimensions get stride 0 and no data is
//! duplicated.

use smallvec::SmallVec;
use snafu::OptionExt;

use super::*;

/// Trailing-aligned broadcast of two shapes, `None` when incompatible.
///
/// ```
/// # use kiln_tensor::broadcast::broadcast_shape;
/// assert_eq!(broadcast_shape(&[2, 1, 4], &[3, 1]).as_deref(), Some(&[2, 3, 4][..]));
/// assert_eq!(broadcast_shape(&[2, 5], &[3, 5]), None);
/// ```
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Option<SmallVec<[usize; 4]>> {
    let ndim = lhs.len().max(rhs.len());
    let dim = |shape: &[usize], i: usize| {
        let padding = ndim - shape.len();
        if i < padding { 1 } else { shape[i - padding] }
    };

    (0..ndim)
        .map(|i| match (dim(lhs, i), dim(rhs, i)) {
            (a, b) if a == b => Some(a),
            (1, b) => Some(b),
            (a, 1) => Some(a),
            _ => None,
        })
        .collect()
}

impl Tensor {
    /// Broadcast two tensors to their common shape for a binary operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the shapes cannot be broadcast.
    pub(crate) fn broadcast_for_binop(&self, other: &Tensor, operation: &'static str) -> Result<(Tensor, Tensor)> {
        // Early return if shapes already match
        if self.shape() == other.shape() {
            return Ok((self.clone(), other.clone()));
        }

        let shape = broadcast_shape(self.shape(), other.shape()).context(ShapeMismatchSnafu {
            operation,
            lhs: self.shape().to_vec(),
            rhs: other.shape().to_vec(),
        })?;

        Ok((self.broadcast_to(&shape)?, other.broadcast_to(&shape)?))
    }

    /// View this tensor with `shape`, expanding size-1 and missing leading
    /// dimensions with stride 0.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let row = Tensor::from_slice([1i32, 2, 3])?;
    /// let grid = row.broadcast_to(&[2, 3])?;
    /// assert_eq!(grid.strides(), &[0, 1]);
    /// assert!(grid.shares_storage(&row));
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Tensor> {
        if self.shape() == shape {
            return Ok(self.clone());
        }

        let layout = self.layout.broadcast_to(shape).map_err(|_| Error::ShapeMismatch {
            operation: "broadcast_to",
            lhs: self.shape().to_vec(),
            rhs: shape.to_vec(),
        })?;
        Ok(self.with_layout(layout))
    }
}
