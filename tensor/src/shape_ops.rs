//! Shape manipulation operations for Tensors.
//!
//! Every operation here returns a view sharing the receiver's buffer:
//! - Reshape: Change shape while preserving total elements (contiguous only)
//! - Permute: Reorder dimensions
//! - Transpose: Swap two dimensions (convenience wrapper for permute)
//! - Narrow: Restrict one dimension to a sub-range
//! - Expand: Broadcast dimensions from size 1
//! - Squeeze: Remove dimensions of size 1
//! - Unsqueeze: Add dimensions of size 1
//! - View: Arbitrary shape, strides and offset, bounds-checked

use snafu::ensure;

use super::*;

impl Tensor {
    /// Reshape tensor to a new shape.
    ///
    /// The total number of elements must remain the same.
    /// Supports negative indices: -1 means "infer this dimension".
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::from_slice([1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    /// assert_eq!(t.try_reshape(&[2, 3])?.shape(), &[2, 3]);
    /// assert_eq!(t.try_reshape(&[-1, 2])?.shape(), &[3, 2]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Shape contains negative values other than -1
    /// - Multiple -1 dimensions specified
    /// - Total elements don't match
    /// - The tensor is not contiguous (call [`contiguous`](Self::contiguous) first)
    #[track_caller]
    pub fn try_reshape(&self, new_shape: &[isize]) -> Result<Tensor> {
        let shape = self.resolve_shape_with_inference(new_shape)?;
        let layout = self.layout.reshape(&shape).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Permute (reorder) tensor dimensions.
    ///
    /// Each axis index 0..ndim must appear exactly once; negative indices count
    /// from the end.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::from_slice([0i32; 24])?.try_reshape(&[2, 3, 4])?;
    /// assert_eq!(t.try_permute(&[2, 0, 1])?.shape(), &[4, 2, 3]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    #[track_caller]
    pub fn try_permute(&self, axes: &[isize]) -> Result<Tensor> {
        let axes = self.normalize_permutation(axes)?;
        let layout = self.layout.permute(&axes).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Swap two dimensions.
    #[track_caller]
    pub fn try_transpose(&self, dim0: isize, dim1: isize) -> Result<Tensor> {
        let ndim = self.ndim();
        let (a, b) = (normalize_axis(dim0, ndim)?, normalize_axis(dim1, ndim)?);
        let layout = self.layout.transpose(a, b).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Restrict `axis` to `start..start + len`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::arange(0, Some(10), None)?;
    /// assert_eq!(t.narrow(0, 2, 3)?.to_vec::<i64>()?, vec![2, 3, 4]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn narrow(&self, axis: isize, start: usize, len: usize) -> Result<Tensor> {
        let axis = normalize_axis(axis, self.ndim())?;
        let layout = self.layout.narrow(axis, start, len).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Broadcast to `new_shape`; -1 keeps the corresponding current dimension.
    ///
    /// New dimensions may be prepended. The result is a stride-0 view and
    /// cannot be written in place.
    #[track_caller]
    pub fn try_expand(&self, new_shape: &[isize]) -> Result<Tensor> {
        let shape = self.resolve_expand_shape(new_shape)?;
        self.broadcast_to(&shape)
    }

    /// Remove a size-1 dimension, or every size-1 dimension when `dim` is `None`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Specified dimension is not size 1
    /// - Axis index out of range
    #[track_caller]
    pub fn try_squeeze(&self, dim: Option<isize>) -> Result<Tensor> {
        let layout = match dim {
            Some(axis) => {
                let axis = normalize_axis(axis, self.ndim())?;
                self.layout.squeeze(axis).context(LayoutSnafu)?
            }
            // Walk backwards so earlier indices stay valid.
            None => (0..self.ndim())
                .rev()
                .filter(|&axis| self.shape()[axis] == 1)
                .try_fold(self.layout.clone(), |layout, axis| layout.squeeze(axis))
                .context(LayoutSnafu)?,
        };
        Ok(self.with_layout(layout))
    }

    /// Add a dimension of size 1.
    ///
    /// Supports negative indices: -1 means after the last dimension.
    #[track_caller]
    pub fn try_unsqueeze(&self, dim: isize) -> Result<Tensor> {
        let ndim = self.ndim();

        // For unsqueeze, valid range is [0, ndim] (can insert at end)
        let axis = normalize_axis(dim, ndim + 1)?;
        let layout = self.layout.unsqueeze(axis).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Flatten tensor to 1D. Equivalent to `try_reshape(&[-1])`.
    #[track_caller]
    pub fn flatten(&self) -> Result<Tensor> {
        self.try_reshape(&[-1])
    }

    /// View the same buffer through an explicit shape, strides and offset
    /// (all in elements).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] wrapping an invalid-view error if any
    /// addressed element lies outside the buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::arange(0, Some(6), None)?;
    /// let odd = t.view(&[3], &[2], 1)?;
    /// assert_eq!(odd.to_vec::<i64>()?, vec![1, 3, 5]);
    /// assert!(t.view(&[4], &[2], 1).is_err());
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn view(&self, shape: &[usize], strides: &[usize], offset: usize) -> Result<Tensor> {
        ensure!(
            shape.len() == strides.len(),
            ShapeMismatchSnafu { operation: "view", lhs: shape.to_vec(), rhs: strides.to_vec() }
        );
        let layout = Layout::new(shape, strides, offset);
        layout.validate(self.buffer.len()).context(LayoutSnafu)?;
        Ok(self.with_layout(layout))
    }

    /// Validate that `axes` is a permutation of `0..ndim`.
    fn normalize_permutation(&self, axes: &[isize]) -> Result<Vec<usize>> {
        let ndim = self.ndim();
        ensure!(axes.len() == ndim, InvalidPermutationSnafu { axes: axes.to_vec() });

        let mut seen = vec![false; ndim];
        let mut normalized = Vec::with_capacity(ndim);
        for &axis in axes {
            let idx = normalize_axis(axis, ndim)?;
            ensure!(!seen[idx], InvalidPermutationSnafu { axes: axes.to_vec() });
            seen[idx] = true;
            normalized.push(idx);
        }
        Ok(normalized)
    }

    /// Resolve reshape shape with -1 inference.
    fn resolve_shape_with_inference(&self, shape_spec: &[isize]) -> Result<Vec<usize>> {
        ensure!(shape_spec.iter().filter(|&&s| s == -1).count() <= 1, MultipleInferDimensionsSnafu);
        for &dim in shape_spec {
            ensure!(dim >= -1, NegativeDimensionSnafu { dim });
        }

        let total = self.numel();
        let mismatch = || ReshapeSizeMismatchSnafu { from: self.shape().to_vec(), to: shape_spec.to_vec() };
        let known = shape_spec
            .iter()
            .filter(|&&s| s >= 0)
            .try_fold(1usize, |acc, &s| acc.checked_mul(s as usize))
            .ok_or_else(|| mismatch().build())?;

        let shape: Vec<usize> = if shape_spec.contains(&-1) {
            ensure!(known != 0 && total % known == 0, mismatch());
            shape_spec.iter().map(|&s| if s == -1 { total / known } else { s as usize }).collect()
        } else {
            shape_spec.iter().map(|&s| s as usize).collect()
        };

        ensure!(Layout::checked_numel(&shape) == Some(total), mismatch());
        Ok(shape)
    }

    /// Resolve expand shape with -1 meaning "keep current dimension".
    fn resolve_expand_shape(&self, shape_spec: &[isize]) -> Result<Vec<usize>> {
        let current = self.shape();
        let mismatch =
            || Error::ShapeMismatch { operation: "expand", lhs: current.to_vec(), rhs: Vec::new() };
        let padding = shape_spec.len().checked_sub(current.len()).ok_or_else(mismatch)?;

        shape_spec
            .iter()
            .enumerate()
            .map(|(i, &spec)| match spec {
                -1 if i >= padding => Ok(current[i - padding]),
                -1 => Err(mismatch()),
                spec if spec < 0 => NegativeDimensionSnafu { dim: spec }.fail(),
                spec => Ok(spec as usize),
            })
            .collect()
    }
}

/// [`kiln_device::normalize_axis`] reported against the tensor.
pub(crate) fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    kiln_device::normalize_axis(axis, ndim).map_err(|_| AxisOutOfRangeSnafu { axis, ndim }.build())
}
