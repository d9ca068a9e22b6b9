//! Strided element addressing.
//!
//! A [`Layout`] maps a multi-dimensional index to an element offset inside a
//! flat buffer: `offset + sum(index[d] * strides[d])`. Views are new layouts
//! over the same buffer; broadcasting uses stride 0 so expanded dimensions
//! never duplicate data.

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::*;

/// Shape or stride vector (stack-allocated for 0-4D tensors).
pub type Dims = SmallVec<[usize; 4]>;

/// Normalize a possibly negative axis into `0..ndim`.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    let normalized = if axis < 0 { axis + ndim as isize } else { axis };
    ensure!(normalized >= 0 && (normalized as usize) < ndim, AxisOutOfRangeSnafu { axis, ndim });
    Ok(normalized as usize)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    shape: Dims,
    strides: Dims,
    offset: usize,
}

impl Layout {
    /// Row-major layout starting at element 0.
    pub fn contiguous(shape: &[usize]) -> Self {
        Self { shape: Dims::from_slice(shape), strides: Self::contiguous_strides(shape), offset: 0 }
    }

    /// Arbitrary layout. Bounds are checked by [`validate`](Self::validate).
    pub fn new(shape: &[usize], strides: &[usize], offset: usize) -> Self {
        Self { shape: Dims::from_slice(shape), strides: Dims::from_slice(strides), offset }
    }

    /// Row-major strides. Saturates instead of wrapping for shapes whose
    /// element count does not fit in `usize`.
    pub fn contiguous_strides(shape: &[usize]) -> Dims {
        let mut strides: Dims = smallvec::smallvec![0; shape.len()];
        let mut acc: usize = 1;
        for (stride, &dim) in strides.iter_mut().zip(shape).rev() {
            *stride = acc;
            acc = acc.saturating_mul(dim.max(1));
        }
        strides
    }

    /// Element count of `shape`, or `None` if it overflows `usize`.
    pub fn checked_numel(shape: &[usize]) -> Option<usize> {
        shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Element count, saturated at `usize::MAX`.
    pub fn numel(&self) -> usize {
        // A zero dimension still wins after saturation.
        self.shape.iter().fold(1usize, |acc, &dim| acc.saturating_mul(dim))
    }

    /// One past the largest element offset this layout can address (0 if
    /// empty), or `None` if that offset does not fit in `usize`.
    pub fn extent(&self) -> Option<usize> {
        if self.shape.contains(&0) {
            return Some(0);
        }
        self.shape
            .iter()
            .zip(&self.strides)
            .try_fold(self.offset, |end, (&dim, &stride)| (dim - 1).checked_mul(stride)?.checked_add(end))?
            .checked_add(1)
    }

    /// Check that every addressed element lies inside a buffer of `buffer_len` elements.
    pub fn validate(&self, buffer_len: usize) -> Result<()> {
        let extent = self.extent();
        ensure!(
            self.shape.len() == self.strides.len()
                && Self::checked_numel(&self.shape).is_some()
                && extent.is_some_and(|extent| extent <= buffer_len),
            InvalidViewSnafu {
                shape: self.shape.to_vec(),
                strides: self.strides.to_vec(),
                offset: self.offset,
                extent,
                buffer_len,
            }
        );
        Ok(())
    }

    /// Row-major and gap-free (size-1 dimensions may carry any stride).
    pub fn is_contiguous(&self) -> bool {
        let expected = Self::contiguous_strides(&self.shape);
        self.shape.iter().zip(&self.strides).zip(&expected).all(|((&dim, &stride), &want)| dim <= 1 || stride == want)
    }

    /// Whether two distinct indices may address the same element.
    ///
    /// Conservative: dimensions are sorted by stride and every stride must
    /// step over the full extent of the smaller ones.
    pub fn may_overlap(&self) -> bool {
        let mut dims: SmallVec<[(usize, usize); 4]> =
            self.shape.iter().zip(&self.strides).filter(|&(&dim, _)| dim > 1).map(|(&d, &s)| (s, d)).collect();
        dims.sort_unstable();

        let mut span = 1;
        for (stride, dim) in dims {
            if stride < span {
                return true;
            }
            span = stride.saturating_mul(dim - 1).saturating_add(span);
        }
        false
    }

    /// Element offset of the `index`-th element in row-major order.
    pub fn offset_of(&self, mut index: usize) -> usize {
        let mut offset = self.offset;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            offset += (index % dim) * stride;
            index /= dim;
        }
        offset
    }

    /// Element offsets in row-major order.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.numel()).map(|index| self.offset_of(index))
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        ensure!(
            Self::checked_numel(shape) == Some(self.numel()),
            ReshapeIncompatibleSnafu { from: self.shape.to_vec(), to: shape.to_vec() }
        );
        ensure!(
            self.is_contiguous(),
            NonContiguousSnafu { shape: self.shape.to_vec(), strides: self.strides.to_vec() }
        );
        Ok(Self { shape: Dims::from_slice(shape), strides: Self::contiguous_strides(shape), offset: self.offset })
    }

    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        let valid = axes.len() == ndim
            && axes.iter().all(|&axis| axis < ndim && !std::mem::replace(&mut seen[axis], true));
        ensure!(valid, InvalidPermutationSnafu { axes: axes.to_vec(), ndim });

        Ok(Self {
            shape: axes.iter().map(|&axis| self.shape[axis]).collect(),
            strides: axes.iter().map(|&axis| self.strides[axis]).collect(),
            offset: self.offset,
        })
    }

    pub fn transpose(&self, a: usize, b: usize) -> Result<Self> {
        let ndim = self.ndim();
        ensure!(a < ndim, AxisOutOfRangeSnafu { axis: a as isize, ndim });
        ensure!(b < ndim, AxisOutOfRangeSnafu { axis: b as isize, ndim });

        let mut axes: Vec<usize> = (0..ndim).collect();
        axes.swap(a, b);
        self.permute(&axes)
    }

    /// Restrict `axis` to `start..start + len`.
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Self> {
        let ndim = self.ndim();
        ensure!(axis < ndim, AxisOutOfRangeSnafu { axis: axis as isize, ndim });
        let size = self.shape[axis];
        let end = start.checked_add(len);
        ensure!(
            end.is_some_and(|end| end <= size),
            NarrowOutOfRangeSnafu { axis, start, end: start.saturating_add(len), size }
        );

        let mut narrowed = self.clone();
        narrowed.shape[axis] = len;
        if len > 0 {
            narrowed.offset += start * self.strides[axis];
        }
        Ok(narrowed)
    }

    /// Broadcast to `target` by trailing alignment; expanded dimensions get stride 0.
    pub fn broadcast_to(&self, target: &[usize]) -> Result<Self> {
        ensure!(
            self.ndim() <= target.len(),
            BroadcastIncompatibleSnafu { from: self.shape.to_vec(), to: target.to_vec() }
        );

        let padding = target.len() - self.ndim();
        let mut strides: Dims = smallvec::smallvec![0; target.len()];
        for (i, (&dim, &stride)) in self.shape.iter().zip(&self.strides).enumerate() {
            let want = target[padding + i];
            if dim == want {
                strides[padding + i] = stride;
            } else {
                ensure!(dim == 1, BroadcastIncompatibleSnafu { from: self.shape.to_vec(), to: target.to_vec() });
            }
        }

        Ok(Self { shape: Dims::from_slice(target), strides, offset: self.offset })
    }

    pub fn squeeze(&self, axis: usize) -> Result<Self> {
        let ndim = self.ndim();
        ensure!(axis < ndim, AxisOutOfRangeSnafu { axis: axis as isize, ndim });
        ensure!(self.shape[axis] == 1, SqueezeNotOneSnafu { axis, size: self.shape[axis] });

        let mut squeezed = self.clone();
        squeezed.shape.remove(axis);
        squeezed.strides.remove(axis);
        Ok(squeezed)
    }

    /// Insert a size-1 dimension before `axis` (`axis == ndim` appends).
    pub fn unsqueeze(&self, axis: usize) -> Result<Self> {
        let ndim = self.ndim();
        ensure!(axis <= ndim, AxisOutOfRangeSnafu { axis: axis as isize, ndim: ndim + 1 });

        let stride = if axis < ndim { self.strides[axis].saturating_mul(self.shape[axis]) } else { 1 };
        let mut unsqueezed = self.clone();
        unsqueezed.shape.insert(axis, 1);
        unsqueezed.strides.insert(axis, stride);
        Ok(unsqueezed)
    }
}
