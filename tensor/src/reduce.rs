//! Reduction operations for tensors.
//!
//! Sum, prod and mean reduce any set of axes; the extremum reductions
//! (`max`, `min`, `argmax`, `argmin`) reduce one axis and report the first
//! position of the extreme value as `Int64` indices.

use bon::bon;
use kiln_device::Dims;
use kiln_runtime::{ExtremumOp, OpKind, ReduceOp};
use snafu::ensure;

use super::*;
use crate::dispatch::{allocate, dispatch, submit};
use crate::shape_ops::normalize_axis;

/// Axes a reduction covers.
///
/// Supports:
/// - All axes: `AxisSpec::All` (from `()`)
/// - Single axis: `AxisSpec::Single(0)` (from `isize`)
/// - Multiple axes: `AxisSpec::Multiple(vec![0, 2])` (from `&[isize]` or `Vec<isize>`)
#[derive(Debug, Clone)]
pub enum AxisSpec {
    /// Reduce all axes (produces scalar).
    All,
    /// Reduce a single axis (supports negative indexing).
    Single(isize),
    /// Reduce multiple axes (each supports negative indexing).
    Multiple(Vec<isize>),
}

impl From<()> for AxisSpec {
    fn from(_: ()) -> Self {
        Self::All
    }
}

impl From<isize> for AxisSpec {
    fn from(axis: isize) -> Self {
        Self::Single(axis)
    }
}

impl From<&[isize]> for AxisSpec {
    fn from(axes: &[isize]) -> Self {
        Self::Multiple(axes.to_vec())
    }
}

impl<const N: usize> From<[isize; N]> for AxisSpec {
    fn from(axes: [isize; N]) -> Self {
        Self::Multiple(axes.to_vec())
    }
}

impl From<Vec<isize>> for AxisSpec {
    fn from(axes: Vec<isize>) -> Self {
        Self::Multiple(axes)
    }
}

impl AxisSpec {
    /// Normalized, sorted and deduplicated axes.
    fn resolve(&self, ndim: usize) -> Result<Dims> {
        let mut axes: Dims = match self {
            Self::All => (0..ndim).collect(),
            Self::Single(axis) => Dims::from_slice(&[normalize_axis(*axis, ndim)?]),
            Self::Multiple(axes) => axes.iter().map(|&axis| normalize_axis(axis, ndim)).collect::<Result<_>>()?,
        };
        axes.sort_unstable();
        axes.dedup();
        Ok(axes)
    }
}

/// Output shape after reducing `axes` of `shape`.
fn reduced_shape(shape: &[usize], axes: &[usize], keepdim: bool) -> Vec<usize> {
    shape
        .iter()
        .enumerate()
        .filter_map(|(i, &dim)| match (axes.contains(&i), keepdim) {
            (false, _) => Some(dim),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect()
}

#[bon]
impl Tensor {
    /// Sum of tensor elements over given axes.
    ///
    /// Integer inputs accumulate in the input dtype with wrapping; `Bool`
    /// inputs count `true` elements into `Int64`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::arange(0, Some(6), None)?.try_reshape(&[2, 3])?;
    /// assert_eq!(t.sum(0)?.to_vec::<i64>()?, vec![3, 5, 7]);
    /// assert_eq!(t.sum(-1)?.to_vec::<i64>()?, vec![3, 12]);
    /// assert_eq!(t.sum(())?.item::<i64>()?, 15);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    #[track_caller]
    pub fn sum(&self, axes: impl Into<AxisSpec>) -> Result<Self> {
        self.reduce(ReduceOp::Sum, axes.into(), false)
    }

    /// Sum with keepdim option.
    #[builder]
    #[track_caller]
    pub fn sum_with(&self, axes: impl Into<AxisSpec>, #[builder(default = false)] keepdim: bool) -> Result<Self> {
        self.reduce(ReduceOp::Sum, axes.into(), keepdim)
    }

    /// Sum of every element as a 0-d tensor.
    pub fn sum_all(&self) -> Result<Self> {
        self.reduce(ReduceOp::Sum, AxisSpec::All, false)
    }

    /// Product of tensor elements over given axes.
    #[track_caller]
    pub fn prod(&self, axes: impl Into<AxisSpec>) -> Result<Self> {
        self.reduce(ReduceOp::Prod, axes.into(), false)
    }

    /// Product with keepdim option.
    #[builder]
    #[track_caller]
    pub fn prod_with(&self, axes: impl Into<AxisSpec>, #[builder(default = false)] keepdim: bool) -> Result<Self> {
        self.reduce(ReduceOp::Prod, axes.into(), keepdim)
    }

    /// Mean of tensor elements over given axes. Float dtypes only.
    #[track_caller]
    pub fn mean(&self, axes: impl Into<AxisSpec>) -> Result<Self> {
        self.reduce(ReduceOp::Mean, axes.into(), false)
    }

    /// Mean with keepdim option.
    #[builder]
    #[track_caller]
    pub fn mean_with(&self, axes: impl Into<AxisSpec>, #[builder(default = false)] keepdim: bool) -> Result<Self> {
        self.reduce(ReduceOp::Mean, axes.into(), keepdim)
    }

    /// Maximum along `axis`: `(values, indices)`.
    ///
    /// Indices are `Int64` and point at the first maximal element; a NaN
    /// counts as the maximum.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::from_slice([3.0f64, 7.0, 7.0, 1.0])?.try_reshape(&[2, 2])?;
    /// let (values, indices) = t.max(1)?;
    /// assert_eq!(values.to_vec::<f64>()?, vec![7.0, 1.0]);
    /// assert_eq!(indices.to_vec::<i64>()?, vec![1, 1]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    #[track_caller]
    pub fn max(&self, axis: isize) -> Result<(Self, Self)> {
        self.extremum(ExtremumOp::Max, axis, false)
    }

    /// Maximum with keepdim option.
    #[builder]
    #[track_caller]
    pub fn max_with(&self, axis: isize, #[builder(default = false)] keepdim: bool) -> Result<(Self, Self)> {
        self.extremum(ExtremumOp::Max, axis, keepdim)
    }

    /// Minimum along `axis`: `(values, indices)`.
    #[track_caller]
    pub fn min(&self, axis: isize) -> Result<(Self, Self)> {
        self.extremum(ExtremumOp::Min, axis, false)
    }

    /// Minimum with keepdim option.
    #[builder]
    #[track_caller]
    pub fn min_with(&self, axis: isize, #[builder(default = false)] keepdim: bool) -> Result<(Self, Self)> {
        self.extremum(ExtremumOp::Min, axis, keepdim)
    }

    /// Positions of the maxima along `axis`, or in the flattened tensor when
    /// `axis` is `None`.
    #[track_caller]
    pub fn argmax(&self, axis: impl Into<Option<isize>>) -> Result<Self> {
        self.arg_extremum(ExtremumOp::Max, axis.into())
    }

    /// Positions of the minima along `axis`, or in the flattened tensor when
    /// `axis` is `None`.
    #[track_caller]
    pub fn argmin(&self, axis: impl Into<Option<isize>>) -> Result<Self> {
        self.arg_extremum(ExtremumOp::Min, axis.into())
    }
}

impl Tensor {
    fn reduce(&self, op: ReduceOp, axes: AxisSpec, keepdim: bool) -> Result<Self> {
        let operation: &'static str = op.into();
        if op == ReduceOp::Mean {
            self.ensure_float(operation)?;
        }

        let axes = axes.resolve(self.ndim())?;
        let shape = reduced_shape(self.shape(), &axes, keepdim);
        let dtype = if self.dtype().is_bool() { DType::Int64 } else { self.dtype() };
        dispatch(&self.ctx, OpKind::Reduce { op, axes }, [self.storage()], &shape, dtype)
    }

    fn extremum(&self, op: ExtremumOp, axis: isize, keepdim: bool) -> Result<(Self, Self)> {
        let (axis, shape) = self.extremum_shape(op, axis, keepdim)?;
        let values = allocate(&self.ctx, &shape, self.dtype())?;
        let indices = allocate(&self.ctx, &shape, DType::Int64)?;
        submit(&self.ctx, OpKind::Extremum { op, axis, values: true }, [self.storage()], [&values, &indices]);
        Ok((values, indices))
    }

    fn arg_extremum(&self, op: ExtremumOp, axis: Option<isize>) -> Result<Self> {
        let Some(axis) = axis else {
            return self.contiguous()?.flatten()?.arg_extremum(op, Some(0));
        };

        let (axis, shape) = self.extremum_shape(op, axis, false)?;
        dispatch(&self.ctx, OpKind::Extremum { op, axis, values: false }, [self.storage()], &shape, DType::Int64)
    }

    /// Normalized axis and output shape; empty axes have no extremum.
    fn extremum_shape(&self, op: ExtremumOp, axis: isize, keepdim: bool) -> Result<(usize, Vec<usize>)> {
        let operation: &'static str = op.into();
        let axis = normalize_axis(axis, self.ndim())?;
        ensure!(self.shape()[axis] != 0, EmptyReductionSnafu { operation, axis });
        Ok((axis, reduced_shape(self.shape(), &[axis], keepdim)))
    }
}

impl Tensor {
    /// Pick elements along `axis`: `out[p] = self[p with p[axis] = index[p]]`.
    ///
    /// `index` must be `Int64` with the same rank; its other dimensions may
    /// not exceed the receiver's. Out-of-range indices are reported as a
    /// deferred fault.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let t = Tensor::from_slice([5i64, 9, 2, 8, 1, 7])?.try_reshape(&[2, 3])?;
    /// let (values, indices) = t.max_with().axis(1).keepdim(true).call()?;
    /// assert_eq!(t.gather(1, &indices)?.to_vec::<i64>()?, values.to_vec::<i64>()?);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn gather(&self, axis: isize, index: &Tensor) -> Result<Self> {
        self.ensure_same_device(index, "gather")?;
        ensure!(index.dtype() == DType::Int64, UnsupportedDtypeSnafu { operation: "gather", dtype: index.dtype() });

        let axis = normalize_axis(axis, self.ndim())?;
        let fits = index.ndim() == self.ndim()
            && index.shape().iter().zip(self.shape()).enumerate().all(|(d, (&i, &s))| d == axis || i <= s);
        ensure!(
            fits,
            ShapeMismatchSnafu { operation: "gather", lhs: self.shape().to_vec(), rhs: index.shape().to_vec() }
        );

        dispatch(&self.ctx, OpKind::Gather { axis }, [self.storage(), index.storage()], index.shape(), self.dtype())
    }
}
