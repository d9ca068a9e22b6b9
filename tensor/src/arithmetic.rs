use kiln_runtime::{BinaryOp, OpKind, UnaryOp};
use snafu::ensure;

use super::*;
use crate::dispatch::dispatch;

/// Generates `try_*` methods that dispatch one record kind.
///
/// - `binary`: validate device and dtype, broadcast, dispatch
/// - `unary`: validate dtype support, dispatch
macro_rules! impl_tensor_ops {
    (
        binary { $($bin_method:ident => $bin_op:ident),* $(,)? }
        unary { $($un_method:ident => $un_op:ident),* $(,)? }
    ) => {
        $(
            #[track_caller]
            pub fn $bin_method(&self, other: &Tensor) -> Result<Tensor> {
                self.binary(BinaryOp::$bin_op, other)
            }
        )*

        $(
            #[track_caller]
            pub fn $un_method(&self) -> Result<Tensor> {
                self.unary(UnaryOp::$un_op)
            }
        )*
    };
}

impl Tensor {
    impl_tensor_ops! {
        binary {
            try_add => Add,
            try_sub => Sub,
            try_mul => Mul,
            try_div => Div,
            try_maximum => Maximum,
            try_minimum => Minimum,
        }
        unary {
            try_neg => Neg,
            try_abs => Abs,
            try_sqrt => Sqrt,
            try_exp => Exp,
            try_log => Log,
        }
    }

    /// Elementwise maximum; NaN wins over any number.
    pub fn maximum(&self, other: &Tensor) -> Result<Tensor> {
        self.try_maximum(other)
    }

    /// Elementwise minimum; NaN wins over any number.
    pub fn minimum(&self, other: &Tensor) -> Result<Tensor> {
        self.try_minimum(other)
    }

    /// Rectified linear unit: `max(x, 0)`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiln_tensor::Tensor;
    /// let x = Tensor::from_slice([-2i64, 0, 3])?;
    /// assert_eq!(x.relu()?.to_vec::<i64>()?, vec![0, 0, 3]);
    /// # Ok::<(), kiln_tensor::Error>(())
    /// ```
    pub fn relu(&self) -> Result<Tensor> {
        self.unary(UnaryOp::Relu)
    }

    pub(crate) fn binary(&self, op: BinaryOp, other: &Tensor) -> Result<Tensor> {
        let operation: &'static str = op.into();
        self.ensure_same_device(other, operation)?;
        self.ensure_same_dtype(other, operation)?;

        let (lhs, rhs) = self.broadcast_for_binop(other, operation)?;
        dispatch(&self.ctx, OpKind::Binary(op), [lhs.storage(), rhs.storage()], lhs.shape(), lhs.dtype())
    }

    pub(crate) fn unary(&self, op: UnaryOp) -> Result<Tensor> {
        let operation: &'static str = op.into();
        let dtype = self.dtype();
        if op.requires_float() {
            self.ensure_float(operation)?;
        }
        ensure!(!(op == UnaryOp::Neg && dtype.is_bool()), UnsupportedDtypeSnafu { operation, dtype });

        dispatch(&self.ctx, OpKind::Unary(op), [self.storage()], self.shape(), dtype)
    }
}
