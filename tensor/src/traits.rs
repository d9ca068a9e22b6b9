use super::*;

/// `std::ops` impls for every owned/borrowed operand pair, all forwarding to
/// the `&Tensor op &Tensor` form and its `try_*` method.
///
/// Operators yield `Result<Tensor>`: dispatch rejects mixed devices, mixed
/// dtypes and incompatible shapes.
macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $try_method:ident) => {
        impl std::ops::$trait for &Tensor {
            type Output = Result<Tensor>;

            #[track_caller]
            fn $method(self, other: &Tensor) -> Result<Tensor> {
                self.$try_method(other)
            }
        }

        impl std::ops::$trait for Tensor {
            type Output = Result<Tensor>;

            #[track_caller]
            fn $method(self, other: Tensor) -> Result<Tensor> {
                (&self).$method(&other)
            }
        }

        impl std::ops::$trait<Tensor> for &Tensor {
            type Output = Result<Tensor>;

            #[track_caller]
            fn $method(self, other: Tensor) -> Result<Tensor> {
                self.$method(&other)
            }
        }

        impl std::ops::$trait<&Tensor> for Tensor {
            type Output = Result<Tensor>;

            #[track_caller]
            fn $method(self, other: &Tensor) -> Result<Tensor> {
                (&self).$method(other)
            }
        }
    };
}

impl_binary_op!(Add, add, try_add);
impl_binary_op!(Sub, sub, try_sub);
impl_binary_op!(Mul, mul, try_mul);
impl_binary_op!(Div, div, try_div);

impl std::ops::Neg for &Tensor {
    type Output = Result<Tensor>;

    #[track_caller]
    fn neg(self) -> Result<Tensor> {
        self.try_neg()
    }
}

impl std::ops::Neg for Tensor {
    type Output = Result<Tensor>;

    #[track_caller]
    fn neg(self) -> Result<Tensor> {
        (&self).neg()
    }
}
