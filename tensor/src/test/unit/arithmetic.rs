use test_case::test_case;

use super::super::{accel, runtime, tensor};
use crate::*;

#[test_case(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[5.0, 7.0, 9.0]; "add")]
#[test_case(&[-1.0, 0.5, 2.0], &[1.0, 1.0, 1.0], &[0.0, 1.5, 3.0]; "add_mixed_signs")]
fn test_add_f32(lhs: &[f32], rhs: &[f32], expected: &[f32]) {
    let result = (&tensor(lhs, &[-1]) + &tensor(rhs, &[-1])).unwrap();
    assert_eq!(result.to_vec::<f32>().unwrap(), expected);
}

#[test]
fn test_binary_operators() {
    let a = tensor(&[6i32, 8, -9], &[3]);
    let b = tensor(&[2i32, 4, 3], &[3]);

    assert_eq!((&a + &b).unwrap().to_vec::<i32>().unwrap(), vec![8, 12, -6]);
    assert_eq!((&a - &b).unwrap().to_vec::<i32>().unwrap(), vec![4, 4, -12]);
    assert_eq!((&a * &b).unwrap().to_vec::<i32>().unwrap(), vec![12, 32, -27]);
    assert_eq!((&a / &b).unwrap().to_vec::<i32>().unwrap(), vec![3, 2, -3]);
    assert_eq!((-&a).unwrap().to_vec::<i32>().unwrap(), vec![-6, -8, 9]);
    // Owned operands forward to the borrowed implementation.
    assert_eq!((a.clone() + b.clone()).unwrap().to_vec::<i32>().unwrap(), vec![8, 12, -6]);
}

#[test]
fn test_maximum_minimum() {
    let a = tensor(&[1.0f64, 5.0, f64::NAN], &[3]);
    let b = tensor(&[3.0f64, 2.0, 0.0], &[3]);

    assert_eq!(a.maximum(&b).unwrap().to_vec::<f64>().unwrap()[..2], [3.0, 5.0]);
    assert_eq!(a.minimum(&b).unwrap().to_vec::<f64>().unwrap()[..2], [1.0, 2.0]);
    assert!(a.maximum(&b).unwrap().to_vec::<f64>().unwrap()[2].is_nan());
}

#[test_case(&[-4.0, 0.0, 9.0], &[4.0, 0.0, 9.0]; "abs")]
fn test_abs(input: &[f64], expected: &[f64]) {
    assert_eq!(tensor(input, &[-1]).try_abs().unwrap().to_vec::<f64>().unwrap(), expected);
}

#[test]
fn test_float_unary() {
    let t = tensor(&[1.0f32, 4.0, 9.0], &[3]);
    assert_eq!(t.try_sqrt().unwrap().to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);

    let zero = tensor(&[0.0f64], &[1]);
    assert_eq!(zero.try_exp().unwrap().item::<f64>().unwrap(), 1.0);
    assert_eq!(zero.try_exp().unwrap().try_log().unwrap().item::<f64>().unwrap(), 0.0);
}

#[test]
fn test_relu() {
    let t = tensor(&[-1.5f32, 0.0, 2.5], &[3]);
    assert_eq!(t.relu().unwrap().to_vec::<f32>().unwrap(), vec![0.0, 0.0, 2.5]);
}

#[test_case(DType::Int32; "int32")]
#[test_case(DType::UInt8; "uint8")]
#[test_case(DType::Bool; "bool")]
fn test_float_only_ops_reject_integers(dtype: DType) {
    let t = tensor(&[1i64, 2], &[2]).to_dtype(dtype).unwrap();
    for result in [t.try_sqrt(), t.try_exp(), t.try_log()] {
        assert!(matches!(result, Err(Error::UnsupportedDtype { dtype: d, .. }) if d == dtype));
    }
}

#[test]
fn test_neg_rejects_bool() {
    let t = Tensor::from_slice([true, false]).unwrap();
    assert!(matches!(t.try_neg(), Err(Error::UnsupportedDtype { operation: "neg", .. })));
}

#[test]
fn test_dtype_mismatch_suggests_cast() {
    let a = tensor(&[1i32, 2], &[2]);
    let b = tensor(&[1.0f32, 2.0], &[2]);

    let Err(err @ Error::DtypeMismatch { operation, lhs, rhs, hint }) = a.try_add(&b) else {
        panic!("expected a dtype mismatch");
    };
    assert_eq!((operation, lhs, rhs), ("add", DType::Int32, DType::Float32));
    assert!(hint.is_some());
    assert!(err.to_string().contains("explicitly"));
}

#[test]
fn test_device_mismatch() {
    let runtime = runtime();
    let host = Tensor::from_vec(vec![1.0f32, 2.0], &[2], &runtime.cpu().unwrap()).unwrap();
    let device = host.to_device(DeviceSpec::accelerator(0)).unwrap();

    let result = host.try_mul(&device);
    assert!(matches!(
        result,
        Err(Error::DeviceMismatch { operation: "mul", lhs: DeviceSpec::Cpu, rhs: DeviceSpec::Accelerator { ordinal: 0 } })
    ));
}

#[test]
fn test_same_spec_on_different_runtimes_is_a_mismatch() {
    let (first, second) = (runtime(), runtime());
    let a = Tensor::zeros(&[2], DType::Int8, &accel(&first, 1)).unwrap();
    let b = Tensor::zeros(&[2], DType::Int8, &accel(&second, 1)).unwrap();
    assert!(matches!(a.try_add(&b), Err(Error::DeviceMismatch { .. })));
}

#[test]
fn test_accelerator_arithmetic() {
    let runtime = runtime();
    let ctx = accel(&runtime, 1);
    let a = Tensor::from_vec(vec![1i64, 2, 3], &[3], &ctx).unwrap();
    let b = Tensor::full(&[3], 10i64, &ctx).unwrap();

    let c = (&a * &b).unwrap();
    assert_eq!(c.device(), DeviceSpec::accelerator(1));
    assert_eq!(c.to_vec::<i64>().unwrap(), vec![10, 20, 30]);
}

#[test]
fn test_dispatch_returns_before_completion() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let a = Tensor::ones(&[256, 256], DType::Float32, &ctx).unwrap();

    let mut current = a.clone();
    for _ in 0..8 {
        current = (&current + &a).unwrap();
    }
    // The output handle exists with its final shape whether or not it was computed.
    assert_eq!(current.shape(), &[256, 256]);
    assert!(ctx.submitted() >= 9);

    current.synchronize().unwrap();
    assert_eq!(ctx.pending(), 0);
    assert_eq!(current.sum_all().unwrap().item::<f32>().unwrap(), 9.0 * 256.0 * 256.0);
}
