use test_case::test_case;

use super::super::{runtime, tensor};
use crate::*;

fn grid() -> Tensor {
    // [[0, 1, 2], [3, 4, 5]]
    Tensor::arange(6, None, None).unwrap().try_reshape(&[2, 3]).unwrap()
}

#[test_case(AxisSpec::Single(0), &[3], &[3, 5, 7]; "axis_0")]
#[test_case(AxisSpec::Single(-1), &[2], &[3, 12]; "negative_axis")]
#[test_case(AxisSpec::Multiple(vec![0, 1]), &[], &[15]; "both_axes")]
#[test_case(AxisSpec::Multiple(vec![1, -1]), &[2], &[3, 12]; "duplicate_axes")]
#[test_case(AxisSpec::All, &[], &[15]; "all")]
fn test_sum(axes: AxisSpec, shape: &[usize], expected: &[i64]) {
    let result = grid().sum(axes).unwrap();
    assert_eq!(result.shape(), shape);
    assert_eq!(result.to_vec::<i64>().unwrap(), expected);
}

#[test]
fn test_reduction_removes_axis() {
    let t = tensor(&[0.0f32; 24], &[2, 3, 4]);
    assert_eq!(t.sum(1).unwrap().shape(), &[2, 4]);
    assert_eq!(t.mean(-1).unwrap().shape(), &[2, 3]);
    assert_eq!(t.prod([0, 2]).unwrap().shape(), &[3]);
    assert_eq!(t.max(0).unwrap().0.shape(), &[3, 4]);
    assert_eq!(t.argmin(2).unwrap().shape(), &[2, 3]);
}

#[test]
fn test_keepdim() {
    let t = grid();
    assert_eq!(t.sum_with().axes(1).keepdim(true).call().unwrap().shape(), &[2, 1]);
    assert_eq!(t.prod_with().axes(()).keepdim(true).call().unwrap().shape(), &[1, 1]);
    let (values, indices) = t.min_with().axis(0).keepdim(true).call().unwrap();
    assert_eq!((values.shape(), indices.shape()), (&[1, 3][..], &[1, 3][..]));
}

#[test]
fn test_prod_and_mean() {
    let t = tensor(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    assert_eq!(t.prod(0).unwrap().to_vec::<f64>().unwrap(), vec![3.0, 8.0]);
    assert_eq!(t.mean(1).unwrap().to_vec::<f64>().unwrap(), vec![1.5, 3.5]);
    assert_eq!(t.mean_with().axes(()).call().unwrap().item::<f64>().unwrap(), 2.5);
}

#[test]
fn test_mean_rejects_integers() {
    assert!(matches!(grid().mean(0), Err(Error::UnsupportedDtype { operation: "mean", dtype: DType::Int64 })));
}

#[test]
fn test_bool_sum_counts() {
    let flags = Tensor::from_slice([true, false, true, true]).unwrap();
    let count = flags.sum_all().unwrap();
    assert_eq!(count.dtype(), DType::Int64);
    assert_eq!(count.item::<i64>().unwrap(), 3);
}

#[test]
fn test_reduction_over_strided_view() {
    let transposed = grid().try_transpose(0, 1).unwrap();
    assert_eq!(transposed.sum(1).unwrap().to_vec::<i64>().unwrap(), vec![3, 5, 7]);
}

#[test]
fn test_reduction_axis_out_of_range() {
    assert!(matches!(grid().sum(2), Err(Error::AxisOutOfRange { axis: 2, ndim: 2 })));
    assert!(matches!(grid().max(-3), Err(Error::AxisOutOfRange { axis: -3, ndim: 2 })));
}

#[test]
fn test_max_min_first_position_wins() {
    let t = tensor(&[3i32, 7, 7, 1, 1, 0], &[2, 3]);

    let (values, indices) = t.max(1).unwrap();
    assert_eq!(values.to_vec::<i32>().unwrap(), vec![7, 1]);
    assert_eq!(indices.dtype(), DType::Int64);
    assert_eq!(indices.to_vec::<i64>().unwrap(), vec![1, 0]);

    let (values, indices) = t.min(1).unwrap();
    assert_eq!(values.to_vec::<i32>().unwrap(), vec![3, 0]);
    assert_eq!(indices.to_vec::<i64>().unwrap(), vec![0, 2]);
}

#[test]
fn test_argmax_argmin() {
    let t = tensor(&[2.0f32, 9.0, -1.0, 4.0], &[2, 2]);
    assert_eq!(t.argmax(0).unwrap().to_vec::<i64>().unwrap(), vec![0, 0]);
    assert_eq!(t.argmax(-1).unwrap().to_vec::<i64>().unwrap(), vec![1, 1]);
    assert_eq!(t.argmin(Some(0)).unwrap().to_vec::<i64>().unwrap(), vec![1, 1]);

    // No axis: position in the flattened tensor.
    let flat = t.argmax(None).unwrap();
    assert_eq!(flat.ndim(), 0);
    assert_eq!(flat.item::<i64>().unwrap(), 1);
    assert_eq!(t.try_transpose(0, 1).unwrap().argmin(None).unwrap().item::<i64>().unwrap(), 1);
}

#[test]
fn test_nan_is_the_maximum() {
    let t = tensor(&[1.0f64, f64::NAN, 5.0], &[3]);
    let (values, indices) = t.max(0).unwrap();
    assert!(values.item::<f64>().unwrap().is_nan());
    assert_eq!(indices.item::<i64>().unwrap(), 1);
}

#[test]
fn test_extremum_of_empty_axis_fails_at_dispatch() {
    let runtime = runtime();
    let empty = Tensor::zeros(&[2, 0], DType::Float32, &runtime.cpu().unwrap()).unwrap();
    assert!(matches!(empty.max(1), Err(Error::EmptyReduction { operation: "max", axis: 1 })));
    assert!(matches!(empty.argmin(None), Err(Error::EmptyReduction { .. })));
    // Sums over empty axes are fine.
    assert_eq!(empty.sum(1).unwrap().to_vec::<f32>().unwrap(), vec![0.0, 0.0]);
}

#[test]
fn test_gathered_indices_reproduce_values() {
    let t = tensor(&[5i64, 9, 2, 8, 1, 7, 3, 3, 6], &[3, 3]);
    for axis in [0isize, 1] {
        let (values, indices) = t.max_with().axis(axis).keepdim(true).call().unwrap();
        assert_eq!(t.gather(axis, &indices).unwrap().to_vec::<i64>().unwrap(), values.to_vec::<i64>().unwrap());
    }
}

#[test]
fn test_gather_validates_index() {
    let t = grid();
    let float_index = tensor(&[0.0f32], &[1, 1]);
    assert!(matches!(t.gather(0, &float_index), Err(Error::UnsupportedDtype { operation: "gather", .. })));

    let too_wide = Tensor::arange(0, Some(8), None).unwrap().try_reshape(&[2, 4]).unwrap();
    assert!(matches!(t.gather(0, &too_wide), Err(Error::ShapeMismatch { operation: "gather", .. })));
}

#[test]
fn test_reduction_is_deterministic() {
    let values: Vec<f32> = (0..4096).map(|i| 1.0 / (1.0 + i as f32)).collect();
    let t = tensor(&values, &[64, 64]);
    let first = t.sum(1).unwrap().to_vec::<f32>().unwrap();
    for _ in 0..4 {
        assert_eq!(t.sum(1).unwrap().to_vec::<f32>().unwrap(), first);
    }
}
