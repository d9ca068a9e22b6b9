use kiln_device::Error as LayoutError;
use test_case::test_case;

use super::super::tensor;
use crate::*;

fn iota(shape: &[isize]) -> Tensor {
    let numel = shape.iter().product::<isize>() as i64;
    Tensor::arange(numel, None, None).unwrap().try_reshape(shape).unwrap()
}

#[test_case(&[2, 3], &[2, 3]; "exact")]
#[test_case(&[-1, 2], &[3, 2]; "infer_leading")]
#[test_case(&[3, -1], &[3, 2]; "infer_trailing")]
#[test_case(&[1, 6, 1], &[1, 6, 1]; "unit_dims")]
fn test_reshape(spec: &[isize], expected: &[usize]) {
    let t = iota(&[6]).try_reshape(spec).unwrap();
    assert_eq!(t.shape(), expected);
    assert_eq!(t.to_vec::<i64>().unwrap(), (0..6).collect::<Vec<_>>());
}

#[test]
fn test_reshape_errors() {
    let t = iota(&[6]);
    assert!(matches!(t.try_reshape(&[-1, -1]), Err(Error::MultipleInferDimensions)));
    assert!(matches!(t.try_reshape(&[-2, 3]), Err(Error::NegativeDimension { dim: -2 })));
    assert!(matches!(t.try_reshape(&[4, 2]), Err(Error::ReshapeSizeMismatch { .. })));
    assert!(matches!(t.try_reshape(&[-1, 4]), Err(Error::ReshapeSizeMismatch { .. })));
    assert!(matches!(t.try_reshape(&[isize::MAX, 4]), Err(Error::ReshapeSizeMismatch { .. })));
    assert!(matches!(t.try_reshape(&[isize::MAX, 4, -1]), Err(Error::ReshapeSizeMismatch { .. })));
}

#[test]
fn test_reshape_of_strided_view_needs_contiguous() {
    let transposed = iota(&[2, 3]).try_transpose(0, 1).unwrap();
    assert!(matches!(
        transposed.try_reshape(&[6]),
        Err(Error::Layout { source: LayoutError::NonContiguous { .. } })
    ));
    let flat = transposed.contiguous().unwrap().flatten().unwrap();
    assert_eq!(flat.to_vec::<i64>().unwrap(), vec![0, 3, 1, 4, 2, 5]);
}

#[test]
fn test_permute() {
    let t = iota(&[2, 3, 4]);
    let p = t.try_permute(&[2, 0, -2]).unwrap();
    assert_eq!(p.shape(), &[4, 2, 3]);
    assert_eq!(p.strides(), &[1, 12, 4]);
    assert!(p.shares_storage(&t));
}

#[test_case(&[0, 1]; "too_few")]
#[test_case(&[0, 0, 1]; "duplicate")]
#[test_case(&[0, 1, 3]; "out_of_range")]
fn test_permute_rejects(axes: &[isize]) {
    let t = iota(&[2, 3, 4]);
    assert!(t.try_permute(axes).is_err());
}

#[test]
fn test_transpose_reads_in_logical_order() {
    let t = iota(&[2, 3]).try_transpose(-1, 0).unwrap();
    assert_eq!(t.shape(), &[3, 2]);
    assert!(!t.is_contiguous());
    assert_eq!(t.to_vec::<i64>().unwrap(), vec![0, 3, 1, 4, 2, 5]);
    assert!(matches!(t.try_transpose(0, 2), Err(Error::AxisOutOfRange { axis: 2, ndim: 2 })));
}

#[test]
fn test_narrow() {
    let t = iota(&[3, 4]);
    let middle = t.narrow(-1, 1, 2).unwrap();
    assert_eq!(middle.shape(), &[3, 2]);
    assert_eq!(middle.to_vec::<i64>().unwrap(), vec![1, 2, 5, 6, 9, 10]);

    assert_eq!(t.narrow(0, 3, 0).unwrap().numel(), 0);
    assert!(matches!(
        t.narrow(0, 2, 2),
        Err(Error::Layout { source: LayoutError::NarrowOutOfRange { axis: 0, start: 2, end: 4, size: 3 } })
    ));
    assert!(matches!(
        t.narrow(0, usize::MAX, 2),
        Err(Error::Layout { source: LayoutError::NarrowOutOfRange { start: usize::MAX, end: usize::MAX, .. } })
    ));
}

#[test]
fn test_squeeze_and_unsqueeze() {
    let t = iota(&[1, 3, 1]);
    assert_eq!(t.try_squeeze(None).unwrap().shape(), &[3]);
    assert_eq!(t.try_squeeze(Some(-1)).unwrap().shape(), &[1, 3]);
    assert!(matches!(
        t.try_squeeze(Some(1)),
        Err(Error::Layout { source: LayoutError::SqueezeNotOne { axis: 1, size: 3 } })
    ));

    let v = iota(&[3]);
    assert_eq!(v.try_unsqueeze(0).unwrap().shape(), &[1, 3]);
    assert_eq!(v.try_unsqueeze(-1).unwrap().shape(), &[3, 1]);
    assert!(matches!(v.try_unsqueeze(2), Err(Error::AxisOutOfRange { axis: 2, ndim: 2 })));
}

#[test]
fn test_views_share_storage() {
    let t = iota(&[2, 3]);
    let views = [
        t.try_reshape(&[3, 2]).unwrap(),
        t.try_transpose(0, 1).unwrap(),
        t.narrow(1, 0, 1).unwrap(),
        t.try_unsqueeze(0).unwrap(),
        t.flatten().unwrap(),
    ];
    for view in &views {
        assert!(view.shares_storage(&t));
    }
    assert!(!t.contiguous().unwrap().shares_storage(&t));
}

#[test]
fn test_view() {
    let t = tensor(&[0u8, 1, 2, 3, 4, 5, 6, 7], &[8]);
    let diagonal = t.view(&[2], &[5], 1).unwrap();
    assert_eq!(diagonal.to_vec::<u8>().unwrap(), vec![1, 6]);

    let repeated = t.view(&[3], &[0], 7).unwrap();
    assert_eq!(repeated.to_vec::<u8>().unwrap(), vec![7, 7, 7]);

    assert!(matches!(
        t.view(&[2], &[5], 3),
        Err(Error::Layout { source: LayoutError::InvalidView { extent: Some(9), buffer_len: 8, .. } })
    ));
    assert!(matches!(t.view(&[2, 2], &[1], 0), Err(Error::ShapeMismatch { operation: "view", .. })));
}

#[test_case(&[2], &[usize::MAX], 0; "stride")]
#[test_case(&[1], &[1], usize::MAX; "offset")]
#[test_case(&[usize::MAX, 2], &[0, 0], 0; "element_count")]
fn test_view_rejects_overflow(shape: &[usize], strides: &[usize], offset: usize) {
    let t = tensor(&[0u8; 8], &[8]);
    assert!(matches!(
        t.view(shape, strides, offset),
        Err(Error::Layout { source: LayoutError::InvalidView { buffer_len: 8, .. } })
    ));
}

#[test]
fn test_view_extent_is_checked_against_whole_buffer() {
    // A narrowed view may reach back over the full buffer.
    let t = tensor(&[1i32, 2, 3, 4], &[4]);
    let tail = t.narrow(0, 2, 2).unwrap();
    assert_eq!(tail.view(&[4], &[1], 0).unwrap().to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
}
