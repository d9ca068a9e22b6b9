use std::sync::Arc;

use kiln_device::{DeviceSpec, Layout};
use kiln_dtype::DType;
use tracing_test::traced_test;

use super::super::{buffer_of, floats, ints, read_back, storage};
use crate::record::{BinaryOp, OpKind, OperationRecord, StorageRef, UnaryOp};
use crate::{Error, Runtime, RuntimeConfig, TransferSnapshot};

fn runtime(pinned_blocks: usize, pinned_block_size: usize) -> Arc<Runtime> {
    Runtime::new(
        RuntimeConfig::builder()
            .accelerators(2)
            .pinned_blocks(pinned_blocks)
            .pinned_block_size(pinned_block_size)
            .build(),
    )
}

#[test]
fn test_host_to_accelerator_uses_pinned_block() {
    let runtime = runtime(2, 1024);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let source = buffer_of(&host, DType::Float32, &floats(&[1.0, 2.0, 3.0]));

    let copied = runtime.transfers().transfer(&storage(&source, &[3]), &host, &accel).unwrap();

    assert_eq!(copied.device(), DeviceSpec::accelerator(0));
    assert!(!copied.same_storage(&source));
    assert_eq!(read_back(&copied), floats(&[1.0, 2.0, 3.0]));
    assert_eq!(runtime.transfers().stats(), TransferSnapshot { pinned: 1, pageable: 0, direct: 0, bytes: 12 });
    // The block went back to the pool.
    assert_eq!(accel.pinned_pool().unwrap().available(), 2);
}

#[test]
#[traced_test]
fn test_exhausted_pool_falls_back_to_pageable() {
    let runtime = runtime(1, 1024);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let source = buffer_of(&host, DType::Int16, &ints(&[7, -8, 9]));

    let _held = accel.pinned_pool().unwrap().acquire(16).unwrap();
    let copied = runtime.transfers().transfer(&storage(&source, &[3]), &host, &accel).unwrap();

    assert_eq!(read_back(&copied), ints(&[7, -8, 9]));
    assert_eq!(runtime.transfers().stats().pageable, 1);
    assert!(logs_contain("staging through pageable memory"));
}

#[test]
fn test_oversized_payload_falls_back_to_pageable() {
    let runtime = runtime(4, 8);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let source = buffer_of(&accel, DType::Float64, &floats(&[0.5, 1.5]));

    let copied = runtime.transfers().transfer(&storage(&source, &[2]), &accel, &host).unwrap();

    assert_eq!(read_back(&copied), floats(&[0.5, 1.5]));
    assert_eq!(runtime.transfers().stats().pageable, 1);
}

#[test]
fn test_accelerator_to_accelerator_is_direct() {
    let runtime = runtime(4, 1024);
    let (first, second) =
        (runtime.context(DeviceSpec::accelerator(0)).unwrap(), runtime.context(DeviceSpec::accelerator(1)).unwrap());
    let source = buffer_of(&first, DType::UInt8, &ints(&[1, 2, 255]));

    let copied = runtime.transfers().transfer(&storage(&source, &[3]), &first, &second).unwrap();

    assert_eq!(copied.device(), DeviceSpec::accelerator(1));
    assert_eq!(read_back(&copied).iter().map(|v| v.as_i64()).collect::<Vec<_>>(), vec![1, 2, 255]);
    assert_eq!(runtime.transfers().stats().direct, 1);
}

#[test]
fn test_transfer_packs_strided_views() {
    let runtime = runtime(4, 1024);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let source = buffer_of(&host, DType::Int32, &ints(&[1, 2, 3, 4, 5, 6]));

    let transposed = StorageRef::new(source, Layout::contiguous(&[2, 3]).transpose(0, 1).unwrap());
    let copied = runtime.transfers().transfer(&transposed, &host, &accel).unwrap();

    assert_eq!(read_back(&copied), ints(&[1, 4, 2, 5, 3, 6]));
}

#[test]
fn test_round_trip_is_lossless() {
    let runtime = runtime(4, 1024);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(1)).unwrap());
    let values = floats(&[f64::MIN_POSITIVE, -0.0, 1e300, f64::INFINITY]);
    let source = buffer_of(&host, DType::Float64, &values);

    let there = runtime.transfers().transfer(&storage(&source, &[4]), &host, &accel).unwrap();
    let back = runtime.transfers().transfer(&storage(&there, &[4]), &accel, &host).unwrap();

    let bits = |buffer: &kiln_device::Buffer| read_back(buffer).iter().map(|v| v.as_f64().to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&back), bits(&source));
}

#[test]
fn test_transfer_waits_for_pending_write() {
    let runtime = runtime(4, 1 << 20);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let len = 1 << 16;
    let a = buffer_of(&accel, DType::Float32, &floats(&vec![1.0; len]));
    let out = accel.allocate(DType::Float32, len, false).unwrap();
    accel.enqueue(OperationRecord::new(
        OpKind::Binary(BinaryOp::Add),
        [storage(&a, &[len]), storage(&a, &[len])],
        [storage(&out, &[len])],
    ));

    let copied = runtime.transfers().transfer(&storage(&out, &[len]), &accel, &host).unwrap();
    assert!(read_back(&copied).iter().all(|v| v.as_f64() == 2.0));
}

#[test]
fn test_faulted_source_is_not_transferred() {
    let runtime = runtime(4, 1024);
    let (host, accel) = (runtime.cpu().unwrap(), runtime.context(DeviceSpec::accelerator(0)).unwrap());
    let a = buffer_of(&host, DType::Int64, &ints(&[1]));
    let zero = buffer_of(&host, DType::Int64, &ints(&[0]));
    let out = host.allocate(DType::Int64, 1, false).unwrap();
    host.enqueue(OperationRecord::new(
        OpKind::Binary(BinaryOp::Div),
        [storage(&a, &[1]), storage(&zero, &[1])],
        [storage(&out, &[1])],
    ));
    let negated = host.allocate(DType::Int64, 1, false).unwrap();
    host.enqueue(OperationRecord::new(OpKind::Unary(UnaryOp::Neg), [storage(&out, &[1])], [storage(&negated, &[1])]));

    let result = runtime.transfers().transfer(&storage(&negated, &[1]), &host, &accel);
    assert!(matches!(result, Err(Error::Deferred { .. })));
    assert_eq!(runtime.transfers().stats(), TransferSnapshot::default());
}
