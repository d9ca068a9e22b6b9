use std::sync::Arc;

use kiln_device::{BarrierState, DeviceSpec};
use kiln_dtype::{DType, Scalar};

use super::super::{buffer_of, floats, ints, read_back, storage};
use crate::record::{BinaryOp, OpKind, OperationRecord, UnaryOp};
use crate::{DeviceContext, Error, Runtime, RuntimeConfig};

fn runtime() -> Arc<Runtime> {
    Runtime::new(RuntimeConfig::builder().accelerators(2).build())
}

fn divide(ctx: &DeviceContext, lhs: &[i64], rhs: &[i64]) -> (u64, kiln_device::Buffer) {
    let a = buffer_of(ctx, DType::Int32, &ints(lhs));
    let b = buffer_of(ctx, DType::Int32, &ints(rhs));
    let out = ctx.allocate(DType::Int32, lhs.len(), false).unwrap();
    let record = OperationRecord::new(
        OpKind::Binary(BinaryOp::Div),
        [storage(&a, &[lhs.len()]), storage(&b, &[rhs.len()])],
        [storage(&out, &[lhs.len()])],
    );
    (ctx.enqueue(record), out)
}

#[test]
fn test_enqueue_returns_increasing_timelines() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let buffer = ctx.allocate(DType::Float32, 4, true).unwrap();

    let first = ctx.enqueue(OperationRecord::new(OpKind::Fill(Scalar::Float(1.0)), [], [storage(&buffer, &[4])]));
    let second = ctx.enqueue(OperationRecord::new(OpKind::Fill(Scalar::Float(2.0)), [], [storage(&buffer, &[4])]));

    assert!(second > first);
    assert_eq!(buffer.last_write(), second);

    ctx.synchronize().unwrap();
    assert_eq!(ctx.completed(), second);
    assert_eq!(ctx.pending(), 0);
    assert_eq!(read_back(&buffer), floats(&[2.0; 4]));
}

#[test]
fn test_records_run_in_fifo_order() {
    let runtime = runtime();
    let ctx = runtime.context(DeviceSpec::accelerator(0)).unwrap();
    let buffer = buffer_of(&ctx, DType::Int64, &ints(&[1, 2, 3]));

    // Negate three times: only FIFO order gives the expected sign.
    let view = storage(&buffer, &[3]);
    for _ in 0..3 {
        ctx.enqueue(OperationRecord::new(OpKind::Unary(UnaryOp::Neg), [view.clone()], [view.clone()]));
    }

    ctx.observe(&buffer).unwrap();
    assert_eq!(read_back(&buffer), ints(&[-1, -2, -3]));
}

#[test]
fn test_division_by_zero_surfaces_once() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let (timeline, _out) = divide(&ctx, &[4, 6], &[2, 0]);

    let Err(Error::Deferred { fault }) = ctx.synchronize() else {
        panic!("expected a deferred fault");
    };
    assert_eq!(fault.operation, "div");
    assert_eq!(fault.timeline, timeline);
    assert!(fault.reason.contains("division by zero"));

    ctx.synchronize().unwrap();
}

#[test]
fn test_faulted_output_fails_every_observation() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let (_, out) = divide(&ctx, &[1], &[0]);
    let _ = ctx.synchronize();

    for _ in 0..2 {
        assert!(matches!(ctx.observe(&out), Err(Error::Deferred { .. })));
    }
}

#[test]
fn test_fault_propagates_downstream() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let (failing, out) = divide(&ctx, &[1, 2], &[0, 1]);

    let derived = ctx.allocate(DType::Int32, 2, false).unwrap();
    ctx.enqueue(OperationRecord::new(OpKind::Unary(UnaryOp::Abs), [storage(&out, &[2])], [storage(&derived, &[2])]));

    let Err(Error::Deferred { fault }) = ctx.observe(&derived) else {
        panic!("expected the upstream fault");
    };
    assert_eq!(fault.timeline, failing);
    assert_eq!(fault.operation, "div");

    // Only the failing record is reported, and only once.
    assert!(ctx.synchronize().is_err());
    assert!(ctx.synchronize().is_ok());
}

#[test]
fn test_wait_for_reaches_timeline() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    let a = buffer_of(&ctx, DType::Float32, &floats(&[1.0; 1024]));
    let view = storage(&a, &[1024]);
    let first = ctx.enqueue(OperationRecord::new(OpKind::Unary(UnaryOp::Exp), [view.clone()], [view]));

    ctx.wait_for(first);
    assert!(ctx.completed() >= first);

    // Waiting past the end clamps to the last submitted record.
    ctx.wait_for(u64::MAX);
}

#[test]
fn test_idle_after_synchronize() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    assert_eq!(ctx.barrier_state(), BarrierState::Idle);
    ctx.synchronize().unwrap();
    assert_eq!(ctx.barrier_state(), BarrierState::Idle);
}

#[test]
fn test_memory_statistics() {
    let runtime = runtime();
    let ctx = runtime.context(DeviceSpec::accelerator(1)).unwrap();
    assert_eq!(ctx.memory_allocated(), 0);

    let buffer = ctx.allocate(DType::Float64, 16, true).unwrap();
    assert_eq!(ctx.memory_allocated(), 128);
    assert_eq!(ctx.memory_reserved(), 128);

    drop(buffer);
    assert_eq!(ctx.memory_allocated(), 0);
    assert_eq!(ctx.memory_reserved(), 128);

    ctx.empty_cache();
    assert_eq!(ctx.memory_reserved(), 0);
}

#[test]
fn test_allocation_beyond_capacity_fails() {
    let runtime = Runtime::new(RuntimeConfig::builder().accelerator_memory(64).build());
    let ctx = runtime.context(DeviceSpec::accelerator(0)).unwrap();

    let result = ctx.allocate(DType::Float32, 17, false);
    assert!(matches!(result, Err(Error::Device { source: kiln_device::Error::OutOfMemory { .. } })));
}

#[test]
fn test_context_reaches_its_runtime() {
    let runtime = runtime();
    let ctx = runtime.cpu().unwrap();
    assert!(Arc::ptr_eq(&ctx.runtime().unwrap(), &runtime));

    drop(runtime);
    assert!(matches!(ctx.runtime(), Err(Error::RuntimeShutdown { device: DeviceSpec::Cpu })));
}
