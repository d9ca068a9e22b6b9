//! Per-device execution context.
//!
//! A context owns the device's FIFO queue (and its engine thread), the
//! device allocator and, for accelerators, the pinned staging pool. Contexts
//! are created by [`Runtime::context`](crate::Runtime::context) on first use
//! and shared by every tensor placed on the device.

use std::sync::{Arc, Weak};

use kiln_device::{
    Allocator, BarrierState, Buffer, BufferOptions, CachingAllocator, CommandQueue, DeviceSpec, PinnedPool,
};
use kiln_dtype::DType;
use snafu::OptionExt;
use tracing::debug;

use crate::error::{DeferredSnafu, Result, RuntimeShutdownSnafu};
use crate::record::OperationRecord;
use crate::registry::Runtime;

pub struct DeviceContext {
    device: DeviceSpec,
    /// Physical accelerator index behind a logical ordinal.
    physical: Option<usize>,
    queue: CommandQueue<OperationRecord>,
    allocator: Arc<CachingAllocator>,
    pinned: Option<Arc<PinnedPool>>,
    runtime: Weak<Runtime>,
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", &self.device)
            .field("physical", &self.physical)
            .field("submitted", &self.queue.submitted())
            .field("completed", &self.queue.completed())
            .finish()
    }
}

impl DeviceContext {
    pub(crate) fn new(
        device: DeviceSpec,
        physical: Option<usize>,
        allocator: Arc<CachingAllocator>,
        pinned: Option<Arc<PinnedPool>>,
        runtime: Weak<Runtime>,
    ) -> Result<Self> {
        let queue = CommandQueue::new(device)?;
        debug!(%device, ?physical, pinned = pinned.is_some(), "created device context");
        Ok(Self { device, physical, queue, allocator, pinned, runtime })
    }

    pub fn device(&self) -> DeviceSpec {
        self.device
    }

    pub fn physical_ordinal(&self) -> Option<usize> {
        self.physical
    }

    /// The runtime this context belongs to.
    pub fn runtime(&self) -> Result<Arc<Runtime>> {
        self.runtime.upgrade().context(RuntimeShutdownSnafu { device: self.device })
    }

    pub fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    pub fn pinned_pool(&self) -> Option<&Arc<PinnedPool>> {
        self.pinned.as_ref()
    }

    /// Allocate `len` elements of `dtype` on this device.
    pub fn allocate(&self, dtype: DType, len: usize, zero_init: bool) -> Result<Buffer> {
        Ok(Buffer::allocate(self.allocator(), dtype, len, BufferOptions { zero_init })?)
    }

    /// Append `record` to the queue and return its timeline value.
    ///
    /// Outputs are stamped with the timeline before the engine can run the record.
    pub fn enqueue(&self, record: OperationRecord) -> u64 {
        debug!(device = %self.device, record = record.id(), operation = record.kind().name(), "enqueue");
        self.queue.submit_with(|timeline| {
            for output in record.outputs() {
                output.buffer.mark_written(timeline);
            }
            record
        })
    }

    /// Block until every record enqueued before the call has completed.
    ///
    /// Re-raises the first fault recorded since the previous call, once.
    pub fn synchronize(&self) -> Result<()> {
        Ok(self.queue.synchronize()?)
    }

    /// Block until the record at `timeline` (and everything before it) has completed.
    pub fn wait_for(&self, timeline: u64) {
        self.queue.wait_for(timeline);
    }

    /// Wait for the last write to `buffer` and fail if its contents are invalid.
    pub fn observe(&self, buffer: &Buffer) -> Result<()> {
        self.wait_for(buffer.last_write());
        match buffer.fault() {
            Some(fault) => DeferredSnafu { fault }.fail(),
            None => Ok(()),
        }
    }

    pub fn barrier_state(&self) -> BarrierState {
        self.queue.barrier_state()
    }

    pub fn submitted(&self) -> u64 {
        self.queue.submitted()
    }

    pub fn completed(&self) -> u64 {
        self.queue.completed()
    }

    /// Records enqueued but not yet completed.
    pub fn pending(&self) -> u64 {
        self.queue.pending()
    }

    /// Bytes held by live buffers.
    pub fn memory_allocated(&self) -> usize {
        self.allocator.allocated()
    }

    /// Bytes taken from the device, including cached blocks.
    pub fn memory_reserved(&self) -> usize {
        self.allocator.reserved()
    }

    /// Return cached blocks to the device.
    pub fn empty_cache(&self) {
        self.allocator.empty_cache();
    }
}
