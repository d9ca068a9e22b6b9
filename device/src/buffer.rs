use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_dtype::DType;
use parking_lot::{Mutex, RwLock};

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
use crate::error::{Result, SizeMismatchSnafu};
use crate::queue::Fault;
use crate::registry::DeviceSpec;

/// Process-unique buffer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared buffer data referenced by a storage and all of its views.
#[derive(Debug)]
struct BufferData {
    id: BufferId,
    raw: RwLock<RawBuffer>,
    allocator: Arc<dyn Allocator>,
    dtype: DType,
    /// Number of elements.
    len: usize,
    /// Timeline value (on the owning device queue) of the last enqueued write.
    last_write: AtomicU64,
    /// First failure that left the contents invalid.
    fault: Mutex<Option<Fault>>,
}

impl Drop for BufferData {
    fn drop(&mut self) {
        let raw = std::mem::take(self.raw.get_mut());
        self.allocator.free(raw);
    }
}

/// Typed device memory, shared by reference between a storage and its views.
///
/// Element addressing (shape, strides, offset) lives in
/// [`Layout`](crate::Layout); a buffer is always a flat run of `len` elements.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Arc<BufferData>,
}

impl Buffer {
    /// Allocate a buffer of `len` elements.
    ///
    /// A byte size that overflows `usize` is requested as `usize::MAX`, which
    /// no allocator can satisfy.
    pub fn allocate(allocator: Arc<dyn Allocator>, dtype: DType, len: usize, options: BufferOptions) -> Result<Self> {
        let raw = allocator.alloc(len.saturating_mul(dtype.bytes()), &options)?;
        Ok(Self {
            data: Arc::new(BufferData {
                id: BufferId::next(),
                raw: RwLock::new(raw),
                allocator,
                dtype,
                len,
                last_write: AtomicU64::new(0),
                fault: Mutex::new(None),
            }),
        })
    }

    pub fn id(&self) -> BufferId {
        self.data.id
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len
    }

    pub fn is_empty(&self) -> bool {
        self.data.len == 0
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len * self.data.dtype.bytes()
    }

    pub fn device(&self) -> DeviceSpec {
        self.data.allocator.device()
    }

    /// Get the allocator used by this buffer.
    pub fn allocator(&self) -> &dyn Allocator {
        &*self.data.allocator
    }

    /// Whether both handles refer to the same allocation.
    pub fn same_storage(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Number of live handles (storages and views) sharing this allocation.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    pub fn last_write(&self) -> u64 {
        self.data.last_write.load(Ordering::Acquire)
    }

    /// Record that a write was enqueued at `timeline`.
    pub fn mark_written(&self, timeline: u64) {
        self.data.last_write.fetch_max(timeline, Ordering::AcqRel);
    }

    pub fn fault(&self) -> Option<Fault> {
        self.data.fault.lock().clone()
    }

    /// Mark the contents invalid. The first fault wins.
    pub fn set_fault(&self, fault: Fault) {
        let mut slot = self.data.fault.lock();
        if slot.is_none() {
            *slot = Some(fault);
        }
    }

    /// Mark the contents valid again after every element has been rewritten.
    pub fn clear_fault(&self) {
        self.data.fault.lock().take();
    }

    /// Run `f` with shared access to the raw bytes.
    ///
    /// Shared access is recursive, so nested calls on the same storage never
    /// block behind a queued writer.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.data.raw.read_recursive().as_slice())
    }

    /// Run `f` with exclusive access to the raw bytes.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.data.raw.write().as_mut_slice())
    }

    /// Copy data from host memory into this buffer.
    pub fn copyin(&self, src: &[u8]) -> Result<()> {
        let expected = self.size();
        let actual = src.len();
        snafu::ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        self.with_bytes_mut(|dst| dst.copy_from_slice(src));
        Ok(())
    }

    /// Copy data from this buffer to host memory.
    pub fn copyout(&self, dst: &mut [u8]) -> Result<()> {
        let expected = self.size();
        let actual = dst.len();
        snafu::ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        self.with_bytes(|src| dst.copy_from_slice(src));
        Ok(())
    }
}
