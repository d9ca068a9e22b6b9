use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{OutOfMemorySnafu, Result};
use crate::registry::DeviceSpec;

/// Opaque handle to device memory.
///
/// Accelerator memory is simulated by a separate host allocation that is
/// accounted against the accelerator's own capacity.
#[derive(Debug, Default)]
pub struct RawBuffer {
    data: Box<[u8]>,
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer (reused blocks are dirty otherwise).
    pub zero_init: bool,
}

pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, buffer: RawBuffer);
    fn device(&self) -> DeviceSpec;
    /// Bytes held by live buffers.
    fn allocated(&self) -> usize;
    /// Bytes obtained from the device, including cached blocks.
    fn reserved(&self) -> usize {
        self.allocated()
    }
    /// Release cached blocks back to the device.
    fn empty_cache(&self) {}
}

/// Device memory with an optional hard capacity.
#[derive(Debug)]
pub struct SystemAllocator {
    device: DeviceSpec,
    capacity: Option<usize>,
    used: AtomicUsize,
}

impl SystemAllocator {
    pub fn new(device: DeviceSpec, capacity: Option<usize>) -> Self {
        Self { device, capacity, used: AtomicUsize::new(0) }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn available(&self, used: usize) -> usize {
        self.capacity.unwrap_or(usize::MAX).saturating_sub(used)
    }
}

/// Zeroed host memory that reports failure instead of aborting the process.
pub(crate) fn zeroed(size: usize) -> std::result::Result<Box<[u8]>, std::collections::TryReserveError> {
    let mut data = Vec::new();
    data.try_reserve_exact(size)?;
    data.resize(size, 0);
    Ok(data.into_boxed_slice())
}

impl Allocator for SystemAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        let reserve = self.used.fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
            let next = used.checked_add(size)?;
            match self.capacity {
                Some(capacity) if next > capacity => None,
                _ => Some(next),
            }
        });

        if let Err(used) = reserve {
            return OutOfMemorySnafu { device: self.device, requested: size, available: self.available(used) }.fail();
        }

        let data = zeroed(size).map_err(|_| {
            let used = self.used.fetch_sub(size, Ordering::AcqRel) - size;
            OutOfMemorySnafu { device: self.device, requested: size, available: self.available(used) }.build()
        })?;
        Ok(RawBuffer { data })
    }

    fn free(&self, buffer: RawBuffer) {
        self.used.fetch_sub(buffer.size(), Ordering::AcqRel);
    }

    fn device(&self) -> DeviceSpec {
        self.device
    }

    fn allocated(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

/// Caching allocator that keeps freed blocks for reuse, keyed by size.
///
/// On allocation failure the cache is released and the request retried once.
#[derive(Debug)]
pub struct CachingAllocator {
    inner: Box<dyn Allocator>,
    cache: Mutex<HashMap<usize, Vec<RawBuffer>>>,
    max_buffers_per_size: usize,
    in_use: AtomicUsize,
}

impl CachingAllocator {
    pub fn new(inner: Box<dyn Allocator>) -> Self {
        Self::with_capacity(inner, 32)
    }

    pub fn with_capacity(inner: Box<dyn Allocator>, max_buffers_per_size: usize) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()), max_buffers_per_size, in_use: AtomicUsize::new(0) }
    }

    /// Number of blocks currently cached.
    pub fn cached_blocks(&self) -> usize {
        self.cache.lock().values().map(Vec::len).sum()
    }
}

impl Allocator for CachingAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        // Try cache first
        let cached = {
            let mut cache = self.cache.lock();
            let buffer = cache.get_mut(&size).and_then(Vec::pop);
            if cache.get(&size).is_some_and(Vec::is_empty) {
                cache.remove(&size);
            }
            buffer
        }; // Drop lock before expensive allocation

        let buffer = match cached {
            Some(mut buffer) => {
                if options.zero_init {
                    buffer.as_mut_slice().fill(0);
                }
                buffer
            }
            None => match self.inner.alloc(size, options) {
                Ok(buffer) => buffer,
                Err(_) => {
                    // On allocation failure, release the cache and retry
                    tracing::debug!(device = %self.inner.device(), size, "allocation failed, releasing cache");
                    self.empty_cache();
                    self.inner.alloc(size, options)?
                }
            },
        };

        self.in_use.fetch_add(size, Ordering::AcqRel);
        Ok(buffer)
    }

    fn free(&self, buffer: RawBuffer) {
        self.in_use.fetch_sub(buffer.size(), Ordering::AcqRel);

        let mut cache = self.cache.lock();
        let buffers = cache.entry(buffer.size()).or_default();
        if buffers.len() < self.max_buffers_per_size {
            buffers.push(buffer);
        } else {
            drop(cache);
            self.inner.free(buffer);
        }
    }

    fn device(&self) -> DeviceSpec {
        self.inner.device()
    }

    fn allocated(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    fn reserved(&self) -> usize {
        self.inner.allocated()
    }

    fn empty_cache(&self) {
        let drained: Vec<RawBuffer> = self.cache.lock().drain().flat_map(|(_, buffers)| buffers).collect();
        for buffer in drained {
            self.inner.free(buffer);
        }
    }
}
