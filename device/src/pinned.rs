//! Page-locked staging memory for host/accelerator copies.
//!
//! A [`PinnedPool`] owns a bounded number of fixed-size blocks. Leasing a
//! block never blocks: when every block is out (or the payload is larger
//! than a block) callers fall back to a pageable [`StagingBuffer`].

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use snafu::OptionExt;

use crate::allocator::zeroed;
use crate::error::{OutOfMemorySnafu, Result};
use crate::registry::DeviceSpec;

#[derive(Debug)]
pub struct PinnedPool {
    block_size: usize,
    capacity: usize,
    free: Mutex<Vec<Box<[u8]>>>,
    /// Blocks allocated so far (leased or free), never above `capacity`.
    allocated: AtomicUsize,
}

impl PinnedPool {
    pub fn new(capacity: usize, block_size: usize) -> Arc<Self> {
        Arc::new(Self { block_size, capacity, free: Mutex::new(Vec::new()), allocated: AtomicUsize::new(0) })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks that can be leased right now.
    pub fn available(&self) -> usize {
        self.free.lock().len() + (self.capacity - self.allocated.load(Ordering::Acquire))
    }

    /// Lease a block able to hold `len` bytes, if one is free.
    pub fn acquire(self: &Arc<Self>, len: usize) -> Option<PinnedBlock> {
        if len > self.block_size {
            return None;
        }

        let block = match self.free.lock().pop() {
            Some(block) => block,
            None => {
                self.allocated
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.capacity).then_some(n + 1))
                    .ok()?;
                match zeroed(self.block_size) {
                    Ok(block) => block,
                    Err(_) => {
                        self.allocated.fetch_sub(1, Ordering::AcqRel);
                        return None;
                    }
                }
            }
        };

        Some(PinnedBlock { pool: Arc::clone(self), data: Some(block), len })
    }
}

/// A leased pinned block, returned to its pool on drop.
#[derive(Debug)]
pub struct PinnedBlock {
    pool: Arc<PinnedPool>,
    data: Option<Box<[u8]>>,
    len: usize,
}

impl Deref for PinnedBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[..self.len],
            None => &[],
        }
    }
}

impl DerefMut for PinnedBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            Some(data) => &mut data[..self.len],
            None => &mut [],
        }
    }
}

impl Drop for PinnedBlock {
    fn drop(&mut self) {
        if let Some(block) = self.data.take() {
            self.pool.free.lock().push(block);
        }
    }
}

/// Host staging memory for a single transfer.
#[derive(Debug)]
pub enum StagingBuffer {
    Pinned(PinnedBlock),
    Pageable(Box<[u8]>),
}

impl StagingBuffer {
    /// Lease from `pool` when possible, otherwise allocate pageable memory.
    pub fn acquire(pool: Option<&Arc<PinnedPool>>, len: usize) -> Result<Self> {
        match pool.and_then(|pool| pool.acquire(len)) {
            Some(block) => Ok(Self::Pinned(block)),
            None => {
                let data = zeroed(len).ok().context(OutOfMemorySnafu {
                    device: DeviceSpec::Cpu,
                    requested: len,
                    available: 0usize,
                })?;
                Ok(Self::Pageable(data))
            }
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

impl Deref for StagingBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Pinned(block) => block,
            Self::Pageable(data) => data,
        }
    }
}

impl DerefMut for StagingBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Pinned(block) => block,
            Self::Pageable(data) => data,
        }
    }
}
