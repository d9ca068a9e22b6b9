//! Cross-device copies.
//!
//! A transfer waits only for the last write to its source (not the whole
//! source queue), packs the source view into contiguous bytes and writes a
//! fresh buffer on the target device. Copies between the host and an
//! accelerator are staged through the accelerator's pinned pool, falling back
//! to pageable memory when no block fits.

use std::sync::atomic::{AtomicU64, Ordering};

use kiln_device::{Buffer, Layout, StagingBuffer};
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::Result;
use crate::record::StorageRef;

/// How the bytes of one transfer travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransferPath {
    /// Staged through a leased pinned block.
    Pinned,
    /// Staged through ordinary host memory.
    Pageable,
    /// Written straight into the target buffer.
    Direct,
}

#[derive(Debug, Default)]
struct TransferStats {
    pinned: AtomicU64,
    pageable: AtomicU64,
    direct: AtomicU64,
    bytes: AtomicU64,
}

/// Point-in-time copy of the transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub pinned: u64,
    pub pageable: u64,
    pub direct: u64,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct TransferEngine {
    stats: TransferStats,
}

impl TransferEngine {
    pub fn stats(&self) -> TransferSnapshot {
        TransferSnapshot {
            pinned: self.stats.pinned.load(Ordering::Relaxed),
            pageable: self.stats.pageable.load(Ordering::Relaxed),
            direct: self.stats.direct.load(Ordering::Relaxed),
            bytes: self.stats.bytes.load(Ordering::Relaxed),
        }
    }

    /// Copy `source` (living on `from`) into a new contiguous buffer on `to`.
    pub fn transfer(&self, source: &StorageRef, from: &DeviceContext, to: &DeviceContext) -> Result<Buffer> {
        from.observe(&source.buffer)?;

        let dtype = source.dtype();
        let numel = source.numel();
        let target = to.allocate(dtype, numel, false)?;
        let size = target.size();

        let crosses_host = from.device().is_host() != to.device().is_host();
        let path = if crosses_host {
            let pool = if from.device().is_host() { to.pinned_pool() } else { from.pinned_pool() };
            let mut staging = StagingBuffer::acquire(pool, size)?;
            if !staging.is_pinned() {
                debug!(from = %from.device(), to = %to.device(), size, "pinned pool exhausted, staging through pageable memory");
            }
            source.buffer.with_bytes(|bytes| pack(bytes, &source.layout, dtype.bytes(), &mut staging));
            target.copyin(&staging)?;
            if staging.is_pinned() { TransferPath::Pinned } else { TransferPath::Pageable }
        } else {
            source
                .buffer
                .with_bytes(|bytes| target.with_bytes_mut(|out| pack(bytes, &source.layout, dtype.bytes(), out)));
            TransferPath::Direct
        };

        let counter = match path {
            TransferPath::Pinned => &self.stats.pinned,
            TransferPath::Pageable => &self.stats.pageable,
            TransferPath::Direct => &self.stats.direct,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(size as u64, Ordering::Relaxed);

        debug!(from = %from.device(), to = %to.device(), %path, size, "transfer");
        Ok(target)
    }
}

/// Gather the elements addressed by `layout` into `out`, in row-major order.
pub(crate) fn pack(src: &[u8], layout: &Layout, width: usize, out: &mut [u8]) {
    if layout.is_contiguous() {
        let start = layout.offset() * width;
        out.copy_from_slice(&src[start..start + out.len()]);
        return;
    }
    for (chunk, offset) in out.chunks_exact_mut(width).zip(layout.offsets()) {
        let start = offset * width;
        chunk.copy_from_slice(&src[start..start + width]);
    }
}
