//! Device-level building blocks for the kiln runtime.
//!
//! This crate knows nothing about operators. It provides:
//! - **Device specs**: `cpu`, `accel:N` identities and parsing
//! - **Allocators**: bounded system memory plus a caching layer per device
//! - **Buffers**: reference-counted typed bytes with write/fault bookkeeping
//! - **Layouts**: shape/stride/offset addressing for zero-copy views
//! - **Pinned pool**: bounded staging blocks for host/accelerator copies
//! - **Queues**: FIFO command queues serviced by a per-device engine thread,
//!   synchronized through timeline signals

pub mod allocator;
pub mod buffer;
pub mod error;
pub mod layout;
pub mod pinned;
pub mod queue;
pub mod registry;
mod sync;


pub use allocator::{Allocator, BufferOptions, CachingAllocator, RawBuffer, SystemAllocator};
pub use buffer::{Buffer, BufferId};
pub use error::{Error, Result};
pub use layout::{Dims, Layout, normalize_axis};
pub use pinned::{PinnedBlock, PinnedPool, StagingBuffer};
pub use queue::{BarrierState, Command, CommandQueue, Fault};
pub use registry::{AllocatorRegistry, DeviceSpec, MemoryLimits};
