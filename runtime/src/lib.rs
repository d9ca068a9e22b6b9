//! Asynchronous execution for kiln tensors.
//!
//! Each device gets a [`DeviceContext`]: a FIFO queue serviced by its own
//! engine thread, a caching allocator and (for accelerators) a pinned staging
//! pool. Dispatchers build [`OperationRecord`]s whose outputs are allocated up
//! front and enqueue them without waiting; observation and
//! [`DeviceContext::synchronize`] are the only blocking points.
//!
//! # Faults
//!
//! A record that fails on an engine marks its outputs faulted. Records that
//! read a faulted buffer forward the fault instead of computing, so every
//! value derived from a failure fails to observe with the original cause.
//!
//! # Transfers
//!
//! [`TransferEngine`] copies between devices, waiting only for the last write
//! of the source buffer.

pub mod config;
pub mod context;
pub mod error;
pub mod kernels;
pub mod record;
pub mod registry;
pub mod transfer;


pub use config::{RuntimeConfig, parse_visible_devices};
pub use context::DeviceContext;
pub use error::{Error, Result};
pub use kernels::KernelError;
pub use record::{BinaryOp, ExtremumOp, OpKind, OperationRecord, ReduceOp, StorageRef, UnaryOp};
pub use registry::{Runtime, runtime};
pub use transfer::{TransferEngine, TransferPath, TransferSnapshot};
