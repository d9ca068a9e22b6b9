use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::allocator::{Allocator, CachingAllocator, SystemAllocator};
use crate::error::{Error, InvalidDeviceSnafu, Result};

/// Identity of a compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceSpec {
    /// Host CPU.
    Cpu,
    /// Accelerator addressed by its logical (process-visible) ordinal.
    Accelerator { ordinal: usize },
}

impl DeviceSpec {
    pub const fn cpu() -> Self {
        Self::Cpu
    }

    pub const fn accelerator(ordinal: usize) -> Self {
        Self::Accelerator { ordinal }
    }

    pub const fn is_host(&self) -> bool {
        matches!(self, Self::Cpu)
    }

    pub const fn is_accelerator(&self) -> bool {
        matches!(self, Self::Accelerator { .. })
    }
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self::Cpu
    }
}

impl std::fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Accelerator { ordinal } => write!(f, "accel:{ordinal}"),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = Error;

    /// Parse a device string.
    ///
    /// Examples:
    /// - "cpu" -> DeviceSpec::Cpu
    /// - "accel:1" / "cuda:1" / "gpu:1" -> DeviceSpec::Accelerator { ordinal: 1 }
    /// - "cuda" -> DeviceSpec::Accelerator { ordinal: 0 }
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let (kind, ordinal) = match upper.split_once(':') {
            Some((kind, ordinal)) => (kind, Some(ordinal)),
            None => (upper.as_str(), None),
        };

        match (kind, ordinal) {
            ("CPU", None) => Ok(Self::Cpu),
            ("ACCEL" | "CUDA" | "GPU", None) => Ok(Self::Accelerator { ordinal: 0 }),
            ("ACCEL" | "CUDA" | "GPU", Some(ordinal)) => match ordinal.parse() {
                Ok(ordinal) => Ok(Self::Accelerator { ordinal }),
                Err(_) => InvalidDeviceSnafu { device: s }.fail(),
            },
            _ => InvalidDeviceSnafu { device: s }.fail(),
        }
    }
}

/// Memory capacity of each device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    /// Host capacity in bytes, unbounded when `None`.
    pub host: Option<usize>,
    /// Capacity of every accelerator in bytes.
    pub accelerator: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self { host: None, accelerator: 256 * 1024 * 1024 }
    }
}

/// Per-device allocators, created on first use.
#[derive(Debug)]
pub struct AllocatorRegistry {
    limits: MemoryLimits,
    devices: RwLock<HashMap<DeviceSpec, Arc<CachingAllocator>>>,
}

impl AllocatorRegistry {
    pub fn new(limits: MemoryLimits) -> Self {
        Self { limits, devices: RwLock::new(HashMap::new()) }
    }

    pub fn limits(&self) -> MemoryLimits {
        self.limits
    }

    /// Get or create a device allocator.
    pub fn get(&self, spec: DeviceSpec) -> Arc<CachingAllocator> {
        // Fast path: read lock
        if let Some(allocator) = self.devices.read().get(&spec) {
            return Arc::clone(allocator);
        }

        let mut devices = self.devices.write();
        // Double-check after acquiring write lock
        if let Some(allocator) = devices.get(&spec) {
            return Arc::clone(allocator);
        }

        let capacity = match spec {
            DeviceSpec::Cpu => self.limits.host,
            DeviceSpec::Accelerator { .. } => Some(self.limits.accelerator),
        };
        let allocator = Arc::new(CachingAllocator::new(Box::new(SystemAllocator::new(spec, capacity))));
        tracing::debug!(device = %spec, capacity = ?capacity, "created allocator");
        devices.insert(spec, Arc::clone(&allocator));
        allocator
    }

    /// Same as [`get`](Self::get), type-erased.
    pub fn get_dyn(&self, spec: DeviceSpec) -> Arc<dyn Allocator> {
        self.get(spec)
    }
}
