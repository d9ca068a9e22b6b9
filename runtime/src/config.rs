//! Runtime configuration.
//!
//! Provides typed configuration with a bon builder and environment variable
//! fallbacks. The process-global runtime reads [`RuntimeConfig::from_env`]
//! once, on first use; the values are immutable afterwards.

use bon::bon;
use kiln_device::MemoryLimits;

const MIB: usize = 1024 * 1024;

/// Simulated device topology and memory sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of physical accelerators.
    pub accelerators: usize,
    /// Physical accelerator indices visible to the process, in logical order.
    /// `None` exposes every accelerator.
    pub visible_devices: Option<Vec<usize>>,
    /// Capacity of each accelerator in bytes.
    pub accelerator_memory: usize,
    /// Host capacity in bytes, unbounded when `None`.
    pub host_memory: Option<usize>,
    /// Pinned staging blocks per accelerator.
    pub pinned_blocks: usize,
    /// Bytes per pinned staging block.
    pub pinned_block_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            accelerators: 1,
            visible_devices: None,
            accelerator_memory: 256 * MIB,
            host_memory: None,
            pinned_blocks: 4,
            pinned_block_size: 4 * MIB,
        }
    }
}

#[bon]
impl RuntimeConfig {
    /// Create a runtime configuration with builder pattern.
    ///
    /// ```
    /// use kiln_runtime::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::builder().accelerators(2).visible_devices(vec![1]).build();
    /// assert_eq!(config.physical_ordinal(0), Some(1));
    /// ```
    #[builder]
    pub fn new(
        #[builder(default = 1)] accelerators: usize,
        visible_devices: Option<Vec<usize>>,
        #[builder(default = 256 * MIB)] accelerator_memory: usize,
        host_memory: Option<usize>,
        #[builder(default = 4)] pinned_blocks: usize,
        #[builder(default = 4 * MIB)] pinned_block_size: usize,
    ) -> Self {
        Self { accelerators, visible_devices, accelerator_memory, host_memory, pinned_blocks, pinned_block_size }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_ACCELERATORS` - Number of physical accelerators (default: 1)
    /// * `KILN_VISIBLE_DEVICES` - Comma separated physical indices (default: all)
    /// * `KILN_ACCELERATOR_MEMORY` - Bytes per accelerator (default: 256 MiB)
    /// * `KILN_HOST_MEMORY` - Host capacity in bytes (default: unbounded)
    /// * `KILN_PINNED_BLOCKS` - Pinned staging blocks per accelerator (default: 4)
    /// * `KILN_PINNED_BLOCK_SIZE` - Bytes per pinned block (default: 4 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok();

        Self {
            accelerators: var("KILN_ACCELERATORS").and_then(|s| s.parse().ok()).unwrap_or(defaults.accelerators),
            visible_devices: var("KILN_VISIBLE_DEVICES").map(|s| parse_visible_devices(&s)),
            accelerator_memory: var("KILN_ACCELERATOR_MEMORY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.accelerator_memory),
            host_memory: var("KILN_HOST_MEMORY").and_then(|s| s.parse().ok()),
            pinned_blocks: var("KILN_PINNED_BLOCKS").and_then(|s| s.parse().ok()).unwrap_or(defaults.pinned_blocks),
            pinned_block_size: var("KILN_PINNED_BLOCK_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pinned_block_size),
        }
    }

    pub fn memory_limits(&self) -> MemoryLimits {
        MemoryLimits { host: self.host_memory, accelerator: self.accelerator_memory }
    }

    /// Physical indices addressable by this process, in logical order.
    ///
    /// Indices that do not exist or repeat an earlier entry are dropped.
    pub fn visible_accelerators(&self) -> Vec<usize> {
        match &self.visible_devices {
            None => (0..self.accelerators).collect(),
            Some(list) => {
                let mut visible: Vec<usize> = Vec::with_capacity(list.len());
                for &index in list {
                    if index < self.accelerators && !visible.contains(&index) {
                        visible.push(index);
                    }
                }
                visible
            }
        }
    }

    /// Map a logical accelerator ordinal to its physical index.
    pub fn physical_ordinal(&self, logical: usize) -> Option<usize> {
        self.visible_accelerators().get(logical).copied()
    }
}

/// Parse a visibility list such as `"2,0"`.
///
/// Parsing stops at the first entry that is not an index, so `"1,x,0"`
/// exposes only accelerator 1 and an empty string hides every accelerator.
pub fn parse_visible_devices(value: &str) -> Vec<usize> {
    value.split(',').map(str::trim).map_while(|entry| entry.parse().ok()).collect()
}
