//! Runtime: the registry of device contexts.
//!
//! Contexts are created lazily, once per device, using double-checked
//! locking. Accelerator ordinals are logical: ordinal `n` addresses the
//! `n`-th entry of the configured visibility list.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use kiln_device::{AllocatorRegistry, DeviceSpec, PinnedPool};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::RuntimeConfig;
use crate::context::DeviceContext;
use crate::error::{DeviceUnavailableSnafu, Result};
use crate::transfer::TransferEngine;

pub struct Runtime {
    config: RuntimeConfig,
    /// Physical accelerator indices, in logical order.
    visible: Vec<usize>,
    allocators: AllocatorRegistry,
    contexts: RwLock<HashMap<DeviceSpec, Arc<DeviceContext>>>,
    transfers: TransferEngine,
    this: Weak<Runtime>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("visible", &self.visible)
            .field("contexts", &self.contexts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        let visible = config.visible_accelerators();
        tracing::debug!(accelerators = config.accelerators, ?visible, "creating runtime");

        Arc::new_cyclic(|this| Self {
            allocators: AllocatorRegistry::new(config.memory_limits()),
            config,
            visible,
            contexts: RwLock::new(HashMap::new()),
            transfers: TransferEngine::default(),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of accelerators visible to this process.
    pub fn accelerator_count(&self) -> usize {
        self.visible.len()
    }

    /// Every addressable device: the host followed by the visible accelerators.
    pub fn devices(&self) -> Vec<DeviceSpec> {
        std::iter::once(DeviceSpec::Cpu).chain((0..self.visible.len()).map(DeviceSpec::accelerator)).collect()
    }

    pub fn transfers(&self) -> &TransferEngine {
        &self.transfers
    }

    /// Get or create the context of `device`.
    pub fn context(&self, device: DeviceSpec) -> Result<Arc<DeviceContext>> {
        // Fast path: read lock
        if let Some(context) = self.contexts.read().get(&device) {
            return Ok(Arc::clone(context));
        }

        let physical = match device {
            DeviceSpec::Cpu => None,
            DeviceSpec::Accelerator { ordinal } => match self.visible.get(ordinal) {
                Some(&physical) => Some(physical),
                None => return DeviceUnavailableSnafu { device, visible: self.visible.len() }.fail(),
            },
        };

        let mut contexts = self.contexts.write();
        // Double-check after acquiring write lock
        if let Some(context) = contexts.get(&device) {
            return Ok(Arc::clone(context));
        }

        let pinned = device
            .is_accelerator()
            .then(|| PinnedPool::new(self.config.pinned_blocks, self.config.pinned_block_size));
        let context =
            Arc::new(DeviceContext::new(device, physical, self.allocators.get(device), pinned, self.this.clone())?);
        contexts.insert(device, Arc::clone(&context));
        Ok(context)
    }

    pub fn cpu(&self) -> Result<Arc<DeviceContext>> {
        self.context(DeviceSpec::Cpu)
    }

    /// Synchronize every created context; reports the first failure after all have drained.
    pub fn synchronize_all(&self) -> Result<()> {
        let contexts: Vec<Arc<DeviceContext>> = self.contexts.read().values().cloned().collect();
        let mut first = Ok(());
        for context in contexts {
            let result = context.synchronize();
            if first.is_ok() {
                first = result;
            }
        }
        first
    }
}

static RUNTIME: Lazy<Arc<Runtime>> = Lazy::new(|| Runtime::new(RuntimeConfig::from_env()));

/// Process-global runtime, configured from the environment on first access.
pub fn runtime() -> Arc<Runtime> {
    Arc::clone(&RUNTIME)
}
