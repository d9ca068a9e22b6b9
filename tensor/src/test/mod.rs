
use std::sync::Arc;

use kiln_runtime::{DeviceContext, Runtime, RuntimeConfig};

use crate::{DeviceSpec, HasDType, Tensor};

/// Private runtime with two accelerators.
///
/// Tests that synchronize a whole device, or expect a deferred fault, use
/// their own runtime so that faults of concurrently running tests cannot
/// surface in them.
pub(crate) fn runtime() -> Arc<Runtime> {
    Runtime::new(RuntimeConfig::builder().accelerators(2).build())
}

pub(crate) fn accel(runtime: &Runtime, ordinal: usize) -> Arc<DeviceContext> {
    runtime.context(DeviceSpec::accelerator(ordinal)).unwrap()
}

/// Host tensor on the global runtime reshaped to `shape`.
pub(crate) fn tensor<T: HasDType>(values: &[T], shape: &[isize]) -> Tensor {
    Tensor::from_slice(values).unwrap().try_reshape(shape).unwrap()
}
