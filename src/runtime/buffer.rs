//! Device-resident values.

use super::device::DeviceAllocation;
use crate::core::{DeviceId, Literal, Result, Shape};
use std::fmt;
use std::sync::Arc;

/// Handle on a value held in device memory.
///
/// Buffers are owned by the caller once returned from an execution or a
/// host-to-device transfer. Reading a buffer back never invalidates it.
#[derive(Debug)]
pub struct DeviceBuffer {
    shape: Shape,
    allocation: Arc<DeviceAllocation>,
}

impl DeviceBuffer {
    pub(crate) fn new(shape: Shape, allocation: DeviceAllocation) -> Self {
        Self {
            shape,
            allocation: Arc::new(allocation),
        }
    }

    /// Second handle on the same device memory.
    pub(crate) fn share(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            allocation: Arc::clone(&self.allocation),
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.allocation.bytes()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Device holding the buffer.
    pub fn device_id(&self) -> DeviceId {
        self.allocation.device().id()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.allocation.len()
    }

    /// Copy the buffer to host memory and decode it.
    pub fn to_literal_sync(&self) -> Result<Literal> {
        log::trace!("reading {} from device {}", self.shape, self.device_id());
        Literal::from_bytes(&self.shape, self.allocation.bytes())
    }
}

impl fmt::Display for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on device {}", self.shape, self.device_id())
    }
}
