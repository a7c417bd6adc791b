// This module implements the emulated devices of the host runtime. Each HostDevice owns a
// DeviceMemory budget: an atomic byte counter checked against the configured limit on every
// reservation, with a high-water mark kept for diagnostics. A DeviceAllocation is the storage
// behind a device buffer. It holds the little-endian element bytes together with an Arc on its
// device and gives its bytes back to the budget when dropped, so memory is accounted exactly as
// long as some buffer refers to it. Reservations never block; exhausting the budget reports an
// OutOfMemory error that callers translate into the crate error of their operation.

use super::config::AllocatorConfig;
use crate::core::DeviceId;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("device {device} is out of memory: requested {requested} bytes with {in_use} of {limit} in use")]
pub struct OutOfMemory {
    pub device: DeviceId,
    pub requested: usize,
    pub in_use: usize,
    pub limit: usize,
}

/// Byte budget of one device.
#[derive(Debug)]
pub struct DeviceMemory {
    limit: Option<usize>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl DeviceMemory {
    pub fn new(config: &AllocatorConfig) -> Self {
        Self {
            limit: config.memory_limit,
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn reserve(&self, device: DeviceId, bytes: usize) -> Result<(), OutOfMemory> {
        let reserved = self.in_use.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let next = current.checked_add(bytes)?;
            match self.limit {
                Some(limit) if next > limit => None,
                _ => Some(next),
            }
        });
        match reserved {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
                Ok(())
            }
            Err(in_use) => Err(OutOfMemory {
                device,
                requested: bytes,
                in_use,
                limit: self.limit.unwrap_or(usize::MAX),
            }),
        }
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Bytes currently held by live allocations.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// An emulated accelerator device.
#[derive(Debug)]
pub struct HostDevice {
    id: DeviceId,
    kind: String,
    memory: DeviceMemory,
}

impl HostDevice {
    pub fn new(id: DeviceId, kind: impl Into<String>, config: &AllocatorConfig) -> Self {
        Self {
            id,
            kind: kind.into(),
            memory: DeviceMemory::new(config),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    /// Move `bytes` into device memory.
    pub fn allocate(self: &Arc<Self>, bytes: Vec<u8>) -> Result<DeviceAllocation, OutOfMemory> {
        self.memory.reserve(self.id, bytes.len())?;
        log::trace!("device {}: allocated {} bytes ({} in use)", self.id, bytes.len(), self.memory.in_use());
        Ok(DeviceAllocation {
            device: Arc::clone(self),
            bytes,
        })
    }
}

impl fmt::Display for HostDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Device-resident bytes; released back to the device budget on drop.
#[derive(Debug)]
pub struct DeviceAllocation {
    device: Arc<HostDevice>,
    bytes: Vec<u8>,
}

impl DeviceAllocation {
    pub fn device(&self) -> &Arc<HostDevice> {
        &self.device
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for DeviceAllocation {
    fn drop(&mut self) {
        self.device.memory.release(self.bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(limit: Option<usize>) -> Arc<HostDevice> {
        Arc::new(HostDevice::new(DeviceId(3), "host_device", &AllocatorConfig { memory_limit: limit }))
    }

    #[test]
    fn test_allocation_accounting() {
        let device = device(None);
        let a = device.allocate(vec![0; 16]).unwrap();
        let b = device.allocate(vec![0; 8]).unwrap();
        assert_eq!(device.memory().in_use(), 24);
        drop(a);
        assert_eq!(device.memory().in_use(), 8);
        drop(b);
        assert_eq!(device.memory().in_use(), 0);
        assert_eq!(device.memory().peak(), 24);
    }

    #[test]
    fn test_memory_limit() {
        let device = device(Some(10));
        let held = device.allocate(vec![1; 8]).unwrap();
        let err = device.allocate(vec![1; 4]).unwrap_err();
        assert_eq!(
            err,
            OutOfMemory {
                device: DeviceId(3),
                requested: 4,
                in_use: 8,
                limit: 10
            }
        );
        drop(held);
        assert!(device.allocate(vec![1; 10]).is_ok());
    }
}
