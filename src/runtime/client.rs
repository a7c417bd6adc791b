// This module implements HostClient, the reference runtime client. It emulates a fixed set of
// devices on the host, all sharing one platform identity and device kind, and reports them as
// its bound topology. Loading consumes an Executable, resolves every device of its assignment
// against the client's own devices, and records the resulting LoadedExecutable in a binding
// table keyed by a client-unique id. The table sits behind a mutex so a client can be shared
// between threads; a poisoned lock is recovered since the table holds no invariant a panicking
// thread could break halfway. Host literals are transferred into device memory on request so
// executables can be given arguments.

use super::buffer::DeviceBuffer;
use super::config::HostClientOptions;
use super::device::HostDevice;
use super::loaded::{LoadedExecutable, LoadedExecutableId};
use super::Client;
use crate::compiler::Executable;
use crate::core::{DeviceId, Error, Literal, LoadOptions, PlatformId, Result, TopologyDescription};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Runtime client emulating accelerator devices on the host.
#[derive(Debug)]
pub struct HostClient {
    options: HostClientOptions,
    topology: TopologyDescription,
    devices: Vec<Arc<HostDevice>>,
    loaded: Mutex<HashMap<LoadedExecutableId, Arc<LoadedExecutable>>>,
    next_id: AtomicU64,
}

impl HostClient {
    pub fn new(options: HostClientOptions) -> Result<Self> {
        if options.device_count == 0 {
            return Err(Error::invalid_argument("a host client needs at least one device"));
        }
        let first = options
            .node_id
            .checked_mul(options.device_count)
            .ok_or_else(|| Error::invalid_argument("node id x device count overflows"))?;

        let mut devices = Vec::with_capacity(options.device_count);
        for i in 0..options.device_count {
            let id = first
                .checked_add(i)
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| Error::invalid_argument(format!("device id {} + {} is out of range", first, i)))?;
            devices.push(Arc::new(HostDevice::new(DeviceId(id), options.device_kind.clone(), &options.allocator)));
        }

        let topology = TopologyDescription::new(
            PlatformId::from_name(&options.platform_name),
            options.platform_name.clone(),
            options.device_kind.clone(),
            devices.iter().map(|d| d.id()),
        );
        log::info!("host client bound to {}", topology);

        Ok(Self {
            options,
            topology,
            devices,
            loaded: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Client configured from defaults and the `AOTC_HOST_*` environment.
    pub fn from_env() -> Result<Self> {
        Self::new(HostClientOptions::from_env()?)
    }

    pub fn options(&self) -> &HostClientOptions {
        &self.options
    }

    pub fn devices(&self) -> &[Arc<HostDevice>] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> Option<&Arc<HostDevice>> {
        self.devices.iter().find(|d| d.id() == id)
    }

    fn bindings(&self) -> MutexGuard<'_, HashMap<LoadedExecutableId, Arc<LoadedExecutable>>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently bound executables, in load order.
    pub fn loaded_executables(&self) -> Vec<Arc<LoadedExecutable>> {
        let mut loaded: Vec<_> = self.bindings().values().cloned().collect();
        loaded.sort_by_key(|l| l.id());
        loaded
    }

    /// Discard the binding of `id`, returning it if it existed.
    pub fn unload(&self, id: LoadedExecutableId) -> Option<Arc<LoadedExecutable>> {
        let removed = self.bindings().remove(&id);
        if let Some(loaded) = &removed {
            log::debug!("unloaded {}", loaded);
        }
        removed
    }
}

impl Client for HostClient {
    fn platform_id(&self) -> PlatformId {
        self.topology.platform_id()
    }

    fn platform_name(&self) -> &str {
        self.topology.platform_name()
    }

    fn device_ids(&self) -> Vec<DeviceId> {
        self.topology.device_ids().to_vec()
    }

    fn topology_description(&self) -> Result<TopologyDescription> {
        Ok(self.topology.clone())
    }

    fn load(&self, executable: Executable, _options: &LoadOptions) -> Result<Arc<LoadedExecutable>> {
        let mut devices = Vec::with_capacity(executable.device_assignment().num_invocations());
        for &id in executable.device_assignment().devices() {
            let device = self.device(id).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "{} is assigned to device {} which client {} does not own",
                    executable.name(),
                    id,
                    self.topology
                ))
            })?;
            devices.push(Arc::clone(device));
        }

        let id = LoadedExecutableId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let loaded = Arc::new(LoadedExecutable::new(id, executable, devices));
        self.bindings().insert(id, Arc::clone(&loaded));
        log::info!("loaded {}", loaded);
        Ok(loaded)
    }

    fn buffer_from_host_literal(&self, literal: &Literal, device: DeviceId) -> Result<DeviceBuffer> {
        let target = self
            .device(device)
            .ok_or_else(|| Error::invalid_argument(format!("device {} is not part of {}", device, self.topology)))?;
        let allocation = target
            .allocate(literal.to_bytes())
            .map_err(|oom| Error::transfer(oom.to_string()))?;
        log::trace!("transferred {} to device {}", literal.shape(), device);
        Ok(DeviceBuffer::new(literal.shape().clone(), allocation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host_platform_id;

    #[test]
    fn test_device_numbering() {
        let client = HostClient::new(HostClientOptions::new().with_device_count(2).with_node_id(3)).unwrap();
        assert_eq!(client.device_ids(), vec![DeviceId(6), DeviceId(7)]);
        assert_eq!(client.platform_id(), host_platform_id());
        assert_eq!(client.platform_name(), "host");
        assert!(client.device(DeviceId(0)).is_none());
    }

    #[test]
    fn test_zero_devices_rejected() {
        assert!(HostClient::new(HostClientOptions::new().with_device_count(0)).is_err());
    }

    #[test]
    fn test_transfer_accounts_memory() {
        let client = HostClient::new(HostClientOptions::new().with_memory_limit(8)).unwrap();
        let buffer = client.buffer_from_host_literal(&Literal::vec1(&[1i32, 2]), DeviceId(0)).unwrap();
        assert_eq!(buffer.size_in_bytes(), 8);
        assert_eq!(client.devices()[0].memory().in_use(), 8);

        let err = client
            .buffer_from_host_literal(&Literal::scalar(1i32), DeviceId(0))
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::TransferFailure);

        drop(buffer);
        assert_eq!(client.devices()[0].memory().in_use(), 0);
    }
}
