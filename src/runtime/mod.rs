// This module defines the runtime side of the pipeline: the Client trait through which the
// compiler observes a runtime's bound topology and through which executables are loaded, plus
// the reference host runtime that implements it. A client owns its devices and a table of
// loaded executables; loading consumes an Executable and hands back a shared LoadedExecutable
// whose execute call runs one invocation per assigned device and returns device-resident
// DeviceBuffers that the caller reads back with to_literal_sync. Everything here is blocking
// and spawns no threads.

//! Runtime clients, loaded executables and device buffers.
//!
//! ```text
//! Executable ──► Client::load ──► Arc<LoadedExecutable> ──► execute ──► Vec<Vec<DeviceBuffer>>
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod device;
mod interpreter;
pub mod loaded;

pub use buffer::DeviceBuffer;
pub use client::HostClient;
pub use config::{AllocatorConfig, HostClientOptions};
pub use device::{DeviceAllocation, DeviceMemory, HostDevice, OutOfMemory};
pub use loaded::{LoadedExecutable, LoadedExecutableId};

use crate::compiler::Executable;
use crate::core::{DeviceId, Literal, LoadOptions, PlatformId, Result, TopologyDescription};
use std::sync::Arc;

/// A runtime bound to one device topology.
pub trait Client: Send + Sync {
    fn platform_id(&self) -> PlatformId;

    fn platform_name(&self) -> &str;

    fn device_ids(&self) -> Vec<DeviceId>;

    /// Topology the client is bound to; stable for the client's lifetime.
    fn topology_description(&self) -> Result<TopologyDescription>;

    /// Bind `executable` to this client, consuming it.
    fn load(&self, executable: Executable, options: &LoadOptions) -> Result<Arc<LoadedExecutable>>;

    /// Copy a host value into the memory of `device`.
    fn buffer_from_host_literal(&self, literal: &Literal, device: DeviceId) -> Result<DeviceBuffer>;
}
