// This module defines TopologyDescription, the immutable identity of a target device set that
// a compiled executable is specialized for. A description carries the platform identity (a
// 64-bit PlatformId fingerprinted from the platform name), the platform name, the device kind
// and the ordered list of device ids. Equality is deliberately narrower than field-by-field
// comparison: two descriptions denote the same topology iff their platform ids and device id
// sequences are equal, so a hand-built description with a different device kind label still
// matches the topology reported by a live client. The compiler's validation gate relies on this
// rule. Descriptions are plain values, cloned freely and never mutated after construction.

//! Device topology descriptions.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Name of the platform served by the reference host runtime.
pub const HOST_PLATFORM_NAME: &str = "host";

/// Opaque platform identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformId(u64);

impl PlatformId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Stable fingerprint of a platform name (64-bit FNV-1a).
    pub fn from_name(name: &str) -> Self {
        Self(fingerprint64(name.as_bytes()))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// 64-bit FNV-1a hash.
pub(crate) fn fingerprint64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Platform id of the reference host runtime.
pub fn host_platform_id() -> PlatformId {
    PlatformId::from_name(HOST_PLATFORM_NAME)
}

/// Identifier of a single device within a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Immutable description of a target device set.
///
/// Two descriptions are the same topology iff their [`PlatformId`] and
/// ordered device ids are equal. Platform name and device kind are carried
/// for diagnostics only.
#[derive(Debug, Clone)]
pub struct TopologyDescription {
    platform_id: PlatformId,
    platform_name: String,
    device_kind: String,
    device_ids: Vec<DeviceId>,
}

impl TopologyDescription {
    pub fn new<I>(
        platform_id: PlatformId,
        platform_name: impl Into<String>,
        device_kind: impl Into<String>,
        device_ids: I,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DeviceId>,
    {
        Self {
            platform_id,
            platform_name: platform_name.into(),
            device_kind: device_kind.into(),
            device_ids: device_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn platform_id(&self) -> PlatformId {
        self.platform_id
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn device_kind(&self) -> &str {
        &self.device_kind
    }

    pub fn device_ids(&self) -> &[DeviceId] {
        &self.device_ids
    }

    pub fn device_count(&self) -> usize {
        self.device_ids.len()
    }

    pub fn contains_device(&self, id: DeviceId) -> bool {
        self.device_ids.contains(&id)
    }

    /// Whether `self` and `other` denote the same topology.
    pub fn is_same_topology(&self, other: &TopologyDescription) -> bool {
        self.platform_id == other.platform_id && self.device_ids == other.device_ids
    }
}

impl PartialEq for TopologyDescription {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_topology(other)
    }
}

impl Eq for TopologyDescription {}

impl Hash for TopologyDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.platform_id.hash(state);
        self.device_ids.hash(state);
    }
}

impl fmt::Display for TopologyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] devices {{", self.platform_name, self.device_kind)?;
        for (i, id) in self.device_ids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}
