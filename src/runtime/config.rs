//! Host runtime configuration.
//!
//! Options default to a single `host_device` with unlimited memory.
//! [`HostClientOptions::from_env`] overlays the environment:
//!
//! - `AOTC_HOST_DEVICE_COUNT` - number of emulated devices
//! - `AOTC_HOST_MEMORY_LIMIT` - per-device memory budget in bytes

use crate::core::{Error, Result, HOST_PLATFORM_NAME};

pub const DEVICE_COUNT_VAR: &str = "AOTC_HOST_DEVICE_COUNT";
pub const MEMORY_LIMIT_VAR: &str = "AOTC_HOST_MEMORY_LIMIT";

/// Per-device allocator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Maximum number of bytes a device may hold at once.
    pub memory_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostClientOptions {
    pub platform_name: String,
    pub device_kind: String,
    pub device_count: usize,
    /// Index of this host; device ids are numbered from `node_id * device_count`.
    pub node_id: usize,
    pub allocator: AllocatorConfig,
}

impl Default for HostClientOptions {
    fn default() -> Self {
        Self {
            platform_name: HOST_PLATFORM_NAME.to_string(),
            device_kind: "host_device".to_string(),
            device_count: 1,
            node_id: 0,
            allocator: AllocatorConfig::default(),
        }
    }
}

impl HostClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values returned by `lookup` for the `AOTC_HOST_*` variables.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(DEVICE_COUNT_VAR) {
            self.device_count = parse_var(DEVICE_COUNT_VAR, &value)?;
            log::debug!("{} = {}", DEVICE_COUNT_VAR, self.device_count);
        }
        if let Some(value) = lookup(MEMORY_LIMIT_VAR) {
            self.allocator.memory_limit = Some(parse_var(MEMORY_LIMIT_VAR, &value)?);
            log::debug!("{} = {}", MEMORY_LIMIT_VAR, value.trim());
        }
        Ok(self)
    }

    pub fn with_platform_name(mut self, name: impl Into<String>) -> Self {
        self.platform_name = name.into();
        self
    }

    pub fn with_device_kind(mut self, kind: impl Into<String>) -> Self {
        self.device_kind = kind.into();
        self
    }

    pub fn with_device_count(mut self, count: usize) -> Self {
        self.device_count = count;
        self
    }

    pub fn with_node_id(mut self, node_id: usize) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.allocator.memory_limit = Some(bytes);
        self
    }
}

fn parse_var(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_argument(format!("{} must be a non-negative integer, got {:?}: {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_defaults() {
        let options = HostClientOptions::default();
        assert_eq!(options.platform_name, "host");
        assert_eq!(options.device_kind, "host_device");
        assert_eq!(options.device_count, 1);
        assert_eq!(options.allocator.memory_limit, None);
    }

    #[test]
    fn test_overlay() {
        let options = HostClientOptions::default()
            .overlay(|name| match name {
                DEVICE_COUNT_VAR => Some("4".to_string()),
                MEMORY_LIMIT_VAR => Some(" 1024 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(options.device_count, 4);
        assert_eq!(options.allocator.memory_limit, Some(1024));
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let err = HostClientOptions::default()
            .overlay(|name| (name == DEVICE_COUNT_VAR).then(|| "two".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains(DEVICE_COUNT_VAR));
    }
}
