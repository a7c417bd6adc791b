// This module defines the option structures passed through the compile, load and execute
// stages. Each is a closed, immutable struct with an explicit set of recognized fields rather
// than a dynamic key-value map. CompileOptions carries the replica/partition counts and an
// optional device ordinal that the code generator uses to build the device assignment; the
// topology gate never reads it. LoadOptions has no interpreted fields today. ExecuteOptions
// carries a launch id that is logged with each run. All three implement Default and offer
// builder-style with_* methods so call sites stay short.

//! Compile, load and execute options.

/// Options for [`crate::compiler::Compiler::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    num_replicas: usize,
    num_partitions: usize,
    device_ordinal: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            num_replicas: 1,
            num_partitions: 1,
            device_ordinal: None,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_replicas(mut self, num_replicas: usize) -> Self {
        self.num_replicas = num_replicas;
        self
    }

    pub fn with_num_partitions(mut self, num_partitions: usize) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    /// Pin a single-replica, single-partition program to the device at
    /// `ordinal` in the topology's device list.
    pub fn with_device_ordinal(mut self, ordinal: usize) -> Self {
        self.device_ordinal = Some(ordinal);
        self
    }

    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    pub fn device_ordinal(&self) -> Option<usize> {
        self.device_ordinal
    }
}

/// Options for [`crate::runtime::Client::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct LoadOptions {}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Options for [`crate::runtime::LoadedExecutable::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    launch_id: i32,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launch_id(mut self, launch_id: i32) -> Self {
        self.launch_id = launch_id;
        self
    }

    pub fn launch_id(&self) -> i32 {
        self.launch_id
    }
}
