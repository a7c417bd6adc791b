// This module gathers the vocabulary shared by every stage of the pipeline: the crate error
// type, topology descriptions with their platform and device identities, the closed option
// structs for compile/load/execute, and host literals with their shapes and element types.
// Nothing in here depends on the program representations, the compiler or the runtime, so all
// other modules build on it.

//! Core types shared across aotc.
//!
//! - [`error`] - `Error`, `ErrorKind` and the `Result` alias
//! - [`topology`] - `TopologyDescription`, `PlatformId`, `DeviceId`
//! - [`options`] - `CompileOptions`, `LoadOptions`, `ExecuteOptions`
//! - [`literal`] - `Literal`, `Shape`, `PrimitiveType`

pub mod error;
pub mod literal;
pub mod options;
pub mod topology;

pub use error::{Error, ErrorKind, Result};
pub use literal::{Literal, LiteralData, NativeType, PrimitiveType, Shape, MAX_LITERAL_BYTES};
pub use options::{CompileOptions, ExecuteOptions, LoadOptions};
pub use topology::{host_platform_id, DeviceId, PlatformId, TopologyDescription, HOST_PLATFORM_NAME};
