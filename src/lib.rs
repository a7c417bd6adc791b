//! aotc - topology-bound ahead-of-time compilation for accelerator programs.
//!
//! A program in graph IR (HLO text) or structured IR (MHLO/StableHLO text) is
//! compiled for a device topology, loaded onto a runtime client bound to that
//! topology and executed, producing device buffers that read back as host
//! literals.
//!
//! # Primary Usage
//!
//! ```
//! use aotc::compiler::{Compiler, HostCompiler};
//! use aotc::core::{CompileOptions, ExecuteOptions, Literal, LoadOptions};
//! use aotc::program::{GraphProgram, Program};
//! use aotc::runtime::{Client, HostClient, HostClientOptions};
//!
//! let program = GraphProgram::parse(
//!     "HloModule Computation\n\nENTRY Computation() -> s32[] {\n  ROOT result = s32[] constant(2)\n}",
//! )?;
//! let client = HostClient::new(HostClientOptions::default())?;
//! let topology = client.topology_description()?;
//!
//! let executable = HostCompiler::new().compile(
//!     &CompileOptions::default(),
//!     Program::Graph(&program),
//!     &topology,
//!     Some(&client),
//! )?;
//! let loaded = client.load(executable, &LoadOptions::default())?;
//! let results = loaded.execute(&[vec![]], &ExecuteOptions::default())?;
//! assert_eq!(results[0][0].to_literal_sync()?, Literal::scalar(2i32));
//! # Ok::<(), aotc::core::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, topology, options and host literals
//! - [`program`] - graph and structured IR plus their canonical computation
//! - [`compiler`] - topology gate, code generation and executables
//! - [`runtime`] - client trait and the reference host runtime

pub mod compiler;
pub mod core;
pub mod program;
pub mod runtime;

pub use crate::compiler::{Compiler, Executable, HostCompiler};
pub use crate::core::{
    CompileOptions, Error, ErrorKind, ExecuteOptions, Literal, LoadOptions, Result, Shape, TopologyDescription,
};
pub use crate::program::{GraphProgram, ModuleContext, Program, StructuredModule};
pub use crate::runtime::{Client, DeviceBuffer, HostClient, HostClientOptions, LoadedExecutable};
