// This module defines the Compiler trait and its host implementation, HostCompiler. Every
// compile request first passes the topology validation gate: without a runtime client the
// request is refused as unimplemented, and a client whose bound topology differs from the
// requested one is refused the same way, before any lowering work happens. A failure of the
// client to report its topology is propagated unchanged. Requests that pass the gate are
// dispatched on the program variant: a graph program and a structured module are each
// canonicalized into a Computation by their own path, then handed to the shared code generator
// in codegen.rs, which produces the topology-tagged Executable. The compiler only reads its
// inputs; on failure nothing is produced and no input is modified.

//! Program compilation.
//!
//! ```text
//! Program ──► validate_topology ──► lower_graph / lower_module ──► codegen::lower ──► Executable
//! ```
//!
//! # Components
//!
//! - [`analyzer`] - reachability and last-use analysis of a computation
//! - [`assignment`] - replica/partition to device mapping
//! - [`codegen`] - slot-based instruction lowering
//! - [`executable`] - the move-only compile result

pub mod analyzer;
pub mod assignment;
pub mod codegen;
pub mod executable;

pub use analyzer::{Analyzer, LivenessInfo};
pub use assignment::DeviceAssignment;
pub use codegen::{CompileStats, CompiledProgram, Instruction, Slot};
pub use executable::Executable;

use crate::core::{CompileOptions, Error, Result, TopologyDescription};
use crate::program::{GraphProgram, Program, ProgramKind, StructuredModule};
use crate::runtime::Client;

/// Ahead-of-time compiler for one device topology.
pub trait Compiler {
    /// Compile `program` for `topology`.
    ///
    /// `client` is the runtime the executable will be loaded on; its bound
    /// topology must equal `topology`.
    fn compile(
        &self,
        options: &CompileOptions,
        program: Program<'_>,
        topology: &TopologyDescription,
        client: Option<&dyn Client>,
    ) -> Result<Executable>;
}

/// Compiler targeting the reference host runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCompiler;

impl HostCompiler {
    pub fn new() -> Self {
        Self
    }

    fn lower_graph(
        &self,
        options: &CompileOptions,
        program: &GraphProgram,
        topology: &TopologyDescription,
    ) -> Result<Executable> {
        log::debug!("lowering graph program {}", program.name());
        let computation = program.to_computation()?;
        codegen::lower(&computation, ProgramKind::Graph, options, topology)
    }

    fn lower_module(
        &self,
        options: &CompileOptions,
        module: &StructuredModule<'_>,
        topology: &TopologyDescription,
    ) -> Result<Executable> {
        log::debug!("lowering structured module with {} function(s)", module.functions().len());
        let computation = module.to_computation()?;
        codegen::lower(&computation, ProgramKind::Structured, options, topology)
    }
}

/// Check that `client` exists and is bound to `topology`.
pub fn validate_topology(topology: &TopologyDescription, client: Option<&dyn Client>) -> Result<()> {
    let Some(client) = client else {
        log::warn!("rejecting compile for {}: no client supplied", topology);
        return Err(Error::unimplemented(
            "client-less compilation is not supported by this backend",
        ));
    };

    let bound = client.topology_description()?;
    if !bound.is_same_topology(topology) {
        log::warn!("rejecting compile: requested topology {} but client is bound to {}", topology, bound);
        return Err(Error::unimplemented(
            "supplied topology does not match the client's bound topology",
        ));
    }

    log::debug!("topology {} accepted", topology);
    Ok(())
}

impl Compiler for HostCompiler {
    fn compile(
        &self,
        options: &CompileOptions,
        program: Program<'_>,
        topology: &TopologyDescription,
        client: Option<&dyn Client>,
    ) -> Result<Executable> {
        validate_topology(topology, client)?;

        let executable = match program {
            Program::Graph(graph) => self.lower_graph(options, graph, topology)?,
            Program::Module(module) => self.lower_module(options, module, topology)?,
        };
        log::info!("compiled {}", executable);
        Ok(executable)
    }
}
