//! Compiled, topology-bound executables.

use super::assignment::DeviceAssignment;
use super::codegen::{CompileStats, CompiledProgram};
use crate::core::TopologyDescription;
use crate::program::ProgramKind;
use std::fmt;

/// Result of a successful compile, consumed by [`crate::runtime::Client::load`].
///
/// An executable is single-use: it is neither `Clone` nor `Copy`, and loading
/// it moves it into the client.
#[derive(Debug)]
pub struct Executable {
    name: String,
    program_kind: ProgramKind,
    topology: TopologyDescription,
    device_assignment: DeviceAssignment,
    program: CompiledProgram,
    fingerprint: u64,
    stats: CompileStats,
}

impl Executable {
    pub(crate) fn new(
        name: String,
        program_kind: ProgramKind,
        topology: TopologyDescription,
        device_assignment: DeviceAssignment,
        program: CompiledProgram,
        fingerprint: u64,
        stats: CompileStats,
    ) -> Self {
        Self {
            name,
            program_kind,
            topology,
            device_assignment,
            program,
            fingerprint,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Representation the executable was compiled from.
    pub fn program_kind(&self) -> ProgramKind {
        self.program_kind
    }

    /// Topology the executable was compiled for.
    pub fn topology(&self) -> &TopologyDescription {
        &self.topology
    }

    pub fn device_assignment(&self) -> &DeviceAssignment {
        &self.device_assignment
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    pub fn num_outputs(&self) -> usize {
        self.program.output_shapes().len()
    }

    pub(crate) fn into_parts(self) -> (String, u64, DeviceAssignment, CompiledProgram) {
        (self.name, self.fingerprint, self.device_assignment, self.program)
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} program, {:016x}) on {} as {}",
            self.name, self.program_kind, self.fingerprint, self.topology, self.device_assignment
        )
    }
}
