//! Executables bound to a runtime client.

use super::buffer::DeviceBuffer;
use super::device::HostDevice;
use super::interpreter;
use crate::compiler::{CompiledProgram, DeviceAssignment, Executable};
use crate::core::{DeviceId, Error, ExecuteOptions, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a binding in a client's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadedExecutableId(pub u64);

impl fmt::Display for LoadedExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An executable loaded onto the devices of its assignment.
///
/// Shared between the caller and the client that loaded it; it stays alive
/// until both have released it.
#[derive(Debug)]
pub struct LoadedExecutable {
    id: LoadedExecutableId,
    name: String,
    fingerprint: u64,
    device_assignment: DeviceAssignment,
    program: CompiledProgram,
    /// One device per invocation, in assignment order.
    devices: Vec<Arc<HostDevice>>,
    executions: AtomicU64,
}

impl LoadedExecutable {
    pub(crate) fn new(id: LoadedExecutableId, executable: Executable, devices: Vec<Arc<HostDevice>>) -> Self {
        let (name, fingerprint, device_assignment, program) = executable.into_parts();
        Self {
            id,
            name,
            fingerprint,
            device_assignment,
            program,
            devices,
            executions: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> LoadedExecutableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn device_assignment(&self) -> &DeviceAssignment {
        &self.device_assignment
    }

    /// Devices of the invocations of one `execute` call, in order.
    pub fn addressable_devices(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id()).collect()
    }

    pub fn num_outputs(&self) -> usize {
        self.program.output_shapes().len()
    }

    /// Number of completed `execute` calls.
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Run one invocation per entry of `argument_handles`.
    ///
    /// Returns, per invocation, one buffer per program output. Argument
    /// errors are reported before anything runs.
    pub fn execute(
        &self,
        argument_handles: &[Vec<&DeviceBuffer>],
        options: &ExecuteOptions,
    ) -> Result<Vec<Vec<DeviceBuffer>>> {
        if argument_handles.len() != self.devices.len() {
            return Err(Error::invalid_argument(format!(
                "{} expects argument lists for {} device(s) but got {}",
                self.name,
                self.devices.len(),
                argument_handles.len()
            )));
        }
        for (invocation, (arguments, device)) in argument_handles.iter().zip(&self.devices).enumerate() {
            self.check_arguments(invocation, arguments, device.id())?;
        }

        log::debug!(
            "executing {} (launch id {}) on {} device(s)",
            self.name,
            options.launch_id(),
            self.devices.len()
        );

        let mut results = Vec::with_capacity(self.devices.len());
        for (arguments, device) in argument_handles.iter().zip(&self.devices) {
            results.push(interpreter::run(&self.program, device, arguments)?);
        }
        self.executions.fetch_add(1, Ordering::Relaxed);
        Ok(results)
    }

    fn check_arguments(&self, invocation: usize, arguments: &[&DeviceBuffer], device: DeviceId) -> Result<()> {
        let expected = self.program.parameter_shapes();
        if arguments.len() != expected.len() {
            return Err(Error::invalid_argument(format!(
                "invocation {} of {} takes {} argument(s) but got {}",
                invocation,
                self.name,
                expected.len(),
                arguments.len()
            )));
        }
        for (index, (argument, shape)) in arguments.iter().zip(expected).enumerate() {
            if argument.shape() != shape {
                return Err(Error::invalid_argument(format!(
                    "argument {} of invocation {} has shape {} but {} expects {}",
                    index,
                    invocation,
                    argument.shape(),
                    self.name,
                    shape
                )));
            }
            if argument.device_id() != device {
                return Err(Error::invalid_argument(format!(
                    "argument {} of invocation {} lives on device {} but the invocation runs on device {}",
                    index,
                    invocation,
                    argument.device_id(),
                    device
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for LoadedExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.id, self.name, self.device_assignment)
    }
}
