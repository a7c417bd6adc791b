//! Mapping of program invocations onto topology devices.

use crate::core::{CompileOptions, DeviceId, Error, Result, TopologyDescription};
use std::fmt;

/// Devices an executable runs on, one per (replica, partition) pair.
///
/// Devices are stored replica-major: invocation `r * partition_count + p`
/// runs replica `r`, partition `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAssignment {
    replica_count: usize,
    partition_count: usize,
    devices: Vec<DeviceId>,
}

impl DeviceAssignment {
    /// Build the assignment requested by `options` on `topology`.
    pub fn for_topology(options: &CompileOptions, topology: &TopologyDescription) -> Result<Self> {
        let replicas = options.num_replicas();
        let partitions = options.num_partitions();
        if replicas == 0 || partitions == 0 {
            return Err(Error::invalid_argument(format!(
                "replica and partition counts must be positive, got {} x {}",
                replicas, partitions
            )));
        }
        let needed = replicas
            .checked_mul(partitions)
            .ok_or_else(|| Error::invalid_argument("replica x partition count overflows"))?;

        let devices = match options.device_ordinal() {
            Some(ordinal) => {
                if needed != 1 {
                    return Err(Error::invalid_argument(format!(
                        "device_ordinal requires a single invocation, not {} x {}",
                        replicas, partitions
                    )));
                }
                let device = topology.device_ids().get(ordinal).copied().ok_or_else(|| {
                    Error::lowering(format!(
                        "device ordinal {} is out of range for topology {}",
                        ordinal, topology
                    ))
                })?;
                vec![device]
            }
            None => {
                if needed > topology.device_count() {
                    return Err(Error::lowering(format!(
                        "{} replicas x {} partitions need {} devices but topology {} has {}",
                        replicas,
                        partitions,
                        needed,
                        topology,
                        topology.device_count()
                    )));
                }
                topology.device_ids()[..needed].to_vec()
            }
        };

        Ok(Self {
            replica_count: replicas,
            partition_count: partitions,
            devices,
        })
    }

    pub fn replica_count(&self) -> usize {
        self.replica_count
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Number of invocations per `execute` call.
    pub fn num_invocations(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn device(&self, replica: usize, partition: usize) -> Option<DeviceId> {
        if replica >= self.replica_count || partition >= self.partition_count {
            return None;
        }
        self.devices.get(replica * self.partition_count + partition).copied()
    }
}

impl fmt::Display for DeviceAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} [", self.replica_count, self.partition_count)?;
        for (i, device) in self.devices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", device)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{host_platform_id, ErrorKind};

    fn topology(count: u32) -> TopologyDescription {
        TopologyDescription::new(host_platform_id(), "host", "host_device", 0..count)
    }

    #[test]
    fn test_default_assignment() {
        let assignment = DeviceAssignment::for_topology(&CompileOptions::new(), &topology(4)).unwrap();
        assert_eq!(assignment.devices(), &[DeviceId(0)]);
        assert_eq!(assignment.to_string(), "1x1 [0]");
    }

    #[test]
    fn test_replicas_and_partitions() {
        let options = CompileOptions::new().with_num_replicas(2).with_num_partitions(2);
        let assignment = DeviceAssignment::for_topology(&options, &topology(4)).unwrap();
        assert_eq!(assignment.num_invocations(), 4);
        assert_eq!(assignment.device(1, 0), Some(DeviceId(2)));
        assert_eq!(assignment.device(2, 0), None);
    }

    #[test]
    fn test_assignment_errors() {
        let too_many = CompileOptions::new().with_num_replicas(3);
        let err = DeviceAssignment::for_topology(&too_many, &topology(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoweringFailure);

        let zero = CompileOptions::new().with_num_partitions(0);
        let err = DeviceAssignment::for_topology(&zero, &topology(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let ordinal = CompileOptions::new().with_device_ordinal(5);
        let err = DeviceAssignment::for_topology(&ordinal, &topology(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoweringFailure);

        let pinned = CompileOptions::new().with_device_ordinal(1);
        let assignment = DeviceAssignment::for_topology(&pinned, &topology(2)).unwrap();
        assert_eq!(assignment.devices(), &[DeviceId(1)]);
    }
}
