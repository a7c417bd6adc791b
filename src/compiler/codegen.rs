// This module implements the reference code generator: it lowers a canonical Computation into a
// CompiledProgram, a linear list of instructions over numbered value slots that the host runtime
// interprets. Lowering is a single forward pass in node order driven by the liveness analysis in
// analyzer.rs. Dead nodes (not reachable from any output) are dropped. Before a node's result
// slot is allocated, the slots of operands whose last use is this node are returned to the free
// list, so a result may reuse an operand's slot; output slots are pinned and never recycled.
// Constants are pooled in a side table referenced by index. Alongside the program the pass
// records CompileStats, and lower() wraps everything into an Executable together with the
// device assignment derived from the compile options and a fingerprint of the program text.

use super::analyzer::Analyzer;
use super::assignment::DeviceAssignment;
use super::executable::Executable;
use crate::core::topology::fingerprint64;
use crate::core::{CompileOptions, Error, Literal, Result, Shape, TopologyDescription};
use crate::program::{BinaryOp, Computation, NodeOp, ProgramKind, UnaryOp};
use hashbrown::HashMap;
use std::fmt;

/// Index of a value slot in a compiled program.
pub type Slot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Bind argument `index` of the invocation to `dst`.
    Parameter { dst: Slot, index: usize },
    /// Materialize constant `constant` of the pool into `dst`.
    Constant { dst: Slot, constant: usize },
    Unary { op: UnaryOp, dst: Slot, src: Slot },
    Binary { op: BinaryOp, dst: Slot, lhs: Slot, rhs: Slot },
}

impl Instruction {
    pub fn dst(&self) -> Slot {
        match *self {
            Instruction::Parameter { dst, .. }
            | Instruction::Constant { dst, .. }
            | Instruction::Unary { dst, .. }
            | Instruction::Binary { dst, .. } => dst,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Parameter { .. } => "parameter",
            Instruction::Constant { .. } => "constant",
            Instruction::Unary { op, .. } => op.name(),
            Instruction::Binary { op, .. } => op.name(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Parameter { dst, index } => write!(f, "${} = parameter {}", dst, index),
            Instruction::Constant { dst, constant } => write!(f, "${} = constant #{}", dst, constant),
            Instruction::Unary { op, dst, src } => write!(f, "${} = {} ${}", dst, op.name(), src),
            Instruction::Binary { op, dst, lhs, rhs } => {
                write!(f, "${} = {} ${}, ${}", dst, op.name(), lhs, rhs)
            }
        }
    }
}

/// Lowered form of a computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    instructions: Vec<Instruction>,
    constants: Vec<Literal>,
    parameter_shapes: Vec<Shape>,
    output_slots: Vec<Slot>,
    output_shapes: Vec<Shape>,
    slot_count: usize,
}

impl CompiledProgram {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn constants(&self) -> &[Literal] {
        &self.constants
    }

    pub fn parameter_shapes(&self) -> &[Shape] {
        &self.parameter_shapes
    }

    pub fn output_slots(&self) -> &[Slot] {
        &self.output_slots
    }

    pub fn output_shapes(&self) -> &[Shape] {
        &self.output_shapes
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.instructions {
            writeln!(f, "{}", inst)?;
        }
        write!(f, "outputs")?;
        for slot in &self.output_slots {
            write!(f, " ${}", slot)?;
        }
        Ok(())
    }
}

/// Statistics recorded while lowering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompileStats {
    pub nodes_lowered: usize,
    pub dead_nodes_dropped: usize,
    pub instructions_emitted: usize,
    pub slots_used: usize,
    pub constant_bytes: usize,
    pub instruction_counts: HashMap<&'static str, usize>,
}

impl CompileStats {
    pub fn instruction_count(&self, name: &str) -> usize {
        self.instruction_counts.get(name).copied().unwrap_or(0)
    }
}

/// Hands out value slots, recycling released ones first.
#[derive(Debug, Default)]
struct SlotAllocator {
    free: Vec<Slot>,
    high_water: usize,
}

impl SlotAllocator {
    fn allocate(&mut self) -> Slot {
        match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.high_water += 1;
                self.high_water - 1
            }
        }
    }

    fn release(&mut self, slot: Slot) {
        debug_assert!(!self.free.contains(&slot));
        self.free.push(slot);
    }
}

/// Lower `computation` into a compiled program and its statistics.
pub fn lower_computation(computation: &Computation) -> Result<(CompiledProgram, CompileStats)> {
    let mut analyzer = Analyzer::new();
    analyzer.analyze(computation);

    let mut stats = CompileStats {
        dead_nodes_dropped: analyzer.dead_count(),
        ..CompileStats::default()
    };
    let mut slots: Vec<Option<Slot>> = vec![None; computation.nodes().len()];
    let mut allocator = SlotAllocator::default();
    let mut instructions = Vec::new();
    let mut constants = Vec::new();

    for (pos, node) in computation.nodes().iter().enumerate() {
        if !analyzer.is_live(pos) {
            log::trace!("dropping dead node {} ({})", pos, node.op().name());
            continue;
        }

        let mut operand_slots = Vec::with_capacity(node.operands().len());
        for &operand in node.operands() {
            let slot = slots[operand].ok_or_else(|| {
                Error::lowering(format!("node {} reads node {} which has no slot", pos, operand))
            })?;
            operand_slots.push(slot);
        }
        for (i, &operand) in node.operands().iter().enumerate() {
            let first_occurrence = !node.operands()[..i].contains(&operand);
            if first_occurrence && analyzer.dies_at(operand, pos) {
                allocator.release(operand_slots[i]);
            }
        }

        let dst = allocator.allocate();
        let inst = match node.op() {
            NodeOp::Parameter(index) => Instruction::Parameter { dst, index: *index },
            NodeOp::Constant(literal) => {
                stats.constant_bytes += literal.shape().byte_size();
                constants.push(literal.clone());
                Instruction::Constant {
                    dst,
                    constant: constants.len() - 1,
                }
            }
            NodeOp::Unary(op) => Instruction::Unary {
                op: *op,
                dst,
                src: operand_slots[0],
            },
            NodeOp::Binary(op) => Instruction::Binary {
                op: *op,
                dst,
                lhs: operand_slots[0],
                rhs: operand_slots[1],
            },
        };
        log::trace!("emit {}", inst);
        *stats.instruction_counts.entry(inst.name()).or_insert(0) += 1;
        instructions.push(inst);
        slots[pos] = Some(dst);
        stats.nodes_lowered += 1;
    }

    let mut output_slots = Vec::with_capacity(computation.outputs().len());
    for &output in computation.outputs() {
        let slot = slots[output].ok_or_else(|| Error::lowering(format!("output node {} was not lowered", output)))?;
        output_slots.push(slot);
    }

    stats.instructions_emitted = instructions.len();
    stats.slots_used = allocator.high_water;

    let program = CompiledProgram {
        instructions,
        constants,
        parameter_shapes: computation.parameter_shapes(),
        output_slots,
        output_shapes: computation.output_shapes(),
        slot_count: allocator.high_water,
    };
    Ok((program, stats))
}

/// Lower `computation` into an executable bound to `topology`.
pub fn lower(
    computation: &Computation,
    kind: ProgramKind,
    options: &CompileOptions,
    topology: &TopologyDescription,
) -> Result<Executable> {
    let device_assignment = DeviceAssignment::for_topology(options, topology)?;
    let (program, stats) = lower_computation(computation)?;

    let mut text = format!("{}\n{}\n{}", computation.name(), topology, device_assignment);
    text.push('\n');
    text.push_str(&program.to_string());
    for constant in program.constants() {
        text.push('\n');
        text.push_str(&constant.to_string());
    }
    let fingerprint = fingerprint64(text.as_bytes());

    log::debug!(
        "lowered {}: {} instructions, {} slots, {} dead nodes dropped, assignment {}",
        computation.name(),
        stats.instructions_emitted,
        stats.slots_used,
        stats.dead_nodes_dropped,
        device_assignment
    );

    Ok(Executable::new(
        computation.name().to_string(),
        kind,
        topology.clone(),
        device_assignment,
        program,
        fingerprint,
        stats,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{host_platform_id, PrimitiveType};
    use crate::program::ComputationBuilder;

    #[test]
    fn test_slot_reuse() {
        // ((x + c) * c) - x
        let mut b = ComputationBuilder::new("f");
        let x = b.parameter(0, Shape::scalar(PrimitiveType::S32)).unwrap();
        let c = b.constant(Literal::scalar(3i32));
        let sum = b.binary(BinaryOp::Add, x, c).unwrap();
        let prod = b.binary(BinaryOp::Multiply, sum, c).unwrap();
        let diff = b.binary(BinaryOp::Subtract, prod, x).unwrap();
        let computation = b.build(vec![diff]).unwrap();

        let (program, stats) = lower_computation(&computation).unwrap();
        assert_eq!(program.instructions().len(), 5);
        // x and c stay live across sum; prod and diff reuse freed slots.
        assert_eq!(program.slot_count(), 3);
        assert_eq!(stats.slots_used, 3);
        assert_eq!(stats.instruction_count("parameter"), 1);
        assert_eq!(stats.constant_bytes, 4);
        assert_eq!(program.output_slots(), &[program.instructions()[4].dst()]);
    }

    #[test]
    fn test_outputs_are_pinned() {
        let mut b = ComputationBuilder::new("pair");
        let a = b.constant(Literal::scalar(1i32));
        let n = b.unary(UnaryOp::Negate, a).unwrap();
        let computation = b.build(vec![a, n]).unwrap();

        let (program, _) = lower_computation(&computation).unwrap();
        let slots = program.output_slots();
        assert_eq!(slots.len(), 2);
        assert_ne!(slots[0], slots[1]);
    }

    #[test]
    fn test_lower_records_assignment_and_fingerprint() {
        let mut b = ComputationBuilder::new("c");
        let two = b.constant(Literal::scalar(2i32));
        let computation = b.build(vec![two]).unwrap();
        let topology = TopologyDescription::new(host_platform_id(), "host", "host_device", [0u32]);

        let first = lower(&computation, ProgramKind::Graph, &CompileOptions::new(), &topology).unwrap();
        let second = lower(&computation, ProgramKind::Structured, &CompileOptions::new(), &topology).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.device_assignment().num_invocations(), 1);
        assert_eq!(first.stats().nodes_lowered, 1);
    }
}
