// This module implements the graph IR variant of a program: a module of named instructions in
// the HLO text style, produced by the reference front-end in parser.rs. A GraphProgram wraps the
// parsed GraphModule; its ENTRY computation holds instructions in definition order, each with a
// declared shape (an array or a tuple of arrays), an opcode and operand indices. The module is
// plain data owned by the caller and is only read by the compiler. to_computation converts the
// entry computation into the canonical Computation shared with the structured IR: parameters
// become parameter nodes, constants carry their literal, a tuple root becomes the ordered output
// list, and declared shapes are checked against inferred ones.

//! Graph IR (HLO text) programs.
//!
//! ```text
//! HloModule Computation
//!
//! ENTRY Computation() -> s32[] {
//!   ROOT result = s32[] constant(2)
//! }
//! ```

pub mod parser;

use super::computation::{BinaryOp, Computation, ComputationBuilder, NodeId, UnaryOp};
use crate::core::{Error, Literal, Result, Shape};
use std::fmt;

/// Declared shape of a graph instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphShape {
    Array(Shape),
    Tuple(Vec<Shape>),
}

impl fmt::Display for GraphShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphShape::Array(shape) => write!(f, "{}", shape),
            GraphShape::Tuple(elements) => {
                write!(f, "(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphOpcode {
    Parameter(usize),
    Constant(Literal),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Tuple,
}

impl GraphOpcode {
    pub fn name(&self) -> &'static str {
        match self {
            GraphOpcode::Parameter(_) => "parameter",
            GraphOpcode::Constant(_) => "constant",
            GraphOpcode::Unary(op) => op.name(),
            GraphOpcode::Binary(op) => op.name(),
            GraphOpcode::Tuple => "tuple",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphInstruction {
    pub name: String,
    pub shape: GraphShape,
    pub opcode: GraphOpcode,
    /// Indices of operand instructions within the same computation.
    pub operands: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphComputation {
    pub name: String,
    /// Declared `(name: shape)` signature, if the header carried one.
    pub signature: Option<Vec<(String, Shape)>>,
    pub result_shape: Option<GraphShape>,
    pub instructions: Vec<GraphInstruction>,
    pub root: usize,
}

impl GraphComputation {
    /// The `ROOT` instruction, or `None` if `root` is out of range.
    pub fn root_instruction(&self) -> Option<&GraphInstruction> {
        self.instructions.get(self.root)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphModule {
    pub name: String,
    pub entry: GraphComputation,
}

/// A program in graph IR form.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphProgram {
    module: GraphModule,
}

impl GraphProgram {
    /// Parse HLO text into a graph program.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            module: parser::parse_module(text)?,
        })
    }

    pub fn from_module(module: GraphModule) -> Self {
        Self { module }
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn module(&self) -> &GraphModule {
        &self.module
    }

    pub fn entry(&self) -> &GraphComputation {
        &self.module.entry
    }

    /// Convert the entry computation into the canonical compiler input.
    pub fn to_computation(&self) -> Result<Computation> {
        let entry = &self.module.entry;
        let mut builder = ComputationBuilder::new(entry.name.clone());
        let mut nodes: Vec<Option<NodeId>> = Vec::with_capacity(entry.instructions.len());

        for (index, inst) in entry.instructions.iter().enumerate() {
            let array_operand = |position: usize| -> Result<NodeId> {
                let i = *inst
                    .operands
                    .get(position)
                    .ok_or_else(|| Error::lowering(format!("{} is missing operand {}", inst.name, position)))?;
                match nodes.get(i) {
                    Some(Some(id)) => Ok(*id),
                    Some(None) => Err(Error::lowering(format!(
                        "{} uses tuple-shaped {}; tuples are only supported as the root",
                        inst.name, entry.instructions[i].name
                    ))),
                    None => Err(Error::lowering(format!(
                        "{} uses instruction {} before it is defined",
                        inst.name, i
                    ))),
                }
            };

            let node = match &inst.opcode {
                GraphOpcode::Tuple => {
                    if index != entry.root {
                        return Err(Error::lowering(format!(
                            "tuple {} is not the root; tuples are only supported as the root",
                            inst.name
                        )));
                    }
                    None
                }
                GraphOpcode::Parameter(number) => {
                    let shape = array_shape(inst)?;
                    Some(builder.parameter(*number, shape.clone())?)
                }
                GraphOpcode::Constant(literal) => Some(builder.constant(literal.clone())),
                GraphOpcode::Unary(op) => {
                    let operand = array_operand(0)?;
                    Some(builder.unary(*op, operand)?)
                }
                GraphOpcode::Binary(op) => {
                    let lhs = array_operand(0)?;
                    let rhs = array_operand(1)?;
                    Some(builder.binary(*op, lhs, rhs)?)
                }
            };

            if let (Some(id), GraphShape::Array(declared)) = (node, &inst.shape) {
                builder.expect_shape(id, declared, &inst.name)?;
            }
            nodes.push(node);
        }

        if let Some(signature) = &entry.signature {
            for (number, (name, shape)) in signature.iter().enumerate() {
                if !builder.has_parameter(number) {
                    log::trace!("adding unused parameter {} ({}) of {}", number, name, entry.name);
                    builder.parameter(number, shape.clone())?;
                }
            }
        }

        let root = entry.root_instruction().ok_or_else(|| {
            Error::lowering(format!(
                "root index {} of {} is out of range for {} instructions",
                entry.root,
                entry.name,
                entry.instructions.len()
            ))
        })?;
        let outputs = match &root.opcode {
            GraphOpcode::Tuple => {
                let mut outputs = Vec::with_capacity(root.operands.len());
                for &operand in &root.operands {
                    let id = nodes.get(operand).copied().flatten().ok_or_else(|| {
                        Error::lowering(format!("root tuple {} contains a nested tuple", root.name))
                    })?;
                    outputs.push(id);
                }
                outputs
            }
            _ => vec![nodes
                .get(entry.root)
                .copied()
                .flatten()
                .ok_or_else(|| Error::lowering("root has no value"))?],
        };

        let computation = builder.build(outputs)?;
        check_signature(entry, &computation)?;
        Ok(computation)
    }
}

fn array_shape(inst: &GraphInstruction) -> Result<&Shape> {
    match &inst.shape {
        GraphShape::Array(shape) => Ok(shape),
        GraphShape::Tuple(_) => Err(Error::lowering(format!(
            "{} must have an array shape, not {}",
            inst.name, inst.shape
        ))),
    }
}

fn check_signature(entry: &GraphComputation, computation: &Computation) -> Result<()> {
    if let Some(signature) = &entry.signature {
        let declared: Vec<&Shape> = signature.iter().map(|(_, s)| s).collect();
        let actual = computation.parameter_shapes();
        if declared.len() != actual.len() || declared.iter().zip(&actual).any(|(d, a)| *d != a) {
            return Err(Error::lowering(format!(
                "signature of {} does not match its parameter instructions",
                entry.name
            )));
        }
    }

    if let Some(result) = &entry.result_shape {
        let outputs = computation.output_shapes();
        let matches = match result {
            GraphShape::Array(shape) => outputs.len() == 1 && &outputs[0] == shape,
            GraphShape::Tuple(elements) => elements == &outputs,
        };
        if !matches {
            return Err(Error::lowering(format!(
                "{} declares result {} but its root computes a different shape",
                entry.name, result
            )));
        }
    }
    Ok(())
}

impl fmt::Display for GraphProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = &self.module.entry;
        writeln!(f, "HloModule {}", self.module.name)?;
        writeln!(f)?;
        write!(f, "ENTRY {}(", entry.name)?;
        if let Some(signature) = &entry.signature {
            for (i, (name, shape)) in signature.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name, shape)?;
            }
        }
        write!(f, ")")?;
        if let Some(result) = &entry.result_shape {
            write!(f, " -> {}", result)?;
        }
        writeln!(f, " {{")?;
        for (index, inst) in entry.instructions.iter().enumerate() {
            let root = if index == entry.root { "ROOT " } else { "" };
            write!(f, "  {}{} = {} {}(", root, inst.name, inst.shape, inst.opcode.name())?;
            match &inst.opcode {
                GraphOpcode::Parameter(number) => write!(f, "{}", number)?,
                GraphOpcode::Constant(literal) => {
                    let text = literal.to_string();
                    let value = text.split_once(' ').map(|(_, v)| v).unwrap_or("");
                    write!(f, "{}", value)?;
                }
                _ => {
                    let names: Vec<&str> = inst
                        .operands
                        .iter()
                        .map(|&o| entry.instructions.get(o).map_or("<undefined>", |i| i.name.as_str()))
                        .collect();
                    write!(f, "{}", names.join(", "))?;
                }
            }
            writeln!(f, ")")?;
        }
        write!(f, "}}")
    }
}
