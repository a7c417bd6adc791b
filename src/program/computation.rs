// This module defines the canonical compiler input that both IR front-ends lower into. A
// Computation is a flat list of nodes in definition order: parameters, constants, unary and
// binary elementwise operations, followed by an ordered list of output nodes. The graph IR's
// tuple root and the structured IR's multi-value return both become multiple outputs here, so
// the code generator never sees tuples. ComputationBuilder is the only way to create one; it
// infers each node's shape and rejects programs the code generator cannot lower (mismatched
// operand shapes, arithmetic on predicates, logical ops on floats, gaps in parameter numbers).
// All such rejections are Lowering errors because the program itself was well-formed.

//! Canonical computation shared by the graph and structured front-ends.

use crate::core::{Error, Literal, PrimitiveType, Result, Shape};
use std::fmt;

/// Index of a node within a [`Computation`].
pub type NodeId = usize;

/// Elementwise operations with one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Abs,
    Not,
}

impl UnaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "negate",
            UnaryOp::Abs => "abs",
            UnaryOp::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "negate" => Some(UnaryOp::Negate),
            "abs" => Some(UnaryOp::Abs),
            "not" => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

/// Elementwise operations with two operands of identical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Maximum,
    Minimum,
    And,
    Or,
}

impl BinaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Remainder => "remainder",
            BinaryOp::Maximum => "maximum",
            BinaryOp::Minimum => "minimum",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(BinaryOp::Add),
            "subtract" => Some(BinaryOp::Subtract),
            "multiply" => Some(BinaryOp::Multiply),
            "divide" => Some(BinaryOp::Divide),
            "remainder" => Some(BinaryOp::Remainder),
            "maximum" => Some(BinaryOp::Maximum),
            "minimum" => Some(BinaryOp::Minimum),
            "and" => Some(BinaryOp::And),
            "or" => Some(BinaryOp::Or),
            _ => None,
        }
    }

    /// Whether the op is bitwise/logical rather than arithmetic.
    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// What a node computes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    Parameter(usize),
    Constant(Literal),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl NodeOp {
    pub fn name(&self) -> &'static str {
        match self {
            NodeOp::Parameter(_) => "parameter",
            NodeOp::Constant(_) => "constant",
            NodeOp::Unary(op) => op.name(),
            NodeOp::Binary(op) => op.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    op: NodeOp,
    operands: Vec<NodeId>,
    shape: Shape,
}

impl Node {
    pub fn op(&self) -> &NodeOp {
        &self.op
    }

    pub fn operands(&self) -> &[NodeId] {
        &self.operands
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// A lowered, tuple-free program ready for code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    name: String,
    nodes: Vec<Node>,
    parameters: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

impl Computation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Parameter nodes, indexed by parameter number.
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn parameter_shapes(&self) -> Vec<Shape> {
        self.parameters.iter().map(|&id| self.nodes[id].shape.clone()).collect()
    }

    pub fn output_shapes(&self) -> Vec<Shape> {
        self.outputs.iter().map(|&id| self.nodes[id].shape.clone()).collect()
    }
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "computation {} {{", self.name)?;
        for (id, node) in self.nodes.iter().enumerate() {
            write!(f, "  n{} = {} {}", id, node.shape, node.op.name())?;
            match &node.op {
                NodeOp::Parameter(number) => write!(f, "({})", number)?,
                NodeOp::Constant(literal) => write!(f, "({})", literal)?,
                _ => {
                    let operands: Vec<String> = node.operands.iter().map(|o| format!("n{}", o)).collect();
                    write!(f, "({})", operands.join(", "))?;
                }
            }
            writeln!(f)?;
        }
        let outputs: Vec<String> = self.outputs.iter().map(|o| format!("n{}", o)).collect();
        writeln!(f, "  outputs ({})", outputs.join(", "))?;
        write!(f, "}}")
    }
}

/// Incremental, validating constructor for [`Computation`].
#[derive(Debug)]
pub struct ComputationBuilder {
    name: String,
    nodes: Vec<Node>,
    parameters: Vec<Option<NodeId>>,
}

impl ComputationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn shape(&self, id: NodeId) -> &Shape {
        &self.nodes[id].shape
    }

    fn push(&mut self, op: NodeOp, operands: Vec<NodeId>, shape: Shape) -> NodeId {
        self.nodes.push(Node { op, operands, shape });
        self.nodes.len() - 1
    }

    pub fn parameter(&mut self, number: usize, shape: Shape) -> Result<NodeId> {
        if self.parameters.len() <= number {
            self.parameters.resize(number + 1, None);
        }
        if self.parameters[number].is_some() {
            return Err(Error::lowering(format!(
                "parameter {} of {} is defined twice",
                number, self.name
            )));
        }
        let id = self.push(NodeOp::Parameter(number), Vec::new(), shape);
        self.parameters[number] = Some(id);
        Ok(id)
    }

    pub fn has_parameter(&self, number: usize) -> bool {
        matches!(self.parameters.get(number), Some(Some(_)))
    }

    pub fn constant(&mut self, literal: Literal) -> NodeId {
        let shape = literal.shape().clone();
        self.push(NodeOp::Constant(literal), Vec::new(), shape)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> Result<NodeId> {
        let shape = self.operand_shape(operand)?.clone();
        let ty = shape.element_type();
        let supported = match op {
            UnaryOp::Negate | UnaryOp::Abs => ty != PrimitiveType::Pred,
            UnaryOp::Not => ty == PrimitiveType::Pred || ty.is_integral(),
        };
        if !supported {
            return Err(Error::lowering(format!("{} is not defined on {}", op.name(), shape)));
        }
        Ok(self.push(NodeOp::Unary(op), vec![operand], shape))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        let lhs_shape = self.operand_shape(lhs)?.clone();
        let rhs_shape = self.operand_shape(rhs)?;
        if &lhs_shape != rhs_shape {
            return Err(Error::lowering(format!(
                "operand shapes {} and {} of {} do not match",
                lhs_shape,
                rhs_shape,
                op.name()
            )));
        }

        let ty = lhs_shape.element_type();
        let supported = if op.is_logical() {
            ty == PrimitiveType::Pred || ty.is_integral()
        } else {
            ty != PrimitiveType::Pred
        };
        if !supported {
            return Err(Error::lowering(format!("{} is not defined on {}", op.name(), lhs_shape)));
        }
        Ok(self.push(NodeOp::Binary(op), vec![lhs, rhs], lhs_shape))
    }

    /// Check a front-end's declared result shape against the inferred one.
    pub fn expect_shape(&self, id: NodeId, declared: &Shape, what: &str) -> Result<()> {
        let inferred = self.operand_shape(id)?;
        if inferred != declared {
            return Err(Error::lowering(format!(
                "{} is declared as {} but computes {}",
                what, declared, inferred
            )));
        }
        Ok(())
    }

    fn operand_shape(&self, id: NodeId) -> Result<&Shape> {
        self.nodes
            .get(id)
            .map(|n| &n.shape)
            .ok_or_else(|| Error::lowering(format!("node {} is not defined in {}", id, self.name)))
    }

    pub fn build(self, outputs: Vec<NodeId>) -> Result<Computation> {
        if outputs.is_empty() {
            return Err(Error::lowering(format!("{} produces no outputs", self.name)));
        }
        if let Some(&bad) = outputs.iter().find(|&&o| o >= self.nodes.len()) {
            return Err(Error::lowering(format!("output node {} is not defined in {}", bad, self.name)));
        }

        let mut parameters = Vec::with_capacity(self.parameters.len());
        for (number, slot) in self.parameters.iter().enumerate() {
            match slot {
                Some(id) => parameters.push(*id),
                None => {
                    return Err(Error::lowering(format!(
                        "parameter {} of {} is missing",
                        number, self.name
                    )))
                }
            }
        }

        Ok(Computation {
            name: self.name,
            nodes: self.nodes,
            parameters,
            outputs,
        })
    }
}
