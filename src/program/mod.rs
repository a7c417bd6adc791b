// This module defines what the compiler accepts as input. A Program is a borrowed view of one of
// two intermediate representations: a GraphProgram (HLO-style module of named instructions, owned
// by the caller) or a StructuredModule living in a ModuleContext arena (MHLO/StableHLO-style
// functions of SSA operations). The compiler never mutates or retains a program; it borrows it
// for the duration of a compile call and converts it into the shared Computation form defined in
// computation.rs. Both reference front-ends share the character Cursor in cursor.rs.

//! Compiler inputs: the graph IR, the structured IR and their canonical form.

pub mod computation;
pub(crate) mod cursor;
pub mod graph;
pub mod structured;

pub use computation::{BinaryOp, Computation, ComputationBuilder, Node, NodeId, NodeOp, UnaryOp};
pub use graph::{GraphComputation, GraphInstruction, GraphModule, GraphOpcode, GraphProgram, GraphShape};
pub use structured::{
    DenseAttr, FuncOp, ModuleContext, OpKind, Operation, ScalarAttr, StructuredModule, TensorType, ValueId,
};

use crate::core::Result;
use std::fmt;

/// Which representation a program is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Graph,
    Structured,
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramKind::Graph => write!(f, "graph"),
            ProgramKind::Structured => write!(f, "structured"),
        }
    }
}

/// A program handed to the compiler, borrowed from its owner.
#[derive(Debug, Clone, Copy)]
pub enum Program<'a> {
    Graph(&'a GraphProgram),
    Module(&'a StructuredModule<'a>),
}

impl<'a> Program<'a> {
    pub fn kind(&self) -> ProgramKind {
        match self {
            Program::Graph(_) => ProgramKind::Graph,
            Program::Module(_) => ProgramKind::Structured,
        }
    }

    /// Name used for the compiled executable.
    pub fn name(&self) -> &'a str {
        match *self {
            Program::Graph(graph) => graph.name(),
            Program::Module(module) => match module.name() {
                Some(name) => name,
                None => module.entry_function().map(|f| f.name).unwrap_or("module"),
            },
        }
    }

    pub fn to_computation(&self) -> Result<Computation> {
        match self {
            Program::Graph(graph) => graph.to_computation(),
            Program::Module(module) => module.to_computation(),
        }
    }
}

impl<'a> From<&'a GraphProgram> for Program<'a> {
    fn from(program: &'a GraphProgram) -> Self {
        Program::Graph(program)
    }
}

impl<'a> From<&'a StructuredModule<'a>> for Program<'a> {
    fn from(module: &'a StructuredModule<'a>) -> Self {
        Program::Module(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_kind_and_name() {
        let graph = GraphProgram::parse("HloModule Computation\n\nENTRY Computation() -> s32[] {\n  ROOT result = s32[] constant(2)\n}").unwrap();
        let program = Program::from(&graph);
        assert_eq!(program.kind(), ProgramKind::Graph);
        assert_eq!(program.name(), "Computation");

        let context = ModuleContext::new();
        let module = context
            .parse_module("func.func @main() -> tensor<i32> {\n  %0 = mhlo.constant dense<2> : tensor<i32>\n  return %0 : tensor<i32>\n}")
            .unwrap();
        let program = Program::from(&module);
        assert_eq!(program.kind(), ProgramKind::Structured);
        assert_eq!(program.name(), "main");
        assert_eq!(program.to_computation().unwrap().outputs().len(), 1);
    }
}
