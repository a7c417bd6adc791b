// This module implements the structured IR variant of a program: an MHLO/StableHLO style module
// of functions whose bodies are lists of dialect operations over SSA values. Parsed modules live
// in a ModuleContext, which owns a bumpalo arena; every function, operation, type and attribute
// of a StructuredModule<'ctx> is allocated there and borrowed for 'ctx, so the borrow checker
// guarantees the context outlives any compile call that reads the module. All arena types are
// Copy and hold no heap data of their own, so nothing needs dropping when the arena is freed.
// to_computation lowers the entry function (@main, or the only function) into the canonical
// Computation shared with the graph IR, checking declared result types along the way.

//! Structured IR (MHLO / StableHLO text) programs.
//!
//! ```text
//! module {
//!   func.func @main() -> tensor<i32> {
//!     %0 = mhlo.constant dense<2> : tensor<i32>
//!     return %0 : tensor<i32>
//!   }
//! }
//! ```

pub mod parser;

use super::computation::{BinaryOp, Computation, ComputationBuilder, NodeId, UnaryOp};
use crate::core::{Error, Literal, LiteralData, PrimitiveType, Result, Shape};
use bumpalo::Bump;
use std::cell::Cell;
use std::fmt;

/// Owner of parsed structured modules.
///
/// Modules returned by [`ModuleContext::parse_module`] borrow from the
/// context and cannot outlive it.
pub struct ModuleContext {
    arena: Bump,
    modules_parsed: Cell<usize>,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self {
            arena: Bump::new(),
            modules_parsed: Cell::new(0),
        }
    }

    /// Parse module text into this context.
    pub fn parse_module(&self, source: &str) -> Result<StructuredModule<'_>> {
        let module = parser::parse_module(&self.arena, source)?;
        self.modules_parsed.set(self.modules_parsed.get() + 1);
        log::debug!(
            "parsed structured module with {} function(s), arena holds {} bytes",
            module.functions.len(),
            self.arena.allocated_bytes()
        );
        Ok(module)
    }

    pub fn modules_parsed(&self) -> usize {
        self.modules_parsed.get()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self::new()
    }
}

/// `tensor<...>` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorType<'ctx> {
    pub element_type: PrimitiveType,
    pub dims: &'ctx [i64],
}

impl TensorType<'_> {
    pub fn to_shape(&self) -> Shape {
        Shape::new(self.element_type, self.dims.to_vec())
    }
}

impl fmt::Display for TensorType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<")?;
        for d in self.dims {
            write!(f, "{}x", d)?;
        }
        let name = match self.element_type {
            PrimitiveType::Pred => "i1",
            PrimitiveType::S32 => "i32",
            PrimitiveType::S64 => "i64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
        };
        write!(f, "{}>", name)
    }
}

/// One element of a `dense<...>` attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarAttr {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// `dense<...>` attribute; a single element is splatted over the type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseAttr<'ctx> {
    pub elements: &'ctx [ScalarAttr],
}

impl DenseAttr<'_> {
    /// Materialize the attribute as a literal of type `ty`.
    pub fn to_literal(&self, ty: &TensorType<'_>) -> Result<Literal> {
        let shape = ty.to_shape();
        if shape.literal_byte_size().is_none() {
            return Err(Error::lowering(format!("dense attribute of type {} is too large", ty)));
        }
        let count = shape.element_count();
        let splat = self.elements.len() == 1;
        if !splat && self.elements.len() != count {
            return Err(Error::lowering(format!(
                "dense attribute with {} elements does not fit {}",
                self.elements.len(),
                ty
            )));
        }
        let element = |i: usize| self.elements[if splat { 0 } else { i }];
        let mismatch = |attr: ScalarAttr| Error::lowering(format!("{:?} is not a valid element of {}", attr, ty));

        let data = match ty.element_type {
            PrimitiveType::Pred => LiteralData::Pred(
                (0..count)
                    .map(|i| match element(i) {
                        ScalarAttr::Bool(b) => Ok(b),
                        ScalarAttr::Int(v @ (0 | 1)) => Ok(v == 1),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<_>>()?,
            ),
            PrimitiveType::S32 => LiteralData::S32(
                (0..count)
                    .map(|i| match element(i) {
                        ScalarAttr::Int(v) => i32::try_from(v).map_err(|_| mismatch(ScalarAttr::Int(v))),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<_>>()?,
            ),
            PrimitiveType::S64 => LiteralData::S64(
                (0..count)
                    .map(|i| match element(i) {
                        ScalarAttr::Int(v) => Ok(v),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<_>>()?,
            ),
            PrimitiveType::F32 => LiteralData::F32(
                (0..count)
                    .map(|i| match element(i) {
                        ScalarAttr::Float(v) => Ok(v as f32),
                        ScalarAttr::Int(v) => Ok(v as f32),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<_>>()?,
            ),
            PrimitiveType::F64 => LiteralData::F64(
                (0..count)
                    .map(|i| match element(i) {
                        ScalarAttr::Float(v) => Ok(v),
                        ScalarAttr::Int(v) => Ok(v as f64),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<_>>()?,
            ),
        };
        Literal::new(ty.to_shape(), data)
    }
}

/// SSA value number; function arguments come first, then operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind<'ctx> {
    Constant(DenseAttr<'ctx>),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operation<'ctx> {
    /// Fully qualified name, e.g. `mhlo.add`.
    pub name: &'ctx str,
    pub kind: OpKind<'ctx>,
    pub operands: &'ctx [ValueId],
    pub result: ValueId,
    pub result_type: TensorType<'ctx>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuncOp<'ctx> {
    pub name: &'ctx str,
    pub arguments: &'ctx [TensorType<'ctx>],
    pub result_types: &'ctx [TensorType<'ctx>],
    pub body: &'ctx [Operation<'ctx>],
    pub returned: &'ctx [ValueId],
}

impl<'ctx> FuncOp<'ctx> {
    fn value_type(&self, value: ValueId) -> Option<TensorType<'ctx>> {
        let index = value.0 as usize;
        if index < self.arguments.len() {
            return Some(self.arguments[index]);
        }
        self.body.get(index - self.arguments.len()).map(|op| op.result_type)
    }
}

/// A program in structured IR form, borrowed from its [`ModuleContext`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuredModule<'ctx> {
    name: Option<&'ctx str>,
    functions: &'ctx [FuncOp<'ctx>],
}

impl<'ctx> StructuredModule<'ctx> {
    pub(crate) fn new(name: Option<&'ctx str>, functions: &'ctx [FuncOp<'ctx>]) -> Self {
        Self { name, functions }
    }

    pub fn name(&self) -> Option<&'ctx str> {
        self.name
    }

    pub fn functions(&self) -> &'ctx [FuncOp<'ctx>] {
        self.functions
    }

    pub fn lookup(&self, name: &str) -> Option<&'ctx FuncOp<'ctx>> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The entry function: `@main`, or the only function of the module.
    pub fn entry_function(&self) -> Result<&'ctx FuncOp<'ctx>> {
        if let Some(main) = self.lookup("main") {
            return Ok(main);
        }
        match self.functions {
            [only] => Ok(only),
            _ => Err(Error::lowering(format!(
                "module has {} functions and none is named @main",
                self.functions.len()
            ))),
        }
    }

    /// Convert the entry function into the canonical compiler input.
    pub fn to_computation(&self) -> Result<Computation> {
        let func = self.entry_function()?;
        let mut builder = ComputationBuilder::new(func.name);
        let mut nodes: Vec<NodeId> = Vec::with_capacity(func.arguments.len() + func.body.len());

        for (number, ty) in func.arguments.iter().enumerate() {
            nodes.push(builder.parameter(number, ty.to_shape())?);
        }

        for op in func.body {
            let operand = |position: usize| -> Result<NodeId> {
                let value = op
                    .operands
                    .get(position)
                    .ok_or_else(|| Error::lowering(format!("{} is missing operand {}", op.name, position)))?;
                nodes
                    .get(value.0 as usize)
                    .copied()
                    .ok_or_else(|| Error::lowering(format!("{} uses value %{} before it is defined", op.name, value.0)))
            };
            let node = match op.kind {
                OpKind::Constant(attr) => builder.constant(attr.to_literal(&op.result_type)?),
                OpKind::Unary(unary) => {
                    let x = operand(0)?;
                    builder.unary(unary, x)?
                }
                OpKind::Binary(binary) => {
                    let lhs = operand(0)?;
                    let rhs = operand(1)?;
                    builder.binary(binary, lhs, rhs)?
                }
            };
            builder.expect_shape(node, &op.result_type.to_shape(), op.name)?;
            nodes.push(node);
        }

        if func.returned.len() != func.result_types.len() {
            return Err(Error::lowering(format!(
                "@{} returns {} values but declares {} results",
                func.name,
                func.returned.len(),
                func.result_types.len()
            )));
        }

        let mut outputs = Vec::with_capacity(func.returned.len());
        for (value, declared) in func.returned.iter().zip(func.result_types) {
            let node = nodes
                .get(value.0 as usize)
                .copied()
                .ok_or_else(|| Error::lowering(format!("@{} returns undefined value", func.name)))?;
            builder.expect_shape(node, &declared.to_shape(), "returned value")?;
            outputs.push(node);
        }

        log::trace!("lowered @{} with {} operations", func.name, func.body.len());
        builder.build(outputs)
    }
}

impl fmt::Display for StructuredModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => writeln!(f, "module @{} {{", name)?,
            None => writeln!(f, "module {{")?,
        }
        for func in self.functions {
            write!(f, "  func.func @{}(", func.name)?;
            for (i, arg) in func.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "%v{}: {}", i, arg)?;
            }
            write!(f, ") -> (")?;
            for (i, ty) in func.result_types.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", ty)?;
            }
            writeln!(f, ") {{")?;
            for op in func.body {
                write!(f, "    %v{} = {} ", op.result.0, op.name)?;
                match op.kind {
                    OpKind::Constant(attr) => {
                        let elements: Vec<String> = attr
                            .elements
                            .iter()
                            .map(|e| match e {
                                ScalarAttr::Bool(b) => b.to_string(),
                                ScalarAttr::Int(v) => v.to_string(),
                                ScalarAttr::Float(v) => format!("{:?}", v),
                            })
                            .collect();
                        if elements.len() == 1 {
                            write!(f, "dense<{}>", elements[0])?;
                        } else {
                            write!(f, "dense<[{}]>", elements.join(", "))?;
                        }
                    }
                    _ => {
                        let operands: Vec<String> = op.operands.iter().map(|v| format!("%v{}", v.0)).collect();
                        write!(f, "{}", operands.join(", "))?;
                    }
                }
                writeln!(f, " : {}", op.result_type)?;
            }
            let returned: Vec<String> = func.returned.iter().map(|v| format!("%v{}", v.0)).collect();
            let types: Vec<String> = func
                .returned
                .iter()
                .filter_map(|&v| func.value_type(v))
                .map(|t| t.to_string())
                .collect();
            if returned.is_empty() {
                writeln!(f, "    return")?;
            } else {
                writeln!(f, "    return {} : {}", returned.join(", "), types.join(", "))?;
            }
            writeln!(f, "  }}")?;
        }
        write!(f, "}}")
    }
}
