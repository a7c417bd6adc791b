// This module runs one invocation of a CompiledProgram on a single HostDevice. Slots hold
// DeviceBuffers; a parameter slot shares the caller's argument allocation, while constants and
// arithmetic results are fresh allocations on the invocation's device, so the device's memory
// budget sees every intermediate value. Overwriting a slot drops its previous buffer and hands
// the bytes back to the budget. Elementwise ops decode operands from their device bytes,
// compute on typed vectors and encode the result again. Integer arithmetic wraps on overflow;
// integer division by zero yields -1 and remainder by zero yields the dividend, matching the
// behavior of accelerator devices, so no input makes an op fail. Any failure (memory
// exhaustion, an empty slot) is reported as an execution error and no outputs are returned.

use super::buffer::DeviceBuffer;
use super::device::HostDevice;
use crate::compiler::{CompiledProgram, Instruction};
use crate::core::{Error, Literal, LiteralData, Result, Shape};
use crate::program::{BinaryOp, UnaryOp};
use std::sync::Arc;

/// Run `program` on `device` with already validated `arguments`.
pub(crate) fn run(
    program: &CompiledProgram,
    device: &Arc<HostDevice>,
    arguments: &[&DeviceBuffer],
) -> Result<Vec<DeviceBuffer>> {
    let mut slots: Vec<Option<DeviceBuffer>> = Vec::new();
    slots.resize_with(program.slot_count(), || None);

    for inst in program.instructions() {
        log::trace!("device {}: {}", device.id(), inst);
        let value = match *inst {
            Instruction::Parameter { index, .. } => arguments
                .get(index)
                .map(|arg| arg.share())
                .ok_or_else(|| Error::execution(format!("argument {} was not supplied", index)))?,
            Instruction::Constant { constant, .. } => {
                let literal = program
                    .constants()
                    .get(constant)
                    .ok_or_else(|| Error::execution(format!("constant #{} is missing", constant)))?;
                store(device, literal)?
            }
            Instruction::Unary { op, src, .. } => {
                let operand = read(&slots, src)?;
                let data = unary(op, operand.data());
                store(device, &with_data(operand.shape(), data)?)?
            }
            Instruction::Binary { op, lhs, rhs, .. } => {
                let lhs = read(&slots, lhs)?;
                let rhs = read(&slots, rhs)?;
                let data = binary(op, lhs.data(), rhs.data())?;
                store(device, &with_data(lhs.shape(), data)?)?
            }
        };
        slots[inst.dst()] = Some(value);
    }

    program
        .output_slots()
        .iter()
        .map(|&slot| {
            slots[slot]
                .as_ref()
                .map(DeviceBuffer::share)
                .ok_or_else(|| Error::execution(format!("output slot ${} is empty", slot)))
        })
        .collect()
}

fn read(slots: &[Option<DeviceBuffer>], slot: usize) -> Result<Literal> {
    let buffer = slots
        .get(slot)
        .and_then(Option::as_ref)
        .ok_or_else(|| Error::execution(format!("slot ${} read before it was written", slot)))?;
    Literal::from_bytes(buffer.shape(), buffer.bytes()).map_err(|e| Error::execution(e.to_string()))
}

fn store(device: &Arc<HostDevice>, literal: &Literal) -> Result<DeviceBuffer> {
    let allocation = device
        .allocate(literal.to_bytes())
        .map_err(|oom| Error::execution(oom.to_string()))?;
    Ok(DeviceBuffer::new(literal.shape().clone(), allocation))
}

fn with_data(shape: &Shape, data: LiteralData) -> Result<Literal> {
    Literal::new(Shape::new(data.element_type(), shape.dims().to_vec()), data)
        .map_err(|e| Error::execution(e.to_string()))
}

fn unary(op: UnaryOp, data: &LiteralData) -> LiteralData {
    use LiteralData::*;
    match (op, data) {
        (UnaryOp::Negate, S32(v)) => S32(v.iter().map(|x| x.wrapping_neg()).collect()),
        (UnaryOp::Negate, S64(v)) => S64(v.iter().map(|x| x.wrapping_neg()).collect()),
        (UnaryOp::Negate, F32(v)) => F32(v.iter().map(|x| -x).collect()),
        (UnaryOp::Negate, F64(v)) => F64(v.iter().map(|x| -x).collect()),
        (UnaryOp::Abs, S32(v)) => S32(v.iter().map(|x| x.wrapping_abs()).collect()),
        (UnaryOp::Abs, S64(v)) => S64(v.iter().map(|x| x.wrapping_abs()).collect()),
        (UnaryOp::Abs, F32(v)) => F32(v.iter().map(|x| x.abs()).collect()),
        (UnaryOp::Abs, F64(v)) => F64(v.iter().map(|x| x.abs()).collect()),
        (UnaryOp::Not, Pred(v)) => Pred(v.iter().map(|x| !x).collect()),
        (UnaryOp::Not, S32(v)) => S32(v.iter().map(|x| !x).collect()),
        (UnaryOp::Not, S64(v)) => S64(v.iter().map(|x| !x).collect()),
        // Rejected when the computation was built; pass the value through unchanged.
        (_, other) => other.clone(),
    }
}

macro_rules! zip_with {
    ($variant:ident, $a:expr, $b:expr, $f:expr) => {
        LiteralData::$variant($a.iter().zip($b.iter()).map(|(&x, &y)| $f(x, y)).collect())
    };
}

fn binary(op: BinaryOp, lhs: &LiteralData, rhs: &LiteralData) -> Result<LiteralData> {
    use LiteralData::*;
    let data = match (lhs, rhs) {
        (S32(a), S32(b)) => match op {
            BinaryOp::Add => zip_with!(S32, a, b, i32::wrapping_add),
            BinaryOp::Subtract => zip_with!(S32, a, b, i32::wrapping_sub),
            BinaryOp::Multiply => zip_with!(S32, a, b, i32::wrapping_mul),
            BinaryOp::Divide => zip_with!(S32, a, b, |x: i32, y: i32| if y == 0 { -1 } else { x.wrapping_div(y) }),
            BinaryOp::Remainder => zip_with!(S32, a, b, |x: i32, y: i32| if y == 0 { x } else { x.wrapping_rem(y) }),
            BinaryOp::Maximum => zip_with!(S32, a, b, i32::max),
            BinaryOp::Minimum => zip_with!(S32, a, b, i32::min),
            BinaryOp::And => zip_with!(S32, a, b, |x: i32, y: i32| x & y),
            BinaryOp::Or => zip_with!(S32, a, b, |x: i32, y: i32| x | y),
        },
        (S64(a), S64(b)) => match op {
            BinaryOp::Add => zip_with!(S64, a, b, i64::wrapping_add),
            BinaryOp::Subtract => zip_with!(S64, a, b, i64::wrapping_sub),
            BinaryOp::Multiply => zip_with!(S64, a, b, i64::wrapping_mul),
            BinaryOp::Divide => zip_with!(S64, a, b, |x: i64, y: i64| if y == 0 { -1 } else { x.wrapping_div(y) }),
            BinaryOp::Remainder => zip_with!(S64, a, b, |x: i64, y: i64| if y == 0 { x } else { x.wrapping_rem(y) }),
            BinaryOp::Maximum => zip_with!(S64, a, b, i64::max),
            BinaryOp::Minimum => zip_with!(S64, a, b, i64::min),
            BinaryOp::And => zip_with!(S64, a, b, |x: i64, y: i64| x & y),
            BinaryOp::Or => zip_with!(S64, a, b, |x: i64, y: i64| x | y),
        },
        (F32(a), F32(b)) => match op {
            BinaryOp::Add => zip_with!(F32, a, b, |x: f32, y: f32| x + y),
            BinaryOp::Subtract => zip_with!(F32, a, b, |x: f32, y: f32| x - y),
            BinaryOp::Multiply => zip_with!(F32, a, b, |x: f32, y: f32| x * y),
            BinaryOp::Divide => zip_with!(F32, a, b, |x: f32, y: f32| x / y),
            BinaryOp::Remainder => zip_with!(F32, a, b, |x: f32, y: f32| x % y),
            BinaryOp::Maximum => zip_with!(F32, a, b, f32::max),
            BinaryOp::Minimum => zip_with!(F32, a, b, f32::min),
            BinaryOp::And | BinaryOp::Or => return Err(unsupported(op, lhs)),
        },
        (F64(a), F64(b)) => match op {
            BinaryOp::Add => zip_with!(F64, a, b, |x: f64, y: f64| x + y),
            BinaryOp::Subtract => zip_with!(F64, a, b, |x: f64, y: f64| x - y),
            BinaryOp::Multiply => zip_with!(F64, a, b, |x: f64, y: f64| x * y),
            BinaryOp::Divide => zip_with!(F64, a, b, |x: f64, y: f64| x / y),
            BinaryOp::Remainder => zip_with!(F64, a, b, |x: f64, y: f64| x % y),
            BinaryOp::Maximum => zip_with!(F64, a, b, f64::max),
            BinaryOp::Minimum => zip_with!(F64, a, b, f64::min),
            BinaryOp::And | BinaryOp::Or => return Err(unsupported(op, lhs)),
        },
        (Pred(a), Pred(b)) => match op {
            BinaryOp::And => zip_with!(Pred, a, b, |x: bool, y: bool| x && y),
            BinaryOp::Or => zip_with!(Pred, a, b, |x: bool, y: bool| x || y),
            _ => return Err(unsupported(op, lhs)),
        },
        _ => {
            return Err(Error::execution(format!(
                "{} operands have different element types {} and {}",
                op.name(),
                lhs.element_type(),
                rhs.element_type()
            )))
        }
    };
    Ok(data)
}

fn unsupported(op: BinaryOp, data: &LiteralData) -> Error {
    Error::execution(format!("{} is not defined on {}", op.name(), data.element_type()))
}
