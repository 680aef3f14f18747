//! Scalar arithmetic. Operates on payloads; the result keeps the
//! destination's molecule kind. Division and modulo by zero fail the
//! instruction.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::Molecule;

use super::{imm, read_scalar, reg_id, write_value};

const RI: &[OperandKind] = &[OperandKind::Register, OperandKind::Immediate];
const RR: &[OperandKind] = &[OperandKind::Register, OperandKind::Register];

macro_rules! arith_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::Arithmetic,
            signature: $sig,
            base_cost: COST_DEFAULT,
            exec: $exec,
            writes: None,
            precondition: None,
        }
    };
}

pub(super) fn defs() -> Vec<OpcodeDef> {
    vec![
        arith_def!(0x10, "ADDI", RI, |ctx| bin_imm(ctx, add)),
        arith_def!(0x11, "ADDR", RR, |ctx| bin_reg(ctx, add)),
        arith_def!(0x12, "SUBI", RI, |ctx| bin_imm(ctx, sub)),
        arith_def!(0x13, "SUBR", RR, |ctx| bin_reg(ctx, sub)),
        arith_def!(0x14, "MULI", RI, |ctx| bin_imm(ctx, mul)),
        arith_def!(0x15, "MULR", RR, |ctx| bin_reg(ctx, mul)),
        arith_def!(0x16, "DIVI", RI, |ctx| bin_imm(ctx, div)),
        arith_def!(0x17, "DIVR", RR, |ctx| bin_reg(ctx, div)),
        arith_def!(0x18, "MODI", RI, |ctx| bin_imm(ctx, rem)),
        arith_def!(0x19, "MODR", RR, |ctx| bin_reg(ctx, rem)),
        arith_def!(0x1A, "NEGR", &[OperandKind::Register], exec_negr),
    ]
}

fn add(a: i64, b: i64) -> Option<i64> {
    Some(a.wrapping_add(b))
}

fn sub(a: i64, b: i64) -> Option<i64> {
    Some(a.wrapping_sub(b))
}

fn mul(a: i64, b: i64) -> Option<i64> {
    Some(a.wrapping_mul(b))
}

fn div(a: i64, b: i64) -> Option<i64> {
    if b == 0 { None } else { Some(a.wrapping_div(b)) }
}

fn rem(a: i64, b: i64) -> Option<i64> {
    if b == 0 { None } else { Some(a.wrapping_rem(b)) }
}

fn apply(ctx: &mut ExecCtx, b: Molecule, op: fn(i64, i64) -> Option<i64>) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let a = read_scalar(ctx.org, dst)?;
    let value = op(a.value, b.value).ok_or(ExecError::DivideByZero)?;
    write_value(ctx.org, dst, Value::Scalar(Molecule::new(a.kind, value)))?;
    Ok(Flow::Advance)
}

fn bin_imm(ctx: &mut ExecCtx, op: fn(i64, i64) -> Option<i64>) -> Result<Flow, ExecError> {
    let b = imm(ctx.operands, 1)?;
    apply(ctx, b, op)
}

fn bin_reg(ctx: &mut ExecCtx, op: fn(i64, i64) -> Option<i64>) -> Result<Flow, ExecError> {
    let b = read_scalar(ctx.org, reg_id(ctx.operands, 1)?)?;
    apply(ctx, b, op)
}

fn exec_negr(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let a = read_scalar(ctx.org, dst)?;
    write_value(
        ctx.org,
        dst,
        Value::Scalar(Molecule::new(a.kind, a.value.wrapping_neg())),
    )?;
    Ok(Flow::Advance)
}
