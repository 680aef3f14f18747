//! Bitwise operations on scalar payloads. Shift amounts are taken modulo 64.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::Molecule;

use super::{imm, read_scalar, reg_id, write_value};

const RI: &[OperandKind] = &[OperandKind::Register, OperandKind::Immediate];
const RR: &[OperandKind] = &[OperandKind::Register, OperandKind::Register];

macro_rules! bit_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::Bitwise,
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
        bit_def!(0x20, "ANDI", RI, |ctx| bin_imm(ctx, |a, b| a & b)),
        bit_def!(0x21, "ANDR", RR, |ctx| bin_reg(ctx, |a, b| a & b)),
        bit_def!(0x22, "ORI", RI, |ctx| bin_imm(ctx, |a, b| a | b)),
        bit_def!(0x23, "ORR", RR, |ctx| bin_reg(ctx, |a, b| a | b)),
        bit_def!(0x24, "XORI", RI, |ctx| bin_imm(ctx, |a, b| a ^ b)),
        bit_def!(0x25, "XORR", RR, |ctx| bin_reg(ctx, |a, b| a ^ b)),
        bit_def!(0x26, "NOTR", &[OperandKind::Register], exec_notr),
        bit_def!(0x27, "SHLI", RI, |ctx| bin_imm(ctx, |a, b| a << (b & 63))),
        bit_def!(0x28, "SHRI", RI, |ctx| bin_imm(ctx, |a, b| a >> (b & 63))),
    ]
}

fn apply(ctx: &mut ExecCtx, b: i64, op: fn(i64, i64) -> i64) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let a = read_scalar(ctx.org, dst)?;
    write_value(ctx.org, dst, Value::Scalar(Molecule::new(a.kind, op(a.value, b))))?;
    Ok(Flow::Advance)
}

fn bin_imm(ctx: &mut ExecCtx, op: fn(i64, i64) -> i64) -> Result<Flow, ExecError> {
    let b = imm(ctx.operands, 1)?;
    apply(ctx, b.value, op)
}

fn bin_reg(ctx: &mut ExecCtx, op: fn(i64, i64) -> i64) -> Result<Flow, ExecError> {
    let b = read_scalar(ctx.org, reg_id(ctx.operands, 1)?)?;
    apply(ctx, b.value, op)
}

fn exec_notr(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let a = read_scalar(ctx.org, dst)?;
    write_value(ctx.org, dst, Value::Scalar(Molecule::new(a.kind, !a.value)))?;
    Ok(Flow::Advance)
}
