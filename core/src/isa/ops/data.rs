//! Data movement between registers, immediates, and vector literals.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;

use super::{imm, read_value, reg_id, vector_arg, write_value};

pub(super) fn defs() -> Vec<OpcodeDef> {
    vec![
        OpcodeDef {
            id: 0x00,
            mnemonic: "NOP",
            family: Family::Data,
            signature: &[],
            base_cost: COST_DEFAULT,
            exec: |_| Ok(Flow::Advance),
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x01,
            mnemonic: "SETI",
            family: Family::Data,
            signature: &[OperandKind::Register, OperandKind::Immediate],
            base_cost: COST_DEFAULT,
            exec: exec_seti,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x02,
            mnemonic: "SETR",
            family: Family::Data,
            signature: &[OperandKind::Register, OperandKind::Register],
            base_cost: COST_DEFAULT,
            exec: exec_setr,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x03,
            mnemonic: "SETV",
            family: Family::Data,
            signature: &[OperandKind::Register, OperandKind::Vector],
            base_cost: COST_DEFAULT,
            exec: exec_setv,
            writes: None,
            precondition: None,
        },
    ]
}

fn exec_seti(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let value = imm(ctx.operands, 1)?;
    write_value(ctx.org, dst, Value::Scalar(value))?;
    Ok(Flow::Advance)
}

fn exec_setr(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let src = reg_id(ctx.operands, 1)?;
    let value = read_value(ctx.org, src)?;
    write_value(ctx.org, dst, value)?;
    Ok(Flow::Advance)
}

fn exec_setv(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let v = vector_arg(ctx.operands, 1)?.clone();
    write_value(ctx.org, dst, Value::Vector(v))?;
    Ok(Flow::Advance)
}
