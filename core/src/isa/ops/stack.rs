//! Data-stack manipulation. Implicit stack operands are popped at planning
//! time and ride on the instruction instance.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;

use super::{imm, read_value, reg_id, stack_value, write_value};

pub(super) fn defs() -> Vec<OpcodeDef> {
    vec![
        OpcodeDef {
            id: 0x30,
            mnemonic: "PUSH",
            family: Family::Stack,
            signature: &[OperandKind::Register],
            base_cost: COST_DEFAULT,
            exec: exec_push,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x31,
            mnemonic: "POP",
            family: Family::Stack,
            signature: &[OperandKind::Register, OperandKind::Stack],
            base_cost: COST_DEFAULT,
            exec: exec_pop,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x32,
            mnemonic: "PUSI",
            family: Family::Stack,
            signature: &[OperandKind::Immediate],
            base_cost: COST_DEFAULT,
            exec: exec_pusi,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x33,
            mnemonic: "DUP",
            family: Family::Stack,
            signature: &[OperandKind::Stack],
            base_cost: COST_DEFAULT,
            exec: exec_dup,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x34,
            mnemonic: "SWAP",
            family: Family::Stack,
            signature: &[OperandKind::Stack, OperandKind::Stack],
            base_cost: COST_DEFAULT,
            exec: exec_swap,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x35,
            mnemonic: "DROP",
            family: Family::Stack,
            signature: &[OperandKind::Stack],
            base_cost: COST_DEFAULT,
            exec: |_| Ok(Flow::Advance),
            writes: None,
            precondition: None,
        },
    ]
}

fn push(ctx: &mut ExecCtx, value: Value) -> Result<(), ExecError> {
    if ctx.org.push_value(value) {
        Ok(())
    } else {
        Err(ExecError::StackOverflow)
    }
}

fn exec_push(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let value = read_value(ctx.org, reg_id(ctx.operands, 0)?)?;
    push(ctx, value)?;
    Ok(Flow::Advance)
}

fn exec_pop(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let value = stack_value(ctx.operands, 1)?.clone();
    write_value(ctx.org, dst, value)?;
    Ok(Flow::Advance)
}

fn exec_pusi(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let value = imm(ctx.operands, 0)?;
    push(ctx, Value::Scalar(value))?;
    Ok(Flow::Advance)
}

fn exec_dup(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let value = stack_value(ctx.operands, 0)?.clone();
    push(ctx, value.clone())?;
    push(ctx, value)?;
    Ok(Flow::Advance)
}

fn exec_swap(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    // Operand 0 was the top of the stack; re-pushing it first swaps the two.
    let top = stack_value(ctx.operands, 0)?.clone();
    let below = stack_value(ctx.operands, 1)?.clone();
    push(ctx, top)?;
    push(ctx, below)?;
    Ok(Flow::Advance)
}
