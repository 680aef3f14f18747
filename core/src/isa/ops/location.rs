//! Location registers: whole-coordinate storage bridging data pointers and
//! the data stack.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::coords;

use super::{loc_index, stack_value, vector_arg};

macro_rules! location_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::Location,
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
        location_def!(0x90, "LSTO", &[OperandKind::LocationRegister], exec_lsto),
        location_def!(0x91, "LLD", &[OperandKind::LocationRegister], exec_lld),
        location_def!(
            0x92,
            "LADD",
            &[OperandKind::LocationRegister, OperandKind::Vector],
            exec_ladd
        ),
        location_def!(0x93, "PUSL", &[OperandKind::LocationRegister], exec_pusl),
        location_def!(
            0x94,
            "POPL",
            &[OperandKind::LocationRegister, OperandKind::Stack],
            exec_popl
        ),
    ]
}

fn check_lr(ctx: &ExecCtx, index: usize) -> Result<(), ExecError> {
    if index < ctx.org.lrs.len() {
        Ok(())
    } else {
        Err(ExecError::BadRegister)
    }
}

fn exec_lsto(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = loc_index(ctx.operands, 0)?;
    check_lr(ctx, index)?;
    ctx.org.lrs[index] = ctx.org.active_dp().clone();
    Ok(Flow::Advance)
}

fn exec_lld(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = loc_index(ctx.operands, 0)?;
    check_lr(ctx, index)?;
    let active = ctx.org.active_dp;
    ctx.org.dps[active] = ctx.org.lrs[index].clone();
    Ok(Flow::Advance)
}

fn exec_ladd(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = loc_index(ctx.operands, 0)?;
    check_lr(ctx, index)?;
    let offset = vector_arg(ctx.operands, 1)?;
    let moved = coords::add(&ctx.org.lrs[index], offset);
    ctx.org.lrs[index] = ctx.env.canonical(&moved).ok_or(ExecError::OutOfBounds)?;
    Ok(Flow::Advance)
}

fn exec_pusl(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = loc_index(ctx.operands, 0)?;
    check_lr(ctx, index)?;
    let loc = ctx.org.lrs[index].clone();
    if !ctx.org.push_value(Value::Location(loc)) {
        return Err(ExecError::StackOverflow);
    }
    Ok(Flow::Advance)
}

fn exec_popl(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = loc_index(ctx.operands, 0)?;
    check_lr(ctx, index)?;
    let loc = match stack_value(ctx.operands, 1)? {
        Value::Location(c) => c.clone(),
        _ => return Err(ExecError::TypeMismatch),
    };
    ctx.org.lrs[index] = loc;
    Ok(Flow::Advance)
}
