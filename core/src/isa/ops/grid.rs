//! Environment interaction: reading, writing, and harvesting cells around
//! the active data pointer, and forking new organisms.

use crate::isa::{
    COST_DEFAULT, COST_FORK, ExecCtx, ExecError, Family, Flow, ForkRequest, OpcodeDef, Operand,
    OperandKind,
};
use crate::organism::{ConflictStatus, Organism, Value};
use crate::world::coords::{self, Coord};
use crate::world::{Environment, MoleculeKind};

use super::{read_scalar, reg_id, target, vector_arg, write_value};

pub(super) fn defs() -> Vec<OpcodeDef> {
    vec![
        OpcodeDef {
            id: 0x60,
            mnemonic: "PEEK",
            family: Family::Environment,
            signature: &[OperandKind::Register, OperandKind::Vector],
            base_cost: COST_DEFAULT,
            exec: exec_peek,
            writes: Some(dp_offset_writes),
            precondition: Some(precond_peek),
        },
        OpcodeDef {
            id: 0x61,
            mnemonic: "POKE",
            family: Family::Environment,
            signature: &[OperandKind::Register, OperandKind::Vector],
            base_cost: COST_DEFAULT,
            exec: exec_poke,
            writes: Some(dp_offset_writes),
            precondition: Some(precond_poke),
        },
        OpcodeDef {
            id: 0x62,
            mnemonic: "SCAN",
            family: Family::Environment,
            signature: &[OperandKind::Register, OperandKind::Vector],
            base_cost: COST_DEFAULT,
            exec: exec_scan,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x63,
            mnemonic: "HARV",
            family: Family::Environment,
            signature: &[OperandKind::Vector],
            base_cost: COST_DEFAULT,
            exec: exec_harv,
            writes: Some(harv_writes),
            precondition: Some(precond_harv),
        },
        OpcodeDef {
            id: 0x64,
            mnemonic: "FORK",
            family: Family::Environment,
            signature: &[OperandKind::Register, OperandKind::Label],
            base_cost: COST_FORK,
            exec: exec_fork,
            writes: None,
            precondition: None,
        },
    ]
}

/// Target cell of a DP-relative access: active data pointer plus the vector
/// operand at `index`.
fn dp_target(org: &Organism, operands: &[Operand], index: usize, env: &Environment) -> Option<Coord> {
    let offset = match operands.get(index) {
        Some(Operand::Vector(v)) => v,
        _ => return None,
    };
    env.canonical(&coords::add(org.active_dp(), offset))
}

fn dp_offset_writes(org: &Organism, operands: &[Operand], env: &Environment) -> Vec<Coord> {
    dp_target(org, operands, 1, env).into_iter().collect()
}

fn harv_writes(org: &Organism, operands: &[Operand], env: &Environment) -> Vec<Coord> {
    dp_target(org, operands, 0, env).into_iter().collect()
}

fn precond_peek(org: &Organism, operands: &[Operand], env: &Environment) -> Option<ConflictStatus> {
    match dp_target(org, operands, 1, env) {
        Some(c) if !env.get(&c).is_empty() => None,
        _ => Some(ConflictStatus::TargetEmpty),
    }
}

fn precond_poke(org: &Organism, operands: &[Operand], env: &Environment) -> Option<ConflictStatus> {
    match dp_target(org, operands, 1, env) {
        Some(c) if env.get(&c).is_empty() => None,
        _ => Some(ConflictStatus::TargetOccupied),
    }
}

fn precond_harv(org: &Organism, operands: &[Operand], env: &Environment) -> Option<ConflictStatus> {
    match dp_target(org, operands, 0, env) {
        Some(c) if env.get(&c).kind == MoleculeKind::Energy => None,
        _ => Some(ConflictStatus::TargetEmpty),
    }
}

fn exec_peek(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let cell = dp_target(ctx.org, ctx.operands, 1, ctx.env).ok_or(ExecError::OutOfBounds)?;
    let m = ctx.env.get(&cell);
    if m.is_empty() {
        return Err(ExecError::BadOperand);
    }
    write_value(ctx.org, dst, Value::Scalar(m))?;
    ctx.env.clear(&cell);
    Ok(Flow::Advance)
}

fn exec_poke(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let src = reg_id(ctx.operands, 0)?;
    let m = read_scalar(ctx.org, src)?;
    let cell = dp_target(ctx.org, ctx.operands, 1, ctx.env).ok_or(ExecError::OutOfBounds)?;
    ctx.env.set(&cell, m);
    ctx.env.set_owner(&cell, ctx.org.id);
    Ok(Flow::Advance)
}

fn exec_scan(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let offset = vector_arg(ctx.operands, 1)?;
    let m = ctx.env.get(&coords::add(ctx.org.active_dp(), offset));
    write_value(ctx.org, dst, Value::Scalar(m))?;
    Ok(Flow::Advance)
}

fn exec_harv(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let cell = dp_target(ctx.org, ctx.operands, 0, ctx.env).ok_or(ExecError::OutOfBounds)?;
    let m = ctx.env.get(&cell);
    if m.kind != MoleculeKind::Energy {
        return Err(ExecError::TypeMismatch);
    }
    ctx.org.energy = ctx.org.energy.saturating_add(m.value);
    ctx.env.clear(&cell);
    Ok(Flow::Advance)
}

fn exec_fork(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let amount = read_scalar(ctx.org, reg_id(ctx.operands, 0)?)?.value;
    if amount <= 0 {
        return Err(ExecError::BadOperand);
    }
    if ctx.org.energy <= amount {
        return Err(ExecError::InsufficientEnergy);
    }
    let t = target(ctx.operands, 1)?;
    let entry = ctx.env.canonical(t).ok_or(ExecError::OutOfBounds)?;

    ctx.org.energy -= amount;
    ctx.effects.forks.push(ForkRequest {
        parent: ctx.org.id,
        program_id: ctx.org.program_id,
        ip: entry,
        dv: ctx.org.dv.clone(),
        energy: amount,
    });
    Ok(Flow::Advance)
}
