//! Organism state: direction vector, data pointers, energy introspection.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::coords::{self, Coord};
use crate::world::Molecule;

use super::{imm, read_vector, reg_id, vector_arg, write_value};

macro_rules! state_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::State,
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
        state_def!(0x70, "TURN", &[OperandKind::Vector], exec_turn),
        state_def!(0x71, "TRNR", &[OperandKind::Register], exec_trnr),
        state_def!(0x72, "SYNC", &[], exec_sync),
        state_def!(0x73, "SETDP", &[OperandKind::Immediate], exec_setdp),
        state_def!(0x74, "ADDDP", &[OperandKind::Vector], exec_adddp),
        state_def!(0x75, "ENGY", &[OperandKind::Register], exec_engy),
        state_def!(0x76, "DIFF", &[OperandKind::Register], exec_diff),
    ]
}

fn set_dv(ctx: &mut ExecCtx, v: Coord) -> Result<Flow, ExecError> {
    // A zero direction vector would pin the instruction pointer in place.
    if v.len() != ctx.env.dims() || v.iter().all(|&c| c == 0) {
        return Err(ExecError::BadOperand);
    }
    ctx.org.dv = v;
    Ok(Flow::Advance)
}

fn exec_turn(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let v = vector_arg(ctx.operands, 0)?.clone();
    set_dv(ctx, v)
}

fn exec_trnr(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let v = read_vector(ctx.org, reg_id(ctx.operands, 0)?)?;
    set_dv(ctx, v)
}

fn exec_sync(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let ip = ctx.org.ip.clone();
    let active = ctx.org.active_dp;
    ctx.org.dps[active] = ip;
    Ok(Flow::Advance)
}

fn exec_setdp(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let index = imm(ctx.operands, 0)?.value;
    let index = usize::try_from(index).map_err(|_| ExecError::BadOperand)?;
    if ctx.org.set_active_dp(index) {
        Ok(Flow::Advance)
    } else {
        Err(ExecError::BadOperand)
    }
}

fn exec_adddp(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let offset = vector_arg(ctx.operands, 0)?;
    let moved = coords::add(ctx.org.active_dp(), offset);
    let canon = ctx.env.canonical(&moved).ok_or(ExecError::OutOfBounds)?;
    let active = ctx.org.active_dp;
    ctx.org.dps[active] = canon;
    Ok(Flow::Advance)
}

fn exec_engy(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let energy = ctx.org.energy;
    write_value(ctx.org, dst, Value::Scalar(Molecule::data(energy)))?;
    Ok(Flow::Advance)
}

/// Vector from the active data pointer to the instruction pointer.
fn exec_diff(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let delta = coords::shortest_delta(
        ctx.org.active_dp(),
        &ctx.org.ip,
        ctx.env.shape(),
        ctx.env.is_toroidal(),
    );
    write_value(ctx.org, dst, Value::Vector(delta))?;
    Ok(Flow::Advance)
}
