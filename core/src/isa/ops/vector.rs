//! Componentwise vector arithmetic on registers holding vectors.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::Molecule;

use super::{imm, read_scalar, read_vector, reg_id, write_value};

macro_rules! vector_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::Vector,
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
        vector_def!(
            0x80,
            "VADD",
            &[OperandKind::Register, OperandKind::Register],
            |ctx| combine(ctx, |a, b| a.wrapping_add(b))
        ),
        vector_def!(
            0x81,
            "VSUB",
            &[OperandKind::Register, OperandKind::Register],
            |ctx| combine(ctx, |a, b| a.wrapping_sub(b))
        ),
        vector_def!(
            0x82,
            "VGET",
            &[OperandKind::Register, OperandKind::Register, OperandKind::Immediate],
            exec_vget
        ),
        vector_def!(
            0x83,
            "VSET",
            &[OperandKind::Register, OperandKind::Immediate, OperandKind::Register],
            exec_vset
        ),
    ]
}

fn combine(ctx: &mut ExecCtx, op: fn(i64, i64) -> i64) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let a = read_vector(ctx.org, dst)?;
    let b = read_vector(ctx.org, reg_id(ctx.operands, 1)?)?;
    if a.len() != b.len() {
        return Err(ExecError::TypeMismatch);
    }
    let out: Vec<i64> = a.iter().zip(&b).map(|(&x, &y)| op(x, y)).collect();
    write_value(ctx.org, dst, Value::Vector(out))?;
    Ok(Flow::Advance)
}

fn component_index(m: Molecule, len: usize) -> Result<usize, ExecError> {
    usize::try_from(m.value)
        .ok()
        .filter(|&i| i < len)
        .ok_or(ExecError::BadOperand)
}

fn exec_vget(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let v = read_vector(ctx.org, reg_id(ctx.operands, 1)?)?;
    let i = component_index(imm(ctx.operands, 2)?, v.len())?;
    write_value(ctx.org, dst, Value::Scalar(Molecule::data(v[i])))?;
    Ok(Flow::Advance)
}

fn exec_vset(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let dst = reg_id(ctx.operands, 0)?;
    let mut v = read_vector(ctx.org, dst)?;
    let i = component_index(imm(ctx.operands, 1)?, v.len())?;
    let src = read_scalar(ctx.org, reg_id(ctx.operands, 2)?)?;
    v[i] = src.value;
    write_value(ctx.org, dst, Value::Vector(v))?;
    Ok(Flow::Advance)
}
