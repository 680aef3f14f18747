//! Conditionals: when the predicate fails, the following instruction is
//! skipped.

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Value;
use crate::world::Molecule;

use super::{imm, read_scalar, read_value, reg_id};

const RI: &[OperandKind] = &[OperandKind::Register, OperandKind::Immediate];
const RR: &[OperandKind] = &[OperandKind::Register, OperandKind::Register];

macro_rules! cond_def {
    ($id:expr, $mnemonic:expr, $sig:expr, $exec:expr) => {
        OpcodeDef {
            id: $id,
            mnemonic: $mnemonic,
            family: Family::Conditional,
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
        cond_def!(0x40, "IFER", RR, |ctx| value_eq_reg(ctx, true)),
        cond_def!(0x41, "IFNER", RR, |ctx| value_eq_reg(ctx, false)),
        cond_def!(0x42, "IFLTR", RR, |ctx| scalar_cmp_reg(ctx, |a, b| a < b)),
        cond_def!(0x43, "IFGTR", RR, |ctx| scalar_cmp_reg(ctx, |a, b| a > b)),
        cond_def!(0x44, "IFEI", RI, |ctx| value_eq_imm(ctx, true)),
        cond_def!(0x45, "IFNEI", RI, |ctx| value_eq_imm(ctx, false)),
        cond_def!(0x46, "IFLTI", RI, |ctx| scalar_cmp_imm(ctx, |a, b| a < b)),
        cond_def!(0x47, "IFGTI", RI, |ctx| scalar_cmp_imm(ctx, |a, b| a > b)),
        cond_def!(0x48, "IFTI", RI, exec_ifti),
    ]
}

fn outcome(pass: bool) -> Flow {
    if pass { Flow::Advance } else { Flow::SkipNext }
}

fn value_eq_reg(ctx: &mut ExecCtx, want_equal: bool) -> Result<Flow, ExecError> {
    let a = read_value(ctx.org, reg_id(ctx.operands, 0)?)?;
    let b = read_value(ctx.org, reg_id(ctx.operands, 1)?)?;
    Ok(outcome((a == b) == want_equal))
}

fn value_eq_imm(ctx: &mut ExecCtx, want_equal: bool) -> Result<Flow, ExecError> {
    let a = read_value(ctx.org, reg_id(ctx.operands, 0)?)?;
    let b = Value::Scalar(imm(ctx.operands, 1)?);
    Ok(outcome((a == b) == want_equal))
}

fn scalar_cmp_reg(ctx: &mut ExecCtx, pred: fn(i64, i64) -> bool) -> Result<Flow, ExecError> {
    let a = read_scalar(ctx.org, reg_id(ctx.operands, 0)?)?;
    let b = read_scalar(ctx.org, reg_id(ctx.operands, 1)?)?;
    Ok(outcome(pred(a.value, b.value)))
}

fn scalar_cmp_imm(ctx: &mut ExecCtx, pred: fn(i64, i64) -> bool) -> Result<Flow, ExecError> {
    let a = read_scalar(ctx.org, reg_id(ctx.operands, 0)?)?;
    let b: Molecule = imm(ctx.operands, 1)?;
    Ok(outcome(pred(a.value, b.value)))
}

/// Passes when the register's molecule kind matches the immediate's kind.
fn exec_ifti(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let a = read_scalar(ctx.org, reg_id(ctx.operands, 0)?)?;
    let b = imm(ctx.operands, 1)?;
    Ok(outcome(a.kind == b.kind))
}
