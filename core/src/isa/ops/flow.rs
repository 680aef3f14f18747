//! Control flow: jumps, procedure calls, returns. Jump deltas resolve
//! relative to the opcode coordinate.

use rustc_hash::FxHashMap;

use crate::isa::{COST_DEFAULT, ExecCtx, ExecError, Family, Flow, OpcodeDef, OperandKind};
use crate::organism::Frame;
use crate::world::coords;

use super::{read_vector, reg_id, target};

pub(super) fn defs() -> Vec<OpcodeDef> {
    vec![
        OpcodeDef {
            id: 0x50,
            mnemonic: "JMPI",
            family: Family::ControlFlow,
            signature: &[OperandKind::Label],
            base_cost: COST_DEFAULT,
            exec: exec_jmpi,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x51,
            mnemonic: "JMPR",
            family: Family::ControlFlow,
            signature: &[OperandKind::Register],
            base_cost: COST_DEFAULT,
            exec: exec_jmpr,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x52,
            mnemonic: "CALL",
            family: Family::ControlFlow,
            signature: &[OperandKind::Label],
            base_cost: COST_DEFAULT,
            exec: exec_call,
            writes: None,
            precondition: None,
        },
        OpcodeDef {
            id: 0x53,
            mnemonic: "RET",
            family: Family::ControlFlow,
            signature: &[],
            base_cost: COST_DEFAULT,
            exec: exec_ret,
            writes: None,
            precondition: None,
        },
    ]
}

fn exec_jmpi(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let t = target(ctx.operands, 0)?;
    let canon = ctx.env.canonical(t).ok_or(ExecError::OutOfBounds)?;
    Ok(Flow::Jump(canon))
}

fn exec_jmpr(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let delta = read_vector(ctx.org, reg_id(ctx.operands, 0)?)?;
    if delta.len() != ctx.env.dims() {
        return Err(ExecError::BadOperand);
    }
    let raw = coords::add(ctx.opcode_coord, &delta);
    let canon = ctx.env.canonical(&raw).ok_or(ExecError::OutOfBounds)?;
    Ok(Flow::Jump(canon))
}

fn exec_call(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    let t = target(ctx.operands, 0)?;
    let entry = ctx.env.canonical(t).ok_or(ExecError::OutOfBounds)?;

    let after = coords::scaled_add(ctx.opcode_coord, &ctx.org.dv, ctx.length);
    let return_ip = ctx.env.canonical(&after).unwrap_or(after);

    // FPR aliases from the artifact's call-site binding record; absent for
    // forked code and empty artifact tables, where the PUSH/POP sequences
    // emitted around the call carry the arguments instead.
    let mut fpr_bindings = FxHashMap::default();
    if let Some(regs) = ctx.bindings {
        for (k, &reg) in regs.iter().enumerate() {
            fpr_bindings.insert(k as u16, reg);
        }
    }

    let frame = Frame {
        return_ip,
        return_dv: ctx.org.dv.clone(),
        saved_prs: ctx.org.prs.clone(),
        saved_fprs: ctx.org.fprs.clone(),
        fpr_bindings,
    };
    if !ctx.org.push_frame(frame) {
        return Err(ExecError::CallDepthExceeded);
    }
    Ok(Flow::Jump(entry))
}

fn exec_ret(ctx: &mut ExecCtx) -> Result<Flow, ExecError> {
    match ctx.org.pop_frame() {
        Some(frame) => {
            ctx.org.dv = frame.return_dv.clone();
            Ok(Flow::Jump(frame.return_ip))
        }
        // RET with no matching frame kills the organism.
        None => Ok(Flow::Die),
    }
}
