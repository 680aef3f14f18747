//! Instruction families. Each module contributes its opcode definitions;
//! shared operand accessors live here.

use crate::organism::{Organism, Value};
use crate::world::coords::Coord;
use crate::world::Molecule;

use super::{ExecError, Operand, OpcodeDef};

mod arith;
mod bitwise;
mod cond;
mod data;
mod flow;
mod grid;
mod location;
mod stack;
mod state;
mod vector;

pub(super) fn all_defs() -> Vec<OpcodeDef> {
    let mut defs = Vec::new();
    defs.extend(data::defs());
    defs.extend(arith::defs());
    defs.extend(bitwise::defs());
    defs.extend(stack::defs());
    defs.extend(cond::defs());
    defs.extend(flow::defs());
    defs.extend(grid::defs());
    defs.extend(state::defs());
    defs.extend(vector::defs());
    defs.extend(location::defs());
    defs
}

pub(crate) fn reg_id(operands: &[Operand], i: usize) -> Result<u16, ExecError> {
    match operands.get(i) {
        Some(Operand::Reg(id)) => Ok(*id),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn imm(operands: &[Operand], i: usize) -> Result<Molecule, ExecError> {
    match operands.get(i) {
        Some(Operand::Imm(m)) => Ok(*m),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn vector_arg(operands: &[Operand], i: usize) -> Result<&Coord, ExecError> {
    match operands.get(i) {
        Some(Operand::Vector(v)) => Ok(v),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn target(operands: &[Operand], i: usize) -> Result<&Coord, ExecError> {
    match operands.get(i) {
        Some(Operand::Target(t)) => Ok(t),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn stack_value(operands: &[Operand], i: usize) -> Result<&Value, ExecError> {
    match operands.get(i) {
        Some(Operand::Stack(v)) => Ok(v),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn loc_index(operands: &[Operand], i: usize) -> Result<usize, ExecError> {
    match operands.get(i) {
        Some(Operand::Loc(id)) => Ok(*id as usize),
        _ => Err(ExecError::BadOperand),
    }
}

pub(crate) fn read_value(org: &Organism, id: u16) -> Result<Value, ExecError> {
    org.read_operand(id).ok_or(ExecError::BadRegister)
}

pub(crate) fn read_scalar(org: &Organism, id: u16) -> Result<Molecule, ExecError> {
    read_value(org, id)?.as_scalar().ok_or(ExecError::TypeMismatch)
}

pub(crate) fn read_vector(org: &Organism, id: u16) -> Result<Coord, ExecError> {
    match read_value(org, id)? {
        Value::Vector(v) => Ok(v),
        _ => Err(ExecError::TypeMismatch),
    }
}

pub(crate) fn write_value(org: &mut Organism, id: u16, value: Value) -> Result<(), ExecError> {
    if org.write_operand(id, value) {
        Ok(())
    } else {
        Err(ExecError::BadRegister)
    }
}
