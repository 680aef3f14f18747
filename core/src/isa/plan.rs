//! Generic operand planning: decode an instruction instance from the cells
//! at the organism's instruction pointer.

use crate::organism::Organism;
use crate::world::coords::{self, Coord};
use crate::world::{Environment, Molecule, MoleculeKind};

use super::{ExecError, Operand, OperandKind, registry};

/// A fully decoded instruction, ready for conflict resolution and commit.
#[derive(Debug)]
pub struct PlannedInstruction {
    pub opcode: u16,
    /// Cells occupied, opcode included.
    pub length: i64,
    pub operands: Vec<Operand>,
    /// Canonical cells this instruction intends to mutate.
    pub writes: Vec<Coord>,
    pub base_cost: i64,
}

/// Decode the word at `org.ip` and resolve every operand the signature
/// names. Stack-sourced operands are popped here; the popped values ride on
/// the planned instruction. A non-CODE word or unknown opcode fails the
/// plan.
pub fn plan_instruction(org: &mut Organism, env: &Environment) -> Result<PlannedInstruction, ExecError> {
    let opcode_word = env.get(&org.ip);
    if opcode_word.kind != MoleculeKind::Code {
        return Err(ExecError::NonCodeCell);
    }
    let id = u16::try_from(opcode_word.value).map_err(|_| ExecError::UnknownOpcode)?;
    let def = registry().get(id).ok_or(ExecError::UnknownOpcode)?;

    let dims = env.dims();
    let mut operands = Vec::with_capacity(def.signature.len());
    let mut cursor = coords::add(&org.ip, &org.dv);
    for &kind in def.signature {
        match kind {
            OperandKind::Register => {
                let (word, next) = org.fetch_argument(env, &cursor);
                cursor = next;
                let id = u16::try_from(Molecule::from_word(word).value)
                    .map_err(|_| ExecError::BadOperand)?;
                operands.push(Operand::Reg(id));
            }
            OperandKind::LocationRegister => {
                let (word, next) = org.fetch_argument(env, &cursor);
                cursor = next;
                let id = u16::try_from(Molecule::from_word(word).value)
                    .map_err(|_| ExecError::BadOperand)?;
                operands.push(Operand::Loc(id));
            }
            OperandKind::Immediate => {
                let (word, next) = org.fetch_argument(env, &cursor);
                cursor = next;
                operands.push(Operand::Imm(Molecule::from_word(word)));
            }
            OperandKind::Vector => {
                let mut components = Vec::with_capacity(dims);
                for _ in 0..dims {
                    let (value, next) = org.fetch_signed_argument(env, &cursor);
                    cursor = next;
                    components.push(value);
                }
                operands.push(Operand::Vector(components));
            }
            OperandKind::Label => {
                let mut delta = Vec::with_capacity(dims);
                for _ in 0..dims {
                    let (value, next) = org.fetch_signed_argument(env, &cursor);
                    cursor = next;
                    delta.push(value);
                }
                operands.push(Operand::Target(coords::add(&org.ip, &delta)));
            }
            OperandKind::Stack => {
                let value = org.pop_value().ok_or(ExecError::StackUnderflow)?;
                operands.push(Operand::Stack(value));
            }
        }
    }

    let writes = match def.writes {
        Some(f) => f(org, &operands, env),
        None => Vec::new(),
    };

    Ok(PlannedInstruction {
        opcode: id,
        length: super::instruction_words(def, dims),
        operands,
        writes,
        base_cost: def.base_cost,
    })
}
