//! The instruction set: a process-wide immutable catalog of opcodes with
//! their signatures, costs, planning and execution functions.

use std::fmt;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::organism::{ConflictStatus, Organism, Value};
use crate::world::coords::Coord;
use crate::world::{Environment, Molecule};

mod ops;
mod plan;

pub use plan::{PlannedInstruction, plan_instruction};


/// Base energy cost of an ordinary instruction (and of a failed decode).
pub const COST_DEFAULT: i64 = 1;
/// Fixed overhead of FORK, charged on top of the transferred energy.
pub const COST_FORK: i64 = 5;

/// Where an operand comes from. VECTOR and LABEL operands occupy one machine
/// word per world dimension; STACK operands occupy no words and are popped
/// at planning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    Immediate,
    Stack,
    Vector,
    Label,
    LocationRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Data,
    Arithmetic,
    Bitwise,
    Stack,
    Conditional,
    ControlFlow,
    Environment,
    State,
    Vector,
    Location,
}

/// A decoded operand held by a planned instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Reg(u16),
    Imm(Molecule),
    Vector(Coord),
    /// Absolute (uncanonicalized) coordinate resolved from a label delta.
    Target(Coord),
    /// Value popped from the data stack at planning time.
    Stack(Value),
    Loc(u16),
}

/// Runtime instruction faults. These never abort a tick; the scheduler turns
/// them into a charged no-op with `last_failure` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    NonCodeCell,
    UnknownOpcode,
    BadOperand,
    BadRegister,
    TypeMismatch,
    DivideByZero,
    StackUnderflow,
    StackOverflow,
    CallDepthExceeded,
    InsufficientEnergy,
    OutOfBounds,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecError::NonCodeCell => "instruction pointer on a non-CODE cell",
            ExecError::UnknownOpcode => "unknown opcode",
            ExecError::BadOperand => "malformed operand",
            ExecError::BadRegister => "register index out of range",
            ExecError::TypeMismatch => "operand type mismatch",
            ExecError::DivideByZero => "division by zero",
            ExecError::StackUnderflow => "data stack underflow",
            ExecError::StackOverflow => "data stack overflow",
            ExecError::CallDepthExceeded => "call stack depth exceeded",
            ExecError::InsufficientEnergy => "insufficient energy",
            ExecError::OutOfBounds => "target outside the world",
        };
        f.write_str(s)
    }
}

impl std::error::Error for ExecError {}

/// How execution hands control back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Advance the instruction pointer past this instruction.
    Advance,
    /// The instruction set the instruction pointer itself.
    Jump(Coord),
    /// Advance past this instruction and the one following it.
    SkipNext,
    /// The organism dies at end of tick.
    Die,
}

/// A child requested by FORK, materialized after the tick commits.
#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub parent: u32,
    pub program_id: u64,
    pub ip: Coord,
    pub dv: Coord,
    pub energy: i64,
}

/// Side effects collected during one tick's commit phase.
#[derive(Debug, Default)]
pub struct TickEffects {
    pub forks: Vec<ForkRequest>,
}

/// Everything an execute function may touch.
pub struct ExecCtx<'a> {
    pub org: &'a mut Organism,
    pub env: &'a mut Environment,
    pub operands: &'a [Operand],
    pub opcode_coord: &'a [i64],
    /// Instruction length in cells, opcode included.
    pub length: i64,
    /// Call-site binding record for the CALL at this coordinate, if any.
    pub bindings: Option<&'a [u16]>,
    pub effects: &'a mut TickEffects,
}

pub type ExecFn = fn(&mut ExecCtx<'_>) -> Result<Flow, ExecError>;
/// Canonical cells an instruction intends to mutate, for conflict planning.
pub type WritesFn = fn(&Organism, &[Operand], &Environment) -> Vec<Coord>;
/// Precondition check evaluated at resolve time against pre-tick state.
pub type PrecondFn = fn(&Organism, &[Operand], &Environment) -> Option<ConflictStatus>;

pub struct OpcodeDef {
    pub id: u16,
    pub mnemonic: &'static str,
    pub family: Family,
    pub signature: &'static [OperandKind],
    pub base_cost: i64,
    pub exec: ExecFn,
    pub writes: Option<WritesFn>,
    pub precondition: Option<PrecondFn>,
}

/// Machine words occupied by one operand of the given kind in a world of
/// dimensionality `dims`.
pub fn operand_words(kind: OperandKind, dims: usize) -> i64 {
    match kind {
        OperandKind::Vector | OperandKind::Label => dims as i64,
        OperandKind::Stack => 0,
        _ => 1,
    }
}

/// Total cells (opcode plus operands) of an instruction.
pub fn instruction_words(def: &OpcodeDef, dims: usize) -> i64 {
    1 + def
        .signature
        .iter()
        .map(|&k| operand_words(k, dims))
        .sum::<i64>()
}

pub struct IsaRegistry {
    by_id: FxHashMap<u16, OpcodeDef>,
    by_mnemonic: FxHashMap<&'static str, u16>,
}

impl IsaRegistry {
    fn build() -> Self {
        let mut by_id = FxHashMap::default();
        let mut by_mnemonic = FxHashMap::default();
        for def in ops::all_defs() {
            assert!(
                by_mnemonic.insert(def.mnemonic, def.id).is_none(),
                "duplicate mnemonic {}",
                def.mnemonic
            );
            assert!(by_id.insert(def.id, def).is_none(), "duplicate opcode id");
        }
        Self { by_id, by_mnemonic }
    }

    pub fn get(&self, id: u16) -> Option<&OpcodeDef> {
        self.by_id.get(&id)
    }

    /// Case-insensitive mnemonic lookup.
    pub fn lookup(&self, mnemonic: &str) -> Option<&OpcodeDef> {
        let upper = mnemonic.to_ascii_uppercase();
        self.by_mnemonic.get(upper.as_str()).and_then(|id| self.by_id.get(id))
    }

    pub fn is_mnemonic(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn opcodes(&self) -> impl Iterator<Item = &OpcodeDef> {
        self.by_id.values()
    }
}

static REGISTRY: Lazy<IsaRegistry> = Lazy::new(IsaRegistry::build);

/// The process-wide catalog, built on first use and immutable afterwards.
pub fn registry() -> &'static IsaRegistry {
    &REGISTRY
}
