//! Organism state: register files, stacks, pointers, and procedure frames.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::world::coords::{self, Coord};
use crate::world::{Environment, Molecule};


/// First register id of the procedure-local (PR) file. Ids below are DRs.
pub const PR_BASE: u16 = 1000;
/// First register id of the formal-parameter (FPR) file.
pub const FPR_BASE: u16 = 2000;

pub const MAX_DATA_STACK_DEPTH: usize = 1024;
pub const MAX_CALL_STACK_DEPTH: usize = 256;

/// A tagged register/stack value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Scalar(Molecule),
    Vector(Coord),
    Location(Coord),
}

impl Value {
    pub fn as_scalar(&self) -> Option<Molecule> {
        match self {
            Value::Scalar(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Coord> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&Coord> {
        match self {
            Value::Location(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(Molecule::data(0))
    }
}

/// Outcome of conflict arbitration and precondition checks for the organism's
/// most recent planned instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStatus {
    None,
    WonExecution,
    LostLowerIdWon,
    /// The target cell was empty where the instruction expected a molecule.
    TargetEmpty,
    /// The target cell was occupied where the instruction expected empty.
    TargetOccupied,
}

/// One call-stack entry. PR and FPR files are snapshotted on CALL and
/// restored on RET; `fpr_bindings` maps FPR indices to the caller's register
/// ids when the call site had an artifact binding record.
#[derive(Debug, Clone)]
pub struct Frame {
    pub return_ip: Coord,
    pub return_dv: Coord,
    pub saved_prs: Vec<Value>,
    pub saved_fprs: Vec<Value>,
    pub fpr_bindings: FxHashMap<u16, u16>,
}

enum FprTarget {
    /// Binding chain ended in a physical DR or PR id.
    Physical(u16),
    /// No binding; use the organism's local FPR slot.
    Local(usize),
}

pub struct Organism {
    pub id: u32,
    pub program_id: u64,
    pub ip: Coord,
    pub dv: Coord,
    pub dps: Vec<Coord>,
    pub active_dp: usize,
    pub drs: Vec<Value>,
    pub prs: Vec<Value>,
    pub fprs: Vec<Value>,
    pub lrs: Vec<Coord>,
    pub data_stack: Vec<Value>,
    pub call_stack: Vec<Frame>,
    pub energy: i64,
    pub alive: bool,
    pub last_failure: bool,
    pub conflict_status: ConflictStatus,
}

impl Organism {
    pub fn new(id: u32, program_id: u64, ip: Coord, energy: i64, cfg: &SimulationConfig) -> Self {
        let dims = ip.len();
        Self {
            id,
            program_id,
            dv: coords::unit(dims, 0),
            dps: vec![ip.clone(); cfg.num_data_pointers],
            active_dp: 0,
            drs: vec![Value::default(); cfg.num_data_registers],
            prs: vec![Value::default(); cfg.num_proc_registers],
            fprs: vec![Value::default(); cfg.num_formal_registers],
            lrs: vec![coords::zero(dims); cfg.num_location_registers],
            data_stack: Vec::new(),
            call_stack: Vec::new(),
            ip,
            energy,
            alive: true,
            last_failure: false,
            conflict_status: ConflictStatus::None,
        }
    }

    /// Read the raw word at `at` and step one cell along the direction
    /// vector.
    pub fn fetch_argument(&self, env: &Environment, at: &[i64]) -> (i64, Coord) {
        (env.get(at).to_word(), coords::add(at, &self.dv))
    }

    /// Like [`fetch_argument`], sign-extending the payload.
    ///
    /// [`fetch_argument`]: Organism::fetch_argument
    pub fn fetch_signed_argument(&self, env: &Environment, at: &[i64]) -> (i64, Coord) {
        (env.get(at).value, coords::add(at, &self.dv))
    }

    /// Walk the FPR binding chain down the call stack. Chains terminate at a
    /// DR/PR id or at the first frame without a binding for the index.
    fn fpr_target(&self, index: usize) -> FprTarget {
        let mut k = index;
        let mut level = self.call_stack.len();
        while level > 0 {
            match self.call_stack[level - 1].fpr_bindings.get(&(k as u16)) {
                Some(&reg) if reg >= FPR_BASE => {
                    k = (reg - FPR_BASE) as usize;
                    level -= 1;
                }
                Some(&reg) => return FprTarget::Physical(reg),
                None => return FprTarget::Local(k),
            }
        }
        FprTarget::Local(k)
    }

    fn read_physical(&self, id: u16) -> Option<Value> {
        if id >= FPR_BASE {
            self.fprs.get((id - FPR_BASE) as usize).cloned()
        } else if id >= PR_BASE {
            self.prs.get((id - PR_BASE) as usize).cloned()
        } else {
            self.drs.get(id as usize).cloned()
        }
    }

    fn write_physical(&mut self, id: u16, value: Value) -> bool {
        let slot = if id >= FPR_BASE {
            self.fprs.get_mut((id - FPR_BASE) as usize)
        } else if id >= PR_BASE {
            self.prs.get_mut((id - PR_BASE) as usize)
        } else {
            self.drs.get_mut(id as usize)
        };
        match slot {
            Some(s) => {
                *s = value;
                true
            }
            None => false,
        }
    }

    /// Register read dispatched across the DR/PR/FPR files; FPR accesses
    /// route through the binding chain to the caller's physical register.
    pub fn read_operand(&self, id: u16) -> Option<Value> {
        if id >= FPR_BASE {
            match self.fpr_target((id - FPR_BASE) as usize) {
                FprTarget::Physical(reg) => self.read_physical(reg),
                FprTarget::Local(k) => self.fprs.get(k).cloned(),
            }
        } else {
            self.read_physical(id)
        }
    }

    pub fn write_operand(&mut self, id: u16, value: Value) -> bool {
        if id >= FPR_BASE {
            match self.fpr_target((id - FPR_BASE) as usize) {
                FprTarget::Physical(reg) => self.write_physical(reg, value),
                FprTarget::Local(k) => match self.fprs.get_mut(k) {
                    Some(s) => {
                        *s = value;
                        true
                    }
                    None => false,
                },
            }
        } else {
            self.write_physical(id, value)
        }
    }

    pub fn push_value(&mut self, value: Value) -> bool {
        if self.data_stack.len() >= MAX_DATA_STACK_DEPTH {
            return false;
        }
        self.data_stack.push(value);
        true
    }

    pub fn pop_value(&mut self) -> Option<Value> {
        self.data_stack.pop()
    }

    pub fn peek_value(&self) -> Option<&Value> {
        self.data_stack.last()
    }

    pub fn push_frame(&mut self, frame: Frame) -> bool {
        if self.call_stack.len() >= MAX_CALL_STACK_DEPTH {
            return false;
        }
        self.call_stack.push(frame);
        true
    }

    /// Pop a frame and restore the procedure-local register files.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.call_stack.pop()?;
        self.prs = frame.saved_prs.clone();
        self.fprs = frame.saved_fprs.clone();
        Some(frame)
    }

    pub fn active_dp(&self) -> &Coord {
        &self.dps[self.active_dp]
    }

    pub fn set_active_dp(&mut self, index: usize) -> bool {
        if index < self.dps.len() {
            self.active_dp = index;
            true
        } else {
            false
        }
    }
}
