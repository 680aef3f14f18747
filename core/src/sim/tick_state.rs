//! Immutable per-tick snapshots published to external consumers.

use serde::{Deserialize, Serialize};

use crate::organism::{ConflictStatus, Organism, Value};
use crate::world::Molecule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub coord: Vec<i64>,
    pub molecule: Molecule,
    pub owner: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismState {
    pub id: u32,
    pub program_id: u64,
    pub ip: Vec<i64>,
    pub dv: Vec<i64>,
    pub dps: Vec<Vec<i64>>,
    pub active_dp: usize,
    pub drs: Vec<Value>,
    pub prs: Vec<Value>,
    pub fprs: Vec<Value>,
    pub lrs: Vec<Vec<i64>>,
    pub energy: i64,
    pub data_stack_depth: usize,
    pub call_stack_depth: usize,
    pub last_failure: bool,
    pub conflict_status: ConflictStatus,
}

impl OrganismState {
    pub fn capture(org: &Organism) -> Self {
        Self {
            id: org.id,
            program_id: org.program_id,
            ip: org.ip.clone(),
            dv: org.dv.clone(),
            dps: org.dps.clone(),
            active_dp: org.active_dp,
            drs: org.drs.clone(),
            prs: org.prs.clone(),
            fprs: org.fprs.clone(),
            lrs: org.lrs.clone(),
            energy: org.energy,
            data_stack_depth: org.data_stack.len(),
            call_stack_depth: org.call_stack.len(),
            last_failure: org.last_failure,
            conflict_status: org.conflict_status,
        }
    }
}

/// One committed tick: number, optional full cell grid, and per-organism
/// snapshots in ascending id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickState {
    pub tick: u64,
    pub cells: Option<Vec<CellState>>,
    pub organisms: Vec<OrganismState>,
}
