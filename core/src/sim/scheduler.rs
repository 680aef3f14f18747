//! The three-phase tick: plan every organism's next instruction, resolve
//! cell-write conflicts deterministically, then commit in ascending id
//! order.

use rustc_hash::FxHashMap;

use crate::isa::{
    self, COST_DEFAULT, ExecCtx, ExecError, Flow, PlannedInstruction, TickEffects, plan_instruction,
};
use crate::organism::{ConflictStatus, Organism};
use crate::world::coords;
use crate::world::{Environment, MoleculeKind};

use super::tick_state::{CellState, OrganismState, TickState};
use super::Simulation;

enum PlanOutcome {
    Planned(PlannedInstruction),
    Failed(ExecError),
}

struct TickPlan {
    org_index: usize,
    org_id: u32,
    outcome: PlanOutcome,
    conflict: ConflictStatus,
    /// Precondition result; set when the instruction's expectation about
    /// its target cell does not hold.
    blocked: Option<ConflictStatus>,
}

/// Advance `org.ip` by `cells` steps along its direction vector.
fn advance(org: &mut Organism, env: &Environment, cells: i64) {
    let next = coords::scaled_add(&org.ip, &org.dv, cells);
    org.ip = env.canonical(&next).unwrap_or(next);
}

/// Step over the instruction at `org.ip`: its full length when the cell
/// decodes to a known opcode, one cell otherwise.
fn skip_instruction(org: &mut Organism, env: &Environment) {
    let molecule = env.get(&org.ip);
    let cells = if molecule.kind == MoleculeKind::Code {
        u16::try_from(molecule.value)
            .ok()
            .and_then(|id| isa::registry().get(id))
            .map(|def| isa::instruction_words(def, env.dims()))
            .unwrap_or(1)
    } else {
        1
    };
    advance(org, env, cells);
}

impl Simulation {
    /// Execute one tick and return the committed snapshot.
    pub fn tick(&mut self) -> TickState {
        let tick_no = self.tick;

        // Phase 1 — plan. Stack operands are popped here; nothing else is
        // visible to other organisms yet.
        let mut plans: Vec<TickPlan> = Vec::with_capacity(self.organisms.len());
        for (org_index, org) in self.organisms.iter_mut().enumerate() {
            org.last_failure = false;
            org.conflict_status = ConflictStatus::None;
            let outcome = match plan_instruction(org, &self.env) {
                Ok(planned) => PlanOutcome::Planned(planned),
                Err(err) => PlanOutcome::Failed(err),
            };
            plans.push(TickPlan {
                org_index,
                org_id: org.id,
                outcome,
                conflict: ConflictStatus::None,
                blocked: None,
            });
        }

        // Phase 2 — resolve. All reads here see end-of-previous-tick state.
        let mut claims: FxHashMap<usize, (u32, u32)> = FxHashMap::default();
        for plan in &plans {
            if let PlanOutcome::Planned(planned) = &plan.outcome {
                for cell in &planned.writes {
                    let index = coords::linear_index(cell, self.env.shape());
                    let entry = claims.entry(index).or_insert((plan.org_id, 0));
                    entry.0 = entry.0.min(plan.org_id);
                    entry.1 += 1;
                }
            }
        }
        for plan in &mut plans {
            let PlanOutcome::Planned(planned) = &plan.outcome else {
                continue;
            };
            let mut lost = false;
            let mut contested = false;
            for cell in &planned.writes {
                let index = coords::linear_index(cell, self.env.shape());
                let (min_id, count) = claims[&index];
                if count > 1 {
                    contested = true;
                    if min_id < plan.org_id {
                        lost = true;
                    }
                }
            }
            if lost {
                plan.conflict = ConflictStatus::LostLowerIdWon;
                continue;
            }
            if contested {
                plan.conflict = ConflictStatus::WonExecution;
            }
            if let Some(precondition) = isa::registry()
                .get(planned.opcode)
                .and_then(|def| def.precondition)
            {
                plan.blocked = precondition(
                    &self.organisms[plan.org_index],
                    &planned.operands,
                    &self.env,
                );
            }
        }

        // Phase 3 — commit & execute in id order. Conflict sets are already
        // disjoint, so no two commits touch the same cell.
        let mut effects = TickEffects::default();
        for plan in plans {
            let org = &mut self.organisms[plan.org_index];
            let planned = match plan.outcome {
                PlanOutcome::Failed(_) => {
                    // Undecodable step: charge the default cost, flag the
                    // failure, move one cell.
                    org.energy -= COST_DEFAULT;
                    org.last_failure = true;
                    advance(org, &self.env, 1);
                    continue;
                }
                PlanOutcome::Planned(planned) => planned,
            };

            if plan.conflict == ConflictStatus::LostLowerIdWon {
                let cost = (planned.base_cost as f64 * self.config.conflict_loss_cost_factor)
                    .round() as i64;
                org.energy -= cost;
                org.conflict_status = ConflictStatus::LostLowerIdWon;
                advance(org, &self.env, planned.length);
                continue;
            }
            if let Some(status) = plan.blocked {
                org.energy -= planned.base_cost;
                org.conflict_status = status;
                advance(org, &self.env, planned.length);
                continue;
            }

            org.conflict_status = plan.conflict;
            org.energy -= planned.base_cost;

            let opcode_coord = org.ip.clone();
            let call_bindings = self
                .env
                .index_of(&opcode_coord)
                .and_then(|index| self.call_bindings.get(&index));
            let def = isa::registry()
                .get(planned.opcode)
                .expect("planned opcode is registered");
            let result = {
                let mut ctx = ExecCtx {
                    org: &mut *org,
                    env: &mut self.env,
                    operands: &planned.operands,
                    opcode_coord: &opcode_coord,
                    length: planned.length,
                    bindings: call_bindings.map(Vec::as_slice),
                    effects: &mut effects,
                };
                (def.exec)(&mut ctx)
            };
            match result {
                Ok(Flow::Advance) => advance(org, &self.env, planned.length),
                Ok(Flow::Jump(target)) => org.ip = target,
                Ok(Flow::SkipNext) => {
                    advance(org, &self.env, planned.length);
                    skip_instruction(org, &self.env);
                }
                Ok(Flow::Die) => org.alive = false,
                Err(_) => {
                    org.last_failure = true;
                    advance(org, &self.env, planned.length);
                }
            }
        }

        // Children materialize after the tick and first plan on the next.
        for fork in effects.forks {
            let id = self.next_organism_id;
            self.next_organism_id += 1;
            let mut child = Organism::new(id, fork.program_id, fork.ip, fork.energy, &self.config);
            child.dv = fork.dv;
            self.organisms.push(child);
        }

        self.organisms.retain(|o| o.alive && o.energy > 0);

        if let Some(distributor) = &mut self.distributor {
            distributor.distribute(tick_no, &mut self.env);
        }

        self.tick += 1;

        let cells = self.config.snapshot_cells.then(|| {
            self.env
                .occupied_cells()
                .map(|(coord, molecule, owner)| CellState {
                    coord,
                    molecule,
                    owner,
                })
                .collect()
        });
        TickState {
            tick: tick_no,
            cells,
            organisms: self.organisms.iter().map(OrganismState::capture).collect(),
        }
    }
}
