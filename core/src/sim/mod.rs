//! The simulation: environment, organisms, and the per-tick execution
//! scheduler.

use std::sync::Arc;

use anyhow::Result;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::emit::ProgramArtifact;
use crate::organism::Organism;
use crate::world::Environment;

pub mod energy;
pub mod runner;
pub mod seed;
mod scheduler;
pub mod sink;
mod tick_state;

pub use seed::{SeedOrganism, WorldSeed};
pub use sink::{ChannelSink, CollectSink, NullSink, TickSink};
pub use tick_state::{CellState, OrganismState, TickState};

#[cfg(test)]
mod sim_test;

/// One environment plus its organisms, owned exclusively by the scheduler
/// for the duration of every tick. External observers only see the
/// published `TickState` snapshots.
pub struct Simulation {
    pub config: SimulationConfig,
    pub env: Environment,
    /// Live organisms in ascending id order; the scheduler relies on it.
    pub organisms: Vec<Organism>,
    artifacts: FxHashMap<u64, Arc<ProgramArtifact>>,
    /// Absolute CALL-cell linear index → caller register ids, populated
    /// when a program is placed. Forked code and empty artifact tables
    /// simply find no entry here.
    call_bindings: FxHashMap<usize, Vec<u16>>,
    distributor: Option<Box<dyn energy::EnergyDistribution>>,
    next_organism_id: u32,
    tick: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let env = Environment::new(config.shape.clone(), config.toroidal);
        Self {
            env,
            organisms: Vec::new(),
            artifacts: FxHashMap::default(),
            call_bindings: FxHashMap::default(),
            distributor: None,
            next_organism_id: 1,
            tick: 0,
            config,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn register_artifact(&mut self, artifact: Arc<ProgramArtifact>) {
        self.artifacts.insert(artifact.program_id, artifact);
    }

    pub fn artifact(&self, program_id: u64) -> Option<&Arc<ProgramArtifact>> {
        self.artifacts.get(&program_id)
    }

    pub fn set_energy_distribution(&mut self, distributor: Box<dyn energy::EnergyDistribution>) {
        self.distributor = Some(distributor);
    }

    pub fn energy_distribution(&self) -> Option<&dyn energy::EnergyDistribution> {
        self.distributor.as_deref()
    }

    pub fn organism(&self, id: u32) -> Option<&Organism> {
        self.organisms.iter().find(|o| o.id == id)
    }

    /// Create an organism without placing any code; the cells at `ip` must
    /// already hold a program.
    pub fn spawn_organism(&mut self, program_id: u64, ip: Vec<i64>, energy: i64) -> u32 {
        let id = self.next_organism_id;
        self.next_organism_id += 1;
        let ip = self.env.canonical(&ip).unwrap_or(ip);
        self.organisms
            .push(Organism::new(id, program_id, ip, energy, &self.config));
        debug!(organism = id, energy, "spawned");
        id
    }

    /// Run `n` ticks, publishing every snapshot to the sink.
    pub fn run_ticks(&mut self, n: u64, sink: &mut dyn TickSink) -> Result<()> {
        for _ in 0..n {
            let state = self.tick();
            sink.send(state)?;
        }
        Ok(())
    }
}
