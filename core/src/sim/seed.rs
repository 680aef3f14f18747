//! World seeding: initial molecules and program placement.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimulationConfig;
use crate::emit::ProgramArtifact;
use crate::world::coords;
use crate::world::Molecule;

use super::Simulation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedOrganism {
    pub program_id: u64,
    pub start: Vec<i64>,
    pub energy: i64,
}

/// Declarative description of a fresh world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSeed {
    pub shape: Vec<i64>,
    pub toroidal: bool,
    #[serde(default)]
    pub initial_molecules: Vec<(Vec<i64>, Molecule)>,
    #[serde(default)]
    pub organisms: Vec<SeedOrganism>,
}

impl Simulation {
    /// Build a simulation from a seed: the seed's shape overrides the
    /// config, molecules are placed, and every listed organism's program is
    /// stamped into the grid at its start coordinate.
    pub fn from_seed(
        seed: &WorldSeed,
        artifacts: &[Arc<ProgramArtifact>],
        mut config: SimulationConfig,
    ) -> Result<Self> {
        config.shape = seed.shape.clone();
        config.toroidal = seed.toroidal;
        let mut sim = Simulation::new(config);
        for artifact in artifacts {
            sim.register_artifact(artifact.clone());
        }
        for (coord, molecule) in &seed.initial_molecules {
            if !sim.env.set(coord, *molecule) {
                return Err(anyhow!("seed molecule at {coord:?} is outside the world"));
            }
        }
        for organism in &seed.organisms {
            sim.place_program(organism.program_id, &organism.start, organism.energy)?;
        }
        Ok(sim)
    }

    /// Stamp a compiled program into the grid translated by `origin`, mark
    /// ownership, register its call-site bindings, and spawn the organism
    /// at the origin.
    pub fn place_program(&mut self, program_id: u64, origin: &[i64], energy: i64) -> Result<u32> {
        let artifact = self
            .artifacts
            .get(&program_id)
            .cloned()
            .ok_or_else(|| anyhow!("no artifact registered for program {program_id:#x}"))?;

        let id = self.next_organism_id;
        for (coord, word) in &artifact.machine_code_layout {
            let cell = coords::add(origin, coord);
            if !self.env.set(&cell, Molecule::from_word(*word)) {
                return Err(anyhow!("program cell {cell:?} is outside the world"));
            }
            self.env.set_owner(&cell, id);
        }
        for (coord, molecule) in &artifact.initial_world_objects {
            let cell = coords::add(origin, coord);
            if !self.env.set(&cell, *molecule) {
                return Err(anyhow!("world object at {cell:?} is outside the world"));
            }
        }
        for (addr, bindings) in &artifact.call_site_bindings {
            let coord = &artifact.linear_address_to_coord[*addr];
            let cell = coords::add(origin, coord);
            let index = self
                .env
                .index_of(&cell)
                .ok_or_else(|| anyhow!("call site at {cell:?} is outside the world"))?;
            self.call_bindings.insert(index, bindings.clone());
        }

        let spawned = self.spawn_organism(program_id, origin.to_vec(), energy);
        debug_assert_eq!(spawned, id);
        info!(organism = spawned, program_id, "placed program");
        Ok(spawned)
    }
}
