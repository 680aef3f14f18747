//! Pluggable per-tick energy distribution, run at the end of the commit
//! phase before the snapshot is published.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::world::coords;
use crate::world::{Environment, Molecule};

/// A per-tick side effect that may introduce ENERGY molecules. Internal
/// state must round-trip through serde so checkpoints can resume a run
/// deterministically.
pub trait EnergyDistribution: Send {
    fn distribute(&mut self, tick: u64, env: &mut Environment);
    fn snapshot_state(&self) -> serde_json::Value;
    fn restore_state(&mut self, state: serde_json::Value) -> Result<()>;
}

/// Deterministic 64-bit linear congruential generator (Knuth constants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 { 0 } else { self.next_u64() % bound }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeyserConfig {
    pub seed: u64,
    /// Ticks between eruptions; 0 disables the geyser.
    pub interval: u64,
    /// Payload of each placed ENERGY molecule.
    pub amount: i64,
    /// Cells seeded per eruption.
    pub sites: usize,
}

impl Default for GeyserConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            interval: 100,
            amount: 500,
            sites: 4,
        }
    }
}

/// Erupts every `interval` ticks, dropping ENERGY molecules onto randomly
/// chosen empty cells of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeyserDistribution {
    config: GeyserConfig,
    rng: Lcg,
}

impl GeyserDistribution {
    pub fn new(config: GeyserConfig) -> Self {
        let rng = Lcg::new(config.seed);
        Self { config, rng }
    }
}

impl EnergyDistribution for GeyserDistribution {
    fn distribute(&mut self, tick: u64, env: &mut Environment) {
        if self.config.interval == 0 || tick % self.config.interval != 0 {
            return;
        }
        let cells = env.cell_count() as u64;
        for _ in 0..self.config.sites {
            let index = self.rng.below(cells) as usize;
            let coord = coords::from_linear_index(index, env.shape());
            if env.get(&coord).is_empty() {
                env.set(&coord, Molecule::energy(self.config.amount));
            }
        }
    }

    fn snapshot_state(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("geyser state serializes")
    }

    fn restore_state(&mut self, state: serde_json::Value) -> Result<()> {
        *self = serde_json::from_value(state)?;
        Ok(())
    }
}
