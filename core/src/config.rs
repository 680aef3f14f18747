use serde::{Deserialize, Serialize};

/// Fraction of an instruction's base cost charged to organisms that lose a
/// cell-write conflict. 1.0 charges the full attempt.
pub const DEFAULT_CONFLICT_LOSS_COST_FACTOR: f64 = 1.0;

/// Runtime parameters of one simulation. All fields have defaults so a TOML
/// config may specify only what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub shape: Vec<i64>,
    pub toroidal: bool,
    pub num_data_registers: usize,
    pub num_proc_registers: usize,
    pub num_formal_registers: usize,
    pub num_location_registers: usize,
    pub num_data_pointers: usize,
    pub conflict_loss_cost_factor: f64,
    /// Include the full (non-empty) cell grid in every tick snapshot.
    pub snapshot_cells: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            shape: vec![100, 100],
            toroidal: true,
            num_data_registers: 8,
            num_proc_registers: 4,
            num_formal_registers: 4,
            num_location_registers: 4,
            num_data_pointers: 2,
            conflict_loss_cost_factor: DEFAULT_CONFLICT_LOSS_COST_FACTOR,
            snapshot_cells: false,
        }
    }
}

impl SimulationConfig {
    pub fn dims(&self) -> usize {
        self.shape.len()
    }
}
