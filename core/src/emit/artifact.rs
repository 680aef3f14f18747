//! The immutable compilation artifact and its linearized interchange form.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use crate::sema::{TokenLookup, TokenMapEntry};
use crate::world::coords;
use crate::world::Molecule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub line_text: String,
}

/// Immutable result of a compilation: the coordinate→word layout plus every
/// debug and link table the runtime and external tooling consume.
#[derive(Debug, Clone, Default)]
pub struct ProgramArtifact {
    /// Stable hash over the machine-code layout, independent of map
    /// iteration order.
    pub program_id: u64,
    pub machine_code_layout: FxHashMap<Vec<i64>, i64>,
    pub initial_world_objects: FxHashMap<Vec<i64>, Molecule>,
    pub source_map: FxHashMap<usize, SourceMapEntry>,
    pub call_site_bindings: FxHashMap<usize, Vec<u16>>,
    pub linear_address_to_coord: Vec<Vec<i64>>,
    pub coord_to_linear_address: FxHashMap<Vec<i64>, usize>,
    pub label_address_to_name: FxHashMap<usize, String>,
    pub register_alias_map: FxHashMap<String, String>,
    pub proc_name_to_param_names: FxHashMap<String, Vec<String>>,
    pub token_map: Vec<TokenMapEntry>,
    pub token_lookup: TokenLookup,
}

/// Order-independent layout hash: entries are fed to the hasher in
/// lexicographic coordinate order with a fixed-state hasher.
pub fn hash_layout(layout: &FxHashMap<Vec<i64>, i64>) -> u64 {
    let mut entries: Vec<(&Vec<i64>, &i64)> = layout.iter().collect();
    entries.sort();
    let mut hasher = FxHasher::default();
    for (coord, word) in entries {
        coord.hash(&mut hasher);
        word.hash(&mut hasher);
    }
    hasher.finish()
}

impl ProgramArtifact {
    /// Linearize the coordinate-keyed tables row-major over `shape` for
    /// interchange. Coordinates must already be canonical for the shape.
    pub fn to_interchange(&self, shape: &[i64]) -> ArtifactInterchange {
        let machine_code_layout = self
            .machine_code_layout
            .iter()
            .map(|(c, w)| (coords::linear_index(c, shape) as u64, *w))
            .collect();
        let initial_world_objects = self
            .initial_world_objects
            .iter()
            .map(|(c, m)| (coords::linear_index(c, shape) as u64, *m))
            .collect();
        let token_lookup = self
            .token_lookup
            .iter()
            .map(|(file, lines)| {
                (
                    file.clone(),
                    lines
                        .iter()
                        .map(|(line, cols)| {
                            (*line, cols.iter().map(|(c, k)| (*c, k.clone())).collect())
                        })
                        .collect(),
                )
            })
            .collect();
        ArtifactInterchange {
            program_id: self.program_id,
            shape: shape.to_vec(),
            machine_code_layout,
            initial_world_objects,
            source_map: self.source_map.iter().map(|(a, e)| (*a, e.clone())).collect(),
            call_site_bindings: self
                .call_site_bindings
                .iter()
                .map(|(a, b)| (*a, b.clone()))
                .collect(),
            linear_address_to_coord: self.linear_address_to_coord.clone(),
            label_address_to_name: self
                .label_address_to_name
                .iter()
                .map(|(a, n)| (*a, n.clone()))
                .collect(),
            register_alias_map: self
                .register_alias_map
                .iter()
                .map(|(a, t)| (a.clone(), t.clone()))
                .collect(),
            proc_name_to_param_names: self
                .proc_name_to_param_names
                .iter()
                .map(|(n, p)| (n.clone(), p.clone()))
                .collect(),
            token_map: self.token_map.clone(),
            token_lookup,
        }
    }

    /// Rebuild the working artifact from its interchange form. The reverse
    /// of the row-major linearization is unambiguous given the shape.
    pub fn from_interchange(x: &ArtifactInterchange) -> Self {
        let shape = &x.shape;
        let machine_code_layout: FxHashMap<Vec<i64>, i64> = x
            .machine_code_layout
            .iter()
            .map(|(idx, w)| (coords::from_linear_index(*idx as usize, shape), *w))
            .collect();
        let initial_world_objects = x
            .initial_world_objects
            .iter()
            .map(|(idx, m)| (coords::from_linear_index(*idx as usize, shape), *m))
            .collect();
        let coord_to_linear_address = x
            .linear_address_to_coord
            .iter()
            .enumerate()
            .map(|(addr, c)| (c.clone(), addr))
            .collect();
        let token_lookup = x
            .token_lookup
            .iter()
            .map(|(file, lines)| {
                (
                    file.clone(),
                    lines
                        .iter()
                        .map(|(line, cols)| {
                            (*line, cols.iter().map(|(c, k)| (*c, k.clone())).collect())
                        })
                        .collect(),
                )
            })
            .collect();
        Self {
            program_id: x.program_id,
            machine_code_layout,
            initial_world_objects,
            source_map: x.source_map.iter().map(|(a, e)| (*a, e.clone())).collect(),
            call_site_bindings: x
                .call_site_bindings
                .iter()
                .map(|(a, b)| (*a, b.clone()))
                .collect(),
            linear_address_to_coord: x.linear_address_to_coord.clone(),
            coord_to_linear_address,
            label_address_to_name: x
                .label_address_to_name
                .iter()
                .map(|(a, n)| (*a, n.clone()))
                .collect(),
            register_alias_map: x
                .register_alias_map
                .iter()
                .map(|(a, t)| (a.clone(), t.clone()))
                .collect(),
            proc_name_to_param_names: x
                .proc_name_to_param_names
                .iter()
                .map(|(n, p)| (n.clone(), p.clone()))
                .collect(),
            token_map: x.token_map.clone(),
            token_lookup,
        }
    }
}

/// Serde-friendly artifact with coordinate keys linearized to integers.
/// Ordered maps keep the JSON deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInterchange {
    pub program_id: u64,
    pub shape: Vec<i64>,
    pub machine_code_layout: BTreeMap<u64, i64>,
    pub initial_world_objects: BTreeMap<u64, Molecule>,
    pub source_map: BTreeMap<usize, SourceMapEntry>,
    pub call_site_bindings: BTreeMap<usize, Vec<u16>>,
    pub linear_address_to_coord: Vec<Vec<i64>>,
    pub label_address_to_name: BTreeMap<usize, String>,
    pub register_alias_map: BTreeMap<String, String>,
    pub proc_name_to_param_names: BTreeMap<String, Vec<String>>,
    pub token_map: Vec<TokenMapEntry>,
    pub token_lookup: BTreeMap<String, BTreeMap<u32, BTreeMap<u32, String>>>,
}
