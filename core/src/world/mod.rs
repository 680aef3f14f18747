//! The n-dimensional (optionally toroidal) grid of molecules and owners.

pub mod coords;
mod molecule;

pub use coords::Coord;
pub use molecule::*;


/// Molecule observed when reading outside a bounded (non-toroidal) world:
/// an impassable STRUCTURE.
pub const BARRIER: Molecule = Molecule {
    kind: MoleculeKind::Structure,
    value: -1,
};

/// Dense backing store for the world: one machine word and one owner id per
/// cell, indexed by the row-major linearization of the canonical coordinate.
/// Owner 0 means unowned. No interior locking; the scheduler owns the
/// environment exclusively during a tick.
pub struct Environment {
    shape: Vec<i64>,
    toroidal: bool,
    words: Vec<i64>,
    owners: Vec<u32>,
}

impl Environment {
    pub fn new(shape: Vec<i64>, toroidal: bool) -> Self {
        assert!(!shape.is_empty(), "world needs at least one dimension");
        assert!(shape.iter().all(|&n| n > 0), "world dimensions must be positive");
        let cells = coords::cell_count(&shape);
        Self {
            shape,
            toroidal,
            words: vec![0; cells],
            owners: vec![0; cells],
        }
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn dims(&self) -> usize {
        self.shape.len()
    }

    pub fn is_toroidal(&self) -> bool {
        self.toroidal
    }

    pub fn cell_count(&self) -> usize {
        self.words.len()
    }

    /// Canonical linear index of a coordinate, or `None` outside a bounded
    /// world.
    pub fn index_of(&self, c: &[i64]) -> Option<usize> {
        coords::canonicalize(c, &self.shape, self.toroidal)
            .map(|canon| coords::linear_index(&canon, &self.shape))
    }

    pub fn canonical(&self, c: &[i64]) -> Option<Coord> {
        coords::canonicalize(c, &self.shape, self.toroidal)
    }

    pub fn get(&self, c: &[i64]) -> Molecule {
        match self.index_of(c) {
            Some(i) => Molecule::from_word(self.words[i]),
            None => BARRIER,
        }
    }

    pub fn owner_of(&self, c: &[i64]) -> u32 {
        match self.index_of(c) {
            Some(i) => self.owners[i],
            None => 0,
        }
    }

    /// Writes are ignored outside a bounded world; returns whether the write
    /// landed.
    pub fn set(&mut self, c: &[i64], m: Molecule) -> bool {
        match self.index_of(c) {
            Some(i) => {
                self.words[i] = m.to_word();
                true
            }
            None => false,
        }
    }

    pub fn set_owner(&mut self, c: &[i64], owner: u32) -> bool {
        match self.index_of(c) {
            Some(i) => {
                self.owners[i] = owner;
                true
            }
            None => false,
        }
    }

    /// Reset a cell to the empty CODE word and clear its owner.
    pub fn clear(&mut self, c: &[i64]) -> bool {
        match self.index_of(c) {
            Some(i) => {
                self.words[i] = 0;
                self.owners[i] = 0;
                true
            }
            None => false,
        }
    }

    /// Unit-step neighbors along every ±axis, canonicalized; out-of-range
    /// neighbors of a bounded world are omitted.
    pub fn neighbors(&self, c: &[i64]) -> Vec<Coord> {
        let mut out = Vec::with_capacity(2 * self.dims());
        for axis in 0..self.dims() {
            for step in [1i64, -1] {
                let mut n = c.to_vec();
                n[axis] += step;
                if let Some(canon) = coords::canonicalize(&n, &self.shape, self.toroidal) {
                    out.push(canon);
                }
            }
        }
        out
    }

    /// All cells holding a non-empty molecule or a non-zero owner, in linear
    /// index order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (Coord, Molecule, u32)> + '_ {
        self.words
            .iter()
            .zip(&self.owners)
            .enumerate()
            .filter(|&(_, (&w, &o))| w != 0 || o != 0)
            .map(|(i, (&w, &o))| {
                (
                    coords::from_linear_index(i, &self.shape),
                    Molecule::from_word(w),
                    o,
                )
            })
    }
}
