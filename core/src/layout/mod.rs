//! The layout engine: walk the IR with a cursor and direction vector,
//! assigning every emitted machine word a linear address and a grid
//! coordinate.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiler::CompileOptions;
use crate::diag::{Diagnostics, Phase};
use crate::ir::{IrItem, IrOperand, IrProgram};
use crate::world::coords::{self, Coord};
use crate::world::Molecule;

#[cfg(test)]
mod layout_test;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    /// Linear address of the next emitted word.
    pub addr: usize,
    pub coord: Coord,
}

#[derive(Debug, Default)]
pub struct Layout {
    /// Linear word address → canonical coordinate.
    pub coords: Vec<Coord>,
    /// `(item index, starting linear address)` per IR instruction.
    pub instr_addrs: Vec<(usize, usize)>,
    pub labels: FxHashMap<String, LabelInfo>,
    pub places: Vec<(Coord, Molecule)>,
}

/// Cells one operand occupies in the laid-out instruction stream.
pub fn operand_cells(op: &IrOperand, dims: usize) -> i64 {
    match op {
        IrOperand::Vector(_) | IrOperand::LabelRef(_) => dims as i64,
        _ => 1,
    }
}

pub fn lay_out(ir: &IrProgram, opts: &CompileOptions, diags: &mut Diagnostics) -> Option<Layout> {
    let dims = opts.dims();
    let mut layout = Layout::default();
    let mut pos = coords::zero(dims);
    let mut dv = coords::unit(dims, 0);
    let mut used: FxHashSet<usize> = FxHashSet::default();
    let mut failed = false;

    for (index, item) in ir.items.iter().enumerate() {
        match item {
            IrItem::Org(coord) => {
                pos = coord.clone();
            }
            IrItem::Dir(vector) => {
                dv = vector.clone();
            }
            IrItem::Label(name) => {
                let coord = match coords::canonicalize(&pos, &opts.shape, opts.toroidal) {
                    Some(c) => c,
                    None => {
                        diags.report(
                            Phase::Layout,
                            None,
                            format!("label '{name}' lands outside the world at {pos:?}"),
                        );
                        failed = true;
                        pos.clone()
                    }
                };
                layout.labels.insert(
                    name.clone(),
                    LabelInfo {
                        addr: layout.coords.len(),
                        coord,
                    },
                );
            }
            IrItem::Place { molecule, coord } => {
                match coords::canonicalize(coord, &opts.shape, opts.toroidal) {
                    Some(c) => layout.places.push((c, *molecule)),
                    None => {
                        diags.report(
                            Phase::Layout,
                            None,
                            format!(".PLACE target {coord:?} is outside the world"),
                        );
                        failed = true;
                    }
                }
            }
            IrItem::Instr(instr) => {
                let length = 1 + instr
                    .operands
                    .iter()
                    .map(|op| operand_cells(op, dims))
                    .sum::<i64>();
                layout.instr_addrs.push((index, layout.coords.len()));
                for step in 0..length {
                    let cell = coords::scaled_add(&pos, &dv, step);
                    let Some(canon) = coords::canonicalize(&cell, &opts.shape, opts.toroidal) else {
                        diags.report(
                            Phase::Layout,
                            Some(instr.source.clone()),
                            format!("instruction leaves the world at {cell:?}"),
                        );
                        failed = true;
                        break;
                    };
                    let linear = coords::linear_index(&canon, &opts.shape);
                    // Overlapping writes are a layout error, not a silent
                    // last-write-wins.
                    if !used.insert(linear) {
                        diags.report(
                            Phase::Layout,
                            Some(instr.source.clone()),
                            format!("overlapping layout at {canon:?}"),
                        );
                        failed = true;
                    }
                    layout.coords.push(canon);
                }
                pos = coords::scaled_add(&pos, &dv, length);
            }
        }
    }

    if failed { None } else { Some(layout) }
}
