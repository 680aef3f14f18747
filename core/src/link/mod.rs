//! The linker: resolve label references into coordinate deltas and collect
//! call-site bindings under their linear addresses.

use rustc_hash::FxHashMap;

use crate::compiler::CompileOptions;
use crate::diag::{Diagnostics, Phase, SourceInfo};
use crate::ir::{IrItem, IrOperand, IrProgram};
use crate::layout::Layout;
use crate::world::coords;


#[derive(Debug, Clone)]
pub struct LinkedInstruction {
    pub opcode: u16,
    pub mnemonic: &'static str,
    /// Linear address of the opcode word.
    pub addr: usize,
    /// Coordinate of the opcode word.
    pub coord: Vec<i64>,
    /// Label references replaced by shortest-delta vectors.
    pub operands: Vec<IrOperand>,
    pub source: SourceInfo,
}

#[derive(Debug)]
pub struct LinkedProgram {
    pub instrs: Vec<LinkedInstruction>,
    pub call_site_bindings: FxHashMap<usize, Vec<u16>>,
    pub layout: Layout,
}

pub fn link(
    ir: &IrProgram,
    layout: Layout,
    opts: &CompileOptions,
    diags: &mut Diagnostics,
) -> Option<LinkedProgram> {
    let mut instrs = Vec::with_capacity(layout.instr_addrs.len());
    let mut call_site_bindings = FxHashMap::default();
    let mut failed = false;

    for &(item_index, addr) in &layout.instr_addrs {
        let IrItem::Instr(instr) = &ir.items[item_index] else {
            continue;
        };
        let coord = layout.coords[addr].clone();

        let mut operands = Vec::with_capacity(instr.operands.len());
        for op in &instr.operands {
            match op {
                IrOperand::LabelRef(name) => match layout.labels.get(name) {
                    Some(info) => {
                        // Delta from the opcode cell, reduced per component
                        // to the shortest signed distance on a torus.
                        let delta = coords::shortest_delta(
                            &coord,
                            &info.coord,
                            &opts.shape,
                            opts.toroidal,
                        );
                        operands.push(IrOperand::Vector(delta));
                    }
                    None => {
                        diags.report(
                            Phase::Link,
                            Some(instr.source.clone()),
                            format!("unresolved label '{name}'"),
                        );
                        failed = true;
                    }
                },
                other => operands.push(other.clone()),
            }
        }

        if let Some(bindings) = &instr.bindings {
            call_site_bindings.insert(addr, bindings.clone());
        }

        instrs.push(LinkedInstruction {
            opcode: instr.opcode,
            mnemonic: instr.mnemonic,
            addr,
            coord,
            operands,
            source: instr.source.clone(),
        });
    }

    if failed {
        None
    } else {
        Some(LinkedProgram {
            instrs,
            call_site_bindings,
            layout,
        })
    }
}
