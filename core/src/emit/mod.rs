//! The emitter: pack linked instructions into machine words and assemble
//! the final artifact.

use rustc_hash::FxHashMap;

use crate::diag::{Diagnostics, Phase, SourceCache};
use crate::ir::IrOperand;
use crate::link::LinkedProgram;
use crate::sema::Analysis;
use crate::world::Molecule;

mod artifact;
pub use artifact::{ArtifactInterchange, ProgramArtifact, SourceMapEntry, hash_layout};

#[cfg(test)]
mod emit_test;

pub fn emit(
    linked: &LinkedProgram,
    analysis: &Analysis,
    sources: &SourceCache,
    diags: &mut Diagnostics,
) -> Option<ProgramArtifact> {
    let mut words = vec![0i64; linked.layout.coords.len()];

    for instr in &linked.instrs {
        let mut cursor = instr.addr;
        words[cursor] = Molecule::code(instr.opcode as i64).to_word();
        cursor += 1;
        for op in &instr.operands {
            match op {
                IrOperand::Reg(id) | IrOperand::Loc(id) => {
                    words[cursor] = Molecule::code(*id as i64).to_word();
                    cursor += 1;
                }
                IrOperand::Imm(m) => {
                    words[cursor] = m.to_word();
                    cursor += 1;
                }
                IrOperand::Vector(components) => {
                    for &c in components {
                        words[cursor] = Molecule::code(c).to_word();
                        cursor += 1;
                    }
                }
                IrOperand::LabelRef(name) => {
                    diags.report(
                        Phase::Emit,
                        Some(instr.source.clone()),
                        format!("unlinked label '{name}' reached the emitter"),
                    );
                    return None;
                }
            }
        }
    }

    let machine_code_layout: FxHashMap<Vec<i64>, i64> = linked
        .layout
        .coords
        .iter()
        .cloned()
        .zip(words.iter().copied())
        .collect();

    let mut source_map = FxHashMap::default();
    for instr in &linked.instrs {
        let line_text = sources
            .line(&instr.source.file, instr.source.line)
            .unwrap_or("")
            .to_string();
        source_map.insert(
            instr.addr,
            SourceMapEntry {
                file: instr.source.file.to_string(),
                line: instr.source.line,
                column: instr.source.column,
                line_text,
            },
        );
    }

    let coord_to_linear_address: FxHashMap<Vec<i64>, usize> = linked
        .layout
        .coords
        .iter()
        .enumerate()
        .map(|(addr, c)| (c.clone(), addr))
        .collect();

    let label_address_to_name: FxHashMap<usize, String> = linked
        .layout
        .labels
        .iter()
        .map(|(name, info)| (info.addr, name.clone()))
        .collect();

    let initial_world_objects: FxHashMap<Vec<i64>, Molecule> =
        linked.layout.places.iter().cloned().collect();

    let program_id = hash_layout(&machine_code_layout);

    Some(ProgramArtifact {
        program_id,
        machine_code_layout,
        initial_world_objects,
        source_map,
        call_site_bindings: linked.call_site_bindings.clone(),
        linear_address_to_coord: linked.layout.coords.clone(),
        coord_to_linear_address,
        label_address_to_name,
        register_alias_map: analysis.register_alias_map.clone(),
        proc_name_to_param_names: analysis.proc_name_to_param_names.clone(),
        token_map: analysis.token_map.clone(),
        token_lookup: analysis.token_lookup.clone(),
    })
}
