use rustc_hash::FxHashMap;

use super::*;
use crate::compiler::{self, CompileOptions};
use crate::isa;
use crate::world::{Molecule, MoleculeKind};

fn opts() -> CompileOptions {
    CompileOptions::new(vec![32, 32], true)
}

fn compile(source: &str) -> ProgramArtifact {
    compiler::compile_source(source, "test.evo", &opts()).expect("compiles")
}

#[test]
fn test_word_packing() {
    let artifact = compile("SETI %DR3 DATA:41\n");
    let seti = isa::registry().lookup("SETI").unwrap().id as i64;
    let word_at = |c: &[i64]| Molecule::from_word(artifact.machine_code_layout[&c.to_vec()]);
    assert_eq!(word_at(&[0, 0]), Molecule::code(seti));
    assert_eq!(word_at(&[1, 0]), Molecule::code(3));
    assert_eq!(word_at(&[2, 0]), Molecule::new(MoleculeKind::Data, 41));
}

#[test]
fn test_label_delta_emitted_as_code_words() {
    // JMPI to itself: delta [0,0] packed as two CODE:0 words after the
    // opcode.
    let artifact = compile("L:\nJMPI L\n");
    let word_at = |c: &[i64]| Molecule::from_word(artifact.machine_code_layout[&c.to_vec()]);
    assert_eq!(word_at(&[1, 0]), Molecule::code(0));
    assert_eq!(word_at(&[2, 0]), Molecule::code(0));
}

#[test]
fn test_layout_and_address_tables_agree_pointwise() {
    let artifact = compile("SETI %DR0 DATA:1\nLOOP:\nADDI %DR0 DATA:1\nJMPI LOOP\n");
    for (addr, coord) in artifact.linear_address_to_coord.iter().enumerate() {
        assert!(artifact.machine_code_layout.contains_key(coord));
        assert_eq!(artifact.coord_to_linear_address[coord], addr);
    }
    assert_eq!(
        artifact.machine_code_layout.len(),
        artifact.linear_address_to_coord.len()
    );
}

#[test]
fn test_program_id_is_order_independent() {
    let mut forward: FxHashMap<Vec<i64>, i64> = FxHashMap::default();
    let mut reverse: FxHashMap<Vec<i64>, i64> = FxHashMap::default();
    let entries = [
        (vec![0i64, 0], 7i64),
        (vec![1, 0], 8),
        (vec![2, 0], 9),
        (vec![5, 5], -1),
    ];
    for (c, w) in &entries {
        forward.insert(c.clone(), *w);
    }
    for (c, w) in entries.iter().rev() {
        reverse.insert(c.clone(), *w);
    }
    assert_eq!(hash_layout(&forward), hash_layout(&reverse));

    let mut changed = forward.clone();
    changed.insert(vec![5, 5], -2);
    assert_ne!(hash_layout(&forward), hash_layout(&changed));
}

#[test]
fn test_program_id_is_stable_across_compilations() {
    let source = "LOOP:\nADDI %DR0 DATA:1\nJMPI LOOP\n";
    let a = compile(source);
    let b = compile(source);
    assert_eq!(a.program_id, b.program_id);

    let c = compile("LOOP:\nADDI %DR0 DATA:2\nJMPI LOOP\n");
    assert_ne!(a.program_id, c.program_id);
}

#[test]
fn test_source_map_carries_line_text() {
    let artifact = compile("NOP\nSETI %DR0 DATA:5\n");
    // The SETI instruction starts at address 1.
    let entry = artifact.source_map.get(&1).expect("source map entry");
    assert_eq!(entry.file, "test.evo");
    assert_eq!(entry.line, 2);
    assert_eq!(entry.line_text, "SETI %DR0 DATA:5");
}

#[test]
fn test_label_addresses_named() {
    let artifact = compile("NOP\nLOOP:\nJMPI LOOP\n");
    assert_eq!(
        artifact.label_address_to_name.get(&1).map(String::as_str),
        Some("LOOP")
    );
}

#[test]
fn test_initial_world_objects() {
    let artifact = compile(".PLACE STRUCTURE:2 9|9\nNOP\n");
    assert_eq!(
        artifact.initial_world_objects.get(&vec![9, 9]),
        Some(&Molecule::structure(2))
    );
}

#[test]
fn test_interchange_round_trip() {
    let source = "SETI %DR0 DATA:1\nCALL INC WITH %DR0\nDONE:\nJMPI DONE\n.PROC INC WITH VALUE\nADDI VALUE DATA:1\nRET\n.ENDP\n.PLACE ENERGY:5 9|9\n";
    let artifact = compile(source);
    let interchange = artifact.to_interchange(&[32, 32]);

    let json = serde_json::to_string(&interchange).unwrap();
    let parsed: ArtifactInterchange = serde_json::from_str(&json).unwrap();
    let restored = ProgramArtifact::from_interchange(&parsed);

    assert_eq!(restored.program_id, artifact.program_id);
    assert_eq!(restored.machine_code_layout, artifact.machine_code_layout);
    assert_eq!(restored.initial_world_objects, artifact.initial_world_objects);
    assert_eq!(restored.call_site_bindings, artifact.call_site_bindings);
    assert_eq!(restored.linear_address_to_coord, artifact.linear_address_to_coord);
    assert_eq!(restored.coord_to_linear_address, artifact.coord_to_linear_address);
    assert_eq!(restored.source_map, artifact.source_map);
    assert_eq!(restored.proc_name_to_param_names, artifact.proc_name_to_param_names);
}

#[test]
fn test_call_site_bindings_in_artifact() {
    let artifact = compile(
        "CALL INC WITH %DR2\nDONE:\nJMPI DONE\n.PROC INC WITH VALUE\nADDI VALUE DATA:1\nRET\n.ENDP\n",
    );
    // Lowering prefixes the CALL with one PUSH (2 cells), so the CALL
    // opcode sits at address 2.
    assert_eq!(artifact.call_site_bindings.get(&2), Some(&vec![2]));
    assert_eq!(
        artifact.proc_name_to_param_names.get("INC"),
        Some(&vec!["VALUE".to_string()])
    );
}
