use super::*;
use crate::compiler::CompileOptions;
use crate::diag::{Diagnostics, SourceCache};
use crate::ir::{self, IrProgram};
use crate::preproc::{FileResolver, MemoryResolver, Preprocessor};
use crate::sema;
use crate::token::Lexer;

fn build_ir(source: &str, opts: &CompileOptions) -> IrProgram {
    let mut resolver = MemoryResolver::new();
    resolver.insert("test.evo", source);
    let mut diags = Diagnostics::new();
    let mut sources = SourceCache::new();
    let (id, content) = resolver.read(None, "test.evo").unwrap();
    let tokens = Lexer::tokenize(&id, &content, &mut diags);
    sources.insert(tokens[0].source.file.clone(), &content);
    let tokens = {
        let mut pre = Preprocessor::new(&resolver, &mut sources, &mut diags);
        pre.mark_included(&id);
        pre.process(tokens)
    };
    let nodes = crate::ast::parse(&resolver, &mut sources, &mut diags, tokens);
    let analysis = sema::analyze(&nodes, opts, &mut diags);
    let ir = ir::generate(&nodes, &analysis, &mut diags);
    assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    ir
}

fn layout_of(source: &str) -> Layout {
    let opts = CompileOptions::new(vec![32, 32], true);
    let ir = build_ir(source, &opts);
    let mut diags = Diagnostics::new();
    lay_out(&ir, &opts, &mut diags).expect("layout succeeds")
}

#[test]
fn test_sequential_layout_along_default_direction() {
    // SETI = opcode + register + immediate = 3 cells along +x.
    let layout = layout_of("SETI %DR0 DATA:1\nNOP\n");
    assert_eq!(layout.coords.len(), 4);
    assert_eq!(layout.coords[0], vec![0, 0]);
    assert_eq!(layout.coords[1], vec![1, 0]);
    assert_eq!(layout.coords[2], vec![2, 0]);
    assert_eq!(layout.coords[3], vec![3, 0]);
}

#[test]
fn test_org_and_dir_steer_the_cursor() {
    let layout = layout_of(".ORG 5|5\n.DIR 0|1\nNOP\nNOP\n");
    assert_eq!(layout.coords[0], vec![5, 5]);
    assert_eq!(layout.coords[1], vec![5, 6]);
}

#[test]
fn test_label_records_address_and_coordinate() {
    let layout = layout_of("NOP\nL:\nNOP\nJMPI L\n");
    let info = layout.labels.get("L").expect("label recorded");
    assert_eq!(info.addr, 1);
    assert_eq!(info.coord, vec![1, 0]);
}

#[test]
fn test_label_operands_scale_with_dimensionality() {
    // JMPI carries one delta word per dimension: 1 + 2 = 3 cells in 2-d.
    let layout = layout_of("L:\nJMPI L\n");
    assert_eq!(layout.coords.len(), 3);

    let opts3 = CompileOptions::new(vec![8, 8, 8], true);
    let ir = build_ir("L:\nJMPI L\n", &opts3);
    let mut diags = Diagnostics::new();
    let layout3 = lay_out(&ir, &opts3, &mut diags).unwrap();
    assert_eq!(layout3.coords.len(), 4);
}

#[test]
fn test_place_records_world_object_without_advancing() {
    let layout = layout_of("NOP\n.PLACE STRUCTURE:3 9|9\nNOP\n");
    assert_eq!(layout.places, vec![(vec![9, 9], crate::world::Molecule::structure(3))]);
    assert_eq!(layout.coords[1], vec![1, 0]);
}

#[test]
fn test_layout_wraps_on_toroidal_worlds() {
    let layout = layout_of(".ORG 31|0\nNOP\nNOP\n");
    assert_eq!(layout.coords[0], vec![31, 0]);
    assert_eq!(layout.coords[1], vec![0, 0]);
}

#[test]
fn test_overlap_is_a_diagnostic() {
    let opts = CompileOptions::new(vec![32, 32], true);
    let ir = build_ir("NOP\nNOP\n.ORG 0|0\nNOP\n", &opts);
    let mut diags = Diagnostics::new();
    assert!(lay_out(&ir, &opts, &mut diags).is_none());
    assert!(diags.iter().any(|d| d.message.contains("overlapping")));
}

#[test]
fn test_bounded_world_overflow_is_a_diagnostic() {
    let opts = CompileOptions::new(vec![4, 4], false);
    let ir = build_ir(".ORG 3|0\nSETI %DR0 DATA:1\n", &opts);
    let mut diags = Diagnostics::new();
    assert!(lay_out(&ir, &opts, &mut diags).is_none());
    assert!(diags.iter().any(|d| d.message.contains("leaves the world")));
}

#[test]
fn test_layout_is_deterministic() {
    let source = ".ORG 3|3\nLOOP:\nADDI %DR0 DATA:1\nJMPI LOOP\n.PLACE ENERGY:5 1|1\n";
    let a = layout_of(source);
    let b = layout_of(source);
    assert_eq!(a.coords, b.coords);
    assert_eq!(a.places, b.places);
    assert_eq!(
        a.labels.get("LOOP").map(|l| (l.addr, l.coord.clone())),
        b.labels.get("LOOP").map(|l| (l.addr, l.coord.clone()))
    );
}
