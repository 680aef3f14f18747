use super::*;
use crate::ast;
use crate::compiler::CompileOptions;
use crate::diag::{Diagnostics, SourceCache};
use crate::preproc::{FileResolver, MemoryResolver, Preprocessor};
use crate::sema;
use crate::token::Lexer;

fn lower(source: &str) -> IrProgram {
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
    let nodes = ast::parse(&resolver, &mut sources, &mut diags, tokens);
    let opts = CompileOptions::new(vec![64, 64], true);
    let analysis = sema::analyze(&nodes, &opts, &mut diags);
    assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    let ir = generate(&nodes, &analysis, &mut diags);
    assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    ir
}

fn mnemonics(ir: &IrProgram) -> Vec<&'static str> {
    ir.items
        .iter()
        .filter_map(|item| match item {
            IrItem::Instr(i) => Some(i.mnemonic),
            _ => None,
        })
        .collect()
}

#[test]
fn test_simple_instruction_lowering() {
    let ir = lower("SETI %DR0 DATA:41\n");
    let IrItem::Instr(instr) = &ir.items[0] else {
        panic!();
    };
    assert_eq!(instr.mnemonic, "SETI");
    assert_eq!(instr.operands[0], IrOperand::Reg(0));
    assert_eq!(instr.operands[1], IrOperand::Imm(crate::world::Molecule::data(41)));
    assert!(instr.bindings.is_none());
}

#[test]
fn test_call_with_lowers_to_push_call_pop() {
    let ir = lower(
        "CALL INC WITH %DR0\nDONE:\nJMPI DONE\n.PROC INC WITH VALUE\nADDI VALUE DATA:1\nRET\n.ENDP\n",
    );
    // Main flow: PUSH %DR0, CALL, POP %DR0, JMPI.
    assert_eq!(
        mnemonics(&ir)[..4],
        ["PUSH", "CALL", "POP", "JMPI"]
    );
    let IrItem::Instr(call) = &ir.items[1] else {
        panic!();
    };
    assert_eq!(call.mnemonic, "CALL");
    assert_eq!(call.operands[0], IrOperand::LabelRef("INC".to_string()));
    assert_eq!(call.bindings, Some(vec![0]));
}

#[test]
fn test_procedure_prologue_and_epilogue() {
    use crate::organism::FPR_BASE;
    let ir = lower(
        "DONE:\nJMPI DONE\n.PROC SWAP2 WITH A B\nRET\n.ENDP\n",
    );
    // After the main JMPI: label, POP FPR1, POP FPR0 (reverse), then the
    // epilogue PUSH FPR0, PUSH FPR1 before RET.
    assert_eq!(
        mnemonics(&ir),
        ["JMPI", "POP", "POP", "PUSH", "PUSH", "RET"]
    );
    let ops: Vec<_> = ir
        .items
        .iter()
        .filter_map(|item| match item {
            IrItem::Instr(i) if i.mnemonic == "POP" => Some(i.operands[0].clone()),
            _ => None,
        })
        .collect();
    assert_eq!(ops, vec![IrOperand::Reg(FPR_BASE + 1), IrOperand::Reg(FPR_BASE)]);
    let pushes: Vec<_> = ir
        .items
        .iter()
        .filter_map(|item| match item {
            IrItem::Instr(i) if i.mnemonic == "PUSH" => Some(i.operands[0].clone()),
            _ => None,
        })
        .collect();
    assert_eq!(pushes, vec![IrOperand::Reg(FPR_BASE), IrOperand::Reg(FPR_BASE + 1)]);
}

#[test]
fn test_labels_are_qualified_by_scope() {
    let ir = lower(".SCOPE OUTER\nL:\nJMPI L\n.ENDS\n");
    assert!(ir.items.iter().any(|item| matches!(
        item,
        IrItem::Label(name) if name == "OUTER.L"
    )));
    let IrItem::Instr(jmp) = ir
        .items
        .iter()
        .find(|i| matches!(i, IrItem::Instr(x) if x.mnemonic == "JMPI"))
        .unwrap()
    else {
        panic!();
    };
    assert_eq!(jmp.operands[0], IrOperand::LabelRef("OUTER.L".to_string()));
}

#[test]
fn test_constants_substitute_into_operands() {
    let ir = lower(".DEFINE AMOUNT ENERGY:9\n.DEFINE STEP 0|1\nSETI %DR0 AMOUNT\nADDDP STEP\n");
    let IrItem::Instr(seti) = &ir.items[0] else {
        panic!();
    };
    assert_eq!(seti.operands[1], IrOperand::Imm(crate::world::Molecule::energy(9)));
    let IrItem::Instr(adddp) = &ir.items[1] else {
        panic!();
    };
    assert_eq!(adddp.operands[0], IrOperand::Vector(vec![0, 1]));
}

#[test]
fn test_directives_pass_through() {
    let ir = lower(".ORG 5|5\n.DIR 0|1\n.PLACE STRUCTURE:1 7|7 8|8\nNOP\n");
    assert!(matches!(&ir.items[0], IrItem::Org(v) if v == &vec![5, 5]));
    assert!(matches!(&ir.items[1], IrItem::Dir(v) if v == &vec![0, 1]));
    let places: Vec<_> = ir
        .items
        .iter()
        .filter(|i| matches!(i, IrItem::Place { .. }))
        .collect();
    assert_eq!(places.len(), 2);
}

#[test]
fn test_library_procs_lower_under_namespace() {
    let mut resolver = MemoryResolver::new();
    resolver.insert(
        "main.evo",
        ".REQUIRE \"lib.evo\" AS LIB\nCALL LIB.INC WITH %DR0\nDONE:\nJMPI DONE\n",
    );
    resolver.insert(
        "lib.evo",
        ".EXPORT INC\n.PROC INC WITH VALUE\nADDI VALUE DATA:1\nRET\n.ENDP\n",
    );
    let mut diags = Diagnostics::new();
    let mut sources = SourceCache::new();
    let (id, content) = resolver.read(None, "main.evo").unwrap();
    let tokens = Lexer::tokenize(&id, &content, &mut diags);
    sources.insert(tokens[0].source.file.clone(), &content);
    let tokens = {
        let mut pre = Preprocessor::new(&resolver, &mut sources, &mut diags);
        pre.mark_included(&id);
        pre.process(tokens)
    };
    let nodes = ast::parse(&resolver, &mut sources, &mut diags, tokens);
    let opts = CompileOptions::new(vec![64, 64], true);
    let analysis = sema::analyze(&nodes, &opts, &mut diags);
    assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    let ir = generate(&nodes, &analysis, &mut diags);
    assert!(diags.is_empty());

    assert!(ir.items.iter().any(|item| matches!(
        item,
        IrItem::Label(name) if name == "LIB.INC"
    )));
    let IrItem::Instr(call) = ir
        .items
        .iter()
        .find(|i| matches!(i, IrItem::Instr(x) if x.mnemonic == "CALL"))
        .unwrap()
    else {
        panic!();
    };
    assert_eq!(call.operands[0], IrOperand::LabelRef("LIB.INC".to_string()));
}
