//! Per-token classification map for external debuggers: one flat entry
//! list plus a file → line → column lookup.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ast::AstNode;
use crate::diag::SourceInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMapEntry {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub kind: String,
}

pub type TokenLookup = FxHashMap<String, FxHashMap<u32, FxHashMap<u32, String>>>;

pub fn generate(program: &[AstNode]) -> (Vec<TokenMapEntry>, TokenLookup) {
    let mut entries = Vec::new();
    walk(program, &mut entries);

    let mut lookup: TokenLookup = FxHashMap::default();
    for e in &entries {
        lookup
            .entry(e.file.clone())
            .or_default()
            .entry(e.line)
            .or_default()
            .insert(e.column, e.kind.clone());
    }
    (entries, lookup)
}

fn push(entries: &mut Vec<TokenMapEntry>, source: &SourceInfo, length: usize, kind: &str) {
    entries.push(TokenMapEntry {
        file: source.file.to_string(),
        line: source.line,
        column: source.column,
        length: length as u32,
        kind: kind.to_string(),
    });
}

fn vector_text_len(components: &[i64]) -> usize {
    let digits: usize = components.iter().map(|c| c.to_string().len()).sum();
    digits + components.len() - 1
}

fn classify_operand(node: &AstNode, entries: &mut Vec<TokenMapEntry>) {
    match node {
        AstNode::RegisterRef { name, source } => push(entries, source, name.len(), "register"),
        AstNode::IdentifierRef { name, source } => push(entries, source, name.len(), "identifier"),
        AstNode::NumberLit { value, source } => {
            push(entries, source, value.to_string().len(), "literal")
        }
        AstNode::TypedLit { molecule, source } => {
            let len = molecule.kind.name().len() + 1 + molecule.value.to_string().len();
            push(entries, source, len, "literal");
        }
        AstNode::VectorLit { components, source } => {
            push(entries, source, vector_text_len(components), "literal")
        }
        _ => {}
    }
}

fn walk(nodes: &[AstNode], entries: &mut Vec<TokenMapEntry>) {
    for node in nodes {
        match node {
            AstNode::Instruction {
                mnemonic,
                args,
                with_args,
                source,
            } => {
                push(entries, source, mnemonic.len(), "instruction");
                for arg in args.iter().chain(with_args) {
                    classify_operand(arg, entries);
                }
            }
            AstNode::LabelDef { name, source } => push(entries, source, name.len(), "label"),
            AstNode::Procedure { body, source, .. } => {
                push(entries, source, ".PROC".len(), "directive");
                walk(body, entries);
            }
            AstNode::Scope { body, source, .. } => {
                push(entries, source, ".SCOPE".len(), "directive");
                walk(body, entries);
            }
            AstNode::Org { source, .. } => push(entries, source, ".ORG".len(), "directive"),
            AstNode::Dir { source, .. } => push(entries, source, ".DIR".len(), "directive"),
            AstNode::Place { source, .. } => push(entries, source, ".PLACE".len(), "directive"),
            AstNode::Define { source, .. } => push(entries, source, ".DEFINE".len(), "directive"),
            AstNode::RegAlias {
                proc_local, source, ..
            } => {
                let text = if *proc_local { ".PREG" } else { ".REG" };
                push(entries, source, text.len(), "directive");
            }
            AstNode::Export { source, .. } => push(entries, source, ".EXPORT".len(), "directive"),
            AstNode::Library { body, source, .. } => {
                push(entries, source, ".REQUIRE".len(), "directive");
                walk(body, entries);
            }
            AstNode::ImportAlias { source, .. } => push(entries, source, ".IMPORT".len(), "directive"),
            _ => {}
        }
    }
}
