//! Abstract syntax tree of an assembly compilation unit.

use crate::diag::SourceInfo;
use crate::world::Molecule;

mod directives;
pub mod parser;

pub use parser::parse;


/// Names are canonicalized to upper case at parse time; the surface is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Instruction {
        mnemonic: String,
        args: Vec<AstNode>,
        /// Caller registers following `WITH` on a CALL line.
        with_args: Vec<AstNode>,
        source: SourceInfo,
    },
    LabelDef {
        name: String,
        source: SourceInfo,
    },
    RegisterRef {
        /// Includes the leading `%`.
        name: String,
        source: SourceInfo,
    },
    IdentifierRef {
        name: String,
        source: SourceInfo,
    },
    NumberLit {
        value: i64,
        source: SourceInfo,
    },
    TypedLit {
        molecule: Molecule,
        source: SourceInfo,
    },
    VectorLit {
        components: Vec<i64>,
        source: SourceInfo,
    },
    Procedure {
        name: String,
        params: Vec<String>,
        body: Vec<AstNode>,
        source: SourceInfo,
    },
    Scope {
        name: String,
        body: Vec<AstNode>,
        source: SourceInfo,
    },
    Org {
        coord: Vec<i64>,
        source: SourceInfo,
    },
    Dir {
        vector: Vec<i64>,
        source: SourceInfo,
    },
    Place {
        molecule: Molecule,
        coords: Vec<Vec<i64>>,
        source: SourceInfo,
    },
    Define {
        name: String,
        value: Box<AstNode>,
        source: SourceInfo,
    },
    RegAlias {
        /// Includes the leading `%`.
        alias: String,
        target: String,
        proc_local: bool,
        source: SourceInfo,
    },
    Export {
        name: String,
        source: SourceInfo,
    },
    /// Body of a file pulled in by `.REQUIRE "path" AS NS`.
    Library {
        ns: String,
        body: Vec<AstNode>,
        source: SourceInfo,
    },
    /// `.IMPORT NS.PROC AS NAME`.
    ImportAlias {
        qualified: String,
        alias: String,
        source: SourceInfo,
    },
}

impl AstNode {
    pub fn source(&self) -> &SourceInfo {
        match self {
            AstNode::Instruction { source, .. }
            | AstNode::LabelDef { source, .. }
            | AstNode::RegisterRef { source, .. }
            | AstNode::IdentifierRef { source, .. }
            | AstNode::NumberLit { source, .. }
            | AstNode::TypedLit { source, .. }
            | AstNode::VectorLit { source, .. }
            | AstNode::Procedure { source, .. }
            | AstNode::Scope { source, .. }
            | AstNode::Org { source, .. }
            | AstNode::Dir { source, .. }
            | AstNode::Place { source, .. }
            | AstNode::Define { source, .. }
            | AstNode::RegAlias { source, .. }
            | AstNode::Export { source, .. }
            | AstNode::Library { source, .. }
            | AstNode::ImportAlias { source, .. } => source,
        }
    }
}
