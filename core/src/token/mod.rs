//! Lexical tokens of the assembly surface.

use crate::diag::SourceInfo;
use crate::world::MoleculeKind;

mod lexer;
pub use lexer::Lexer;

#[cfg(test)]
mod lexer_test;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `.NAME` — text keeps the leading dot.
    Directive,
    Identifier,
    /// `%DR0`, `%COUNTER` — text keeps the leading percent sign.
    Register,
    Number(i64),
    /// Quoted string; the unquoted content is carried in the kind.
    Str(String),
    /// `KIND:value`, e.g. `DATA:41`.
    TypedLiteral(MoleculeKind, i64),
    /// `a|b|…` — one component per world dimension.
    VectorLiteral(Vec<i64>),
    Colon,
    Newline,
    Eof,
}

/// One lexeme with its origin. `text` is the raw source slice, so
/// `line[column-1..column-1+text.len()] == text` holds for every token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub source: SourceInfo,
}

impl Token {
    pub fn is_directive(&self, name: &str) -> bool {
        self.kind == TokenKind::Directive && self.text.eq_ignore_ascii_case(name)
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(name)
    }

    /// Canonical (upper-case) spelling; the surface is case-insensitive.
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }
}
