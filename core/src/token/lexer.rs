use std::sync::Arc;

use crate::diag::{Diagnostics, Phase, SourceInfo};
use crate::world::MoleculeKind;

use super::{Token, TokenKind};

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Identifiers may contain dots so that namespaced names (`LIB.PROC`)
/// lex as one token.
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Character-walking tokenizer. Line endings are normalized to LF before
/// scanning, so the reported 1-based line/column always index into the
/// normalized source. Lexical errors are reported and scanning recovers at
/// the next newline.
pub struct Lexer<'a> {
    chars: Vec<char>,
    idx: usize,
    len: usize,
    line: u32,
    column: u32,
    file: Arc<str>,
    diags: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn tokenize(file: &str, source: &str, diags: &'a mut Diagnostics) -> Vec<Token> {
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        let chars: Vec<char> = normalized.chars().collect();
        let mut lexer = Lexer {
            len: chars.len(),
            chars,
            idx: 0,
            line: 1,
            column: 1,
            file: Arc::from(file),
            diags,
        };
        lexer.run()
    }

    fn eof(&self) -> bool {
        self.idx >= self.len
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.idx];
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn here(&self) -> SourceInfo {
        SourceInfo::new(self.file.clone(), self.line, self.column)
    }

    fn error_and_recover(&mut self, message: String) {
        let source = self.here();
        self.diags.report(Phase::Lex, Some(source), message);
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(self.len / 4);
        while !self.eof() {
            let c = self.peek().unwrap();
            match c {
                ' ' | '\t' => {
                    self.advance();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '\n' => {
                    let source = self.here();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        text: "\n".to_string(),
                        source,
                    });
                }
                '.' => {
                    if self.peek_at(1).is_some_and(is_ident_start) {
                        tokens.push(self.lex_directive());
                    } else {
                        self.error_and_recover(format!("unexpected character '{c}'"));
                    }
                }
                '%' => tokens.push(self.lex_register()),
                '"' => {
                    if let Some(tok) = self.lex_string() {
                        tokens.push(tok);
                    }
                }
                ':' => {
                    let source = self.here();
                    self.advance();
                    tokens.push(Token {
                        kind: TokenKind::Colon,
                        text: ":".to_string(),
                        source,
                    });
                }
                '-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    if let Some(tok) = self.lex_number_or_vector() {
                        tokens.push(tok);
                    }
                }
                c if c.is_ascii_digit() => {
                    if let Some(tok) = self.lex_number_or_vector() {
                        tokens.push(tok);
                    }
                }
                c if is_ident_start(c) => tokens.push(self.lex_word()),
                other => {
                    self.error_and_recover(format!("unexpected character '{other}'"));
                }
            }
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            source: self.here(),
        });
        tokens
    }

    fn lex_directive(&mut self) -> Token {
        let source = self.here();
        let mut text = String::new();
        text.push(self.advance()); // '.'
        while self.peek().is_some_and(is_ident_continue) {
            text.push(self.advance());
        }
        Token {
            kind: TokenKind::Directive,
            text,
            source,
        }
    }

    fn lex_register(&mut self) -> Token {
        let source = self.here();
        let mut text = String::new();
        text.push(self.advance()); // '%'
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            text.push(self.advance());
        }
        Token {
            kind: TokenKind::Register,
            text,
            source,
        }
    }

    fn lex_string(&mut self) -> Option<Token> {
        let source = self.here();
        let mut text = String::new();
        text.push(self.advance()); // opening quote
        let mut content = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diags
                        .report(Phase::Lex, Some(source), "unterminated string literal");
                    return None;
                }
                Some('"') => {
                    text.push(self.advance());
                    break;
                }
                Some(_) => {
                    let c = self.advance();
                    text.push(c);
                    content.push(c);
                }
            }
        }
        Some(Token {
            kind: TokenKind::Str(content),
            text,
            source,
        })
    }

    /// Scan digits (with optional leading minus) into `text`; returns the
    /// parsed value.
    fn scan_int(&mut self, text: &mut String) -> Option<i64> {
        let start = text.len();
        if self.peek() == Some('-') {
            text.push(self.advance());
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance());
        }
        match text[start..].parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                let source = self.here();
                self.diags.report(
                    Phase::Lex,
                    Some(source),
                    format!("invalid number '{}'", &text[start..]),
                );
                None
            }
        }
    }

    fn lex_number_or_vector(&mut self) -> Option<Token> {
        let source = self.here();
        let mut text = String::new();
        let first = self.scan_int(&mut text)?;
        if self.peek() != Some('|') {
            return Some(Token {
                kind: TokenKind::Number(first),
                text,
                source,
            });
        }
        let mut components = vec![first];
        while self.peek() == Some('|') {
            text.push(self.advance());
            let starts_component = self.peek().is_some_and(|c| {
                c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            });
            if !starts_component {
                self.error_and_recover("vector literal missing a component".to_string());
                return None;
            }
            components.push(self.scan_int(&mut text)?);
        }
        Some(Token {
            kind: TokenKind::VectorLiteral(components),
            text,
            source,
        })
    }

    /// Identifier, or a typed literal when the word names a molecule kind
    /// immediately followed by `:value`.
    fn lex_word(&mut self) -> Token {
        let source = self.here();
        let mut text = String::new();
        while self.peek().is_some_and(is_ident_continue) {
            text.push(self.advance());
        }
        if let Some(kind) = MoleculeKind::parse(&text)
            && self.peek() == Some(':')
            && self.peek_at(1).is_some_and(|c| {
                c.is_ascii_digit() || (c == '-' && self.peek_at(2).is_some_and(|d| d.is_ascii_digit()))
            })
        {
            text.push(self.advance()); // ':'
            if let Some(value) = self.scan_int(&mut text) {
                return Token {
                    kind: TokenKind::TypedLiteral(kind, value),
                    text,
                    source,
                };
            }
        }
        Token {
            kind: TokenKind::Identifier,
            text,
            source,
        }
    }
}
