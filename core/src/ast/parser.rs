//! Recursive-descent parser driven by a directive-handler registry. Parse
//! errors are accumulated and scanning recovers at the next newline.

use anyhow::{Result, anyhow};
use rustc_hash::FxHashSet;

use crate::diag::{Diagnostics, Phase, SourceCache};
use crate::preproc::FileResolver;
use crate::token::{Token, TokenKind};

use super::AstNode;
use super::directives::registry;

/// Shared, reborrowable parser context so `.REQUIRE` can spin up a nested
/// parser over the referenced library file.
pub struct ParseCtx<'a> {
    pub resolver: &'a dyn FileResolver,
    pub sources: &'a mut SourceCache,
    pub diags: &'a mut Diagnostics,
    /// Canonical ids of library files currently being parsed, for cycle
    /// detection.
    pub requires_in_flight: &'a mut FxHashSet<String>,
}

impl ParseCtx<'_> {
    pub fn reborrow(&mut self) -> ParseCtx<'_> {
        ParseCtx {
            resolver: self.resolver,
            sources: &mut *self.sources,
            diags: &mut *self.diags,
            requires_in_flight: &mut *self.requires_in_flight,
        }
    }
}

pub fn parse(
    resolver: &dyn FileResolver,
    sources: &mut SourceCache,
    diags: &mut Diagnostics,
    tokens: Vec<Token>,
) -> Vec<AstNode> {
    let mut in_flight = FxHashSet::default();
    let ctx = ParseCtx {
        resolver,
        sources,
        diags,
        requires_in_flight: &mut in_flight,
    };
    let mut parser = Parser::new(tokens, ctx);
    parser.parse_statements(&[])
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    pub ctx: ParseCtx<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, ctx: ParseCtx<'a>) -> Self {
        Self { tokens, pos: 0, ctx }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    pub fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof)
    }

    /// Consume the rest of the line including its newline.
    pub fn sync_to_newline(&mut self) {
        while !self.at_eof() {
            if self.advance().kind == TokenKind::Newline {
                return;
            }
        }
    }

    /// Consume an expected end-of-line; anything else is an error.
    pub fn expect_line_end(&mut self) -> Result<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(anyhow!("unexpected '{}' at end of line", self.peek().text)),
        }
    }

    pub fn expect_identifier(&mut self) -> Result<Token> {
        match self.peek().kind {
            TokenKind::Identifier => Ok(self.advance()),
            _ => Err(anyhow!("expected a name, found '{}'", self.peek().text)),
        }
    }

    pub fn expect_register(&mut self) -> Result<Token> {
        match self.peek().kind {
            TokenKind::Register => Ok(self.advance()),
            _ => Err(anyhow!("expected a register, found '{}'", self.peek().text)),
        }
    }

    pub fn expect_string(&mut self) -> Result<(String, Token)> {
        match &self.peek().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                Ok((s, self.advance()))
            }
            _ => Err(anyhow!("expected a quoted path, found '{}'", self.peek().text)),
        }
    }

    /// A vector argument: a vector literal, or a bare number standing in for
    /// a one-dimensional vector.
    pub fn expect_vector(&mut self) -> Result<Vec<i64>> {
        match &self.peek().kind {
            TokenKind::VectorLiteral(v) => {
                let v = v.clone();
                self.advance();
                Ok(v)
            }
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(vec![n])
            }
            _ => Err(anyhow!("expected a vector, found '{}'", self.peek().text)),
        }
    }

    /// Parse statements until EOF or one of the terminator directives
    /// (which is left unconsumed).
    pub fn parse_statements(&mut self, terminators: &[&str]) -> Vec<AstNode> {
        let mut nodes = Vec::new();
        loop {
            while self.peek().kind == TokenKind::Newline {
                self.advance();
            }
            if self.at_eof() {
                break;
            }
            if self.peek().kind == TokenKind::Directive
                && terminators.iter().any(|t| self.peek().is_directive(t))
            {
                break;
            }
            let source = self.peek().source.clone();
            match self.parse_statement() {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => {}
                Err(err) => {
                    self.ctx.diags.report(Phase::Parse, Some(source), err.to_string());
                    self.sync_to_newline();
                }
            }
        }
        nodes
    }

    fn parse_statement(&mut self) -> Result<Option<AstNode>> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Directive => {
                let name = token.upper();
                match registry().get(name.as_str()) {
                    Some(handler) => {
                        self.advance();
                        handler(self, token)
                    }
                    None => Err(anyhow!("unknown directive '{}'", token.text)),
                }
            }
            TokenKind::Identifier => {
                // `NAME:` defines a label; anything else is an instruction.
                if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Colon) {
                    self.advance();
                    self.advance();
                    return Ok(Some(AstNode::LabelDef {
                        name: token.upper(),
                        source: token.source,
                    }));
                }
                self.parse_instruction().map(Some)
            }
            _ => Err(anyhow!(
                "expected an instruction, label, or directive, found '{}'",
                token.text
            )),
        }
    }

    fn parse_instruction(&mut self) -> Result<AstNode> {
        let mnemonic_token = self.advance();
        let mut args = Vec::new();
        let mut with_args = Vec::new();
        let mut in_with = false;
        while !self.at_line_end() {
            if self.peek().is_identifier("WITH") {
                if in_with {
                    return Err(anyhow!("duplicate WITH clause"));
                }
                self.advance();
                in_with = true;
                continue;
            }
            let operand = self.parse_operand()?;
            if in_with {
                with_args.push(operand);
            } else {
                args.push(operand);
            }
        }
        self.expect_line_end()?;
        Ok(AstNode::Instruction {
            mnemonic: mnemonic_token.upper(),
            args,
            with_args,
            source: mnemonic_token.source,
        })
    }

    pub fn parse_operand(&mut self) -> Result<AstNode> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Register => {
                self.advance();
                Ok(AstNode::RegisterRef {
                    name: token.upper(),
                    source: token.source,
                })
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(AstNode::IdentifierRef {
                    name: token.upper(),
                    source: token.source,
                })
            }
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(AstNode::NumberLit {
                    value,
                    source: token.source,
                })
            }
            TokenKind::TypedLiteral(kind, value) => {
                let molecule = crate::world::Molecule::new(*kind, *value);
                self.advance();
                Ok(AstNode::TypedLit {
                    molecule,
                    source: token.source,
                })
            }
            TokenKind::VectorLiteral(components) => {
                let components = components.clone();
                self.advance();
                Ok(AstNode::VectorLit {
                    components,
                    source: token.source,
                })
            }
            _ => Err(anyhow!("unexpected operand '{}'", token.text)),
        }
    }
}
