//! Directive handlers, dispatched from a single registry keyed on the
//! directive's canonical name.

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::preproc::Preprocessor;
use crate::token::{Lexer, Token, TokenKind};

use super::AstNode;
use super::parser::Parser;

pub(super) type Handler = for<'a, 'b> fn(&'b mut Parser<'a>, Token) -> Result<Option<AstNode>>;

static REGISTRY: Lazy<FxHashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut map: FxHashMap<&'static str, Handler> = FxHashMap::default();
    map.insert(".PROC", handle_proc);
    map.insert(".ENDP", handle_stray_end);
    map.insert(".SCOPE", handle_scope);
    map.insert(".ENDS", handle_stray_end);
    map.insert(".WITH", handle_stray_end);
    map.insert(".REG", handle_reg);
    map.insert(".PREG", handle_preg);
    map.insert(".DEFINE", handle_define);
    map.insert(".ORG", handle_org);
    map.insert(".DIR", handle_dir);
    map.insert(".PLACE", handle_place);
    map.insert(".EXPORT", handle_export);
    map.insert(".REQUIRE", handle_require);
    map.insert(".IMPORT", handle_import);
    map
});

pub(super) fn registry() -> &'static FxHashMap<&'static str, Handler> {
    &REGISTRY
}

fn expect_keyword(p: &mut Parser<'_>, word: &str) -> Result<()> {
    if p.peek().is_identifier(word) {
        p.advance();
        Ok(())
    } else {
        Err(anyhow!("expected '{word}', found '{}'", p.peek().text))
    }
}

fn handle_stray_end(_p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    Err(anyhow!("'{}' without a matching opening directive", token.text))
}

fn handle_proc(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let name = p.expect_identifier()?.upper();

    let mut params = Vec::new();
    if p.peek().is_identifier("WITH") || p.peek().is_directive(".WITH") {
        p.advance();
        while p.peek().kind == TokenKind::Identifier {
            params.push(p.advance().upper());
        }
        if params.is_empty() {
            return Err(anyhow!("WITH clause of .PROC {name} names no parameters"));
        }
    }
    p.expect_line_end()?;

    let body = p.parse_statements(&[".ENDP"]);
    if !p.peek().is_directive(".ENDP") {
        return Err(anyhow!(".PROC {name} has no matching .ENDP"));
    }
    p.advance();
    p.expect_line_end()?;

    Ok(Some(AstNode::Procedure {
        name,
        params,
        body,
        source: token.source,
    }))
}

fn handle_scope(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let name = p.expect_identifier()?.upper();
    p.expect_line_end()?;
    let body = p.parse_statements(&[".ENDS"]);
    if !p.peek().is_directive(".ENDS") {
        return Err(anyhow!(".SCOPE {name} has no matching .ENDS"));
    }
    p.advance();
    p.expect_line_end()?;
    Ok(Some(AstNode::Scope {
        name,
        body,
        source: token.source,
    }))
}

fn alias_node(p: &mut Parser<'_>, token: Token, proc_local: bool) -> Result<Option<AstNode>> {
    let alias = p.expect_register()?.upper();
    let target = p.expect_register()?.upper();
    p.expect_line_end()?;
    Ok(Some(AstNode::RegAlias {
        alias,
        target,
        proc_local,
        source: token.source,
    }))
}

fn handle_reg(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    alias_node(p, token, false)
}

fn handle_preg(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    alias_node(p, token, true)
}

fn handle_define(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let name = p.expect_identifier()?.upper();
    let value = p.parse_operand()?;
    if !matches!(
        value,
        AstNode::NumberLit { .. } | AstNode::TypedLit { .. } | AstNode::VectorLit { .. }
    ) {
        return Err(anyhow!(".DEFINE {name} needs a literal value"));
    }
    p.expect_line_end()?;
    Ok(Some(AstNode::Define {
        name,
        value: Box::new(value),
        source: token.source,
    }))
}

fn handle_org(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let coord = p.expect_vector()?;
    p.expect_line_end()?;
    Ok(Some(AstNode::Org {
        coord,
        source: token.source,
    }))
}

fn handle_dir(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let vector = p.expect_vector()?;
    p.expect_line_end()?;
    Ok(Some(AstNode::Dir {
        vector,
        source: token.source,
    }))
}

fn handle_place(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let molecule = match &p.peek().kind {
        TokenKind::TypedLiteral(kind, value) => crate::world::Molecule::new(*kind, *value),
        _ => return Err(anyhow!(".PLACE expects a typed literal, found '{}'", p.peek().text)),
    };
    p.advance();
    let mut coords = vec![p.expect_vector()?];
    while !matches!(p.peek().kind, TokenKind::Newline | TokenKind::Eof) {
        coords.push(p.expect_vector()?);
    }
    p.expect_line_end()?;
    Ok(Some(AstNode::Place {
        molecule,
        coords,
        source: token.source,
    }))
}

fn handle_export(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let name = p.expect_identifier()?.upper();
    p.expect_line_end()?;
    Ok(Some(AstNode::Export {
        name,
        source: token.source,
    }))
}

fn handle_import(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let qualified = p.expect_identifier()?.upper();
    expect_keyword(p, "AS")?;
    let alias = p.expect_identifier()?.upper();
    p.expect_line_end()?;
    Ok(Some(AstNode::ImportAlias {
        qualified,
        alias,
        source: token.source,
    }))
}

/// `.REQUIRE "path" AS NS` — parse the referenced library file through the
/// full front-end and attach its body under the namespace.
fn handle_require(p: &mut Parser<'_>, token: Token) -> Result<Option<AstNode>> {
    let (path, _) = p.expect_string()?;
    expect_keyword(p, "AS")?;
    let ns = p.expect_identifier()?.upper();
    p.expect_line_end()?;

    let (canonical, content) = p
        .ctx
        .resolver
        .read(Some(&token.source.file), &path)
        .map_err(|e| anyhow!(".REQUIRE failed: {e:#}"))?;
    if !p.ctx.requires_in_flight.insert(canonical.clone()) {
        return Err(anyhow!(".REQUIRE cycle through '{path}'"));
    }

    let mut ctx = p.ctx.reborrow();
    let tokens = Lexer::tokenize(&canonical, &content, &mut *ctx.diags);
    ctx.sources.insert(tokens[0].source.file.clone(), &content);
    let tokens = {
        let mut pre = Preprocessor::new(ctx.resolver, &mut *ctx.sources, &mut *ctx.diags);
        pre.mark_included(&canonical);
        pre.process(tokens)
    };
    let body = {
        let mut child = Parser::new(tokens, ctx.reborrow());
        child.parse_statements(&[])
    };

    p.ctx.requires_in_flight.remove(&canonical);
    Ok(Some(AstNode::Library {
        ns,
        body,
        source: token.source,
    }))
}
