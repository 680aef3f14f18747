//! Token-stream preprocessor: include splicing and macro expansion.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diag::{Diagnostics, Phase, SourceCache};
use crate::token::{Lexer, Token, TokenKind};


/// Source of file contents for `.INCLUDE` and `.REQUIRE`. Paths resolve
/// relative to the including file; the returned id is canonical so that a
/// file spliced from two places is recognized as the same file.
pub trait FileResolver {
    fn read(&self, from: Option<&str>, path: &str) -> Result<(String, String)>;
}

/// Filesystem-backed resolver; canonical ids are absolute paths.
#[derive(Debug, Default)]
pub struct FsResolver;

impl FsResolver {
    pub fn new() -> Self {
        Self
    }
}

impl FileResolver for FsResolver {
    fn read(&self, from: Option<&str>, path: &str) -> Result<(String, String)> {
        let mut full = PathBuf::new();
        if let Some(from) = from
            && let Some(dir) = Path::new(from).parent()
        {
            full.push(dir);
        }
        full.push(path);
        let canonical = full
            .canonicalize()
            .with_context(|| format!("cannot resolve '{path}'"))?;
        let content = std::fs::read_to_string(&canonical)
            .with_context(|| format!("cannot read '{}'", canonical.display()))?;
        Ok((canonical.to_string_lossy().into_owned(), content))
    }
}

/// In-memory resolver for tests and embedded programs.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    files: FxHashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileResolver for MemoryResolver {
    fn read(&self, from: Option<&str>, path: &str) -> Result<(String, String)> {
        if let Some(content) = self.files.get(path) {
            return Ok((path.to_string(), content.clone()));
        }
        // Resolve relative to the including file's directory.
        if let Some(from) = from
            && let Some(dir) = Path::new(from).parent()
        {
            let joined = dir.join(path).to_string_lossy().into_owned();
            if let Some(content) = self.files.get(&joined) {
                return Ok((joined, content.clone()));
            }
        }
        Err(anyhow!("no such file '{path}'"))
    }
}

struct MacroDef {
    params: Vec<String>,
    body: Vec<Token>,
}

/// Upper bound on macro expansions per compilation; self-recursive macros
/// hit this instead of looping forever.
const MAX_EXPANSIONS: usize = 10_000;

/// Rewrites the token stream in place: `.INCLUDE` splices the referenced
/// file (once per canonical path), `.MACRO`/`.ENDM` blocks are recorded and
/// removed, and identifiers matching a macro name are replaced by the macro
/// body with positional parameter substitution. The cursor resets to each
/// splice point so expansions are re-scanned.
pub struct Preprocessor<'a> {
    resolver: &'a dyn FileResolver,
    sources: &'a mut SourceCache,
    diags: &'a mut Diagnostics,
    included: FxHashSet<String>,
    macros: FxHashMap<String, MacroDef>,
    expansions: usize,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        resolver: &'a dyn FileResolver,
        sources: &'a mut SourceCache,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self {
            resolver,
            sources,
            diags,
            included: FxHashSet::default(),
            macros: FxHashMap::default(),
            expansions: 0,
        }
    }

    /// Mark the entry file itself as included so a file cannot splice itself.
    pub fn mark_included(&mut self, canonical_id: &str) {
        self.included.insert(canonical_id.to_string());
    }

    pub fn process(&mut self, mut tokens: Vec<Token>) -> Vec<Token> {
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i].kind {
                TokenKind::Directive if tokens[i].is_directive(".INCLUDE") => {
                    self.splice_include(&mut tokens, i);
                }
                TokenKind::Directive if tokens[i].is_directive(".MACRO") => {
                    self.record_macro(&mut tokens, i);
                }
                TokenKind::Identifier if self.macros.contains_key(&tokens[i].upper()) => {
                    if !self.expand_macro(&mut tokens, i) {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
        tokens
    }

    fn splice_include(&mut self, tokens: &mut Vec<Token>, i: usize) {
        let directive = tokens[i].clone();
        let path = match tokens.get(i + 1).map(|t| &t.kind) {
            Some(TokenKind::Str(path)) => path.clone(),
            _ => {
                self.diags.report(
                    Phase::Preprocess,
                    Some(directive.source.clone()),
                    ".INCLUDE expects a quoted path",
                );
                tokens.splice(i..i + 1, []);
                return;
            }
        };

        let from = directive.source.file.as_ref();
        match self.resolver.read(Some(from), &path) {
            Ok((canonical, content)) => {
                // Each file is spliced at most once per compilation;
                // repeated includes are no-ops.
                if !self.included.insert(canonical.clone()) {
                    tokens.splice(i..i + 2, []);
                    return;
                }
                let mut included = Lexer::tokenize(&canonical, &content, &mut *self.diags);
                self.sources.insert(included[0].source.file.clone(), &content);
                included.pop(); // drop the nested EOF
                tokens.splice(i..i + 2, included);
            }
            Err(err) => {
                self.diags.report(
                    Phase::Preprocess,
                    Some(directive.source.clone()),
                    format!(".INCLUDE failed: {err:#}"),
                );
                tokens.splice(i..i + 2, []);
            }
        }
    }

    fn record_macro(&mut self, tokens: &mut Vec<Token>, i: usize) {
        let directive_src = tokens[i].source.clone();
        let name = match tokens.get(i + 1) {
            Some(t) if t.kind == TokenKind::Identifier => t.upper(),
            _ => {
                self.diags.report(
                    Phase::Preprocess,
                    Some(directive_src),
                    ".MACRO expects a name",
                );
                tokens.splice(i..i + 1, []);
                return;
            }
        };

        // Parameters: identifiers up to the end of the directive line.
        let mut j = i + 2;
        let mut params = Vec::new();
        while let Some(t) = tokens.get(j) {
            match &t.kind {
                TokenKind::Identifier => {
                    params.push(t.upper());
                    j += 1;
                }
                TokenKind::Newline => {
                    j += 1;
                    break;
                }
                _ => {
                    self.diags.report(
                        Phase::Preprocess,
                        Some(t.source.clone()),
                        "macro parameters must be identifiers",
                    );
                    j += 1;
                }
            }
        }

        let body_start = j;
        while let Some(t) = tokens.get(j) {
            if t.is_directive(".ENDM") {
                let body = tokens[body_start..j].to_vec();
                self.macros.insert(name, MacroDef { params, body });
                tokens.splice(i..j + 1, []);
                return;
            }
            if t.kind == TokenKind::Eof {
                break;
            }
            j += 1;
        }
        self.diags.report(
            Phase::Preprocess,
            Some(directive_src),
            format!(".MACRO {name} has no matching .ENDM"),
        );
        tokens.splice(i..j, []);
    }

    /// Returns whether an expansion was spliced in at `i`.
    fn expand_macro(&mut self, tokens: &mut Vec<Token>, i: usize) -> bool {
        let name = tokens[i].upper();
        let call_src = tokens[i].source.clone();

        if self.expansions >= MAX_EXPANSIONS {
            self.diags.report(
                Phase::Preprocess,
                Some(call_src),
                format!("macro expansion limit reached while expanding {name}"),
            );
            return false;
        }
        self.expansions += 1;

        // Arguments: every token up to (not including) the newline.
        let mut end = i + 1;
        let mut args = Vec::new();
        while let Some(t) = tokens.get(end) {
            if matches!(t.kind, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            args.push(t.clone());
            end += 1;
        }

        let def = &self.macros[&name];
        if args.len() != def.params.len() {
            self.diags.report(
                Phase::Preprocess,
                Some(call_src),
                format!(
                    "macro {name} expects {} argument(s), got {}",
                    def.params.len(),
                    args.len()
                ),
            );
            tokens.splice(i..end, []);
            return true;
        }

        let body: Vec<Token> = def
            .body
            .iter()
            .map(|t| {
                if t.kind == TokenKind::Identifier
                    && let Some(pos) = def.params.iter().position(|p| *p == t.upper())
                {
                    args[pos].clone()
                } else {
                    t.clone()
                }
            })
            .collect();
        tokens.splice(i..end, body);
        true
    }
}
