//! Compile-time diagnostics: origin-tagged messages accumulated across the
//! pipeline and surfaced as one aggregated failure.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Preprocess,
    Parse,
    Semantic,
    Ir,
    Layout,
    Link,
    Emit,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Lex => "lex",
            Phase::Preprocess => "preprocess",
            Phase::Parse => "parse",
            Phase::Semantic => "semantic",
            Phase::Ir => "ir",
            Phase::Layout => "layout",
            Phase::Link => "link",
            Phase::Emit => "emit",
        }
    }
}

/// Source origin of a token or diagnostic: logical file name plus 1-based
/// line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceInfo {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
    pub source: Option<SourceInfo>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "[{}] {}: {}", self.phase.name(), src, self.message),
            None => write!(f, "[{}] {}", self.phase.name(), self.message),
        }
    }
}

/// Accumulator shared by every pipeline phase.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, phase: Phase, source: Option<SourceInfo>, message: impl Into<String>) {
        self.list.push(Diagnostic {
            phase,
            message: message.into(),
            source,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }

    pub fn into_error(self) -> CompileError {
        CompileError {
            diagnostics: self.list,
        }
    }
}

/// Aggregated compile failure carrying the full diagnostic list.
#[derive(Debug)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "compilation failed with {} error(s):", self.diagnostics.len())?;
        for d in &self.diagnostics {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Original source text per logical file, kept for source-map line content
/// and column-fidelity checks. Line endings are normalized to LF before the
/// lines are split.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: FxHashMap<Arc<str>, Arc<Vec<String>>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: Arc<str>, content: &str) {
        let lines = content.lines().map(str::to_string).collect();
        self.files.insert(file, Arc::new(lines));
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    /// 1-based line lookup.
    pub fn line(&self, file: &str, line: u32) -> Option<&str> {
        self.files
            .get(file)
            .and_then(|lines| lines.get(line as usize - 1))
            .map(String::as_str)
    }
}
