//! The compile pipeline driver: source text to `ProgramArtifact`.

use tracing::debug;

use crate::ast;
use crate::diag::{CompileError, Diagnostic, Diagnostics, Phase, SourceCache};
use crate::emit::{self, ProgramArtifact};
use crate::ir;
use crate::layout;
use crate::link;
use crate::preproc::{FileResolver, MemoryResolver, Preprocessor};
use crate::sema;
use crate::token::Lexer;


/// Compilation target: the world the program will be laid out into.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub shape: Vec<i64>,
    pub toroidal: bool,
}

impl CompileOptions {
    pub fn new(shape: Vec<i64>, toroidal: bool) -> Self {
        assert!(!shape.is_empty(), "world needs at least one dimension");
        Self { shape, toroidal }
    }

    pub fn dims(&self) -> usize {
        self.shape.len()
    }
}

/// Compile the entry file reachable through `resolver`. All diagnostics are
/// aggregated into a single `CompileError`; later phases only run when the
/// earlier ones were clean.
pub fn compile(
    resolver: &dyn FileResolver,
    entry: &str,
    opts: &CompileOptions,
) -> Result<ProgramArtifact, CompileError> {
    let mut diags = Diagnostics::new();
    let mut sources = SourceCache::new();

    let (canonical, content) = match resolver.read(None, entry) {
        Ok(x) => x,
        Err(err) => {
            diags.report(Phase::Lex, None, format!("cannot read '{entry}': {err:#}"));
            return Err(diags.into_error());
        }
    };

    debug!(file = %canonical, "lexing");
    let tokens = Lexer::tokenize(&canonical, &content, &mut diags);
    sources.insert(tokens[0].source.file.clone(), &content);

    debug!("preprocessing");
    let tokens = {
        let mut pre = Preprocessor::new(resolver, &mut sources, &mut diags);
        pre.mark_included(&canonical);
        pre.process(tokens)
    };

    debug!("parsing");
    let program = ast::parse(resolver, &mut sources, &mut diags, tokens);
    if !diags.is_empty() {
        return Err(diags.into_error());
    }

    debug!("semantic analysis");
    let analysis = sema::analyze(&program, opts, &mut diags);
    if !diags.is_empty() {
        return Err(diags.into_error());
    }

    debug!("generating ir");
    let ir = ir::generate(&program, &analysis, &mut diags);
    if !diags.is_empty() {
        return Err(diags.into_error());
    }

    debug!("layout");
    let Some(layout) = layout::lay_out(&ir, opts, &mut diags) else {
        return Err(diags.into_error());
    };

    debug!("linking");
    let Some(linked) = link::link(&ir, layout, opts, &mut diags) else {
        return Err(diags.into_error());
    };

    debug!("emitting");
    match emit::emit(&linked, &analysis, &sources, &mut diags) {
        Some(artifact) => {
            debug!(program_id = artifact.program_id, words = artifact.machine_code_layout.len(), "compiled");
            Ok(artifact)
        }
        None => Err(diags.into_error()),
    }
}

/// Compile a single in-memory source string under a synthetic file name.
pub fn compile_source(
    source: &str,
    file_name: &str,
    opts: &CompileOptions,
) -> Result<ProgramArtifact, CompileError> {
    let mut resolver = MemoryResolver::new();
    resolver.insert(file_name, source);
    compile(&resolver, file_name, opts)
}

/// Convenience for callers that want an `anyhow`-style single message.
pub fn first_message(err: &CompileError) -> String {
    err.diagnostics
        .first()
        .map(Diagnostic::to_string)
        .unwrap_or_else(|| "compilation failed".to_string())
}
