//! Semantic analysis: nested symbol tables, signature validation against
//! the ISA registry, and call-site argument capture.

use rustc_hash::FxHashMap;

use crate::ast::AstNode;
use crate::compiler::CompileOptions;
use crate::diag::{Diagnostics, Phase, SourceInfo};
use crate::isa::{self, OperandKind};
use crate::organism::{FPR_BASE, PR_BASE};
use crate::world::Molecule;

pub mod token_map;
pub use token_map::{TokenLookup, TokenMapEntry};


#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Scalar(Molecule),
    Vector(Vec<i64>),
}

/// A resolved register reference. DR/PR/FPR share one id space; location
/// registers have their own small index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegRef {
    General(u16),
    Location(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Procedure { params: Vec<String>, exported: bool },
    Label,
    Variable { reg: RegRef },
    Constant { value: ConstValue },
    Alias { target: String },
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub qualified: String,
    pub kind: SymbolKind,
    pub source: SourceInfo,
}

/// Everything later phases need to resolve names: one flat table keyed by
/// fully qualified (scope-path-joined) upper-case names.
#[derive(Debug, Default)]
pub struct Analysis {
    pub symbols: FxHashMap<String, Symbol>,
    pub register_alias_map: FxHashMap<String, String>,
    pub proc_name_to_param_names: FxHashMap<String, Vec<String>>,
    pub token_map: Vec<TokenMapEntry>,
    pub token_lookup: TokenLookup,
}

/// Scope-qualified symbol key: path segments and the name joined by dots.
pub fn qualify(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        let mut key = path.join(".");
        key.push('.');
        key.push_str(name);
        key
    }
}

/// Built-in register syntax: `%DRk`, `%PRk`, `%FPRk`, `%LRk`.
pub fn builtin_register(name: &str) -> Option<RegRef> {
    let body = name.strip_prefix('%')?;
    let digits_at = body.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = body.split_at(digits_at);
    let index: u16 = digits.parse().ok()?;
    match prefix {
        "DR" if index < PR_BASE => Some(RegRef::General(index)),
        "PR" if index < FPR_BASE - PR_BASE => Some(RegRef::General(PR_BASE + index)),
        "FPR" => index.checked_add(FPR_BASE).map(RegRef::General),
        "LR" => Some(RegRef::Location(index)),
        _ => None,
    }
}

impl Analysis {
    /// Resolve a name from a lexical scope, innermost first, following
    /// `.IMPORT` aliases. Qualified names (containing dots) also resolve
    /// directly against the flat table.
    pub fn resolve(&self, path: &[String], name: &str) -> Option<&Symbol> {
        for depth in (0..=path.len()).rev() {
            let key = qualify(&path[..depth], name);
            if let Some(symbol) = self.symbols.get(&key) {
                return self.follow_alias(symbol, 0);
            }
        }
        None
    }

    fn follow_alias<'s>(&'s self, symbol: &'s Symbol, depth: usize) -> Option<&'s Symbol> {
        match &symbol.kind {
            SymbolKind::Alias { target } if depth < 8 => {
                let next = self.symbols.get(target)?;
                self.follow_alias(next, depth + 1)
            }
            SymbolKind::Alias { .. } => None,
            _ => Some(symbol),
        }
    }

    /// Resolve a register operand: built-in names first, then aliases and
    /// procedure parameters visible from the scope.
    pub fn resolve_register(&self, path: &[String], name: &str) -> Option<RegRef> {
        if let Some(reg) = builtin_register(name) {
            return Some(reg);
        }
        match self.resolve(path, name)?.kind {
            SymbolKind::Variable { reg } => Some(reg),
            _ => None,
        }
    }
}

pub fn analyze(program: &[AstNode], opts: &CompileOptions, diags: &mut Diagnostics) -> Analysis {
    let mut analyzer = Analyzer {
        analysis: Analysis::default(),
        pending_exports: Vec::new(),
        diags,
        dims: opts.dims(),
    };
    let mut path = Vec::new();
    analyzer.collect(program, &mut path);
    analyzer.apply_exports();
    analyzer.check(program, &mut path);
    let (token_map, token_lookup) = token_map::generate(program);
    analyzer.analysis.token_map = token_map;
    analyzer.analysis.token_lookup = token_lookup;
    analyzer.analysis
}

struct Analyzer<'a> {
    analysis: Analysis,
    pending_exports: Vec<(Vec<String>, String, SourceInfo)>,
    diags: &'a mut Diagnostics,
    dims: usize,
}

impl Analyzer<'_> {
    fn error(&mut self, source: &SourceInfo, message: impl Into<String>) {
        self.diags.report(Phase::Semantic, Some(source.clone()), message);
    }

    fn define(&mut self, path: &[String], name: &str, kind: SymbolKind, source: &SourceInfo) {
        let qualified = qualify(path, name);
        if self.analysis.symbols.contains_key(&qualified) {
            self.error(source, format!("duplicate symbol '{qualified}'"));
            return;
        }
        self.analysis.symbols.insert(
            qualified.clone(),
            Symbol {
                qualified,
                kind,
                source: source.clone(),
            },
        );
    }

    // First pass: record every definition so references may point forward.
    fn collect(&mut self, nodes: &[AstNode], path: &mut Vec<String>) {
        for node in nodes {
            match node {
                AstNode::LabelDef { name, source } => {
                    self.define(path, name, SymbolKind::Label, source);
                }
                AstNode::Procedure {
                    name,
                    params,
                    body,
                    source,
                } => {
                    for param in params {
                        if isa::registry().is_mnemonic(param) {
                            self.error(
                                source,
                                format!(
                                    "parameter '{param}' of .PROC {name} collides with an instruction mnemonic"
                                ),
                            );
                        }
                    }
                    self.define(
                        path,
                        name,
                        SymbolKind::Procedure {
                            params: params.clone(),
                            exported: false,
                        },
                        source,
                    );
                    path.push(name.clone());
                    for (k, param) in params.iter().enumerate() {
                        self.define(
                            path,
                            param,
                            SymbolKind::Variable {
                                reg: RegRef::General(FPR_BASE + k as u16),
                            },
                            source,
                        );
                    }
                    self.analysis
                        .proc_name_to_param_names
                        .insert(qualify(&path[..path.len() - 1], name), params.clone());
                    self.collect(body, path);
                    path.pop();
                }
                AstNode::Scope { name, body, .. } => {
                    path.push(name.clone());
                    self.collect(body, path);
                    path.pop();
                }
                AstNode::Define { name, value, source } => {
                    let value = match value.as_ref() {
                        AstNode::NumberLit { value, .. } => ConstValue::Scalar(Molecule::data(*value)),
                        AstNode::TypedLit { molecule, .. } => ConstValue::Scalar(*molecule),
                        AstNode::VectorLit { components, .. } => ConstValue::Vector(components.clone()),
                        _ => {
                            self.error(source, ".DEFINE needs a literal value");
                            continue;
                        }
                    };
                    self.define(path, name, SymbolKind::Constant { value }, source);
                }
                AstNode::RegAlias {
                    alias,
                    target,
                    proc_local,
                    source,
                } => {
                    if *proc_local && path.is_empty() {
                        self.error(source, ".PREG is only valid inside a procedure");
                        continue;
                    }
                    match self.analysis.resolve_register(path, target) {
                        Some(reg) => {
                            self.define(path, alias, SymbolKind::Variable { reg }, source);
                            self.analysis
                                .register_alias_map
                                .insert(qualify(path, alias), target.clone());
                        }
                        None => {
                            self.error(source, format!("unknown register '{target}'"));
                        }
                    }
                }
                AstNode::Export { name, source } => {
                    self.pending_exports.push((path.clone(), name.clone(), source.clone()));
                }
                AstNode::Library { ns, body, .. } => {
                    let mut lib_path = vec![ns.clone()];
                    self.collect(body, &mut lib_path);
                }
                AstNode::ImportAlias {
                    qualified, alias, source, ..
                } => {
                    self.define(
                        path,
                        alias,
                        SymbolKind::Alias {
                            target: qualified.clone(),
                        },
                        source,
                    );
                }
                _ => {}
            }
        }
    }

    fn apply_exports(&mut self) {
        let pending = std::mem::take(&mut self.pending_exports);
        for (path, name, source) in pending {
            let qualified = qualify(&path, &name);
            match self.analysis.symbols.get_mut(&qualified) {
                Some(Symbol {
                    kind: SymbolKind::Procedure { exported, .. },
                    ..
                }) => *exported = true,
                Some(_) => self.error(&source, format!("'{name}' is not a procedure")),
                None => self.error(&source, format!("cannot export unknown procedure '{name}'")),
            }
        }
    }

    // Second pass: validate every reference and instruction signature.
    fn check(&mut self, nodes: &[AstNode], path: &mut Vec<String>) {
        for node in nodes {
            match node {
                AstNode::Instruction {
                    mnemonic,
                    args,
                    with_args,
                    source,
                } => self.check_instruction(mnemonic, args, with_args, source, path),
                AstNode::Procedure { name, body, .. } => {
                    path.push(name.clone());
                    self.check(body, path);
                    path.pop();
                }
                AstNode::Scope { name, body, .. } => {
                    path.push(name.clone());
                    self.check(body, path);
                    path.pop();
                }
                AstNode::Library { ns, body, .. } => {
                    let mut lib_path = vec![ns.clone()];
                    self.check(body, &mut lib_path);
                }
                AstNode::Org { coord, source } => {
                    if coord.len() != self.dims {
                        self.error(source, format!(".ORG needs {} component(s)", self.dims));
                    }
                }
                AstNode::Dir { vector, source } => {
                    if vector.len() != self.dims {
                        self.error(source, format!(".DIR needs {} component(s)", self.dims));
                    } else if vector.iter().all(|&c| c == 0) {
                        self.error(source, ".DIR vector must not be zero");
                    }
                }
                AstNode::Place { coords, source, .. } => {
                    for coord in coords {
                        if coord.len() != self.dims {
                            self.error(source, format!(".PLACE needs {} component(s)", self.dims));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn check_instruction(
        &mut self,
        mnemonic: &str,
        args: &[AstNode],
        with_args: &[AstNode],
        source: &SourceInfo,
        path: &[String],
    ) {
        let Some(def) = isa::registry().lookup(mnemonic) else {
            self.error(source, format!("unknown instruction '{mnemonic}'"));
            return;
        };

        let explicit: Vec<OperandKind> = def
            .signature
            .iter()
            .copied()
            .filter(|k| *k != OperandKind::Stack)
            .collect();
        if args.len() != explicit.len() {
            self.error(
                source,
                format!(
                    "{mnemonic} expects {} operand(s), got {}",
                    explicit.len(),
                    args.len()
                ),
            );
            return;
        }

        for (kind, arg) in explicit.iter().zip(args) {
            self.check_operand(mnemonic, *kind, arg, path);
        }

        if !with_args.is_empty() && def.mnemonic != "CALL" {
            self.error(source, "WITH arguments are only valid on CALL");
        }
        if def.mnemonic == "CALL" {
            self.check_call_args(args, with_args, source, path);
        }
    }

    /// Cloned resolution result, so diagnostics can be reported while the
    /// result is in hand.
    fn lookup(&self, path: &[String], name: &str) -> Option<(SymbolKind, String)> {
        self.analysis
            .resolve(path, name)
            .map(|s| (s.kind.clone(), s.qualified.clone()))
    }

    fn check_operand(&mut self, mnemonic: &str, kind: OperandKind, arg: &AstNode, path: &[String]) {
        let source = arg.source().clone();
        match kind {
            OperandKind::Register => match arg {
                AstNode::RegisterRef { name, .. } => match self.analysis.resolve_register(path, name) {
                    Some(RegRef::General(_)) => {}
                    Some(RegRef::Location(_)) => {
                        self.error(&source, format!("location register '{name}' not allowed here"));
                    }
                    None => self.error(&source, format!("unknown register '{name}'")),
                },
                AstNode::IdentifierRef { name, .. } => match self.lookup(path, name).map(|(k, _)| k) {
                    Some(SymbolKind::Variable {
                        reg: RegRef::General(_),
                    }) => {}
                    Some(SymbolKind::Constant { .. }) => {
                        self.error(&source, format!("constant '{name}' used where a register is required"));
                    }
                    _ => self.error(&source, format!("'{name}' does not name a register")),
                },
                _ => self.error(&source, format!("{mnemonic} expects a register here")),
            },
            OperandKind::LocationRegister => match arg {
                AstNode::RegisterRef { name, .. } => match self.analysis.resolve_register(path, name) {
                    Some(RegRef::Location(_)) => {}
                    _ => self.error(&source, format!("'{name}' is not a location register")),
                },
                _ => self.error(&source, format!("{mnemonic} expects a location register here")),
            },
            OperandKind::Immediate => match arg {
                AstNode::NumberLit { .. } | AstNode::TypedLit { .. } => {}
                AstNode::IdentifierRef { name, .. } => match self.lookup(path, name).map(|(k, _)| k) {
                    Some(SymbolKind::Constant {
                        value: ConstValue::Scalar(_),
                    }) => {}
                    Some(SymbolKind::Constant { .. }) => {
                        self.error(&source, format!("constant '{name}' is not a scalar"));
                    }
                    _ => self.error(&source, format!("'{name}' does not name a constant")),
                },
                _ => self.error(&source, format!("{mnemonic} expects an immediate here")),
            },
            OperandKind::Vector => match arg {
                AstNode::VectorLit { components, .. } => {
                    if components.len() != self.dims {
                        self.error(&source, format!("vector needs {} component(s)", self.dims));
                    }
                }
                AstNode::NumberLit { .. } if self.dims == 1 => {}
                AstNode::IdentifierRef { name, .. } => match self.lookup(path, name).map(|(k, _)| k) {
                    Some(SymbolKind::Constant {
                        value: ConstValue::Vector(v),
                    }) => {
                        if v.len() != self.dims {
                            self.error(
                                &source,
                                format!("vector constant '{name}' needs {} component(s)", self.dims),
                            );
                        }
                    }
                    _ => self.error(&source, format!("'{name}' does not name a vector constant")),
                },
                _ => self.error(&source, format!("{mnemonic} expects a vector here")),
            },
            OperandKind::Label => match arg {
                AstNode::IdentifierRef { name, .. } => match self.lookup(path, name) {
                    Some((SymbolKind::Label, _)) => {}
                    Some((SymbolKind::Procedure { exported, .. }, qualified)) => {
                        if !exported && !self.visible_from(path, &qualified) {
                            self.error(&source, format!("procedure '{qualified}' is not exported"));
                        }
                    }
                    Some((SymbolKind::Constant { .. }, _)) => {
                        self.error(&source, format!("constant '{name}' cannot be used as a jump target"));
                    }
                    Some(_) => self.error(&source, format!("'{name}' is not a jump target")),
                    None => self.error(&source, format!("unresolved label '{name}'")),
                },
                _ => self.error(&source, format!("{mnemonic} expects a label here")),
            },
            OperandKind::Stack => unreachable!("stack operands are implicit"),
        }
    }

    /// A non-exported procedure is callable only from inside its own
    /// namespace.
    fn visible_from(&self, path: &[String], qualified: &str) -> bool {
        match qualified.rsplit_once('.') {
            Some((prefix, _)) => {
                let scope = path.join(".");
                scope == prefix || scope.starts_with(&format!("{prefix}."))
            }
            None => true,
        }
    }

    fn check_call_args(
        &mut self,
        args: &[AstNode],
        with_args: &[AstNode],
        source: &SourceInfo,
        path: &[String],
    ) {
        for arg in with_args {
            let source = arg.source().clone();
            match arg {
                AstNode::RegisterRef { name, .. } => {
                    if !matches!(
                        self.analysis.resolve_register(path, name),
                        Some(RegRef::General(_))
                    ) {
                        self.error(&source, format!("unknown register '{name}' in WITH clause"));
                    }
                }
                AstNode::IdentifierRef { name, .. } => {
                    if !matches!(
                        self.lookup(path, name).map(|(k, _)| k),
                        Some(SymbolKind::Variable {
                            reg: RegRef::General(_)
                        })
                    ) {
                        self.error(&source, format!("'{name}' in WITH clause does not name a register"));
                    }
                }
                _ => self.error(&source, "WITH arguments must be registers"),
            }
        }

        // Arity against the callee's parameter list, when the target is a
        // known procedure.
        if let Some(AstNode::IdentifierRef { name, .. }) = args.first()
            && let Some((SymbolKind::Procedure { params, .. }, qualified)) = self.lookup(path, name)
            && params.len() != with_args.len()
        {
            self.error(
                source,
                format!(
                    "procedure '{qualified}' expects {} argument(s), got {}",
                    params.len(),
                    with_args.len()
                ),
            );
        }
    }
}
