//! Lowering from the AST to an ordered, addressable intermediate
//! representation. This is the first form independent of source syntax, and
//! the place where the procedure-call ABI becomes explicit: arguments are
//! pushed around each CALL and popped into FPR slots by a generated
//! prologue, so calls stay correct even without artifact bindings.

use crate::ast::AstNode;
use crate::diag::{Diagnostics, Phase, SourceInfo};
use crate::isa;
use crate::organism::FPR_BASE;
use crate::sema::{Analysis, ConstValue, RegRef, SymbolKind, qualify};
use crate::world::Molecule;

#[cfg(test)]
mod ir_test;

#[derive(Debug, Clone, PartialEq)]
pub enum IrOperand {
    Reg(u16),
    Loc(u16),
    Imm(Molecule),
    Vector(Vec<i64>),
    /// Unresolved reference to a qualified label or procedure name.
    LabelRef(String),
}

#[derive(Debug, Clone)]
pub struct IrInstruction {
    pub opcode: u16,
    pub mnemonic: &'static str,
    /// Explicit operands only; implicit stack operands occupy no words.
    pub operands: Vec<IrOperand>,
    pub source: SourceInfo,
    /// Caller register ids bound to the callee's FPR slots (CALL only).
    pub bindings: Option<Vec<u16>>,
}

#[derive(Debug, Clone)]
pub enum IrItem {
    Instr(IrInstruction),
    Label(String),
    Org(Vec<i64>),
    Dir(Vec<i64>),
    Place { molecule: Molecule, coord: Vec<i64> },
}

#[derive(Debug, Default)]
pub struct IrProgram {
    pub items: Vec<IrItem>,
}

pub fn generate(program: &[AstNode], analysis: &Analysis, diags: &mut Diagnostics) -> IrProgram {
    let mut lowerer = Lowerer {
        analysis,
        diags,
        items: Vec::new(),
        path: Vec::new(),
        proc_params: Vec::new(),
    };
    lowerer.lower_nodes(program);
    IrProgram {
        items: lowerer.items,
    }
}

struct Lowerer<'a> {
    analysis: &'a Analysis,
    diags: &'a mut Diagnostics,
    items: Vec<IrItem>,
    path: Vec<String>,
    /// Parameter counts of enclosing procedures, innermost last.
    proc_params: Vec<usize>,
}

impl Lowerer<'_> {
    fn error(&mut self, source: &SourceInfo, message: impl Into<String>) {
        self.diags.report(Phase::Ir, Some(source.clone()), message);
    }

    fn emit(&mut self, mnemonic: &str, operands: Vec<IrOperand>, source: &SourceInfo, bindings: Option<Vec<u16>>) {
        let def = isa::registry()
            .lookup(mnemonic)
            .unwrap_or_else(|| panic!("unknown mnemonic {mnemonic} reached ir"));
        self.items.push(IrItem::Instr(IrInstruction {
            opcode: def.id,
            mnemonic: def.mnemonic,
            operands,
            source: source.clone(),
            bindings,
        }));
    }

    fn lower_nodes(&mut self, nodes: &[AstNode]) {
        for node in nodes {
            match node {
                AstNode::Instruction {
                    mnemonic,
                    args,
                    with_args,
                    source,
                } => self.lower_instruction(mnemonic, args, with_args, source),
                AstNode::LabelDef { name, source: _ } => {
                    let qualified = qualify(&self.path, name);
                    self.items.push(IrItem::Label(qualified));
                }
                AstNode::Procedure {
                    name,
                    params,
                    body,
                    source,
                } => {
                    let qualified = qualify(&self.path, name);
                    self.items.push(IrItem::Label(qualified));
                    self.path.push(name.clone());
                    self.proc_params.push(params.len());
                    // Prologue: copy stacked arguments into FPR slots. The
                    // caller pushed them in declaration order, so the last
                    // parameter is on top.
                    for k in (0..params.len()).rev() {
                        self.emit("POP", vec![IrOperand::Reg(FPR_BASE + k as u16)], source, None);
                    }
                    self.lower_nodes(body);
                    self.proc_params.pop();
                    self.path.pop();
                }
                AstNode::Scope { name, body, .. } => {
                    self.path.push(name.clone());
                    self.lower_nodes(body);
                    self.path.pop();
                }
                AstNode::Library { ns, body, .. } => {
                    let saved_path = std::mem::replace(&mut self.path, vec![ns.clone()]);
                    let saved_params = std::mem::take(&mut self.proc_params);
                    self.lower_nodes(body);
                    self.proc_params = saved_params;
                    self.path = saved_path;
                }
                AstNode::Org { coord, .. } => self.items.push(IrItem::Org(coord.clone())),
                AstNode::Dir { vector, .. } => self.items.push(IrItem::Dir(vector.clone())),
                AstNode::Place {
                    molecule, coords, ..
                } => {
                    for coord in coords {
                        self.items.push(IrItem::Place {
                            molecule: *molecule,
                            coord: coord.clone(),
                        });
                    }
                }
                // Purely compile-time constructs leave no IR.
                AstNode::Define { .. }
                | AstNode::RegAlias { .. }
                | AstNode::Export { .. }
                | AstNode::ImportAlias { .. } => {}
                _ => {}
            }
        }
    }

    fn lower_instruction(
        &mut self,
        mnemonic: &str,
        args: &[AstNode],
        with_args: &[AstNode],
        source: &SourceInfo,
    ) {
        if mnemonic == "CALL" {
            self.lower_call(args, with_args, source);
            return;
        }

        // Returning from a procedure with parameters copies them back onto
        // the stack for the caller to pop.
        if mnemonic == "RET"
            && let Some(&n) = self.proc_params.last()
        {
            for k in 0..n {
                self.emit("PUSH", vec![IrOperand::Reg(FPR_BASE + k as u16)], source, None);
            }
        }

        let Some(def) = isa::registry().lookup(mnemonic) else {
            self.error(source, format!("unknown instruction '{mnemonic}'"));
            return;
        };
        let explicit: Vec<_> = def
            .signature
            .iter()
            .copied()
            .filter(|k| *k != isa::OperandKind::Stack)
            .collect();

        let mut operands = Vec::with_capacity(args.len());
        for (kind, arg) in explicit.iter().zip(args) {
            match self.lower_operand(*kind, arg) {
                Some(op) => operands.push(op),
                None => return,
            }
        }
        self.emit(mnemonic, operands, source, None);
    }

    fn lower_call(&mut self, args: &[AstNode], with_args: &[AstNode], source: &SourceInfo) {
        let Some(target) = args.first() else {
            self.error(source, "CALL needs a target");
            return;
        };
        let Some(IrOperand::LabelRef(label)) = self.lower_operand(isa::OperandKind::Label, target) else {
            return;
        };

        let mut arg_regs = Vec::with_capacity(with_args.len());
        for arg in with_args {
            match self.register_of(arg) {
                Some(id) => arg_regs.push(id),
                None => return,
            }
        }

        for &reg in &arg_regs {
            self.emit("PUSH", vec![IrOperand::Reg(reg)], source, None);
        }
        self.emit(
            "CALL",
            vec![IrOperand::LabelRef(label)],
            source,
            Some(arg_regs.clone()),
        );
        // Copy-out in reverse: the callee re-pushed its parameters in
        // declaration order.
        for &reg in arg_regs.iter().rev() {
            self.emit("POP", vec![IrOperand::Reg(reg)], source, None);
        }
    }

    fn register_of(&mut self, arg: &AstNode) -> Option<u16> {
        let name = match arg {
            AstNode::RegisterRef { name, .. } | AstNode::IdentifierRef { name, .. } => name,
            _ => {
                self.error(arg.source(), "expected a register");
                return None;
            }
        };
        match self.analysis.resolve_register(&self.path, name) {
            Some(RegRef::General(id)) => Some(id),
            _ => {
                self.error(arg.source(), format!("unknown register '{name}'"));
                None
            }
        }
    }

    fn lower_operand(&mut self, kind: isa::OperandKind, arg: &AstNode) -> Option<IrOperand> {
        match kind {
            isa::OperandKind::Register => self.register_of(arg).map(IrOperand::Reg),
            isa::OperandKind::LocationRegister => match arg {
                AstNode::RegisterRef { name, .. } => {
                    match self.analysis.resolve_register(&self.path, name) {
                        Some(RegRef::Location(id)) => Some(IrOperand::Loc(id)),
                        _ => {
                            self.error(arg.source(), format!("'{name}' is not a location register"));
                            None
                        }
                    }
                }
                _ => {
                    self.error(arg.source(), "expected a location register");
                    None
                }
            },
            isa::OperandKind::Immediate => match arg {
                AstNode::NumberLit { value, .. } => Some(IrOperand::Imm(Molecule::data(*value))),
                AstNode::TypedLit { molecule, .. } => Some(IrOperand::Imm(*molecule)),
                AstNode::IdentifierRef { name, .. } => match self.constant_of(name) {
                    Some(ConstValue::Scalar(m)) => Some(IrOperand::Imm(m)),
                    _ => {
                        self.error(arg.source(), format!("'{name}' is not a scalar constant"));
                        None
                    }
                },
                _ => {
                    self.error(arg.source(), "expected an immediate");
                    None
                }
            },
            isa::OperandKind::Vector => match arg {
                AstNode::VectorLit { components, .. } => Some(IrOperand::Vector(components.clone())),
                AstNode::NumberLit { value, .. } => Some(IrOperand::Vector(vec![*value])),
                AstNode::IdentifierRef { name, .. } => match self.constant_of(name) {
                    Some(ConstValue::Vector(v)) => Some(IrOperand::Vector(v)),
                    _ => {
                        self.error(arg.source(), format!("'{name}' is not a vector constant"));
                        None
                    }
                },
                _ => {
                    self.error(arg.source(), "expected a vector");
                    None
                }
            },
            isa::OperandKind::Label => match arg {
                AstNode::IdentifierRef { name, .. } => {
                    match self.analysis.resolve(&self.path, name) {
                        Some(symbol)
                            if matches!(
                                symbol.kind,
                                SymbolKind::Label | SymbolKind::Procedure { .. }
                            ) =>
                        {
                            Some(IrOperand::LabelRef(symbol.qualified.clone()))
                        }
                        _ => {
                            let message = format!("unresolved label '{name}'");
                            self.error(arg.source(), message);
                            None
                        }
                    }
                }
                _ => {
                    self.error(arg.source(), "expected a label");
                    None
                }
            },
            isa::OperandKind::Stack => unreachable!("stack operands are implicit"),
        }
    }

    fn constant_of(&self, name: &str) -> Option<ConstValue> {
        match &self.analysis.resolve(&self.path, name)?.kind {
            SymbolKind::Constant { value } => Some(value.clone()),
            _ => None,
        }
    }
}
