//! The flat, three-address intermediate representation.
//!
//! Built by [`builder`] from a type-checked AST, consumed by
//! [`crate::optimizer`] and both code generators. Every operand and
//! instruction is owned by its `IRFunction`; nothing here borrows from the
//! AST that produced it.

pub mod builder;

use std::collections::HashMap;

use tlc_parser::ast::{DataType, FfiFunction};

/// A value an instruction reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Temporary { id: u32, ty: DataType },
    Variable { name: String, ty: DataType, array_size: Option<i64> },
    IntConst(i64),
    FloatConst(f64),
    StringConst(String),
    Null,
    Label(LabelId),
}

impl Operand {
    pub fn ty(&self) -> DataType {
        match self {
            Operand::Temporary { ty, .. } | Operand::Variable { ty, .. } => ty.clone(),
            Operand::IntConst(_) => DataType::Int,
            Operand::FloatConst(_) => DataType::Double,
            Operand::StringConst(_) => DataType::String,
            Operand::Null => DataType::Null,
            Operand::Label(_) => DataType::Void,
        }
    }

    pub fn as_temp_id(&self) -> Option<u32> {
        match self {
            Operand::Temporary { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn as_variable_name(&self) -> Option<&str> {
        match self {
            Operand::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Operand::IntConst(_) | Operand::FloatConst(_) | Operand::StringConst(_) | Operand::Null
        )
    }
}

/// A dense, per-function label id. The printed name (`L3`, `main_oob`, ...)
/// lives in `IRFunction::label_names`, not on the id itself — see the
/// "owner-less IR labels" decision in `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Nop,
    Label(LabelId),
    Move { dest: Operand, src: Operand },
    BinOp { op: BinOpcode, dest: Operand, lhs: Operand, rhs: Operand },
    Neg { dest: Operand, src: Operand },
    Not { dest: Operand, src: Operand },
    Jump(LabelId),
    JumpIf { cond: Operand, target: LabelId },
    JumpIfFalse { cond: Operand, target: LabelId },
    Call { dest: Option<Operand>, name: String, arg_count: usize },
    Return(Option<Operand>),
    Param(Operand),
    Print(Operand),
    PrintMultiple(Vec<Operand>),
    ArrayLoad { dest: Operand, array: String, index: Operand },
    ArrayStore { array: String, index: Operand, value: Operand },
    BoundsCheck { index: Operand, size: i64, error_label: LabelId },
    ArrayDecl { name: String, elem_ty: DataType, size: i64 },
    ArrayInit { name: String, size: i64, value: Operand },
    VarDecl { name: String, ty: DataType },
    InlineAsm(InlineAsmInstr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineAsmInstr {
    pub code: String,
    pub volatile: bool,
    pub outputs: Vec<(String, Operand)>,
    pub inputs: Vec<(String, Operand)>,
    pub clobbers: Vec<String>,
}

impl Instruction {
    /// The operand this instruction defines, if any — used by dead-code
    /// elimination's liveness pass.
    pub fn defined_operand(&self) -> Option<&Operand> {
        match self {
            Instruction::Move { dest, .. }
            | Instruction::BinOp { dest, .. }
            | Instruction::Neg { dest, .. }
            | Instruction::Not { dest, .. }
            | Instruction::ArrayLoad { dest, .. } => Some(dest),
            Instruction::Call { dest: Some(dest), .. } => Some(dest),
            _ => None,
        }
    }

    /// Every operand this instruction reads (never the operand it defines).
    pub fn used_operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Move { src, .. } => vec![src],
            Instruction::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Neg { src, .. } | Instruction::Not { src, .. } => vec![src],
            Instruction::JumpIf { cond, .. } | Instruction::JumpIfFalse { cond, .. } => vec![cond],
            Instruction::Return(Some(v)) => vec![v],
            Instruction::Param(v) | Instruction::Print(v) => vec![v],
            Instruction::PrintMultiple(vs) => vs.iter().collect(),
            Instruction::ArrayLoad { index, .. } => vec![index],
            Instruction::ArrayStore { index, value, .. } => vec![index, value],
            Instruction::BoundsCheck { index, .. } => vec![index],
            Instruction::ArrayInit { value, .. } => vec![value],
            Instruction::InlineAsm(asm) => asm
                .outputs
                .iter()
                .chain(asm.inputs.iter())
                .map(|(_, op)| op)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Self::used_operands`], for passes that
    /// rewrite operands in place (copy propagation, constant folding).
    pub fn used_operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instruction::Move { src, .. } => vec![src],
            Instruction::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Neg { src, .. } | Instruction::Not { src, .. } => vec![src],
            Instruction::JumpIf { cond, .. } | Instruction::JumpIfFalse { cond, .. } => vec![cond],
            Instruction::Return(Some(v)) => vec![v],
            Instruction::Param(v) | Instruction::Print(v) => vec![v],
            Instruction::PrintMultiple(vs) => vs.iter_mut().collect(),
            Instruction::ArrayLoad { index, .. } => vec![index],
            Instruction::ArrayStore { index, value, .. } => vec![index, value],
            Instruction::BoundsCheck { index, .. } => vec![index],
            Instruction::ArrayInit { value, .. } => vec![value],
            Instruction::InlineAsm(asm) => asm
                .outputs
                .iter_mut()
                .chain(asm.inputs.iter_mut())
                .map(|(_, op)| op)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the instruction has an effect beyond its own destination —
    /// DCE never removes these regardless of whether their destination
    /// (if any) is live.
    pub fn is_side_effecting(&self) -> bool {
        matches!(
            self,
            Instruction::Print(_)
                | Instruction::PrintMultiple(_)
                | Instruction::Call { .. }
                | Instruction::Return(_)
                | Instruction::ArrayStore { .. }
                | Instruction::InlineAsm(_)
                | Instruction::Jump(_)
                | Instruction::JumpIf { .. }
                | Instruction::JumpIfFalse { .. }
                | Instruction::Label(_)
                | Instruction::BoundsCheck { .. }
                | Instruction::ArrayDecl { .. }
                | Instruction::ArrayInit { .. }
                | Instruction::VarDecl { .. }
        )
    }
}

/// Which labels a `break`/`continue` inside the loop currently being built
/// should target.
#[derive(Debug, Clone, Copy)]
pub struct LoopContext {
    pub continue_target: LabelId,
    pub break_target: LabelId,
}

#[derive(Debug, Clone)]
pub struct IRFunction {
    pub name: String,
    pub return_type: DataType,
    pub params: Vec<Operand>,
    pub instructions: Vec<Instruction>,
    pub label_names: HashMap<LabelId, String>,
    next_temp: u32,
    next_label: u32,
    /// Live only while the builder is walking this function's body.
    pub(crate) loop_stack: Vec<LoopContext>,
    pub out_of_bounds_label: Option<LabelId>,
}

impl IRFunction {
    pub fn new(name: impl Into<String>, return_type: DataType, params: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            instructions: Vec::new(),
            label_names: HashMap::new(),
            next_temp: 0,
            next_label: 0,
            loop_stack: Vec::new(),
            out_of_bounds_label: None,
        }
    }

    pub fn fresh_temp(&mut self, ty: DataType) -> Operand {
        let id = self.next_temp;
        self.next_temp += 1;
        Operand::Temporary { id, ty }
    }

    pub fn fresh_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        let name = format!("L{}", id.0);
        self.label_names.insert(id, name);
        id
    }

    pub fn named_label(&mut self, name: impl Into<String>) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        self.label_names.insert(id, name.into());
        id
    }

    pub fn label_name(&self, id: LabelId) -> &str {
        self.label_names.get(&id).map(String::as_str).unwrap_or("?")
    }

    pub fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn out_of_bounds_label(&mut self) -> LabelId {
        if let Some(label) = self.out_of_bounds_label {
            return label;
        }
        let label = self.named_label(format!("{}_oob", self.name));
        self.out_of_bounds_label = Some(label);
        label
    }

    /// Matches `Stmt::always_returns`: true when control can never fall off
    /// the end of the instructions emitted for a statement.
    pub fn current_block_always_returns(&self) -> bool {
        matches!(self.instructions.last(), Some(Instruction::Return(_)) | Some(Instruction::Jump(_)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IRProgram {
    pub functions: Vec<IRFunction>,
    /// Carried through unchanged from the AST — both back ends need the
    /// library/calling-convention metadata to emit loader code.
    pub ffi_functions: Vec<FfiFunction>,
}

impl IRProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instructions.len()).sum()
    }
}
