//! Dead code elimination: drops instructions after an unconditional
//! transfer within the same block, then removes dead stores via a single
//! backward liveness scan. The scan is a straight-line approximation (no
//! per-block dataflow merge) that only ever over-approximates liveness, so
//! it can miss removable stores across branches but never removes
//! something still needed.

use std::collections::HashSet;

use crate::ir::{IRFunction, Instruction};

use super::OptimizationPass;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Temp(u32),
    Var(String),
}

fn key_of(op: &crate::ir::Operand) -> Option<Key> {
    match op {
        crate::ir::Operand::Temporary { id, .. } => Some(Key::Temp(*id)),
        crate::ir::Operand::Variable { name, .. } => Some(Key::Var(name.clone())),
        _ => None,
    }
}

pub struct DeadCodeElimination;

impl DeadCodeElimination {
    fn strip_unreachable_tails(instructions: Vec<Instruction>) -> (Vec<Instruction>, bool) {
        let mut out = Vec::with_capacity(instructions.len());
        let mut changed = false;
        let mut dead = false;
        for instr in instructions {
            if matches!(instr, Instruction::Label(_)) {
                dead = false;
            }
            if dead {
                changed = true;
                continue;
            }
            if matches!(instr, Instruction::Return(_) | Instruction::Jump(_)) {
                dead = true;
            }
            out.push(instr);
        }
        (out, changed)
    }

    fn remove_dead_stores(instructions: Vec<Instruction>) -> (Vec<Instruction>, bool) {
        let mut live: HashSet<Key> = HashSet::new();
        let mut kept: Vec<Instruction> = Vec::with_capacity(instructions.len());
        let mut changed = false;

        for instr in instructions.into_iter().rev() {
            let defined_key = instr.defined_operand().and_then(key_of);
            let keep = instr.is_side_effecting() || defined_key.as_ref().is_some_and(|k| live.contains(k));

            if !keep {
                changed = true;
                continue;
            }
            if let Some(k) = &defined_key {
                live.remove(k);
            }
            for used in instr.used_operands() {
                if let Some(k) = key_of(used) {
                    live.insert(k);
                }
            }
            kept.push(instr);
        }
        kept.reverse();
        (kept, changed)
    }
}

impl OptimizationPass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead_code_elimination"
    }

    fn run_on_function(&self, func: &mut IRFunction) -> bool {
        let instructions = std::mem::take(&mut func.instructions);
        let (instructions, changed_a) = Self::strip_unreachable_tails(instructions);
        let (instructions, changed_b) = Self::remove_dead_stores(instructions);
        func.instructions = instructions;
        changed_a || changed_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOpcode, Operand};
    use tlc_parser::ast::DataType;

    #[test]
    fn removes_code_after_return() {
        let mut f = IRFunction::new("f", DataType::Int, vec![]);
        f.emit(Instruction::Return(Some(Operand::IntConst(5))));
        f.emit(Instruction::Move {
            dest: Operand::Variable { name: "x".to_string(), ty: DataType::Int, array_size: None },
            src: Operand::IntConst(10),
        });
        assert!(DeadCodeElimination.run_on_function(&mut f));
        assert_eq!(f.instructions.len(), 1);
    }

    #[test]
    fn removes_unused_temporary() {
        let mut f = IRFunction::new("f", DataType::Int, vec![]);
        let dead = f.fresh_temp(DataType::Int);
        f.emit(Instruction::BinOp { op: BinOpcode::Add, dest: dead, lhs: Operand::IntConst(1), rhs: Operand::IntConst(2) });
        f.emit(Instruction::Return(Some(Operand::IntConst(0))));
        assert!(DeadCodeElimination.run_on_function(&mut f));
        assert_eq!(f.instructions.len(), 1);
    }

    #[test]
    fn keeps_store_used_by_return() {
        let mut f = IRFunction::new("f", DataType::Int, vec![]);
        let t = f.fresh_temp(DataType::Int);
        f.emit(Instruction::BinOp { op: BinOpcode::Add, dest: t.clone(), lhs: Operand::IntConst(1), rhs: Operand::IntConst(2) });
        f.emit(Instruction::Return(Some(t)));
        assert!(!DeadCodeElimination.run_on_function(&mut f));
        assert_eq!(f.instructions.len(), 2);
    }
}
