//! Copy propagation: `y = x; ...; use(y)` becomes `use(x)` wherever `x`
//! hasn't been redefined in between. Chases transitively (`z = y; y = x`
//! resolves `z` all the way to `x`) and invalidates any copy whose source
//! has since been overwritten.

use std::collections::HashMap;

use crate::ir::{IRFunction, Instruction, Operand};

use super::OptimizationPass;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Temp(u32),
    Var(String),
}

fn key_of(op: &Operand) -> Option<Key> {
    match op {
        Operand::Temporary { id, .. } => Some(Key::Temp(*id)),
        Operand::Variable { name, .. } => Some(Key::Var(name.clone())),
        _ => None,
    }
}

pub struct CopyPropagation;

impl CopyPropagation {
    fn resolve(op: &Operand, copies: &HashMap<Key, Operand>) -> Operand {
        let mut current = op.clone();
        let mut guard = 0;
        while let Some(key) = key_of(&current) {
            match copies.get(&key) {
                Some(next) if *next != current && guard < 64 => {
                    current = next.clone();
                    guard += 1;
                }
                _ => break,
            }
        }
        current
    }

    fn invalidate(copies: &mut HashMap<Key, Operand>, dest_key: &Key) {
        copies.remove(dest_key);
        copies.retain(|_, value| key_of(value).as_ref() != Some(dest_key));
    }
}

impl OptimizationPass for CopyPropagation {
    fn name(&self) -> &str {
        "copy_propagation"
    }

    fn run_on_function(&self, func: &mut IRFunction) -> bool {
        let mut copies: HashMap<Key, Operand> = HashMap::new();
        let mut changed = false;

        for instr in &mut func.instructions {
            if matches!(instr, Instruction::Label(_)) {
                copies.clear();
                continue;
            }

            for used in instr.used_operands_mut() {
                let resolved = Self::resolve(used, &copies);
                if resolved != *used {
                    *used = resolved;
                    changed = true;
                }
            }

            if let Some(dest) = instr.defined_operand().cloned() {
                if let Some(dest_key) = key_of(&dest) {
                    Self::invalidate(&mut copies, &dest_key);
                    if let Instruction::Move { src, .. } = instr {
                        if key_of(src).is_some() {
                            copies.insert(dest_key, src.clone());
                        }
                    }
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOpcode;
    use tlc_parser::ast::DataType;

    fn var(name: &str) -> Operand {
        Operand::Variable { name: name.to_string(), ty: DataType::Int, array_size: None }
    }

    #[test]
    fn propagates_a_simple_copy() {
        let mut f = IRFunction::new("f", DataType::Int, vec![]);
        f.emit(Instruction::Move { dest: var("y"), src: var("x") });
        let t = f.fresh_temp(DataType::Int);
        f.emit(Instruction::BinOp { op: BinOpcode::Add, dest: t, lhs: var("y"), rhs: Operand::IntConst(1) });
        assert!(CopyPropagation.run_on_function(&mut f));
        assert!(matches!(&f.instructions[1], Instruction::BinOp { lhs: Operand::Variable { name, .. }, .. } if name == "x"));
    }

    #[test]
    fn stops_propagating_after_source_is_redefined() {
        let mut f = IRFunction::new("f", DataType::Int, vec![]);
        f.emit(Instruction::Move { dest: var("y"), src: var("x") });
        f.emit(Instruction::Move { dest: var("x"), src: Operand::IntConst(9) });
        let t = f.fresh_temp(DataType::Int);
        f.emit(Instruction::BinOp { op: BinOpcode::Add, dest: t, lhs: var("y"), rhs: Operand::IntConst(1) });
        CopyPropagation.run_on_function(&mut f);
        assert!(matches!(&f.instructions[2], Instruction::BinOp { lhs: Operand::Variable { name, .. }, .. } if name == "y"));
    }
}
