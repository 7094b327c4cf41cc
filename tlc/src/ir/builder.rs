//! Lowers a type-checked AST into [`super::IRProgram`].
//!
//! Re-derives each expression's type using the exact promotion/compatibility
//! rules [`crate::sema`] already applied, rather than carrying a parallel
//! typed-AST — see the design note on this in `DESIGN.md`.

use std::collections::HashMap;

use tlc_parser::ast::{BinOp, DataType, Expr, Function, Program, Stmt, UnOp};

use crate::sema::symbol::ScopeEntry;
use crate::sema::Analysis;

use super::{BinOpcode, Instruction, IRFunction, IRProgram, LoopContext, Operand};

const OUT_OF_BOUNDS_MESSAGE: &str = "Array index out of bounds";

pub struct Builder<'a> {
    analysis: &'a Analysis,
    /// Per-function local type environment, seeded from the symbol table at
    /// each function's scope and kept live as locals are declared.
    locals: HashMap<String, (DataType, Option<i64>)>,
}

impl<'a> Builder<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            locals: HashMap::new(),
        }
    }

    pub fn build(mut self, program: &Program) -> IRProgram {
        let mut ir = IRProgram::new();
        for function in &program.functions {
            if function.is_declaration_only {
                continue;
            }
            ir.functions.push(self.build_function(function));
        }
        ir.ffi_functions = program.ffi_functions.clone();
        ir
    }

    fn build_function(&mut self, function: &Function) -> IRFunction {
        self.locals.clear();
        let param_types: Vec<DataType> = function.params.iter().map(|p| p.ty.clone()).collect();
        let scope = *self
            .analysis
            .function_scopes
            .get(&(function.name.clone(), param_types.clone()))
            .expect("every analyzed function has a scope");
        self.seed_locals_from_scope(scope);

        let params = function
            .params
            .iter()
            .map(|p| Operand::Variable {
                name: p.name.clone(),
                ty: p.ty.clone(),
                array_size: None,
            })
            .collect();
        let mangled_name = self.analysis.mangled_name(&function.name, &param_types);
        let mut f = IRFunction::new(mangled_name, function.return_type.clone(), params);

        for stmt in &function.body {
            self.lower_stmt(&mut f, stmt, scope);
        }
        if !f.current_block_always_returns() {
            let default_return = match function.return_type {
                DataType::Void => None,
                DataType::String => Some(Operand::StringConst(String::new())),
                DataType::Float | DataType::Double => Some(Operand::FloatConst(0.0)),
                _ => Some(Operand::IntConst(0)),
            };
            f.emit(Instruction::Return(default_return));
        }

        if let Some(label) = f.out_of_bounds_label {
            f.emit(Instruction::Label(label));
            f.emit(Instruction::Print(Operand::StringConst(OUT_OF_BOUNDS_MESSAGE.to_string())));
            f.emit(Instruction::Return(Some(Operand::IntConst(1))));
        }
        f
    }

    fn seed_locals_from_scope(&mut self, scope: usize) {
        for symbol in self.analysis.symbols_in_scope(scope) {
            match symbol.array_elem_ty.clone() {
                Some(elem) => {
                    self.locals.insert(symbol.name.clone(), (elem, symbol.array_size));
                }
                None => {
                    self.locals.insert(symbol.name.clone(), (symbol.ty.clone(), None));
                }
            }
        }
    }

    fn local_type(&self, name: &str) -> DataType {
        self.locals
            .get(name)
            .map(|(ty, _)| ty.clone())
            .unwrap_or(DataType::Void)
    }

    fn local_array_size(&self, name: &str) -> Option<i64> {
        self.locals.get(name).and_then(|(_, size)| *size)
    }

    // ==================== Statements ====================

    fn lower_stmt(&mut self, f: &mut IRFunction, stmt: &Stmt, scope: usize) {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(f, expr, scope);
            }
            Stmt::VarDecl { name, ty, init, .. } => {
                self.locals.insert(name.clone(), (ty.clone(), None));
                f.emit(Instruction::VarDecl { name: name.clone(), ty: ty.clone() });
                if let Some(init) = init {
                    let value = self.lower_expr_coerced(f, init, ty, scope);
                    f.emit(Instruction::Move {
                        dest: Operand::Variable { name: name.clone(), ty: ty.clone(), array_size: None },
                        src: value,
                    });
                }
            }
            Stmt::ArrayDecl { name, elem_ty, size, init, .. } => {
                self.locals.insert(name.clone(), (elem_ty.clone(), Some(*size)));
                f.emit(Instruction::ArrayDecl { name: name.clone(), elem_ty: elem_ty.clone(), size: *size });
                if let Some(init) = init {
                    let value = self.lower_expr_coerced(f, init, elem_ty, scope);
                    f.emit(Instruction::ArrayInit { name: name.clone(), size: *size, value });
                }
            }
            Stmt::Assign { name, value, .. } => {
                let ty = self.local_type(name);
                let value = self.lower_expr_coerced(f, value, &ty, scope);
                f.emit(Instruction::Move {
                    dest: Operand::Variable { name: name.clone(), ty, array_size: None },
                    src: value,
                });
            }
            Stmt::IndexAssign { base, index, value, .. } => {
                let array_name = self.base_name(base);
                let elem_ty = self.local_type(&array_name);
                let index_op = self.lower_expr(f, index, scope);
                self.emit_bounds_check(f, &array_name, index_op.clone());
                let value_op = self.lower_expr_coerced(f, value, &elem_ty, scope);
                f.emit(Instruction::ArrayStore { array: array_name, index: index_op, value: value_op });
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                let cond_op = self.lower_expr(f, cond, scope);
                let else_label = f.fresh_label();
                f.emit(Instruction::JumpIfFalse { cond: cond_op, target: else_label });
                self.lower_stmt(f, then_branch, scope);
                match else_branch {
                    Some(else_branch) => {
                        let end_label = f.fresh_label();
                        if !then_branch.always_returns() {
                            f.emit(Instruction::Jump(end_label));
                        }
                        f.emit(Instruction::Label(else_label));
                        self.lower_stmt(f, else_branch, scope);
                        f.emit(Instruction::Label(end_label));
                    }
                    None => {
                        f.emit(Instruction::Label(else_label));
                    }
                }
            }
            Stmt::While { cond, body, .. } => {
                let head = f.fresh_label();
                let end = f.fresh_label();
                f.emit(Instruction::Label(head));
                let cond_op = self.lower_expr(f, cond, scope);
                f.emit(Instruction::JumpIfFalse { cond: cond_op, target: end });
                f.loop_stack.push(LoopContext { continue_target: head, break_target: end });
                self.lower_stmt(f, body, scope);
                f.loop_stack.pop();
                f.emit(Instruction::Jump(head));
                f.emit(Instruction::Label(end));
            }
            Stmt::Break { .. } => {
                let target = f.loop_stack.last().expect("checked in semantic analysis").break_target;
                f.emit(Instruction::Jump(target));
            }
            Stmt::Continue { .. } => {
                let target = f.loop_stack.last().expect("checked in semantic analysis").continue_target;
                f.emit(Instruction::Jump(target));
            }
            Stmt::Return { value, .. } => {
                let value = value.as_ref().map(|v| self.lower_expr(f, v, scope));
                f.emit(Instruction::Return(value));
            }
            Stmt::Print { args, .. } => {
                let ops: Vec<Operand> = args.iter().map(|a| self.lower_expr(f, a, scope)).collect();
                if ops.len() == 1 {
                    f.emit(Instruction::Print(ops.into_iter().next().unwrap()));
                } else {
                    f.emit(Instruction::PrintMultiple(ops));
                }
            }
            Stmt::Include { .. } => {}
            Stmt::Block { stmts, .. } => {
                for inner in stmts {
                    self.lower_stmt(f, inner, scope);
                }
            }
            Stmt::InlineAsm(asm) => {
                let outputs = asm
                    .outputs
                    .iter()
                    .map(|o| (o.constraint.clone(), self.lower_expr(f, &o.expr, scope)))
                    .collect();
                let inputs = asm
                    .inputs
                    .iter()
                    .map(|o| (o.constraint.clone(), self.lower_expr(f, &o.expr, scope)))
                    .collect();
                f.emit(Instruction::InlineAsm(super::InlineAsmInstr {
                    code: asm.code.clone(),
                    volatile: asm.volatile,
                    outputs,
                    inputs,
                    clobbers: asm.clobbers.clone(),
                }));
            }
        }
    }

    fn base_name(&self, expr: &Expr) -> String {
        match expr {
            Expr::Variable { name, .. } => name.clone(),
            _ => unreachable!("index assignment base is always a bare variable"),
        }
    }

    /// Skips the check when the array has a known fixed size and the index
    /// is a literal constant already proven in range (the semantic analyzer
    /// would have reported an error otherwise) — only a non-literal index,
    /// or one the analyzer couldn't statically bound, needs a runtime check.
    fn emit_bounds_check(&self, f: &mut IRFunction, array_name: &str, index: Operand) {
        if let Some(size) = self.local_array_size(array_name) {
            if let Operand::IntConst(value) = index {
                if value >= 0 && value < size {
                    return;
                }
            }
            let label = f.out_of_bounds_label();
            f.emit(Instruction::BoundsCheck { index, size, error_label: label });
        }
    }

    // ==================== Expressions ====================

    /// Lowers `expr`, then emits a widening `Move` into a fresh temporary if
    /// its type doesn't already match `target` (the implicit-conversion
    /// case `sema` already approved).
    fn lower_expr_coerced(&mut self, f: &mut IRFunction, expr: &Expr, target: &DataType, scope: usize) -> Operand {
        let value = self.lower_expr(f, expr, scope);
        if &value.ty() == target || value.ty() == DataType::Null {
            return value;
        }
        let coerced = f.fresh_temp(target.clone());
        f.emit(Instruction::Move { dest: coerced.clone(), src: value });
        coerced
    }

    fn lower_expr(&mut self, f: &mut IRFunction, expr: &Expr, scope: usize) -> Operand {
        match expr {
            Expr::IntLit { value, .. } => Operand::IntConst(*value),
            Expr::FloatLit { value, .. } => Operand::FloatConst(*value),
            Expr::BoolLit { value, .. } => Operand::IntConst(if *value { 1 } else { 0 }),
            Expr::StringLit { value, .. } => Operand::StringConst(value.clone()),
            Expr::NullLit { .. } => Operand::Null,
            Expr::Variable { name, .. } => {
                let ty = self.local_type(name);
                let array_size = self.local_array_size(name);
                Operand::Variable { name: name.clone(), ty, array_size }
            }
            Expr::Group { inner, .. } => self.lower_expr(f, inner, scope),
            Expr::Unary { op, operand, .. } => {
                let src = self.lower_expr(f, operand, scope);
                let dest = f.fresh_temp(src.ty());
                match op {
                    UnOp::Neg => f.emit(Instruction::Neg { dest: dest.clone(), src }),
                    UnOp::Not => f.emit(Instruction::Not { dest: dest.clone(), src }),
                }
                dest
            }
            Expr::Binary { op, lhs, rhs, .. } if *op == BinOp::Add && self.is_string_concat(lhs, rhs, scope) => {
                let lhs_op = self.lower_expr(f, lhs, scope);
                let rhs_op = self.lower_expr(f, rhs, scope);
                let dest = f.fresh_temp(DataType::String);
                f.emit(Instruction::Param(lhs_op));
                f.emit(Instruction::Param(rhs_op));
                f.emit(Instruction::Call {
                    dest: Some(dest.clone()),
                    name: "__tl_concat".to_string(),
                    arg_count: 2,
                });
                dest
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs_op = self.lower_expr(f, lhs, scope);
                let rhs_op = self.lower_expr(f, rhs, scope);
                let opcode = binop_to_opcode(*op);
                let result_ty = binary_result_type(*op, &lhs_op.ty(), &rhs_op.ty());
                let dest = f.fresh_temp(result_ty);
                f.emit(Instruction::BinOp { op: opcode, dest: dest.clone(), lhs: lhs_op, rhs: rhs_op });
                dest
            }
            Expr::Index { base, index, .. } => {
                let index_op = self.lower_expr(f, index, scope);
                match base.as_ref() {
                    Expr::Variable { name, .. } if self.local_array_size(name).is_some() => {
                        self.emit_bounds_check(f, name, index_op.clone());
                        let elem_ty = self.local_type(name);
                        let dest = f.fresh_temp(elem_ty);
                        f.emit(Instruction::ArrayLoad { dest: dest.clone(), array: name.clone(), index: index_op });
                        dest
                    }
                    _ => {
                        let base_op = self.lower_expr(f, base, scope);
                        let dest = f.fresh_temp(DataType::String);
                        f.emit(Instruction::Param(base_op));
                        f.emit(Instruction::Param(index_op));
                        f.emit(Instruction::Call {
                            dest: Some(dest.clone()),
                            name: "__tl_char_at".to_string(),
                            arg_count: 2,
                        });
                        dest
                    }
                }
            }
            Expr::Call { callee, args, .. } => self.lower_call(f, callee, args, scope),
        }
    }

    fn lower_call(&mut self, f: &mut IRFunction, callee: &str, args: &[Expr], scope: usize) -> Operand {
        let arg_ops: Vec<Operand> = args.iter().map(|a| self.lower_expr(f, a, scope)).collect();
        let arg_types: Vec<DataType> = arg_ops.iter().map(|a| a.ty()).collect();

        let (mangled, return_ty) = if let Some((ret, _)) = crate::sema::builtin_signature(callee) {
            (callee.to_string(), ret)
        } else {
            let global = self.analysis.symbols.global();
            let return_ty = match self.analysis.symbols.lookup(global, callee) {
                Some(ScopeEntry::Overloads(set)) => {
                    match crate::sema::overload::resolve_overload(set, &arg_types) {
                        crate::sema::overload::Resolution::Found(sym) => sym.ty.clone(),
                        _ => DataType::Void,
                    }
                }
                _ => DataType::Void,
            };
            (self.analysis.mangled_name(callee, &arg_types), return_ty)
        };

        for arg in &arg_ops {
            f.emit(Instruction::Param(arg.clone()));
        }
        let dest = if return_ty == DataType::Void {
            None
        } else {
            Some(f.fresh_temp(return_ty))
        };
        f.emit(Instruction::Call { dest: dest.clone(), name: mangled, arg_count: arg_ops.len() });
        dest.unwrap_or(Operand::Null)
    }

    fn is_string_concat(&self, lhs: &Expr, rhs: &Expr, scope: usize) -> bool {
        self.static_type(lhs, scope) == DataType::String && self.static_type(rhs, scope) == DataType::String
    }

    /// A cheap best-effort type probe used only to pick the string-concat
    /// lowering path; it never emits instructions.
    fn static_type(&self, expr: &Expr, _scope: usize) -> DataType {
        match expr {
            Expr::StringLit { .. } => DataType::String,
            Expr::Variable { name, .. } => self.local_type(name),
            Expr::Group { inner, .. } => self.static_type(inner, _scope),
            Expr::Call { callee, .. } => {
                crate::sema::builtin_signature(callee).map(|(ret, _)| ret).unwrap_or(DataType::Void)
            }
            Expr::Index { base, .. } => match self.static_type(base, _scope) {
                DataType::String => DataType::String,
                DataType::Array(elem) => *elem,
                _ => DataType::Void,
            },
            _ => DataType::Void,
        }
    }
}

fn binop_to_opcode(op: BinOp) -> BinOpcode {
    match op {
        BinOp::Add => BinOpcode::Add,
        BinOp::Sub => BinOpcode::Sub,
        BinOp::Mul => BinOpcode::Mul,
        BinOp::Div => BinOpcode::Div,
        BinOp::Mod => BinOpcode::Mod,
        BinOp::Eq => BinOpcode::Eq,
        BinOp::Ne => BinOpcode::Ne,
        BinOp::Lt => BinOpcode::Lt,
        BinOp::Le => BinOpcode::Le,
        BinOp::Gt => BinOpcode::Gt,
        BinOp::Ge => BinOpcode::Ge,
        BinOp::And => BinOpcode::And,
        BinOp::Or => BinOpcode::Or,
    }
}

fn binary_result_type(op: BinOp, lhs: &DataType, rhs: &DataType) -> DataType {
    use BinOp::*;
    match op {
        Eq | Ne | Lt | Le | Gt | Ge | And | Or => DataType::Bool,
        Add if *lhs == DataType::String => DataType::String,
        _ => {
            if *lhs == DataType::Double || *rhs == DataType::Double {
                DataType::Double
            } else if *lhs == DataType::Float || *rhs == DataType::Float {
                DataType::Float
            } else {
                DataType::Int
            }
        }
    }
}

pub fn build(program: &Program, analysis: &Analysis) -> IRProgram {
    Builder::new(analysis).build(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(src: &str) -> IRProgram {
        let (program, mut diagnostics) = tlc_parser::parse(src, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        let analysis = crate::sema::analyze(&program, &mut diagnostics, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        build(&program, &analysis)
    }

    #[test]
    fn while_loop_lowers_with_matching_labels() {
        let ir = lower("func f() -> int { let i: int = 0; while (i < 10) { i = i + 1; } return i; }");
        let f = &ir.functions[0];
        let labels: usize = f.instructions.iter().filter(|i| matches!(i, Instruction::Label(_))).count();
        assert_eq!(labels, 2);
    }

    #[test]
    fn non_literal_array_index_emits_bounds_check() {
        let ir = lower("func f(i: int) -> int { let arr: int[5] = 0; return arr[i]; }");
        let f = &ir.functions[0];
        assert!(f.instructions.iter().any(|i| matches!(i, Instruction::BoundsCheck { .. })));
        assert!(f.out_of_bounds_label.is_some());
    }

    #[test]
    fn statically_in_range_literal_index_skips_bounds_check() {
        let ir = lower("func f() -> int { let arr: int[5] = 0; return arr[2]; }");
        let f = &ir.functions[0];
        assert!(!f.instructions.iter().any(|i| matches!(i, Instruction::BoundsCheck { .. })));
    }

    #[test]
    fn string_concat_lowers_to_runtime_call() {
        let ir = lower(r#"func f() -> string { let a: string = "x"; let b: string = "y"; return a + b; }"#);
        let f = &ir.functions[0];
        assert!(f.instructions.iter().any(
            |i| matches!(i, Instruction::Call { name, .. } if name == "__tl_concat")
        ));
    }

    #[test]
    fn overload_call_uses_mangled_name() {
        let ir = lower(
            r#"
            func id(x: int) -> int { return x; }
            func id(x: double) -> double { return x; }
            func f() -> int { return id(1); }
            "#,
        );
        let f = ir.functions.iter().find(|f| f.name == "f").unwrap();
        assert!(f.instructions.iter().any(
            |i| matches!(i, Instruction::Call { name, .. } if name == "id__i")
        ));
        assert!(ir.functions.iter().any(|f| f.name == "id__i"));
        assert!(ir.functions.iter().any(|f| f.name == "id__d"));
    }
}
