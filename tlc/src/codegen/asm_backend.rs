//! Lowers the optimized IR to x86-64 NASM, targeting the Windows x64 ABI.
//!
//! Unlike the C back end, locals here are not stack slots: every variable,
//! temporary and array gets one fixed cell in `.data`, named
//! `<function>_<local>`, addressed `[rel ...]`. This mirrors the flat,
//! non-reentrant storage model the language's asm target is scoped to (see
//! the no-recursion note in `DESIGN.md`) — it keeps operand addressing
//! uniform regardless of whether a value came from a register argument or
//! a `let`.

use std::collections::BTreeMap;

use tlc_parser::ast::DataType;

use crate::ir::{BinOpcode, IRFunction, IRProgram, Instruction, LabelId, Operand};

use super::Writer;

const ARG_REGS: [&str; 4] = ["rcx", "rdx", "r8", "r9"];

pub fn generate_asm(program: &IRProgram) -> String {
    let mut w = Writer::new();
    emit_header(&mut w, program);
    emit_data_section(&mut w, program);
    emit_text_section(&mut w, program);
    w.into_string()
}

fn emit_header(w: &mut Writer, program: &IRProgram) {
    w.raw_line("bits 64");
    w.raw_line("default rel");
    w.blank();
    w.raw_line("extern __imp_printf");
    w.raw_line("extern __imp_ExitProcess");
    if uses_strings(program) {
        w.raw_line("extern __imp_malloc");
        w.raw_line("extern __imp_strlen");
        w.raw_line("extern __imp_memcpy");
        w.raw_line("extern __imp_strcmp");
        w.raw_line("extern __imp_scanf");
    }
    for ffi in &program.ffi_functions {
        w.raw_line(format!("extern __imp_{}", ffi.name));
    }
    w.blank();
}

fn uses_strings(program: &IRProgram) -> bool {
    program.functions.iter().any(|f| {
        f.instructions.iter().any(|i| match i {
            Instruction::Call { name, .. } => name.starts_with("__tl_") || BUILTIN_RUNTIME_NAMES.contains(&name.as_str()),
            _ => false,
        })
    })
}

fn emit_data_section(w: &mut Writer, program: &IRProgram) {
    w.raw_line("section .data");
    w.line("format_int db \"%lld\", 0");
    w.line("format_float db \"%f\", 0");
    w.line("format_str db \"%s\", 0");
    w.line("true_str db \"true\", 0");
    w.line("false_str db \"false\", 0");
    w.line("newline db 10, 0");
    if uses_strings(program) {
        w.line("input_fmt db \"%4095[^\", 10, \"]\", 0");
    }
    w.blank();

    for f in &program.functions {
        for (i, param) in f.params.iter().enumerate() {
            if let Operand::Variable { name, .. } = param {
                w.line(format!("{}_{}: dq 0 ; param {} ({})", f.name, name, i, name));
            }
        }
        for (name, ty) in collect_named_locals(f) {
            if let DataType::Array(_) = ty {
                continue;
            }
            w.line(format!("{}_{}: dq 0", f.name, name));
        }
        for (name, _elem_ty, size) in collect_arrays(f) {
            w.line(format!("{}_{}: times {} dq 0", f.name, name, size));
        }
        for id in collect_temp_ids(f) {
            w.line(format!("{}_temp_{}: dq 0", f.name, id));
        }
        for (id, s) in collect_string_consts(f) {
            w.line(format!("{}_str_{}: db \"{}\", 0", f.name, id, escape_asm_string(s)));
        }
    }
    w.blank();
}

fn escape_asm_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Every `Variable` operand name mentioned anywhere in the body, minus
/// parameters (already covered by the per-param cells above) and minus
/// fixed-size arrays (handled as their own `resq`-style block).
fn collect_named_locals(f: &IRFunction) -> Vec<(String, DataType)> {
    let param_names: std::collections::HashSet<&str> = f
        .params
        .iter()
        .filter_map(|p| p.as_variable_name())
        .collect();
    let mut seen = BTreeMap::new();
    let mut visit = |op: &Operand| {
        if let Operand::Variable { name, ty, array_size } = op {
            if array_size.is_none() && !param_names.contains(name.as_str()) {
                seen.entry(name.clone()).or_insert_with(|| ty.clone());
            }
        }
    };
    for instr in &f.instructions {
        for op in instr.used_operands() {
            visit(op);
        }
        if let Some(op) = instr.defined_operand() {
            visit(op);
        }
        if let Instruction::VarDecl { name, ty } = instr {
            seen.entry(name.clone()).or_insert_with(|| ty.clone());
        }
    }
    seen.into_iter().collect()
}

fn collect_arrays(f: &IRFunction) -> Vec<(String, DataType, i64)> {
    f.instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::ArrayDecl { name, elem_ty, size } => Some((name.clone(), elem_ty.clone(), *size)),
            _ => None,
        })
        .collect()
}

fn collect_temp_ids(f: &IRFunction) -> Vec<u32> {
    let mut ids = std::collections::BTreeSet::new();
    for instr in &f.instructions {
        for op in instr.used_operands() {
            if let Operand::Temporary { id, .. } = op {
                ids.insert(*id);
            }
        }
        if let Some(Operand::Temporary { id, .. }) = instr.defined_operand() {
            ids.insert(*id);
        }
    }
    ids.into_iter().collect()
}

/// String literals get their own numbered `.data` cell per function —
/// there is no heap string-literal table in this backend, just static
/// storage addressed the same way every other local is.
fn collect_string_consts(f: &IRFunction) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut next = 0usize;
    for instr in &f.instructions {
        for op in instr.used_operands() {
            if let Operand::StringConst(s) = op {
                out.push((next, s.as_str()));
                next += 1;
            }
        }
    }
    out
}

fn cell(f: &IRFunction, name: &str) -> String {
    format!("{}_{}", f.name, name)
}

fn emit_text_section(w: &mut Writer, program: &IRProgram) {
    w.raw_line("section .text");
    w.raw_line("global _start");
    w.blank();

    w.raw_line("_start:");
    w.indent();
    w.line("sub rsp, 40");
    w.line("call main");
    w.line("mov rcx, rax");
    w.line("call [rel __imp_ExitProcess]");
    w.dedent();
    w.blank();

    if uses_strings(program) {
        emit_string_runtime(w);
    }

    for f in &program.functions {
        emit_function(w, f, program);
        w.blank();
    }
}

/// The six `__tl_*` string builtins, implemented as real callable
/// procedures over the Win64 import table — the asm-backend counterpart of
/// `c_backend.rs`'s `emit_string_runtime`, same semantics, NASM instead of
/// C. Each follows the same `push rbp` / `mov rbp, rsp` / `sub rsp, N`
/// frame shape as `emit_function`, with enough headroom below its locals
/// to leave 32 bytes of shadow space for the callees it invokes.
fn emit_string_runtime(w: &mut Writer) {
    w.raw_line("__tl_concat:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 64");
    w.line("mov [rbp-8], rcx"); // a
    w.line("mov [rbp-16], rdx"); // b
    w.line("mov rcx, [rbp-8]");
    w.line("call __tl_strlen");
    w.line("mov [rbp-24], rax"); // la
    w.line("mov rcx, [rbp-16]");
    w.line("call __tl_strlen");
    w.line("mov [rbp-32], rax"); // lb
    w.line("mov rax, [rbp-24]");
    w.line("add rax, [rbp-32]");
    w.line("add rax, 1");
    w.line("mov rcx, rax");
    w.line("call [rel __imp_malloc]");
    w.line("mov [rbp-40], rax"); // out
    w.line("mov rcx, rax");
    w.line("mov rdx, [rbp-8]");
    w.line("mov r8, [rbp-24]");
    w.line("call [rel __imp_memcpy]");
    w.line("mov rax, [rbp-40]");
    w.line("add rax, [rbp-24]");
    w.line("mov rcx, rax");
    w.line("mov rdx, [rbp-16]");
    w.line("mov r8, [rbp-32]");
    w.line("call [rel __imp_memcpy]");
    w.line("mov rax, [rbp-40]");
    w.line("add rax, [rbp-24]");
    w.line("add rax, [rbp-32]");
    w.line("mov byte [rax], 0");
    w.line("mov rax, [rbp-40]");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();

    w.raw_line("__tl_strlen:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 32");
    w.line("call [rel __imp_strlen]");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();

    w.raw_line("__tl_strcmp:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 32");
    w.line("call [rel __imp_strcmp]");
    w.line("movsxd rax, eax");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();

    w.raw_line("__tl_substr:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 64");
    w.line("mov [rbp-8], rcx"); // s
    w.line("mov [rbp-16], rdx"); // start
    w.line("mov [rbp-24], r8"); // len
    w.line("call __tl_strlen");
    w.line("mov [rbp-32], rax"); // slen
    w.line("cmp qword [rbp-16], 0");
    w.line("jge __tl_substr_start_ok");
    w.line("mov qword [rbp-16], 0");
    w.raw_line("__tl_substr_start_ok:");
    w.line("mov rax, [rbp-16]");
    w.line("cmp rax, [rbp-32]");
    w.line("jle __tl_substr_start_clamped");
    w.line("mov rax, [rbp-32]");
    w.line("mov [rbp-16], rax");
    w.raw_line("__tl_substr_start_clamped:");
    w.line("mov rax, [rbp-32]");
    w.line("sub rax, [rbp-16]"); // avail
    w.line("mov r10, rax");
    w.line("mov rax, [rbp-24]");
    w.line("cmp rax, 0");
    w.line("jge __tl_substr_len_nonneg");
    w.line("xor rax, rax");
    w.raw_line("__tl_substr_len_nonneg:");
    w.line("cmp rax, r10");
    w.line("jle __tl_substr_take_ok");
    w.line("mov rax, r10");
    w.raw_line("__tl_substr_take_ok:");
    w.line("mov [rbp-40], rax"); // take
    w.line("add rax, 1");
    w.line("mov rcx, rax");
    w.line("call [rel __imp_malloc]");
    w.line("mov [rbp-48], rax"); // out
    w.line("mov rcx, rax");
    w.line("mov rdx, [rbp-8]");
    w.line("add rdx, [rbp-16]");
    w.line("mov r8, [rbp-40]");
    w.line("call [rel __imp_memcpy]");
    w.line("mov rax, [rbp-48]");
    w.line("add rax, [rbp-40]");
    w.line("mov byte [rax], 0");
    w.line("mov rax, [rbp-48]");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();

    w.raw_line("__tl_char_at:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 64");
    w.line("mov [rbp-8], rcx"); // s
    w.line("mov [rbp-16], rdx"); // index
    w.line("call __tl_strlen");
    w.line("mov [rbp-24], rax"); // slen
    w.line("mov rcx, 2");
    w.line("call [rel __imp_malloc]");
    w.line("mov [rbp-32], rax"); // out
    w.line("cmp qword [rbp-16], 0");
    w.line("jl __tl_char_at_empty");
    w.line("mov rax, [rbp-16]");
    w.line("cmp rax, [rbp-24]");
    w.line("jge __tl_char_at_empty");
    w.line("mov rax, [rbp-8]");
    w.line("add rax, [rbp-16]");
    w.line("movzx rax, byte [rax]");
    w.line("mov rcx, [rbp-32]");
    w.line("mov [rcx], al");
    w.line("jmp __tl_char_at_done");
    w.raw_line("__tl_char_at_empty:");
    w.line("mov rax, [rbp-32]");
    w.line("mov byte [rax], 0");
    w.raw_line("__tl_char_at_done:");
    w.line("mov rax, [rbp-32]");
    w.line("mov byte [rax+1], 0");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();

    w.raw_line("__tl_input:");
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 64");
    w.line("mov rcx, 4096");
    w.line("call [rel __imp_malloc]");
    w.line("mov [rbp-8], rax"); // buf
    w.line("mov byte [rax], 0");
    w.line("lea rcx, [rel input_fmt]");
    w.line("mov rdx, [rbp-8]");
    w.line("call [rel __imp_scanf]");
    w.line("mov rax, [rbp-8]");
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
    w.blank();
}

fn emit_function(w: &mut Writer, f: &IRFunction, program: &IRProgram) {
    w.raw_line(format!("{}:", f.name));
    w.indent();
    w.line("push rbp");
    w.line("mov rbp, rsp");
    w.line("sub rsp, 32");

    for (i, param) in f.params.iter().enumerate().take(4) {
        if let Operand::Variable { name, .. } = param {
            w.line(format!("mov [rel {}], {}", cell(f, name), ARG_REGS[i]));
        }
    }

    let mut string_const_ids: BTreeMap<String, usize> = BTreeMap::new();
    for (id, s) in collect_string_consts(f) {
        string_const_ids.insert(s.to_string(), id);
    }

    let mut pending_params: Vec<Operand> = Vec::new();
    for instr in &f.instructions {
        emit_instruction(w, f, program, instr, &string_const_ids, &mut pending_params);
    }

    w.raw_line(format!("{}_epilogue:", f.name));
    w.line("mov rsp, rbp");
    w.line("pop rbp");
    w.line("ret");
    w.dedent();
}

fn operand_mem(f: &IRFunction, op: &Operand, string_ids: &BTreeMap<String, usize>) -> Option<String> {
    match op {
        Operand::Variable { name, .. } => Some(format!("[rel {}]", cell(f, name))),
        Operand::Temporary { id, .. } => Some(format!("[rel {}_temp_{}]", f.name, id)),
        Operand::StringConst(s) => {
            let id = string_ids.get(s).expect("string const indexed during .data emission");
            Some(format!("{}_str_{}", f.name, id))
        }
        _ => None,
    }
}

/// Loads `op` into `reg` — from memory, or as an immediate if it's a
/// constant (NASM can't `idiv`/`cmp` most opcodes against a raw immediate
/// and a memory operand in the same instruction, so everything funnels
/// through a register first).
fn load_into(w: &mut Writer, f: &IRFunction, reg: &str, op: &Operand, string_ids: &BTreeMap<String, usize>) {
    match op {
        Operand::IntConst(v) => w.line(format!("mov {reg}, {v}")),
        Operand::Null => w.line(format!("xor {reg}, {reg}")),
        Operand::StringConst(s) => {
            let id = string_ids.get(s).expect("string const indexed during .data emission");
            w.line(format!("lea {reg}, [rel {}_str_{}]", f.name, id));
        }
        Operand::FloatConst(v) => {
            w.line(format!("mov {reg}, {}", v.to_bits()));
        }
        _ => {
            let mem = operand_mem(f, op, string_ids).expect("operand has a memory location");
            w.line(format!("mov {reg}, {mem}"));
        }
    }
}

fn store_from(w: &mut Writer, f: &IRFunction, reg: &str, dest: &Operand, string_ids: &BTreeMap<String, usize>) {
    let mem = operand_mem(f, dest, string_ids).expect("destination always addressable");
    w.line(format!("mov {mem}, {reg}"));
}

fn is_float_ty(ty: &DataType) -> bool {
    matches!(ty, DataType::Float | DataType::Double)
}

fn emit_instruction(
    w: &mut Writer,
    f: &IRFunction,
    program: &IRProgram,
    instr: &Instruction,
    string_ids: &BTreeMap<String, usize>,
    pending_params: &mut Vec<Operand>,
) {
    match instr {
        Instruction::Nop | Instruction::VarDecl { .. } | Instruction::ArrayDecl { .. } => {}
        Instruction::Label(id) => w.raw_line(format!("{}:", flabel(f, *id))),
        Instruction::Move { dest, src } => {
            load_into(w, f, "rax", src, string_ids);
            store_from(w, f, "rax", dest, string_ids);
        }
        Instruction::BinOp { op, dest, lhs, rhs } => emit_binop(w, f, *op, dest, lhs, rhs, string_ids),
        Instruction::Neg { dest, src } => {
            load_into(w, f, "rax", src, string_ids);
            w.line("neg rax");
            store_from(w, f, "rax", dest, string_ids);
        }
        Instruction::Not { dest, src } => {
            load_into(w, f, "rax", src, string_ids);
            w.line("xor rax, 1");
            store_from(w, f, "rax", dest, string_ids);
        }
        Instruction::Jump(target) => w.line(format!("jmp {}", flabel(f, *target))),
        Instruction::JumpIf { cond, target } => {
            load_into(w, f, "rax", cond, string_ids);
            w.line("test rax, rax");
            w.line(format!("jnz {}", flabel(f, *target)));
        }
        Instruction::JumpIfFalse { cond, target } => {
            load_into(w, f, "rax", cond, string_ids);
            w.line("test rax, rax");
            w.line(format!("jz {}", flabel(f, *target)));
        }
        Instruction::Param(op) => pending_params.push(op.clone()),
        Instruction::Call { dest, name, arg_count } => {
            let start = pending_params.len().saturating_sub(*arg_count);
            let args: Vec<Operand> = pending_params.split_off(start);
            emit_call(w, f, name, &args, string_ids, program);
            if let Some(dest) = dest {
                store_from(w, f, "rax", dest, string_ids);
            }
        }
        Instruction::Return(Some(v)) => {
            load_into(w, f, "rax", v, string_ids);
            w.line(format!("jmp {}_epilogue", f.name));
        }
        Instruction::Return(None) => w.line(format!("jmp {}_epilogue", f.name)),
        Instruction::Print(v) => emit_print(w, f, std::slice::from_ref(v), string_ids),
        Instruction::PrintMultiple(vs) => emit_print(w, f, vs, string_ids),
        Instruction::ArrayLoad { dest, array, index } => {
            emit_array_address(w, f, array, index, string_ids);
            w.line("mov rax, [rax]");
            store_from(w, f, "rax", dest, string_ids);
        }
        Instruction::ArrayStore { array, index, value } => {
            emit_array_address(w, f, array, index, string_ids);
            w.line("push rax");
            load_into(w, f, "rbx", value, string_ids);
            w.line("pop rax");
            w.line("mov [rax], rbx");
        }
        Instruction::BoundsCheck { index, size, error_label } => {
            load_into(w, f, "rax", index, string_ids);
            w.line("cmp rax, 0");
            w.line(format!("jl {}", flabel(f, *error_label)));
            w.line(format!("cmp rax, {size}"));
            w.line(format!("jge {}", flabel(f, *error_label)));
        }
        Instruction::ArrayInit { name, size, value } => {
            w.line(format!("lea rbx, [rel {}]", cell(f, name)));
            load_into(w, f, "rax", value, string_ids);
            for i in 0..*size {
                w.line(format!("mov [rbx + {}], rax", i * 8));
            }
        }
        Instruction::InlineAsm(asm) => emit_inline_asm(w, f, asm, string_ids),
    }
}

fn emit_array_address(w: &mut Writer, f: &IRFunction, array: &str, index: &Operand, string_ids: &BTreeMap<String, usize>) {
    load_into(w, f, "r10", index, string_ids);
    w.line("imul r10, 8");
    w.line(format!("lea rax, [rel {}]", cell(f, array)));
    w.line("add rax, r10");
}

fn emit_binop(
    w: &mut Writer,
    f: &IRFunction,
    op: BinOpcode,
    dest: &Operand,
    lhs: &Operand,
    rhs: &Operand,
    string_ids: &BTreeMap<String, usize>,
) {
    if is_float_ty(&lhs.ty()) || is_float_ty(&rhs.ty()) {
        emit_float_binop(w, f, op, dest, lhs, rhs, string_ids);
        return;
    }

    match op {
        BinOpcode::Mul => {
            load_into(w, f, "rax", lhs, string_ids);
            load_into(w, f, "r10", rhs, string_ids);
            w.line("imul rax, r10");
        }
        BinOpcode::Div | BinOpcode::Mod => {
            load_into(w, f, "rax", lhs, string_ids);
            w.line("cqo");
            load_into(w, f, "r10", rhs, string_ids);
            w.line("idiv r10");
            if op == BinOpcode::Mod {
                w.line("mov rax, rdx");
            }
        }
        BinOpcode::Add | BinOpcode::Sub | BinOpcode::And | BinOpcode::Or => {
            load_into(w, f, "rax", lhs, string_ids);
            load_into(w, f, "r10", rhs, string_ids);
            let mnemonic = match op {
                BinOpcode::Add => "add",
                BinOpcode::Sub => "sub",
                BinOpcode::And => "and",
                BinOpcode::Or => "or",
                _ => unreachable!(),
            };
            w.line(format!("{mnemonic} rax, r10"));
        }
        BinOpcode::Eq | BinOpcode::Ne | BinOpcode::Lt | BinOpcode::Le | BinOpcode::Gt | BinOpcode::Ge => {
            load_into(w, f, "rax", lhs, string_ids);
            load_into(w, f, "r10", rhs, string_ids);
            w.line("cmp rax, r10");
            let setcc = match op {
                BinOpcode::Eq => "sete",
                BinOpcode::Ne => "setne",
                BinOpcode::Lt => "setl",
                BinOpcode::Le => "setle",
                BinOpcode::Gt => "setg",
                BinOpcode::Ge => "setge",
                _ => unreachable!(),
            };
            w.line(format!("{setcc} al"));
            w.line("movzx rax, al");
        }
    }
    store_from(w, f, "rax", dest, string_ids);
}

fn emit_float_binop(
    w: &mut Writer,
    f: &IRFunction,
    op: BinOpcode,
    dest: &Operand,
    lhs: &Operand,
    rhs: &Operand,
    string_ids: &BTreeMap<String, usize>,
) {
    load_into(w, f, "rax", lhs, string_ids);
    w.line("movq xmm0, rax");
    load_into(w, f, "r10", rhs, string_ids);
    w.line("movq xmm1, r10");
    match op {
        BinOpcode::Add => w.line("addsd xmm0, xmm1"),
        BinOpcode::Sub => w.line("subsd xmm0, xmm1"),
        BinOpcode::Mul => w.line("mulsd xmm0, xmm1"),
        BinOpcode::Div => w.line("divsd xmm0, xmm1"),
        BinOpcode::Eq | BinOpcode::Ne | BinOpcode::Lt | BinOpcode::Le | BinOpcode::Gt | BinOpcode::Ge => {
            w.line("comisd xmm0, xmm1");
            let setcc = match op {
                BinOpcode::Eq => "sete",
                BinOpcode::Ne => "setne",
                BinOpcode::Lt => "setb",
                BinOpcode::Le => "setbe",
                BinOpcode::Gt => "seta",
                BinOpcode::Ge => "setae",
                _ => unreachable!(),
            };
            w.line(format!("{setcc} al"));
            w.line("movzx rax, al");
            store_from(w, f, "rax", dest, string_ids);
            return;
        }
        _ => unreachable!("logical/integer opcodes never reach the float path"),
    }
    w.line("movq rax, xmm0");
    store_from(w, f, "rax", dest, string_ids);
}

fn emit_call(
    w: &mut Writer,
    f: &IRFunction,
    name: &str,
    args: &[Operand],
    string_ids: &BTreeMap<String, usize>,
    program: &IRProgram,
) {
    for (i, arg) in args.iter().enumerate().take(4) {
        load_into(w, f, ARG_REGS[i], arg, string_ids);
    }
    if args.len() > 4 {
        // Extra args spill to the stack above the 32-byte shadow space, in
        // order, matching the Windows x64 convention for a >4-arg call.
        for (i, arg) in args.iter().enumerate().skip(4) {
            load_into(w, f, "rax", arg, string_ids);
            w.line(format!("mov [rsp + {}], rax", 32 + (i - 4) * 8));
        }
    }
    let target = call_target(name, program);
    w.line(format!("call {target}"));
}

const BUILTIN_RUNTIME_NAMES: &[&str] = &["input", "concat", "substr", "strlen", "strcmp"];

fn call_target(name: &str, program: &IRProgram) -> String {
    if program.ffi_functions.iter().any(|ffi| ffi.name == name) {
        format!("[rel __imp_{name}]")
    } else if name.starts_with("__tl_") {
        // `__tl_*` string builtins are real procedures defined by
        // `emit_string_runtime`, called directly like any other local label.
        name.to_string()
    } else if BUILTIN_RUNTIME_NAMES.contains(&name) {
        format!("__tl_{name}")
    } else {
        name.to_string()
    }
}

fn emit_print(w: &mut Writer, f: &IRFunction, values: &[Operand], string_ids: &BTreeMap<String, usize>) {
    w.line("sub rsp, 40");
    let format_label = if values.len() == 1 {
        match values[0].ty() {
            DataType::Float | DataType::Double => "format_float",
            DataType::String => "format_str",
            _ => "format_int",
        }
    } else {
        "format_str"
    };
    w.line(format!("lea rcx, [rel {format_label}]"));
    for (i, v) in values.iter().enumerate().take(3) {
        let reg = ARG_REGS[i + 1];
        match v.ty() {
            DataType::Bool => {
                load_into(w, f, "rax", v, string_ids);
                w.line("test rax, rax");
                let skip = format!("{}_print_false_{}", f.name, i);
                let done = format!("{}_print_done_{}", f.name, i);
                w.line(format!("jz {skip}"));
                w.line(format!("lea {reg}, [rel true_str]"));
                w.line(format!("jmp {done}"));
                w.raw_line(format!("{skip}:"));
                w.line(format!("lea {reg}, [rel false_str]"));
                w.raw_line(format!("{done}:"));
            }
            _ => load_into(w, f, reg, v, string_ids),
        }
    }
    w.line("call [rel __imp_printf]");
    w.line("add rsp, 40");
}

/// TL inline-asm bindings are simple positional substitution: each
/// constraint names a register directly, not a GCC-style class — the
/// caller moves operands in and out around the verbatim code block.
fn emit_inline_asm(w: &mut Writer, f: &IRFunction, asm: &crate::ir::InlineAsmInstr, string_ids: &BTreeMap<String, usize>) {
    for (constraint, op) in &asm.inputs {
        load_into(w, f, constraint, op, string_ids);
    }
    for line in asm.code.lines() {
        w.raw_line(line);
    }
    for (constraint, op) in &asm.outputs {
        store_from(w, f, constraint, op, string_ids);
    }
}

fn flabel(f: &IRFunction, id: LabelId) -> String {
    format!("{}_{}", f.name, f.label_name(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;

    fn build_ir(src: &str) -> IRProgram {
        let (program, mut diagnostics) = tlc_parser::parse(src, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        let analysis = crate::sema::analyze(&program, &mut diagnostics, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        ir::builder::build(&program, &analysis)
    }

    #[test]
    fn emits_entry_point_and_exit() {
        let ir = build_ir("func main() -> int { return 0; }");
        let asm = generate_asm(&ir);
        assert!(asm.contains("_start:"));
        assert!(asm.contains("call main"));
        assert!(asm.contains("__imp_ExitProcess"));
    }

    #[test]
    fn emits_bounds_check_jumps() {
        let ir = build_ir("func f() -> int { let a: int[3] = 0; return a[1]; }");
        let asm = generate_asm(&ir);
        assert!(asm.contains("jl "));
        assert!(asm.contains("jge "));
    }

    #[test]
    fn emits_comparison_setcc() {
        let ir = build_ir("func f() -> int { let i: int = 0; while (i < 10) { i = i + 1; } return i; }");
        let asm = generate_asm(&ir);
        assert!(asm.contains("setl al"));
    }

    #[test]
    fn string_concat_calls_a_real_runtime_procedure() {
        let ir = build_ir(r#"func f() -> string { return "a" + "b"; }"#);
        let asm = generate_asm(&ir);
        assert!(asm.contains("call __tl_concat"));
        assert!(asm.contains("__tl_concat:"));
        assert!(asm.contains("call [rel __imp_malloc]"));
        assert!(asm.contains("call [rel __imp_memcpy]"));
    }

    #[test]
    fn bare_builtin_call_resolves_to_its_tl_prefixed_procedure() {
        let ir = build_ir(r#"func f() -> int { return strlen("hi"); }"#);
        let asm = generate_asm(&ir);
        assert!(asm.contains("call __tl_strlen"));
        assert!(asm.contains("__tl_strlen:"));
        assert!(asm.contains("call [rel __imp_strlen]"));
    }
}
