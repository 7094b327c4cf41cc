//! Lowers the optimized IR to portable C (C99), the default back end.
//!
//! Every declared local and temporary is hoisted to the top of its function
//! (matching how the IR builder already treats a function as one flat
//! scope), so `VarDecl`/`ArrayDecl` instructions become no-ops at their
//! original position — they only exist in the instruction stream to mark
//! where initialization (if any) runs.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use tlc_parser::ast::{DataType, FfiFunction};

use crate::ir::{BinOpcode, IRFunction, IRProgram, Instruction, LabelId, Operand};

use super::Writer;

const BUILTIN_RUNTIME_NAMES: &[&str] = &["input", "concat", "substr", "strlen", "strcmp"];

pub fn generate_c(program: &IRProgram) -> String {
    let mut w = Writer::new();
    emit_preamble(&mut w, &program.ffi_functions);
    emit_string_runtime(&mut w);
    if !program.ffi_functions.is_empty() {
        emit_ffi_support(&mut w, &program.ffi_functions);
    }

    w.raw_line("/* forward declarations */");
    for f in &program.functions {
        w.raw_line(format!("{};", function_signature(f)));
    }
    w.blank();

    let ffi_names: HashSet<&str> = program.ffi_functions.iter().map(|f| f.name.as_str()).collect();
    for f in &program.functions {
        emit_function(&mut w, f, &ffi_names, !program.ffi_functions.is_empty());
        w.blank();
    }

    w.into_string()
}

fn emit_preamble(w: &mut Writer, ffi_functions: &[FfiFunction]) {
    w.raw_line("#include <stdio.h>");
    w.raw_line("#include <stdlib.h>");
    w.raw_line("#include <stdint.h>");
    w.raw_line("#include <stdbool.h>");
    w.raw_line("#include <inttypes.h>");
    w.raw_line("#include <string.h>");
    if !ffi_functions.is_empty() {
        w.raw_line("#ifdef _WIN32");
        w.raw_line("#include <windows.h>");
        w.raw_line("#else");
        w.raw_line("#include <dlfcn.h>");
        w.raw_line("#endif");
    }
    w.blank();
}

fn emit_string_runtime(w: &mut Writer) {
    w.raw_line("static char *__tl_concat(const char *a, const char *b) {");
    w.raw_line("    size_t la = strlen(a), lb = strlen(b);");
    w.raw_line("    char *out = (char *)malloc(la + lb + 1);");
    w.raw_line("    memcpy(out, a, la);");
    w.raw_line("    memcpy(out + la, b, lb);");
    w.raw_line("    out[la + lb] = '\\0';");
    w.raw_line("    return out;");
    w.raw_line("}");
    w.blank();

    w.raw_line("static int64_t __tl_strlen(const char *s) {");
    w.raw_line("    return (int64_t)strlen(s);");
    w.raw_line("}");
    w.blank();

    w.raw_line("static char *__tl_substr(const char *s, int64_t start, int64_t len) {");
    w.raw_line("    size_t slen = strlen(s);");
    w.raw_line("    if (start < 0) start = 0;");
    w.raw_line("    if ((size_t)start > slen) start = (int64_t)slen;");
    w.raw_line("    size_t avail = slen - (size_t)start;");
    w.raw_line("    size_t take = (len < 0) ? 0 : ((size_t)len < avail ? (size_t)len : avail);");
    w.raw_line("    char *out = (char *)malloc(take + 1);");
    w.raw_line("    memcpy(out, s + start, take);");
    w.raw_line("    out[take] = '\\0';");
    w.raw_line("    return out;");
    w.raw_line("}");
    w.blank();

    w.raw_line("static int64_t __tl_strcmp(const char *a, const char *b) {");
    w.raw_line("    return (int64_t)strcmp(a, b);");
    w.raw_line("}");
    w.blank();

    w.raw_line("static char *__tl_char_at(const char *s, int64_t index) {");
    w.raw_line("    size_t slen = strlen(s);");
    w.raw_line("    char *out = (char *)malloc(2);");
    w.raw_line("    if (index < 0 || (size_t)index >= slen) { out[0] = '\\0'; return out; }");
    w.raw_line("    out[0] = s[index];");
    w.raw_line("    out[1] = '\\0';");
    w.raw_line("    return out;");
    w.raw_line("}");
    w.blank();

    w.raw_line("static char *__tl_input(void) {");
    w.raw_line("    char buf[4096];");
    w.raw_line("    if (!fgets(buf, sizeof buf, stdin)) { buf[0] = '\\0'; }");
    w.raw_line("    size_t len = strlen(buf);");
    w.raw_line("    if (len > 0 && buf[len - 1] == '\\n') buf[len - 1] = '\\0';");
    w.raw_line("    char *out = (char *)malloc(len + 1);");
    w.raw_line("    memcpy(out, buf, len + 1);");
    w.raw_line("    return out;");
    w.raw_line("}");
    w.blank();
}

/// One function pointer + typedef per declared `extern`, grouped by
/// library so each `.dll`/`.so` is opened once.
fn emit_ffi_support(w: &mut Writer, ffi_functions: &[FfiFunction]) {
    for ffi in ffi_functions {
        let params: String = ffi.params.iter().map(|p| c_type(&p.ty)).collect::<Vec<_>>().join(", ");
        let params = if params.is_empty() { "void".to_string() } else { params };
        let call_attr = if ffi.calling_convention == "stdcall" { "TL_STDCALL " } else { "" };
        w.raw_line(format!(
            "typedef {} ({}*{}_fn_t)({});",
            c_type(&ffi.return_type),
            call_attr,
            ffi.name,
            params
        ));
        w.raw_line(format!("static {}_fn_t ffi_{};", ffi.name, ffi.name));
    }
    w.blank();
    w.raw_line("#ifdef _WIN32");
    w.raw_line("#define TL_STDCALL __stdcall");
    w.raw_line("#else");
    w.raw_line("#define TL_STDCALL");
    w.raw_line("#endif");
    w.blank();

    let mut by_library: BTreeMap<&str, Vec<&FfiFunction>> = BTreeMap::new();
    for ffi in ffi_functions {
        by_library.entry(ffi.library.as_str()).or_default().push(ffi);
    }

    w.raw_line("static void load_ffi_functions(void) {");
    w.indent();
    w.raw_line("#ifdef _WIN32");
    for (lib, funcs) in &by_library {
        let handle = format!("h_{}", sanitize_ident(lib));
        w.raw_line(format!("HMODULE {handle} = LoadLibraryA(\"{lib}\");"));
        w.raw_line(format!("if (!{handle}) {{"));
        w.raw_line(format!(
            "    fprintf(stderr, \"error: cannot load library '{lib}'\\n\"); exit(1);"
        ));
        w.raw_line("}");
        for ffi in funcs {
            w.raw_line(format!(
                "ffi_{name} = ({name}_fn_t)GetProcAddress({handle}, \"{name}\");",
                name = ffi.name
            ));
            w.raw_line(format!("if (!ffi_{name}) {{", name = ffi.name));
            w.raw_line(format!(
                "    fprintf(stderr, \"error: cannot find symbol '{name}' in '{lib}'\\n\"); exit(1);",
                name = ffi.name
            ));
            w.raw_line("}");
        }
    }
    w.raw_line("#else");
    for (lib, funcs) in &by_library {
        let handle = format!("h_{}", sanitize_ident(lib));
        w.raw_line(format!("void *{handle} = dlopen(\"{lib}\", RTLD_NOW);"));
        w.raw_line(format!("if (!{handle}) {{"));
        w.raw_line(format!(
            "    fprintf(stderr, \"error: cannot load library '{lib}': %s\\n\", dlerror()); exit(1);"
        ));
        w.raw_line("}");
        for ffi in funcs {
            w.raw_line(format!(
                "ffi_{name} = ({name}_fn_t)dlsym({handle}, \"{name}\");",
                name = ffi.name
            ));
            w.raw_line(format!("if (!ffi_{name}) {{", name = ffi.name));
            w.raw_line(format!(
                "    fprintf(stderr, \"error: cannot find symbol '{name}': %s\\n\", dlerror()); exit(1);",
                name = ffi.name
            ));
            w.raw_line("}");
        }
    }
    w.raw_line("#endif");
    w.dedent();
    w.raw_line("}");
    w.blank();
}

fn sanitize_ident(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn c_type(ty: &DataType) -> String {
    match ty {
        DataType::Int => "int64_t".to_string(),
        DataType::Bool => "bool".to_string(),
        DataType::Float => "float".to_string(),
        DataType::Double => "double".to_string(),
        DataType::String => "char *".to_string(),
        DataType::Void => "void".to_string(),
        DataType::Null => "void *".to_string(),
        DataType::Array(elem) => format!("{}*", c_type(elem)),
    }
}

fn zero_value(ty: &DataType) -> &'static str {
    match ty {
        DataType::Float | DataType::Double => "0.0",
        DataType::String => "NULL",
        DataType::Bool => "false",
        DataType::Null => "NULL",
        _ => "0",
    }
}

fn function_signature(f: &IRFunction) -> String {
    let params: String = f
        .params
        .iter()
        .map(|p| match p {
            Operand::Variable { name, ty, .. } => format!("{} {}", c_type(ty), name),
            _ => unreachable!("function parameters are always named variables"),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let params = if params.is_empty() { "void".to_string() } else { params };
    format!("{} {}({})", c_type(&f.return_type), f.name, params)
}

fn render_operand(op: &Operand) -> String {
    match op {
        Operand::Temporary { id, .. } => format!("temp_{id}"),
        Operand::Variable { name, .. } => name.clone(),
        Operand::IntConst(v) => v.to_string(),
        Operand::FloatConst(v) => render_float(*v),
        Operand::StringConst(s) => format!("\"{}\"", escape_c_string(s)),
        Operand::Null => "NULL".to_string(),
        Operand::Label(_) => unreachable!("labels are never used as value operands"),
    }
}

fn render_float(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("nan") {
        s
    } else {
        format!("{s}.0")
    }
}

fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn binop_symbol(op: BinOpcode) -> &'static str {
    match op {
        BinOpcode::Add => "+",
        BinOpcode::Sub => "-",
        BinOpcode::Mul => "*",
        BinOpcode::Div => "/",
        BinOpcode::Mod => "%",
        BinOpcode::Eq => "==",
        BinOpcode::Ne => "!=",
        BinOpcode::Lt => "<",
        BinOpcode::Le => "<=",
        BinOpcode::Gt => ">",
        BinOpcode::Ge => ">=",
        BinOpcode::And => "&&",
        BinOpcode::Or => "||",
    }
}

fn format_spec(ty: &DataType) -> &'static str {
    match ty {
        DataType::Int => "%\" PRId64 \"",
        DataType::Float | DataType::Double => "%f",
        DataType::String => "%s",
        DataType::Bool => "%s",
        _ => "%s",
    }
}

fn print_arg_expr(op: &Operand, ty: &DataType) -> String {
    let rendered = render_operand(op);
    match ty {
        DataType::Bool => format!("(({rendered}) ? \"true\" : \"false\")"),
        DataType::Null => "\"null\"".to_string(),
        _ => rendered,
    }
}

fn callee_symbol(name: &str, ffi_names: &HashSet<&str>) -> String {
    if name.starts_with("__tl_") {
        name.to_string()
    } else if BUILTIN_RUNTIME_NAMES.contains(&name) {
        format!("__tl_{name}")
    } else if ffi_names.contains(name) {
        format!("ffi_{name}")
    } else {
        name.to_string()
    }
}

/// Collects every variable/array declared in the body and every temporary
/// referenced, so they can all be declared at the top of the function —
/// `VarDecl`/`ArrayDecl` become no-ops once this prologue has run.
struct Locals {
    vars: Vec<(String, DataType)>,
    arrays: Vec<(String, DataType, i64)>,
    temps: BTreeMap<u32, DataType>,
}

fn collect_locals(f: &IRFunction) -> Locals {
    let mut vars = Vec::new();
    let mut arrays = Vec::new();
    let mut temps = BTreeMap::new();

    for instr in &f.instructions {
        match instr {
            Instruction::VarDecl { name, ty } => vars.push((name.clone(), ty.clone())),
            Instruction::ArrayDecl { name, elem_ty, size } => arrays.push((name.clone(), elem_ty.clone(), *size)),
            _ => {}
        }
        for op in instr.used_operands() {
            if let Operand::Temporary { id, ty } = op {
                temps.entry(*id).or_insert_with(|| ty.clone());
            }
        }
        if let Some(Operand::Temporary { id, ty }) = instr.defined_operand() {
            temps.entry(*id).or_insert_with(|| ty.clone());
        }
    }

    Locals { vars, arrays, temps }
}

fn emit_function(w: &mut Writer, f: &IRFunction, ffi_names: &HashSet<&str>, has_ffi: bool) {
    w.raw_line(format!("{} {{", function_signature(f)));
    w.indent();

    let locals = collect_locals(f);
    for (name, ty) in &locals.vars {
        w.line(format!("{} {} = {};", c_type(ty), name, zero_value(ty)));
    }
    for (name, elem_ty, size) in &locals.arrays {
        w.line(format!("{} {}[{}] = {{0}};", c_type(elem_ty), name, size));
    }
    for (id, ty) in &locals.temps {
        w.line(format!("{} temp_{} = {};", c_type(ty), id, zero_value(ty)));
    }

    if f.name == "main" && has_ffi {
        w.line("load_ffi_functions();");
    }

    let mut pending_params: Vec<Operand> = Vec::new();
    for instr in &f.instructions {
        emit_instruction(w, f, instr, ffi_names, &mut pending_params);
    }

    w.dedent();
    w.raw_line("}");
}

fn emit_instruction(
    w: &mut Writer,
    f: &IRFunction,
    instr: &Instruction,
    ffi_names: &HashSet<&str>,
    pending_params: &mut Vec<Operand>,
) {
    match instr {
        Instruction::Nop | Instruction::VarDecl { .. } | Instruction::ArrayDecl { .. } => {}
        Instruction::Label(id) => w.raw_line(format!("{}:;", label(f, *id))),
        Instruction::Move { dest, src } => w.line(format!("{} = {};", render_operand(dest), render_operand(src))),
        Instruction::BinOp { op, dest, lhs, rhs } => w.line(format!(
            "{} = {} {} {};",
            render_operand(dest),
            render_operand(lhs),
            binop_symbol(*op),
            render_operand(rhs)
        )),
        Instruction::Neg { dest, src } => w.line(format!("{} = -{};", render_operand(dest), render_operand(src))),
        Instruction::Not { dest, src } => w.line(format!("{} = !{};", render_operand(dest), render_operand(src))),
        Instruction::Jump(target) => w.line(format!("goto {};", label(f, *target))),
        Instruction::JumpIf { cond, target } => {
            w.line(format!("if ({}) goto {};", render_operand(cond), label(f, *target)))
        }
        Instruction::JumpIfFalse { cond, target } => {
            w.line(format!("if (!({})) goto {};", render_operand(cond), label(f, *target)))
        }
        Instruction::Param(op) => pending_params.push(op.clone()),
        Instruction::Call { dest, name, arg_count } => {
            let start = pending_params.len().saturating_sub(*arg_count);
            let args: Vec<String> = pending_params[start..].iter().map(render_operand).collect();
            pending_params.truncate(start);
            let call = format!("{}({})", callee_symbol(name, ffi_names), args.join(", "));
            match dest {
                Some(dest) => w.line(format!("{} = {call};", render_operand(dest))),
                None => w.line(format!("{call};")),
            }
        }
        Instruction::Return(Some(v)) => w.line(format!("return {};", render_operand(v))),
        Instruction::Return(None) => w.line("return;"),
        Instruction::Print(v) => emit_print(w, &[v.clone()]),
        Instruction::PrintMultiple(vs) => emit_print(w, vs),
        Instruction::ArrayLoad { dest, array, index } => {
            w.line(format!("{} = {}[{}];", render_operand(dest), array, render_operand(index)))
        }
        Instruction::ArrayStore { array, index, value } => {
            w.line(format!("{}[{}] = {};", array, render_operand(index), render_operand(value)))
        }
        Instruction::BoundsCheck { index, size, error_label } => w.line(format!(
            "if ({} < 0 || {} >= {}) goto {};",
            render_operand(index),
            render_operand(index),
            size,
            label(f, *error_label)
        )),
        Instruction::ArrayInit { name, size, value } => {
            w.line(format!("for (int64_t __tl_i = 0; __tl_i < {size}; __tl_i++) {{"));
            w.indent();
            w.line(format!("{name}[__tl_i] = {};", render_operand(value)));
            w.dedent();
            w.line("}");
        }
        Instruction::InlineAsm(asm) => emit_inline_asm(w, asm),
    }
}

/// `Print` types are resolved at emission time from each operand's own
/// embedded type, since the IR carries no separate typed-AST pass here.
fn emit_print(w: &mut Writer, values: &[Operand]) {
    let mut format = String::new();
    let mut args = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            format.push(' ');
        }
        let ty = v.ty();
        format.push_str(format_spec(&ty));
        args.push(print_arg_expr(v, &ty));
    }
    format.push_str("\\n");
    let mut line = format!("printf(\"{format}\"");
    for arg in args {
        let _ = write!(line, ", {arg}");
    }
    line.push_str(");");
    w.line(line);
}

fn emit_inline_asm(w: &mut Writer, asm: &crate::ir::InlineAsmInstr) {
    let qualifier = if asm.volatile { "__asm__ volatile (" } else { "__asm__ (" };
    w.line(qualifier);
    w.indent();
    w.line(format!("\"{}\"", escape_c_string(&asm.code)));
    let outputs: Vec<String> = asm
        .outputs
        .iter()
        .map(|(constraint, op)| format!("\"{constraint}\"({})", render_operand(op)))
        .collect();
    w.line(format!(": {}", outputs.join(", ")));
    let inputs: Vec<String> = asm
        .inputs
        .iter()
        .map(|(constraint, op)| format!("\"{constraint}\"({})", render_operand(op)))
        .collect();
    w.line(format!(": {}", inputs.join(", ")));
    let clobbers: Vec<String> = asm.clobbers.iter().map(|c| format!("\"{c}\"")).collect();
    w.line(format!(": {}", clobbers.join(", ")));
    w.dedent();
    w.line(");");
}

fn label(f: &IRFunction, id: LabelId) -> String {
    f.label_name(id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;
    use tlc_parser::ast::Param;

    fn build_ir(src: &str) -> IRProgram {
        let (program, mut diagnostics) = tlc_parser::parse(src, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        let analysis = crate::sema::analyze(&program, &mut diagnostics, "test.tl");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        ir::builder::build(&program, &analysis)
    }

    #[test]
    fn emits_int_return() {
        let ir = build_ir("func f() -> int { return 1 + 2; }");
        let code = generate_c(&ir);
        assert!(code.contains("int64_t f(void)"));
        assert!(code.contains("return"));
    }

    #[test]
    fn emits_printf_with_correct_format_for_double() {
        let ir = build_ir("func f() -> void { print(4.0); }");
        let code = generate_c(&ir);
        assert!(code.contains("%f"));
    }

    #[test]
    fn emits_string_concat_call() {
        let ir = build_ir(r#"func f() -> string { return "a" + "b"; }"#);
        let code = generate_c(&ir);
        assert!(code.contains("__tl_concat("));
    }

    #[test]
    fn emits_bounds_check_goto() {
        let ir = build_ir("func f() -> int { let a: int[3] = 0; return a[1]; }");
        let code = generate_c(&ir);
        assert!(code.contains("goto"));
        assert!(code.contains("_oob:"));
    }

    #[test]
    fn emits_ffi_loader_when_extern_declared() {
        let mut ir = build_ir("func f() -> void {}");
        ir.ffi_functions.push(FfiFunction {
            name: "do_thing".to_string(),
            library: "helper.dll".to_string(),
            calling_convention: "cdecl".to_string(),
            params: vec![Param { name: "x".to_string(), ty: DataType::Int }],
            return_type: DataType::Void,
            span: tlc_parser::span::Span::default(),
        });
        let code = generate_c(&ir);
        assert!(code.contains("load_ffi_functions"));
        assert!(code.contains("dlopen"));
        assert!(code.contains("ffi_do_thing"));
    }
}
