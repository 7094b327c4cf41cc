//! Black-box pipeline tests: lex -> parse -> analyze -> IR -> optimize ->
//! codegen, driven through the library API on small TL programs.

use tlc::codegen;
use tlc::ir;
use tlc::optimizer::OptimizationPipeline;
use tlc::sema;
use tlc_parser::diagnostics::Diagnostics;

fn compile_ir(source: &str) -> (ir::IRProgram, Diagnostics) {
    let (program, mut diagnostics) = tlc_parser::parse(source, "test.tl");
    let analysis = sema::analyze(&program, &mut diagnostics, "test.tl");
    let mut ir = ir::builder::build(&program, &analysis);
    OptimizationPipeline::default_pipeline().run(&mut ir);
    (ir, diagnostics)
}

#[test]
fn overloaded_function_compiles_to_two_distinct_c_functions() {
    let source = r#"
        func add(a: int, b: int) -> int { return a + b; }
        func add(a: double, b: double) -> double { return a + b; }
        func main() -> int {
            print(add(1, 2));
            print(add(1.5, 2.5));
            return 0;
        }
    "#;
    let (ir, diagnostics) = compile_ir(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    let c = codegen::generate_c(&ir);
    assert!(c.contains("add__i"), "{c}");
    assert!(c.contains("add__d"), "{c}");
    assert!(c.contains("int main"));
}

#[test]
fn while_with_break_lowers_to_a_jump_out_of_the_loop() {
    let source = r#"
        func main() -> int {
            let i: int = 0;
            while (i < 10) {
                if (i == 3) { break; }
                i = i + 1;
            }
            print(i);
            return 0;
        }
    "#;
    let (ir, diagnostics) = compile_ir(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
    assert!(main_fn.instructions.iter().any(|i| matches!(i, ir::Instruction::Jump(_))));
}

#[test]
fn literal_out_of_bounds_index_is_a_semantic_error_not_an_ir_program() {
    let source = r#"
        func main() -> int {
            let a: int[5];
            return a[10];
        }
    "#;
    let (program, mut diagnostics) = tlc_parser::parse(source, "test.tl");
    let _analysis = sema::analyze(&program, &mut diagnostics, "test.tl");
    assert!(diagnostics.has_errors());
    assert!(diagnostics.errors().any(|d| d.message.to_lowercase().contains("bound")));
}

#[test]
fn string_concat_call_reaches_the_c_runtime_helper() {
    let source = r#"
        func main() -> int {
            print(concat("foo", "bar"));
            return 0;
        }
    "#;
    let (ir, diagnostics) = compile_ir(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    let c = codegen::generate_c(&ir);
    assert!(c.contains("__tl_concat"), "{c}");
}

#[test]
fn constant_expression_folds_to_a_single_move_with_no_residual_arithmetic() {
    let source = r#"
        func main() -> int {
            let x: int = 2 * (3 + 4);
            return x;
        }
    "#;
    let (ir, diagnostics) = compile_ir(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    let main_fn = ir.functions.iter().find(|f| f.name == "main").unwrap();
    let folds_to_14 = main_fn.instructions.iter().any(|instr| {
        matches!(
            instr,
            ir::Instruction::Move { src: ir::Operand::IntConst(14), .. }
        )
    });
    assert!(folds_to_14, "{:#?}", main_fn.instructions);
    assert!(!main_fn.instructions.iter().any(|i| matches!(i, ir::Instruction::BinOp { .. })));
}

#[test]
fn unreachable_statement_after_return_warns_but_still_compiles() {
    let source = r#"
        func f() -> int {
            return 0;
            let x: int = 1;
        }
        func main() -> int { return f(); }
    "#;
    let (program, mut diagnostics) = tlc_parser::parse(source, "test.tl");
    let _analysis = sema::analyze(&program, &mut diagnostics, "test.tl");
    assert!(!diagnostics.has_errors());
    assert!(diagnostics.warnings().next().is_some());
}

#[test]
fn recompiling_the_same_program_produces_byte_identical_c_output() {
    let source = r#"
        func main() -> int {
            let x: int = 2 * (3 + 4);
            print(x);
            return 0;
        }
    "#;
    let (ir1, _) = compile_ir(source);
    let (ir2, _) = compile_ir(source);
    assert_eq!(codegen::generate_c(&ir1), codegen::generate_c(&ir2));
}

#[test]
fn jump_targets_always_have_a_matching_label_in_the_same_function() {
    let source = r#"
        func main() -> int {
            let i: int = 0;
            while (i < 3) {
                if (i == 1) { continue; }
                i = i + 1;
            }
            return i;
        }
    "#;
    let (ir, diagnostics) = compile_ir(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.errors().collect::<Vec<_>>());

    for f in &ir.functions {
        let labels: std::collections::HashSet<_> =
            f.instructions.iter().filter_map(|i| match i {
                ir::Instruction::Label(id) => Some(*id),
                _ => None,
            }).collect();
        for instr in &f.instructions {
            let target = match instr {
                ir::Instruction::Jump(id) => Some(*id),
                ir::Instruction::JumpIf { target, .. } => Some(*target),
                ir::Instruction::JumpIfFalse { target, .. } => Some(*target),
                _ => None,
            };
            if let Some(id) = target {
                assert!(labels.contains(&id), "jump to {id:?} with no matching label in {}", f.name);
            }
        }
    }
}
