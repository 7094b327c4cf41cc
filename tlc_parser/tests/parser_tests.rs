use tlc_parser::ast::{BinOp, DataType, Expr, Stmt};
use tlc_parser::parse;

#[test]
fn parses_includes_extern_block_and_function() {
    let src = r#"
        #include "util.tl"
        #include <std/io>

        extern "cdecl" from "libm.so" {
            func sqrt(x: double) -> double;
        }

        func add(a: int, b: int) -> int {
            return a + b;
        }
    "#;
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    assert_eq!(program.includes.len(), 2);
    assert!(!program.includes[0].is_system);
    assert!(program.includes[1].is_system);
    assert_eq!(program.ffi_functions.len(), 1);
    assert_eq!(program.ffi_functions[0].name, "sqrt");
    assert_eq!(program.functions.len(), 1);
    assert_eq!(program.functions[0].params.len(), 2);
}

#[test]
fn parses_array_declaration_with_broadcast_initializer() {
    let src = "func main() -> void { let xs: int[10] = 0; }";
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors());
    let Stmt::ArrayDecl { elem_ty, size, init, .. } = &program.functions[0].body[0] else {
        panic!("expected an array declaration");
    };
    assert_eq!(*elem_ty, DataType::Int);
    assert_eq!(*size, 10);
    assert!(init.is_some());
}

#[test]
fn parses_index_assignment() {
    let src = "func main() -> void { let xs: int[3] = 0; xs[1] = 2; }";
    let (program, _diagnostics) = parse(src, "main.tl");
    let Stmt::IndexAssign { base, index, value, .. } = &program.functions[0].body[1] else {
        panic!("expected an index assignment");
    };
    assert!(matches!(base, Expr::Variable { name, .. } if name == "xs"));
    assert!(matches!(index, Expr::IntLit { value: 1, .. }));
    assert!(matches!(value, Expr::IntLit { value: 2, .. }));
}

#[test]
fn parses_if_else_while_and_control_flow() {
    let src = r#"
        func classify(n: int) -> int {
            while (n > 0) {
                if (n == 1) {
                    break;
                } else {
                    continue;
                }
            }
            return 0;
        }
    "#;
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    let Stmt::While { body, .. } = &program.functions[0].body[0] else {
        panic!("expected a while loop");
    };
    let Stmt::Block { stmts, .. } = body.as_ref() else {
        panic!("expected a block body");
    };
    assert!(matches!(&stmts[0], Stmt::If { else_branch: Some(_), .. }));
}

#[test]
fn parses_inline_asm_with_operands_and_clobbers() {
    let src = r#"
        func halt() -> void {
            asm volatile { "hl" "t" : "=r"(x) : "r"(y) : "memory" };
        }
    "#;
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    let Stmt::InlineAsm(asm) = &program.functions[0].body[0] else {
        panic!("expected an inline asm statement");
    };
    assert!(asm.volatile);
    assert_eq!(asm.code, "hlt");
    assert_eq!(asm.outputs.len(), 1);
    assert_eq!(asm.inputs.len(), 1);
    assert_eq!(asm.clobbers, vec!["memory".to_string()]);
}

#[test]
fn binary_expression_precedence_matches_c_family_rules() {
    let src = "func f() -> bool { return 1 + 2 * 3 == 7 && !false; }";
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    let Stmt::Return { value: Some(expr), .. } = &program.functions[0].body[0] else {
        panic!("expected a return with a value");
    };
    assert!(matches!(expr, Expr::Binary { op: BinOp::And, .. }));
}

#[test]
fn reports_unterminated_string_and_recovers() {
    let src = "func f() -> void { let s: string = \"oops; }";
    let (_program, diagnostics) = parse(src, "main.tl");
    assert!(diagnostics.has_errors());
}

#[test]
fn header_only_function_declaration_has_no_body() {
    let src = "func forward_declared(x: int) -> int;";
    let (program, diagnostics) = parse(src, "main.tl");
    assert!(!diagnostics.has_errors());
    assert!(program.functions[0].is_declaration_only);
    assert!(program.functions[0].body.is_empty());
}
