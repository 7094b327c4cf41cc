//! Semantic analysis: scoped symbol table, overload resolution, type
//! checking and warning generation.
//!
//! Mirrors the two-pass shape from `SPEC_FULL.md` §4.4: pass A populates
//! the global scope with every function/FFI signature (so forward calls
//! resolve), pass B type-checks each body in its own child scope. Per-
//! function scopes are kept alive afterward — [`Analysis::scopes`] is
//! handed to [`crate::ir::builder`] so it can resolve names the same way
//! the analyzer did, without re-walking declarations.

pub mod overload;
pub mod symbol;

use std::collections::HashMap;

use tlc_parser::ast::{DataType, Expr, FfiFunction, Function, Program, Stmt, UnOp};
use tlc_parser::diagnostics::{Diagnostics, DiagnosticKind, Severity};
use tlc_parser::span::Span;

use overload::{assignment_compatibility, resolve_overload, suggest_name, Compatibility, Resolution};
use symbol::{ScopeEntry, Symbol, SymbolKind, SymbolTable};

/// The five names the spec carries as fixed-signature built-ins, available
/// even though they're never declared in TL source.
pub fn builtin_signature(name: &str) -> Option<(DataType, Vec<DataType>)> {
    match name {
        "input" => Some((DataType::String, vec![])),
        "concat" => Some((DataType::String, vec![DataType::String, DataType::String])),
        "substr" => Some((DataType::String, vec![DataType::String, DataType::Int, DataType::Int])),
        "strlen" => Some((DataType::Int, vec![DataType::String])),
        "strcmp" => Some((DataType::Int, vec![DataType::String, DataType::String])),
        _ => None,
    }
}

/// Output of analysis: the symbol table (with every function/FFI/variable
/// symbol recorded and its mangled codegen name decided) and, per
/// function, the scope the IR builder should resolve names against.
pub struct Analysis {
    pub symbols: SymbolTable,
    pub function_scopes: HashMap<(String, Vec<DataType>), usize>,
    /// `(name, param types)` -> the C/asm-safe emitted symbol name. Needed
    /// because C has no overloading; see the mangling note in `DESIGN.md`.
    pub mangled_names: HashMap<(String, Vec<DataType>), String>,
}

impl Analysis {
    pub fn mangled_name(&self, name: &str, param_types: &[DataType]) -> String {
        self.mangled_names
            .get(&(name.to_string(), param_types.to_vec()))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn symbols_in_scope(&self, scope: usize) -> Vec<&Symbol> {
        self.symbols.symbols_in_scope(scope)
    }
}

pub struct Analyzer<'a> {
    program: &'a Program,
    diagnostics: &'a mut Diagnostics,
    file: String,
    symbols: SymbolTable,
    function_scopes: HashMap<(String, Vec<DataType>), usize>,
    loop_depth: u32,
}

impl<'a> Analyzer<'a> {
    pub fn new(program: &'a Program, diagnostics: &'a mut Diagnostics, file: impl Into<String>) -> Self {
        Self {
            program,
            diagnostics,
            file: file.into(),
            symbols: SymbolTable::new(),
            function_scopes: HashMap::new(),
            loop_depth: 0,
        }
    }

    pub fn analyze(mut self) -> Analysis {
        self.populate_globals();
        let mangled_names = self.mangle_overloads();
        for function in &self.program.functions {
            if function.is_declaration_only {
                continue;
            }
            self.analyze_function(function);
        }
        self.warn_unused_variables();
        Analysis {
            symbols: self.symbols,
            function_scopes: self.function_scopes,
            mangled_names,
        }
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, suggestion: Option<String>, span: Span) {
        self.diagnostics.add(kind, Severity::Error, message, suggestion, span, self.file.clone());
    }

    fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.diagnostics.add(kind, Severity::Warning, message, None, span, self.file.clone());
    }

    // ==================== Pass A ====================

    fn populate_globals(&mut self) {
        let global = self.symbols.global();
        for function in &self.program.functions {
            let param_types: Vec<DataType> = function.params.iter().map(|p| p.ty.clone()).collect();
            let symbol = Symbol::function(
                function.name.clone(),
                function.return_type.clone(),
                param_types,
                0,
                function.span,
            );
            if !self.symbols.declare_function(global, symbol) {
                self.error(
                    DiagnosticKind::Semantic,
                    format!(
                        "redefinition of function '{}' with the same parameter types",
                        function.name
                    ),
                    None,
                    function.span,
                );
            }
        }
        for ffi in &self.program.ffi_functions {
            let param_types: Vec<DataType> = ffi.params.iter().map(|p| p.ty.clone()).collect();
            let symbol = Symbol::function(ffi.name.clone(), ffi.return_type.clone(), param_types, 0, ffi.span);
            if !self.symbols.declare_function(global, symbol) {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("redefinition of extern function '{}'", ffi.name),
                    None,
                    ffi.span,
                );
            }
        }
    }

    /// Assigns each overload a codegen-safe name: the bare name if it is
    /// the only overload, else the name suffixed with its parameter types.
    fn mangle_overloads(&self) -> HashMap<(String, Vec<DataType>), String> {
        let mut by_name: HashMap<String, Vec<Vec<DataType>>> = HashMap::new();
        for function in &self.program.functions {
            by_name
                .entry(function.name.clone())
                .or_default()
                .push(function.params.iter().map(|p| p.ty.clone()).collect());
        }
        for ffi in &self.program.ffi_functions {
            by_name
                .entry(ffi.name.clone())
                .or_default()
                .push(ffi.params.iter().map(|p| p.ty.clone()).collect());
        }

        let mut mangled = HashMap::new();
        for (name, overloads) in by_name {
            if name == "main" || overloads.len() == 1 {
                for params in overloads {
                    mangled.insert((name.clone(), params), name.clone());
                }
                continue;
            }
            for params in overloads {
                let suffix: String = params.iter().map(type_abbrev).collect::<Vec<_>>().join("_");
                mangled.insert((name.clone(), params), format!("{name}__{suffix}"));
            }
        }
        mangled
    }

    // ==================== Pass B ====================

    fn analyze_function(&mut self, function: &Function) {
        let scope = self.symbols.push_scope(self.symbols.global());
        for param in &function.params {
            self.symbols.declare_variable(
                scope,
                Symbol::parameter(param.name.clone(), param.ty.clone(), 1, function.span),
            );
        }
        let param_types: Vec<DataType> = function.params.iter().map(|p| p.ty.clone()).collect();
        self.function_scopes.insert((function.name.clone(), param_types), scope);

        let mut returned = false;
        for stmt in &function.body {
            if returned {
                self.warn(DiagnosticKind::Semantic, "unreachable code", stmt_span(stmt));
            }
            self.analyze_stmt(stmt, scope);
            if stmt.always_returns() {
                returned = true;
            }
        }
    }

    fn analyze_stmt(&mut self, stmt: &Stmt, scope: usize) {
        match stmt {
            Stmt::Expr(expr) => {
                self.type_of(expr, scope);
            }
            Stmt::VarDecl { name, ty, init, span } => {
                if let Some(init) = init {
                    let init_ty = self.type_of(init, scope);
                    self.check_assignable(&init_ty, ty, *span);
                }
                self.symbols
                    .declare_variable(scope, Symbol::variable(name.clone(), ty.clone(), self.symbols.depth_of(scope), *span));
            }
            Stmt::ArrayDecl { name, elem_ty, size, init, span } => {
                if *size <= 0 {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("array size must be positive, got {size}"),
                        None,
                        *span,
                    );
                }
                if let Some(init) = init {
                    let init_ty = self.type_of(init, scope);
                    self.check_assignable(&init_ty, elem_ty, *span);
                }
                self.symbols.declare_variable(
                    scope,
                    Symbol::array(name.clone(), elem_ty.clone(), *size, self.symbols.depth_of(scope), *span),
                );
            }
            Stmt::Assign { name, value, span } => {
                let value_ty = self.type_of(value, scope);
                let declared = self.lookup_variable(scope, name, *span).map(|s| s.ty.clone());
                if let Some(declared) = declared {
                    self.check_assignable(&value_ty, &declared, *span);
                }
            }
            Stmt::IndexAssign { base, index, value, span } => {
                let elem_ty = self.check_index(base, index, scope, *span);
                let value_ty = self.type_of(value, scope);
                self.check_assignable(&value_ty, &elem_ty, *span);
            }
            Stmt::If { cond, then_branch, else_branch, span } => {
                let cond_ty = self.type_of(cond, scope);
                self.require_condition_type(&cond_ty, *span);
                self.analyze_stmt(then_branch, scope);
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch, scope);
                }
            }
            Stmt::While { cond, body, span } => {
                let cond_ty = self.type_of(cond, scope);
                self.require_condition_type(&cond_ty, *span);
                self.loop_depth += 1;
                self.analyze_stmt(body, scope);
                self.loop_depth -= 1;
            }
            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    self.error(DiagnosticKind::Semantic, "'break' outside of a loop", None, *span);
                }
            }
            Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    self.error(DiagnosticKind::Semantic, "'continue' outside of a loop", None, *span);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.type_of(value, scope);
                }
            }
            Stmt::Print { args, .. } => {
                for arg in args {
                    self.type_of(arg, scope);
                }
            }
            Stmt::Include { .. } => {}
            Stmt::Block { stmts, .. } => {
                let mut returned = false;
                for inner in stmts {
                    if returned {
                        self.warn(DiagnosticKind::Semantic, "unreachable code", stmt_span(inner));
                    }
                    self.analyze_stmt(inner, scope);
                    if inner.always_returns() {
                        returned = true;
                    }
                }
            }
            Stmt::InlineAsm(asm) => {
                for operand in asm.outputs.iter().chain(asm.inputs.iter()) {
                    self.type_of(&operand.expr, scope);
                }
            }
        }
    }

    fn require_condition_type(&mut self, ty: &DataType, span: Span) {
        if !matches!(ty, DataType::Bool | DataType::Int | DataType::Null | DataType::Void) {
            self.error(
                DiagnosticKind::Semantic,
                format!("condition must be bool, int, or null, got {ty}"),
                None,
                span,
            );
        }
    }

    fn check_assignable(&mut self, from: &DataType, to: &DataType, span: Span) {
        if *from == DataType::Void {
            return;
        }
        match assignment_compatibility(from, to) {
            Compatibility::Exact => {}
            Compatibility::Implicit => {
                self.warn(
                    DiagnosticKind::Semantic,
                    format!("implicit conversion from {from} to {to}"),
                    span,
                );
            }
            Compatibility::Incompatible => {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("cannot assign value of type {from} to target of type {to}"),
                    None,
                    span,
                );
            }
        }
    }

    fn lookup_variable(&mut self, scope: usize, name: &str, span: Span) -> Option<Symbol> {
        match self.symbols.lookup_mut(scope, name) {
            Some(ScopeEntry::Variable(sym)) => {
                sym.used = true;
                Some(sym.clone())
            }
            Some(ScopeEntry::Overloads(_)) => {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("'{name}' is a function, not a variable"),
                    None,
                    span,
                );
                None
            }
            None => {
                let names: Vec<String> = self.symbols.visible_names(scope).iter().map(|s| s.to_string()).collect();
                let suggestion = suggest_name(name, names.iter().map(String::as_str)).map(|s| format!("did you mean '{s}'?"));
                self.error(
                    DiagnosticKind::Semantic,
                    format!("undefined variable '{name}'"),
                    suggestion,
                    span,
                );
                None
            }
        }
    }

    fn check_index(&mut self, base: &Expr, index: &Expr, scope: usize, span: Span) -> DataType {
        let index_ty = self.type_of(index, scope);
        if !matches!(index_ty, DataType::Int | DataType::Void) {
            self.error(DiagnosticKind::Semantic, "array/string index must be an int", None, span);
        }
        if let (Expr::Variable { name, .. }, Expr::IntLit { value, .. }) = (base, index) {
            if let Some(ScopeEntry::Variable(sym)) = self.symbols.lookup(scope, name) {
                if let Some(size) = sym.array_size {
                    if *value < 0 || *value >= size {
                        self.error(
                            DiagnosticKind::Semantic,
                            format!("array index {value} out of bounds for array of size {size}"),
                            None,
                            span,
                        );
                    }
                }
            }
        }
        let base_ty = self.type_of(base, scope);
        match base_ty {
            DataType::Array(elem) => *elem,
            DataType::String => DataType::String,
            DataType::Null => {
                self.warn(DiagnosticKind::Semantic, "indexing a null value", span);
                DataType::Void
            }
            DataType::Void => DataType::Void,
            other => {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("cannot index a value of type {other}"),
                    None,
                    span,
                );
                DataType::Void
            }
        }
    }

    /// Types an expression, returning `DataType::Void` as a poison value on
    /// any error so callers don't cascade further diagnostics.
    fn type_of(&mut self, expr: &Expr, scope: usize) -> DataType {
        match expr {
            Expr::IntLit { .. } => DataType::Int,
            Expr::FloatLit { .. } => DataType::Double,
            Expr::BoolLit { .. } => DataType::Bool,
            Expr::StringLit { .. } => DataType::String,
            Expr::NullLit { .. } => DataType::Null,
            Expr::Variable { name, span } => self
                .lookup_variable(scope, name, *span)
                .map(|s| s.ty)
                .unwrap_or(DataType::Void),
            Expr::Group { inner, .. } => self.type_of(inner, scope),
            Expr::Unary { op, operand, span } => {
                let ty = self.type_of(operand, scope);
                if ty == DataType::Void {
                    return DataType::Void;
                }
                match op {
                    UnOp::Neg => {
                        if !ty.is_numeric() {
                            self.error(
                                DiagnosticKind::Semantic,
                                format!("unary '-' requires a numeric operand, got {ty}"),
                                None,
                                *span,
                            );
                            DataType::Void
                        } else {
                            ty
                        }
                    }
                    UnOp::Not => {
                        if ty != DataType::Bool {
                            self.error(
                                DiagnosticKind::Semantic,
                                format!("unary '!' requires a bool operand, got {ty}"),
                                None,
                                *span,
                            );
                            DataType::Void
                        } else {
                            DataType::Bool
                        }
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, span } => self.type_of_binary(*op, lhs, rhs, scope, *span),
            Expr::Index { base, index, span } => self.check_index(base, index, scope, *span),
            Expr::Call { callee, args, span } => self.type_of_call(callee, args, scope, *span),
        }
    }

    fn type_of_binary(
        &mut self,
        op: tlc_parser::ast::BinOp,
        lhs: &Expr,
        rhs: &Expr,
        scope: usize,
        span: Span,
    ) -> DataType {
        use tlc_parser::ast::BinOp::*;
        let lhs_ty = self.type_of(lhs, scope);
        let rhs_ty = self.type_of(rhs, scope);
        if lhs_ty == DataType::Void || rhs_ty == DataType::Void {
            return DataType::Void;
        }

        match op {
            Add if lhs_ty == DataType::String && rhs_ty == DataType::String => DataType::String,
            Add | Sub | Mul | Div | Mod => {
                let lhs_numeric = lhs_ty.is_numeric() || lhs_ty == DataType::Null;
                let rhs_numeric = rhs_ty.is_numeric() || rhs_ty == DataType::Null;
                if !lhs_numeric || !rhs_numeric {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("operator '{op}' requires numeric operands, got {lhs_ty} and {rhs_ty}"),
                        None,
                        span,
                    );
                    return DataType::Void;
                }
                if matches!(op, Div | Mod) {
                    if let Expr::IntLit { value: 0, .. } = rhs {
                        self.warn(DiagnosticKind::Semantic, format!("{op} by literal zero"), span);
                    }
                    if let Expr::IntLit { value: 1, .. } = rhs {
                        self.warn(DiagnosticKind::Semantic, format!("{op} by literal one is a no-op"), span);
                    }
                }
                promote(&lhs_ty, &rhs_ty)
            }
            Eq | Ne => {
                if assignment_compatibility(&lhs_ty, &rhs_ty) == Compatibility::Incompatible
                    && assignment_compatibility(&rhs_ty, &lhs_ty) == Compatibility::Incompatible
                {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("cannot compare incompatible types {lhs_ty} and {rhs_ty}"),
                        None,
                        span,
                    );
                    return DataType::Void;
                }
                DataType::Bool
            }
            Lt | Le | Gt | Ge => {
                if !lhs_ty.is_numeric() || !rhs_ty.is_numeric() {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("relational operator requires numeric operands, got {lhs_ty} and {rhs_ty}"),
                        None,
                        span,
                    );
                    return DataType::Void;
                }
                DataType::Bool
            }
            And | Or => {
                if lhs_ty != DataType::Bool || rhs_ty != DataType::Bool {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("logical operator requires bool operands, got {lhs_ty} and {rhs_ty}"),
                        None,
                        span,
                    );
                    return DataType::Void;
                }
                DataType::Bool
            }
        }
    }

    fn type_of_call(&mut self, callee: &str, args: &[Expr], scope: usize, span: Span) -> DataType {
        let arg_types: Vec<DataType> = args.iter().map(|a| self.type_of(a, scope)).collect();
        if arg_types.iter().any(|t| *t == DataType::Void) {
            return DataType::Void;
        }

        if let Some((ret, params)) = builtin_signature(callee) {
            if params.len() != arg_types.len() {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("'{callee}' expects {} argument(s), got {}", params.len(), arg_types.len()),
                    None,
                    span,
                );
                return DataType::Void;
            }
            for (param_ty, arg_ty) in params.iter().zip(&arg_types) {
                if assignment_compatibility(arg_ty, param_ty) == Compatibility::Incompatible {
                    self.error(
                        DiagnosticKind::Semantic,
                        format!("'{callee}' expects {param_ty}, got {arg_ty}"),
                        None,
                        span,
                    );
                    return DataType::Void;
                }
            }
            return ret;
        }

        let global = self.symbols.global();
        let overloads = match self.symbols.lookup(global, callee) {
            Some(ScopeEntry::Overloads(set)) => set.clone(),
            Some(ScopeEntry::Variable(_)) => {
                self.error(DiagnosticKind::Semantic, format!("'{callee}' is not callable"), None, span);
                return DataType::Void;
            }
            None => {
                let names: Vec<String> = self.symbols.visible_names(global).iter().map(|s| s.to_string()).collect();
                let suggestion =
                    suggest_name(callee, names.iter().map(String::as_str)).map(|s| format!("did you mean '{s}'?"));
                self.error(
                    DiagnosticKind::Semantic,
                    format!("undefined function '{callee}'"),
                    suggestion,
                    span,
                );
                return DataType::Void;
            }
        };

        match resolve_overload(&overloads, &arg_types) {
            Resolution::Found(symbol) => symbol.ty.clone(),
            Resolution::Ambiguous => {
                let tuple = arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
                self.error(
                    DiagnosticKind::Semantic,
                    format!("ambiguous call to '{callee}' with argument types ({tuple})"),
                    None,
                    span,
                );
                DataType::Void
            }
            Resolution::NoMatch => {
                let tuple = arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
                self.error(
                    DiagnosticKind::Semantic,
                    format!("no matching overload for function '{callee}' with argument types ({tuple})"),
                    None,
                    span,
                );
                DataType::Void
            }
        }
    }

    fn warn_unused_variables(&mut self) {
        let unused: Vec<(String, Span)> = self
            .symbols
            .all_variables()
            .filter(|s| !s.used && s.kind != SymbolKind::Parameter)
            .map(|s| (s.name.clone(), s.defined_at))
            .collect();
        for (name, span) in unused {
            self.warn(DiagnosticKind::Semantic, format!("unused variable '{name}'"), span);
        }
    }
}

/// Arithmetic promotion: `Double` beats `Float` beats `Int`.
fn promote(a: &DataType, b: &DataType) -> DataType {
    if *a == DataType::Double || *b == DataType::Double {
        DataType::Double
    } else if *a == DataType::Float || *b == DataType::Float {
        DataType::Float
    } else {
        DataType::Int
    }
}

fn type_abbrev(ty: &DataType) -> &'static str {
    match ty {
        DataType::Int => "i",
        DataType::Bool => "b",
        DataType::Float => "f",
        DataType::Double => "d",
        DataType::String => "s",
        DataType::Array(_) => "a",
        DataType::Void => "v",
        DataType::Null => "n",
    }
}

fn stmt_span(stmt: &Stmt) -> Span {
    match stmt {
        Stmt::Expr(e) => e.span(),
        Stmt::VarDecl { span, .. }
        | Stmt::ArrayDecl { span, .. }
        | Stmt::Assign { span, .. }
        | Stmt::IndexAssign { span, .. }
        | Stmt::If { span, .. }
        | Stmt::While { span, .. }
        | Stmt::Break { span }
        | Stmt::Continue { span }
        | Stmt::Return { span, .. }
        | Stmt::Print { span, .. }
        | Stmt::Include { span, .. }
        | Stmt::Block { span, .. } => *span,
        Stmt::InlineAsm(asm) => asm.span,
    }
}

pub fn analyze(program: &Program, diagnostics: &mut Diagnostics, file: impl Into<String>) -> Analysis {
    Analyzer::new(program, diagnostics, file).analyze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlc_parser::parse;

    fn analyze_src(src: &str) -> (Analysis, Diagnostics) {
        let (program, mut diagnostics) = parse(src, "test.tl");
        assert!(!diagnostics.has_errors(), "parse errors: {}", diagnostics.render_all());
        let analysis = analyze(&program, &mut diagnostics, "test.tl");
        (analysis, diagnostics)
    }

    #[test]
    fn resolves_overloads_by_argument_type() {
        let src = r#"
            func add(a: int, b: int) -> int { return a + b; }
            func add(a: double, b: double) -> double { return a + b; }
            func main() -> int { print(add(1, 2)); print(add(1.5, 2.5)); return 0; }
        "#;
        let (analysis, diagnostics) = analyze_src(src);
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        assert_eq!(analysis.mangled_name("add", &[DataType::Int, DataType::Int]), "add__i_i");
    }

    #[test]
    fn flags_break_outside_loop() {
        let src = "func f() -> void { break; }";
        let (_analysis, diagnostics) = analyze_src(src);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn flags_undefined_variable_with_suggestion() {
        let src = "func f() -> int { let count: int = 0; return contnue; }";
        let (_analysis, diagnostics) = analyze_src(src);
        assert!(diagnostics.errors().any(|d| d.message.contains("undefined variable")));
    }

    #[test]
    fn warns_on_unreachable_code_after_return() {
        let src = "func f() -> int { return 0; let x: int = 1; }";
        let (_analysis, diagnostics) = analyze_src(src);
        assert!(diagnostics.warnings().any(|d| d.message.contains("unreachable")));
    }

    #[test]
    fn flags_literal_array_index_out_of_bounds() {
        let src = "func f() -> int { let a: int[5] = 0; return a[10]; }";
        let (_analysis, diagnostics) = analyze_src(src);
        assert!(diagnostics.errors().any(|d| d.message.contains("out of bounds")));
    }

    #[test]
    fn warns_on_unused_variable() {
        let src = "func f() -> void { let x: int = 1; }";
        let (_analysis, diagnostics) = analyze_src(src);
        assert!(diagnostics.warnings().any(|d| d.message.contains("unused variable 'x'")));
    }
}
