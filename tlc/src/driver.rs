//! Pipeline orchestration: wires lexing through code generation behind one
//! entry point, [`run`], that the CLI binary calls after parsing flags.
//!
//! Driver-level failures (bad CLI usage, unreadable input, unwritable
//! output) are [`DriverError`] — distinct from the [`tlc_parser::diagnostics::Diagnostic`]s a
//! TL program itself can produce, which are printed and turned into a
//! plain exit code rather than an error value.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tlc_parser::diagnostics::Diagnostics;
use tracing::{debug, info, info_span};

use crate::codegen::{self, BackendKind};

/// File I/O wrapped behind one error type, so "cannot read input" and
/// "cannot create output file" always take the same shape instead of an
/// unhandled panic bubbling out of `std::fs`.
pub mod io {
    use std::path::Path;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum IoError {
        #[error("cannot read '{path}': {source}")]
        Read { path: String, #[source] source: std::io::Error },
        #[error("cannot write '{path}': {source}")]
        Write { path: String, #[source] source: std::io::Error },
    }

    pub fn read_to_string(path: &Path) -> Result<String, IoError> {
        std::fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn write(path: &Path, contents: &str) -> Result<(), IoError> {
        std::fs::write(path, contents).map_err(|source| IoError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no input files given")]
    NoInputFiles,
    #[error("missing required -o <path>")]
    MissingOutputPath,
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),
    #[error("--asm output path must end in .s or .asm")]
    BadAsmExtension,
    #[error(transparent)]
    Io(#[from] io::IoError),
    #[error("compilation failed")]
    CompilationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Tokens,
    Ast,
    Ir,
    AstJson,
}

/// Parsed command-line options — built by `bin/tlc.rs`, consumed by
/// [`run`]. Kept separate from flag parsing so the pipeline itself never
/// touches `std::env`.
#[derive(Debug, Default)]
pub struct Options {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub dump: Option<DumpKind>,
    pub no_warnings: bool,
    pub debug: bool,
    pub memory: bool,
    pub include_paths: Vec<PathBuf>,
    /// `--modules [dir]` — list `.tl` files found in `dir` (default `.`)
    /// and exit, instead of compiling anything.
    pub list_modules: Option<PathBuf>,
}

/// Cheap counters threaded through the phases for `--memory`; not a real
/// allocator hook, just what each phase already computed anyway.
#[derive(Debug, Default)]
struct MemoryStats {
    ast_nodes: usize,
    ir_instructions: usize,
    peak_scope_depth: usize,
}

fn count_ast_nodes(program: &tlc_parser::ast::Program) -> usize {
    fn stmt_nodes(stmt: &tlc_parser::ast::Stmt) -> usize {
        use tlc_parser::ast::Stmt;
        1 + match stmt {
            Stmt::If { then_branch, else_branch, .. } => {
                stmt_nodes(then_branch) + else_branch.as_ref().map(|e| stmt_nodes(e)).unwrap_or(0)
            }
            Stmt::While { body, .. } => stmt_nodes(body),
            Stmt::Block { stmts, .. } => stmts.iter().map(stmt_nodes).sum(),
            _ => 0,
        }
    }
    program.functions.iter().map(|f| 1 + f.body.iter().map(stmt_nodes).sum::<usize>()).sum()
}

pub fn run(options: Options) -> Result<(), DriverError> {
    if let Some(dir) = &options.list_modules {
        return list_modules(dir);
    }
    if options.inputs.is_empty() {
        return Err(DriverError::NoInputFiles);
    }
    if options.dump.is_none() && options.output.is_none() {
        return Err(DriverError::MissingOutputPath);
    }
    if let Some(out) = &options.output {
        if options.backend == Some(BackendKind::Asm) {
            let ext = out.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "s" && ext != "asm" {
                return Err(DriverError::BadAsmExtension);
            }
        }
    }

    let mut stats = MemoryStats::default();
    let mut diagnostics = Diagnostics::new(!options.no_warnings);

    let entry_path = options.inputs[0].clone();
    let mut program = tlc_parser::ast::Program::new();
    for input in &options.inputs {
        let _span = info_span!("lex_parse", file = %input.display()).entered();
        let source = io::read_to_string(input)?;
        let (parsed, parse_diags) = {
            let _span = info_span!("parse").entered();
            tlc_parser::parse(&source, input.display().to_string())
        };
        for d in parse_diags.items() {
            diagnostics.add(d.kind, d.severity, d.message.clone(), d.suggestion.clone(), d.span, d.file.clone());
        }
        program.functions.extend(parsed.functions);
        program.ffi_functions.extend(parsed.ffi_functions);
        program.includes.extend(parsed.includes);
    }

    {
        let _span = info_span!("modules").entered();
        let mut resolver = crate::modules::Resolver::new(&entry_path, options.include_paths.clone());
        program = resolver.resolve(program, &entry_path.display().to_string(), &mut diagnostics);
    }

    if options.dump == Some(DumpKind::Tokens) {
        dump_tokens(&options.inputs[0])?;
        return Ok(());
    }
    if options.dump == Some(DumpKind::Ast) {
        print!("{}", dump_ast(&program));
        return Ok(());
    }
    if options.dump == Some(DumpKind::AstJson) {
        let json = serde_json::to_string_pretty(&program).expect("AST is always representable as JSON");
        match &options.output {
            Some(path) => io::write(path, &json)?,
            None => println!("{json}"),
        }
        return Ok(());
    }

    stats.ast_nodes = count_ast_nodes(&program);
    if diagnostics.has_errors() {
        diagnostics.print_all();
        return Err(DriverError::CompilationFailed);
    }

    let analysis = {
        let _span = info_span!("analyze").entered();
        crate::sema::analyze(&program, &mut diagnostics, entry_path.display().to_string())
    };
    stats.peak_scope_depth = analysis.symbols.max_depth();
    if diagnostics.has_errors() {
        diagnostics.print_all();
        return Err(DriverError::CompilationFailed);
    }

    let mut ir = {
        let _span = info_span!("ir").entered();
        crate::ir::builder::build(&program, &analysis)
    };

    {
        let _span = info_span!("optimize").entered();
        let pipeline = crate::optimizer::OptimizationPipeline::default_pipeline();
        pipeline.run(&mut ir);
    }
    stats.ir_instructions = ir.instruction_count();

    if options.dump == Some(DumpKind::Ir) {
        print!("{}", dump_ir(&ir));
        return Ok(());
    }

    let generated = {
        let _span = info_span!("codegen").entered();
        match options.backend.unwrap_or(BackendKind::C) {
            BackendKind::C => codegen::generate_c(&ir),
            BackendKind::Asm => codegen::generate_asm(&ir),
        }
    };

    let output_path = options.output.as_ref().expect("checked above");
    io::write(output_path, &generated)?;

    if options.memory {
        println!(
            "ast_nodes={} ir_instructions={} peak_scope_depth={}",
            stats.ast_nodes, stats.ir_instructions, stats.peak_scope_depth
        );
    }
    info!(ast_nodes = stats.ast_nodes, ir_instructions = stats.ir_instructions, "compilation finished");
    Ok(())
}

/// `--modules [dir]`: a directory listing of what the resolver would
/// consider local include candidates there, for debugging search paths
/// without running a full compile.
fn list_modules(dir: &Path) -> Result<(), DriverError> {
    let entries = std::fs::read_dir(dir).map_err(|source| {
        DriverError::Io(io::IoError::Read { path: dir.display().to_string(), source })
    })?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("tl"))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn dump_tokens(path: &Path) -> Result<(), DriverError> {
    let source = io::read_to_string(path)?;
    let mut lexer = tlc_parser::Lexer::new(&source);
    loop {
        let tok = lexer.next_token().unwrap_or_else(|err| {
            eprintln!("lex error: {err}");
            tlc_parser::lexer::SpannedToken::new(tlc_parser::Token::Eof, tlc_parser::Span::dummy())
        });
        let is_eof = matches!(tok.token, tlc_parser::Token::Eof);
        println!("{} '{}' {}:{}", describe_kind(&tok.token), tok.token.describe(), tok.span.line, tok.span.column);
        if is_eof {
            break;
        }
    }
    Ok(())
}

fn describe_kind(token: &tlc_parser::Token) -> String {
    format!("{token:?}").split(['(', ' ']).next().unwrap_or("?").to_string()
}

fn dump_ast(program: &tlc_parser::ast::Program) -> String {
    let mut out = String::new();
    for f in &program.functions {
        out.push_str(&format!("(func {} -> {}\n", f.name, f.return_type));
        for stmt in &f.body {
            dump_stmt(&mut out, stmt, 1);
        }
        out.push_str(")\n");
    }
    out
}

fn dump_stmt(out: &mut String, stmt: &tlc_parser::ast::Stmt, depth: usize) {
    use tlc_parser::ast::Stmt;
    let indent = "  ".repeat(depth);
    match stmt {
        Stmt::If { then_branch, else_branch, .. } => {
            out.push_str(&format!("{indent}(if\n"));
            dump_stmt(out, then_branch, depth + 1);
            if let Some(e) = else_branch {
                dump_stmt(out, e, depth + 1);
            }
            out.push_str(&format!("{indent})\n"));
        }
        Stmt::While { body, .. } => {
            out.push_str(&format!("{indent}(while\n"));
            dump_stmt(out, body, depth + 1);
            out.push_str(&format!("{indent})\n"));
        }
        Stmt::Block { stmts, .. } => {
            for s in stmts {
                dump_stmt(out, s, depth);
            }
        }
        other => out.push_str(&format!("{indent}{other:?}\n")),
    }
}

fn dump_ir(ir: &crate::ir::IRProgram) -> String {
    let mut out = String::new();
    for f in &ir.functions {
        out.push_str(&format!("function {}:\n", f.name));
        for instr in &f.instructions {
            out.push_str(&format!("  {instr:?}\n"));
        }
    }
    out
}

pub fn install_tracing(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    debug!("tracing installed at level {:?}", level);
}
