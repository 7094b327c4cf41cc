//! TL Compiler CLI
//!
//! Usage:
//!   tlc input.tl -o output.c
//!   tlc input.tl --asm -o output.s
//!   tlc input.tl --ast
//!   tlc --modules ./include

use std::env;
use std::path::PathBuf;
use std::process;

use tlc::codegen::BackendKind;
use tlc::driver::{self, DriverError, DumpKind, Options};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"tlc {VERSION} — TL ahead-of-time compiler

USAGE:
    tlc [OPTIONS] <input.tl>...

OPTIONS:
    -o <path>           Output file path
    --asm               Emit NASM x86-64 assembly instead of C (output must
                         end in .s or .asm)
    -I <path>           Add a module include search path (repeatable)
    --modules [dir]     List .tl files in <dir> (default ".") and exit
    --tokens            Print the token stream for the first input and exit
    --ast               Print the parsed AST and exit
    --ir                Print the optimized IR and exit
    --dump-ast-json     Print the parsed AST as JSON and exit
    --no-warnings       Suppress warning diagnostics
    --debug             Raise internal log verbosity
    --memory            Print a one-line AST/IR/scope size summary
    -v                  Verbose logging (same as --debug)
    -h, --help          Show this help message
    --dumpversion       Print the compiler version and exit
    --dumpmachine       Print the target triple and exit
    --dumpspecs         Print backend capability info and exit

EXAMPLES:
    tlc main.tl -o main.c
    tlc main.tl --asm -o main.s
    tlc main.tl -I ./lib --ast
"#
    );
}

fn print_version() {
    println!("tlc {VERSION}");
}

struct Args {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    backend: Option<BackendKind>,
    dump: Option<DumpKind>,
    no_warnings: bool,
    debug: bool,
    memory: bool,
    include_paths: Vec<PathBuf>,
    list_modules: Option<PathBuf>,
    show_help: bool,
    show_version: bool,
    dumpversion: bool,
    dumpmachine: bool,
    dumpspecs: bool,
}

enum ParseOutcome {
    Args(Args),
    UnknownFlag(String),
}

fn parse_args(argv: Vec<String>) -> ParseOutcome {
    let mut args = Args {
        inputs: Vec::new(),
        output: None,
        backend: None,
        dump: None,
        no_warnings: false,
        debug: false,
        memory: false,
        include_paths: Vec::new(),
        list_modules: None,
        show_help: false,
        show_version: false,
        dumpversion: false,
        dumpmachine: false,
        dumpspecs: false,
    };

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => args.show_help = true,
            "-v" | "--debug" => args.debug = true,
            "--version" => args.show_version = true,
            "-o" => {
                i += 1;
                if i < argv.len() {
                    args.output = Some(PathBuf::from(&argv[i]));
                }
            }
            "-I" => {
                i += 1;
                if i < argv.len() {
                    args.include_paths.push(PathBuf::from(&argv[i]));
                }
            }
            "--asm" => args.backend = Some(BackendKind::Asm),
            "--tokens" => args.dump = Some(DumpKind::Tokens),
            "--ast" => args.dump = Some(DumpKind::Ast),
            "--ir" => args.dump = Some(DumpKind::Ir),
            "--dump-ast-json" => args.dump = Some(DumpKind::AstJson),
            "--no-warnings" => args.no_warnings = true,
            "--memory" => args.memory = true,
            "--modules" => {
                let dir = if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                    i += 1;
                    PathBuf::from(&argv[i])
                } else {
                    PathBuf::from(".")
                };
                args.list_modules = Some(dir);
            }
            "--dumpversion" => args.dumpversion = true,
            "--dumpmachine" => args.dumpmachine = true,
            "--dumpspecs" => args.dumpspecs = true,
            other if other.starts_with('-') => return ParseOutcome::UnknownFlag(other.to_string()),
            other => args.inputs.push(PathBuf::from(other)),
        }
        i += 1;
    }

    ParseOutcome::Args(args)
}

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(argv) {
        ParseOutcome::Args(args) => args,
        ParseOutcome::UnknownFlag(flag) => {
            eprintln!("error: {}", DriverError::UnknownFlag(flag));
            process::exit(1);
        }
    };

    if args.show_help {
        print_help();
        return;
    }
    if args.show_version || args.dumpversion {
        print_version();
        return;
    }
    if args.dumpmachine {
        println!("x86_64-pc-windows-msvc");
        return;
    }
    if args.dumpspecs {
        println!("backends: c (default, C99), asm (NASM, x86-64 Windows)");
        return;
    }

    driver::install_tracing(args.debug);

    let options = Options {
        inputs: args.inputs,
        output: args.output,
        backend: args.backend,
        dump: args.dump,
        no_warnings: args.no_warnings,
        debug: args.debug,
        memory: args.memory,
        include_paths: args.include_paths,
        list_modules: args.list_modules,
    };

    if let Err(err) = driver::run(options) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
