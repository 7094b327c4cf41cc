//! `#include` resolution.
//!
//! TL's module system is intentionally simple: an include just pulls
//! another file's functions into the current [`Program`] before semantic
//! analysis runs, with no namespacing and no export lists (full module
//! linkage is a non-goal — see `DESIGN.md`). This module only decides
//! *which path on disk* an `#include "..."`/`#include <...>` resolves to
//! and performs the textual concatenation; the analyzer never sees an
//! `Include` statement that still needs resolving.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tlc_parser::ast::Program;
use tlc_parser::diagnostics::{DiagnosticKind, Diagnostics, Severity};

const SYSTEM_SEARCH_PATH: &[&str] = &["/usr/include", "/usr/local/include"];

/// Where to look for a local (`"..."`) include, in order: the including
/// file's own directory, `./include`, then every `-I` path in the order
/// they were given on the command line.
pub struct Resolver {
    including_file_dir: PathBuf,
    include_paths: Vec<PathBuf>,
    resolved: HashSet<PathBuf>,
}

impl Resolver {
    pub fn new(entry_file: impl AsRef<Path>, include_paths: Vec<PathBuf>) -> Self {
        let including_file_dir = entry_file
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            including_file_dir,
            include_paths,
            resolved: HashSet::new(),
        }
    }

    fn candidates(&self, path: &str, is_system: bool) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if !is_system {
            candidates.push(self.including_file_dir.join(path));
            candidates.push(PathBuf::from("./include").join(path));
            for dir in &self.include_paths {
                candidates.push(dir.join(path));
            }
        }
        for dir in SYSTEM_SEARCH_PATH {
            candidates.push(PathBuf::from(dir).join(path));
        }
        candidates
    }

    fn resolve_one(&self, path: &str, is_system: bool) -> Option<PathBuf> {
        self.candidates(path, is_system).into_iter().find(|c| c.is_file())
    }

    /// Resolves and concatenates every `#include` reachable from `program`
    /// (direct or transitive), each file parsed and folded in at most once.
    /// An unresolved include only fails the directive that named it — the
    /// rest of the compilation proceeds.
    pub fn resolve(&mut self, mut program: Program, entry_file: &str, diagnostics: &mut Diagnostics) -> Program {
        let mut queue: Vec<_> = program.includes.drain(..).collect();
        let mut idx = 0;
        while idx < queue.len() {
            let include = queue[idx].clone();
            idx += 1;

            let Some(resolved_path) = self.resolve_one(&include.path, include.is_system) else {
                diagnostics.add(
                    DiagnosticKind::Codegen,
                    Severity::Error,
                    format!("cannot find include file '{}'", include.path),
                    None,
                    include.span,
                    entry_file.to_string(),
                );
                continue;
            };
            let resolved_path = resolved_path.canonicalize().unwrap_or(resolved_path);
            if !self.resolved.insert(resolved_path.clone()) {
                continue;
            }

            let source = match std::fs::read_to_string(&resolved_path) {
                Ok(s) => s,
                Err(err) => {
                    diagnostics.add(
                        DiagnosticKind::Codegen,
                        Severity::Error,
                        format!("cannot read include file '{}': {err}", resolved_path.display()),
                        None,
                        include.span,
                        entry_file.to_string(),
                    );
                    continue;
                }
            };
            let file_name = resolved_path.display().to_string();
            let (included, included_diags) = tlc_parser::parse(&source, file_name);
            for d in included_diags.items().iter().cloned() {
                diagnostics.add(d.kind, d.severity, d.message, d.suggestion, d.span, d.file);
            }

            // Included functions come first, so the including file can call
            // forward into a header without a forward declaration.
            let mut merged_functions = included.functions;
            merged_functions.append(&mut program.functions);
            program.functions = merged_functions;
            program.ffi_functions.extend(included.ffi_functions);
            queue.extend(included.includes);
        }
        program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_a_local_include_relative_to_the_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        let header_path = dir.path().join("helper.tl");
        std::fs::File::create(&header_path)
            .unwrap()
            .write_all(b"func helper() -> int { return 5; }")
            .unwrap();
        let entry_path = dir.path().join("main.tl");

        let src = "#include \"helper.tl\"\nfunc main() -> int { return helper(); }";
        let (program, mut diagnostics) = tlc_parser::parse(src, "main.tl");
        let mut resolver = Resolver::new(&entry_path, vec![]);
        let merged = resolver.resolve(program, "main.tl", &mut diagnostics);
        assert!(merged.functions.iter().any(|f| f.name == "helper"));
    }

    #[test]
    fn missing_include_reports_a_codegen_diagnostic_without_panicking() {
        let src = "#include \"does_not_exist.tl\"\nfunc main() -> int { return 0; }";
        let (program, mut diagnostics) = tlc_parser::parse(src, "main.tl");
        let mut resolver = Resolver::new("main.tl", vec![]);
        let merged = resolver.resolve(program, "main.tl", &mut diagnostics);
        assert!(diagnostics.has_errors());
        assert!(merged.functions.iter().any(|f| f.name == "main"));
    }
}
