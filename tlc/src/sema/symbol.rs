//! Symbols and the scope chain.

use tlc_parser::ast::DataType;
use tlc_parser::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
}

/// One declared name. `array_size` is `None` for scalars, as the spec's
/// "-1 means scalar" sentinel has no reason to survive into a Rust enum.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: DataType,
    pub scope_depth: u32,
    pub defined_at: Span,
    pub used: bool,
    pub array_size: Option<i64>,
    pub array_elem_ty: Option<DataType>,
    /// Only meaningful for `SymbolKind::Function`: the parameter types that
    /// make up this overload's identity.
    pub param_types: Vec<DataType>,
}

impl Symbol {
    pub fn variable(name: impl Into<String>, ty: DataType, scope_depth: u32, defined_at: Span) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Variable,
            ty,
            scope_depth,
            defined_at,
            used: false,
            array_size: None,
            array_elem_ty: None,
            param_types: Vec::new(),
        }
    }

    pub fn array(
        name: impl Into<String>,
        elem_ty: DataType,
        size: i64,
        scope_depth: u32,
        defined_at: Span,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Variable,
            ty: DataType::Array(Box::new(elem_ty.clone())),
            scope_depth,
            defined_at,
            used: false,
            array_size: Some(size),
            array_elem_ty: Some(elem_ty),
            param_types: Vec::new(),
        }
    }

    pub fn parameter(name: impl Into<String>, ty: DataType, scope_depth: u32, defined_at: Span) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Parameter,
            ty,
            scope_depth,
            defined_at,
            used: false,
            array_size: None,
            array_elem_ty: None,
            param_types: Vec::new(),
        }
    }

    pub fn function(
        name: impl Into<String>,
        return_ty: DataType,
        param_types: Vec<DataType>,
        scope_depth: u32,
        defined_at: Span,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Function,
            ty: return_ty,
            scope_depth,
            defined_at,
            used: false,
            array_size: None,
            array_elem_ty: None,
            param_types,
        }
    }
}

/// What a name maps to within one scope: either a single variable/parameter,
/// or a set of function overloads. Kept as an explicit tagged enum (rather
/// than one map with a value type downcast at use sites) per the design
/// note recorded in `DESIGN.md`.
#[derive(Debug, Clone)]
pub enum ScopeEntry {
    Variable(Symbol),
    Overloads(Vec<Symbol>),
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub depth: u32,
    pub parent: Option<usize>,
    entries: std::collections::HashMap<String, ScopeEntry>,
}

/// A parent-indexed arena of scopes, rooted at index 0 (the global scope).
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                depth: 0,
                parent: None,
                entries: Default::default(),
            }],
        }
    }

    pub fn global(&self) -> usize {
        0
    }

    pub fn push_scope(&mut self, parent: usize) -> usize {
        let depth = self.scopes[parent].depth + 1;
        self.scopes.push(Scope {
            depth,
            parent: Some(parent),
            entries: Default::default(),
        });
        self.scopes.len() - 1
    }

    pub fn depth_of(&self, scope: usize) -> u32 {
        self.scopes[scope].depth
    }

    /// The deepest scope reached anywhere in this table — `--memory`'s
    /// "peak scope depth" figure.
    pub fn max_depth(&self) -> usize {
        self.scopes.iter().map(|s| s.depth as usize).max().unwrap_or(0)
    }

    /// Insert a variable or parameter, replacing whatever is there. Callers
    /// are responsible for checking redefinition first when that matters.
    pub fn declare_variable(&mut self, scope: usize, symbol: Symbol) {
        self.scopes[scope]
            .entries
            .insert(symbol.name.clone(), ScopeEntry::Variable(symbol));
    }

    /// Add a function symbol to the named overload set in `scope`, creating
    /// it if absent. Returns `false` (and leaves the table unchanged) if an
    /// overload with the same parameter-type tuple already exists there.
    pub fn declare_function(&mut self, scope: usize, symbol: Symbol) -> bool {
        match self.scopes[scope].entries.entry(symbol.name.clone()) {
            std::collections::hash_map::Entry::Occupied(mut occ) => match occ.get_mut() {
                ScopeEntry::Overloads(overloads) => {
                    if overloads.iter().any(|o| o.param_types == symbol.param_types) {
                        false
                    } else {
                        overloads.push(symbol);
                        true
                    }
                }
                ScopeEntry::Variable(_) => false,
            },
            std::collections::hash_map::Entry::Vacant(vac) => {
                vac.insert(ScopeEntry::Overloads(vec![symbol]));
                true
            }
        }
    }

    /// Resolve `name` by walking the scope chain from `scope` to the root.
    pub fn lookup(&self, scope: usize, name: &str) -> Option<&ScopeEntry> {
        let mut current = Some(scope);
        while let Some(idx) = current {
            if let Some(entry) = self.scopes[idx].entries.get(name) {
                return Some(entry);
            }
            current = self.scopes[idx].parent;
        }
        None
    }

    pub fn lookup_mut(&mut self, scope: usize, name: &str) -> Option<&mut ScopeEntry> {
        let mut current = Some(scope);
        while let Some(idx) = current {
            if self.scopes[idx].entries.contains_key(name) {
                return self.scopes[idx].entries.get_mut(name);
            }
            current = self.scopes[idx].parent;
        }
        None
    }

    /// Every variable/parameter symbol declared anywhere, for the
    /// end-of-analysis unused-variable sweep.
    pub fn all_variables(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes.iter().flat_map(|s| {
            s.entries.values().filter_map(|e| match e {
                ScopeEntry::Variable(sym) => Some(sym),
                ScopeEntry::Overloads(_) => None,
            })
        })
    }

    /// Variable/parameter symbols declared directly in `scope` (not its
    /// ancestors) — the IR builder's starting type environment for a
    /// function, whose whole body shares one scope.
    pub fn symbols_in_scope(&self, scope: usize) -> Vec<&Symbol> {
        self.scopes[scope]
            .entries
            .values()
            .filter_map(|e| match e {
                ScopeEntry::Variable(sym) => Some(sym),
                ScopeEntry::Overloads(_) => None,
            })
            .collect()
    }

    /// Names visible in `scope`'s chain, for typo suggestions.
    pub fn visible_names(&self, scope: usize) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(scope);
        while let Some(idx) = current {
            names.extend(self.scopes[idx].entries.keys().map(String::as_str));
            current = self.scopes[idx].parent;
        }
        names
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
