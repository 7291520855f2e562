use indexmap::IndexMap;

use crate::ast::{DeclId, ModuleId};

/// A scoped, ordered multimap from name to declarations. Entry order
/// preserves declaration order, which overload resolution depends on.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: IndexMap<String, Vec<DeclId>>,
    /// Foreign `#define`-style aliases, consulted before lookup.
    replacements: IndexMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, decl: DeclId) {
        self.entries.entry(name.into()).or_default().push(decl);
    }

    pub fn find(&self, name: &str) -> &[DeclId] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.find(name).is_empty()
    }

    pub fn add_identifier_replacement(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.replacements.insert(from.into(), to.into());
    }

    pub fn apply_replacements<'a>(&'a self, name: &'a str) -> &'a str {
        let mut name = name;
        // Replacements may chain (alias of an alias); cycles are the header's
        // problem, bounded here by the table size.
        for _ in 0..self.replacements.len() {
            match self.replacements.get(name) {
                Some(replacement) => name = replacement,
                None => break,
            }
        }
        name
    }
}

/// A source file: its top-level declarations plus the modules it imports, in
/// import order.
#[derive(Debug)]
pub struct SourceFile {
    pub path: String,
    pub decls: Vec<DeclId>,
    pub imports: Vec<ModuleId>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            decls: Vec::new(),
            imports: Vec::new(),
        }
    }
}

/// A module owns its source files and its symbol table.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub files: Vec<SourceFile>,
    pub symbols: SymbolTable,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Modules synthesized from foreign headers are named after the header.
    pub fn is_foreign_header(&self) -> bool {
        self.name.to_lowercase().ends_with(".h")
    }

    pub fn is_std(&self) -> bool {
        self.name == "std"
    }
}
