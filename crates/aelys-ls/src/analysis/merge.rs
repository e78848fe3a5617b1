//
// analysis/merge.rs
//
// Layered symbol table: standard library, then imports, then the document
//

use indexmap::IndexMap;

use super::imports::ResolvedImport;
use super::symbols::{SourceLocation, SymbolEntry, Visibility};
use crate::stdlib::{ParameterDescriptor, StandardLibrary, StdlibEntry};

/// Which layer an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    Stdlib,
    StdImport,
    LocalImport,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub label: String,
    pub documentation: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub visibility: Visibility,
    /// Declaration site; `None` for standard library entries
    pub location: Option<SourceLocation>,
    pub origin: EntryOrigin,
}

impl TableEntry {
    fn from_stdlib(entry: &StdlibEntry, label: String, origin: EntryOrigin) -> Self {
        Self {
            label,
            documentation: entry.documentation.clone(),
            parameters: entry.parameters.clone(),
            visibility: Visibility::Public,
            location: None,
            origin,
        }
    }

    fn from_symbol(symbol: &SymbolEntry, origin: EntryOrigin) -> Self {
        Self {
            label: symbol.display_label.clone(),
            documentation: symbol.documentation.clone(),
            parameters: symbol
                .parameter_labels
                .iter()
                .map(|label| ParameterDescriptor {
                    label: label.clone(),
                    documentation: None,
                })
                .collect(),
            visibility: symbol.visibility,
            location: Some(symbol.location.clone()),
            origin,
        }
    }
}

/// Every name visible from one document, keyed by how it is written at a
/// call site (`m.clamp`, `g.area`, `helper`).
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: IndexMap<String, TableEntry>,
}

impl SymbolTable {
    /// Layer the tables in increasing precedence; a later layer replaces an
    /// earlier entry with the same key.
    ///
    /// 1. standard library, keyed `module.name`
    /// 2. imports: `needs std.<module> as <alias>` re-keys that module's
    ///    entries to `alias.name` (label rewritten the same way); local
    ///    modules contribute their public symbols under `alias.name`, or bare
    ///    when imported without an alias
    /// 3. declarations of the document itself, bare
    pub fn merge(
        stdlib: &StandardLibrary,
        imports: &[ResolvedImport],
        document: &[SymbolEntry],
    ) -> Self {
        let mut entries = IndexMap::new();

        for entry in stdlib.entries() {
            entries.insert(
                entry.name.to_string(),
                TableEntry::from_stdlib(entry, entry.label.clone(), EntryOrigin::Stdlib),
            );
        }

        for resolved in imports {
            match resolved {
                ResolvedImport::Standard(import) => {
                    let module = import.std_module();
                    let binding = import.alias.as_deref().unwrap_or(module);
                    for entry in stdlib.module_entries(module) {
                        let key = format!("{}.{}", binding, entry.name.name());
                        let label = entry.label.replacen(module, binding, 1);
                        entries.insert(
                            key,
                            TableEntry::from_stdlib(entry, label, EntryOrigin::StdImport),
                        );
                    }
                }
                ResolvedImport::Local { symbols, .. } => {
                    for symbol in symbols.iter().filter(|s| s.is_public()) {
                        entries.insert(
                            symbol.qualified_name.clone(),
                            TableEntry::from_symbol(symbol, EntryOrigin::LocalImport),
                        );
                    }
                }
                ResolvedImport::Unresolved(_) => {}
            }
        }

        for symbol in document {
            entries.insert(
                symbol.qualified_name.clone(),
                TableEntry::from_symbol(symbol, EntryOrigin::Document),
            );
        }

        log::trace!("Merged symbol table with {} entries", entries.len());
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&TableEntry> {
        self.entries.get(key)
    }

    /// Exact lookup, falling back for undotted names to the first standard
    /// library entry whose last segment matches (`print` -> `io.print`).
    ///
    /// The fallback returns the table's entry under the module key, which
    /// an unaliased `needs std.<module>` has re-keyed in place.
    pub fn lookup(&self, name: &str, stdlib: &StandardLibrary) -> Option<&TableEntry> {
        if let Some(entry) = self.entries.get(name) {
            return Some(entry);
        }
        if name.contains('.') {
            return None;
        }
        let std_entry = stdlib.find_by_suffix(name)?;
        self.entries.get(std_entry.name.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
