//
// analysis/imports.rs
//
// `needs` declaration parsing and local module resolution
//

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::scrub::scrub_line;
use super::symbols::{extract_symbols, ExtractScope, SymbolEntry};
use crate::content_provider::ContentProvider;

/// Root segment reserved for the standard library.
pub const STD_ROOT: &str = "std";

/// File extensions tried, in order, when resolving a local module.
pub const MODULE_EXTENSIONS: [&str; 2] = ["aelys", "ae"];

/// A `needs <module> [as <alias>]` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dot-separated module path as written (`std.math`, `utils`)
    pub module_path: String,
    pub alias: Option<String>,
    /// True iff the path starts with the `std` root segment
    pub is_standard: bool,
    /// 0-based line of the declaration
    pub line: u32,
}

impl Import {
    pub fn new(module_path: &str, alias: Option<&str>, line: u32) -> Self {
        let is_standard = module_path
            .split('.')
            .next()
            .is_some_and(|root| root == STD_ROOT)
            && module_path.contains('.');
        Self {
            module_path: module_path.to_string(),
            alias: alias.map(str::to_string),
            is_standard,
            line,
        }
    }

    /// Name this import is referenced by in code: the alias, otherwise the
    /// last segment of the module path.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| {
            self.module_path
                .rsplit('.')
                .next()
                .unwrap_or(&self.module_path)
        })
    }

    /// Module path with the `std.` root removed (`std.math` -> `math`).
    /// For local imports this is the module path unchanged.
    pub fn std_module(&self) -> &str {
        if self.is_standard {
            &self.module_path[STD_ROOT.len() + 1..]
        } else {
            &self.module_path
        }
    }

    /// Candidate file names for a local module, in resolution order.
    pub fn candidate_file_names(&self) -> Vec<String> {
        MODULE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{}", self.module_path, ext))
            .collect()
    }
}

fn needs_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\bneeds\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?",
        )
        .unwrap()
    })
}

/// Extract every `needs` declaration from `text`, in order of appearance.
///
/// Declarations inside comments or string literals are ignored. No check is
/// made that the module exists.
pub fn extract_imports(text: &str) -> Vec<Import> {
    let pattern = needs_pattern();
    let mut imports = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let scrubbed = scrub_line(line);
        for caps in pattern.captures_iter(&scrubbed) {
            let Some(path) = caps.get(1) else {
                continue;
            };
            let alias = caps.get(2).map(|m| m.as_str());
            log::trace!(
                "  Parsed import at line {}: module='{}' alias={:?}",
                line_num,
                path.as_str(),
                alias
            );
            imports.push(Import::new(path.as_str(), alias, line_num as u32));
        }
    }

    imports
}

/// Find the import that `binding` (an alias or last path segment) refers to.
pub fn find_import<'a>(imports: &'a [Import], binding: &str) -> Option<&'a Import> {
    imports.iter().find(|imp| imp.binding() == binding)
}

/// Resolve a local import to a file next to the importing document.
///
/// Tries `<module>.aelys` then `<module>.ae` in `document_dir`; the first
/// existing file wins. Standard-library imports never resolve to a file.
pub async fn resolve_local_module(
    provider: &dyn ContentProvider,
    document_dir: &Path,
    import: &Import,
) -> Option<PathBuf> {
    if import.is_standard {
        return None;
    }
    for name in import.candidate_file_names() {
        let candidate = document_dir.join(name);
        if provider.exists(&candidate).await {
            return Some(candidate);
        }
    }
    log::trace!("Unresolved local import '{}'", import.module_path);
    None
}

/// An import together with whatever could be loaded for it.
#[derive(Debug, Clone)]
pub enum ResolvedImport {
    /// `needs std.<module>`; symbols come from the standard library table
    Standard(Import),
    /// A local module file was found and scanned (private symbols dropped)
    Local {
        import: Import,
        path: PathBuf,
        symbols: Vec<SymbolEntry>,
    },
    /// A local module with no matching file; contributes nothing
    Unresolved(Import),
}

impl ResolvedImport {
    pub fn import(&self) -> &Import {
        match self {
            ResolvedImport::Standard(import)
            | ResolvedImport::Local { import, .. }
            | ResolvedImport::Unresolved(import) => import,
        }
    }
}

/// Resolve and scan every import of a document located in `document_dir`.
///
/// Local modules are read through `provider` (open documents win over disk)
/// and scanned as imported files, so private declarations are excluded.
/// Symbols of aliased local imports are prefixed with the alias.
pub async fn resolve_imports(
    provider: &dyn ContentProvider,
    document_dir: Option<&Path>,
    imports: &[Import],
) -> Vec<ResolvedImport> {
    let mut resolved = Vec::with_capacity(imports.len());

    for import in imports {
        if import.is_standard {
            resolved.push(ResolvedImport::Standard(import.clone()));
            continue;
        }

        let Some(dir) = document_dir else {
            resolved.push(ResolvedImport::Unresolved(import.clone()));
            continue;
        };

        let loaded = match resolve_local_module(provider, dir, import).await {
            Some(path) => provider.read(&path).await.map(|content| (path, content)),
            None => None,
        };

        match loaded {
            Some((path, content)) => {
                let mut symbols =
                    extract_symbols(&content, import.alias.as_deref(), ExtractScope::Imported);
                for symbol in &mut symbols {
                    symbol.location.path = Some(path.clone());
                }
                resolved.push(ResolvedImport::Local {
                    import: import.clone(),
                    path,
                    symbols,
                });
            }
            None => resolved.push(ResolvedImport::Unresolved(import.clone())),
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_provider::DiskContentProvider;

    #[test]
    fn test_std_import_with_alias() {
        let imports = extract_imports("needs std.math as m\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].module_path, "std.math");
        assert_eq!(imports[0].alias.as_deref(), Some("m"));
        assert!(imports[0].is_standard);
        assert_eq!(imports[0].binding(), "m");
        assert_eq!(imports[0].std_module(), "math");
    }

    #[test]
    fn test_local_import_without_alias() {
        let imports = extract_imports("needs utils");
        assert_eq!(imports.len(), 1);
        assert!(!imports[0].is_standard);
        assert_eq!(imports[0].alias, None);
        assert_eq!(imports[0].binding(), "utils");
        assert_eq!(imports[0].std_module(), "utils");
    }

    #[test]
    fn test_binding_defaults_to_last_segment() {
        let imports = extract_imports("needs std.io");
        assert_eq!(imports[0].binding(), "io");
    }

    #[test]
    fn test_order_of_appearance_and_lines() {
        let text = "needs std.io\nlet x = 1\nneeds helpers as h\nneeds std.time as t";
        let imports = extract_imports(text);
        let paths: Vec<_> = imports.iter().map(|i| i.module_path.as_str()).collect();
        assert_eq!(paths, vec!["std.io", "helpers", "std.time"]);
        assert_eq!(imports[1].line, 2);
        assert_eq!(imports[2].alias.as_deref(), Some("t"));
    }

    #[test]
    fn test_commented_and_quoted_imports_ignored() {
        let text = "// needs std.net\nlet s = \"needs std.fs\"\nneeds std.io";
        let imports = extract_imports(text);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].module_path, "std.io");
    }

    #[test]
    fn test_module_named_stdlib_is_local() {
        let imports = extract_imports("needs stdlib\nneeds std");
        assert!(!imports[0].is_standard);
        assert!(!imports[1].is_standard);
    }

    #[test]
    fn test_find_import_by_binding() {
        let imports = extract_imports("needs std.math as m\nneeds utils");
        assert_eq!(find_import(&imports, "m").unwrap().module_path, "std.math");
        assert_eq!(find_import(&imports, "utils").unwrap().module_path, "utils");
        assert!(find_import(&imports, "math").is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_aelys_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("utils.aelys"), "pub fn a() {}").unwrap();
        std::fs::write(dir.path().join("utils.ae"), "pub fn b() {}").unwrap();

        let import = Import::new("utils", None, 0);
        let path = resolve_local_module(&DiskContentProvider, dir.path(), &import)
            .await
            .unwrap();
        assert!(path.ends_with("utils.aelys"));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_ae_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("utils.ae"), "pub fn b() {}").unwrap();

        let import = Import::new("utils", None, 0);
        let path = resolve_local_module(&DiskContentProvider, dir.path(), &import)
            .await
            .unwrap();
        assert!(path.ends_with("utils.ae"));
    }

    #[tokio::test]
    async fn test_unresolved_import_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let imports = extract_imports("needs missing as m\nneeds std.io");
        let resolved = resolve_imports(&DiskContentProvider, Some(dir.path()), &imports).await;
        assert!(matches!(resolved[0], ResolvedImport::Unresolved(_)));
        assert!(matches!(resolved[1], ResolvedImport::Standard(_)));
    }

    #[tokio::test]
    async fn test_resolved_local_symbols_are_public_and_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("geo.aelys"),
            "pub fn area(w, h) { return w * h }\nfn helper() {}\n",
        )
        .unwrap();

        let imports = extract_imports("needs geo as g");
        let resolved = resolve_imports(&DiskContentProvider, Some(dir.path()), &imports).await;
        let ResolvedImport::Local { symbols, path, .. } = &resolved[0] else {
            panic!("expected a local import");
        };
        assert!(path.ends_with("geo.aelys"));
        let names: Vec<_> = symbols.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["g.area"]);
        assert_eq!(symbols[0].location.path.as_deref(), Some(path.as_path()));
    }
}
