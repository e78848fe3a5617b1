//
// analysis/mod.rs
//
// Lightweight source analysis for Aelys: imports, declarations, call sites
// and block structure, all derived from comment-aware regex scanning.
//

pub mod call_site;
pub mod imports;
pub mod merge;
pub mod outline;
pub mod scrub;
pub mod symbols;

pub use call_site::{locate_call_site, CallSite};
pub use imports::{
    extract_imports, find_import, resolve_imports, resolve_local_module, Import, ResolvedImport,
};
pub use merge::{EntryOrigin, SymbolTable, TableEntry};
pub use outline::{build_outline, BlockKind, BlockNode};
pub use symbols::{
    extract_symbols, find_function_line, ExtractScope, SourceLocation, SymbolEntry, Visibility,
};
