//
// analysis/symbols.rs
//
// Function and variable declaration scanning
//
// Declarations are matched on scrubbed text (see scrub.rs) so that `fn` inside
// a string or comment is never picked up. Because scrubbing preserves byte
// offsets, parameter lists are sliced from the original text.
//

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use super::scrub::{scrub_line, scrub_text};

/// Fallback documentation for a `pub fn` with no preceding comment.
pub const PUBLIC_FALLBACK_DOC: &str = "Public function.";
/// Fallback documentation for a private `fn` with no preceding comment.
pub const PRIVATE_FALLBACK_DOC: &str = "Private function.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Where a symbol was declared. `path` is `None` for the document being
/// analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub path: Option<PathBuf>,
    /// 0-based line of the `fn` keyword
    pub line: u32,
}

/// A function declaration found by [`extract_symbols`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Declared name
    pub name: String,
    /// Name under which the symbol is looked up (`prefix.name` or `name`)
    pub qualified_name: String,
    /// Raw text between the parentheses of the declaration
    pub raw_params: String,
    /// Signature label shown to the user: `qualified_name(raw_params)`
    pub display_label: String,
    /// Parameters as written (`needle: string`)
    pub parameter_labels: Vec<String>,
    /// Bare parameter names (`needle`), used for snippets
    pub parameter_names: Vec<String>,
    pub documentation: String,
    pub visibility: Visibility,
    pub location: SourceLocation,
}

impl SymbolEntry {
    /// Declaration header as written in source: `pub fn name(params)`.
    pub fn declaration(&self) -> String {
        let vis = match self.visibility {
            Visibility::Public => "pub ",
            Visibility::Private => "",
        };
        format!("{}fn {}({})", vis, self.name, self.raw_params)
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Whether text is the document being edited or a module it imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractScope {
    /// All declarations are visible
    Current,
    /// Only `pub` declarations are visible across modules
    Imported,
}

/// A `let` / `mut` declaration, used by the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub name: String,
    pub type_annotation: Option<String>,
    pub is_mutable: bool,
    /// Name consists only of uppercase letters, digits and underscores
    pub is_constant: bool,
}

struct DeclarationPatterns {
    function: Regex,
    function_line: Regex,
    function_name: Regex,
    variable: Regex,
    constant_name: Regex,
}

fn patterns() -> &'static DeclarationPatterns {
    static PATTERNS: OnceLock<DeclarationPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DeclarationPatterns {
        // Groups: 1=pub, 2=name, 3=parameter list (may span lines)
        function: Regex::new(r"\b(pub\s+)?fn\s+([A-Za-z_]\w*)\s*\(([^)]*)\)").unwrap(),
        // Groups: 1=name, 2=parenthesized parameter list on the same line
        function_line: Regex::new(r"\bfn\s+([A-Za-z_]\w*)\s*(\(.*\))").unwrap(),
        // Groups: 1=name
        function_name: Regex::new(r"\bfn\s+([A-Za-z_]\w*)").unwrap(),
        // Groups: 1=keyword, 2=`mut` after `let`, 3=name, 4=type
        variable: Regex::new(
            r"\b(let|mut)\s+(mut\s+)?([A-Za-z_]\w*)\s*(?::\s*([A-Za-z_0-9<>]+))?",
        )
        .unwrap(),
        constant_name: Regex::new(r"^[A-Z0-9_]+$").unwrap(),
    })
}

/// Scan `text` for function declarations.
///
/// Each entry's name is prefixed with `prefix.` when a prefix is given.
/// Documentation comes from the run of `//` comment lines directly above the
/// declaration (blank lines inside or after the run are allowed, any other
/// line breaks it). With [`ExtractScope::Imported`], private declarations are
/// dropped. Output is in document order.
pub fn extract_symbols(text: &str, prefix: Option<&str>, scope: ExtractScope) -> Vec<SymbolEntry> {
    let scrubbed = scrub_text(text);
    let lines: Vec<&str> = text.lines().collect();
    let mut symbols = Vec::new();

    for caps in patterns().function.captures_iter(&scrubbed) {
        let (Some(whole), Some(name), Some(params)) = (caps.get(0), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let visibility = if caps.get(1).is_some() {
            Visibility::Public
        } else {
            Visibility::Private
        };
        if scope == ExtractScope::Imported && visibility == Visibility::Private {
            continue;
        }

        let name = name.as_str().to_string();
        let raw_params = text[params.range()].trim().to_string();
        let line = line_of_offset(text, whole.start());
        let qualified_name = match prefix {
            Some(p) if !p.is_empty() => format!("{}.{}", p, name),
            _ => name.clone(),
        };
        let documentation = preceding_comment_block(&lines, line as usize).unwrap_or_else(|| {
            match visibility {
                Visibility::Public => PUBLIC_FALLBACK_DOC,
                Visibility::Private => PRIVATE_FALLBACK_DOC,
            }
            .to_string()
        });
        let parameter_labels = split_parameters(&raw_params);
        let parameter_names = parameter_labels
            .iter()
            .map(|p| parameter_name(p).to_string())
            .collect();

        symbols.push(SymbolEntry {
            display_label: format!("{}({})", qualified_name, raw_params),
            name,
            qualified_name,
            raw_params,
            parameter_labels,
            parameter_names,
            documentation,
            visibility,
            location: SourceLocation { path: None, line },
        });
    }

    log::trace!(
        "Extracted {} function symbols (prefix={:?}, scope={:?})",
        symbols.len(),
        prefix,
        scope
    );
    symbols
}

/// Split a raw parameter list on commas, dropping empty entries.
pub fn split_parameters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bare name of a parameter (`needle: string` -> `needle`).
pub fn parameter_name(param: &str) -> &str {
    param.split(':').next().unwrap_or(param).trim()
}

/// Collect the `//` comment run above `decl_line`, markers stripped.
///
/// Walks upward from the line before the declaration: comment lines are
/// collected, blank lines are skipped, anything else ends the walk.
fn preceding_comment_block(lines: &[&str], decl_line: usize) -> Option<String> {
    let mut collected: Vec<&str> = Vec::new();
    let mut idx = decl_line;

    while idx > 0 {
        idx -= 1;
        let trimmed = lines.get(idx)?.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.strip_prefix("//") {
            Some(rest) => collected.push(rest.trim_start_matches('/').trim()),
            None => break,
        }
    }

    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    let doc = collected.join("\n").trim().to_string();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn line_of_offset(text: &str, offset: usize) -> u32 {
    text[..offset].bytes().filter(|&b| b == b'\n').count() as u32
}

/// A function header found on a single line, for the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHeader {
    pub name: String,
    /// Parenthesized parameter list, e.g. `(a, b)`
    pub params: String,
}

/// Match a function header on one line. Requires the closing parenthesis on
/// the same line.
pub fn match_function_line(line: &str) -> Option<FunctionHeader> {
    let scrubbed = scrub_line(line);
    let caps = patterns().function_line.captures(&scrubbed)?;
    let name = caps.get(1)?;
    let params = caps.get(2)?;
    Some(FunctionHeader {
        name: name.as_str().to_string(),
        params: line[params.range()].to_string(),
    })
}

/// Match a variable declaration on one line.
pub fn match_variable_line(line: &str) -> Option<VariableDecl> {
    let patterns = patterns();
    let scrubbed = scrub_line(line);
    let caps = patterns.variable.captures(&scrubbed)?;
    let name = caps.get(3)?.as_str().to_string();
    let is_mutable = caps.get(1).is_some_and(|k| k.as_str() == "mut") || caps.get(2).is_some();
    Some(VariableDecl {
        is_constant: patterns.constant_name.is_match(&name),
        type_annotation: caps.get(4).map(|t| t.as_str().to_string()),
        is_mutable,
        name,
    })
}

/// Find the first line declaring `fn <name>`, ignoring comments and strings.
pub fn find_function_line(text: &str, name: &str) -> Option<u32> {
    let pattern = &patterns().function_name;
    text.lines()
        .position(|line| {
            pattern
                .captures_iter(&scrub_line(line))
                .any(|caps| caps.get(1).is_some_and(|m| m.as_str() == name))
        })
        .map(|i| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_comment_scenario() {
        let text = "// Adds two numbers\nfn add(a, b) { return a + b }";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols.len(), 1);
        let add = &symbols[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.documentation, "Adds two numbers");
        assert_eq!(add.parameter_names, vec!["a", "b"]);
        assert_eq!(add.visibility, Visibility::Private);
        assert_eq!(add.display_label, "add(a, b)");
        assert_eq!(add.location.line, 1);
    }

    #[test]
    fn test_fallback_docs_differ_by_visibility() {
        let text = "pub fn open() {}\n\nlet x = 1\nfn close() {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols[0].documentation, PUBLIC_FALLBACK_DOC);
        assert_eq!(symbols[1].documentation, PRIVATE_FALLBACK_DOC);
    }

    #[test]
    fn test_multi_line_comment_run() {
        let text = "// Line one\n//   Line two\n\npub fn f(x) {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols[0].documentation, "Line one\nLine two");
        assert!(symbols[0].is_public());
    }

    #[test]
    fn test_comment_does_not_cross_code_line() {
        let text = "// Belongs to nothing\nlet y = 2\nfn g() {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols[0].documentation, PRIVATE_FALLBACK_DOC);
    }

    #[test]
    fn test_comment_attaches_only_to_next_declaration() {
        let text = "// First\nfn a() {}\nfn b() {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols[0].documentation, "First");
        assert_eq!(symbols[1].documentation, PRIVATE_FALLBACK_DOC);
    }

    #[test]
    fn test_imported_scope_drops_private() {
        let text = "pub fn visible() {}\nfn hidden() {}";
        let current = extract_symbols(text, None, ExtractScope::Current);
        let imported = extract_symbols(text, None, ExtractScope::Imported);
        assert_eq!(current.len(), 2);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "visible");
    }

    #[test]
    fn test_prefix_applies_to_key_and_label() {
        let symbols = extract_symbols("pub fn area(w, h) {}", Some("g"), ExtractScope::Imported);
        assert_eq!(symbols[0].qualified_name, "g.area");
        assert_eq!(symbols[0].display_label, "g.area(w, h)");
        assert_eq!(symbols[0].declaration(), "pub fn area(w, h)");
    }

    #[test]
    fn test_typed_parameters() {
        let symbols = extract_symbols(
            "fn find(haystack: string, needle: string) {}",
            None,
            ExtractScope::Current,
        );
        assert_eq!(symbols[0].parameter_labels, vec!["haystack: string", "needle: string"]);
        assert_eq!(symbols[0].parameter_names, vec!["haystack", "needle"]);
    }

    #[test]
    fn test_parameters_spanning_lines() {
        let text = "fn long(\n    a,\n    b\n) {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        assert_eq!(symbols[0].parameter_names, vec!["a", "b"]);
        assert_eq!(symbols[0].location.line, 0);
    }

    #[test]
    fn test_declarations_in_strings_and_comments_ignored() {
        let text = "// fn ghost() {}\nlet s = \"fn fake() {}\"\nfn real() {}";
        let symbols = extract_symbols(text, None, ExtractScope::Current);
        let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "// doc\npub fn a(x) {}\nfn b() {}\n// more\nfn c(p: int) {}";
        let first = extract_symbols(text, Some("m"), ExtractScope::Current);
        let second = extract_symbols(text, Some("m"), ExtractScope::Current);
        assert_eq!(first, second);
    }

    #[test]
    fn test_variable_declarations() {
        let vars: Vec<VariableDecl> = ["let x = 1", "let mut count: int = 0", "mut total = 2", "let MAX_SIZE = 10"]
            .iter()
            .filter_map(|line| match_variable_line(line))
            .collect();
        assert_eq!(vars.len(), 4);
        assert_eq!(vars[0].name, "x");
        assert!(!vars[0].is_mutable);
        assert_eq!(vars[1].name, "count");
        assert_eq!(vars[1].type_annotation.as_deref(), Some("int"));
        assert!(vars[1].is_mutable);
        assert!(vars[2].is_mutable);
        assert!(vars[3].is_constant);
        assert!(!vars[0].is_constant);
        assert!(match_variable_line("// let hidden = 1").is_none());
    }

    #[test]
    fn test_match_function_line() {
        let header = match_function_line("pub fn add(a, b) { return a + b }").unwrap();
        assert_eq!(header.name, "add");
        assert_eq!(header.params, "(a, b)");
        assert!(match_function_line("fn broken(a,").is_none());
    }

    #[test]
    fn test_find_function_line() {
        let text = "// fn target()\nlet a = 1\n\npub fn target(x) {}\nfn target_two() {}";
        assert_eq!(find_function_line(text, "target"), Some(3));
        assert_eq!(find_function_line(text, "target_two"), Some(4));
        assert_eq!(find_function_line(text, "absent"), None);
        assert_eq!(find_function_line(text, "targ"), None);
        assert_eq!(find_function_line("fn a() {} fn b() {}", "b"), Some(0));
    }
}
