//
// handlers.rs
//
// Hover, completion, signature help, go-to-definition and document symbols
//

use std::sync::OnceLock;

use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::analysis::{
    build_outline, extract_imports, extract_symbols, find_function_line, find_import,
    locate_call_site, resolve_imports, resolve_local_module, BlockKind, BlockNode, ExtractScope,
    Import, ResolvedImport, SymbolTable, TableEntry,
};
use crate::content_provider::ContentProvider;
use crate::state::DocumentSnapshot;
use crate::utf16::{position_to_byte_offset, utf16_column_to_byte_offset, utf16_len};

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'@')
}

/// The `[@A-Za-z0-9_.]` run touching byte `col` of `line`.
fn word_at(line: &str, col: usize) -> Option<&str> {
    let bytes = line.as_bytes();
    let col = col.min(bytes.len());
    let mut start = col;
    while start > 0 && is_word_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }
    (start < end).then(|| &line[start..end])
}

fn word_at_position(text: &str, position: Position) -> Option<&str> {
    let line = text.lines().nth(position.line as usize)?;
    let col = utf16_column_to_byte_offset(line, position.character);
    word_at(line, col)
}

fn markdown(value: String) -> MarkupContent {
    MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    }
}

fn entry_markdown(entry: &TableEntry) -> String {
    format!("```rust\n{}\n```\n{}", entry.label, entry.documentation)
}

/// Resolve the document's imports and build its merged symbol table.
async fn symbol_table(snapshot: &DocumentSnapshot) -> SymbolTable {
    let imports = extract_imports(&snapshot.text);
    let resolved = resolve_imports(&snapshot.provider, snapshot.directory(), &imports).await;
    let document = extract_symbols(&snapshot.text, None, ExtractScope::Current);
    SymbolTable::merge(&snapshot.stdlib, &resolved, &document)
}

// ============================================================================
// Hover
// ============================================================================

pub async fn hover(snapshot: &DocumentSnapshot, position: Position) -> Option<Hover> {
    let word = word_at_position(&snapshot.text, position)?;
    let stdlib = &snapshot.stdlib;

    let value = if word.starts_with('@') {
        stdlib.hover_doc(word)?.to_string()
    } else {
        let table = symbol_table(snapshot).await;
        if word.contains('.') {
            let last = word.rsplit('.').next().unwrap_or(word);
            table
                .get(word)
                .map(entry_markdown)
                .or_else(|| stdlib.hover_doc(word).map(str::to_string))
                .or_else(|| stdlib.hover_doc(last).map(str::to_string))?
        } else {
            table
                .get(word)
                .filter(|e| e.location.is_some())
                .map(entry_markdown)
                .or_else(|| stdlib.hover_doc(word).map(str::to_string))?
        }
    };

    log::trace!("Hover for '{}'", word);
    Some(Hover {
        contents: HoverContents::Markup(markdown(value)),
        range: None,
    })
}

// ============================================================================
// Completion
// ============================================================================

fn member_access_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.$").unwrap())
}

fn call_snippet(name: &str) -> (Option<String>, Option<InsertTextFormat>) {
    (
        Some(format!("{}(${{1}})", name)),
        Some(InsertTextFormat::SNIPPET),
    )
}

pub async fn completion(
    snapshot: &DocumentSnapshot,
    position: Position,
) -> Option<CompletionResponse> {
    let line = snapshot.text.lines().nth(position.line as usize).unwrap_or("");
    let prefix = &line[..utf16_column_to_byte_offset(line, position.character)];

    if prefix.ends_with('@') {
        let items = snapshot
            .stdlib
            .attributes()
            .iter()
            .map(|attr| CompletionItem {
                label: attr.name.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                insert_text: Some(attr.name.trim_start_matches('@').to_string()),
                documentation: Some(Documentation::MarkupContent(markdown(
                    attr.documentation.to_string(),
                ))),
                ..Default::default()
            })
            .collect();
        return Some(CompletionResponse::Array(items));
    }

    let binding = member_access_pattern().captures(prefix)?.get(1)?.as_str();
    let imports = extract_imports(&snapshot.text);
    let import = find_import(&imports, binding)?;

    let items = if import.is_standard {
        std_module_completions(snapshot, import.std_module())
    } else {
        local_module_completions(snapshot, import).await
    };

    log::trace!("Completion after '{}.': {} items", binding, items.len());
    Some(CompletionResponse::Array(items))
}

fn std_module_completions(snapshot: &DocumentSnapshot, module: &str) -> Vec<CompletionItem> {
    let stdlib = &snapshot.stdlib;
    let functions = stdlib.module_entries(module).map(|entry| {
        let name = entry.name.name();
        let (insert_text, insert_text_format) = call_snippet(name);
        CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some(entry.label.clone()),
            documentation: Some(Documentation::MarkupContent(markdown(
                entry.documentation.clone(),
            ))),
            insert_text,
            insert_text_format,
            ..Default::default()
        }
    });
    let constants = stdlib.module_constants(module).map(|constant| CompletionItem {
        label: constant.name.name().to_string(),
        kind: Some(CompletionItemKind::CONSTANT),
        detail: Some(constant.name.to_string()),
        documentation: Some(Documentation::String(constant.value.to_string())),
        ..Default::default()
    });
    functions.chain(constants).collect()
}

async fn local_module_completions(
    snapshot: &DocumentSnapshot,
    import: &Import,
) -> Vec<CompletionItem> {
    let resolved = resolve_imports(
        &snapshot.provider,
        snapshot.directory(),
        std::slice::from_ref(import),
    )
    .await;

    let Some(ResolvedImport::Local { symbols, .. }) = resolved.into_iter().next() else {
        return Vec::new();
    };

    symbols
        .iter()
        .filter(|s| s.is_public())
        .map(|symbol| {
            let (insert_text, insert_text_format) = call_snippet(&symbol.name);
            CompletionItem {
                label: symbol.name.clone(),
                kind: Some(CompletionItemKind::METHOD),
                detail: Some(symbol.declaration()),
                documentation: Some(Documentation::MarkupContent(markdown(
                    symbol.documentation.clone(),
                ))),
                insert_text,
                insert_text_format,
                ..Default::default()
            }
        })
        .collect()
}

// ============================================================================
// Signature Help
// ============================================================================

pub async fn signature_help(
    snapshot: &DocumentSnapshot,
    position: Position,
) -> Option<SignatureHelp> {
    let offset = position_to_byte_offset(&snapshot.text, position);
    let site = locate_call_site(&snapshot.text, offset);
    if !site.found || site.function_name.is_empty() {
        return None;
    }

    let table = symbol_table(snapshot).await;
    let entry = table.lookup(&site.function_name, &snapshot.stdlib)?;

    let parameters = entry
        .parameters
        .iter()
        .map(|param| ParameterInformation {
            label: ParameterLabel::Simple(param.label.clone()),
            documentation: Some(Documentation::String(param.documentation_or_default())),
        })
        .collect();

    Some(SignatureHelp {
        signatures: vec![SignatureInformation {
            label: entry.label.clone(),
            documentation: Some(Documentation::MarkupContent(markdown(
                entry.documentation.clone(),
            ))),
            parameters: Some(parameters),
            active_parameter: None,
        }],
        active_signature: Some(0),
        active_parameter: Some(site.active_parameter(entry.parameters.len())),
    })
}

// ============================================================================
// Goto Definition
// ============================================================================

/// Jump to `fn <name>` in the current document, or in the local module a
/// dotted `binding.name` refers to. Standard-library names have no source to
/// jump to.
pub async fn goto_definition(
    snapshot: &DocumentSnapshot,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let word = word_at_position(&snapshot.text, position)?;

    let (function_name, target) = match word.split_once('.') {
        Some((binding, rest)) => {
            let name = rest.split('.').next().unwrap_or(rest);
            let imports = extract_imports(&snapshot.text);
            let target = match find_import(&imports, binding) {
                Some(import) if import.is_standard => return None,
                Some(import) => {
                    let dir = snapshot.directory()?;
                    resolve_local_module(&snapshot.provider, dir, import).await
                }
                None => None,
            };
            (name, target)
        }
        None => (word, None),
    };

    let (uri, text) = match target {
        Some(path) => {
            let text = snapshot.provider.read(&path).await?;
            (Url::from_file_path(&path).ok()?, text)
        }
        None => (snapshot.uri.clone(), snapshot.text.clone()),
    };

    let line = find_function_line(&text, function_name)?;
    log::trace!("Definition of '{}' at {}:{}", function_name, uri, line);
    let start = Position::new(line, 0);
    Some(GotoDefinitionResponse::Scalar(Location {
        uri,
        range: Range { start, end: start },
    }))
}

// ============================================================================
// Document Symbols
// ============================================================================

pub fn document_symbol(snapshot: &DocumentSnapshot) -> Option<DocumentSymbolResponse> {
    let lines: Vec<&str> = snapshot.text.lines().collect();
    let symbols = build_outline(&snapshot.text)
        .iter()
        .map(|node| to_document_symbol(node, &lines))
        .collect();
    Some(DocumentSymbolResponse::Nested(symbols))
}

#[allow(deprecated)]
fn to_document_symbol(node: &BlockNode, lines: &[&str]) -> DocumentSymbol {
    let line_end = |line: u32| {
        Position::new(line, lines.get(line as usize).map_or(0, |l| utf16_len(l)))
    };
    let kind = match node.kind {
        BlockKind::Function => SymbolKind::FUNCTION,
        BlockKind::Variable => SymbolKind::VARIABLE,
        BlockKind::Constant => SymbolKind::CONSTANT,
    };
    let children: Vec<DocumentSymbol> = node
        .children
        .iter()
        .map(|child| to_document_symbol(child, lines))
        .collect();

    DocumentSymbol {
        name: node.name.clone(),
        detail: (!node.detail.is_empty()).then(|| node.detail.clone()),
        kind,
        tags: None,
        deprecated: None,
        range: Range {
            start: Position::new(node.start_line, 0),
            end: line_end(node.end_line),
        },
        selection_range: Range {
            start: Position::new(node.start_line, 0),
            end: line_end(node.start_line),
        },
        children: (!children.is_empty()).then_some(children),
    }
}
