//
// analysis/outline.rs
//
// Brace-depth tracking for the document outline
//

use std::sync::OnceLock;

use regex::Regex;

use super::scrub::scrub_line;
use super::symbols::{match_function_line, match_variable_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Function,
    Variable,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub name: String,
    pub kind: BlockKind,
    pub detail: String,
    pub start_line: u32,
    /// Line of the closing brace for functions whose block was closed,
    /// otherwise `start_line`
    pub end_line: u32,
    pub children: Vec<BlockNode>,
}

fn inline_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[^{}]*\}").unwrap())
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@[A-Za-z_]\w*").unwrap())
}

/// Remove `{...}` pairs that open and close on the same line, innermost
/// first, so only braces that affect nesting remain.
fn strip_inline_blocks(line: &str) -> String {
    let pattern = inline_block_pattern();
    let mut current = line.to_string();
    loop {
        let next = pattern.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

struct OpenBlock {
    node: usize,
    depth: i32,
}

struct ArenaNode {
    node: BlockNode,
    children: Vec<usize>,
}

/// Build the nested outline of `text`.
///
/// Lines are processed in order. Functions and variables attach to the
/// innermost open function, or to the root. A function is opened at the
/// depth before its own line's braces are counted and closes when the depth
/// returns there. On each line closing braces are applied before opening
/// ones. A function whose body is entirely on its own line is closed
/// immediately. An `@attribute` line is shown in the detail of the next
/// function and is forgotten at a blank line.
pub fn build_outline(text: &str) -> Vec<BlockNode> {
    let mut arena: Vec<ArenaNode> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut depth: i32 = 0;
    let mut pending_attribute: Option<String> = None;

    for (line_num, line) in text.lines().enumerate() {
        let line_num = line_num as u32;
        let scrubbed = scrub_line(line);
        let structural = strip_inline_blocks(&scrubbed);
        let opens = structural.matches('{').count() as i32;
        let closes = structural.matches('}').count() as i32;

        let attribute = attribute_pattern().find(&scrubbed).map(|m| m.as_str().to_string());
        let has_attribute = attribute.is_some();
        if attribute.is_some() {
            pending_attribute = attribute;
        }

        let declared = if let Some(header) = match_function_line(line) {
            let params = if header.params == "()" {
                String::new()
            } else {
                header.params
            };
            let detail = match pending_attribute.take() {
                Some(attr) => format!("{} {}", attr, params).trim_end().to_string(),
                None => params,
            };
            Some((header.name, BlockKind::Function, detail))
        } else {
            match_variable_line(line).map(|var| {
                let kind = if var.is_constant {
                    BlockKind::Constant
                } else {
                    BlockKind::Variable
                };
                let detail = var
                    .type_annotation
                    .map(|t| format!(": {}", t))
                    .unwrap_or_default();
                (var.name, kind, detail)
            })
        };

        if let Some((name, kind, detail)) = declared {
            let idx = arena.len();
            arena.push(ArenaNode {
                node: BlockNode {
                    name,
                    kind,
                    detail,
                    start_line: line_num,
                    end_line: line_num,
                    children: Vec::new(),
                },
                children: Vec::new(),
            });
            match stack.last() {
                Some(open) => arena[open.node].children.push(idx),
                None => roots.push(idx),
            }
            // A one-line body (`fn f() { ... }`) is open and closed on this
            // line, so the function is not left on the stack and later
            // declarations stay at the outer level
            let inline_body = scrubbed.contains('{') && opens == 0;
            if kind == BlockKind::Function && !inline_body {
                stack.push(OpenBlock { node: idx, depth });
            }
        }

        for _ in 0..closes {
            depth -= 1;
            if stack.last().is_some_and(|open| open.depth == depth) {
                if let Some(closed) = stack.pop() {
                    arena[closed.node].node.end_line = line_num;
                }
            }
        }
        depth += opens;

        if line.trim().is_empty() && !has_attribute {
            pending_attribute = None;
        }
    }

    log::trace!("Outline: {} nodes, {} roots", arena.len(), roots.len());
    roots.iter().map(|&idx| assemble(&arena, idx)).collect()
}

fn assemble(arena: &[ArenaNode], idx: usize) -> BlockNode {
    let entry = &arena[idx];
    let mut node = entry.node.clone();
    node.children = entry.children.iter().map(|&c| assemble(arena, c)).collect();
    node
}
