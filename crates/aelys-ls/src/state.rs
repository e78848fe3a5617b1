//
// state.rs
//
// Open documents and shared server state
//

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ropey::Rope;
use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use tower_lsp::lsp_types::Url;

use crate::config::AelysConfig;
use crate::content_provider::OverlayContentProvider;
use crate::stdlib::StandardLibrary;
use crate::utf16::utf16_offset_to_char_offset;

/// An open document
pub struct Document {
    pub contents: Rope,
    pub version: Option<i32>,
    pub revision: u64,
}

impl Document {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            contents: Rope::from_str(text),
            version,
            revision: 0,
        }
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        if let Some(range) = change.range {
            let line_count = self.contents.len_lines();
            let start_line = (range.start.line as usize).min(line_count.saturating_sub(1));
            let end_line = (range.end.line as usize).min(line_count.saturating_sub(1));

            let start_line_text = self.contents.line(start_line).to_string();
            let end_line_text = self.contents.line(end_line).to_string();

            let start_char =
                utf16_offset_to_char_offset(&start_line_text, range.start.character as usize);
            let end_char = utf16_offset_to_char_offset(&end_line_text, range.end.character as usize);

            let start_idx = self.contents.line_to_char(start_line) + start_char;
            let end_idx = (self.contents.line_to_char(end_line) + end_char).max(start_idx);

            self.contents.remove(start_idx..end_idx);
            self.contents.insert(start_idx, &change.text);
        } else {
            // Full document sync
            self.contents = Rope::from_str(&change.text);
        }

        self.revision += 1;
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }
}

/// Everything a request handler needs, copied out of [`WorldState`] so the
/// lock is not held across file reads.
pub struct DocumentSnapshot {
    pub uri: Url,
    pub text: String,
    /// File path of the document, when it has one
    pub path: Option<PathBuf>,
    pub stdlib: Arc<StandardLibrary>,
    /// Sibling modules read through this see unsaved editor content
    pub provider: OverlayContentProvider,
}

impl DocumentSnapshot {
    /// Directory local imports are resolved against.
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

pub struct WorldState {
    pub documents: HashMap<Url, Document>,
    pub workspace_folders: Vec<Url>,
    pub stdlib: Arc<StandardLibrary>,
    pub config: AelysConfig,
}

impl WorldState {
    pub fn new(stdlib: Arc<StandardLibrary>) -> Self {
        Self {
            documents: HashMap::new(),
            workspace_folders: Vec::new(),
            stdlib,
            config: AelysConfig::default(),
        }
    }

    pub fn open_document(&mut self, uri: Url, text: &str, version: Option<i32>) {
        self.documents.insert(uri, Document::new(text, version));
    }

    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
    }

    pub fn apply_change(&mut self, uri: &Url, change: TextDocumentContentChangeEvent) {
        if let Some(doc) = self.documents.get_mut(uri) {
            doc.apply_change(change);
        }
    }

    /// Snapshot an open document together with the open documents that
    /// share its directory.
    pub fn snapshot(&self, uri: &Url) -> Option<DocumentSnapshot> {
        let doc = self.documents.get(uri)?;
        let path = uri.to_file_path().ok();
        let dir = path.as_deref().and_then(Path::parent);

        let siblings = self
            .documents
            .iter()
            .filter_map(|(other_uri, other)| {
                let other_path = other_uri.to_file_path().ok()?;
                (other_path.parent() == dir).then(|| (other_path, other.text()))
            })
            .collect();

        Some(DocumentSnapshot {
            uri: uri.clone(),
            text: doc.text(),
            path,
            stdlib: Arc::clone(&self.stdlib),
            provider: OverlayContentProvider::new(siblings),
        })
    }
}
