//
// content_provider.rs
//
// File access for sibling-module resolution
//
// Open documents are authoritative: when a module is open in the editor its
// in-memory text is used instead of the file on disk.
//

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Read access to module files.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Text of `path`, or `None` if it cannot be read.
    async fn read(&self, path: &Path) -> Option<String>;

    /// Whether `path` exists as a file.
    async fn exists(&self, path: &Path) -> bool;
}

/// Reads straight from disk with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskContentProvider;

#[async_trait]
impl ContentProvider for DiskContentProvider {
    async fn read(&self, path: &Path) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Some(text),
            Err(err) => {
                log::warn!("Failed to read {}: {}", path.display(), err);
                None
            }
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Open documents first, then disk.
#[derive(Debug, Clone, Default)]
pub struct OverlayContentProvider {
    open_documents: HashMap<PathBuf, String>,
    disk: DiskContentProvider,
}

impl OverlayContentProvider {
    pub fn new(open_documents: HashMap<PathBuf, String>) -> Self {
        Self {
            open_documents,
            disk: DiskContentProvider,
        }
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.open_documents.contains_key(path)
    }
}

#[async_trait]
impl ContentProvider for OverlayContentProvider {
    async fn read(&self, path: &Path) -> Option<String> {
        if let Some(text) = self.open_documents.get(path) {
            return Some(text.clone());
        }
        self.disk.read(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.is_open(path) || self.disk.exists(path).await
    }
}
