//! Sources of file text for the indexes.
//!
//! Indexes read through [`SourceReader`] so that documents open in the editor
//! are indexed from their live buffer rather than from the last saved copy.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

/// Read the full text of a file.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Read `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file is missing, unreadable, or not
    /// valid UTF-8.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads files from disk with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskReader;

#[async_trait]
impl SourceReader for DiskReader {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// An editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    /// Current buffer text.
    pub text: Arc<str>,
    /// Version number supplied by the client.
    pub version: i32,
}

/// Documents currently open in the editor, keyed by path.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<Mutex<HashMap<PathBuf, OpenDocument>>>,
}

impl DocumentStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, OpenDocument>> {
        match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a document's text, replacing any previous buffer.
    pub fn upsert(&self, path: PathBuf, text: impl Into<Arc<str>>, version: i32) {
        self.lock().insert(
            path,
            OpenDocument {
                text: text.into(),
                version,
            },
        );
    }

    /// Forget a document. Returns whether it was open.
    pub fn close(&self, path: &Path) -> bool {
        self.lock().remove(path).is_some()
    }

    /// Current buffer for `path`, if open.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<OpenDocument> {
        self.lock().get(path).cloned()
    }

    /// Current version for `path`, if open.
    #[must_use]
    pub fn version(&self, path: &Path) -> Option<i32> {
        self.lock().get(path).map(|doc| doc.version)
    }

    /// Paths of all open documents, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// Serves open editor buffers first and falls back to another reader.
#[derive(Debug, Clone)]
pub struct OverlayReader<R = DiskReader> {
    documents: DocumentStore,
    fallback: R,
}

impl OverlayReader<DiskReader> {
    /// Overlay `documents` on top of the disk.
    #[must_use]
    pub fn new(documents: DocumentStore) -> Self {
        Self::with_fallback(documents, DiskReader)
    }
}

impl<R> OverlayReader<R> {
    /// Overlay `documents` on top of `fallback`.
    #[must_use]
    pub fn with_fallback(documents: DocumentStore, fallback: R) -> Self {
        Self {
            documents,
            fallback,
        }
    }
}

#[async_trait]
impl<R: SourceReader> SourceReader for OverlayReader<R> {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if let Some(document) = self.documents.get(path) {
            return Ok(document.text.to_string());
        }
        self.fallback.read_to_string(path).await
    }
}
