//! Shared test support utilities for behave-lsp-server tests.
//!
//! This module provides common infrastructure for both unit and integration
//! tests, including:
//! - In-memory and instrumented [`SourceReader`]s
//! - Temporary workspaces with both indexes wired up
//! - Newtype wrappers for improved type safety

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::indexing::{ScanSettings, StepDefinitionIndex, StepUsageIndex};
use crate::queries::StepQueries;
use crate::server::{WorkspaceContext, WorkspaceIndexes};
use crate::settings::GlobSettings;
use crate::workspace::{DiskReader, DocumentStore, SourceReader};

/// Newtype wrapper for test file names to improve type safety.
#[derive(Debug, Clone)]
pub struct Filename(pub(crate) String);

impl From<&str> for Filename {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for Filename {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Filename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Newtype wrapper for file contents to improve type safety.
#[derive(Debug, Clone)]
pub struct FileContent(pub(crate) String);

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for FileContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// In-memory files served through [`SourceReader`].
///
/// Clones share the same files, so a test can edit content while an index
/// holds the reader.
#[derive(Debug, Clone, Default)]
pub struct StaticReader {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl StaticReader {
    /// Serve the given `(path, text)` pairs.
    #[must_use]
    pub fn new<I, P, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<PathBuf>,
        T: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(path, text)| (path.into(), text.into()))
            .collect();
        Self {
            files: Arc::new(Mutex::new(files)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        match self.files.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the text of `path`, creating it if needed.
    pub fn set(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.lock().insert(path.into(), text.into());
    }

    /// Delete `path`; later reads fail with `NotFound`.
    pub fn remove(&self, path: &Path) {
        self.lock().remove(path);
    }
}

#[async_trait]
impl SourceReader for StaticReader {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// Wraps a reader, counting reads and yielding to the scheduler before each
/// one.
///
/// Yielding makes a read a real suspension point, so a test can start a
/// second scan of the same file while the first is still reading. The most
/// reads ever in flight at once is recorded as well.
#[derive(Debug, Clone)]
pub struct CountingReader<R = DiskReader> {
    inner: R,
    yields: usize,
    reads: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl<R> CountingReader<R> {
    /// Count reads served by `inner`, yielding `yields` times before each.
    #[must_use]
    pub fn new(inner: R, yields: usize) -> Self {
        Self {
            inner,
            yields,
            reads: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reads started so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Largest number of reads that overlapped.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: SourceReader> SourceReader for CountingReader<R> {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }
        let text = self.inner.read_to_string(path).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        text
    }
}

/// Wraps a reader so that the first read returns only once released.
///
/// The content is read before waiting, so a test can change or delete the
/// file while the scan holds text that is already stale. Later reads pass
/// straight through.
#[derive(Debug, Clone)]
pub struct GatedReader<R> {
    inner: R,
    gate: Arc<Notify>,
    armed: Arc<AtomicBool>,
}

impl<R> GatedReader<R> {
    /// Hold the first read served by `inner` until [`release`](Self::release).
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gate: Arc::new(Notify::new()),
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Let the held read complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl<R: SourceReader> SourceReader for GatedReader<R> {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let text = self.inner.read_to_string(path).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.notified().await;
        }
        text
    }
}

/// A temporary workspace with both indexes and the query layer attached.
pub struct TestWorkspace {
    /// Temporary directory holding the files.
    pub dir: TempDir,
    /// Open editor buffers overlaid on the files.
    pub documents: DocumentStore,
    /// Both indexes and the query layer over them.
    pub indexes: WorkspaceIndexes,
}

impl TestWorkspace {
    /// Absolute path of a workspace-relative file.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Overwrite a file on disk.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[expect(clippy::expect_used, reason = "test helper panics on write failure")]
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directories");
        }
        std::fs::write(&path, content).expect("write workspace file");
        path
    }

    /// The step definition index.
    #[must_use]
    pub fn definitions(&self) -> &Arc<StepDefinitionIndex> {
        &self.indexes.definitions
    }

    /// The step usage index.
    #[must_use]
    pub fn usages(&self) -> &Arc<StepUsageIndex> {
        &self.indexes.usages
    }

    /// The query layer.
    #[must_use]
    pub fn queries(&self) -> &StepQueries {
        &self.indexes.queries
    }

    /// A handler context with no client attached.
    #[must_use]
    pub fn context(&self) -> WorkspaceContext {
        WorkspaceContext {
            client: None,
            documents: self.documents.clone(),
            indexes: self.indexes.clone(),
        }
    }

    /// Run a full scan of both indexes.
    pub async fn initialize(&self) {
        self.indexes.initialize().await;
    }
}

/// Builder for temporary workspaces of step modules and feature files.
///
/// Files are written when [`build`](Self::build) runs; indexing starts with
/// [`TestWorkspace::initialize`] or [`build_indexed`](Self::build_indexed).
pub struct WorkspaceBuilder {
    files: Vec<(String, String)>,
    settings: GlobSettings,
}

impl WorkspaceBuilder {
    /// Start an empty workspace using the default globs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            settings: GlobSettings::default(),
        }
    }

    /// Add a file at a workspace-relative path.
    #[must_use]
    pub fn with_file(
        mut self,
        filename: impl Into<Filename>,
        content: impl Into<FileContent>,
    ) -> Self {
        self.files.push((filename.into().0, content.into().0));
        self
    }

    /// Use custom glob settings.
    #[must_use]
    pub fn with_settings(mut self, settings: GlobSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Write every file and wire up the indexes.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or any file cannot be written.
    #[expect(clippy::expect_used, reason = "builder panics on temp dir failure")]
    #[must_use]
    pub fn build(self) -> TestWorkspace {
        let dir = TempDir::new().expect("temp dir");
        let documents = DocumentStore::default();
        let indexes = WorkspaceIndexes::new(
            dir.path(),
            &documents,
            &self.settings,
            ScanSettings::default(),
        );
        let workspace = TestWorkspace {
            dir,
            documents,
            indexes,
        };
        for (filename, content) in &self.files {
            workspace.write(filename, content);
        }
        workspace
    }

    /// Build the workspace and scan both indexes.
    pub async fn build_indexed(self) -> TestWorkspace {
        let workspace = self.build();
        workspace.initialize().await;
        workspace
    }
}

impl Default for WorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
