//! Core language server state and service construction.
//!
//! This module defines the central state shared across all LSP handlers, the
//! per-workspace index bundle built once the client is ready, and the custom
//! events through which background tasks hand work back to the main loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_lsp::ClientSocket;
use lsp_types::{
    ClientCapabilities, CompletionOptions, OneOf, ServerCapabilities, TextDocumentSyncCapability,
    TextDocumentSyncKind, WorkspaceFolder,
};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::indexing::{ScanSettings, StepDefinitionIndex, StepUsageIndex};
use crate::queries::StepQueries;
use crate::settings::{GlobSettings, GlobSettingsSource, SettingKey};
use crate::workspace::{
    CorpusGlobs, DocumentStore, FileEvent, FileWatcher, OverlayReader, SourceReader,
};

/// A filesystem change forwarded from the watcher task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged(pub FileEvent);

/// A glob setting changed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChanged {
    /// Which corpus the change applies to.
    pub key: SettingKey,
    /// The new globs for that corpus.
    pub globs: CorpusGlobs,
}

/// Both step indexes and the queries over them, for one workspace root.
///
/// Clones share the same indexes.
#[derive(Debug, Clone)]
pub struct WorkspaceIndexes {
    /// Step definitions from Python step modules.
    pub definitions: Arc<StepDefinitionIndex>,
    /// Step occurrences from feature files.
    pub usages: Arc<StepUsageIndex>,
    /// Queries over both indexes.
    pub queries: Arc<StepQueries>,
}

impl WorkspaceIndexes {
    /// Build empty indexes over `root`, reading open documents before disk.
    #[must_use]
    pub fn new(
        root: &Path,
        documents: &DocumentStore,
        settings: &GlobSettings,
        scan: ScanSettings,
    ) -> Self {
        let reader: Arc<dyn SourceReader> = Arc::new(OverlayReader::new(documents.clone()));
        let definitions = Arc::new(StepDefinitionIndex::new(
            Arc::clone(&reader),
            root,
            corpus_globs(settings, SettingKey::Steps),
            scan,
        ));
        let usages = Arc::new(StepUsageIndex::new(
            reader,
            root,
            corpus_globs(settings, SettingKey::Features),
            scan,
        ));
        let queries = Arc::new(StepQueries::new(
            Arc::clone(&definitions),
            Arc::clone(&usages),
        ));
        Self {
            definitions,
            usages,
            queries,
        }
    }

    /// Run the initial scan of both indexes.
    pub async fn initialize(&self) {
        futures::join!(
            self.definitions.index().initialize(),
            self.usages.index().initialize()
        );
    }

    /// Drop all indexed state.
    pub fn dispose(&self) {
        self.definitions.index().dispose();
        self.usages.index().dispose();
    }

    /// Route a filesystem event to both indexes.
    ///
    /// Returns whether the definition index changed.
    pub async fn handle_file_event(&self, event: &FileEvent) -> bool {
        let before = self.definitions.version();
        futures::join!(
            self.definitions.index().handle_file_event(event),
            self.usages.index().handle_file_event(event)
        );
        self.definitions.version() != before
    }

    /// Apply new globs to the index they belong to.
    pub async fn set_patterns(&self, key: SettingKey, globs: CorpusGlobs) {
        match key {
            SettingKey::Steps => self.definitions.index().set_patterns(globs).await,
            SettingKey::Features => self.usages.index().set_patterns(globs).await,
        }
    }
}

/// Include and exclude globs of one corpus.
#[must_use]
pub fn corpus_globs(settings: &GlobSettings, key: SettingKey) -> CorpusGlobs {
    CorpusGlobs::new(settings.patterns(key).to_vec(), settings.exclude.clone())
}

/// Everything a background task needs to update indexes and diagnostics.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Socket for notifications to the client, when connected.
    pub client: Option<ClientSocket>,
    /// Open editor buffers.
    pub documents: DocumentStore,
    /// The workspace indexes.
    pub indexes: WorkspaceIndexes,
}

/// Central state shared across all LSP handlers.
///
/// This struct holds the in-memory state of the language server, including
/// the workspace configuration and the indexes. It is passed to handlers via
/// the async-lsp router.
#[derive(Debug)]
pub struct ServerState {
    /// Socket for notifications to the client.
    client: Option<ClientSocket>,
    /// Client capabilities received during initialisation.
    client_capabilities: Option<ClientCapabilities>,
    /// Workspace folders from the client.
    workspace_folders: Vec<WorkspaceFolder>,
    /// Root directory scanned by the indexes.
    workspace_root: Option<PathBuf>,
    /// Whether the server has been initialised.
    initialised: bool,
    /// Configuration loaded from environment and command line.
    config: ServerConfig,
    /// Open editor buffers.
    documents: DocumentStore,
    /// Glob settings supplied by the client.
    settings: Arc<GlobSettingsSource>,
    /// Indexes, built once the client reports `initialized`.
    indexes: Option<WorkspaceIndexes>,
    /// Keeps the filesystem watcher alive.
    watcher: Option<FileWatcher>,
}

impl ServerState {
    /// Create a new server state with the given configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use behave_lsp_server::config::ServerConfig;
    /// use behave_lsp_server::server::ServerState;
    ///
    /// let state = ServerState::new(ServerConfig::default());
    /// assert!(!state.is_initialised());
    /// ```
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            client: None,
            client_capabilities: None,
            workspace_folders: Vec::new(),
            workspace_root: None,
            initialised: false,
            config,
            documents: DocumentStore::default(),
            settings: Arc::new(GlobSettingsSource::default()),
            indexes: None,
            watcher: None,
        }
    }

    /// Attach the socket used for client notifications.
    pub fn set_client(&mut self, client: ClientSocket) {
        self.client = Some(client);
    }

    /// The client socket, when connected.
    #[must_use]
    pub fn client(&self) -> Option<&ClientSocket> {
        self.client.as_ref()
    }

    /// Store client capabilities received during initialization.
    pub fn set_client_capabilities(&mut self, capabilities: ClientCapabilities) {
        self.client_capabilities = Some(capabilities);
    }

    /// Access the stored client capabilities, if any.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<&ClientCapabilities> {
        self.client_capabilities.as_ref()
    }

    /// Store workspace folders provided by the client.
    pub fn set_workspace_folders(&mut self, folders: Vec<WorkspaceFolder>) {
        self.workspace_folders = folders;
    }

    /// Access the workspace folders provided by the client.
    #[must_use]
    pub fn workspace_folders(&self) -> &[WorkspaceFolder] {
        &self.workspace_folders
    }

    /// Set the directory the indexes scan.
    pub fn set_workspace_root(&mut self, root: PathBuf) {
        self.workspace_root = Some(root);
    }

    /// The directory the indexes scan, once known.
    #[must_use]
    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Access the current server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open editor buffers.
    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Glob settings supplied by the client.
    #[must_use]
    pub fn settings(&self) -> &Arc<GlobSettingsSource> {
        &self.settings
    }

    /// Install the workspace indexes.
    pub fn set_indexes(&mut self, indexes: WorkspaceIndexes) {
        self.indexes = Some(indexes);
    }

    /// The workspace indexes, once built.
    #[must_use]
    pub fn indexes(&self) -> Option<&WorkspaceIndexes> {
        self.indexes.as_ref()
    }

    /// Keep `watcher` running for the lifetime of the state.
    pub fn set_watcher(&mut self, watcher: FileWatcher) {
        debug!(root = %watcher.root().display(), "file watcher attached");
        self.watcher = Some(watcher);
    }

    /// Stop watching and drop the indexes' contents.
    pub fn shutdown(&mut self) {
        self.watcher = None;
        if let Some(indexes) = &self.indexes {
            indexes.dispose();
        }
    }

    /// Snapshot of what background tasks need, once indexes exist.
    #[must_use]
    pub fn context(&self) -> Option<WorkspaceContext> {
        let Some(indexes) = self.indexes.clone() else {
            warn!("workspace indexes are not ready");
            return None;
        };
        Some(WorkspaceContext {
            client: self.client.clone(),
            documents: self.documents.clone(),
            indexes,
        })
    }

    /// Mark the server as initialised.
    pub fn mark_initialised(&mut self) {
        self.initialised = true;
    }

    /// Check if the server is initialised.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }
}

/// Build the server capabilities to advertise to the client.
///
/// Full document sync, definition, references, and completion triggered by
/// a space.
#[must_use]
pub fn build_server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        definition_provider: Some(OneOf::Left(true)),
        references_provider: Some(OneOf::Left(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![" ".to_string()]),
            ..CompletionOptions::default()
        }),
        ..ServerCapabilities::default()
    }
}
