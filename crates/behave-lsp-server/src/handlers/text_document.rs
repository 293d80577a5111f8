//! Text document notification handlers.
//!
//! Open documents are mirrored into the [`DocumentStore`](crate::workspace::DocumentStore)
//! so that the indexes read live buffers. Every open, change, or save
//! rescans the document in whichever index owns it and republishes the
//! affected diagnostics. Closing a document falls back to the saved file.

use std::path::{Path, PathBuf};

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, Url,
};
use tracing::debug;

use crate::server::{ServerState, WorkspaceContext};

use super::diagnostics::{clear_diagnostics, publish_document_diagnostics, refresh_open_diagnostics};
use super::util::url_to_path;

fn file_path(uri: &Url, notification: &str) -> Option<PathBuf> {
    let path = url_to_path(uri);
    if path.is_none() {
        debug!(%uri, notification, "ignoring non-file URI");
    }
    path
}

/// Rescan `path` in the index that owns it and republish diagnostics.
///
/// A changed step module can affect every open feature, so all of them are
/// refreshed; a feature file only affects itself.
pub async fn sync_document(context: &WorkspaceContext, path: &Path) {
    let indexes = &context.indexes;
    if indexes.definitions.index().matches(path) {
        let before = indexes.definitions.version();
        indexes.definitions.index().scan_file(path).await;
        if indexes.definitions.version() != before {
            refresh_open_diagnostics(context);
        }
    }
    if indexes.usages.index().matches(path) {
        indexes.usages.index().scan_file(path).await;
        publish_document_diagnostics(context, path);
    }
}

fn spawn_sync(state: &ServerState, path: PathBuf) {
    let Some(context) = state.context() else {
        return;
    };
    tokio::spawn(async move {
        sync_document(&context, &path).await;
    });
}

/// Handle `textDocument/didOpen` notifications.
pub fn handle_did_open_text_document(state: &mut ServerState, params: DidOpenTextDocumentParams) {
    let document = params.text_document;
    let Some(path) = file_path(&document.uri, "didOpen") else {
        return;
    };
    state
        .documents()
        .upsert(path.clone(), document.text, document.version);
    spawn_sync(state, path);
}

/// Handle `textDocument/didChange` notifications.
///
/// The server advertises full synchronisation, so the last content change
/// carries the whole document.
pub fn handle_did_change_text_document(
    state: &mut ServerState,
    params: DidChangeTextDocumentParams,
) {
    let Some(path) = file_path(&params.text_document.uri, "didChange") else {
        return;
    };
    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };
    state
        .documents()
        .upsert(path.clone(), change.text, params.text_document.version);
    spawn_sync(state, path);
}

/// Handle `textDocument/didSave` notifications.
pub fn handle_did_save_text_document(state: &mut ServerState, params: DidSaveTextDocumentParams) {
    let Some(path) = file_path(&params.text_document.uri, "didSave") else {
        return;
    };
    if let Some(text) = params.text {
        if let Some(version) = state.documents().version(&path) {
            state.documents().upsert(path.clone(), text, version);
        }
    }
    spawn_sync(state, path);
}

/// Handle `textDocument/didClose` notifications.
pub fn handle_did_close_text_document(
    state: &mut ServerState,
    params: DidCloseTextDocumentParams,
) {
    let Some(path) = file_path(&params.text_document.uri, "didClose") else {
        return;
    };
    state.documents().close(&path);
    let Some(context) = state.context() else {
        return;
    };
    tokio::spawn(async move {
        clear_diagnostics(&context, &path);
        sync_document(&context, &path).await;
    });
}
