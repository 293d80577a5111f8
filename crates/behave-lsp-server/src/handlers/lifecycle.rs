//! LSP lifecycle handlers for initialization and shutdown.
//!
//! This module implements the core lifecycle protocol handlers required by
//! the LSP specification: `initialize`, `initialized`, and `shutdown`. The
//! indexes are built once the client reports `initialized`, with the initial
//! scan, settings listeners, and filesystem watcher started in the
//! background.

use std::path::PathBuf;

use async_lsp::{ClientSocket, ErrorCode, ResponseError};
use lsp_types::{InitializeParams, InitializeResult, InitializedParams, ServerInfo, Url};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::server::{
    FileChanged, ServerState, SettingsChanged, WorkspaceIndexes, build_server_capabilities,
    corpus_globs,
};
use crate::settings::{GlobSettings, GlobSettingsSource, SettingKey};
use crate::workspace::FileWatcher;

use super::diagnostics::refresh_open_diagnostics;
use super::util::{response_error, url_to_path};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "behave-lsp";

/// Handle the `initialize` request from the client.
///
/// Stores the client capabilities, picks the workspace root, and reads glob
/// settings from `initializationOptions`. Per the LSP specification, this
/// must be the first request sent by the client.
///
/// # Errors
///
/// Returns a `ResponseError` when the server is already initialized.
pub fn handle_initialise(
    state: &mut ServerState,
    params: InitializeParams,
) -> Result<InitializeResult, ResponseError> {
    if state.is_initialised() {
        return Err(response_error(
            &ServerError::AlreadyInitialised,
            ErrorCode::INVALID_REQUEST,
        ));
    }

    #[expect(
        deprecated,
        reason = "Some clients still populate root_uri instead of workspace_folders."
    )]
    let InitializeParams {
        capabilities,
        workspace_folders,
        root_uri,
        initialization_options,
        ..
    } = params;
    state.set_client_capabilities(capabilities);
    if let Some(folders) = workspace_folders {
        state.set_workspace_folders(folders);
    }

    match extract_workspace_path(state.workspace_folders(), root_uri.as_ref()) {
        Some(root) => {
            info!(root = %root.display(), "workspace root selected");
            state.set_workspace_root(root);
        }
        None => warn!("no file workspace root supplied; indexing disabled"),
    }

    if let Some(options) = initialization_options {
        state
            .settings()
            .update(GlobSettings::from_client_settings(&options));
    }

    Ok(InitializeResult {
        capabilities: build_server_capabilities(),
        server_info: Some(ServerInfo {
            name: SERVER_NAME.to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

/// Handle the `initialized` notification from the client.
///
/// Builds the workspace indexes and, when a client socket is attached,
/// wires settings changes and filesystem events back into the main loop.
/// The initial scan runs in the background and publishes diagnostics for
/// documents opened in the meantime once it completes.
pub fn handle_initialised(state: &mut ServerState, _params: InitializedParams) {
    state.mark_initialised();
    info!("server initialised");

    let Some(root) = state.workspace_root().map(PathBuf::from) else {
        return;
    };
    let indexes = WorkspaceIndexes::new(
        &root,
        state.documents(),
        &state.settings().current(),
        state.config().scan_settings(),
    );
    state.set_indexes(indexes);

    if let Some(client) = state.client().cloned() {
        forward_settings(state.settings(), &client);
        match FileWatcher::start(&root) {
            Ok((watcher, events)) => {
                forward_file_events(events, client);
                state.set_watcher(watcher);
            }
            Err(err) => warn!(error = %err, "file watching disabled"),
        }
    }

    let Some(context) = state.context() else {
        return;
    };
    tokio::spawn(async move {
        context.indexes.initialize().await;
        info!(
            definitions = context.indexes.definitions.all().len(),
            usages = context.indexes.usages.all().len(),
            "initial scan complete"
        );
        refresh_open_diagnostics(&context);
    });
}

fn forward_settings(settings: &GlobSettingsSource, client: &ClientSocket) {
    for key in [SettingKey::Steps, SettingKey::Features] {
        let client = client.clone();
        settings.subscribe(key, move |current| {
            let event = SettingsChanged {
                key,
                globs: corpus_globs(current, key),
            };
            if let Err(err) = client.emit(event) {
                warn!(error = %err, "failed to forward settings change");
            }
        });
    }
}

fn forward_file_events(
    mut events: tokio::sync::mpsc::UnboundedReceiver<crate::workspace::FileEvent>,
    client: ClientSocket,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if client.emit(FileChanged(event)).is_err() {
                debug!("main loop closed; stopping file event forwarding");
                break;
            }
        }
    });
}

/// Handle the `shutdown` request from the client.
///
/// Stops the watcher and empties the indexes. Per the LSP specification,
/// the server does not exit until it receives the `exit` notification.
///
/// # Errors
///
/// Currently always returns `Ok(())`.
pub fn handle_shutdown(state: &mut ServerState) -> Result<(), ResponseError> {
    info!("shutdown request received");
    state.shutdown();
    Ok(())
}

/// Extract a workspace path from workspace folders.
///
/// Returns the path of the first workspace folder with a file:// scheme. When
/// no folders are provided, the root URI is used (for single-root clients).
fn extract_workspace_path(
    workspace_folders: &[lsp_types::WorkspaceFolder],
    root_uri: Option<&Url>,
) -> Option<PathBuf> {
    workspace_folders
        .first()
        .and_then(|f| url_to_path(&f.uri))
        .or_else(|| root_uri.and_then(url_to_path))
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use lsp_types::ClientCapabilities;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn create_test_state() -> ServerState {
        ServerState::new(ServerConfig::default())
    }

    #[fixture]
    fn create_init_params() -> InitializeParams {
        InitializeParams {
            capabilities: ClientCapabilities::default(),
            workspace_folders: None,
            ..Default::default()
        }
    }

    #[rstest]
    fn handle_initialise_stores_client_capabilities(
        mut create_test_state: ServerState,
        create_init_params: InitializeParams,
    ) {
        let result = handle_initialise(&mut create_test_state, create_init_params);

        assert!(result.is_ok());
        assert!(create_test_state.client_capabilities().is_some());
    }

    #[rstest]
    fn handle_initialise_returns_server_info(
        mut create_test_state: ServerState,
        create_init_params: InitializeParams,
    ) {
        let result = handle_initialise(&mut create_test_state, create_init_params);
        let init_result = result.expect("initialization should succeed");

        let info = init_result.server_info.expect("should have server info");
        assert_eq!(info.name, SERVER_NAME);
        assert!(info.version.is_some());
    }

    #[rstest]
    fn handle_initialise_fails_when_already_initialised(
        mut create_test_state: ServerState,
        create_init_params: InitializeParams,
    ) {
        create_test_state.mark_initialised();

        let result = handle_initialise(&mut create_test_state, create_init_params);

        assert!(result.is_err());
    }

    #[rstest]
    fn handle_initialise_reads_glob_options(mut create_test_state: ServerState) {
        let params = InitializeParams {
            initialization_options: Some(json!({
                "behave": { "featuresGlob": ["specs/**/*.feature"] }
            })),
            ..Default::default()
        };

        handle_initialise(&mut create_test_state, params).expect("initialise");

        assert_eq!(
            create_test_state.settings().current().features,
            vec!["specs/**/*.feature".to_string()]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn handle_initialised_builds_indexes_for_the_root(mut create_test_state: ServerState) {
        let dir = tempfile::tempdir().expect("temp dir");
        create_test_state.set_workspace_root(dir.path().to_path_buf());

        handle_initialised(&mut create_test_state, InitializedParams {});

        assert!(create_test_state.is_initialised());
        let indexes = create_test_state.indexes().expect("indexes");
        assert_eq!(indexes.definitions.index().root(), dir.path());
    }

    #[rstest]
    fn handle_initialised_without_root_skips_indexing(mut create_test_state: ServerState) {
        handle_initialised(&mut create_test_state, InitializedParams {});

        assert!(create_test_state.is_initialised());
        assert!(create_test_state.indexes().is_none());
    }

    #[rstest]
    fn handle_shutdown_returns_ok(mut create_test_state: ServerState) {
        let result = handle_shutdown(&mut create_test_state);

        assert!(result.is_ok());
    }

    #[test]
    fn extract_workspace_path_from_folders() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\folder\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/folder/path");

        let folders = vec![lsp_types::WorkspaceFolder {
            uri: Url::from_file_path(&test_path).expect("valid path"),
            name: "folder".to_string(),
        }];

        let path = extract_workspace_path(&folders, None);

        assert_eq!(path, Some(test_path));
    }

    #[test]
    fn extract_workspace_path_returns_none_when_empty() {
        assert!(extract_workspace_path(&[], None).is_none());
    }

    #[test]
    fn extract_workspace_path_uses_root_uri_when_no_folders() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\folder\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/folder/path");

        let root_uri = Url::from_file_path(&test_path).expect("valid path");
        let path = extract_workspace_path(&[], Some(&root_uri));

        assert_eq!(path, Some(test_path));
    }
}
