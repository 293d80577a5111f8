//! Workspace-level notifications and internal events.
//!
//! Configuration changes update the glob settings; the settings listeners
//! registered at initialisation turn those into [`SettingsChanged`] events.
//! Filesystem events from the watcher arrive as [`FileChanged`].

use lsp_types::DidChangeConfigurationParams;
use tracing::debug;

use crate::server::{FileChanged, ServerState, SettingsChanged};
use crate::settings::GlobSettings;

use super::diagnostics::refresh_open_diagnostics;

/// Handle `workspace/didChangeConfiguration` notifications.
pub fn handle_did_change_configuration(
    state: &mut ServerState,
    params: DidChangeConfigurationParams,
) {
    let changed = state
        .settings()
        .update(GlobSettings::from_client_settings(&params.settings));
    debug!(?changed, "configuration updated");
}

/// Apply a filesystem event to the indexes.
///
/// Open diagnostics are refreshed when step definitions changed.
pub fn handle_file_changed(state: &mut ServerState, event: FileChanged) {
    let Some(context) = state.context() else {
        return;
    };
    let FileChanged(event) = event;
    tokio::spawn(async move {
        if context.indexes.handle_file_event(&event).await {
            refresh_open_diagnostics(&context);
        }
    });
}

/// Re-scan the index whose globs changed.
pub fn handle_settings_changed(state: &mut ServerState, event: SettingsChanged) {
    let Some(context) = state.context() else {
        return;
    };
    tokio::spawn(async move {
        context.indexes.set_patterns(event.key, event.globs).await;
        refresh_open_diagnostics(&context);
    });
}
