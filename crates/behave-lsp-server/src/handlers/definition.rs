//! Handler for `textDocument/definition` requests.
//!
//! When the cursor is on a step in a feature file, the handler returns the
//! decorators of every Python step definition accepting it. Continuation
//! steps (`And`, `But`, `*`) take their keyword from the steps above them.

use async_lsp::ResponseError;
use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, Location};
use tracing::debug;

use crate::server::WorkspaceContext;

use super::util::{document_text, line_location, not_initialised, url_to_path};

/// Handle `textDocument/definition` requests.
///
/// Returns `None` for files outside the feature corpus, for lines that are
/// not steps, and for steps without a definition.
///
/// # Errors
///
/// Returns an error when the request arrives before the indexes exist.
pub async fn handle_definition(
    context: Option<WorkspaceContext>,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>, ResponseError> {
    let Some(context) = context else {
        return Err(not_initialised());
    };
    let uri = &params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let Some(path) = url_to_path(uri) else {
        debug!(%uri, "ignoring definition request for non-file URI");
        return Ok(None);
    };
    if !context.indexes.usages.index().matches(&path) {
        debug!(path = %path.display(), "ignoring definition request outside feature files");
        return Ok(None);
    }
    let Some(text) = document_text(&context, &path).await else {
        return Ok(None);
    };
    let Ok(line) = usize::try_from(position.line) else {
        return Ok(None);
    };

    let lines: Vec<&str> = text.lines().collect();
    let locations: Vec<Location> = context
        .indexes
        .queries
        .find_definition(&lines, line)
        .iter()
        .filter_map(|found| line_location(&found.path, found.line, found.column, found.column))
        .collect();

    if locations.is_empty() {
        debug!(line, "no step definition found");
        return Ok(None);
    }
    debug!(line, count = locations.len(), "found step definitions");
    Ok(Some(GotoDefinitionResponse::Array(locations)))
}
