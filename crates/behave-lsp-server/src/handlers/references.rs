//! Handler for `textDocument/references` requests.
//!
//! From a step decorator, or the function directly below a stack of them,
//! the handler lists every feature step the decorators match.

use async_lsp::{ErrorCode, ResponseError};
use lsp_types::{Location, ReferenceParams};
use tracing::debug;

use crate::error::ServerError;
use crate::server::WorkspaceContext;

use super::util::{document_text, line_location, not_initialised, response_error, url_to_path};

/// Handle `textDocument/references` requests.
///
/// Returns `None` for files outside the step module corpus.
///
/// # Errors
///
/// Returns an error when the request arrives before the indexes exist, or
/// when the cursor is not on a step decorator or the function it decorates.
pub async fn handle_references(
    context: Option<WorkspaceContext>,
    params: ReferenceParams,
) -> Result<Option<Vec<Location>>, ResponseError> {
    let Some(context) = context else {
        return Err(not_initialised());
    };
    let uri = &params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;

    let Some(path) = url_to_path(uri) else {
        debug!(%uri, "ignoring references request for non-file URI");
        return Ok(None);
    };
    if !context.indexes.definitions.index().matches(&path) {
        debug!(path = %path.display(), "ignoring references request outside step modules");
        return Ok(None);
    }
    let Some(text) = document_text(&context, &path).await else {
        return Ok(None);
    };
    let Ok(line) = usize::try_from(position.line) else {
        return Ok(None);
    };

    let lines: Vec<&str> = text.lines().collect();
    let usages = context
        .indexes
        .queries
        .find_usages(&lines, line)
        .map_err(|err| {
            response_error(
                &ServerError::MissingLocation(err.to_string()),
                ErrorCode::INVALID_PARAMS,
            )
        })?;

    debug!(line, count = usages.len(), "found step usages");
    Ok(Some(
        usages
            .iter()
            .filter_map(|usage| {
                line_location(
                    &usage.path,
                    usage.line,
                    usage.column,
                    usage.column.saturating_add(usage.length),
                )
            })
            .collect(),
    ))
}
