//! Handler for `textDocument/completion` requests.
//!
//! Once a step keyword and a space have been typed in a feature file, the
//! handler offers the step definitions that could follow it. Each item
//! inserts the pattern as a snippet with one tab stop per placeholder and
//! replaces whatever step text was already typed.

use async_lsp::ResponseError;
use behave_lsp_patterns::StepToken;
use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, CompletionTextEdit,
    InsertTextFormat, Position, Range, TextEdit,
};
use tracing::debug;

use crate::queries::CompletionCandidate;
use crate::server::WorkspaceContext;
use crate::util::{byte_to_utf16_col, utf16_col_to_byte};

use super::util::{document_text, not_initialised, url_to_path};

/// What has been typed on the completion line so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TypedStep<'a> {
    token: &'a str,
    text: &'a str,
    text_start: usize,
}

/// Split the text before the cursor into keyword and partial step text.
///
/// Returns `None` until the keyword is followed by whitespace.
fn typed_step(prefix: &str) -> Option<TypedStep<'_>> {
    let indented = prefix.trim_start();
    let token_start = prefix.len() - indented.len();
    let token_len = indented.find(char::is_whitespace)?;
    let token = indented.get(..token_len)?;
    let rest = indented.get(token_len..)?;
    let text = rest.trim_start();
    Some(TypedStep {
        token,
        text,
        text_start: token_start + token_len + (rest.len() - text.len()),
    })
}

fn to_completion_item(
    rank: usize,
    candidate: CompletionCandidate,
    replace: Range,
) -> CompletionItem {
    let detail = candidate.function_name.clone().or_else(|| {
        candidate
            .location
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });
    CompletionItem {
        label: candidate.pattern.clone(),
        kind: Some(CompletionItemKind::FUNCTION),
        detail,
        sort_text: Some(format!("{rank:05}")),
        filter_text: Some(candidate.pattern),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(
            replace,
            candidate.snippet,
        ))),
        ..CompletionItem::default()
    }
}

/// Handle `textDocument/completion` requests.
///
/// Returns `None` outside the feature corpus and on lines where no step
/// keyword has been typed yet, such as section headers and free text.
///
/// # Errors
///
/// Returns an error when the request arrives before the indexes exist.
pub async fn handle_completion(
    context: Option<WorkspaceContext>,
    params: CompletionParams,
) -> Result<Option<CompletionResponse>, ResponseError> {
    let Some(context) = context else {
        return Err(not_initialised());
    };
    let uri = &params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;

    let Some(path) = url_to_path(uri) else {
        return Ok(None);
    };
    if !context.indexes.usages.index().matches(&path) {
        return Ok(None);
    }
    let Some(text) = document_text(&context, &path).await else {
        return Ok(None);
    };
    let Ok(line) = usize::try_from(position.line) else {
        return Ok(None);
    };

    let lines: Vec<&str> = text.lines().collect();
    let current = lines.get(line).copied().unwrap_or_default();
    let cursor = utf16_col_to_byte(current, position.character);
    let Some(typed) = current.get(..cursor).and_then(typed_step) else {
        return Ok(None);
    };
    if typed.token.parse::<StepToken>().is_err() {
        return Ok(None);
    }

    let candidates = context
        .indexes
        .queries
        .completion_candidates_at(&lines, line, typed.token, typed.text);
    debug!(
        token = typed.token,
        partial = typed.text,
        count = candidates.len(),
        "step completion"
    );

    let replace = Range::new(
        Position::new(position.line, byte_to_utf16_col(current, typed.text_start)),
        position,
    );
    let items = candidates
        .into_iter()
        .enumerate()
        .map(|(rank, candidate)| to_completion_item(rank, candidate, replace))
        .collect();
    Ok(Some(CompletionResponse::Array(items)))
}
