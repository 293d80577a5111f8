//! Diagnostic publishing via LSP.
//!
//! Undefined steps in open feature documents are reported through
//! `textDocument/publishDiagnostics`. An empty list is published when no
//! issues remain, clearing earlier diagnostics.

use std::path::Path;

use async_lsp::ClientSocket;
use lsp_types::notification::PublishDiagnostics;
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, PublishDiagnosticsParams, Range, Url};
use tracing::{debug, warn};

use crate::queries::StepDiagnostic;
use crate::server::WorkspaceContext;

/// Source label attached to every diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "behave-lsp";

/// Convert an undefined-step report into an LSP diagnostic.
#[must_use]
pub fn to_lsp_diagnostic(diagnostic: &StepDiagnostic) -> Diagnostic {
    Diagnostic {
        range: Range::new(
            Position::new(diagnostic.line, diagnostic.column_start),
            Position::new(diagnostic.line, diagnostic.column_end),
        ),
        severity: Some(DiagnosticSeverity::WARNING),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diagnostic.message.clone(),
        ..Diagnostic::default()
    }
}

fn send(client: &ClientSocket, path: &Path, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
    let Ok(uri) = Url::from_file_path(path) else {
        warn!(path = %path.display(), "cannot convert path to URI");
        return;
    };
    let params = PublishDiagnosticsParams::new(uri, diagnostics, version);
    if let Err(err) = client.notify::<PublishDiagnostics>(params) {
        warn!(error = %err, "failed to publish diagnostics");
    }
}

/// Compute and publish diagnostics for one open feature document.
///
/// Documents that are not open, or not part of the feature corpus, are
/// skipped. The computation is abandoned if the document changes while it
/// runs; the edit that changed it schedules a fresh run.
pub fn publish_document_diagnostics(context: &WorkspaceContext, path: &Path) {
    let Some(client) = &context.client else {
        debug!("no client socket available for publishing diagnostics");
        return;
    };
    let Some(document) = context.documents.get(path) else {
        return;
    };
    if !context.indexes.usages.index().matches(path) {
        return;
    }

    let documents = &context.documents;
    let Some(found) = context
        .indexes
        .queries
        .compute_diagnostics_checked(&document.text, || {
            documents.version(path) == Some(document.version)
        })
    else {
        debug!(path = %path.display(), "document changed; diagnostics skipped");
        return;
    };

    debug!(path = %path.display(), count = found.len(), "publishing diagnostics");
    let diagnostics = found.iter().map(to_lsp_diagnostic).collect();
    send(client, path, diagnostics, Some(document.version));
}

/// Republish diagnostics for every open document.
///
/// Called after step definitions change, since any feature may be affected.
pub fn refresh_open_diagnostics(context: &WorkspaceContext) {
    for path in context.documents.paths() {
        publish_document_diagnostics(context, &path);
    }
}

/// Publish an empty diagnostic list for `path`.
pub fn clear_diagnostics(context: &WorkspaceContext, path: &Path) {
    if let Some(client) = &context.client {
        send(client, path, Vec::new(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_cover_the_step_text() {
        let diagnostic = to_lsp_diagnostic(&StepDiagnostic {
            line: 4,
            column_start: 10,
            column_end: 27,
            message: "Undefined step: Given an unknown step".into(),
        });
        assert_eq!(diagnostic.range.start, Position::new(4, 10));
        assert_eq!(diagnostic.range.end, Position::new(4, 27));
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(diagnostic.source.as_deref(), Some(DIAGNOSTIC_SOURCE));
        assert_eq!(diagnostic.message, "Undefined step: Given an unknown step");
    }
}
