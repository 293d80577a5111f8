//! Handler utilities for LSP type conversions.
//!
//! Index positions are zero-based lines and UTF-16 columns, which is what
//! the protocol uses, so conversions here only wrap them into LSP types.

use std::path::{Path, PathBuf};

use async_lsp::{ErrorCode, ResponseError};
use lsp_types::{Location, Position, Range, Url};
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::server::WorkspaceContext;
use crate::workspace::{OverlayReader, SourceReader};

/// Convert a URL to a file system path.
///
/// Only handles `file://` URLs; returns `None` for other schemes.
#[must_use]
pub fn url_to_path(url: &Url) -> Option<PathBuf> {
    url.to_file_path().ok()
}

/// Build a single-line LSP location.
///
/// Returns `None` when `path` cannot be expressed as a `file://` URL.
#[must_use]
pub fn line_location(path: &Path, line: u32, start: u32, end: u32) -> Option<Location> {
    let Ok(uri) = Url::from_file_path(path) else {
        warn!(path = %path.display(), "cannot convert path to URI");
        return None;
    };
    Some(Location::new(
        uri,
        Range::new(Position::new(line, start), Position::new(line, end)),
    ))
}

/// Convert a server error to an LSP response error.
#[must_use]
pub fn response_error(err: &ServerError, code: ErrorCode) -> ResponseError {
    ResponseError::new(code, err.to_string())
}

/// Error returned by requests that arrive before the indexes exist.
#[must_use]
pub fn not_initialised() -> ResponseError {
    response_error(&ServerError::NotInitialised, ErrorCode::INVALID_REQUEST)
}

/// Current text of `path`: the open buffer if there is one, else the file.
pub async fn document_text(context: &WorkspaceContext, path: &Path) -> Option<String> {
    let reader = OverlayReader::new(context.documents.clone());
    match reader.read_to_string(path).await {
        Ok(text) => Some(text),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot read document");
            None
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn url_to_path_handles_file_url() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\test\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/test/path");

        let url = Url::from_file_path(&test_path).expect("valid path");
        assert_eq!(url_to_path(&url), Some(test_path));
    }

    #[test]
    fn url_to_path_returns_none_for_non_file_url() {
        let url = Url::from_str("https://example.com/path").expect("valid URL");
        assert!(url_to_path(&url).is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn line_location_spans_one_line() {
        let location = line_location(Path::new("/w/a.feature"), 3, 10, 29).expect("location");
        assert_eq!(location.uri.path(), "/w/a.feature");
        assert_eq!(location.range.start, Position::new(3, 10));
        assert_eq!(location.range.end, Position::new(3, 29));
    }

    #[test]
    fn relative_paths_have_no_location() {
        assert!(line_location(Path::new("relative.feature"), 0, 0, 0).is_none());
    }
}
