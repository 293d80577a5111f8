//! Semantic error types for the language server.
//!
//! Errors are grouped by concern. [`ServerError`] covers the protocol
//! boundary; [`ScanError`] covers filesystem access while indexing and is
//! always recovered locally by the index that raised it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during language server operations.
///
/// Each variant provides specific context about the failure, enabling
/// appropriate error handling and user-facing messages.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Server received a request before initialisation completed.
    #[error("server not initialised")]
    NotInitialised,

    /// Server received a duplicate initialisation request.
    #[error("server already initialised")]
    AlreadyInitialised,

    /// An invalid configuration value was provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A query needed a document location that the client did not supply or
    /// that does not name a usable position.
    #[error("missing location: {0}")]
    MissingLocation(String),

    /// The workspace file watcher could not be started.
    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or enumerating indexed files.
///
/// Scans never propagate these: the affected file is dropped from its index
/// and the error is logged.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A file vanished, became unreadable, or did not decode as UTF-8.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed while resolving a glob set.
    #[error("failed to walk {}: {message}", .root.display())]
    Walk {
        /// Root of the traversal.
        root: PathBuf,
        /// Description of the failure.
        message: String,
    },
}
