//! Language Server Protocol implementation for behave projects.
//!
//! This crate links Gherkin feature files to the Python step definitions
//! that implement them. Two incremental indexes, one over step modules and
//! one over feature files, are kept current from editor buffers and the
//! filesystem, and a query layer answers navigation, diagnostics, and
//! completion from them.
//!
//! # Overview
//!
//! The server communicates via JSON-RPC over stdin/stdout and supports:
//!
//! - Go to definition from a feature step to its `@given`/`@when`/`@then`
//!   decorators
//! - Find references from a decorator to every feature step it matches
//! - Warnings for steps with no matching definition
//! - Step completion with snippet placeholders
//!
//! # Configuration
//!
//! The server can be configured via environment variables:
//!
//! - `BEHAVE_LSP_LOG_LEVEL`: Log verbosity (trace, debug, info, warn,
//!   error)
//! - `BEHAVE_LSP_SCAN_BATCH_SIZE`: Files read concurrently during a full
//!   scan
//! - `BEHAVE_LSP_MAX_RESCAN_DEPTH`: Queued re-scans honoured per file
//!
//! Which files are indexed is controlled by the client through the
//! `behave.stepsGlob`, `behave.featuresGlob`, and `behave.exclude` settings.
//!
//! # Example
//!
//! ```ignore
//! use behave_lsp_server::config::ServerConfig;
//! use behave_lsp_server::server::ServerState;
//!
//! let config = ServerConfig::from_env()?;
//! let state = ServerState::new(config);
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod indexing;
pub mod logging;
pub mod queries;
pub mod server;
pub mod settings;
pub mod util;
pub mod workspace;

/// Test support utilities for unit and integration tests.
///
/// This module is hidden from documentation as it's intended for internal
/// test use only.
#[doc(hidden)]
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
