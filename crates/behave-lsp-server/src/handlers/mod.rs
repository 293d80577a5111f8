//! LSP request and notification handlers.
//!
//! Lifecycle handlers build the workspace indexes; document and workspace
//! notifications keep them current; navigation and completion requests are
//! answered from the query layer.

mod completion;
mod definition;
mod diagnostics;
mod lifecycle;
mod references;
mod text_document;
mod util;
mod workspace;

pub use completion::handle_completion;
pub use definition::handle_definition;
pub use diagnostics::{
    DIAGNOSTIC_SOURCE, clear_diagnostics, publish_document_diagnostics, refresh_open_diagnostics,
    to_lsp_diagnostic,
};
pub use lifecycle::{SERVER_NAME, handle_initialise, handle_initialised, handle_shutdown};
pub use references::handle_references;
pub use text_document::{
    handle_did_change_text_document, handle_did_close_text_document,
    handle_did_open_text_document, handle_did_save_text_document, sync_document,
};
pub use workspace::{
    handle_did_change_configuration, handle_file_changed, handle_settings_changed,
};
