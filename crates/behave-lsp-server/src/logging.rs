//! Structured logging to stderr.
//!
//! stdout carries JSON-RPC traffic, so every log line goes to stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::ServerConfig;

fn filter_from_config(config: &ServerConfig) -> EnvFilter {
    EnvFilter::new(config.log_level.as_filter_str())
}

/// Install the global tracing subscriber.
///
/// Log level precedence (highest to lowest):
///
/// 1. CLI `--log-level`
/// 2. `BEHAVE_LSP_LOG_LEVEL`
/// 3. The default, `info`
///
/// Calling this again after a subscriber has been installed does nothing;
/// the first subscriber wins.
pub fn init_logging(config: &ServerConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::trace!("global subscriber already installed");
    }
}
