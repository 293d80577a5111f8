//! Language server binary for behave projects.
//!
//! This binary links Gherkin feature files to the Python step definitions
//! that implement them. It communicates via JSON-RPC over stdin/stdout.

use std::ops::ControlFlow;

use async_lsp::concurrency::ConcurrencyLayer;
use async_lsp::panic::CatchUnwindLayer;
use async_lsp::router::Router;
use async_lsp::server::LifecycleLayer;
use async_lsp::tracing::TracingLayer;
use clap::Parser;
use lsp_types::{notification, request};
use tower::ServiceBuilder;
use tracing::info;

use behave_lsp_server::config::{LogLevel, ServerConfig};
use behave_lsp_server::error::ServerError;
use behave_lsp_server::handlers::{
    handle_completion, handle_definition, handle_did_change_configuration,
    handle_did_change_text_document, handle_did_close_text_document,
    handle_did_open_text_document, handle_did_save_text_document, handle_file_changed,
    handle_initialise, handle_initialised, handle_references, handle_settings_changed,
    handle_shutdown,
};
use behave_lsp_server::logging::init_logging;
use behave_lsp_server::server::{FileChanged, ServerState, SettingsChanged};

/// Language server linking behave feature files to Python step definitions.
#[derive(Parser, Debug)]
#[command(name = "behave-lsp", version, about)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Number of files read concurrently during a full workspace scan.
    #[arg(long)]
    scan_batch_size: Option<usize>,
}

fn main() {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            let fallback = ServerConfig::default();
            init_logging(&fallback);
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "starting behave-lsp");

    let result = run_server(config);
    if let Err(e) = result {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}

/// Run the language server.
fn run_server(config: ServerConfig) -> std::io::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run_server_async(config))
}

fn build_config(args: &Args) -> Result<ServerConfig, ServerError> {
    let config = ServerConfig::from_env()?;
    Ok(config.apply_overrides(args.log_level, args.scan_batch_size))
}

/// Asynchronously run the language server main loop.
async fn run_server_async(config: ServerConfig) -> std::io::Result<()> {
    let (server, _client) = async_lsp::MainLoop::new_server(|client| {
        let mut state = ServerState::new(config.clone());
        state.set_client(client);

        let mut router = Router::new(state);
        router
            .request::<request::Initialize, _>(|st, params| {
                let result = handle_initialise(st, params);
                std::future::ready(result)
            })
            .request::<request::Shutdown, _>(|st, _params| {
                let result = handle_shutdown(st);
                std::future::ready(result)
            })
            .request::<request::GotoDefinition, _>(|st, params| {
                handle_definition(st.context(), params)
            })
            .request::<request::References, _>(|st, params| {
                handle_references(st.context(), params)
            })
            .request::<request::Completion, _>(|st, params| {
                handle_completion(st.context(), params)
            })
            .notification::<notification::Initialized>(|st, params| {
                handle_initialised(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::Exit>(|_, ()| ControlFlow::Break(Ok(())))
            .notification::<notification::DidOpenTextDocument>(|st, params| {
                handle_did_open_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidChangeTextDocument>(|st, params| {
                handle_did_change_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidSaveTextDocument>(|st, params| {
                handle_did_save_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidCloseTextDocument>(|st, params| {
                handle_did_close_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidChangeConfiguration>(|st, params| {
                handle_did_change_configuration(st, params);
                ControlFlow::Continue(())
            })
            .event::<FileChanged>(|st, event| {
                handle_file_changed(st, event);
                ControlFlow::Continue(())
            })
            .event::<SettingsChanged>(|st, event| {
                handle_settings_changed(st, event);
                ControlFlow::Continue(())
            });

        ServiceBuilder::new()
            .layer(TracingLayer::default())
            .layer(LifecycleLayer::default())
            .layer(CatchUnwindLayer::default())
            .layer(ConcurrencyLayer::default())
            .service(router)
    });

    // Use platform-appropriate stdio with tokio integration
    #[cfg(unix)]
    let (stdin, stdout) = (
        async_lsp::stdio::PipeStdin::lock_tokio()?,
        async_lsp::stdio::PipeStdout::lock_tokio()?,
    );
    #[cfg(not(unix))]
    let (stdin, stdout) = {
        use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
        (
            tokio::io::stdin().compat(),
            tokio::io::stdout().compat_write(),
        )
    };

    server
        .run_buffered(stdin, stdout)
        .await
        .map_err(std::io::Error::other)?;

    info!("server exited");
    Ok(())
}
