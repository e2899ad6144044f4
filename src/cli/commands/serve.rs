//! Serve command implementation.

use crate::app::App;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server::{self, AppState};
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let api_tokens = settings.server.api_tokens.clone();

    let app = App::new(settings)?;
    let state = Arc::new(AppState {
        engine: Arc::new(app.engine()),
        indexer: Arc::new(app.indexer()),
        speech: app.speech(),
        api_tokens,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Savor API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Query", "POST /query");
    Output::kv("Speech", "POST /speech");
    if state.api_tokens.is_empty() {
        Output::warning("No API tokens configured, authentication is disabled.");
    }
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(listener, state).await?;

    Ok(())
}
