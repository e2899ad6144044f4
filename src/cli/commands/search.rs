//! Search command implementation.

use crate::app::App;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let app = App::new(settings.clone())?;
    let retriever = app
        .retriever()
        .with_match_count(limit.unwrap_or(settings.rag.match_count))
        .with_match_threshold(min_score.unwrap_or(settings.rag.match_threshold));

    let spinner = Output::spinner("Searching...");
    let results = retriever.retrieve(query).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", chunks.len()));
                for chunk in &chunks {
                    Output::search_result(&chunk.document.record_key, chunk.score, &chunk.document.content);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
