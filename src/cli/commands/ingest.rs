//! Ingest command implementation.

use crate::app::App;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let app = App::new(settings)?;
    let indexer = app.indexer();

    let spinner = Output::spinner("Indexing catalog...");
    let result = indexer.reindex().await;
    spinner.finish_and_clear();

    match result {
        Ok(report) if report.count == 0 => {
            Output::warning("The catalog has no records, the knowledge base was left unchanged.");
        }
        Ok(report) => {
            Output::success(&format!("Indexed {} catalog records", report.count));
        }
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
