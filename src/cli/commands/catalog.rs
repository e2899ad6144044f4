//! Catalog listing command.

use crate::app::App;
use crate::catalog::CatalogRecord;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;

pub async fn run_catalog(settings: Settings) -> Result<()> {
    let app = App::new(settings)?;
    let records = app.catalog().fetch_all().await?;

    if records.is_empty() {
        Output::warning("The catalog is empty.");
        return Ok(());
    }

    Output::header(&format!("Catalog ({} records)", records.len()));
    for record in &records {
        Output::list_item(&describe(record));
    }

    Ok(())
}

fn describe(record: &CatalogRecord) -> String {
    let stock = if record.in_stock() {
        style("供應中").green()
    } else {
        style("暫時售完").red()
    };
    format!(
        "{} {} ({}, {} 元, {})",
        style(record.name()).bold(),
        style(record.key()).dim(),
        record.kind(),
        record.price(),
        stock
    )
}
