//! Pre-flight checks before provider-backed operations.
//!
//! Fails fast with a readable message instead of an opaque provider error
//! halfway through a run.

use crate::config::{CatalogProvider, Settings};
use crate::error::{Result, SavorError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Indexing reads the catalog and calls the embedding provider.
    Ingest,
    /// Searching embeds the query.
    Search,
    /// Answering embeds, generates and synthesizes speech.
    Ask,
    /// Chatting against a remote server needs nothing locally.
    RemoteChat,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_api_key(std::env::var("OPENAI_API_KEY").ok())?;
            check_catalog(settings)?;
        }
        Operation::Search | Operation::Ask => {
            check_api_key(std::env::var("OPENAI_API_KEY").ok())?;
        }
        Operation::RemoteChat => {}
    }
    Ok(())
}

fn check_api_key(key: Option<String>) -> Result<()> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(SavorError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(SavorError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

fn check_catalog(settings: &Settings) -> Result<()> {
    let path = match settings.catalog.provider {
        CatalogProvider::Sqlite => settings.catalog_sqlite_path(),
        CatalogProvider::Json => settings.catalog_json_path(),
    };
    if path.exists() {
        Ok(())
    } else {
        Err(SavorError::SourceUnavailable(format!(
            "Catalog not found at {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_chat_has_no_requirements() {
        assert!(check(Operation::RemoteChat, &Settings::default()).is_ok());
    }

    #[test]
    fn test_api_key_must_be_non_blank() {
        assert!(check_api_key(Some("sk-test".to_string())).is_ok());
        assert!(matches!(
            check_api_key(Some("  ".to_string())),
            Err(SavorError::Config(_))
        ));
        assert!(matches!(check_api_key(None), Err(SavorError::Config(_))));
    }

    #[test]
    fn test_missing_catalog_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.catalog.provider = CatalogProvider::Json;
        settings.catalog.json_path = dir.path().join("menu.json").display().to_string();

        assert!(matches!(
            check_catalog(&settings),
            Err(SavorError::SourceUnavailable(_))
        ));

        std::fs::write(dir.path().join("menu.json"), "[]").unwrap();
        assert!(check_catalog(&settings).is_ok());
    }
}
