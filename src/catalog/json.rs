//! JSON file catalog source.

use super::{CatalogRecord, CatalogSource};
use crate::error::{Result, SavorError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Catalog source reading a JSON array of tagged records.
///
/// ```json
/// [{"type": "dish", "id": 1, "name": "蒜味奶油雞", "price": 280, "ingredients": []}]
/// ```
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogSource for JsonCatalog {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SavorError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let records: Vec<CatalogRecord> = serde_json::from_str(&content).map_err(|e| {
            SavorError::SourceUnavailable(format!("Invalid catalog JSON: {}", e))
        })?;

        debug!("Read {} catalog records", records.len());
        Ok(records)
    }
}
