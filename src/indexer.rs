//! Catalog indexing pipeline.
//!
//! Reads every catalog record, renders it, embeds it and replaces the
//! contents of the vector store with one document per record.

use crate::catalog::{render_record, CatalogSource};
use crate::embedding::Embedder;
use crate::error::{Result, SavorError};
use crate::vector_store::{Document, VectorStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Outcome of an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Number of documents written.
    pub count: usize,
}

/// Rebuilds the vector store from the catalog.
pub struct Indexer {
    source: Arc<dyn CatalogSource>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    run_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            source,
            embedder,
            vector_store,
            run_lock: Mutex::new(()),
        }
    }

    /// Replace the store contents with the current catalog.
    ///
    /// An empty catalog leaves the store untouched. The store is cleared
    /// before the first insert, so a failure part way through leaves a
    /// subset of records indexed until the next run.
    #[instrument(skip(self))]
    pub async fn reindex(&self) -> Result<IndexReport> {
        let _guard = self.run_lock.lock().await;

        let records = self.source.fetch_all().await.map_err(|e| match e {
            SavorError::SourceUnavailable(_) => e,
            other => SavorError::SourceUnavailable(other.to_string()),
        })?;

        if records.is_empty() {
            warn!("Catalog is empty, leaving the vector store untouched");
            return Ok(IndexReport { count: 0 });
        }

        info!("Indexing {} catalog records", records.len());

        let removed = self
            .vector_store
            .delete_all()
            .await
            .map_err(|e| SavorError::StoreWrite(e.to_string()))?;
        debug!("Cleared {} stale documents", removed);

        let mut count = 0;
        for record in &records {
            let content = render_record(record);

            let embedding = self.embedder.embed(&content).await.map_err(|e| match e {
                SavorError::Embedding(_) => e,
                other => SavorError::Embedding(other.to_string()),
            })?;

            let doc = Document::new(record.key(), content, embedding);
            self.vector_store
                .insert(&doc)
                .await
                .map_err(|e| SavorError::StoreWrite(e.to_string()))?;

            debug!("Indexed {}", doc.record_key);
            count += 1;
        }

        info!("Indexed {} documents", count);
        Ok(IndexReport { count })
    }
}
