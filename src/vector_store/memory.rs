//! In-memory vector store implementation.
//!
//! Useful for testing and small catalogs.

use super::{rank, Document, SearchResult, SimilarityQuery, VectorStore};
use crate::error::{Result, SavorError};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents
            .read()
            .map_err(|e| SavorError::VectorStore(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents
            .write()
            .map_err(|e| SavorError::VectorStore(format!("Lock poisoned: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        let mut docs = self.write()?;
        docs.retain(|d| d.id != doc.id);
        docs.push(doc.clone());
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut docs = self.write()?;
        let removed = docs.len();
        docs.clear();
        Ok(removed)
    }

    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>> {
        let docs = self.read()?;
        Ok(rank(docs.iter().cloned(), query))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.read()?.clone())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
