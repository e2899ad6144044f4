//! Vector store abstraction for Savor.
//!
//! Provides a trait-based interface for different vector database backends.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// Key of the catalog record this document was rendered from.
    pub record_key: String,
    /// Canonical rendering of the record.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document.
    pub fn new(record_key: String, content: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_key,
            content,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Input of a similarity search.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub query_embedding: Vec<f32>,
    /// Results below this similarity are excluded by the store.
    pub match_threshold: f32,
    /// Maximum number of results.
    pub match_count: usize,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a document with its embedding.
    async fn insert(&self, doc: &Document) -> Result<()>;

    /// Remove every document. Returns how many were removed.
    async fn delete_all(&self) -> Result<usize>;

    /// Documents with similarity >= threshold, most similar first,
    /// at most `match_count` of them.
    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>>;

    /// All stored documents, in insertion order.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter, sort and truncate candidate documents.
pub(crate) fn rank<I>(docs: I, query: &SimilarityQuery) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Document>,
{
    let mut results: Vec<SearchResult> = docs
        .into_iter()
        .map(|doc| {
            let score = cosine_similarity(&query.query_embedding, &doc.embedding);
            SearchResult {
                document: doc,
                score,
            }
        })
        .filter(|r| r.score >= query.match_threshold)
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(query.match_count);
    results
}
