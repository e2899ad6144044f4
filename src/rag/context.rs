//! Retrieval and prompt assembly.

use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::{Result, SavorError};
use crate::vector_store::{SearchResult, SimilarityQuery, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Separator placed between context chunks.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Embeds a query and fetches the most similar stored documents.
pub struct Retriever {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    match_threshold: f32,
    match_count: usize,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            match_threshold: 0.3,
            match_count: 5,
        }
    }

    /// Set the minimum similarity a document needs to be returned.
    pub fn with_match_threshold(mut self, match_threshold: f32) -> Self {
        self.match_threshold = match_threshold;
        self
    }

    /// Set the maximum number of returned documents.
    pub fn with_match_count(mut self, match_count: usize) -> Self {
        self.match_count = match_count;
        self
    }

    /// Ranked chunks for `query`, most similar first.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(query).await.map_err(|e| match e {
            SavorError::Embedding(_) => e,
            other => SavorError::Embedding(other.to_string()),
        })?;

        let results = self
            .vector_store
            .search(&SimilarityQuery {
                query_embedding,
                match_threshold: self.match_threshold,
                match_count: self.match_count,
            })
            .await
            .map_err(|e| SavorError::Search(e.to_string()))?;

        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }
}

/// Join chunk contents in retrieval order, or the no-context marker.
pub fn format_context(chunks: &[SearchResult], no_context: &str) -> String {
    if chunks.is_empty() {
        return no_context.to_string();
    }

    chunks
        .iter()
        .map(|chunk| chunk.document.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// The two messages sent to the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessages {
    pub system: String,
    pub user: String,
}

/// Fill the prompt templates with the context and the verbatim query.
pub fn build_prompt(prompts: &Prompts, context: &str, query: &str) -> PromptMessages {
    let mut vars = HashMap::new();
    vars.insert("context".to_string(), context.to_string());
    vars.insert("question".to_string(), query.to_string());

    PromptMessages {
        system: prompts.system_prompt(),
        user: prompts.render_with_custom(&prompts.rag.user, &vars),
    }
}
