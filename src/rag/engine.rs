//! Query pipeline: retrieve, assemble context, stream the answer.

use super::context::{format_context, Retriever};
use super::generator::Generator;
use super::FragmentStream;
use crate::error::Result;
use crate::vector_store::SearchResult;
use std::sync::Arc;
use tracing::{info, instrument};

/// RAG engine for question answering.
pub struct RagEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    no_context: String,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, no_context: &str) -> Self {
        Self {
            retriever,
            generator,
            no_context: no_context.to_string(),
        }
    }

    /// Ranked chunks for `query` without generating an answer.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(query).await
    }

    /// Stream a grounded answer to `query`.
    ///
    /// Embedding and search failures are returned before any fragment is
    /// produced. Provider failures arrive as the last item of the stream.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn answer(&self, query: &str) -> Result<FragmentStream> {
        let chunks = self.retriever.retrieve(query).await?;
        info!("Answering with {} context chunks", chunks.len());

        let context = format_context(&chunks, &self.no_context);
        Ok(self.generator.generate(&context, query).await)
    }
}
