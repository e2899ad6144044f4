//! Embedding generation for indexing and retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// The indexer and the retriever must share one implementation (same model,
/// same dimensions) or stored vectors and query vectors are not comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Embedder;
    use crate::error::{Result, SavorError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic bag-of-characters embedder.
    ///
    /// Texts sharing characters get positive cosine similarity, which is
    /// enough to exercise ranking without a provider.
    pub struct CharEmbedder {
        dimensions: usize,
        calls: AtomicUsize,
        fail_after: Option<usize>,
    }

    impl CharEmbedder {
        pub fn new() -> Self {
            Self {
                dimensions: 64,
                calls: AtomicUsize::new(0),
                fail_after: None,
            }
        }

        /// Fail every call after the first `n` successful ones.
        pub fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Self::new()
            }
        }

        pub fn vector(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0; self.dimensions];
            for c in text.chars().filter(|c| !c.is_whitespace()) {
                v[(c as usize) % self.dimensions] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for CharEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|n| call >= n) {
                return Err(SavorError::Embedding("provider unavailable".to_string()));
            }
            Ok(self.vector(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }
}
