//! RAG (Retrieval-Augmented Generation) for catalog questions.
//!
//! A query is embedded, matched against the indexed catalog and answered by a
//! language model as a stream of text fragments.

pub mod context;
mod engine;
pub mod generator;

pub use context::{build_prompt, format_context, PromptMessages, Retriever};
pub use engine::RagEngine;
pub use generator::{Generator, OpenAIGenerator};

use crate::error::{Result, SavorError};
use futures::Stream;
use std::pin::Pin;

/// A finite stream of answer fragments. Concatenating the `Ok` items in order
/// reconstructs the answer; an `Err` item is always the last one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A stream holding a single error.
pub(crate) fn failed_stream(err: SavorError) -> FragmentStream {
    let item: Result<String> = Err(err);
    Box::pin(futures::stream::once(futures::future::ready(item)))
}
