//! Savor - catalog-grounded answers about dishes and wines
//!
//! Savor indexes a restaurant catalog into a vector store and answers
//! questions about it with a language model, grounded in the stored
//! descriptions. Answers stream back as text fragments; a chat client reveals
//! them character by character while their speech is synthesized.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `catalog` - Catalog records and the sources they are read from
//! - `embedding` - Embedding generation
//! - `vector_store` - Embedded documents and similarity search
//! - `indexer` - Rebuilds the knowledge base from the catalog
//! - `rag` - Retrieval, prompting and streamed generation
//! - `speech` - Text-to-speech synthesis
//! - `server` - HTTP API
//! - `client` - Chat session: transcript, reveal and playback
//! - `app` - Wiring of the components above from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use savor::app::App;
//! use savor::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::new(Settings::load()?)?;
//!     app.indexer().reindex().await?;
//!
//!     let mut answer = app.engine().answer("有什麼推薦的紅酒？").await?;
//!     while let Some(fragment) = answer.next().await {
//!         print!("{}", fragment?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod openai;
pub mod rag;
pub mod server;
pub mod speech;
pub mod vector_store;

pub use error::{Result, SavorError};
