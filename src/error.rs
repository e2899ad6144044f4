//! Error types for Savor.

use thiserror::Error;

/// Library-level error type for Savor operations.
#[derive(Error, Debug)]
pub enum SavorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Similarity search failed: {0}")]
    Search(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Vector store write failed: {0}")]
    StoreWrite(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Audio playback error: {0}")]
    Playback(String),
}

/// Result type alias for Savor operations.
pub type Result<T> = std::result::Result<T, SavorError>;
