//! OpenAI client configuration with sensible defaults.

use crate::error::{Result, SavorError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Create an OpenAI client with a custom timeout.
///
/// Every provider call (embeddings, streamed completions, speech) goes through
/// a client built here, so a hung upstream never blocks a request forever.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SavorError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}
