//! Answer service backed by a running `savor serve` instance.

use super::utf8::Utf8Decoder;
use super::AnswerService;
use crate::error::{Result, SavorError};
use crate::rag::FragmentStream;
use crate::speech::AudioClip;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the query and speech endpoints.
pub struct HttpAnswerService {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpAnswerService {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| SavorError::Config(format!("Invalid server URL {}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        // The timeout bounds connecting and reading each chunk, not the whole
        // streamed answer.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| SavorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SavorError::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<Response> {
        let mut request = self.client.post(self.endpoint(path)?).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SavorError::Unauthorized(message),
            StatusCode::BAD_REQUEST => SavorError::InvalidInput(message),
            _ => SavorError::Provider(format!("Server returned {}: {}", status, message)),
        })
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    #[instrument(skip(self))]
    async fn ask(&self, query: &str) -> Result<FragmentStream> {
        let response = self
            .post("query", serde_json::json!({ "query": query }))
            .await?;
        debug!("Answer stream opened");

        let body = Box::pin(response.bytes_stream());
        let fragments = stream::unfold(Some((body, Utf8Decoder::new())), |state| async move {
            let Some((mut body, mut decoder)) = state else {
                return None;
            };
            loop {
                match body.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.push(&chunk);
                        if !text.is_empty() {
                            return Some((Ok(text), Some((body, decoder))));
                        }
                    }
                    Some(Err(e)) => {
                        let err = SavorError::Provider(format!("Answer stream interrupted: {}", e));
                        return Some((Err(err), None));
                    }
                    None => {
                        let rest = decoder.finish();
                        return (!rest.is_empty()).then_some((Ok(rest), None));
                    }
                }
            }
        });

        Ok(Box::pin(fragments))
    }

    #[instrument(skip(self, text))]
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let response = self
            .post("speech", serde_json::json!({ "text": text }))
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("audio/") {
            warn!("Speech response has content type {:?}, expected audio/*", content_type);
        }

        let bytes = response.bytes().await?;
        Ok(AudioClip::new(bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let service =
            HttpAnswerService::new("http://localhost:3000/api", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            service.endpoint("query").unwrap().as_str(),
            "http://localhost:3000/api/query"
        );

        let service =
            HttpAnswerService::new("http://localhost:3000", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            service.endpoint("speech").unwrap().as_str(),
            "http://localhost:3000/speech"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = HttpAnswerService::new("not a url", None, Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, SavorError::Config(_)));
    }
}
