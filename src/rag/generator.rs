//! Streaming answer generation.

use super::context::build_prompt;
use super::{failed_stream, FragmentStream};
use crate::config::Prompts;
use crate::error::{Result, SavorError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use tracing::{debug, instrument, warn};

/// Trait for language-model answer generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Stream the answer to `query` grounded on `context`.
    ///
    /// The stream is finite and ends right after the first error item.
    async fn generate(&self, context: &str, query: &str) -> FragmentStream;
}

/// Chat-completions based generator.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    prompts: Prompts,
}

impl OpenAIGenerator {
    pub fn new(client: Client<OpenAIConfig>, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    fn request(&self, context: &str, query: &str) -> Result<CreateChatCompletionRequest> {
        let prompt = build_prompt(&self.prompts, context, query);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system)
                .build()
                .map_err(|e| SavorError::Provider(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user)
                .build()
                .map_err(|e| SavorError::Provider(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .stream(true)
            .build()
            .map_err(|e| SavorError::Provider(e.to_string()))
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, context, query), fields(model = %self.model))]
    async fn generate(&self, context: &str, query: &str) -> FragmentStream {
        let request = match self.request(context, query) {
            Ok(request) => request,
            Err(e) => return failed_stream(e),
        };

        let upstream = match self.client.chat().create_stream(request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!("Failed to open completion stream: {}", e);
                return failed_stream(SavorError::Provider(format!(
                    "Failed to generate response: {}",
                    e
                )));
            }
        };

        debug!("Completion stream opened");

        let fragments = upstream.filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => Some(Err(SavorError::Provider(format!("Stream error: {}", e)))),
            }
        });

        Box::pin(stop_after_error(fragments))
    }
}

/// Pass items through until, and including, the first error.
pub(crate) fn stop_after_error<S>(inner: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<String>> + Send,
{
    inner.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        *failed = item.is_err();
        future::ready(Some(item))
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_stream_ends_after_first_error() {
        let items = vec![
            Ok("a".to_string()),
            Err(SavorError::Provider("boom".to_string())),
            Ok("b".to_string()),
            Err(SavorError::Provider("again".to_string())),
        ];
        let out: Vec<Result<String>> = stop_after_error(stream::iter(items)).collect().await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "a");
        assert!(matches!(out[1], Err(SavorError::Provider(_))));
    }

    #[test]
    fn test_request_is_streaming() {
        let generator = OpenAIGenerator::new(
            Client::with_config(OpenAIConfig::default()),
            "gpt-4o-mini",
            0.2,
        );
        let request = generator.request("context", "question").unwrap();

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.messages.len(), 2);
    }
}
