//! In-process answer service.

use super::AnswerService;
use crate::error::Result;
use crate::rag::{FragmentStream, RagEngine};
use crate::speech::{AudioClip, SpeechSynthesizer};
use async_trait::async_trait;
use std::sync::Arc;

/// Answers through a local [`RagEngine`] and speech provider, without a server.
pub struct LocalAnswerService {
    engine: Arc<RagEngine>,
    speech: Arc<dyn SpeechSynthesizer>,
}

impl LocalAnswerService {
    pub fn new(engine: Arc<RagEngine>, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { engine, speech }
    }
}

#[async_trait]
impl AnswerService for LocalAnswerService {
    async fn ask(&self, query: &str) -> Result<FragmentStream> {
        self.engine.answer(query).await
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        self.speech.synthesize(text).await
    }
}
