//! Text-to-speech synthesis.

mod openai;

pub use openai::OpenAISpeech;

use crate::error::Result;
use async_trait::async_trait;

/// Synthesized audio as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// MIME type of `bytes` (e.g. `audio/mpeg`).
    pub content_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// File extension matching the content type, used for temp files.
    pub fn extension(&self) -> &'static str {
        match self.content_type.split(';').next().unwrap_or("").trim() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" | "audio/opus" => "opus",
            "audio/aac" => "aac",
            "audio/flac" => "flac",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/pcm" | "audio/L16" => "pcm",
            _ => "bin",
        }
    }
}

/// Trait for speech synthesis providers.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into a playable clip.
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}
