//! OpenAI speech endpoint implementation.

use super::{AudioClip, SpeechSynthesizer};
use crate::config::SpeechSettings;
use crate::error::{Result, SavorError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    CreateSpeechRequest, CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based speech synthesizer.
pub struct OpenAISpeech {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
    format: SpeechResponseFormat,
    content_type: &'static str,
}

impl OpenAISpeech {
    pub fn new(client: Client<OpenAIConfig>, settings: &SpeechSettings) -> Result<Self> {
        let (format, content_type) = parse_format(&settings.format)?;
        Ok(Self {
            client,
            model: parse_model(&settings.model),
            voice: parse_voice(&settings.voice)?,
            format,
            content_type,
        })
    }

    fn request(&self, text: &str) -> Result<CreateSpeechRequest> {
        CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.model.clone())
            .voice(self.voice.clone())
            .response_format(self.format.clone())
            .build()
            .map_err(|e| SavorError::Provider(format!("Failed to build speech request: {}", e)))
    }
}

fn parse_model(model: &str) -> SpeechModel {
    match model {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

fn parse_voice(voice: &str) -> Result<Voice> {
    match voice.to_lowercase().as_str() {
        "alloy" => Ok(Voice::Alloy),
        "echo" => Ok(Voice::Echo),
        "fable" => Ok(Voice::Fable),
        "onyx" => Ok(Voice::Onyx),
        "nova" => Ok(Voice::Nova),
        "shimmer" => Ok(Voice::Shimmer),
        other => Err(SavorError::Config(format!("Unknown speech voice: {}", other))),
    }
}

fn parse_format(format: &str) -> Result<(SpeechResponseFormat, &'static str)> {
    match format.to_lowercase().as_str() {
        "mp3" => Ok((SpeechResponseFormat::Mp3, "audio/mpeg")),
        "opus" => Ok((SpeechResponseFormat::Opus, "audio/ogg")),
        "aac" => Ok((SpeechResponseFormat::Aac, "audio/aac")),
        "flac" => Ok((SpeechResponseFormat::Flac, "audio/flac")),
        "wav" => Ok((SpeechResponseFormat::Wav, "audio/wav")),
        "pcm" => Ok((SpeechResponseFormat::Pcm, "audio/pcm")),
        other => Err(SavorError::Config(format!("Unknown speech format: {}", other))),
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeech {
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        if text.trim().is_empty() {
            return Err(SavorError::InvalidInput(
                "No text provided for speech synthesis.".to_string(),
            ));
        }

        let response = self
            .client
            .audio()
            .speech(self.request(text)?)
            .await
            .map_err(|e| SavorError::Provider(format!("Speech API error: {}", e)))?;

        debug!("Synthesized {} bytes of audio", response.bytes.len());
        Ok(AudioClip::new(response.bytes.to_vec(), self.content_type))
    }
}
