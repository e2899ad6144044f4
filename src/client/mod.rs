//! Chat client: transcript, reveal animation and speech playback.
//!
//! A [`Session`] asks an [`AnswerService`] for an answer, waits for the whole
//! answer, then reveals it character by character while its speech is
//! synthesized in the background.

mod http;
mod local;
mod playback;
mod reveal;
mod session;
mod sink;
mod transcript;
mod utf8;

pub use http::HttpAnswerService;
pub use local::LocalAnswerService;
pub use playback::{PlaybackController, PlaybackState, TransportEvent};
pub use reveal::RevealTimer;
pub use session::{Session, SessionOptions, Update};
pub use sink::{AudioSink, CommandSink, EndedReceiver, EndedSender, NullSink};
pub use transcript::{AudioState, Message, MessageId, Sender, SessionEvent, Transcript};
pub use utf8::Utf8Decoder;

use crate::error::Result;
use crate::rag::FragmentStream;
use crate::speech::AudioClip;
use async_trait::async_trait;

/// Where a session gets answers and speech from.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Stream the answer to `query`.
    async fn ask(&self, query: &str) -> Result<FragmentStream>;

    /// Synthesize speech for a finished answer.
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}
