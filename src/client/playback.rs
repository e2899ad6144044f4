//! The shared audio playback resource.

use super::sink::AudioSink;
use super::transcript::MessageId;
use crate::error::Result;
use crate::speech::AudioClip;
use tracing::debug;

/// Transport state of the playback resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub active_message: Option<MessageId>,
    pub is_playing: bool,
    pub is_paused: bool,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Started(MessageId),
    Paused(MessageId),
    Resumed(MessageId),
    /// Playback reached the end. Carries the message that was active.
    Ended(Option<MessageId>),
}

/// Owns the single audio sink of a session. Every transport action goes
/// through here.
pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    loaded: Option<MessageId>,
    generation: Option<u64>,
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            loaded: None,
            generation: None,
            state: PlaybackState::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Play the clip of message `id`.
    ///
    /// Switches the source unless `id` is both active and loaded. Playing the
    /// active message while paused resumes it.
    pub fn play(&mut self, id: MessageId, clip: &AudioClip) -> Result<Option<TransportEvent>> {
        let same_source = self.state.active_message == Some(id)
            && self.loaded == Some(id)
            && self.sink.is_loaded();

        if same_source {
            if self.state.is_paused {
                return self.pause_or_resume();
            }
            if self.state.is_playing {
                return Ok(None);
            }
        } else {
            debug!("Switching audio source to message {}", id);
            self.sink.load(clip)?;
            self.loaded = Some(id);
        }

        self.start(id).map(Some)
    }

    /// Toggle between playing and paused.
    pub fn pause_or_resume(&mut self) -> Result<Option<TransportEvent>> {
        let Some(id) = self.state.active_message else {
            return Ok(None);
        };

        if self.state.is_playing {
            self.sink.pause()?;
            self.state.is_playing = false;
            self.state.is_paused = true;
            Ok(Some(TransportEvent::Paused(id)))
        } else if self.state.is_paused {
            self.sink.resume()?;
            self.state.is_playing = true;
            self.state.is_paused = false;
            Ok(Some(TransportEvent::Resumed(id)))
        } else {
            Ok(None)
        }
    }

    /// Play the loaded source again from the beginning. No-op when nothing
    /// is loaded.
    pub fn replay(&mut self) -> Result<Option<TransportEvent>> {
        match self.loaded {
            Some(id) if self.sink.is_loaded() => self.start(id).map(Some),
            _ => Ok(None),
        }
    }

    /// Handle the sink reaching the end of generation `generation`.
    ///
    /// Ends of superseded generations are ignored.
    pub fn on_ended(&mut self, generation: u64) -> Option<TransportEvent> {
        if self.generation != Some(generation) {
            return None;
        }
        let previous = self.state.active_message;
        self.generation = None;
        self.state = PlaybackState::default();
        Some(TransportEvent::Ended(previous))
    }

    fn start(&mut self, id: MessageId) -> Result<TransportEvent> {
        let generation = self.sink.start()?;
        self.generation = Some(generation);
        self.state = PlaybackState {
            active_message: Some(id),
            is_playing: true,
            is_paused: false,
        };
        Ok(TransportEvent::Started(id))
    }
}
