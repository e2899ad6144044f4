//! The response orchestrator of a chat session.
//!
//! The session is the only writer of its transcript and its playback
//! controller. Background work (generation, synthesis, reveal ticks) reports
//! back through an event channel that [`Session::next_update`] drains.

use super::playback::{PlaybackController, PlaybackState, TransportEvent};
use super::reveal::RevealTimer;
use super::sink::{AudioSink, EndedReceiver, EndedSender};
use super::transcript::{AudioState, MessageId, SessionEvent, Transcript};
use super::AnswerService;
use crate::config::ClientSettings;
use crate::error::{Result, SavorError};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Delay between revealed characters.
    pub reveal_interval: Duration,
    /// Play the focused answer as soon as its audio is ready.
    pub autoplay: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reveal_interval: Duration::from_millis(30),
            autoplay: true,
        }
    }
}

impl From<&ClientSettings> for SessionOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            reveal_interval: settings.reveal_interval(),
            autoplay: settings.autoplay,
        }
    }
}

/// Something the UI should redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// A message changed. Read it from [`Session::transcript`].
    Message(MessageId),
    Transport(TransportEvent),
    PlaybackFailed(String),
}

enum Wake {
    Event(SessionEvent),
    Ended(u64),
}

pub struct Session {
    service: Arc<dyn AnswerService>,
    transcript: Transcript,
    playback: PlaybackController,
    reveal: RevealTimer,
    options: SessionOptions,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    ended_rx: EndedReceiver,
    pending: VecDeque<Update>,
}

impl Session {
    /// Create a session. `sink` builds the audio sink from the channel it
    /// must report finished playback on.
    pub fn new<F>(
        service: Arc<dyn AnswerService>,
        greeting: &str,
        apology: &str,
        options: SessionOptions,
        sink: F,
    ) -> Self
    where
        F: FnOnce(EndedSender) -> Box<dyn AudioSink>,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();

        Self {
            service,
            transcript: Transcript::new(greeting, apology),
            playback: PlaybackController::new(sink(ended_tx)),
            reveal: RevealTimer::new(),
            options,
            events_tx,
            events_rx,
            ended_rx,
            pending: VecDeque::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback.state()
    }

    /// Ask a question. Returns the id of the assistant placeholder, or
    /// `None` for a blank query.
    pub fn submit(&mut self, query: &str) -> Option<MessageId> {
        if query.trim().is_empty() {
            return None;
        }

        if let Some(previous) = self.reveal.cancel() {
            self.apply(SessionEvent::RevealSkipped { id: previous });
        }

        self.apply(SessionEvent::QuerySubmitted {
            query: query.to_string(),
        });
        let id = self.transcript.focused()?;

        let service = self.service.clone();
        let events = self.events_tx.clone();
        let query = query.to_string();
        tokio::spawn(async move {
            let event = match collect_answer(service.as_ref(), &query).await {
                Ok(text) => SessionEvent::AnswerCompleted { id, text },
                Err(e) => {
                    warn!("Answer for message {} failed: {}", id, e);
                    SessionEvent::AnswerFailed { id }
                }
            };
            let _ = events.send(event);
        });

        Some(id)
    }

    /// Wait for the next change worth showing.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }

            let wake = tokio::select! {
                Some(event) = self.events_rx.recv() => Wake::Event(event),
                Some(generation) = self.ended_rx.recv() => Wake::Ended(generation),
                else => return None,
            };

            match wake {
                Wake::Event(event) => self.handle(event),
                Wake::Ended(generation) => {
                    if let Some(event) = self.playback.on_ended(generation) {
                        self.pending.push_back(Update::Transport(event));
                    }
                }
            }
        }
    }

    pub fn pause_or_resume(&mut self) -> Result<Option<TransportEvent>> {
        self.playback.pause_or_resume()
    }

    pub fn replay(&mut self) -> Result<Option<TransportEvent>> {
        self.playback.replay()
    }

    /// Play the audio of message `id`.
    pub fn play_message(&mut self, id: MessageId) -> Result<Option<TransportEvent>> {
        let clip = self
            .transcript
            .get(id)
            .and_then(|m| m.audio.clone())
            .ok_or_else(|| SavorError::InvalidInput(format!("Message {} has no audio", id)))?;
        self.playback.play(id, &clip)
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AnswerCompleted { id, text } => {
                let completed = self.apply(SessionEvent::AnswerCompleted {
                    id,
                    text: text.clone(),
                });
                let spoken = self
                    .transcript
                    .get(id)
                    .is_some_and(|m| m.audio_state == AudioState::Loading);
                if !completed || !spoken {
                    return;
                }

                self.spawn_synthesis(id, text.clone());

                if self.transcript.focused() == Some(id) {
                    self.reveal.start(
                        id,
                        text.chars().count(),
                        self.options.reveal_interval,
                        self.events_tx.clone(),
                    );
                } else {
                    debug!("Message {} was superseded, showing it in full", id);
                    self.apply(SessionEvent::RevealSkipped { id });
                }
            }
            SessionEvent::AudioReady { id, clip } => {
                let ready = self.apply(SessionEvent::AudioReady {
                    id,
                    clip: clip.clone(),
                });
                if ready && self.options.autoplay && self.transcript.focused() == Some(id) {
                    match self.playback.play(id, &clip) {
                        Ok(Some(event)) => self.pending.push_back(Update::Transport(event)),
                        Ok(None) => {}
                        Err(e) => self.pending.push_back(Update::PlaybackFailed(e.to_string())),
                    }
                }
            }
            other => {
                self.apply(other);
            }
        }
    }

    fn spawn_synthesis(&self, id: MessageId, text: String) {
        let service = self.service.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match service.synthesize(&text).await {
                Ok(clip) => SessionEvent::AudioReady {
                    id,
                    clip: Arc::new(clip),
                },
                Err(e) => {
                    warn!("Speech for message {} failed: {}", id, e);
                    SessionEvent::AudioFailed { id }
                }
            };
            let _ = events.send(event);
        });
    }

    fn apply(&mut self, event: SessionEvent) -> bool {
        let changed = self.transcript.apply(event);
        let any = !changed.is_empty();
        self.pending.extend(changed.into_iter().map(Update::Message));
        any
    }
}

/// Drain the answer stream into one string.
async fn collect_answer(service: &dyn AnswerService, query: &str) -> Result<String> {
    let mut fragments = service.ask(query).await?;
    let mut answer = String::new();
    while let Some(fragment) = fragments.next().await {
        answer.push_str(&fragment?);
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sink::testing::RecordingSink;
    use crate::client::sink::NullSink;
    use crate::client::transcript::Sender;
    use crate::rag::FragmentStream;
    use crate::speech::AudioClip;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const GREETING: &str = "你好！我是你的 AI 助理";
    const APOLOGY: &str = "抱歉，發生了一點問題...";

    #[derive(Default)]
    struct FakeService {
        fragments: Vec<String>,
        fail_stream: bool,
        fail_speech: bool,
        delays: HashMap<String, Duration>,
        asked: Mutex<Vec<String>>,
        spoken: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn answering(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|f| f.to_string()).collect(),
                ..Self::default()
            }
        }

        fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerService for FakeService {
        async fn ask(&self, query: &str) -> Result<FragmentStream> {
            self.asked.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            let mut items: Vec<Result<String>> =
                self.fragments.iter().cloned().map(Ok).collect();
            if self.fail_stream {
                items.push(Err(SavorError::Provider("rate limited".to_string())));
            }
            Ok(Box::pin(stream::iter(items)))
        }

        async fn synthesize(&self, text: &str) -> Result<AudioClip> {
            self.spoken.lock().unwrap().push(text.to_string());
            if self.fail_speech {
                return Err(SavorError::Provider("tts unavailable".to_string()));
            }
            Ok(AudioClip::new(text.as_bytes().to_vec(), "audio/mpeg"))
        }
    }

    fn recording_session(service: Arc<FakeService>) -> Session {
        Session::new(
            service,
            GREETING,
            APOLOGY,
            SessionOptions::default(),
            |_ended| Box::new(RecordingSink::new().0) as Box<dyn AudioSink>,
        )
    }

    /// Collect updates until nothing happens for a while.
    async fn settle(session: &mut Session) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Ok(Some(update)) =
            tokio::time::timeout(Duration::from_secs(5), session.next_update()).await
        {
            updates.push(update);
        }
        updates
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_is_revealed_and_spoken() {
        let service = Arc::new(FakeService::answering(&["蒜味奶油雞", "是 280 元"]));
        let mut session = recording_session(service.clone());
        let id = session.submit("這道菜多少錢").unwrap();

        let answer = "蒜味奶油雞是 280 元";
        let mut shown = 0;
        let mut updates = Vec::new();
        while let Ok(Some(update)) =
            tokio::time::timeout(Duration::from_secs(5), session.next_update()).await
        {
            if update == Update::Message(id) {
                let text = &session.transcript().get(id).unwrap().text;
                assert!(answer.starts_with(text.as_str()));
                assert!(text.chars().count() >= shown);
                shown = text.chars().count();
            }
            updates.push(update);
        }

        let message = session.transcript().get(id).unwrap();
        assert_eq!(message.text, answer);
        assert_eq!(message.audio_state, AudioState::Ready);
        assert_eq!(service.spoken(), vec![answer.to_string()]);
        assert!(updates.contains(&Update::Transport(TransportEvent::Started(id))));
        assert_eq!(session.playback().active_message, Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_answer_becomes_apology_without_speech() {
        let service = Arc::new(FakeService::answering(&["  ", "\n"]));
        let mut session = recording_session(service.clone());
        let id = session.submit("q").unwrap();
        settle(&mut session).await;

        let message = session.transcript().get(id).unwrap();
        assert_eq!(message.text, APOLOGY);
        assert_eq!(message.audio_state, AudioState::Error);
        assert!(service.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_failure_becomes_apology() {
        let service = Arc::new(FakeService {
            fail_stream: true,
            ..FakeService::answering(&["部分答案"])
        });
        let mut session = recording_session(service.clone());
        let id = session.submit("q").unwrap();
        settle(&mut session).await;

        let message = session.transcript().get(id).unwrap();
        assert_eq!(message.text, APOLOGY);
        assert_eq!(message.audio_state, AudioState::Error);
        assert!(service.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speech_failure_keeps_text() {
        let service = Arc::new(FakeService {
            fail_speech: true,
            ..FakeService::answering(&["280 元"])
        });
        let mut session = recording_session(service);
        let id = session.submit("q").unwrap();
        let updates = settle(&mut session).await;

        let message = session.transcript().get(id).unwrap();
        assert_eq!(message.text, "280 元");
        assert_eq!(message.audio_state, AudioState::Error);
        assert!(!updates.iter().any(|u| matches!(u, Update::Transport(_))));
        assert!(session.playback().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_query_snaps_running_reveal() {
        let long = "這是一段很長的答案，需要一段時間才能完全顯示出來。";
        let service = Arc::new(FakeService::answering(&[long]));
        let mut session = recording_session(service);

        let first = session.submit("一").unwrap();
        while session.transcript().get(first).unwrap().text.is_empty() {
            session.next_update().await.unwrap();
        }
        assert!(!session.transcript().get(first).unwrap().is_fully_revealed());

        let second = session.submit("二").unwrap();
        assert_eq!(session.transcript().get(first).unwrap().text, long);

        settle(&mut session).await;
        assert_eq!(session.transcript().get(first).unwrap().text, long);
        assert_eq!(session.transcript().get(second).unwrap().text, long);
        assert_eq!(session.playback().active_message, Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_for_superseded_message_is_kept() {
        let mut service = FakeService::answering(&["答案"]);
        service
            .delays
            .insert("慢".to_string(), Duration::from_secs(1));
        let service = Arc::new(service);
        let mut session = recording_session(service.clone());

        let slow = session.submit("慢").unwrap();
        let fast = session.submit("快").unwrap();
        settle(&mut session).await;

        let slow_message = session.transcript().get(slow).unwrap();
        assert_eq!(slow_message.text, "答案");
        assert_eq!(slow_message.audio_state, AudioState::Ready);
        assert_eq!(session.transcript().get(fast).unwrap().text, "答案");
        assert_eq!(service.spoken().len(), 2);
        // Audio of the superseded answer does not steal playback.
        assert_eq!(session.playback().active_message, Some(fast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_ends_and_resets() {
        let service = Arc::new(FakeService::answering(&["好"]));
        let mut session = Session::new(
            service,
            GREETING,
            APOLOGY,
            SessionOptions::default(),
            |ended| Box::new(NullSink::new(ended)) as Box<dyn AudioSink>,
        );
        let id = session.submit("q").unwrap();
        let updates = settle(&mut session).await;

        assert!(updates.contains(&Update::Transport(TransportEvent::Started(id))));
        assert!(updates.contains(&Update::Transport(TransportEvent::Ended(Some(id)))));
        assert!(session.playback().is_idle());

        // The clip stays loaded, so it can be replayed.
        assert_eq!(
            session.replay().unwrap(),
            Some(TransportEvent::Started(id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_commands() {
        let service = Arc::new(FakeService::answering(&["好"]));
        let mut session = recording_session(service);
        let greeting = session.transcript().messages()[0].id;
        assert!(matches!(
            session.play_message(greeting),
            Err(SavorError::InvalidInput(_))
        ));

        let id = session.submit("q").unwrap();
        settle(&mut session).await;

        assert_eq!(
            session.pause_or_resume().unwrap(),
            Some(TransportEvent::Paused(id))
        );
        assert_eq!(
            session.play_message(id).unwrap(),
            Some(TransportEvent::Resumed(id))
        );
        assert_eq!(
            session.replay().unwrap(),
            Some(TransportEvent::Started(id))
        );
    }

    #[tokio::test]
    async fn test_blank_query_is_ignored() {
        let mut session = recording_session(Arc::new(FakeService::default()));
        assert_eq!(session.submit("   "), None);
        assert_eq!(session.transcript().messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_is_forwarded_verbatim() {
        let service = Arc::new(FakeService::answering(&["有的"]));
        let mut session = recording_session(service.clone());
        let id = session.submit("  有紅酒嗎？\n").unwrap();
        settle(&mut session).await;

        assert_eq!(service.asked(), vec!["  有紅酒嗎？\n".to_string()]);
        let user = &session.transcript().messages()[1];
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.text, "  有紅酒嗎？\n");
        assert_eq!(session.transcript().get(id).unwrap().text, "有的");
    }
}
