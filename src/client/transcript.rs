//! Chat transcript and its state transitions.
//!
//! Every change to the transcript goes through [`Transcript::apply`], a pure
//! transition over [`SessionEvent`]s. Events addressed to a message only ever
//! touch that message.

use crate::speech::AudioClip;
use std::fmt;
use std::sync::Arc;

/// Identifier of a transcript message. Assigned in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// Speech state of a message: `None -> Loading -> Ready | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    None,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    /// Text currently shown. For assistant answers this is a prefix of the
    /// final answer while the reveal is running.
    pub text: String,
    pub audio_state: AudioState,
    pub audio: Option<Arc<AudioClip>>,
    answer: Option<String>,
    revealed: usize,
}

impl Message {
    fn new(id: MessageId, sender: Sender, text: String, audio_state: AudioState) -> Self {
        let revealed = text.chars().count();
        Self {
            id,
            sender,
            answer: None,
            text,
            audio_state,
            audio: None,
            revealed,
        }
    }

    /// The complete answer, once generation has finished.
    pub fn final_text(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// True while generation for this message has not finished.
    pub fn is_pending(&self) -> bool {
        self.sender == Sender::Assistant && self.answer.is_none()
    }

    /// True once the shown text equals the final answer.
    pub fn is_fully_revealed(&self) -> bool {
        match &self.answer {
            Some(answer) => self.text.len() == answer.len(),
            None => false,
        }
    }
}

/// Inputs to the transcript state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A user question plus its empty assistant placeholder.
    QuerySubmitted { query: String },
    /// Generation finished with the concatenated fragments.
    AnswerCompleted { id: MessageId, text: String },
    /// Generation could not produce an answer.
    AnswerFailed { id: MessageId },
    /// Show the first `chars` characters of the final answer.
    RevealStep { id: MessageId, chars: usize },
    /// Show the whole final answer.
    RevealSkipped { id: MessageId },
    AudioReady { id: MessageId, clip: Arc<AudioClip> },
    AudioFailed { id: MessageId },
}

/// Ordered list of messages of one chat session.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
    apology: String,
}

impl Transcript {
    /// A transcript opened by an assistant greeting.
    pub fn new(greeting: &str, apology: &str) -> Self {
        let mut transcript = Self {
            messages: Vec::new(),
            next_id: 0,
            apology: apology.to_string(),
        };
        let id = transcript.allocate_id();
        transcript.messages.push(Message::new(
            id,
            Sender::Assistant,
            greeting.to_string(),
            AudioState::None,
        ));
        if let Some(greeting) = transcript.messages.last_mut() {
            greeting.answer = Some(greeting.text.clone());
        }
        transcript
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// The newest assistant message, which holds the user's focus.
    pub fn focused(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant)
            .map(|m| m.id)
    }

    /// Apply one event. Returns the ids of the messages that changed.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<MessageId> {
        match event {
            SessionEvent::QuerySubmitted { query } => {
                let user_id = self.allocate_id();
                self.messages
                    .push(Message::new(user_id, Sender::User, query, AudioState::None));
                let assistant_id = self.allocate_id();
                self.messages.push(Message::new(
                    assistant_id,
                    Sender::Assistant,
                    String::new(),
                    AudioState::Loading,
                ));
                vec![user_id, assistant_id]
            }
            SessionEvent::AnswerCompleted { id, text } => {
                if text.trim().is_empty() {
                    return self.fail_answer(id);
                }
                match self.get_mut(id) {
                    Some(message) if message.is_pending() => {
                        message.answer = Some(text);
                        vec![id]
                    }
                    _ => Vec::new(),
                }
            }
            SessionEvent::AnswerFailed { id } => self.fail_answer(id),
            SessionEvent::RevealStep { id, chars } => match self.get_mut(id) {
                Some(message) => {
                    let Some(answer) = message.answer.as_deref() else {
                        return Vec::new();
                    };
                    if chars <= message.revealed {
                        return Vec::new();
                    }
                    let end = answer
                        .char_indices()
                        .nth(chars)
                        .map(|(i, _)| i)
                        .unwrap_or(answer.len());
                    message.text = answer[..end].to_string();
                    message.revealed = message.text.chars().count();
                    vec![id]
                }
                None => Vec::new(),
            },
            SessionEvent::RevealSkipped { id } => match self.get_mut(id) {
                Some(message) if !message.is_fully_revealed() => {
                    let Some(answer) = message.answer.clone() else {
                        return Vec::new();
                    };
                    message.revealed = answer.chars().count();
                    message.text = answer;
                    vec![id]
                }
                _ => Vec::new(),
            },
            SessionEvent::AudioReady { id, clip } => match self.get_mut(id) {
                Some(message) if message.audio_state == AudioState::Loading => {
                    message.audio_state = AudioState::Ready;
                    message.audio = Some(clip);
                    vec![id]
                }
                _ => Vec::new(),
            },
            SessionEvent::AudioFailed { id } => match self.get_mut(id) {
                Some(message) if message.audio_state == AudioState::Loading => {
                    message.audio_state = AudioState::Error;
                    vec![id]
                }
                _ => Vec::new(),
            },
        }
    }

    fn fail_answer(&mut self, id: MessageId) -> Vec<MessageId> {
        let apology = self.apology.clone();
        match self.get_mut(id) {
            Some(message) if message.is_pending() => {
                message.revealed = apology.chars().count();
                message.text = apology.clone();
                message.answer = Some(apology);
                message.audio_state = AudioState::Error;
                vec![id]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETING: &str = "你好！";
    const APOLOGY: &str = "抱歉，發生了一點問題...";

    fn submitted(t: &mut Transcript, query: &str) -> MessageId {
        t.apply(SessionEvent::QuerySubmitted {
            query: query.to_string(),
        });
        t.focused().unwrap()
    }

    fn clip() -> Arc<AudioClip> {
        Arc::new(AudioClip::new(vec![1, 2, 3], "audio/mpeg"))
    }

    #[test]
    fn test_greeting_opens_transcript() {
        let t = Transcript::new(GREETING, APOLOGY);
        assert_eq!(t.messages().len(), 1);
        let greeting = &t.messages()[0];
        assert_eq!(greeting.sender, Sender::Assistant);
        assert_eq!(greeting.text, GREETING);
        assert_eq!(greeting.audio_state, AudioState::None);
        assert!(greeting.is_fully_revealed());
    }

    #[test]
    fn test_query_appends_user_and_placeholder() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let changed = t.apply(SessionEvent::QuerySubmitted {
            query: "這道菜多少錢".to_string(),
        });

        assert_eq!(changed.len(), 2);
        assert!(changed[0] < changed[1]);
        let user = t.get(changed[0]).unwrap();
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.text, "這道菜多少錢");

        let placeholder = t.get(changed[1]).unwrap();
        assert_eq!(placeholder.text, "");
        assert_eq!(placeholder.audio_state, AudioState::Loading);
        assert!(placeholder.is_pending());
    }

    #[test]
    fn test_ids_increase() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let a = submitted(&mut t, "一");
        let b = submitted(&mut t, "二");
        let ids: Vec<MessageId> = t.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(a < b);
    }

    #[test]
    fn test_completed_answer_is_hidden_until_revealed() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        t.apply(SessionEvent::AnswerCompleted {
            id,
            text: "280 元".to_string(),
        });

        let message = t.get(id).unwrap();
        assert_eq!(message.text, "");
        assert_eq!(message.final_text(), Some("280 元"));
        assert_eq!(message.audio_state, AudioState::Loading);
    }

    #[test]
    fn test_blank_answer_becomes_apology() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        t.apply(SessionEvent::AnswerCompleted {
            id,
            text: "  \n ".to_string(),
        });

        let message = t.get(id).unwrap();
        assert_eq!(message.text, APOLOGY);
        assert_eq!(message.audio_state, AudioState::Error);
    }

    #[test]
    fn test_failed_answer_becomes_apology() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        t.apply(SessionEvent::AnswerFailed { id });

        let message = t.get(id).unwrap();
        assert_eq!(message.text, APOLOGY);
        assert_eq!(message.audio_state, AudioState::Error);

        // A late answer does not overwrite the apology.
        assert!(t
            .apply(SessionEvent::AnswerCompleted {
                id,
                text: "late".to_string()
            })
            .is_empty());
        assert_eq!(t.get(id).unwrap().text, APOLOGY);
    }

    #[test]
    fn test_reveal_is_prefix_monotone() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        let answer = "蒜味奶油雞 280 元";
        t.apply(SessionEvent::AnswerCompleted {
            id,
            text: answer.to_string(),
        });

        let total = answer.chars().count();
        let mut previous = 0;
        for step in [1, 3, 2, 5, 5, 9, total + 4] {
            t.apply(SessionEvent::RevealStep { id, chars: step });
            let shown = &t.get(id).unwrap().text;
            assert!(answer.starts_with(shown.as_str()));
            assert!(shown.chars().count() >= previous);
            previous = shown.chars().count();
        }
        assert_eq!(t.get(id).unwrap().text, answer);
        assert!(t.get(id).unwrap().is_fully_revealed());
    }

    #[test]
    fn test_reveal_skip_snaps_to_full_text() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        t.apply(SessionEvent::AnswerCompleted {
            id,
            text: "完整答案".to_string(),
        });
        t.apply(SessionEvent::RevealStep { id, chars: 1 });
        t.apply(SessionEvent::RevealSkipped { id });
        assert_eq!(t.get(id).unwrap().text, "完整答案");

        // Late steps from a cancelled timer are ignored.
        assert!(t.apply(SessionEvent::RevealStep { id, chars: 2 }).is_empty());
        assert_eq!(t.get(id).unwrap().text, "完整答案");
    }

    #[test]
    fn test_reveal_before_completion_is_ignored() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        assert!(t.apply(SessionEvent::RevealStep { id, chars: 3 }).is_empty());
        assert!(t.apply(SessionEvent::RevealSkipped { id }).is_empty());
        assert_eq!(t.get(id).unwrap().text, "");
    }

    #[test]
    fn test_audio_ready_is_immutable() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let id = submitted(&mut t, "q");
        let first = clip();
        t.apply(SessionEvent::AudioReady {
            id,
            clip: first.clone(),
        });
        assert_eq!(t.get(id).unwrap().audio_state, AudioState::Ready);

        let second = Arc::new(AudioClip::new(vec![9], "audio/mpeg"));
        assert!(t.apply(SessionEvent::AudioReady { id, clip: second }).is_empty());
        assert!(t.apply(SessionEvent::AudioFailed { id }).is_empty());

        let message = t.get(id).unwrap();
        assert_eq!(message.audio_state, AudioState::Ready);
        assert!(Arc::ptr_eq(message.audio.as_ref().unwrap(), &first));
    }

    #[test]
    fn test_audio_events_only_touch_their_message() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let first = submitted(&mut t, "一");
        let second = submitted(&mut t, "二");

        t.apply(SessionEvent::AudioFailed { id: first });
        t.apply(SessionEvent::AudioReady { id: second, clip: clip() });

        assert_eq!(t.get(first).unwrap().audio_state, AudioState::Error);
        assert_eq!(t.get(second).unwrap().audio_state, AudioState::Ready);
        assert!(t.get(first).unwrap().audio.is_none());
    }

    #[test]
    fn test_audio_for_greeting_is_ignored() {
        let mut t = Transcript::new(GREETING, APOLOGY);
        let greeting = t.messages()[0].id;
        assert!(t.apply(SessionEvent::AudioReady { id: greeting, clip: clip() }).is_empty());
        assert_eq!(t.get(greeting).unwrap().audio_state, AudioState::None);
    }
}
