//! Timed character reveal of a finished answer.

use super::transcript::{MessageId, SessionEvent};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

/// The single reveal animation of a session.
///
/// Starting a new reveal cancels the running one.
#[derive(Debug, Default)]
pub struct RevealTimer {
    active: Option<(MessageId, JoinHandle<()>)>,
}

impl RevealTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reveal `total_chars` characters of message `id`, one per `interval`.
    pub fn start(
        &mut self,
        id: MessageId,
        total_chars: usize,
        interval: Duration,
        events: UnboundedSender<SessionEvent>,
    ) {
        self.cancel();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            for chars in 1..=total_chars {
                ticker.tick().await;
                if events.send(SessionEvent::RevealStep { id, chars }).is_err() {
                    return;
                }
            }
            debug!("Reveal of message {} finished", id);
        });

        self.active = Some((id, handle));
    }

    /// Stop the running reveal, if any, and return the message it was for.
    ///
    /// Calling this again, or after the reveal finished on its own, is a no-op
    /// apart from the return value.
    pub fn cancel(&mut self) -> Option<MessageId> {
        let (id, handle) = self.active.take()?;
        handle.abort();
        Some(id)
    }

    /// Message of the reveal that is still running.
    pub fn running(&self) -> Option<MessageId> {
        self.active
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
    }
}

impl Drop for RevealTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
