//! Bridges speech engine events into status transitions

use std::sync::Arc;

use super::{SessionId, SpeechEngine, SpeechEvent, UtteranceId};
use crate::status::StatusMachine;

/// Open or recently closed capture session
#[derive(Debug)]
struct Capture {
    session: SessionId,
    open: bool,
    transcript: Option<String>,
}

/// Coordinates a [`SpeechEngine`] with the [`StatusMachine`]
///
/// Capture sessions and utterances are numbered; events that refer to anything
/// other than the current session or utterance are dropped.
pub struct SpeechCoordinator {
    engine: Option<Arc<dyn SpeechEngine>>,
    next_session: u64,
    capture: Option<Capture>,
    next_utterance: u64,
    utterance: Option<UtteranceId>,
}

impl SpeechCoordinator {
    /// Wrap an engine; an unsupported engine makes every operation a no-op
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        let engine = if engine.is_supported() {
            tracing::info!(engine = engine.name(), "speech enabled");
            Some(engine)
        } else {
            tracing::info!(engine = engine.name(), "speech unsupported, voice disabled");
            None
        };

        Self {
            engine,
            next_session: 0,
            capture: None,
            next_utterance: 0,
            utterance: None,
        }
    }

    /// Coordinator with no speech capability
    #[must_use]
    pub const fn unsupported() -> Self {
        Self {
            engine: None,
            next_session: 0,
            capture: None,
            next_utterance: 0,
            utterance: None,
        }
    }

    /// Whether speech is available
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether a capture session is open
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| c.open)
    }

    /// Whether an utterance is in flight
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.utterance.is_some()
    }

    /// Open a new capture session
    ///
    /// Cuts off any utterance in flight. Returns `false` if speech is
    /// unsupported, a session is already open, or the engine refused.
    pub async fn start_listening(&mut self, status: &mut StatusMachine) -> bool {
        let Some(engine) = self.engine.clone() else {
            tracing::debug!("start listening ignored: speech unsupported");
            return false;
        };
        if self.is_listening() {
            return false;
        }

        self.cancel_speech(status).await;

        self.next_session += 1;
        let session = SessionId(self.next_session);

        if let Err(e) = engine.start_listening(session).await {
            tracing::warn!(error = %e, session = %session, "failed to start listening");
            return false;
        }

        tracing::debug!(session = %session, "listening");
        self.capture = Some(Capture {
            session,
            open: true,
            transcript: None,
        });
        status.begin_listening();
        true
    }

    /// Close the open capture session
    ///
    /// Returns a transcript that was waiting for the session to end. If the
    /// engine has not finalized one yet, it is handed out by
    /// [`handle_event`](Self::handle_event) when it arrives.
    pub async fn stop_listening(&mut self, status: &mut StatusMachine) -> Option<String> {
        let engine = self.engine.clone()?;
        let session = self.capture.as_ref().filter(|c| c.open)?.session;

        if let Err(e) = engine.stop_listening(session).await {
            tracing::warn!(error = %e, session = %session, "failed to stop listening");
        }

        self.close_capture(status)
    }

    /// Close the open capture session and discard anything it captured
    ///
    /// Transcripts and end events the engine still delivers for the session
    /// are dropped as stale. Returns `true` if a session was open.
    pub async fn abort_listening(&mut self, status: &mut StatusMachine) -> bool {
        let Some(engine) = self.engine.clone() else {
            return false;
        };
        let Some(session) = self.capture.as_ref().filter(|c| c.open).map(|c| c.session) else {
            return false;
        };

        if let Err(e) = engine.stop_listening(session).await {
            tracing::warn!(error = %e, session = %session, "failed to stop listening");
        }

        tracing::debug!(session = %session, "capture discarded");
        self.capture = None;
        status.end_listening();
        true
    }

    /// Flip between listening and not listening
    ///
    /// Returns a finalized transcript when the toggle closed a session.
    pub async fn toggle_listening(&mut self, status: &mut StatusMachine) -> Option<String> {
        if self.is_listening() {
            self.stop_listening(status).await
        } else {
            self.start_listening(status).await;
            None
        }
    }

    /// Vocalize `text`, replacing any utterance in flight
    ///
    /// An open capture session is discarded first so the microphone never
    /// records the reply. Returns `true` if the engine started speaking.
    pub async fn speak(&mut self, text: &str, status: &mut StatusMachine) -> bool {
        let Some(engine) = self.engine.clone() else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }

        self.abort_listening(status).await;

        let replaced = self.utterance.take();
        if let Some(previous) = replaced {
            tracing::debug!(utterance = %previous, "replacing utterance");
            if let Err(e) = engine.cancel_speech().await {
                tracing::warn!(error = %e, "failed to cancel speech");
            }
        }

        self.next_utterance += 1;
        let utterance = UtteranceId(self.next_utterance);

        match engine.speak(utterance, text).await {
            Ok(()) => {
                tracing::debug!(utterance = %utterance, len = text.len(), "speaking");
                self.utterance = Some(utterance);
                status.begin_speaking();
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to speak");
                if replaced.is_some() {
                    status.end_speaking();
                }
                false
            }
        }
    }

    /// Cut off the utterance in flight
    pub async fn cancel_speech(&mut self, status: &mut StatusMachine) {
        let Some(engine) = self.engine.clone() else {
            return;
        };
        let Some(utterance) = self.utterance.take() else {
            return;
        };

        tracing::debug!(utterance = %utterance, "cancelling speech");
        if let Err(e) = engine.cancel_speech().await {
            tracing::warn!(error = %e, "failed to cancel speech");
        }
        status.end_speaking();
    }

    /// Apply an engine event
    ///
    /// Returns a non-empty transcript once its capture session has ended; the
    /// caller treats it as typed input.
    pub fn handle_event(
        &mut self,
        event: SpeechEvent,
        status: &mut StatusMachine,
    ) -> Option<String> {
        match event {
            SpeechEvent::Transcript { session, text } => {
                let Some(capture) = self.capture.as_mut().filter(|c| c.session == session) else {
                    tracing::debug!(session = %session, "ignoring stale transcript");
                    return None;
                };

                let text = text.trim();
                if text.is_empty() {
                    return None;
                }

                match capture.transcript.as_mut() {
                    Some(pending) => {
                        pending.push(' ');
                        pending.push_str(text);
                    }
                    None => capture.transcript = Some(text.to_string()),
                }

                if capture.open {
                    None
                } else {
                    self.capture.take().and_then(|c| c.transcript)
                }
            }
            SpeechEvent::ListeningEnded { session } => {
                if self
                    .capture
                    .as_ref()
                    .is_some_and(|c| c.session == session && c.open)
                {
                    self.close_capture(status)
                } else {
                    tracing::debug!(session = %session, "ignoring stale listening end");
                    None
                }
            }
            SpeechEvent::SpeakingEnded { utterance } => {
                if self.utterance == Some(utterance) {
                    tracing::debug!(utterance = %utterance, "speech finished");
                    self.utterance = None;
                    status.end_speaking();
                } else {
                    tracing::debug!(utterance = %utterance, "ignoring stale speaking end");
                }
                None
            }
            SpeechEvent::Error(message) => {
                tracing::warn!(error = %message, "speech engine error");
                None
            }
        }
    }

    /// Mark the current session closed and release any pending transcript
    fn close_capture(&mut self, status: &mut StatusMachine) -> Option<String> {
        let capture = self.capture.as_mut()?;
        capture.open = false;
        status.end_listening();

        if capture.transcript.is_some() {
            self.capture.take().and_then(|c| c.transcript)
        } else {
            None
        }
    }
}
