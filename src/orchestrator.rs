//! Request/response orchestration
//!
//! The [`Orchestrator`] owns the conversation, the status machine and the
//! speech coordinator, and drives one exchange per user input: append the
//! user message, think, interpret the backend's reply, append exactly one
//! assistant message and speak it.

use tokio::sync::broadcast;

use crate::conversation::{ConversationStore, Message};
use crate::directive::{self, Directive, NowPlaying};
use crate::generation::GenerationBackend;
use crate::quick_command::QuickCommand;
use crate::status::{Status, StatusMachine, Transition};
use crate::voice::{SpeechCoordinator, SpeechEvent};

/// Reply when the generation backend fails
pub const CONNECTION_APOLOGY: &str = "My apologies, I seem to be experiencing a connection issue.";

/// Reply when a music directive cannot be parsed
pub const MUSIC_APOLOGY: &str =
    "My apologies, I had trouble processing that music request. Please try again.";

/// What an input led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty input or unknown command; nothing changed
    Ignored,
    /// A plain reply was appended
    Replied,
    /// A music request was accepted
    PlayingMusic,
    /// The reply carried a malformed music directive
    DirectiveFailed,
    /// The backend failed
    BackendFailed,
}

/// Drives the assistant's request/response cycle
pub struct Orchestrator<B> {
    backend: B,
    store: ConversationStore,
    status: StatusMachine,
    speech: SpeechCoordinator,
    now_playing: Option<NowPlaying>,
}

impl<B: GenerationBackend> Orchestrator<B> {
    /// Create an orchestrator; a non-empty `greeting` opens the conversation
    #[must_use]
    pub fn new(backend: B, speech: SpeechCoordinator, greeting: &str) -> Self {
        tracing::debug!(
            backend = backend.name(),
            speech = speech.is_supported(),
            "orchestrator ready"
        );
        Self {
            backend,
            store: ConversationStore::with_greeting(greeting),
            status: StatusMachine::new(),
            speech,
            now_playing: None,
        }
    }

    /// Conversation so far
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status.current()
    }

    /// Subscribe to status transitions
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<Transition> {
        self.status.subscribe()
    }

    /// Song from the last music request, until cleared
    #[must_use]
    pub const fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Dismiss the current song
    pub fn clear_now_playing(&mut self) -> Option<NowPlaying> {
        self.now_playing.take()
    }

    /// Whether speech is available
    #[must_use]
    pub const fn speech_supported(&self) -> bool {
        self.speech.is_supported()
    }

    /// Whether a capture session is open
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    /// Run one exchange for typed or transcribed text
    pub async fn handle_user_input(&mut self, text: &str) -> Outcome {
        if text.trim().is_empty() {
            return Outcome::Ignored;
        }

        // Accepted input ends any open capture; its audio is discarded
        if self.speech.abort_listening(&mut self.status).await {
            tracing::debug!("input accepted while listening, capture closed");
        }

        let prior = self.store.len();
        self.store.append(Message::user(text));
        self.status.begin_thinking();

        let result = self
            .backend
            .generate(text, &self.store.messages()[..prior])
            .await;

        let outcome = match result {
            Ok(response) => self.apply_response(&response).await,
            Err(e) => {
                tracing::error!(error = %e, backend = self.backend.name(), "generation failed");
                self.status.fail();
                self.store.append(Message::assistant(CONNECTION_APOLOGY));
                self.status.recover();
                Outcome::BackendFailed
            }
        };

        self.status.settle();
        outcome
    }

    /// Run the canned prompt for a quick command key
    ///
    /// Unknown keys are ignored.
    pub async fn handle_quick_command(&mut self, key: &str) -> Outcome {
        match key.parse::<QuickCommand>() {
            Ok(command) => {
                tracing::debug!(command = %command, "quick command");
                self.handle_user_input(command.prompt()).await
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring quick command");
                Outcome::Ignored
            }
        }
    }

    /// Open a capture session
    pub async fn start_listening(&mut self) -> bool {
        self.speech.start_listening(&mut self.status).await
    }

    /// Close the capture session, running an exchange if a transcript is ready
    pub async fn stop_listening(&mut self) -> Option<Outcome> {
        let transcript = self.speech.stop_listening(&mut self.status).await?;
        Some(self.handle_user_input(&transcript).await)
    }

    /// Start or stop listening
    pub async fn toggle_listening(&mut self) -> Option<Outcome> {
        let transcript = self.speech.toggle_listening(&mut self.status).await?;
        Some(self.handle_user_input(&transcript).await)
    }

    /// Apply a speech engine event; a finalized transcript runs an exchange
    pub async fn handle_speech_event(&mut self, event: SpeechEvent) -> Option<Outcome> {
        let transcript = self.speech.handle_event(event, &mut self.status)?;
        tracing::info!(len = transcript.len(), "transcript received");
        Some(self.handle_user_input(&transcript).await)
    }

    async fn apply_response(&mut self, response: &str) -> Outcome {
        match directive::parse(response) {
            Ok(Directive::PlayMusic(track)) => {
                let reply = track.confirmation();
                tracing::info!(song = %track.song, artist = ?track.artist(), "music requested");
                self.now_playing = Some(track);
                self.reply(reply).await;
                Outcome::PlayingMusic
            }
            Ok(Directive::PlainText(content)) => {
                self.reply(content).await;
                Outcome::Replied
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed music directive");
                self.store.append(Message::assistant(MUSIC_APOLOGY));
                Outcome::DirectiveFailed
            }
        }
    }

    async fn reply(&mut self, text: String) {
        self.store.append(Message::assistant(text.as_str()));
        self.speech.speak(&text, &mut self.status).await;
    }
}
