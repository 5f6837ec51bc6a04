//! Interactive terminal front end
//!
//! Typed lines are user input; lines starting with `/` are console commands.
//! Typed input, speech engine events and shutdown are handled one at a time,
//! in arrival order, by a single select loop.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use crate::conversation::{Message, Role};
use crate::generation::GenerationBackend;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::quick_command::QuickCommand;
use crate::status::Transition;
use crate::voice::SpeechEvent;
use crate::Result;

const HELP: &str = "\
Type a message and press Enter to talk.
  /listen     start voice capture
  /stop       stop voice capture
  /weather    /news    /music    /settings   quick commands
  /close      close the music player
  /status     show assistant status
  /history    show the whole conversation
  /help       show this help
  /quit       exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Blank line
    Empty,
    /// Text for the assistant
    Text(String),
    /// Quick command shorthand
    Quick(QuickCommand),
    /// Start voice capture
    Listen,
    /// Stop voice capture
    Stop,
    /// Dismiss the now-playing song
    Close,
    /// Show status
    Status,
    /// Show the conversation
    History,
    /// Show help
    Help,
    /// Exit
    Quit,
    /// Unrecognized `/command`
    Unknown(String),
}

impl ConsoleInput {
    /// Parse one line of console input
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Text(line.to_string());
        };

        match command.trim().to_ascii_lowercase().as_str() {
            "listen" | "mic" => Self::Listen,
            "stop" => Self::Stop,
            "close" => Self::Close,
            "status" => Self::Status,
            "history" => Self::History,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => other
                .parse::<QuickCommand>()
                .map_or_else(|_| Self::Unknown(other.to_string()), Self::Quick),
        }
    }
}

/// Terminal session around an [`Orchestrator`]
pub struct Console<B> {
    orchestrator: Orchestrator<B>,
    statuses: broadcast::Receiver<Transition>,
    assistant_name: String,
    rendered: usize,
}

impl<B: GenerationBackend> Console<B> {
    /// Create a console
    #[must_use]
    pub fn new(orchestrator: Orchestrator<B>, assistant_name: impl Into<String>) -> Self {
        Self {
            statuses: orchestrator.subscribe_status(),
            orchestrator,
            assistant_name: assistant_name.into(),
            rendered: 0,
        }
    }

    /// Run until `/quit`, end of input or Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if reading standard input fails
    pub async fn run(
        mut self,
        mut events: Option<mpsc::UnboundedReceiver<SpeechEvent>>,
    ) -> Result<()> {
        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{} online. Type /help for commands.", self.assistant_name);
        if !self.orchestrator.speech_supported() {
            println!("(voice unavailable, text only)");
        }
        self.render_new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::debug!("end of input");
                        break;
                    };
                    if !self.handle_line(&line).await {
                        break;
                    }
                }
                Some(event) = next_event(&mut events) => {
                    tracing::trace!(?event, "speech event");
                    if let Some(outcome) = self.orchestrator.handle_speech_event(event).await {
                        self.after_exchange(outcome);
                    }
                }
                transition = self.statuses.recv() => {
                    match transition {
                        Ok(transition) => render_transition(transition),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "status updates lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        println!("Goodbye.");
        Ok(())
    }

    /// Handle one typed line; returns `false` to exit
    async fn handle_line(&mut self, line: &str) -> bool {
        match ConsoleInput::parse(line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Text(text) => {
                let outcome = self.orchestrator.handle_user_input(&text).await;
                self.after_exchange(outcome);
            }
            ConsoleInput::Quick(command) => {
                let outcome = self.orchestrator.handle_quick_command(command.key()).await;
                self.after_exchange(outcome);
            }
            ConsoleInput::Listen => {
                if !self.orchestrator.speech_supported() {
                    println!("Voice is unavailable in this environment.");
                } else if !self.orchestrator.start_listening().await {
                    println!("Already listening.");
                }
            }
            ConsoleInput::Stop => {
                if let Some(outcome) = self.orchestrator.stop_listening().await {
                    self.after_exchange(outcome);
                }
            }
            ConsoleInput::Close => match self.orchestrator.clear_now_playing() {
                Some(track) => println!("Closed player for \"{}\".", track.song),
                None => println!("Nothing is playing."),
            },
            ConsoleInput::Status => self.render_status(),
            ConsoleInput::History => {
                for message in self.orchestrator.store().messages() {
                    println!("{}", self.format_message(message));
                }
            }
            ConsoleInput::Help => println!("{HELP}"),
            ConsoleInput::Quit => return false,
            ConsoleInput::Unknown(command) => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
        true
    }

    fn after_exchange(&mut self, outcome: Outcome) {
        self.render_transitions();
        self.render_new();
        if let (Outcome::PlayingMusic, Some(track)) = (outcome, self.orchestrator.now_playing()) {
            println!("  ♪ Now playing: {}", track.song);
            if let Some(artist) = track.artist() {
                println!("    by {artist}");
            }
            println!("    {}", track.youtube_search_url());
        }
    }

    /// Print transitions already published, so they precede the reply
    fn render_transitions(&mut self) {
        loop {
            match self.statuses.try_recv() {
                Ok(transition) => render_transition(transition),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "status updates lagged");
                }
                Err(_) => break,
            }
        }
    }

    /// Print messages appended since the last render
    fn render_new(&mut self) {
        let store = self.orchestrator.store();
        for message in store.since(self.rendered) {
            println!("{}", self.format_message(message));
        }
        self.rendered = store.len();
    }

    fn render_status(&self) {
        println!("Status: {}", self.orchestrator.status());
        println!(
            "Voice: {}",
            match (
                self.orchestrator.speech_supported(),
                self.orchestrator.is_listening()
            ) {
                (false, _) => "unavailable",
                (true, true) => "listening",
                (true, false) => "ready",
            }
        );
        if let Some(track) = self.orchestrator.now_playing() {
            println!("Now playing: {}", track.confirmation());
        }
    }

    fn format_message(&self, message: &Message) -> String {
        let time = message.created_at().with_timezone(&chrono::Local).format("%H:%M");
        match message.role() {
            Role::User => format!("[{time}] You: {}", message.content()),
            Role::Assistant => format!("[{time}] {}: {}", self.assistant_name, message.content()),
            Role::System => format!("[{time}] * {}", message.content()),
        }
    }
}

fn render_transition(transition: Transition) {
    println!("  · {}", transition.to);
}

/// Next speech event, or never if there is no engine
async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<SpeechEvent>>,
) -> Option<SpeechEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
