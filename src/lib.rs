//! J.A.R.V.I.S. console - voice-enabled conversational assistant
//!
//! This library provides the interaction core of the assistant:
//! - Conversation history and response directive parsing
//! - Activity status state machine
//! - Speech coordination (capture, STT, TTS, playback)
//! - Request/response orchestration and quick commands
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Console                        │
//! │   typed lines  │  /commands  │  speech events       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Orchestrator                      │
//! │  Conversation │ Directives │ Status │ Speech coord. │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐       ┌──────────▼────────────┐
//! │ Generation backend  │       │     Speech engine     │
//! │ (chat completions)  │       │ mic │ STT │ TTS │ spk │
//! └─────────────────────┘       └───────────────────────┘
//! ```

pub mod config;
pub mod console;
pub mod conversation;
pub mod directive;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod quick_command;
pub mod status;
pub mod voice;

pub use config::Config;
pub use console::{Console, ConsoleInput};
pub use conversation::{ConversationStore, Message, Role};
pub use directive::{Directive, DirectiveError, NowPlaying};
pub use error::{Error, Result};
pub use generation::{ChatCompletionsBackend, GenerationBackend};
pub use orchestrator::{CONNECTION_APOLOGY, MUSIC_APOLOGY, Orchestrator, Outcome};
pub use quick_command::QuickCommand;
pub use status::{Status, StatusMachine, Transition};
pub use voice::{DeviceSpeech, SpeechCoordinator, SpeechEngine, SpeechEvent};
