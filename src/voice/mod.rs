//! Voice processing module
//!
//! [`SpeechEngine`] is the narrow capability the rest of the assistant talks
//! to; [`SpeechCoordinator`] turns its asynchronous events into status
//! transitions and finalized transcripts. [`DeviceSpeech`] is the engine backed
//! by local audio devices and hosted STT/TTS.

mod capture;
mod coordinator;
mod detector;
mod device;
mod playback;
mod stt;
mod tts;

use std::fmt;

use async_trait::async_trait;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, audio_devices_available, samples_to_wav};
pub use coordinator::SpeechCoordinator;
pub use detector::{DetectorState, UtteranceDetector, calculate_energy};
pub use device::DeviceSpeech;
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3, sine_tone};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

/// Identifies one start/stop listening cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one speak request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asynchronous notifications from a speech engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A finalized transcript for a capture session
    Transcript {
        /// Session the audio was captured in
        session: SessionId,
        /// Recognized text
        text: String,
    },
    /// The engine stopped capturing for a session
    ListeningEnded {
        /// Session that ended
        session: SessionId,
    },
    /// An utterance finished playing or was cut off
    SpeakingEnded {
        /// Utterance that ended
        utterance: UtteranceId,
    },
    /// A non-fatal engine failure
    Error(String),
}

/// Platform speech capture and synthesis
///
/// Completion is reported through [`SpeechEvent`]s, delivered on whatever
/// channel the engine was constructed with.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Whether capture and synthesis work in this environment
    fn is_supported(&self) -> bool;

    /// Begin capturing audio for `session`
    async fn start_listening(&self, session: SessionId) -> Result<()>;

    /// Stop capturing for `session`
    async fn stop_listening(&self, session: SessionId) -> Result<()>;

    /// Start vocalizing `text`, replacing anything in flight
    async fn speak(&self, utterance: UtteranceId, text: &str) -> Result<()>;

    /// Cut off the current utterance, if any
    async fn cancel_speech(&self) -> Result<()>;
}
