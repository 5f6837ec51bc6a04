//! End-of-utterance detection
//!
//! Decides when a capture session has heard a complete utterance, using local
//! energy detection: speech followed by enough trailing silence ends it.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence duration that ends an utterance (0.8 seconds)
const SILENCE_SAMPLES: usize = 12_800;

/// Give up if nobody speaks within this many samples (8 seconds)
const NO_SPEECH_TIMEOUT_SAMPLES: usize = SAMPLE_RATE as usize * 8;

/// Hard cap on utterance length (30 seconds)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech to begin
    Waiting,
    /// Speech detected, accumulating
    Capturing,
    /// Utterance finished (or timed out); no further audio is accepted
    Complete,
}

/// Detects complete utterances in a stream of audio chunks
#[derive(Debug)]
pub struct UtteranceDetector {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    waited: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector waiting for speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Feed a chunk of audio and return the resulting state
    pub fn process(&mut self, samples: &[f32]) -> DetectorState {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Capturing;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, capturing");
                } else {
                    self.waited += samples.len();
                    if self.waited > NO_SPEECH_TIMEOUT_SAMPLES {
                        tracing::debug!("no speech before timeout");
                        self.state = DetectorState::Complete;
                    }
                }
            }
            DetectorState::Capturing => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.speech_buffer.len(),
                    silence = self.silence_counter,
                    is_speech,
                    energy,
                    "capturing"
                );

                let enough_speech =
                    self.speech_buffer.len().saturating_sub(self.silence_counter) > MIN_SPEECH_SAMPLES;

                if self.silence_counter > SILENCE_SAMPLES && enough_speech {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    self.state = DetectorState::Complete;
                } else if self.silence_counter > SILENCE_SAMPLES {
                    // A short blip, not an utterance
                    tracing::trace!("noise burst - waiting again");
                    self.state = DetectorState::Waiting;
                    self.speech_buffer.clear();
                    self.silence_counter = 0;
                } else if self.speech_buffer.len() > MAX_UTTERANCE_SAMPLES {
                    tracing::debug!("utterance hit length cap");
                    self.state = DetectorState::Complete;
                }
            }
            DetectorState::Complete => {}
        }

        self.state
    }

    /// Take the captured speech, leaving the buffer empty
    pub fn take_speech_buffer(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Whether the detector has finished
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == DetectorState::Complete
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Reset to waiting for speech
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
        self.waited = 0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
