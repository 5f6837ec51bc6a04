//! Speech engine backed by local audio devices and hosted STT/TTS

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, oneshot};

use super::capture::{AudioCapture, SAMPLE_RATE, audio_devices_available, samples_to_wav};
use super::detector::{DetectorState, UtteranceDetector};
use super::playback::{AudioPlayback, decode_mp3};
use super::stt::SpeechToText;
use super::tts::TextToSpeech;
use super::{SessionId, SpeechEngine, SpeechEvent, UtteranceId};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// How often the capture thread drains the microphone buffer
const CAPTURE_POLL: Duration = Duration::from_millis(100);

/// Handle to a running capture thread
struct CaptureHandle {
    session: SessionId,
    stop: Arc<AtomicBool>,
}

/// Microphone + speaker speech engine
///
/// Capture runs on a dedicated thread (audio streams are not `Send` on every
/// platform); the captured utterance is transcribed on the runtime. Synthesized
/// speech is played on a blocking task that can be stopped at any time.
pub struct DeviceSpeech {
    stt: Option<Arc<SpeechToText>>,
    tts: Option<TextToSpeech>,
    events: mpsc::UnboundedSender<SpeechEvent>,
    capture: Mutex<Option<CaptureHandle>>,
    playback: Mutex<Option<Arc<AtomicBool>>>,
}

impl DeviceSpeech {
    /// Build the engine from voice settings
    ///
    /// Events are delivered on the returned receiver. The engine reports
    /// itself unsupported when voice is disabled, no API key is configured or
    /// the host lacks an input or output device.
    #[must_use]
    pub fn new(config: &VoiceConfig) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        let (stt, tts) = match Self::clients(config) {
            Ok(Some((stt, tts))) => (Some(Arc::new(stt)), Some(tts)),
            Ok(None) => (None, None),
            Err(e) => {
                tracing::warn!(error = %e, "voice unavailable");
                (None, None)
            }
        };

        let engine = Self {
            stt,
            tts,
            events,
            capture: Mutex::new(None),
            playback: Mutex::new(None),
        };
        (engine, rx)
    }

    fn clients(config: &VoiceConfig) -> Result<Option<(SpeechToText, TextToSpeech)>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(key) = config.api_key.as_ref() else {
            tracing::info!("no OpenAI API key, voice disabled");
            return Ok(None);
        };
        if !audio_devices_available() {
            tracing::info!("no audio input/output device, voice disabled");
            return Ok(None);
        }

        let stt = SpeechToText::new(
            key.expose_secret(),
            config.stt_model.clone(),
            config.api_base_url.clone(),
        )?;
        let tts = TextToSpeech::new(
            key.expose_secret(),
            config.tts_model.clone(),
            config.tts_voice.clone(),
            config.tts_speed,
            config.api_base_url.clone(),
        )?;
        Ok(Some((stt, tts)))
    }

    fn stop_playback(&self) {
        let previous = self
            .playback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(stop) = previous {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl SpeechEngine for DeviceSpeech {
    fn name(&self) -> &'static str {
        "device"
    }

    fn is_supported(&self) -> bool {
        self.stt.is_some() && self.tts.is_some()
    }

    async fn start_listening(&self, session: SessionId) -> Result<()> {
        let stt = self
            .stt
            .clone()
            .ok_or_else(|| Error::Speech("speech capture unsupported".to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let previous = self
            .capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(CaptureHandle {
                session,
                stop: Arc::clone(&stop),
            });
        if let Some(previous) = previous {
            previous.stop.store(true, Ordering::Relaxed);
        }

        let (samples_tx, samples_rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("jarvis-capture".to_string())
            .spawn(move || {
                let _ = samples_tx.send(capture_utterance(&stop));
            })?;

        let events = self.events.clone();
        tokio::spawn(async move {
            let captured = samples_rx.await;
            let _ = events.send(SpeechEvent::ListeningEnded { session });

            let samples = match captured {
                Ok(Ok(samples)) => samples,
                Ok(Err(e)) => {
                    let _ = events.send(SpeechEvent::Error(e.to_string()));
                    return;
                }
                Err(_) => return,
            };
            if samples.is_empty() {
                tracing::debug!(session = %session, "no speech captured");
                return;
            }

            let transcript = match samples_to_wav(&samples, SAMPLE_RATE) {
                Ok(wav) => stt.transcribe(&wav).await,
                Err(e) => Err(e),
            };
            let event = match transcript {
                Ok(text) => SpeechEvent::Transcript { session, text },
                Err(e) => SpeechEvent::Error(e.to_string()),
            };
            let _ = events.send(event);
        });

        Ok(())
    }

    async fn stop_listening(&self, session: SessionId) -> Result<()> {
        let mut capture = self.capture.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = capture.take_if(|c| c.session == session) {
            handle.stop.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn speak(&self, utterance: UtteranceId, text: &str) -> Result<()> {
        let tts = self
            .tts
            .as_ref()
            .ok_or_else(|| Error::Speech("speech synthesis unsupported".to_string()))?;

        self.stop_playback();

        let mp3 = tts.synthesize(text).await?;
        let samples = decode_mp3(&mp3)?;

        let stop = Arc::new(AtomicBool::new(false));
        *self.playback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&stop));

        let events = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let result = AudioPlayback::new().and_then(|p| p.play_blocking(samples, &stop));
            if let Err(e) = result {
                tracing::warn!(error = %e, utterance = %utterance, "playback failed");
            }
            let _ = events.send(SpeechEvent::SpeakingEnded { utterance });
        });

        Ok(())
    }

    async fn cancel_speech(&self) -> Result<()> {
        self.stop_playback();
        Ok(())
    }
}

/// Record from the microphone until an utterance completes or `stop` is raised
fn capture_utterance(stop: &AtomicBool) -> Result<Vec<f32>> {
    let mut capture = AudioCapture::open()?;
    capture.start()?;

    let mut detector = UtteranceDetector::new();
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(CAPTURE_POLL);
        let chunk = capture.drain();
        if chunk.is_empty() {
            continue;
        }
        if detector.process(&chunk) == DetectorState::Complete {
            break;
        }
    }

    capture.stop();
    // Manual stop keeps whatever speech was heard so far
    Ok(detector.take_speech_buffer())
}
