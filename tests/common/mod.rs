//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use jarvis_console::voice::{SessionId, SpeechEngine, UtteranceId};
use jarvis_console::{Error, Message, Result, Status, Transition};
use tokio::sync::{Mutex, broadcast};

/// One recorded generation request
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub user_text: String,
    pub history: Vec<String>,
}

/// Backend that replays canned responses in order
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    responses: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<Mutex<Vec<GenerateCall>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub async fn reply(&self, text: &str) -> &Self {
        self.responses.lock().await.push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failure
    pub async fn fail(&self, reason: &str) -> &Self {
        self.responses
            .lock()
            .await
            .push_back(Err(reason.to_string()));
        self
    }

    pub async fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl jarvis_console::GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, user_text: &str, history: &[Message]) -> Result<String> {
        self.calls.lock().await.push(GenerateCall {
            user_text: user_text.to_string(),
            history: history.iter().map(|m| m.content().to_string()).collect(),
        });

        match self.responses.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(Error::Generation(reason)),
            None => Err(Error::Generation("no scripted response".to_string())),
        }
    }
}

/// Speech engine that records every call
pub struct RecordingSpeech {
    supported: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn supported() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Texts passed to `speak`, in order
    pub async fn spoken(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| c.strip_prefix("speak ").map(ToString::to_string))
            .collect()
    }
}

#[async_trait]
impl SpeechEngine for RecordingSpeech {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start_listening(&self, session: SessionId) -> Result<()> {
        self.calls.lock().await.push(format!("start {session}"));
        Ok(())
    }

    async fn stop_listening(&self, session: SessionId) -> Result<()> {
        self.calls.lock().await.push(format!("stop {session}"));
        Ok(())
    }

    async fn speak(&self, _utterance: UtteranceId, text: &str) -> Result<()> {
        self.calls.lock().await.push(format!("speak {text}"));
        Ok(())
    }

    async fn cancel_speech(&self) -> Result<()> {
        self.calls.lock().await.push("cancel".to_string());
        Ok(())
    }
}

/// Collect the target states of all transitions received so far
pub fn drain_statuses(rx: &mut broadcast::Receiver<Transition>) -> Vec<Status> {
    let mut seen = Vec::new();
    while let Ok(transition) = rx.try_recv() {
        seen.push(transition.to);
    }
    seen
}
