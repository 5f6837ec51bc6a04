//! Language generation backends
//!
//! The orchestrator only needs one operation: given the latest user text and
//! the conversation so far, produce reply text. [`ChatCompletionsBackend`]
//! implements it against any OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::conversation::{Message, Role};
use crate::directive::PLAY_SONG_PREFIX;
use crate::{Error, Result};

/// Produces assistant replies
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Generate a reply to `user_text`
    ///
    /// `history` holds the conversation before `user_text` was sent.
    async fn generate(&self, user_text: &str, history: &[Message]) -> Result<String>;
}

/// Build the persona system prompt, including the music directive convention
#[must_use]
pub fn system_prompt(assistant_name: &str) -> String {
    format!(
        "You are {assistant_name}, a sophisticated and witty AI assistant in the style of \
         Tony Stark's butler. Address the user politely, keep answers concise and suitable \
         for being read aloud, and avoid markdown.\n\n\
         When the user asks you to play a song or some music, do not answer in prose. \
         Respond with exactly one line of the form \
         {PLAY_SONG_PREFIX}{{\"song\": \"<song title>\", \"artist\": \"<artist>\"}} \
         where artist may be omitted if unknown, and nothing else."
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_tokens: u32,
    temperature: Option<f32>,
    system_prompt: String,
}

impl ChatCompletionsBackend {
    /// Create a backend from generation settings
    #[must_use]
    pub fn new(config: LlmConfig, assistant_name: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url,
            model: config.model,
            api_key: config.api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: system_prompt(assistant_name),
        }
    }

    fn request_messages<'a>(
        &'a self,
        user_text: &'a str,
        history: &'a [Message],
    ) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &self.system_prompt,
        });
        messages.extend(
            history
                .iter()
                .filter(|m| m.role() != Role::System)
                .map(|m| ChatMessage {
                    role: m.role().as_str(),
                    content: m.content(),
                }),
        );
        messages.push(ChatMessage {
            role: "user",
            content: user_text,
        });
        messages
    }
}

#[async_trait]
impl GenerationBackend for ChatCompletionsBackend {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn generate(&self, user_text: &str, history: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: self.request_messages(user_text, history),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            history = history.len(),
            "requesting completion"
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Generation(format!("API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Generation("empty response".to_string()))?;

        tracing::debug!(len = content.len(), "completion received");
        Ok(content)
    }
}
