//! Configuration management for the assistant console

pub mod file;

use std::path::Path;

use secrecy::SecretString;

use crate::conversation::DEFAULT_GREETING;
use crate::{Error, Result};

use file::ConfigFile;

/// Default assistant display name
pub const DEFAULT_ASSISTANT_NAME: &str = "J.A.R.V.I.S.";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default generation model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default max tokens per reply
const DEFAULT_MAX_TOKENS: u32 = 512;

/// Assistant console configuration
#[derive(Debug)]
pub struct Config {
    /// Persona settings
    pub assistant: AssistantConfig,

    /// Generation backend settings
    pub llm: LlmConfig,

    /// Voice settings
    pub voice: VoiceConfig,
}

/// Persona settings
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Display name used in prompts and rendering
    pub name: String,

    /// Opening message of every session (empty = none)
    pub greeting: String,
}

/// Generation backend settings
#[derive(Debug)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// API key (optional for local servers)
    pub api_key: Option<SecretString>,

    /// Max tokens per reply
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Voice settings
#[derive(Debug)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// Base URL of the STT/TTS API
    pub api_base_url: String,

    /// API key for STT/TTS
    pub api_key: Option<SecretString>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is invalid
    pub fn load(config_path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        Self::from_sources(fc, |key| std::env::var(key).ok(), disable_voice)
    }

    /// Assemble configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is invalid
    pub fn from_sources<F>(fc: ConfigFile, env: F, disable_voice: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_key = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.is_empty());

        let assistant = AssistantConfig {
            name: fc
                .assistant
                .name
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
            greeting: fc
                .assistant
                .greeting
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        };

        // LLM (env > toml > default); key falls back to the OpenAI key
        let llm = LlmConfig {
            base_url: validate_url(
                env("JARVIS_LLM_BASE_URL")
                    .or(fc.llm.base_url)
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            )?,
            model: env("JARVIS_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: env("JARVIS_LLM_API_KEY")
                .or(fc.api_keys.llm)
                .filter(|k| !k.is_empty())
                .or_else(|| openai_key.clone())
                .map(SecretString::from),
            max_tokens: fc.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: fc.llm.temperature,
        };

        let env_disabled = env("JARVIS_DISABLE_VOICE")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let voice_enabled = !disable_voice && !env_disabled && fc.voice.enabled.unwrap_or(true);

        if disable_voice || env_disabled {
            tracing::info!("voice explicitly disabled");
        }

        // Voice (env > toml > default)
        let voice = VoiceConfig {
            enabled: voice_enabled,
            api_base_url: validate_url(
                fc.voice
                    .api_base_url
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            )?,
            api_key: openai_key.map(SecretString::from),
            stt_model: env("JARVIS_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("JARVIS_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("JARVIS_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "onyx".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0).clamp(0.25, 4.0),
        };

        Ok(Self {
            assistant,
            llm,
            voice,
        })
    }
}

/// Check that `raw` is an http(s) URL and strip any trailing slash
fn validate_url(raw: String) -> Result<String> {
    let parsed =
        url::Url::parse(&raw).map_err(|e| Error::Config(format!("invalid URL {raw:?}: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "unsupported URL scheme {:?} in {raw:?}",
            parsed.scheme()
        )));
    }

    Ok(raw.trim_end_matches('/').to_string())
}
