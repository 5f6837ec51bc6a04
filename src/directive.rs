//! Response directive parsing
//!
//! The generation backend replies either with free text or with a single
//! structured command encoded as `PLAY_SONG::{"song": "...", "artist": "..."}`.
//! The marker prefix is the only discriminator; a reply that happens to start
//! with the marker is always treated as a command.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker prefix signalling a music request
pub const PLAY_SONG_PREFIX: &str = "PLAY_SONG::";

/// Song requested by a music directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    /// Song title
    pub song: String,

    /// Performing artist, if the backend named one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl NowPlaying {
    /// Human-readable confirmation spoken back to the user
    #[must_use]
    pub fn confirmation(&self) -> String {
        match self.artist() {
            Some(artist) => format!(
                "Of course. Opening YouTube to play \"{}\" by {artist}.",
                self.song
            ),
            None => format!("Of course. Opening YouTube to play \"{}\".", self.song),
        }
    }

    /// Artist, ignoring blank values
    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref().filter(|a| !a.trim().is_empty())
    }

    /// YouTube search URL for this song
    #[must_use]
    pub fn youtube_search_url(&self) -> String {
        let query = match self.artist() {
            Some(artist) => format!("{} {artist}", self.song),
            None => self.song.clone(),
        };
        format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(&query)
        )
    }
}

/// Classification of a backend response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Free text, shown and spoken verbatim
    PlainText(String),
    /// Music request
    PlayMusic(NowPlaying),
}

impl Directive {
    /// Text to append to the conversation and speak
    #[must_use]
    pub fn reply_text(&self) -> String {
        match self {
            Self::PlainText(content) => content.clone(),
            Self::PlayMusic(track) => track.confirmation(),
        }
    }
}

/// Malformed music directive payload
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// Payload after the marker is not valid JSON of the expected shape
    #[error("invalid music payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Payload parsed but named no song
    #[error("music payload has an empty song title")]
    EmptySong,
}

/// Classify a backend response
///
/// # Errors
///
/// Returns [`DirectiveError`] if the response carries the music marker but its
/// payload cannot be parsed
pub fn parse(response: &str) -> Result<Directive, DirectiveError> {
    let Some(payload) = response.strip_prefix(PLAY_SONG_PREFIX) else {
        return Ok(Directive::PlainText(response.to_string()));
    };

    let track: NowPlaying = serde_json::from_str(payload.trim())?;
    if track.song.trim().is_empty() {
        return Err(DirectiveError::EmptySong);
    }

    tracing::debug!(song = %track.song, artist = ?track.artist, "music directive parsed");
    Ok(Directive::PlayMusic(track))
}
