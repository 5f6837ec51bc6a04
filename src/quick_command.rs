//! Quick commands: fixed shorthands for canned prompts

use std::fmt;
use std::str::FromStr;

/// A quick command key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuickCommand {
    /// Current weather
    Weather,
    /// News headlines
    News,
    /// Some music
    Music,
    /// Settings panel
    Settings,
}

impl QuickCommand {
    /// Every command, in display order
    pub const ALL: [Self; 4] = [Self::Weather, Self::News, Self::Music, Self::Settings];

    /// Command key as typed
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::News => "news",
            Self::Music => "music",
            Self::Settings => "settings",
        }
    }

    /// Prompt sent on the user's behalf
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Weather => "What is the current weather?",
            Self::News => "Give me the latest news headlines.",
            Self::Music => "Play some upbeat electronic music",
            Self::Settings => "Open settings panel.",
        }
    }
}

impl fmt::Display for QuickCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Key did not name a quick command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quick command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for QuickCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}
