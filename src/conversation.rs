//! Conversation history
//!
//! An append-only log of the messages exchanged during the current session.
//! Ordering is append order; message ids exist only for keying.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Greeting the assistant opens every session with
pub const DEFAULT_GREETING: &str = "Greetings. I am J.A.R.V.I.S. How may I assist you today?";

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the assistant
    User,
    /// The assistant
    Assistant,
    /// System notices
    System,
}

impl Role {
    /// Wire name of the role (as used by chat-completion APIs)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable conversation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh id
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Unique rendering key
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Who authored the message
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Message text
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, append-only message log for the active session
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Create a store seeded with an assistant greeting
    #[must_use]
    pub fn with_greeting(greeting: &str) -> Self {
        let mut store = Self::new();
        if !greeting.trim().is_empty() {
            store.append(Message::assistant(greeting));
        }
        store
    }

    /// Append a message, returning a reference to the stored entry
    pub fn append(&mut self, message: Message) -> &Message {
        tracing::debug!(
            id = %message.id,
            role = %message.role,
            len = message.content.len(),
            "message appended"
        );
        self.messages.push(message);
        // Just pushed, so the log is non-empty
        &self.messages[self.messages.len() - 1]
    }

    /// All messages in append order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages appended at or after `index`
    #[must_use]
    pub fn since(&self, index: usize) -> &[Message] {
        self.messages.get(index..).unwrap_or_default()
    }
}
