//! Chat session and message types for lamabridge.
//!
//! A session is identified by its owner and a name. The `global` name is
//! reserved: it never refers to a stored row, it stands for the temporary
//! session rebuilt from recent channel history on every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Reserved session name for the shared, per-channel temporary session.
pub const GLOBAL_SESSION_NAME: &str = "global";

/// Identity of a session: (owner user id, session name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub owner_id: u64,
    pub name: String,
}

impl SessionKey {
    pub fn new(owner_id: u64, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            name: name.into(),
        }
    }

    /// Whether this key names the reserved global session.
    pub fn is_global(&self) -> bool {
        self.name == GLOBAL_SESSION_NAME
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.name)
    }
}

/// The persisted row for a private session (without its messages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: SessionKey,
    /// Full model name as known to the backend (e.g. `qwen3:8b`).
    pub model: String,
    /// Overrides the configured default system prompt when set.
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single stored (or synthesized) chat message.
///
/// Immutable once stored. Ordering within a session is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub sender_id: u64,
    /// Display name of the sender; only used for user turns.
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message stamped with the current time.
    pub fn user(sender_id: u64, sender_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::User,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create an assistant (bot) message stamped with the current time.
    pub fn assistant(bot_id: u64, bot_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::Assistant,
            sender_id: bot_id,
            sender_name: bot_name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A user referenced by a platform mention (`<@id>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: u64,
    pub name: String,
}

/// A raw message read back from a chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub author_id: u64,
    pub author_name: String,
    /// True when the message was written by this bot.
    pub from_self: bool,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    pub created_at: DateTime<Utc>,
}

/// Size report for a session (`session_size` command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSize {
    pub messages: u32,
    pub estimated_tokens: usize,
    pub context_limit: u32,
}
