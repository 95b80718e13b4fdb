//! Generation request/response types for lamabridge.
//!
//! These types model the data shapes for model-server interactions:
//! prompt and chat requests, streaming events, and error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single role-tagged message as handed to the model server.
///
/// `content` already carries the sender-name prefix for user turns;
/// `name` is kept alongside for backends and logs that want it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            name: None,
            content: content.into(),
        }
    }
}

/// The two request shapes the model server accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationInput {
    /// A fully rendered prompt string (chat template already applied).
    Prompt { prompt: String },
    /// A role-tagged message list; the server applies its own template.
    Messages { messages: Vec<PromptMessage> },
}

/// Request to the model server for a streamed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub input: GenerationInput,
}

/// Timing and token statistics reported at the end of a generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_duration_ms: Option<u64>,
}

/// Events emitted during a streaming generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text increment, in arrival order.
    TextDelta { text: String },

    /// The stream has completed.
    Done(GenerationStats),
}

/// Errors from model-server operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("backend error: {message}")]
    Backend { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_parse_is_case_insensitive() {
        assert_eq!("Assistant".parse::<MessageRole>().unwrap(), MessageRole::Assistant);
        assert_eq!("user".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert!("bot".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_prompt_message_skips_missing_name() {
        let json = serde_json::to_value(PromptMessage::system("be nice")).unwrap();
        assert_eq!(json["role"], "system");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_stream_event_tagging() {
        let event = StreamEvent::TextDelta {
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["text"], "hi");
    }
}
