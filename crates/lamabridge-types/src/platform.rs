//! Chat platform handles shared by the renderer and the platform adapters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a message the bot has sent, so it can be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: String,
    pub message_id: String,
}

/// Where a reply goes: the channel and the user message it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel_id: String,
    /// The triggering user message; new chunks are sent as replies to it.
    pub message_id: Option<String>,
}

/// Errors from a message sink after its own retry policy is exhausted.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("rate limited by platform (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("platform rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}
