//! Terminal adapters for the chat platform ports.
//!
//! `TerminalSink` prints each outbound message once and then only the text an
//! edit appends, so a streamed reply reads as continuous output.
//! `TerminalChannel` remembers the throwaway conversation so the temporary
//! session has history, the way a chat channel would.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use chrono::Utc;

use lamabridge_core::chat::history::ChannelHistory;
use lamabridge_core::render::MessageSink;
use lamabridge_types::chat::ChannelMessage;
use lamabridge_types::platform::{DeliveryError, MessageHandle, ReplyTarget};

pub const TERMINAL_CHANNEL_ID: &str = "terminal";

struct SinkState<W> {
    out: W,
    /// Content last printed per message id.
    printed: HashMap<String, String>,
    next_id: u64,
}

/// Message sink writing to a terminal (or any writer).
pub struct TerminalSink<W: Write + Send> {
    state: Mutex<SinkState<W>>,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(SinkState {
                out,
                printed: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Recover the writer (used by tests).
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.out,
            Err(poisoned) => poisoned.into_inner().out,
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut SinkState<W>) -> std::io::Result<T>,
    ) -> Result<T, DeliveryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DeliveryError::Transport("terminal writer poisoned".to_string()))?;
        f(&mut state).map_err(|e| DeliveryError::Transport(e.to_string()))
    }
}

impl<W: Write + Send> MessageSink for TerminalSink<W> {
    async fn send(&self, target: &ReplyTarget, content: &str) -> Result<MessageHandle, DeliveryError> {
        let id = self.with_state(|state| {
            state.next_id += 1;
            let id = state.next_id.to_string();
            state.out.write_all(content.as_bytes())?;
            state.out.flush()?;
            state.printed.insert(id.clone(), content.to_string());
            Ok(id)
        })?;

        Ok(MessageHandle {
            channel_id: target.channel_id.clone(),
            message_id: id,
        })
    }

    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<(), DeliveryError> {
        let known = self.with_state(|state| {
            let Some(printed) = state.printed.get(&handle.message_id) else {
                return Ok(false);
            };
            if let Some(suffix) = content.strip_prefix(printed.as_str()) {
                state.out.write_all(suffix.as_bytes())?;
            } else {
                // Rewritten rather than extended: print it again in full.
                state.out.write_all(b"\n")?;
                state.out.write_all(content.as_bytes())?;
            }
            state.out.flush()?;
            state.printed.insert(handle.message_id.clone(), content.to_string());
            Ok(true)
        })?;

        if known {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: 404,
                message: format!("unknown message {}", handle.message_id),
            })
        }
    }
}

/// In-memory channel for the terminal's throwaway conversation.
#[derive(Default)]
pub struct TerminalChannel {
    messages: Mutex<Vec<ChannelMessage>>,
}

impl TerminalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line of the conversation.
    pub fn record(&self, author_id: u64, author_name: &str, from_self: bool, content: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            let id = (messages.len() + 1).to_string();
            messages.push(ChannelMessage {
                id,
                author_id,
                author_name: author_name.to_string(),
                from_self,
                content: content.to_string(),
                mentions: Vec::new(),
                created_at: Utc::now(),
            });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

impl ChannelHistory for TerminalChannel {
    async fn recent_messages(
        &self,
        _channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, DeliveryError> {
        let messages = self
            .messages
            .lock()
            .map_err(|_| DeliveryError::Transport("terminal history poisoned".to_string()))?;
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ReplyTarget {
        ReplyTarget {
            channel_id: TERMINAL_CHANNEL_ID.to_string(),
            message_id: None,
        }
    }

    #[tokio::test]
    async fn test_edits_print_only_the_appended_suffix() {
        let sink = TerminalSink::new(Vec::new());
        let handle = sink.send(&target(), "Hel").await.unwrap();
        sink.edit(&handle, "Hello").await.unwrap();
        sink.edit(&handle, "Hello, world").await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "Hello, world");
    }

    #[tokio::test]
    async fn test_consecutive_messages_print_back_to_back() {
        let sink = TerminalSink::new(Vec::new());
        let first = sink.send(&target(), "abc").await.unwrap();
        let second = sink.send(&target(), "d").await.unwrap();
        sink.edit(&second, "def").await.unwrap();

        assert_ne!(first.message_id, second.message_id);
        assert_eq!(first.channel_id, TERMINAL_CHANNEL_ID);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "abcdef");
    }

    #[tokio::test]
    async fn test_non_extending_edit_reprints() {
        let sink = TerminalSink::new(Vec::new());
        let handle = sink.send(&target(), "draft").await.unwrap();
        sink.edit(&handle, "final").await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "draft\nfinal");
    }

    #[tokio::test]
    async fn test_edit_handles_multibyte_text() {
        let sink = TerminalSink::new(Vec::new());
        let handle = sink.send(&target(), "héllo").await.unwrap();
        sink.edit(&handle, "héllo wörld").await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "héllo wörld");
    }

    #[tokio::test]
    async fn test_edit_unknown_message_is_rejected() {
        let sink = TerminalSink::new(Vec::new());
        let handle = MessageHandle {
            channel_id: TERMINAL_CHANNEL_ID.to_string(),
            message_id: "99".to_string(),
        };
        let err = sink.edit(&handle, "x").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_channel_returns_newest_first_with_limit() {
        let channel = TerminalChannel::new();
        channel.record(7, "alice", false, "one");
        channel.record(0, "bot", true, "two");
        channel.record(7, "alice", false, "three");

        let recent = channel.recent_messages(TERMINAL_CHANNEL_ID, 2).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "two"]);
        assert!(recent[1].from_self);

        channel.clear();
        assert!(channel.recent_messages(TERMINAL_CHANNEL_ID, 10).await.unwrap().is_empty());
    }
}
