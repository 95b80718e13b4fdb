//! Stream renderer: consumes a token stream and mirrors it into chat
//! messages.
//!
//! Increments are applied in arrival order: first through the thinking
//! filter, then onto the buffer of the current outbound message. The
//! current message is edited at most once per edit interval with whatever
//! the buffer holds at that moment. Whenever the buffer grows past the
//! platform's character limit, the first `limit` characters are frozen into
//! the current message and the remainder continues in a new message sent as
//! a reply to the same user message.
//!
//! Concatenating the delivered messages reproduces the rendered text, except
//! that a remainder consisting only of whitespace never opens a new message
//! (Discord rejects blank messages). Such trailing whitespace is missing from
//! both the channel and `RenderOutcome::display_text`.

use std::time::Duration;

use futures_util::StreamExt;
use lamabridge_types::config::{BotConfig, ThinkingDisplay};
use lamabridge_types::error::ChatError;
use lamabridge_types::llm::{GenerationStats, StreamEvent};
use lamabridge_types::model::ThinkingMarkers;
use lamabridge_types::platform::{DeliveryError, MessageHandle, ReplyTarget};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::llm::backend::TokenStream;
use crate::render::sink::MessageSink;
use crate::render::thinking::ThinkingFilter;

/// Deadline used when the configured timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Sent when a generation completes without any displayable text.
pub const EMPTY_REPLY_NOTICE: &str = "*(the model returned an empty reply)*";

/// Limits and timing applied while rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderPolicy {
    /// Maximum characters (Unicode scalar values) per outbound message.
    pub char_limit: usize,
    /// Minimum interval between edits of one message.
    pub edit_interval: Duration,
    /// Upper bound on the whole generation.
    pub timeout: Duration,
    pub thinking_display: ThinkingDisplay,
}

impl RenderPolicy {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            char_limit: bot.message_char_limit,
            edit_interval: Duration::from_secs_f64(bot.edit_delay_seconds),
            timeout: Duration::from_secs(bot.generation_timeout_seconds),
            thinking_display: bot.thinking_display,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Accumulating,
    /// Transient, while an oversized buffer is being split.
    EmittingNewSegment,
    Done,
    Failed,
    Cancelled,
}

/// What a completed render produced.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// Unfiltered model output, thinking segments included.
    pub raw_text: String,
    /// Concatenation of all delivered message contents.
    pub display_text: String,
    /// Delivered messages, in order.
    pub messages: Vec<MessageHandle>,
    /// Total edits issued across all messages.
    pub edits: usize,
    pub stats: Option<GenerationStats>,
}

/// Renders one generation into one or more outbound messages.
pub struct StreamRenderer<'a, S: MessageSink> {
    sink: &'a S,
    target: ReplyTarget,
    policy: RenderPolicy,
    filter: ThinkingFilter,
    state: RenderState,
    raw_text: String,
    /// Messages that reached the limit and will not change again.
    frozen: Vec<(MessageHandle, String)>,
    current: Option<MessageHandle>,
    /// Content the current message displays right now.
    shown: String,
    /// Content the current message should display.
    buffer: String,
    edits: usize,
    last_flush: Option<Instant>,
}

impl<'a, S: MessageSink> StreamRenderer<'a, S> {
    pub fn new(
        sink: &'a S,
        target: ReplyTarget,
        policy: RenderPolicy,
        markers: Option<ThinkingMarkers>,
    ) -> Self {
        Self {
            sink,
            target,
            policy,
            filter: ThinkingFilter::new(markers, policy.thinking_display),
            state: RenderState::Accumulating,
            raw_text: String::new(),
            frozen: Vec::new(),
            current: None,
            shown: String::new(),
            buffer: String::new(),
            edits: 0,
            last_flush: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Consume the stream to completion, failure, timeout or cancellation.
    ///
    /// On upstream failure or timeout, whatever accumulated is flushed before
    /// `GenerationFailure` is returned. On cancellation nothing more is sent.
    pub async fn run(
        &mut self,
        mut stream: TokenStream,
        cancel: &CancellationToken,
    ) -> Result<RenderOutcome, ChatError> {
        let start = Instant::now();
        let deadline = start
            .checked_add(self.policy.timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut stats = None;

        loop {
            let next_edit = self.last_flush.unwrap_or(start) + self.policy.edit_interval;
            let dirty = self.is_dirty();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.state = RenderState::Cancelled;
                    debug!(delivered = self.frozen.len(), "Rendering cancelled");
                    return Err(ChatError::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    let reason = format!(
                        "no completion within {} seconds",
                        self.policy.timeout.as_secs()
                    );
                    return Err(self.fail(reason).await);
                }
                _ = sleep_until(next_edit), if dirty => {
                    self.flush().await?;
                }
                item = stream.next() => match item {
                    Some(Ok(StreamEvent::TextDelta { text })) => self.apply(&text).await?,
                    Some(Ok(StreamEvent::Done(done))) => {
                        stats = Some(done);
                        break;
                    }
                    Some(Err(e)) => return Err(self.fail(e.to_string()).await),
                    None => break,
                }
            }
        }

        let tail = self.filter.finish();
        self.buffer.push_str(&tail);
        self.flush().await?;

        if self.frozen.is_empty() && self.current.is_none() {
            debug!("Nothing displayable was generated, sending notice");
            self.buffer.push_str(EMPTY_REPLY_NOTICE);
            self.flush().await?;
        }

        self.state = RenderState::Done;
        Ok(self.outcome(stats))
    }

    async fn apply(&mut self, text: &str) -> Result<(), ChatError> {
        self.raw_text.push_str(text);
        let display = self.filter.push(text);
        if display.is_empty() {
            return Ok(());
        }
        self.buffer.push_str(&display);
        if self.buffer.chars().count() > self.policy.char_limit {
            self.flush().await?;
        }
        Ok(())
    }

    /// Split off full messages, then bring the current message up to date.
    async fn flush(&mut self) -> Result<(), ChatError> {
        while let Some(split_at) = byte_offset_of_char(&self.buffer, self.policy.char_limit) {
            self.state = RenderState::EmittingNewSegment;
            let rest = self.buffer.split_off(split_at);
            self.write_current().await?;
            let content = std::mem::replace(&mut self.buffer, rest);
            if let Some(handle) = self.current.take() {
                self.frozen.push((handle, content));
            }
            self.shown.clear();
        }
        self.state = RenderState::Accumulating;

        if self.is_dirty() {
            self.write_current().await?;
        }
        self.last_flush = Some(Instant::now());
        Ok(())
    }

    async fn write_current(&mut self) -> Result<(), ChatError> {
        let result = match &self.current {
            None => self.sink.send(&self.target, &self.buffer).await.map(Some),
            Some(_) if self.buffer == self.shown => return Ok(()),
            Some(handle) => self.sink.edit(handle, &self.buffer).await.map(|()| None),
        };
        match result {
            Ok(Some(handle)) => self.current = Some(handle),
            Ok(None) => self.edits += 1,
            Err(e) => return Err(self.delivery_failed(e)),
        }
        self.shown.clone_from(&self.buffer);
        Ok(())
    }

    /// Whether the current message lags behind the buffer. A new message is
    /// not started for whitespace alone.
    fn is_dirty(&self) -> bool {
        match self.current {
            None => !self.buffer.trim().is_empty(),
            Some(_) => self.buffer != self.shown,
        }
    }

    async fn fail(&mut self, reason: String) -> ChatError {
        let tail = self.filter.finish();
        self.buffer.push_str(&tail);
        if let Err(e) = self.flush().await {
            return e;
        }
        self.state = RenderState::Failed;
        warn!(error = %reason, raw_len = self.raw_text.len(), "Generation failed mid-stream");
        ChatError::GenerationFailure(reason)
    }

    fn delivery_failed(&mut self, error: DeliveryError) -> ChatError {
        self.state = RenderState::Failed;
        let mut transcript: String = self.frozen.iter().map(|(_, c)| c.as_str()).collect();
        transcript.push_str(&self.buffer);
        warn!(error = %error, "Message delivery failed");
        ChatError::DeliveryFailure {
            message: error.to_string(),
            transcript,
        }
    }

    fn outcome(&self, stats: Option<GenerationStats>) -> RenderOutcome {
        let mut display_text: String = self.frozen.iter().map(|(_, c)| c.as_str()).collect();
        let mut messages: Vec<MessageHandle> = self.frozen.iter().map(|(h, _)| h.clone()).collect();
        if let Some(handle) = &self.current {
            display_text.push_str(&self.shown);
            messages.push(handle.clone());
        }
        RenderOutcome {
            raw_text: self.raw_text.clone(),
            display_text,
            messages,
            edits: self.edits,
            stats,
        }
    }
}

/// Byte offset of the `n`-th character, or `None` if `text` has at most `n`
/// characters.
fn byte_offset_of_char(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(offset, _)| offset)
}
