//! NDJSON stream creation for Ollama's streaming endpoints.
//!
//! Both `/api/generate` and `/api/chat` answer with one JSON object per line:
//! 1. Zero or more chunks carrying a text increment (`response` or
//!    `message.content`)
//! 2. A final chunk with `done: true` and timing/token statistics
//! 3. An `{"error": ...}` line may replace either of the above
//!
//! Network reads do not respect line boundaries, so bytes are buffered and
//! split on `\n` before parsing.

use futures_util::StreamExt;
use serde::Serialize;

use lamabridge_core::llm::backend::TokenStream;
use lamabridge_types::llm::{GenerationStats, LlmError, StreamEvent};

use super::types::{ErrorResponse, StreamChunk};

/// Create a streaming connection to an Ollama endpoint.
///
/// Returns a [`TokenStream`] that maps NDJSON chunks to backend-agnostic
/// [`StreamEvent`]s. The stream ends with exactly one `Done` on success; a
/// connection that closes before the final chunk is an error.
pub fn create_ollama_stream<B>(
    client: reqwest::Client,
    url: String,
    model: String,
    body: B,
) -> TokenStream
where
    B: Serialize + Send + Sync + 'static,
{
    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response, &model).await?;

        let mut bytes = response.bytes_stream();
        let mut decoder = LineDecoder::default();
        let mut finished = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;
            for line in decoder.push(&chunk) {
                for event in parse_line(&line)? {
                    finished |= matches!(event, StreamEvent::Done(_));
                    yield event;
                }
            }
            if finished {
                break;
            }
        }

        if !finished {
            if let Some(line) = decoder.finish() {
                for event in parse_line(&line)? {
                    finished |= matches!(event, StreamEvent::Done(_));
                    yield event;
                }
            }
        }

        if !finished {
            tracing::warn!(model = %model, "ollama stream closed before completion");
            Err::<(), LlmError>(LlmError::Stream(
                "connection closed before the final chunk".to_string(),
            ))?;
        }
    })
}

/// Parse one NDJSON line into zero, one or two events (text, then `Done`).
pub fn parse_line(line: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let chunk: StreamChunk =
        serde_json::from_str(line).map_err(|e| LlmError::Deserialization(e.to_string()))?;

    if let Some(message) = chunk.error {
        return Err(LlmError::Backend { message });
    }

    let mut events = Vec::with_capacity(2);
    let text = chunk
        .response
        .or_else(|| chunk.message.map(|m| m.content))
        .unwrap_or_default();
    if !text.is_empty() {
        events.push(StreamEvent::TextDelta { text });
    }
    if chunk.done {
        events.push(StreamEvent::Done(GenerationStats {
            prompt_tokens: chunk.prompt_eval_count,
            completion_tokens: chunk.eval_count,
            total_duration_ms: chunk.total_duration.map(|ns| ns / 1_000_000),
        }));
    }
    Ok(events)
}

/// Splits a byte stream into complete, non-empty lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Append bytes and return every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// The trailing line without a newline terminator, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Map a non-2xx response to an [`LlmError`], using Ollama's error body.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    if status == reqwest::StatusCode::NOT_FOUND {
        tracing::debug!(model = %model, %message, "ollama reports unknown model");
        return Err(LlmError::ModelNotFound(model.to_string()));
    }

    Err(LlmError::Backend {
        message: format!("{status}: {message}"),
    })
}

pub(crate) fn map_request_error(e: reqwest::Error) -> LlmError {
    if e.is_connect() || e.is_timeout() {
        LlmError::Unreachable(e.to_string())
    } else {
        LlmError::Backend {
            message: e.to_string(),
        }
    }
}
