//! Ollama HTTP API types.
//!
//! Ollama-specific request/response structures. They are NOT the generic
//! generation types from lamabridge-types, which are backend-agnostic.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Skip Ollama's own templating; the prompt is already rendered.
    pub raw: bool,
    pub stream: bool,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
}

/// A single message in an Ollama chat request or response chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// One NDJSON line of a streamed `/api/generate` or `/api/chat` response.
///
/// `/api/generate` fills `response`, `/api/chat` fills `message`. Timing
/// fields only appear on the final (`done: true`) line.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
    /// Nanoseconds.
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// Response of `GET /api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

/// A locally available model as listed by `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub details: Option<TagModelDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagModelDetails {
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

/// Request body for `POST /api/show`.
#[derive(Debug, Clone, Serialize)]
pub struct ShowRequest {
    pub model: String,
}

/// The part of the `/api/show` response lamabridge reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ShowResponse {
    #[serde(default)]
    pub model_info: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ShowResponse {
    /// The context length from the first `*.context_length` model-info key
    /// (the prefix is the architecture, e.g. `qwen3.context_length`).
    pub fn context_length(&self) -> Option<u32> {
        self.model_info
            .as_ref()?
            .iter()
            .find(|(key, _)| key.ends_with("context_length"))
            .and_then(|(_, value)| value.as_u64())
            .and_then(|value| u32::try_from(value).ok())
    }
}

/// Error body Ollama returns with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_is_raw_and_streaming() {
        let request = GenerateRequest {
            model: "qwen3:8b".to_string(),
            prompt: "<|im_start|>user\nhi".to_string(),
            raw: true,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["raw"], true);
        assert_eq!(json["stream"], true);
        assert_eq!(json["model"], "qwen3:8b");
    }

    #[test]
    fn test_show_response_context_length() {
        let show: ShowResponse = serde_json::from_str(
            r#"{"model_info": {"general.architecture": "qwen3", "qwen3.context_length": 40960}}"#,
        )
        .unwrap();
        assert_eq!(show.context_length(), Some(40960));
    }

    #[test]
    fn test_show_response_without_context_length() {
        let show: ShowResponse = serde_json::from_str(r#"{"model_info": {"a.b": 1}}"#).unwrap();
        assert_eq!(show.context_length(), None);

        let show: ShowResponse = serde_json::from_str(r#"{"license": "MIT"}"#).unwrap();
        assert_eq!(show.context_length(), None);
    }

    #[test]
    fn test_tags_response_parses_details() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models": [{"name": "qwen3:8b", "size": 5225387923,
                "details": {"parameter_size": "8.2B", "quantization_level": "Q4_K_M"}}]}"#,
        )
        .unwrap();
        let model = &tags.models[0];
        assert_eq!(model.name, "qwen3:8b");
        let details = model.details.as_ref().unwrap();
        assert_eq!(details.parameter_size.as_deref(), Some("8.2B"));
        assert_eq!(details.quantization_level.as_deref(), Some("Q4_K_M"));
    }
}
