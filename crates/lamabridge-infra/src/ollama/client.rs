//! OllamaBackend -- concrete [`GenerationBackend`] implementation for Ollama.
//!
//! Rendered prompts go to `/api/generate` in raw mode so the server applies
//! no template of its own; message lists go to `/api/chat`. Model listing
//! combines `/api/tags` with one `/api/show` call per model for its context
//! length.

use std::time::Duration;

use futures_util::future::join_all;

use lamabridge_core::llm::backend::{GenerationBackend, TokenStream};
use lamabridge_types::llm::{GenerationInput, GenerationRequest, LlmError, PromptMessage};
use lamabridge_types::model::{human_size, split_model_name, ModelInfo};

use super::streaming::{check_status, create_ollama_stream, map_request_error};
use super::types::{
    ChatRequest, GenerateRequest, OllamaMessage, ShowRequest, ShowResponse, TagModel, TagsResponse,
};

/// Ollama generation backend.
///
/// No overall request timeout is set on the HTTP client: generations can
/// run for minutes and the stream renderer enforces its own deadline.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    /// Create a backend talking to the Ollama server at `base_url`
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Backend {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch `/api/show` for one model.
    async fn show(&self, model: &str) -> Result<ShowResponse, LlmError> {
        let response = self
            .client
            .post(self.url("/api/show"))
            .json(&ShowRequest {
                model: model.to_string(),
            })
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response, model).await?;

        response
            .json::<ShowResponse>()
            .await
            .map_err(|e| LlmError::Deserialization(e.to_string()))
    }
}

impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn stream(&self, request: GenerationRequest) -> TokenStream {
        let GenerationRequest { model, input } = request;

        match input {
            GenerationInput::Prompt { prompt } => {
                let body = GenerateRequest {
                    model: model.clone(),
                    prompt,
                    raw: true,
                    stream: true,
                };
                create_ollama_stream(self.client.clone(), self.url("/api/generate"), model, body)
            }
            GenerationInput::Messages { messages } => {
                let body = ChatRequest {
                    model: model.clone(),
                    messages: messages.iter().map(to_ollama_message).collect(),
                    stream: true,
                };
                create_ollama_stream(self.client.clone(), self.url("/api/chat"), model, body)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response, "").await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;

        let shows = join_all(tags.models.iter().map(|m| self.show(&m.name))).await;

        let models = tags
            .models
            .into_iter()
            .zip(shows)
            .map(|(tag, show)| {
                let context_length = match show {
                    Ok(show) => show.context_length(),
                    Err(e) => {
                        tracing::warn!(model = %tag.name, error = %e, "could not read model details");
                        None
                    }
                };
                model_info(tag, context_length)
            })
            .collect();

        Ok(models)
    }
}

fn to_ollama_message(message: &PromptMessage) -> OllamaMessage {
    OllamaMessage {
        role: message.role.to_string(),
        content: message.content.clone(),
    }
}

fn model_info(tag: TagModel, context_length: Option<u32>) -> ModelInfo {
    let (name, model_tag) = match split_model_name(&tag.name) {
        Some((name, model_tag)) => (name.to_string(), model_tag.map(str::to_string)),
        None => (tag.name.clone(), None),
    };
    let details = tag.details.unwrap_or_default();

    ModelInfo {
        full_name: tag.name,
        name,
        tag: model_tag,
        size: human_size(tag.size),
        parameter_size: details.parameter_size,
        quantization: details.quantization_level,
        context_length,
    }
}
