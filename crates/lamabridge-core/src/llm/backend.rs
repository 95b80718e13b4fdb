//! GenerationBackend trait definition.
//!
//! This is the abstraction every model server adapter implements.
//! Uses RPITIT for `list_models`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxGenerationBackend wrapper).

use std::pin::Pin;

use futures_util::Stream;

use lamabridge_types::llm::{GenerationRequest, LlmError, StreamEvent};
use lamabridge_types::model::ModelInfo;

/// A boxed stream of generation events.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for model server backends (Ollama).
///
/// Implementations live in lamabridge-infra (e.g., `OllamaBackend`).
pub trait GenerationBackend: Send + Sync {
    /// Human-readable backend name (e.g., "ollama").
    fn name(&self) -> &str;

    /// Open a token stream for a request.
    ///
    /// A `GenerationInput::Prompt` is sent verbatim (no server-side
    /// templating); `GenerationInput::Messages` lets the server apply the
    /// model's own template.
    fn stream(&self, request: GenerationRequest) -> TokenStream;

    /// List the models the server can run, with their context lengths when
    /// the server reports them.
    fn list_models(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send;
}
