//! BoxGenerationBackend -- object-safe dynamic dispatch wrapper for GenerationBackend.
//!
//! 1. Define an object-safe `GenerationBackendDyn` trait with boxed futures
//! 2. Blanket-impl `GenerationBackendDyn` for all `T: GenerationBackend`
//! 3. `BoxGenerationBackend` wraps `Box<dyn GenerationBackendDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use lamabridge_types::llm::{GenerationRequest, LlmError};
use lamabridge_types::model::ModelInfo;

use super::backend::{GenerationBackend, TokenStream};

/// Object-safe version of [`GenerationBackend`] with boxed futures.
pub trait GenerationBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn stream_boxed(&self, request: GenerationRequest) -> TokenStream;

    fn list_models_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send + 'a>>;
}

impl<T: GenerationBackend> GenerationBackendDyn for T {
    fn name(&self) -> &str {
        GenerationBackend::name(self)
    }

    fn stream_boxed(&self, request: GenerationRequest) -> TokenStream {
        self.stream(request)
    }

    fn list_models_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send + 'a>> {
        Box::pin(self.list_models())
    }
}

/// Type-erased generation backend.
///
/// Since `GenerationBackend` uses RPITIT, it cannot be used as a trait
/// object directly. `BoxGenerationBackend` provides equivalent methods that
/// delegate to the inner `GenerationBackendDyn` trait object.
pub struct BoxGenerationBackend {
    inner: Box<dyn GenerationBackendDyn + Send + Sync>,
}

impl BoxGenerationBackend {
    /// Wrap a concrete `GenerationBackend` in a type-erased box.
    pub fn new<T: GenerationBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Open a token stream for a request.
    pub fn stream(&self, request: GenerationRequest) -> TokenStream {
        self.inner.stream_boxed(request)
    }

    /// List the models the server can run.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.inner.list_models_boxed().await
    }
}
