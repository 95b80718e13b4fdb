//! Model registry: configured entries, loaded tokenizers, and resolution of
//! a full backend model name into a typed [`ResolvedModel`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lamabridge_types::error::ChatError;
use lamabridge_types::model::{
    DEFAULT_CONTEXT_LIMIT, ModelConfig, ModelInfo, ModelsConfig, ThinkingMarkers, split_model_name,
};
use tracing::debug;

use crate::tokens::{ChatTemplate, Tokenizer};

/// Everything a request needs to know about its model, resolved once.
#[derive(Clone)]
pub struct ResolvedModel {
    pub full_name: String,
    pub config: ModelConfig,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    pub context_limit: u32,
}

impl ResolvedModel {
    pub fn new(
        full_name: impl Into<String>,
        config: ModelConfig,
        tokenizer: Option<Arc<dyn Tokenizer>>,
        context_limit: u32,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            config,
            tokenizer,
            context_limit,
        }
    }

    pub fn tokenizer(&self) -> Option<&dyn Tokenizer> {
        self.tokenizer.as_deref()
    }

    /// The chat template, when the tokenizer carries one.
    pub fn chat_template(&self) -> Option<&ChatTemplate> {
        self.tokenizer.as_deref().and_then(|t| t.chat_template())
    }

    pub fn thinking_markers(&self) -> Option<ThinkingMarkers> {
        self.config.thinking_markers()
    }
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("full_name", &self.full_name)
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer.is_some())
            .field("context_limit", &self.context_limit)
            .finish()
    }
}

/// Configured models plus the tokenizers loaded for them at startup.
pub struct ModelRegistry {
    models: ModelsConfig,
    /// Keyed by config entry key, shared by every request.
    tokenizers: HashMap<String, Arc<dyn Tokenizer>>,
}

impl ModelRegistry {
    pub fn new(models: ModelsConfig) -> Self {
        Self {
            models,
            tokenizers: HashMap::new(),
        }
    }

    /// Attach a loaded tokenizer to the config entry `key`.
    pub fn with_tokenizer(mut self, key: impl Into<String>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizers.insert(key.into(), tokenizer);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.models.default_model
    }

    pub fn models(&self) -> &ModelsConfig {
        &self.models
    }

    /// The config entry matching a full backend model name.
    pub fn config_for(&self, full_name: &str) -> Option<(&str, &ModelConfig)> {
        self.models.config_for(full_name)
    }

    /// Whether the backend lists `full_name`. A name without a tag also
    /// matches `name:latest`.
    pub fn is_listed(full_name: &str, available: &[ModelInfo]) -> bool {
        Self::listing(full_name, available).is_some()
    }

    /// The backend entry serving `full_name`: an exact match, else
    /// `name:latest` for an untagged name.
    fn listing<'a>(full_name: &str, available: &'a [ModelInfo]) -> Option<&'a ModelInfo> {
        let (name, tag) = split_model_name(full_name)?;
        available
            .iter()
            .find(|m| m.full_name == full_name)
            .or_else(|| {
                available.iter().find(|m| {
                    tag.is_none() && m.name == name && m.tag.as_deref() == Some("latest")
                })
            })
    }

    /// Resolve a model for a request.
    ///
    /// Fails with `ModelUnavailable` when no config entry matches or the
    /// backend does not list the model. The context limit is the configured
    /// override, else the backend-reported length, else 2048.
    pub fn resolve(&self, full_name: &str, available: &[ModelInfo]) -> Result<ResolvedModel, ChatError> {
        let unavailable = || ChatError::ModelUnavailable {
            model: full_name.to_string(),
        };
        let listing = Self::listing(full_name, available).ok_or_else(unavailable)?;
        let (key, config) = self.config_for(full_name).ok_or_else(unavailable)?;

        let reported = listing.context_length;
        let context_limit = config
            .context_limit
            .or(reported)
            .unwrap_or(DEFAULT_CONTEXT_LIMIT);

        debug!(model = %full_name, entry = %key, context_limit, "Model resolved");
        Ok(ResolvedModel::new(
            full_name,
            config.clone(),
            self.tokenizers.get(key).cloned(),
            context_limit,
        ))
    }

    /// Resolve from configuration alone, without asking the backend.
    ///
    /// Used for estimates (session size) when the backend is unreachable.
    pub fn resolve_configured(&self, full_name: &str) -> Option<ResolvedModel> {
        let (key, config) = self.config_for(full_name)?;
        Some(ResolvedModel::new(
            full_name,
            config.clone(),
            self.tokenizers.get(key).cloned(),
            config.context_limit.unwrap_or(DEFAULT_CONTEXT_LIMIT),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lamabridge_types::error::TokenizerError;

    use super::*;

    struct NullTokenizer;

    impl Tokenizer for NullTokenizer {
        fn count(&self, _text: &str) -> Result<usize, TokenizerError> {
            Ok(0)
        }

        fn chat_template(&self) -> Option<&ChatTemplate> {
            None
        }
    }

    fn info(full_name: &str, context_length: Option<u32>) -> ModelInfo {
        let (name, tag) = split_model_name(full_name).unwrap();
        ModelInfo {
            full_name: full_name.to_string(),
            name: name.to_string(),
            tag: tag.map(str::to_string),
            size: "1.0 GB".to_string(),
            parameter_size: None,
            quantization: None,
            context_length,
        }
    }

    fn registry() -> ModelRegistry {
        let mut entries = BTreeMap::new();
        entries.insert(
            "qwen3".to_string(),
            ModelConfig {
                tokenizer: Some("Qwen/Qwen3-8B".to_string()),
                ..Default::default()
            },
        );
        entries.insert(
            "llama3".to_string(),
            ModelConfig {
                context_limit: Some(4096),
                ..Default::default()
            },
        );
        ModelRegistry::new(ModelsConfig {
            default_model: "qwen3:8b".to_string(),
            entries,
        })
        .with_tokenizer("qwen3", Arc::new(NullTokenizer))
    }

    #[test]
    fn test_resolve_uses_reported_context_length() {
        let available = vec![info("qwen3:8b", Some(40960))];
        let model = registry().resolve("qwen3:8b", &available).unwrap();
        assert_eq!(model.context_limit, 40960);
        assert!(model.tokenizer().is_some());
    }

    #[test]
    fn test_resolve_config_override_wins() {
        let available = vec![info("llama3:8b", Some(8192))];
        let model = registry().resolve("llama3:8b", &available).unwrap();
        assert_eq!(model.context_limit, 4096);
        assert!(model.tokenizer().is_none());
    }

    #[test]
    fn test_resolve_defaults_context_length() {
        let available = vec![info("qwen3:8b", None)];
        let model = registry().resolve("qwen3:8b", &available).unwrap();
        assert_eq!(model.context_limit, DEFAULT_CONTEXT_LIMIT);
    }

    #[test]
    fn test_resolve_unlisted_model_is_unavailable() {
        let available = vec![info("qwen3:8b", None)];
        let err = registry().resolve("qwen3:14b", &available).unwrap_err();
        assert!(matches!(err, ChatError::ModelUnavailable { model } if model == "qwen3:14b"));
    }

    #[test]
    fn test_resolve_unconfigured_model_is_unavailable() {
        let available = vec![info("mistral:7b", None)];
        assert!(registry().resolve("mistral:7b", &available).is_err());
    }

    #[test]
    fn test_untagged_name_matches_latest() {
        let available = vec![info("llama3:latest", None)];
        assert!(ModelRegistry::is_listed("llama3", &available));
        assert!(!ModelRegistry::is_listed("llama3:8b", &available));
    }

    #[test]
    fn test_untagged_name_takes_latest_context_length() {
        let available = vec![info("qwen3:8b", Some(32768)), info("qwen3:latest", Some(4096))];
        let model = registry().resolve("qwen3", &available).unwrap();
        assert_eq!(model.context_limit, 4096);
    }

    #[test]
    fn test_untagged_name_without_latest_is_unavailable() {
        let available = vec![info("qwen3:8b", Some(32768))];
        assert!(registry().resolve("qwen3", &available).is_err());
    }

    #[test]
    fn test_resolve_configured_skips_backend() {
        let model = registry().resolve_configured("llama3:70b").unwrap();
        assert_eq!(model.context_limit, 4096);
        assert!(registry().resolve_configured("phi3").is_none());
    }
}
