use thiserror::Error;

/// Errors from repository operations (used by trait definitions in lamabridge-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised while validating a loaded configuration file.
///
/// A bad value is always an error; nothing is silently replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid bot prefix: must not be empty")]
    EmptyPrefix,

    #[error("invalid bot edit delay: {0} (must be a positive number of seconds)")]
    InvalidEditDelay(String),

    #[error("session database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid message character limit: must be greater than zero")]
    InvalidMessageLimit,

    #[error("model '{model}' has a thinking prefix but no thinking suffix")]
    MissingThinkingSuffix { model: String },

    #[error("model '{model}' has a thinking suffix but no thinking prefix")]
    MissingThinkingPrefix { model: String },

    #[error("default model '{0}' doesn't have a config section")]
    UnknownDefaultModel(String),

    #[error("invalid generation timeout: must be greater than zero")]
    InvalidGenerationTimeout,

    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),
}

/// Errors from exact tokenizers. Callers degrade to the heuristic counter.
#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("tokenizer failed to encode text: {0}")]
    Encode(String),

    #[error("tokenizer could not be loaded: {0}")]
    Load(String),
}

/// Errors surfaced by a chat request or a session command.
///
/// Assembly-time variants (`ModelUnavailable`, `ContextOverflow`) stop the
/// request before anything is generated. Streaming-time variants
/// (`GenerationFailure`, `DeliveryFailure`) are raised after partial output
/// may already be visible.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("model '{model}' is not available")]
    ModelUnavailable { model: String },

    #[error("conversation does not fit the context window: needs {required} tokens, budget is {budget}")]
    ContextOverflow { required: usize, budget: usize },

    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("message delivery failed: {message}")]
    DeliveryFailure {
        message: String,
        /// Display text accumulated up to the failure.
        transcript: String,
    },

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{0}' already exists")]
    SessionExists(String),

    #[error("session name '{0}' is reserved")]
    ReservedSessionName(String),

    #[error("session '{0}' is already generating a reply")]
    SessionBusy(String),

    #[error("generation cancelled")]
    Cancelled,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ChatError {
    /// Whether the error happened before any generation started.
    pub fn is_assembly_error(&self) -> bool {
        matches!(
            self,
            ChatError::ModelUnavailable { .. } | ChatError::ContextOverflow { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_context_overflow_display() {
        let err = ChatError::ContextOverflow {
            required: 154,
            budget: 90,
        };
        assert!(err.to_string().contains("154"));
        assert!(err.to_string().contains("90"));
        assert!(err.is_assembly_error());
    }

    #[test]
    fn test_repository_error_converts_into_chat_error() {
        let err: ChatError = RepositoryError::NotFound.into();
        assert!(matches!(err, ChatError::Repository(RepositoryError::NotFound)));
        assert!(!err.is_assembly_error());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnknownDefaultModel("qwen3".to_string());
        assert_eq!(err.to_string(), "default model 'qwen3' doesn't have a config section");
    }
}
