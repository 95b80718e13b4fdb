//! Application state wiring the services together.
//!
//! `SessionService` is generic over its repository; AppState pins it to the
//! SQLite implementation and boxes the Ollama backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lamabridge_core::chat::service::{SessionService, SessionSettings};
use lamabridge_core::llm::box_backend::BoxGenerationBackend;
use lamabridge_core::model::ModelRegistry;
use lamabridge_infra::config::load_config;
use lamabridge_infra::ollama::OllamaBackend;
use lamabridge_infra::sqlite::pool::DatabasePool;
use lamabridge_infra::sqlite::session::SqliteSessionRepository;
use lamabridge_infra::tokenizer::load_configured_tokenizers;
use lamabridge_types::config::AppConfig;

/// Concrete service type pinned to the infra implementations.
pub type ConcreteSessionService = SessionService<SqliteSessionRepository>;

/// Shared application state used by every command.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub config_path: PathBuf,
    pub session_service: Arc<ConcreteSessionService>,
}

impl AppState {
    /// Load the config, open the database, load tokenizers, wire the service.
    pub async fn init(config_path: &Path) -> anyhow::Result<Self> {
        let config = load_config(config_path).await?;

        let db_pool = DatabasePool::open(Path::new(&config.bot.session_db_path)).await?;
        let repo = SqliteSessionRepository::new(db_pool);

        let backend = OllamaBackend::new(&config.backend.base_url)?;
        tracing::debug!(url = backend.base_url(), "backend configured");

        let mut registry = ModelRegistry::new(config.models.clone());
        for (key, tokenizer) in load_configured_tokenizers(&config.models).await {
            registry = registry.with_tokenizer(key, tokenizer);
        }

        let session_service = SessionService::new(
            repo,
            BoxGenerationBackend::new(backend),
            registry,
            SessionSettings::from_config(&config.bot),
        );

        Ok(Self {
            config: Arc::new(config),
            config_path: config_path.to_path_buf(),
            session_service: Arc::new(session_service),
        })
    }

    /// The owner id used when a command does not name a user.
    pub fn owner(&self, user: Option<u64>) -> u64 {
        user.unwrap_or(self.config.admin.id)
    }
}
