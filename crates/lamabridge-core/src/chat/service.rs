//! Session service orchestrating a reply from request to persisted exchange.
//!
//! `SessionService::respond` resolves the session, resolves and checks the
//! model, assembles a fitting prompt, streams the generation through a
//! `StreamRenderer`, and on success stores the exchange (private sessions
//! only). The remaining methods are the session management commands.

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::Stream;
use pin_project_lite::pin_project;
use lamabridge_types::chat::{
    ChatMessage, GLOBAL_SESSION_NAME, Mention, SessionKey, SessionRecord, SessionSize,
};
use lamabridge_types::config::BotConfig;
use lamabridge_types::error::{ChatError, RepositoryError};
use lamabridge_types::llm::{GenerationRequest, PromptMessage};
use lamabridge_types::model::{DEFAULT_CONTEXT_LIMIT, ModelConfig, ModelInfo};
use lamabridge_types::platform::ReplyTarget;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::chat::history::ChannelHistory;
use crate::chat::repository::SessionRepository;
use crate::context::{Assembly, ContextAssembler, PromptBuilder};
use crate::llm::backend::TokenStream;
use crate::llm::box_backend::BoxGenerationBackend;
use crate::model::{ModelRegistry, ResolvedModel};
use crate::render::{MessageSink, RenderOutcome, RenderPolicy, StreamRenderer};
use crate::tokens::TokenCounter;

/// Most channel messages fetched for the temporary session (one Discord
/// page). The trigger message takes one slot, so at most
/// `CHANNEL_HISTORY_CAP - 1` become history.
pub const CHANNEL_HISTORY_CAP: u32 = 100;

/// Settings the service applies to every request.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_system_prompt: String,
    /// History bound; 0 means unbounded for private sessions and
    /// [`CHANNEL_HISTORY_CAP`] for the temporary one.
    pub max_messages_for_context: u32,
    pub reply_token_margin: u32,
    pub render: RenderPolicy,
}

impl SessionSettings {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            default_system_prompt: bot.default_system_prompt.clone(),
            max_messages_for_context: bot.max_messages_for_context,
            reply_token_margin: bot.reply_token_margin,
            render: RenderPolicy::from_config(bot),
        }
    }
}

/// A user message the bot should answer.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub author_id: u64,
    pub author_name: String,
    /// `None` or `"global"` selects the temporary channel session.
    pub session_name: Option<String>,
    pub content: String,
    pub mentions: Vec<Mention>,
    pub target: ReplyTarget,
}

/// A backend model plus whether a config entry covers it.
#[derive(Debug, Clone)]
pub struct ModelListing {
    pub info: ModelInfo,
    pub configured: bool,
}

/// Removes a session from the in-flight map when dropped.
struct InFlightGuard<'a> {
    map: &'a DashMap<SessionKey, ()>,
    key: SessionKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// A request that passed every check and is ready to generate.
struct Ready<'a> {
    prepared: Prepared<'a>,
    resolved: ResolvedModel,
    content: String,
    assembly: Assembly,
}

/// Session state resolved for one request.
struct Prepared<'a> {
    key: SessionKey,
    model: String,
    system_prompt: String,
    history: Vec<PromptMessage>,
    persist: bool,
    _guard: Option<InFlightGuard<'a>>,
}

/// Orchestrates replies and session management.
///
/// Generic over `SessionRepository` so lamabridge-core never depends on
/// lamabridge-infra. The backend is type-erased.
pub struct SessionService<R: SessionRepository> {
    repo: R,
    backend: BoxGenerationBackend,
    registry: ModelRegistry,
    assembler: ContextAssembler,
    settings: SessionSettings,
    in_flight: DashMap<SessionKey, ()>,
}

impl<R: SessionRepository> SessionService<R> {
    pub fn new(
        repo: R,
        backend: BoxGenerationBackend,
        registry: ModelRegistry,
        settings: SessionSettings,
    ) -> Self {
        Self {
            repo,
            backend,
            registry,
            assembler: ContextAssembler::new(settings.reply_token_margin),
            settings,
            in_flight: DashMap::new(),
        }
    }

    /// Access the session repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    // --- Replies ---

    /// Answer a user message.
    ///
    /// Assembly-time errors (`SessionNotFound`, `SessionBusy`,
    /// `ModelUnavailable`, `ContextOverflow`) are returned before the backend
    /// is called, after a short notice is posted to the request's channel.
    /// A `GenerationFailure` leaves the partial output visible and posts an
    /// inline notice; nothing is persisted unless the reply completes.
    pub async fn respond<S: MessageSink, H: ChannelHistory>(
        &self,
        request: &ReplyRequest,
        sink: &S,
        history: &H,
        cancel: &CancellationToken,
    ) -> Result<RenderOutcome, ChatError> {
        let Ready {
            prepared,
            resolved,
            content,
            assembly,
        } = match self.ready(request, history).await {
            Ok(ready) => ready,
            Err(e) => {
                if let Some(notice) = refusal_notice(&e) {
                    if let Err(delivery) = sink.send(&request.target, &notice).await {
                        warn!(error = %delivery, "Could not post refusal notice");
                    }
                }
                return Err(e);
            }
        };

        info!(
            session = %prepared.key,
            model = %resolved.full_name,
            tokens = assembly.token_count,
            kept = assembly.kept,
            dropped = assembly.dropped,
            "Generating reply"
        );

        let stream = self.open_stream(GenerationRequest {
            model: resolved.full_name.clone(),
            input: assembly.prompt.into_input(),
        });
        let mut renderer = StreamRenderer::new(
            sink,
            request.target.clone(),
            self.settings.render,
            resolved.thinking_markers(),
        );

        match renderer.run(stream, cancel).await {
            Ok(outcome) => {
                if prepared.persist {
                    let exchange = [
                        ChatMessage::user(request.author_id, &request.author_name, content),
                        ChatMessage::assistant(0, &resolved.full_name, &outcome.raw_text),
                    ];
                    self.repo.append_messages(&prepared.key, &exchange).await?;
                }
                info!(
                    session = %prepared.key,
                    messages = outcome.messages.len(),
                    edits = outcome.edits,
                    "Reply delivered"
                );
                Ok(outcome)
            }
            Err(ChatError::GenerationFailure(reason)) => {
                let notice = format!("⚠️ Generation failed: {reason}");
                if let Err(e) = sink.send(&request.target, &notice).await {
                    warn!(error = %e, "Could not post generation failure notice");
                }
                Err(ChatError::GenerationFailure(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve the session and model, then fit the prompt.
    async fn ready<H: ChannelHistory>(
        &self,
        request: &ReplyRequest,
        history: &H,
    ) -> Result<Ready<'_>, ChatError> {
        let prepared = match request.session_name.as_deref() {
            None | Some(GLOBAL_SESSION_NAME) => self.prepare_temporary(request, history).await,
            Some(name) => self.prepare_private(request.author_id, name).await?,
        };

        let resolved = self.resolve_available(&prepared.model).await?;

        let content = PromptBuilder::resolve_mentions(&request.content, &request.mentions);
        let new_message = PromptBuilder::user_message(&request.author_name, &content);
        let assembly = self.assembler.assemble(
            &resolved,
            &prepared.system_prompt,
            &prepared.history,
            &new_message,
        )?;

        Ok(Ready {
            prepared,
            resolved,
            content,
            assembly,
        })
    }

    async fn prepare_private(&self, owner_id: u64, name: &str) -> Result<Prepared<'_>, ChatError> {
        let key = SessionKey::new(owner_id, name);
        let guard = self.acquire(&key)?;

        let record = self
            .repo
            .get_session(&key)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(name.to_string()))?;

        let limit = match self.settings.max_messages_for_context {
            0 => None,
            n => Some(n),
        };
        let history = self
            .repo
            .get_messages(&key, limit)
            .await?
            .iter()
            .map(PromptBuilder::from_stored)
            .collect();

        Ok(Prepared {
            key,
            model: record.model,
            system_prompt: record
                .system_prompt
                .unwrap_or_else(|| self.settings.default_system_prompt.clone()),
            history,
            persist: true,
            _guard: Some(guard),
        })
    }

    /// Build the temporary session from recent channel messages. A failed
    /// history read degrades to an empty history.
    async fn prepare_temporary<H: ChannelHistory>(
        &self,
        request: &ReplyRequest,
        history: &H,
    ) -> Prepared<'_> {
        let limit = match self.settings.max_messages_for_context {
            0 => CHANNEL_HISTORY_CAP - 1,
            n => n.min(CHANNEL_HISTORY_CAP - 1),
        } as usize;

        let recent = match history
            .recent_messages(&request.target.channel_id, limit + 1)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    channel = %request.target.channel_id,
                    error = %e,
                    "Could not read channel history, continuing without it"
                );
                Vec::new()
            }
        };

        let trigger = request.target.message_id.as_deref();
        let mut messages: Vec<PromptMessage> = recent
            .iter()
            .filter(|m| Some(m.id.as_str()) != trigger)
            .take(limit)
            .map(PromptBuilder::from_channel)
            .collect();
        messages.reverse();

        Prepared {
            key: SessionKey::new(request.author_id, GLOBAL_SESSION_NAME),
            model: self.registry.default_model().to_string(),
            system_prompt: self.settings.default_system_prompt.clone(),
            history: messages,
            persist: false,
            _guard: None,
        }
    }

    fn acquire(&self, key: &SessionKey) -> Result<InFlightGuard<'_>, ChatError> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => Err(ChatError::SessionBusy(key.name.clone())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    map: &self.in_flight,
                    key: key.clone(),
                })
            }
        }
    }

    fn open_stream(&self, request: GenerationRequest) -> TokenStream {
        let span = info_span!(
            "gen_ai.execute",
            gen_ai.system = self.backend.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.stream = true,
        );
        let stream = self.backend.stream(request);

        Box::pin(StreamInSpan { inner: stream, span })
    }

    async fn available_models(&self, model: &str) -> Result<Vec<ModelInfo>, ChatError> {
        self.backend.list_models().await.map_err(|e| {
            warn!(model = %model, error = %e, "Could not list backend models");
            ChatError::ModelUnavailable {
                model: model.to_string(),
            }
        })
    }

    async fn resolve_available(&self, model: &str) -> Result<ResolvedModel, ChatError> {
        let available = self.available_models(model).await?;
        self.registry.resolve(model, &available)
    }

    // --- Session commands ---

    /// Create a private session, with the default model unless one is given.
    pub async fn create_session(
        &self,
        owner_id: u64,
        name: &str,
        model: Option<&str>,
    ) -> Result<SessionRecord, ChatError> {
        check_name(name)?;
        let key = SessionKey::new(owner_id, name);
        if self.repo.get_session(&key).await?.is_some() {
            return Err(ChatError::SessionExists(name.to_string()));
        }

        let model = match model {
            Some(model) => {
                self.resolve_available(model).await?;
                model.to_string()
            }
            None => self.registry.default_model().to_string(),
        };

        let record = SessionRecord {
            key,
            model,
            system_prompt: None,
            created_at: Utc::now(),
        };
        self.repo.create_session(&record).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => ChatError::SessionExists(name.to_string()),
            other => other.into(),
        })?;

        info!(session = %record.key, model = %record.model, "Session created");
        Ok(record)
    }

    /// List an owner's private sessions.
    pub async fn list_sessions(&self, owner_id: u64) -> Result<Vec<SessionRecord>, ChatError> {
        Ok(self.repo.list_sessions(owner_id).await?)
    }

    /// Remove a private session and all of its messages.
    pub async fn remove_session(&self, owner_id: u64, name: &str) -> Result<(), ChatError> {
        check_name(name)?;
        let key = SessionKey::new(owner_id, name);
        self.repo.delete_session(&key).await.map_err(|e| match e {
            RepositoryError::NotFound => ChatError::SessionNotFound(name.to_string()),
            other => other.into(),
        })?;
        info!(session = %key, "Session removed");
        Ok(())
    }

    /// Message count and estimated prompt size of a private session.
    ///
    /// Uses the session model's tokenizer when available; falls back to the
    /// heuristic when the backend cannot be reached.
    pub async fn session_size(&self, owner_id: u64, name: &str) -> Result<SessionSize, ChatError> {
        let record = self.load(owner_id, name).await?;
        let messages = self.repo.get_messages(&record.key, None).await?;

        let model = match self.backend.list_models().await {
            Ok(available) => self.registry.resolve(&record.model, &available).ok(),
            Err(e) => {
                debug!(error = %e, "Backend unreachable, estimating size from config");
                None
            }
        }
        .or_else(|| self.registry.resolve_configured(&record.model))
        .unwrap_or_else(|| {
            ResolvedModel::new(&record.model, ModelConfig::default(), None, DEFAULT_CONTEXT_LIMIT)
        });

        let system = record
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.settings.default_system_prompt.clone());
        let mut prompt = vec![PromptMessage::system(system)];
        prompt.extend(messages.iter().map(PromptBuilder::from_stored));

        Ok(SessionSize {
            messages: messages.len() as u32,
            estimated_tokens: TokenCounter::count_messages(&model, &prompt),
            context_limit: model.context_limit,
        })
    }

    /// Set or clear (with `None` or blank text) a session's system prompt.
    pub async fn set_system_prompt(
        &self,
        owner_id: u64,
        name: &str,
        prompt: Option<String>,
    ) -> Result<SessionRecord, ChatError> {
        let mut record = self.load(owner_id, name).await?;
        record.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self.repo.update_session(&record).await?;
        info!(
            session = %record.key,
            custom = record.system_prompt.is_some(),
            "System prompt updated"
        );
        Ok(record)
    }

    /// Switch a session to another model, which must be configured and
    /// available on the backend.
    pub async fn set_session_model(
        &self,
        owner_id: u64,
        name: &str,
        model: &str,
    ) -> Result<SessionRecord, ChatError> {
        let mut record = self.load(owner_id, name).await?;
        self.resolve_available(model).await?;
        record.model = model.to_string();
        self.repo.update_session(&record).await?;
        info!(session = %record.key, model = %model, "Session model changed");
        Ok(record)
    }

    /// Models the backend offers, flagged by whether a config entry covers them.
    pub async fn list_models(&self) -> Result<Vec<ModelListing>, ChatError> {
        let models = self
            .backend
            .list_models()
            .await
            .map_err(|e| ChatError::GenerationFailure(format!("cannot list models: {e}")))?;
        Ok(models
            .into_iter()
            .map(|info| ModelListing {
                configured: self.registry.config_for(&info.full_name).is_some(),
                info,
            })
            .collect())
    }

    async fn load(&self, owner_id: u64, name: &str) -> Result<SessionRecord, ChatError> {
        check_name(name)?;
        self.repo
            .get_session(&SessionKey::new(owner_id, name))
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(name.to_string()))
    }
}

fn check_name(name: &str) -> Result<(), ChatError> {
    if name == GLOBAL_SESSION_NAME {
        return Err(ChatError::ReservedSessionName(name.to_string()));
    }
    Ok(())
}

pin_project! {
    /// A stream wrapper that keeps the generation span entered while polling.
    ///
    /// Without this, the span would close as soon as the stream is created,
    /// losing the instrumentation for the actual streaming duration.
    struct StreamInSpan<S> {
        #[pin]
        inner: S,
        span: tracing::Span,
    }
}

impl<S: Stream> Stream for StreamInSpan<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll_next(cx)
    }
}

/// What the requester sees when a reply is refused before generation.
fn refusal_notice(error: &ChatError) -> Option<String> {
    let notice = match error {
        ChatError::ModelUnavailable { model } => {
            format!("⚠️ Model `{model}` is not available right now.")
        }
        ChatError::ContextOverflow { .. } => {
            "⚠️ This message does not fit the model's context window, even without history.".to_string()
        }
        ChatError::SessionBusy(name) => {
            format!("⏳ Session `{name}` is still answering; try again when it finishes.")
        }
        ChatError::SessionNotFound(name) => format!("⚠️ Session `{name}` does not exist."),
        _ => return None,
    };
    Some(notice)
}
