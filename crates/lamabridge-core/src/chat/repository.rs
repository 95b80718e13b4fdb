//! SessionRepository trait definition.
//!
//! Provides CRUD operations for private sessions and their messages.

use lamabridge_types::chat::{ChatMessage, SessionKey, SessionRecord};
use lamabridge_types::error::RepositoryError;

/// Repository trait for session and message persistence.
///
/// Implementations live in lamabridge-infra (e.g., `SqliteSessionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionRepository: Send + Sync {
    /// Create a new session. Fails with `Conflict` if the key exists.
    fn create_session(
        &self,
        session: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a session by owner and name.
    fn get_session(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, RepositoryError>> + Send;

    /// Update a session's model and system prompt.
    fn update_session(
        &self,
        session: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a session and its messages. Fails with `NotFound` if absent.
    fn delete_session(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List an owner's sessions, ordered by name.
    fn list_sessions(
        &self,
        owner_id: u64,
    ) -> impl std::future::Future<Output = Result<Vec<SessionRecord>, RepositoryError>> + Send;

    /// Append messages to a session in one transaction.
    fn append_messages(
        &self,
        key: &SessionKey,
        messages: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get messages in chronological order. With a limit, only the most
    /// recent `limit` messages are returned (still oldest first).
    fn get_messages(
        &self,
        key: &SessionKey,
        limit: Option<u32>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Count the messages stored for a session.
    fn message_count(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;
}
