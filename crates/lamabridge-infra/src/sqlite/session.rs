//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `lamabridge-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the single writer connection.

use chrono::{DateTime, Utc};
use lamabridge_core::chat::repository::SessionRepository;
use lamabridge_types::chat::{ChatMessage, SessionKey, SessionRecord};
use lamabridge_types::error::RepositoryError;
use lamabridge_types::llm::MessageRole;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain SessionRecord.
struct SessionRow {
    owner_id: i64,
    name: String,
    model: String,
    system_prompt: Option<String>,
    created_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            model: row.try_get("model")?,
            system_prompt: row.try_get("system_prompt")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, RepositoryError> {
        Ok(SessionRecord {
            key: SessionKey::new(self.owner_id as u64, self.name),
            model: self.model,
            system_prompt: self.system_prompt,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct MessageRow {
    uuid: String,
    role: String,
    sender_id: i64,
    sender_name: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            uuid: row.try_get("uuid")?,
            role: row.try_get("role")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.uuid)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id,
            role,
            sender_id: self.sender_id as u64,
            sender_name: self.sender_name,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_write_error(e: sqlx::Error, conflict: impl FnOnce() -> String) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(conflict()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::Query(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// SessionRepository implementation
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteSessionRepository {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (owner_id, name, model, system_prompt, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(session.key.owner_id as i64)
        .bind(&session.key.name)
        .bind(&session.model)
        .bind(&session.system_prompt)
        .bind(format_datetime(&session.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, || format!("session '{}' already exists", session.key)))?;

        tracing::debug!(session = %session.key, model = %session.model, "session created");
        Ok(())
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE owner_id = ? AND name = ?")
            .bind(key.owner_id as i64)
            .bind(&key.name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions
               SET model = ?, system_prompt = ?
               WHERE owner_id = ? AND name = ?"#,
        )
        .bind(&session.model)
        .bind(&session.system_prompt)
        .bind(session.key.owner_id as i64)
        .bind(&session.key.name)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        // Messages go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM sessions WHERE owner_id = ? AND name = ?")
            .bind(key.owner_id as i64)
            .bind(&key.name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(session = %key, "session deleted");
        Ok(())
    }

    async fn list_sessions(&self, owner_id: u64) -> Result<Vec<SessionRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE owner_id = ? ORDER BY name ASC")
            .bind(owner_id as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row =
                SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            sessions.push(session_row.into_record()?);
        }

        Ok(sessions)
    }

    async fn append_messages(
        &self,
        key: &SessionKey,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for message in messages {
            sqlx::query(
                r#"INSERT INTO messages (uuid, owner_id, session_name, role, sender_id, sender_name, content, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(message.id.to_string())
            .bind(key.owner_id as i64)
            .bind(&key.name)
            .bind(message.role.to_string())
            .bind(message.sender_id as i64)
            .bind(&message.sender_name)
            .bind(&message.content)
            .bind(format_datetime(&message.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, || format!("duplicate message {}", message.id)))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_messages(
        &self,
        key: &SessionKey,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE owner_id = ? AND session_name = ?
                       ORDER BY id DESC LIMIT ?"#,
                )
                .bind(key.owner_id as i64)
                .bind(&key.name)
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE owner_id = ? AND session_name = ?
                       ORDER BY id ASC"#,
                )
                .bind(key.owner_id as i64)
                .bind(&key.name)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        // The limited query reads newest first.
        if limit.is_some() {
            messages.reverse();
        }

        Ok(messages)
    }

    async fn message_count(&self, key: &SessionKey) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM messages WHERE owner_id = ? AND session_name = ?",
        )
        .bind(key.owner_id as i64)
        .bind(&key.name)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u32)
    }
}
