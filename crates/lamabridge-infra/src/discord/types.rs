//! Discord API v10 payloads used by the REST adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lamabridge_types::chat::{ChannelMessage, Mention};

/// A Discord user object (only the fields lamabridge reads).
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl DiscordUser {
    /// The name shown in clients: the global display name when set.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

/// A Discord message object.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
}

impl DiscordMessage {
    /// Convert to the platform-neutral form. `bot_user_id` identifies this
    /// bot's own messages; without it any bot author counts as self.
    ///
    /// Returns `None` when the author id is not a snowflake.
    pub fn into_channel_message(self, bot_user_id: Option<u64>) -> Option<ChannelMessage> {
        let author_id = self.author.id.parse::<u64>().ok()?;
        let from_self = match bot_user_id {
            Some(id) => id == author_id,
            None => self.author.bot,
        };
        let mentions = self
            .mentions
            .iter()
            .filter_map(|user| {
                Some(Mention {
                    user_id: user.id.parse().ok()?,
                    name: user.display_name().to_string(),
                })
            })
            .collect();

        Some(ChannelMessage {
            id: self.id,
            author_id,
            author_name: self.author.display_name().to_string(),
            from_self,
            content: self.content,
            mentions,
            created_at: self.timestamp,
        })
    }
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference<'a>>,
    pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReference<'a> {
    pub message_id: &'a str,
    /// Still send when the referenced message was deleted meanwhile.
    pub fail_if_not_exists: bool,
}

/// Model output must not ping anyone; only the replied-to user is notified.
#[derive(Debug, Clone, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    pub replied_user: bool,
}

impl Default for AllowedMentions {
    fn default() -> Self {
        Self {
            parse: Vec::new(),
            replied_user: true,
        }
    }
}

/// Body of `PATCH /channels/{id}/messages/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct EditMessage<'a> {
    pub content: &'a str,
}

/// Body of a 429 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    /// Seconds.
    pub retry_after: f64,
}

/// Error body of other non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json(author_id: &str, bot: bool) -> String {
        format!(
            r#"{{"id": "1001", "channel_id": "55", "content": "hi <@42>",
                "timestamp": "2025-03-01T12:00:00.000000+00:00",
                "author": {{"id": "{author_id}", "username": "alice", "global_name": "Alice", "bot": {bot}}},
                "mentions": [{{"id": "42", "username": "bob"}}]}}"#
        )
    }

    #[test]
    fn test_message_converts_with_display_names() {
        let message: DiscordMessage = serde_json::from_str(&message_json("7", false)).unwrap();
        let converted = message.into_channel_message(Some(99)).unwrap();

        assert_eq!(converted.id, "1001");
        assert_eq!(converted.author_id, 7);
        assert_eq!(converted.author_name, "Alice");
        assert!(!converted.from_self);
        assert_eq!(
            converted.mentions,
            vec![Mention {
                user_id: 42,
                name: "bob".to_string()
            }]
        );
    }

    #[test]
    fn test_from_self_uses_bot_user_id() {
        let message: DiscordMessage = serde_json::from_str(&message_json("99", true)).unwrap();
        assert!(message.clone().into_channel_message(Some(99)).unwrap().from_self);

        let other_bot: DiscordMessage = serde_json::from_str(&message_json("98", true)).unwrap();
        assert!(!other_bot.clone().into_channel_message(Some(99)).unwrap().from_self);
        assert!(other_bot.into_channel_message(None).unwrap().from_self);
    }

    #[test]
    fn test_invalid_author_id_is_skipped() {
        let message: DiscordMessage = serde_json::from_str(&message_json("webhook", false)).unwrap();
        assert!(message.into_channel_message(None).is_none());
    }

    #[test]
    fn test_create_message_body() {
        let body = CreateMessage {
            content: "hello",
            message_reference: Some(MessageReference {
                message_id: "1001",
                fail_if_not_exists: false,
            }),
            allowed_mentions: AllowedMentions::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message_reference"]["message_id"], "1001");
        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!([]));

        let plain = CreateMessage {
            content: "hello",
            message_reference: None,
            allowed_mentions: AllowedMentions::default(),
        };
        assert!(serde_json::to_value(&plain).unwrap().get("message_reference").is_none());
    }
}
