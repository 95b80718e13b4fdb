//! DiscordRest -- [`MessageSink`] and [`ChannelHistory`] over Discord's HTTP API.
//!
//! The bot token is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building the `Authorization` header.
//!
//! Every request goes through one retry loop: 429 responses wait for the
//! server's `retry_after`, 5xx responses and transport errors back off
//! exponentially. Other statuses fail immediately.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use lamabridge_core::chat::history::ChannelHistory;
use lamabridge_core::render::sink::MessageSink;
use lamabridge_types::chat::ChannelMessage;
use lamabridge_types::platform::{DeliveryError, MessageHandle, ReplyTarget};

use super::types::{
    AllowedMentions, CreateMessage, DiscordMessage, DiscordUser, EditMessage, ErrorBody,
    MessageReference, RateLimitBody,
};

/// Default API root.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Most messages `GET /channels/{id}/messages` returns per request.
pub const MAX_HISTORY_PAGE: usize = 100;

/// Retry behavior for Discord requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Discord REST client for one bot.
pub struct DiscordRest {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
    bot_user_id: Option<u64>,
    retry: RetryPolicy,
}

impl DiscordRest {
    /// Create a client. The bot's own user id is unknown until
    /// [`identify`](Self::identify) runs.
    pub fn new(token: SecretString) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base_url: DISCORD_API_BASE.to_string(),
            bot_user_id: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_bot_user_id(mut self, id: u64) -> Self {
        self.bot_user_id = Some(id);
        self
    }

    pub fn bot_user_id(&self) -> Option<u64> {
        self.bot_user_id
    }

    /// Look up the bot's own user (`GET /users/@me`), verifying the token,
    /// and remember its id for history conversion.
    pub async fn identify(mut self) -> Result<(Self, DiscordUser), DeliveryError> {
        let url = self.url("/users/@me");
        let response = self.execute(|| self.client.get(&url)).await?;
        let user: DiscordUser = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("invalid user response: {e}")))?;

        let id = user
            .id
            .parse()
            .map_err(|_| DeliveryError::Transport(format!("invalid bot user id '{}'", user.id)))?;
        self.bot_user_id = Some(id);
        tracing::info!(bot = %user.username, id, "discord identity verified");
        Ok((self, user))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request built by `build`, retrying per the policy.
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response, DeliveryError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let result = build()
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bot {}", self.token.expose_secret()),
                )
                .send()
                .await;

            let (error, wait) = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = retry_after(response).await;
                    let error = DeliveryError::RateLimited {
                        retry_after_ms: retry_after.as_millis() as u64,
                    };
                    (error, retry_after.min(self.retry.max_delay))
                }
                Ok(response) if response.status().is_server_error() => {
                    let error = rejected(response).await;
                    (error, self.retry.backoff(attempt))
                }
                Ok(response) => return Err(rejected(response).await),
                Err(e) => (
                    DeliveryError::Transport(e.to_string()),
                    self.retry.backoff(attempt),
                ),
            };

            if attempt >= self.retry.max_attempts {
                tracing::warn!(attempt, error = %error, "discord request failed, giving up");
                return Err(error);
            }
            tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, error = %error, "retrying discord request");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

async fn retry_after(response: reqwest::Response) -> Duration {
    let header = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    let body = response
        .json::<RateLimitBody>()
        .await
        .ok()
        .map(|b| b.retry_after);

    let seconds = body.or(header).unwrap_or(1.0).max(0.0);
    Duration::from_secs_f64(seconds)
}

async fn rejected(response: reqwest::Response) -> DeliveryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);
    DeliveryError::Rejected { status, message }
}

impl MessageSink for DiscordRest {
    async fn send(&self, target: &ReplyTarget, content: &str) -> Result<MessageHandle, DeliveryError> {
        let url = self.url(&format!("/channels/{}/messages", target.channel_id));
        let body = CreateMessage {
            content,
            message_reference: target.message_id.as_deref().map(|message_id| MessageReference {
                message_id,
                fail_if_not_exists: false,
            }),
            allowed_mentions: AllowedMentions::default(),
        };

        let response = self.execute(|| self.client.post(&url).json(&body)).await?;
        let message: DiscordMessage = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("invalid message response: {e}")))?;

        Ok(MessageHandle {
            channel_id: message.channel_id,
            message_id: message.id,
        })
    }

    async fn edit(&self, handle: &MessageHandle, content: &str) -> Result<(), DeliveryError> {
        let url = self.url(&format!(
            "/channels/{}/messages/{}",
            handle.channel_id, handle.message_id
        ));
        let body = EditMessage { content };

        self.execute(|| self.client.patch(&url).json(&body)).await?;
        Ok(())
    }
}

impl ChannelHistory for DiscordRest {
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, DeliveryError> {
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        let url = self.url(&format!("/channels/{channel_id}/messages?limit={limit}"));

        let response = self.execute(|| self.client.get(&url)).await?;
        let messages: Vec<DiscordMessage> = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("invalid history response: {e}")))?;

        // Discord returns newest first already.
        Ok(messages
            .into_iter()
            .filter_map(|m| m.into_channel_message(self.bot_user_id))
            .collect())
    }
}
