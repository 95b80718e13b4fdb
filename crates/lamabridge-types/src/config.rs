//! Application configuration types for lamabridge.
//!
//! `AppConfig` mirrors the TOML configuration file. Most `[bot]` values have
//! defaults, but every value that is present is validated: a bad value is an
//! error, never silently replaced.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{ModelConfig, ModelsConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    pub models: ModelsConfig,
}

/// How thinking segments are shown to chat users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingDisplay {
    /// Thinking segments are removed from the displayed text.
    #[default]
    Hidden,
    /// Thinking segments are shown as a `> ` blockquote.
    Quoted,
}

/// The `[bot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Discord bot token; only needed for commands that talk to Discord.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_token: Option<String>,

    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Minimum interval between edits of the same outbound message.
    #[serde(default = "default_edit_delay")]
    pub edit_delay_seconds: f64,

    /// Upper bound on history messages fed into a prompt (0 = no limit for
    /// private sessions).
    #[serde(default = "default_max_messages")]
    pub max_messages_for_context: u32,

    #[serde(default = "default_db_path")]
    pub session_db_path: String,

    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Platform hard limit per message, counted in Unicode scalar values.
    #[serde(default = "default_message_char_limit")]
    pub message_char_limit: usize,

    /// Tokens reserved for the reply when fitting the prompt.
    #[serde(default = "default_reply_token_margin")]
    pub reply_token_margin: u32,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_seconds: u64,

    #[serde(default)]
    pub thinking_display: ThinkingDisplay,
}

fn default_command_prefix() -> String {
    "$".to_string()
}

fn default_edit_delay() -> f64 {
    0.5
}

fn default_max_messages() -> u32 {
    30
}

fn default_db_path() -> String {
    "./lamabridge.db".to_string()
}

fn default_system_prompt() -> String {
    "You are a Discord bot, proceed with the following conversation with the users. \
     Every message is prefixed with a line containing the username of its sender \
     (prefixed with @). Mentions of other users look like <@Name (UID: id)>."
        .to_string()
}

fn default_message_char_limit() -> usize {
    2000
}

fn default_reply_token_margin() -> u32 {
    256
}

fn default_generation_timeout() -> u64 {
    300
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            discord_token: None,
            command_prefix: default_command_prefix(),
            edit_delay_seconds: default_edit_delay(),
            max_messages_for_context: default_max_messages(),
            session_db_path: default_db_path(),
            default_system_prompt: default_system_prompt(),
            message_char_limit: default_message_char_limit(),
            reply_token_margin: default_reply_token_margin(),
            generation_timeout_seconds: default_generation_timeout(),
            thinking_display: ThinkingDisplay::default(),
        }
    }
}

/// The `[admin]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Platform user id allowed to run administrative commands.
    #[serde(default)]
    pub id: u64,
}

/// The `[backend]` section (model server connection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl AppConfig {
    /// Check every value that defaults cannot make valid on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bot = &self.bot;
        if bot.command_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if !bot.edit_delay_seconds.is_finite() || bot.edit_delay_seconds <= 0.0 {
            return Err(ConfigError::InvalidEditDelay(bot.edit_delay_seconds.to_string()));
        }
        if bot.session_db_path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if bot.message_char_limit == 0 {
            return Err(ConfigError::InvalidMessageLimit);
        }
        if bot.generation_timeout_seconds == 0 {
            return Err(ConfigError::InvalidGenerationTimeout);
        }
        if !(self.backend.base_url.starts_with("http://")
            || self.backend.base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidBackendUrl(self.backend.base_url.clone()));
        }

        for (name, model) in &self.models.entries {
            validate_model(name, model)?;
        }
        if self.models.config_for(&self.models.default_model).is_none() {
            return Err(ConfigError::UnknownDefaultModel(
                self.models.default_model.clone(),
            ));
        }
        Ok(())
    }

    /// A commented example configuration, written when no file exists yet.
    pub fn example_toml() -> &'static str {
        EXAMPLE_CONFIG
    }
}

fn validate_model(name: &str, model: &ModelConfig) -> Result<(), ConfigError> {
    let has_prefix = model.thinking_prefix.as_deref().is_some_and(|p| !p.is_empty());
    let has_suffix = model.thinking_suffix.as_deref().is_some_and(|s| !s.is_empty());
    match (has_prefix, has_suffix) {
        (true, false) => Err(ConfigError::MissingThinkingSuffix {
            model: name.to_string(),
        }),
        (false, true) => Err(ConfigError::MissingThinkingPrefix {
            model: name.to_string(),
        }),
        _ => Ok(()),
    }
}

const EXAMPLE_CONFIG: &str = r#"# lamabridge configuration

[bot]
# Discord bot token (required for `lamabridge reply`).
discord_token = "your-token-here"
command_prefix = "$"
# Minimum seconds between edits of a streamed message.
edit_delay_seconds = 0.5
max_messages_for_context = 30
session_db_path = "./lamabridge.db"
message_char_limit = 2000
reply_token_margin = 256
generation_timeout_seconds = 300
# "hidden" or "quoted"
thinking_display = "hidden"

[admin]
id = 12345

[backend]
base_url = "http://localhost:11434"

[models]
default_model = "qwen3:8b"

[models.entries.qwen3]
tokenizer = "Qwen/Qwen3-8B"
thinking_prefix = "<think>"
thinking_suffix = "</think>"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses_and_validates() {
        let config: AppConfig = toml::from_str(AppConfig::example_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bot.command_prefix, "$");
        assert_eq!(config.admin.id, 12345);
        assert_eq!(config.models.default_model, "qwen3:8b");
        assert_eq!(config.bot.thinking_display, ThinkingDisplay::Hidden);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[models]
default_model = "llama3"

[models.entries.llama3]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bot.max_messages_for_context, 30);
        assert!((config.bot.edit_delay_seconds - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.bot.message_char_limit, 2000);
        assert_eq!(config.backend.base_url, "http://localhost:11434");
        assert!(config.bot.discord_token.is_none());
    }

    fn base() -> AppConfig {
        toml::from_str(
            r#"
[models]
default_model = "llama3"

[models.entries.llama3]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut config = base();
        config.bot.command_prefix = " ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyPrefix));
    }

    #[test]
    fn test_validate_rejects_non_positive_edit_delay() {
        let mut config = base();
        config.bot.edit_delay_seconds = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEditDelay(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_db_path() {
        let mut config = base();
        config.bot.session_db_path = String::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyDatabasePath));
    }

    #[test]
    fn test_validate_rejects_half_thinking_markers() {
        let mut config = base();
        config
            .models
            .entries
            .get_mut("llama3")
            .unwrap()
            .thinking_prefix = Some("<think>".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingThinkingSuffix { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_default_model() {
        let mut config = base();
        config.models.default_model = "mistral".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownDefaultModel("mistral".to_string()))
        );
    }

    #[test]
    fn test_negative_message_limit_fails_to_parse() {
        let toml_str = r#"
[bot]
max_messages_for_context = -1

[models]
default_model = "llama3"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }
}
