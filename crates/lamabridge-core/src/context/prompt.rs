//! Prompt building: message conventions and chat template rendering.
//!
//! User turns carry their sender's display name on a first line
//! (`@Alice:\nhello`) so the model can tell speakers apart in shared
//! channels. Assistant turns and the system prompt are passed through as-is.

use std::fmt::Write as _;

use chrono::Local;
use lamabridge_types::chat::{ChannelMessage, ChatMessage, Mention, MessageRole};
use lamabridge_types::llm::PromptMessage;
use minijinja::{Environment, Error, ErrorKind, context};

use crate::tokens::ChatTemplate;

/// Builds prompt messages and renders chat templates.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Format a user turn: `@{name}:\n{text}`.
    pub fn user_turn(name: &str, text: &str) -> String {
        format!("@{name}:\n{text}")
    }

    /// A user turn as a prompt message.
    pub fn user_message(name: &str, text: &str) -> PromptMessage {
        PromptMessage {
            role: MessageRole::User,
            name: Some(name.to_string()),
            content: Self::user_turn(name, text),
        }
    }

    /// A bot turn as a prompt message (never prefixed).
    pub fn assistant_message(text: &str) -> PromptMessage {
        PromptMessage {
            role: MessageRole::Assistant,
            name: None,
            content: text.to_string(),
        }
    }

    /// Convert a stored message into its prompt form.
    pub fn from_stored(message: &ChatMessage) -> PromptMessage {
        match message.role {
            MessageRole::User => Self::user_message(&message.sender_name, &message.content),
            MessageRole::Assistant => Self::assistant_message(&message.content),
            MessageRole::System => PromptMessage::system(message.content.clone()),
        }
    }

    /// Convert a channel message into its prompt form. Messages written by
    /// the bot become assistant turns.
    pub fn from_channel(message: &ChannelMessage) -> PromptMessage {
        if message.from_self {
            Self::assistant_message(&message.content)
        } else {
            let text = Self::resolve_mentions(&message.content, &message.mentions);
            Self::user_message(&message.author_name, &text)
        }
    }

    /// Replace raw mentions (`<@123>` or `<@!123>`) of known users with
    /// `<@Name (UID: 123)>`. Unknown ids are left untouched.
    pub fn resolve_mentions(content: &str, mentions: &[Mention]) -> String {
        let mut out = content.to_string();
        for mention in mentions {
            let resolved = format!("<@{} (UID: {})>", mention.name, mention.user_id);
            out = out
                .replace(&format!("<@{}>", mention.user_id), &resolved)
                .replace(&format!("<@!{}>", mention.user_id), &resolved);
        }
        out
    }

    /// Render a message list with a HuggingFace chat template.
    ///
    /// Provides the variables those templates expect: `messages`,
    /// `add_generation_prompt`, `bos_token`, `eos_token`, plus the
    /// `raise_exception` and `strftime_now` functions and Python string
    /// methods.
    pub fn render(messages: &[PromptMessage], template: &ChatTemplate) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env.add_function("raise_exception", |message: String| -> Result<String, Error> {
            Err(Error::new(ErrorKind::InvalidOperation, message))
        });
        env.add_function("strftime_now", |format: String| -> Result<String, Error> {
            let mut out = String::new();
            write!(out, "{}", Local::now().format(&format)).map_err(|_| {
                Error::new(ErrorKind::InvalidOperation, "invalid strftime format")
            })?;
            Ok(out)
        });

        let tmpl = env.template_from_str(&template.source)?;
        tmpl.render(context! {
            messages => messages,
            add_generation_prompt => true,
            bos_token => template.bos_token.as_deref().unwrap_or(""),
            eos_token => template.eos_token.as_deref().unwrap_or(""),
        })
    }
}
