//! CLI command definitions for the `lamabridge` binary.
//!
//! Uses clap derive macros for argument parsing. Every command that touches a
//! session names it explicitly; there is no "current session".

pub mod chat;
pub mod config;
pub mod models;
pub mod reply;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bridge chat conversations to a local Ollama server.
#[derive(Parser)]
#[command(name = "lamabridge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, env = "LAMABRIDGE_CONFIG", default_value = "lamabridge.toml")]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with a model in the terminal.
    Chat {
        #[command(flatten)]
        author: AuthorArgs,

        /// Private session to use; omit for a throwaway conversation.
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage private sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// List the models the backend offers.
    Models,

    /// Answer a Discord message, streaming the reply into its channel.
    Reply {
        /// Channel to reply in.
        #[arg(long)]
        channel: String,

        /// Message to answer. Without inline content it is looked up in the
        /// channel and its author, text and mentions are used.
        #[arg(long)]
        message: Option<String>,

        #[command(flatten)]
        author: AuthorArgs,

        /// Private session of the author; omit for the channel session.
        #[arg(short, long)]
        session: Option<String>,

        /// Bot token (overrides `bot.discord_token`).
        #[arg(long, env = "LAMABRIDGE_DISCORD_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Message text, when not answering an existing message.
        content: Option<String>,
    },

    /// Write an example configuration file.
    #[command(name = "init-config")]
    InitConfig {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// The user a message is attributed to.
#[derive(clap::Args, Debug, Clone)]
pub struct AuthorArgs {
    /// Platform user id (defaults to the configured admin id).
    #[arg(long)]
    pub user: Option<u64>,

    /// Display name used in prompts.
    #[arg(long, default_value = "user")]
    pub name: String,
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create a private session.
    New {
        name: String,

        /// Model to use instead of the configured default.
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        user: Option<u64>,
    },

    /// List private sessions.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        user: Option<u64>,
    },

    /// Remove a session and its history.
    #[command(alias = "rm")]
    Remove {
        name: String,

        /// Skip confirmation.
        #[arg(long)]
        force: bool,

        #[arg(long)]
        user: Option<u64>,
    },

    /// Show message count and estimated token usage.
    Size {
        name: String,

        #[arg(long)]
        user: Option<u64>,
    },

    /// Set the system prompt; omit the text to restore the default.
    #[command(name = "set-prompt")]
    SetPrompt {
        name: String,

        prompt: Option<String>,

        #[arg(long)]
        user: Option<u64>,
    },

    /// Switch the session to another model.
    #[command(name = "set-model")]
    SetModel {
        name: String,

        model: String,

        #[arg(long)]
        user: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_session_new_with_model() {
        let cli = Cli::try_parse_from(["lamabridge", "session", "new", "work", "-m", "qwen3:8b"])
            .unwrap();
        match cli.command {
            Commands::Session {
                action: SessionCommand::New { name, model, user },
            } => {
                assert_eq!(name, "work");
                assert_eq!(model.as_deref(), Some("qwen3:8b"));
                assert_eq!(user, None);
            }
            _ => panic!("expected session new"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lamabridge", "models", "--json", "-vv", "--config", "x.toml"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn test_parse_reply_with_inline_content() {
        let cli = Cli::try_parse_from([
            "lamabridge", "reply", "--channel", "10", "--user", "7", "--name", "alice", "hello",
        ])
        .unwrap();
        match cli.command {
            Commands::Reply {
                channel,
                message,
                author,
                content,
                ..
            } => {
                assert_eq!(channel, "10");
                assert_eq!(message, None);
                assert_eq!(author.user, Some(7));
                assert_eq!(author.name, "alice");
                assert_eq!(content.as_deref(), Some("hello"));
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn test_parse_chat_defaults() {
        let cli = Cli::try_parse_from(["lamabridge", "chat"]).unwrap();
        match cli.command {
            Commands::Chat { author, session } => {
                assert_eq!(author.name, "user");
                assert_eq!(session, None);
            }
            _ => panic!("expected chat"),
        }
    }
}
