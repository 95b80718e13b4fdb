//! Main chat loop.
//!
//! Reads lines, dispatches slash commands, and answers everything else
//! through `SessionService::respond`. While a reply streams, the input is
//! still polled so Ctrl+C can cancel it.

use std::io::Write;

use console::style;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lamabridge_core::chat::service::ReplyRequest;
use lamabridge_types::error::ChatError;
use lamabridge_types::llm::GenerationStats;
use lamabridge_types::platform::ReplyTarget;

use crate::cli::AuthorArgs;
use crate::state::AppState;

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::terminal::{TERMINAL_CHANNEL_ID, TerminalChannel, TerminalSink};

/// Run the interactive chat loop.
///
/// With `session` set, the private session must exist and every exchange is
/// stored. Without it, the conversation lives only as long as the loop.
pub async fn run_chat_loop(
    state: &AppState,
    author: AuthorArgs,
    session: Option<String>,
) -> anyhow::Result<()> {
    let service = &state.session_service;
    let owner = state.owner(author.user);

    let model = match &session {
        Some(name) => {
            let sessions = service.list_sessions(owner).await?;
            let record = sessions
                .into_iter()
                .find(|s| &s.key.name == name)
                .ok_or_else(|| ChatError::SessionNotFound(name.clone()))?;
            record.model
        }
        None => state.config.models.default_model.clone(),
    };

    println!();
    println!(
        "  {} {} {}",
        style("lamabridge").cyan().bold(),
        style("·").dim(),
        style(&model).yellow()
    );
    println!(
        "  {}",
        style(match &session {
            Some(name) => format!("session '{name}' (saved)"),
            None => "temporary conversation (not saved)".to_string(),
        })
        .dim()
    );
    println!("  {}", style("Type /help for commands.").dim());
    println!();

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, mut writer) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    let sink = TerminalSink::new(writer.clone());
    let channel = TerminalChannel::new();
    let mut turn: u64 = 0;

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                writeln!(writer, "  {}", style("Press Ctrl+D to exit.").dim())?;
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => write!(writer, "{}", commands::help_text())?,
                ChatCommand::Clear => chat_input.clear(),
                ChatCommand::Exit => break,
                ChatCommand::Size => match &session {
                    Some(name) => match service.session_size(owner, name).await {
                        Ok(size) => writeln!(
                            writer,
                            "\n  {} messages, ~{} / {} tokens\n",
                            size.messages, size.estimated_tokens, size.context_limit
                        )?,
                        Err(e) => writeln!(writer, "\n  {} {e}\n", style("!").red().bold())?,
                    },
                    None => writeln!(
                        writer,
                        "\n  {} Not in a saved session.\n",
                        style("i").blue().bold()
                    )?,
                },
                ChatCommand::Reset => match &session {
                    Some(_) => writeln!(
                        writer,
                        "\n  {} Saved sessions keep their history; remove the session to start over.\n",
                        style("i").blue().bold()
                    )?,
                    None => {
                        channel.clear();
                        writeln!(writer, "\n  {} Conversation forgotten.\n", style("✓").green().bold())?;
                    }
                },
                ChatCommand::Unknown(name) => writeln!(
                    writer,
                    "\n  {} Unknown command: {}. Type /help for available commands.\n",
                    style("?").yellow().bold(),
                    style(name).dim()
                )?,
            }
            continue;
        }

        turn += 1;
        let request = ReplyRequest {
            author_id: owner,
            author_name: author.name.clone(),
            session_name: session.clone(),
            content: text.clone(),
            mentions: Vec::new(),
            target: ReplyTarget {
                channel_id: TERMINAL_CHANNEL_ID.to_string(),
                message_id: Some(format!("turn-{turn}")),
            },
        };

        write!(writer, "\n  {} ", style(&model).cyan().bold())?;
        let cancel = CancellationToken::new();
        let result = {
            let respond = service.respond(&request, &sink, &channel, &cancel);
            tokio::pin!(respond);
            loop {
                tokio::select! {
                    result = &mut respond => break result,
                    event = chat_input.read_line() => match event {
                        InputEvent::Interrupted | InputEvent::Eof => cancel.cancel(),
                        InputEvent::Message(_) => {}
                    },
                }
            }
        };
        writeln!(writer, "\n")?;

        match result {
            Ok(outcome) => {
                if session.is_none() {
                    channel.record(owner, &author.name, false, &text);
                    channel.record(0, &model, true, &outcome.display_text);
                }
                info!(messages = outcome.messages.len(), edits = outcome.edits, "turn complete");
                if let Some(summary) = outcome.stats.as_ref().and_then(stats_line) {
                    writeln!(writer, "  {}\n", style(summary).dim())?;
                }
            }
            Err(ChatError::Cancelled) => {
                writeln!(writer, "  {}\n", style("Reply cancelled.").dim())?;
            }
            Err(e) => {
                warn!(error = %e, "reply failed");
                writeln!(writer, "  {} {e}\n", style("!").red().bold())?;
                if e.is_assembly_error() {
                    writeln!(
                        writer,
                        "  {}\n",
                        style("Nothing was generated. Try a shorter message or a new session.").dim()
                    )?;
                }
            }
        }
    }

    writeln!(writer, "\n  {}", style("Chat ended.").dim())?;
    chat_input.flush();
    Ok(())
}

/// One-line summary of the generation statistics, when the backend sent any.
fn stats_line(stats: &GenerationStats) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(prompt) = stats.prompt_tokens {
        parts.push(format!("{prompt} prompt tokens"));
    }
    if let Some(completion) = stats.completion_tokens {
        parts.push(format!("{completion} generated"));
    }
    if let Some(ms) = stats.total_duration_ms {
        parts.push(format!("{:.1}s", ms as f64 / 1000.0));
    }
    (!parts.is_empty()).then(|| parts.join(" · "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_line_joins_known_values() {
        let stats = GenerationStats {
            prompt_tokens: Some(26),
            completion_tokens: Some(290),
            total_duration_ms: Some(4_300),
        };
        assert_eq!(
            stats_line(&stats).as_deref(),
            Some("26 prompt tokens · 290 generated · 4.3s")
        );
    }

    #[test]
    fn test_stats_line_skips_missing_values() {
        let stats = GenerationStats {
            completion_tokens: Some(3),
            ..Default::default()
        };
        assert_eq!(stats_line(&stats).as_deref(), Some("3 generated"));
        assert_eq!(stats_line(&GenerationStats::default()), None);
    }
}
