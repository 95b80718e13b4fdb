//! Session management commands: new, list, remove, size, set-prompt,
//! set-model.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use lamabridge_types::chat::SessionRecord;

use crate::cli::SessionCommand;
use crate::state::AppState;

pub async fn handle_session_command(
    action: SessionCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let service = &state.session_service;
    match action {
        SessionCommand::New { name, model, user } => {
            let record = service
                .create_session(state.owner(user), &name, model.as_deref())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "\n  {} Session '{}' created with model {}\n",
                    style("✓").green().bold(),
                    style(&record.key.name).cyan(),
                    style(&record.model).yellow()
                );
            }
        }

        SessionCommand::List { user } => {
            let owner = state.owner(user);
            let sessions = service.list_sessions(owner).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                print_sessions(owner, &sessions);
            }
        }

        SessionCommand::Remove { name, force, user } => {
            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Remove session '{name}' and all of its messages?"))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }
            service.remove_session(state.owner(user), &name).await?;
            if json {
                println!("{}", serde_json::json!({ "removed": name }));
            } else {
                println!(
                    "\n  {} Session '{}' removed\n",
                    style("✓").green().bold(),
                    style(&name).cyan()
                );
            }
        }

        SessionCommand::Size { name, user } => {
            let size = service.session_size(state.owner(user), &name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&size)?);
            } else {
                println!();
                println!("  Session '{}'", style(&name).cyan().bold());
                println!("  {:<16} {}", style("Messages").dim(), size.messages);
                println!(
                    "  {:<16} ~{} / {}",
                    style("Tokens").dim(),
                    size.estimated_tokens,
                    size.context_limit
                );
                println!();
            }
        }

        SessionCommand::SetPrompt { name, prompt, user } => {
            let record = service
                .set_system_prompt(state.owner(user), &name, prompt)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else if record.system_prompt.is_some() {
                println!(
                    "\n  {} System prompt of '{}' updated\n",
                    style("✓").green().bold(),
                    style(&name).cyan()
                );
            } else {
                println!(
                    "\n  {} '{}' uses the default system prompt\n",
                    style("✓").green().bold(),
                    style(&name).cyan()
                );
            }
        }

        SessionCommand::SetModel { name, model, user } => {
            let record = service
                .set_session_model(state.owner(user), &name, &model)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "\n  {} '{}' now uses {}\n",
                    style("✓").green().bold(),
                    style(&name).cyan(),
                    style(&record.model).yellow()
                );
            }
        }
    }
    Ok(())
}

fn print_sessions(owner: u64, sessions: &[SessionRecord]) {
    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions for user {}. Create one with: {}",
            style("i").blue().bold(),
            owner,
            style("lamabridge session new <name>").yellow()
        );
        println!();
        return;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("System prompt").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for session in sessions {
        let prompt = match &session.system_prompt {
            Some(prompt) => Cell::new(truncate(prompt, 40)).fg(Color::White),
            None => Cell::new("(default)").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&session.key.name).fg(Color::Cyan),
            Cell::new(&session.model).fg(Color::Yellow),
            prompt,
            Cell::new(session.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max && line.len() == text.len() {
        return line.to_string();
    }
    let kept: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("be brief", 40), "be brief");
    }

    #[test]
    fn test_truncate_long_text() {
        let text = "a".repeat(50);
        let out = truncate(&text, 10);
        assert_eq!(out, "aaaaaaa...");
    }

    #[test]
    fn test_truncate_keeps_first_line_only() {
        assert_eq!(truncate("line one\nline two", 40), "line one...");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("héllo", 5), "héllo");
    }
}
