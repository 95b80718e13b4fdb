//! Slash command parsing for the chat loop.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat.
    Exit,
    /// Show the size of the current private session.
    Size,
    /// Forget the temporary conversation.
    Reset,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_lowercase();

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/size" => Some(ChatCommand::Size),
        "/reset" => Some(ChatCommand::Reset),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Help text listing all available commands.
pub fn help_text() -> String {
    format!(
        "\n  {}\n\n  {}    Show this help message\n  {}   Clear the screen\n  {}    Show message count and token usage\n  {}   Forget a temporary conversation\n  {}    End the chat\n\n  {}\n",
        style("Available commands:").bold(),
        style("/help").cyan(),
        style("/clear").cyan(),
        style("/size").cyan(),
        style("/reset").cyan(),
        style("/exit").cyan(),
        style("Ctrl+C stops a reply in progress, Ctrl+D exits").dim()
    )
}
