//! `lamabridge reply`: answer one Discord message, streaming the reply into
//! its channel through the REST API.

use anyhow::{Context, bail};
use console::style;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use lamabridge_core::chat::history::ChannelHistory;
use lamabridge_core::chat::service::ReplyRequest;
use lamabridge_infra::discord::DiscordRest;
use lamabridge_infra::discord::rest::MAX_HISTORY_PAGE;
use lamabridge_types::chat::ChannelMessage;
use lamabridge_types::platform::ReplyTarget;

use crate::cli::AuthorArgs;
use crate::state::AppState;

/// Arguments of the `reply` command.
pub struct ReplyArgs {
    pub channel: String,
    pub message: Option<String>,
    pub author: AuthorArgs,
    pub session: Option<String>,
    pub token: Option<String>,
    pub content: Option<String>,
}

pub async fn reply(state: &AppState, args: ReplyArgs, json: bool) -> anyhow::Result<()> {
    let token = args
        .token
        .clone()
        .or_else(|| state.config.bot.discord_token.clone())
        .context("no Discord token: set bot.discord_token or LAMABRIDGE_DISCORD_TOKEN")?;
    let rest = DiscordRest::new(SecretString::from(token))?;
    let (rest, me) = rest.identify().await?;

    let request = match &args.content {
        Some(content) => ReplyRequest {
            author_id: state.owner(args.author.user),
            author_name: args.author.name.clone(),
            session_name: args.session.clone(),
            content: content.clone(),
            mentions: Vec::new(),
            target: ReplyTarget {
                channel_id: args.channel.clone(),
                message_id: args.message.clone(),
            },
        },
        None => {
            let Some(message_id) = args.message.as_deref() else {
                bail!("give the message text or --message to answer an existing one");
            };
            let recent = rest
                .recent_messages(&args.channel, MAX_HISTORY_PAGE)
                .await?;
            let Some(trigger) = recent.iter().find(|m| m.id == message_id) else {
                bail!("message {message_id} is not among the last {MAX_HISTORY_PAGE} in the channel");
            };
            if trigger.from_self {
                bail!("message {message_id} was written by {}", me.display_name());
            }
            request_for(trigger, &args.channel, args.session.clone())
        }
    };

    let prefix = &state.config.bot.command_prefix;
    if is_command(&request.content, prefix) {
        bail!(
            "'{}' starts with the command prefix '{prefix}'; use the lamabridge subcommands for session commands",
            request.content
        );
    }

    let cancel = CancellationToken::new();
    let result = {
        let respond = state
            .session_service
            .respond(&request, &rest, &rest, &cancel);
        tokio::pin!(respond);
        tokio::select! {
            result = &mut respond => result,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                respond.await
            }
        }
    };
    let outcome = result?;

    if json {
        let out = serde_json::json!({
            "channel": args.channel,
            "messages": outcome.messages.iter().map(|m| &m.message_id).collect::<Vec<_>>(),
            "edits": outcome.edits,
            "text": outcome.display_text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "\n  {} Replied as {} in {} message{} ({} edits)\n",
            style("✓").green().bold(),
            style(me.display_name()).cyan(),
            outcome.messages.len(),
            if outcome.messages.len() == 1 { "" } else { "s" },
            outcome.edits
        );
    }
    Ok(())
}

/// A reply request answering `trigger` on behalf of its author.
fn request_for(trigger: &ChannelMessage, channel: &str, session: Option<String>) -> ReplyRequest {
    ReplyRequest {
        author_id: trigger.author_id,
        author_name: trigger.author_name.clone(),
        session_name: session,
        content: trigger.content.clone(),
        mentions: trigger.mentions.clone(),
        target: ReplyTarget {
            channel_id: channel.to_string(),
            message_id: Some(trigger.id.clone()),
        },
    }
}

fn is_command(content: &str, prefix: &str) -> bool {
    !prefix.is_empty() && content.trim_start().starts_with(prefix)
}
