//! lamabridge command line entry point.
//!
//! Binary name: `lamabridge`
//!
//! Parses CLI arguments, sets up tracing, loads the configuration and
//! services, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use lamabridge_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::reply::ReplyArgs;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = match cli.command {
        // Writing the example config must work without a valid config.
        Commands::InitConfig { force } => {
            return cli::config::init_config(&cli.config, force, cli.json).await;
        }
        command => command,
    };

    let state = AppState::init(&cli.config).await?;
    dispatch(command, &state, cli.json).await
}

async fn dispatch(command: Commands, state: &AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Chat { author, session } => {
            cli::chat::loop_runner::run_chat_loop(state, author, session).await?;
        }

        Commands::Session { action } => {
            cli::session::handle_session_command(action, state, json).await?;
        }

        Commands::Models => {
            cli::models::list_models(state, json).await?;
        }

        Commands::Reply {
            channel,
            message,
            author,
            session,
            token,
            content,
        } => {
            let args = ReplyArgs {
                channel,
                message,
                author,
                session,
                token,
                content,
            };
            cli::reply::reply(state, args, json).await?;
        }

        Commands::InitConfig { force } => {
            cli::config::init_config(&state.config_path, force, json).await?;
        }
    }

    Ok(())
}
