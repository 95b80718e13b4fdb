//! Interactive terminal chat.
//!
//! The same `SessionService::respond` path that answers Discord messages runs
//! here against a `TerminalSink`. Entry point: `loop_runner::run_chat_loop`.

pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod terminal;
