//! Discord REST adapter.
//!
//! Implements the outbound side of the bridge over Discord's HTTP API v10:
//! [`MessageSink`](lamabridge_core::render::sink::MessageSink) for sending
//! and editing replies, and
//! [`ChannelHistory`](lamabridge_core::chat::history::ChannelHistory) for
//! reading recent channel messages. Gateway (event) handling is not part
//! of this crate.

pub mod rest;
pub mod types;

pub use rest::{DiscordRest, RetryPolicy};
