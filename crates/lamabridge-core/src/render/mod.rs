//! Streaming response rendering.
//!
//! - `MessageSink`: port for sending and editing outbound chat messages
//! - `ThinkingFilter`: folds thinking segments out of the display text
//! - `StreamRenderer`: turns a token stream into length-bounded, rate-limited
//!   message sends and edits

pub mod renderer;
pub mod sink;
pub mod thinking;

pub use renderer::{RenderOutcome, RenderPolicy, StreamRenderer};
pub use sink::MessageSink;
pub use thinking::ThinkingFilter;
