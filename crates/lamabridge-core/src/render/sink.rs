//! MessageSink trait definition.

use lamabridge_types::platform::{DeliveryError, MessageHandle, ReplyTarget};

/// Outbound message primitives of a chat platform.
///
/// Implementations apply their own retry policy; an `Err` means retries
/// are exhausted. Implementations live in lamabridge-infra (Discord) and
/// lamabridge-api (terminal).
pub trait MessageSink: Send + Sync {
    /// Send a new message into the target channel, as a reply to the
    /// target message when there is one.
    fn send(
        &self,
        target: &ReplyTarget,
        content: &str,
    ) -> impl std::future::Future<Output = Result<MessageHandle, DeliveryError>> + Send;

    /// Replace the content of a message previously sent by `send`.
    fn edit(
        &self,
        handle: &MessageHandle,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}
