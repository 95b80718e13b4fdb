//! ChannelHistory trait definition.

use lamabridge_types::chat::ChannelMessage;
use lamabridge_types::platform::DeliveryError;

/// Read access to recent messages of a chat channel.
///
/// Used to synthesize the temporary (global) session on every request.
pub trait ChannelHistory: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChannelMessage>, DeliveryError>> + Send;
}
