use crate::message::Message;
use crate::ports::BoxFuture;
use crate::DomainResult;

/// Read-only view over the message table. The messaging subsystem owns the
/// rows; the unread engine only scans them.
pub trait MessageRepository: Send + Sync {
    /// All messages in any of the given conversations NOT authored by
    /// `exclude_sender`. Must be a single round-trip regardless of list size.
    fn list_unread_candidates(
        &self,
        conversation_ids: &[String],
        exclude_sender: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>>;

    /// `created_at_ms` of the most recent message in the conversation.
    fn latest_message_at(&self, conversation_id: &str) -> BoxFuture<'_, DomainResult<Option<i64>>>;

    /// Every message in a dispute conversation, all channels included. The
    /// caller applies the channel predicate.
    fn list_channel_messages(
        &self,
        conversation_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>>;
}
