use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::channel::{is_visible_to_channel, ChannelView};
use crate::cursors::ReadCursorStore;
use crate::message::Message;
use crate::ports::messages::MessageRepository;
use crate::util::now_ms;

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Computes unread counts by joining messages against read cursors.
///
/// No-cursor policy: a conversation with no cursor row counts ALL history
/// from another party as unread, uniformly at every call site. (The strictly
/// available alternative, defaulting the cursor to "now", would show zero for
/// never-opened conversations and is not used anywhere.)
///
/// Any fetch failure or timeout makes the whole computation report zero:
/// undercounting is preferred over overcounting, and unread badges are
/// advisory.
#[derive(Clone)]
pub struct UnreadCountAggregator {
    messages: Arc<dyn MessageRepository>,
    cursors: ReadCursorStore,
    fetch_timeout: Duration,
}

impl UnreadCountAggregator {
    pub fn new(messages: Arc<dyn MessageRepository>, cursors: ReadCursorStore) -> Self {
        Self::with_fetch_timeout(messages, cursors, Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS))
    }

    pub fn with_fetch_timeout(
        messages: Arc<dyn MessageRepository>,
        cursors: ReadCursorStore,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            cursors,
            fetch_timeout,
        }
    }

    /// Total unread across the given conversations for the user.
    pub async fn compute_unread(&self, user_id: &str, conversation_ids: &[String]) -> u64 {
        self.compute_unread_by_conversation(user_id, conversation_ids)
            .await
            .values()
            .sum()
    }

    /// Per-conversation unread counts. Empty input or empty user id returns
    /// an empty map with zero I/O.
    pub async fn compute_unread_by_conversation(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> HashMap<String, u64> {
        if user_id.is_empty() || conversation_ids.is_empty() {
            return HashMap::new();
        }

        // One reference instant for the whole batch; never re-read per
        // conversation.
        let started_at = now_ms();

        let candidates = match timeout(
            self.fetch_timeout,
            self.messages
                .list_unread_candidates(conversation_ids, user_id),
        )
        .await
        {
            Ok(Ok(messages)) => messages,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, user_id = %user_id, "unread candidate fetch failed; reporting zero");
                return HashMap::new();
            }
            Err(_) => {
                tracing::warn!(user_id = %user_id, timeout_ms = self.fetch_timeout.as_millis() as u64, "unread candidate fetch timed out; reporting zero");
                return HashMap::new();
            }
        };

        let cursors = match timeout(
            self.fetch_timeout,
            self.cursors.get_cursors(user_id, conversation_ids),
        )
        .await
        {
            Ok(Ok(cursors)) => cursors,
            Ok(Err(err)) => {
                // Partial-batch failure fails the whole computation.
                tracing::warn!(error = %err, user_id = %user_id, "cursor fetch failed; reporting zero");
                return HashMap::new();
            }
            Err(_) => {
                tracing::warn!(user_id = %user_id, timeout_ms = self.fetch_timeout.as_millis() as u64, "cursor fetch timed out; reporting zero");
                return HashMap::new();
            }
        };

        let mut counts: HashMap<String, u64> = conversation_ids
            .iter()
            .map(|id| (id.clone(), 0u64))
            .collect();

        for message in &candidates {
            let Some(slot) = counts.get_mut(&message.conversation_id) else {
                continue;
            };
            let unread = match cursors.get(&message.conversation_id) {
                Some(cursor) => message.created_at_ms > cursor.last_read_at_ms,
                // No cursor: everything from another party is unread.
                None => true,
            };
            if unread {
                *slot += 1;
            }
        }

        tracing::debug!(
            user_id = %user_id,
            conversations = conversation_ids.len(),
            candidates = candidates.len(),
            elapsed_ms = now_ms() - started_at,
            "unread aggregation computed"
        );

        counts
    }

    /// Unread count for one private admin channel of a dispute. Channel
    /// membership is decided message-by-message via the union predicate; the
    /// read cursor lives under the channel's own conversation id.
    pub async fn compute_channel_unread(
        &self,
        user_id: &str,
        dispute_conversation_id: &str,
        channel_conversation_id: &str,
        view: &ChannelView,
    ) -> u64 {
        if user_id.is_empty() {
            return 0;
        }

        let messages = match timeout(
            self.fetch_timeout,
            self.messages.list_channel_messages(dispute_conversation_id),
        )
        .await
        {
            Ok(Ok(messages)) => messages,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, dispute_conversation_id = %dispute_conversation_id, "channel message fetch failed; reporting zero");
                return 0;
            }
            Err(_) => {
                tracing::warn!(dispute_conversation_id = %dispute_conversation_id, "channel message fetch timed out; reporting zero");
                return 0;
            }
        };

        let cursor = match self.cursors.get_cursor(user_id, channel_conversation_id).await {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::warn!(error = %err, channel_conversation_id = %channel_conversation_id, "channel cursor fetch failed; reporting zero");
                return 0;
            }
        };
        let cutoff = cursor.map(|c| c.last_read_at_ms);

        messages
            .iter()
            .filter(|message| message.sender_id != user_id)
            .filter(|message| is_visible_to_channel(message, view))
            .filter(|message: &&Message| match cutoff {
                Some(cutoff) => message.created_at_ms > cutoff,
                None => true,
            })
            .count() as u64
    }
}
