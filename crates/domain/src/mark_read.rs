use std::sync::Arc;

use crate::cursors::ReadCursorStore;
use crate::invalidator::RealtimeInvalidator;
use crate::ports::messages::MessageRepository;
use crate::util::now_ms;

/// Cache slot for a single conversation's own unread badge.
pub fn conversation_cache_key(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}")
}

/// The write path of the read-state protocol: persist a cursor at the
/// conversation's newest message, zero the local badge immediately, reconcile
/// the affected aggregates afterwards.
#[derive(Clone)]
pub struct MarkAsReadProtocol {
    messages: Arc<dyn MessageRepository>,
    cursors: ReadCursorStore,
    invalidator: RealtimeInvalidator,
}

impl MarkAsReadProtocol {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        cursors: ReadCursorStore,
        invalidator: RealtimeInvalidator,
    ) -> Self {
        Self {
            messages,
            cursors,
            invalidator,
        }
    }

    /// Fire-and-forget from the caller's perspective; never errors.
    ///
    /// The cursor value is the `created_at_ms` of the conversation's most
    /// recent message, fetched fresh; "now" when the conversation is empty.
    /// The optimistic zero is applied even when the cursor write fails: a
    /// transient failure leaves a stale "read" state until the next
    /// successful mark rather than blocking the view.
    pub async fn mark_read(&self, user_id: &str, conversation_id: &str) {
        if user_id.is_empty() || conversation_id.is_empty() {
            return;
        }

        let last_read_at_ms = match self.messages.latest_message_at(conversation_id).await {
            Ok(Some(at)) => at,
            Ok(None) => now_ms(),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    conversation_id = %conversation_id,
                    "latest-message fetch failed; marking read at current time"
                );
                now_ms()
            }
        };

        let confirmed = self.cursors.mark(user_id, conversation_id, last_read_at_ms).await;
        if !confirmed {
            tracing::debug!(
                conversation_id = %conversation_id,
                "cursor write unconfirmed; optimistic zero still applied"
            );
        }

        self.invalidator
            .cache()
            .zero(&conversation_cache_key(conversation_id))
            .await;

        // Reconcile aggregates off the caller's path; the optimistic zero is
        // already visible.
        let invalidator = self.invalidator.clone();
        let conversation_id = conversation_id.to_string();
        tokio::spawn(async move {
            invalidator.refresh_conversation(&conversation_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::UnreadCountAggregator;
    use crate::cache::CountCache;
    use crate::cursors::ReadCursor;
    use crate::error::DomainError;
    use crate::message::{Message, MessageKind};
    use crate::ports::cursors::ReadCursorRepository;
    use crate::ports::realtime::{ChangeFeed, EventHandler, SubscriptionHandle};
    use crate::ports::BoxFuture;
    use crate::DomainResult;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    struct NullFeed;

    impl ChangeFeed for NullFeed {
        fn subscribe(
            &self,
            _table: &str,
            _handler: EventHandler,
        ) -> BoxFuture<'_, DomainResult<SubscriptionHandle>> {
            Box::pin(async move { Ok(SubscriptionHandle(0)) })
        }

        fn unsubscribe(&self, _handle: SubscriptionHandle) -> BoxFuture<'_, DomainResult<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    #[derive(Default)]
    struct MockMessageRepo {
        messages: RwLock<Vec<Message>>,
    }

    impl MessageRepository for MockMessageRepo {
        fn list_unread_candidates(
            &self,
            conversation_ids: &[String],
            exclude_sender: &str,
        ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
            let ids: Vec<String> = conversation_ids.to_vec();
            let exclude = exclude_sender.to_string();
            Box::pin(async move {
                let messages = self.messages.read().await;
                Ok(messages
                    .iter()
                    .filter(|m| ids.contains(&m.conversation_id) && m.sender_id != exclude)
                    .cloned()
                    .collect())
            })
        }

        fn latest_message_at(
            &self,
            conversation_id: &str,
        ) -> BoxFuture<'_, DomainResult<Option<i64>>> {
            let conversation_id = conversation_id.to_string();
            Box::pin(async move {
                let messages = self.messages.read().await;
                Ok(messages
                    .iter()
                    .filter(|m| m.conversation_id == conversation_id)
                    .map(|m| m.created_at_ms)
                    .max())
            })
        }

        fn list_channel_messages(
            &self,
            conversation_id: &str,
        ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
            let conversation_id = conversation_id.to_string();
            Box::pin(async move {
                let messages = self.messages.read().await;
                Ok(messages
                    .iter()
                    .filter(|m| m.conversation_id == conversation_id)
                    .cloned()
                    .collect())
            })
        }
    }

    #[derive(Default)]
    struct MockCursorRepo {
        rows: RwLock<HashMap<(String, String), ReadCursor>>,
        fail_writes: bool,
    }

    impl ReadCursorRepository for MockCursorRepo {
        fn get(
            &self,
            user_id: &str,
            conversation_id: &str,
        ) -> BoxFuture<'_, DomainResult<Option<ReadCursor>>> {
            let key = (user_id.to_string(), conversation_id.to_string());
            Box::pin(async move { Ok(self.rows.read().await.get(&key).cloned()) })
        }

        fn get_many(
            &self,
            user_id: &str,
            conversation_ids: &[String],
        ) -> BoxFuture<'_, DomainResult<HashMap<String, ReadCursor>>> {
            let user_id = user_id.to_string();
            let ids: Vec<String> = conversation_ids.to_vec();
            Box::pin(async move {
                let rows = self.rows.read().await;
                let mut out = HashMap::new();
                for id in ids {
                    if let Some(cursor) = rows.get(&(user_id.clone(), id.clone())) {
                        out.insert(id, cursor.clone());
                    }
                }
                Ok(out)
            })
        }

        fn upsert(&self, cursor: &ReadCursor) -> BoxFuture<'_, DomainResult<ReadCursor>> {
            let cursor = cursor.clone();
            Box::pin(async move {
                if self.fail_writes {
                    return Err(DomainError::Storage("write rejected".into()));
                }
                let key = (cursor.user_id.clone(), cursor.conversation_id.clone());
                self.rows.write().await.insert(key, cursor.clone());
                Ok(cursor)
            })
        }
    }

    fn msg(id: &str, conversation: &str, sender: &str, created_at_ms: i64) -> Message {
        Message {
            message_id: id.to_string(),
            conversation_id: conversation.to_string(),
            sender_id: sender.to_string(),
            body: "body".to_string(),
            kind: MessageKind::Text,
            recipient_id: None,
            message_type: None,
            metadata: None,
            created_at_ms,
        }
    }

    fn protocol(
        messages: Arc<MockMessageRepo>,
        cursor_repo: Arc<MockCursorRepo>,
    ) -> MarkAsReadProtocol {
        let cursors = ReadCursorStore::new(cursor_repo);
        let aggregator = UnreadCountAggregator::new(messages.clone(), cursors.clone());
        let invalidator =
            RealtimeInvalidator::new(Arc::new(NullFeed), aggregator, CountCache::new());
        MarkAsReadProtocol::new(messages, cursors, invalidator)
    }

    #[tokio::test]
    async fn cursor_lands_on_latest_message_timestamp() {
        let messages = Arc::new(MockMessageRepo::default());
        messages.messages.write().await.extend([
            msg("m-1", "c-1", "u-2", 1_000),
            msg("m-2", "c-1", "u-2", 3_000),
        ]);
        let cursor_repo = Arc::new(MockCursorRepo::default());
        let protocol = protocol(messages, cursor_repo.clone());

        protocol.mark_read("u-1", "c-1").await;

        let cursor = cursor_repo
            .rows
            .read()
            .await
            .get(&("u-1".to_string(), "c-1".to_string()))
            .cloned()
            .unwrap();
        assert_eq!(cursor.last_read_at_ms, 3_000);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let messages = Arc::new(MockMessageRepo::default());
        messages
            .messages
            .write()
            .await
            .push(msg("m-1", "c-1", "u-2", 2_000));
        let cursor_repo = Arc::new(MockCursorRepo::default());
        let protocol = protocol(messages, cursor_repo.clone());

        protocol.mark_read("u-1", "c-1").await;
        protocol.mark_read("u-1", "c-1").await;

        let cursor = cursor_repo
            .rows
            .read()
            .await
            .get(&("u-1".to_string(), "c-1".to_string()))
            .cloned()
            .unwrap();
        assert_eq!(cursor.last_read_at_ms, 2_000);
    }

    #[tokio::test]
    async fn empty_conversation_marks_at_current_time() {
        let messages = Arc::new(MockMessageRepo::default());
        let cursor_repo = Arc::new(MockCursorRepo::default());
        let protocol = protocol(messages, cursor_repo.clone());

        let before = now_ms();
        protocol.mark_read("u-1", "c-empty").await;
        let after = now_ms();

        let cursor = cursor_repo
            .rows
            .read()
            .await
            .get(&("u-1".to_string(), "c-empty".to_string()))
            .cloned()
            .unwrap();
        assert!(cursor.last_read_at_ms >= before && cursor.last_read_at_ms <= after);
    }

    #[tokio::test]
    async fn optimistic_zero_survives_write_failure() {
        let messages = Arc::new(MockMessageRepo::default());
        messages
            .messages
            .write()
            .await
            .push(msg("m-1", "c-1", "u-2", 1_000));
        let cursor_repo = Arc::new(MockCursorRepo {
            fail_writes: true,
            ..Default::default()
        });
        let protocol = protocol(messages, cursor_repo.clone());

        protocol.mark_read("u-1", "c-1").await;

        // No cursor persisted, but the badge is zeroed locally anyway:
        // availability over consistency.
        assert!(cursor_repo.rows.read().await.is_empty());
        assert_eq!(
            protocol
                .invalidator
                .cache()
                .displayed(&conversation_cache_key("c-1"))
                .await,
            Some(0)
        );
    }

    #[tokio::test]
    async fn missing_user_or_conversation_is_a_no_op() {
        let messages = Arc::new(MockMessageRepo::default());
        let cursor_repo = Arc::new(MockCursorRepo::default());
        let protocol = protocol(messages, cursor_repo.clone());

        protocol.mark_read("", "c-1").await;
        protocol.mark_read("u-1", "").await;
        assert!(cursor_repo.rows.read().await.is_empty());
    }
}
