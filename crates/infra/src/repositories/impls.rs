//! In-memory repositories backing the "memory" data backend and the test
//! suite. Row layout mirrors the relational tables the production backend
//! exposes; the engine only ever sees the ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rivvlock_domain::conversation::{DisputeSummary, QuoteSummary, TransactionSummary};
use rivvlock_domain::cursors::ReadCursor;
use rivvlock_domain::error::DomainError;
use rivvlock_domain::message::{validate_message_body, Message, MessageKind};
use rivvlock_domain::ports::cursors::ReadCursorRepository;
use rivvlock_domain::ports::entities::EntityRepository;
use rivvlock_domain::ports::messages::MessageRepository;
use rivvlock_domain::ports::BoxFuture;
use rivvlock_domain::util::{now_ms, uuid_v7_without_dashes};
use rivvlock_domain::DomainResult;
use tokio::sync::RwLock;

use crate::observability::register_cursor_upsert;

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<RwLock<Vec<Message>>>,
}

pub struct AppendMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub kind: MessageKind,
    pub recipient_id: Option<String>,
    pub message_type: Option<String>,
    /// Test hook; production rows get a server-assigned timestamp.
    pub created_at_ms: Option<i64>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message row. The timestamp is assigned here, never by the
    /// caller's clock, unless the test hook overrides it.
    pub async fn append(&self, input: AppendMessage) -> DomainResult<Message> {
        validate_message_body(&input.body)?;
        let message = Message {
            message_id: uuid_v7_without_dashes(),
            conversation_id: input.conversation_id,
            sender_id: input.sender_id,
            body: input.body,
            kind: input.kind,
            recipient_id: input.recipient_id,
            message_type: input.message_type,
            metadata: None,
            created_at_ms: input.created_at_ms.unwrap_or_else(now_ms),
        };
        self.messages.write().await.push(message.clone());
        Ok(message)
    }
}

impl MessageRepository for InMemoryMessageRepository {
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
                .filter(|message| {
                    ids.contains(&message.conversation_id) && message.sender_id != exclude
                })
                .cloned()
                .collect())
        })
    }

    fn latest_message_at(&self, conversation_id: &str) -> BoxFuture<'_, DomainResult<Option<i64>>> {
        let conversation_id = conversation_id.to_string();
        Box::pin(async move {
            let messages = self.messages.read().await;
            Ok(messages
                .iter()
                .filter(|message| message.conversation_id == conversation_id)
                .map(|message| message.created_at_ms)
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
            let mut rows: Vec<Message> = messages
                .iter()
                .filter(|message| message.conversation_id == conversation_id)
                .cloned()
                .collect();
            rows.sort_by_key(|message| message.created_at_ms);
            Ok(rows)
        })
    }
}

#[derive(Default)]
pub struct InMemoryReadCursorRepository {
    rows: Arc<RwLock<HashMap<(String, String), ReadCursor>>>,
    fail_writes: AtomicBool,
}

impl InMemoryReadCursorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a persistence outage on the write path.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ReadCursorRepository for InMemoryReadCursorRepository {
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
            if self.fail_writes.load(Ordering::SeqCst) {
                register_cursor_upsert(false);
                return Err(DomainError::Storage("cursor store unavailable".into()));
            }
            let key = (cursor.user_id.clone(), cursor.conversation_id.clone());
            self.rows.write().await.insert(key, cursor.clone());
            register_cursor_upsert(true);
            Ok(cursor)
        })
    }
}

#[derive(Default)]
pub struct InMemoryEntityRepository {
    transactions: Arc<RwLock<Vec<TransactionSummary>>>,
    quotes: Arc<RwLock<Vec<QuoteSummary>>>,
    disputes: Arc<RwLock<Vec<DisputeSummary>>>,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_transaction(&self, transaction: TransactionSummary) {
        self.transactions.write().await.push(transaction);
    }

    pub async fn seed_quote(&self, quote: QuoteSummary) {
        self.quotes.write().await.push(quote);
    }

    pub async fn seed_dispute(&self, dispute: DisputeSummary) {
        self.disputes.write().await.push(dispute);
    }

    pub async fn set_dispute_status(&self, dispute_id: &str, status: &str) {
        let mut disputes = self.disputes.write().await;
        if let Some(dispute) = disputes.iter_mut().find(|d| d.dispute_id == dispute_id) {
            dispute.status = status.to_string();
        }
    }
}

impl EntityRepository for InMemoryEntityRepository {
    fn list_transactions_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<TransactionSummary>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let transactions = self.transactions.read().await;
            Ok(transactions
                .iter()
                .filter(|t| t.seller_id == user_id || t.buyer_id.as_deref() == Some(&user_id))
                .cloned()
                .collect())
        })
    }

    fn list_quotes_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<QuoteSummary>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let quotes = self.quotes.read().await;
            Ok(quotes
                .iter()
                .filter(|q| q.seller_id == user_id || q.client_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn list_disputes_for_user(
        &self,
        user_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<DisputeSummary>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let disputes = self.disputes.read().await;
            Ok(disputes
                .iter()
                .filter(|d| {
                    d.reporter_id == user_id || d.seller_id == user_id || d.buyer_id == user_id
                })
                .cloned()
                .collect())
        })
    }
}
