//! The facade the view layer consumes: cache-backed unread counts, category
//! wrappers over the resolver, mark-as-read, realtime arming and the periodic
//! refresh fallback. Stands in for the per-screen hooks of the original UI.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::UnreadCountAggregator;
use crate::cache::CountCache;
use crate::channel::{channel_conversation_id, ChannelRole, ChannelView};
use crate::conversation::{DisputeSummary, QUOTE_TAB_RECEIVED, QUOTE_TAB_SENT, TRANSACTION_TABS};
use crate::cursors::ReadCursorStore;
use crate::identity::ActorIdentity;
use crate::invalidator::RealtimeInvalidator;
use crate::mark_read::{conversation_cache_key, MarkAsReadProtocol};
use crate::ports::cursors::ReadCursorRepository;
use crate::ports::entities::EntityRepository;
use crate::ports::messages::MessageRepository;
use crate::ports::realtime::ChangeFeed;
use crate::resolver;
use crate::util::aggregate_fingerprint;

#[derive(Clone, Debug)]
pub struct UnreadEngineConfig {
    /// Staleness window for dispute/transaction-level aggregates.
    pub fine_stale_ms: i64,
    /// Staleness window for whole-category totals.
    pub coarse_stale_ms: i64,
    pub throttle_window_ms: i64,
    pub fetch_timeout_ms: u64,
    /// Interval of the periodic refresh that backstops the realtime path.
    pub refresh_interval_ms: u64,
}

impl Default for UnreadEngineConfig {
    fn default() -> Self {
        Self {
            fine_stale_ms: 5_000,
            coarse_stale_ms: 30_000,
            throttle_window_ms: 3_000,
            fetch_timeout_ms: 10_000,
            refresh_interval_ms: 30_000,
        }
    }
}

/// Per-call overrides, mirroring the options of the original hook.
#[derive(Clone, Debug)]
pub struct UnreadOptions {
    pub stale_ms: i64,
}

fn dispute_cache_key(user_id: &str, dispute_id: &str) -> String {
    format!("dispute:{user_id}:{dispute_id}")
}

fn channel_cache_key(viewer_id: &str, channel_conversation_id: &str) -> String {
    format!("channel:{viewer_id}:{channel_conversation_id}")
}

#[derive(Clone)]
pub struct UnreadService {
    entities: Arc<dyn EntityRepository>,
    aggregator: UnreadCountAggregator,
    invalidator: RealtimeInvalidator,
    mark_read: MarkAsReadProtocol,
    config: UnreadEngineConfig,
}

impl UnreadService {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        messages: Arc<dyn MessageRepository>,
        cursor_repository: Arc<dyn ReadCursorRepository>,
        feed: Arc<dyn ChangeFeed>,
        config: UnreadEngineConfig,
    ) -> Self {
        let cursors = ReadCursorStore::new(cursor_repository);
        let aggregator = UnreadCountAggregator::with_fetch_timeout(
            messages.clone(),
            cursors.clone(),
            Duration::from_millis(config.fetch_timeout_ms),
        );
        let invalidator = RealtimeInvalidator::with_throttle_window(
            feed,
            aggregator.clone(),
            CountCache::new(),
            config.throttle_window_ms,
        );
        let mark_read = MarkAsReadProtocol::new(messages, cursors, invalidator.clone());
        Self {
            entities,
            aggregator,
            invalidator,
            mark_read,
            config,
        }
    }

    pub fn invalidator(&self) -> &RealtimeInvalidator {
        &self.invalidator
    }

    /// Subscribe the realtime handlers. Safe to call again after a transport
    /// reconnect; failure silently degrades to the periodic refresh.
    pub async fn arm_realtime(&self) {
        self.invalidator.arm().await;
    }

    /// Tear down the realtime subscriptions (view unmount, logout).
    pub async fn shutdown_realtime(&self) {
        self.invalidator.disarm().await;
    }

    /// Background refresh of every registered aggregate; the safety net when
    /// realtime events are dropped or the subscription is down. The caller
    /// owns the handle and aborts it on unmount.
    pub fn spawn_periodic_refresh(&self) -> tokio::task::JoinHandle<()> {
        let invalidator = self.invalidator.clone();
        let period = Duration::from_millis(self.config.refresh_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The immediate first tick would race the initial computation.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                invalidator.refresh_all().await;
            }
        })
    }

    /// Cache-backed unread total over an explicit conversation set. The
    /// aggregate is registered with the invalidator so realtime events keep
    /// it current between reads.
    pub async fn unread_count(
        &self,
        user_id: &str,
        conversation_ids: &[String],
        cache_key: Option<&str>,
        options: &UnreadOptions,
    ) -> u64 {
        if user_id.is_empty() || conversation_ids.is_empty() {
            return 0;
        }

        let key = match cache_key {
            Some(key) => key.to_string(),
            // A single conversation shares the slot mark-as-read zeroes, so
            // the optimistic zero is served here until the confirming
            // recompute resolves.
            None if conversation_ids.len() == 1 => conversation_cache_key(&conversation_ids[0]),
            None => format!("agg:{}", aggregate_fingerprint(conversation_ids)),
        };

        if let Some(value) = self.invalidator.cache().fresh(&key, options.stale_ms).await {
            return value;
        }

        self.invalidator
            .register_aggregate(&key, user_id, conversation_ids)
            .await;
        let total = self.aggregator.compute_unread(user_id, conversation_ids).await;
        self.invalidator.cache().set_authoritative(&key, total).await;
        total
    }

    pub async fn mark_as_read(&self, user_id: &str, conversation_id: &str) {
        self.mark_read.mark_read(user_id, conversation_id).await;
    }

    /// Unread totals per transaction tab (pending/blocked/disputed/completed).
    pub async fn transaction_tab_counts(&self, actor: &ActorIdentity) -> HashMap<String, u64> {
        let transactions = match self
            .entities
            .list_transactions_for_user(&actor.user_id)
            .await
        {
            Ok(transactions) => transactions,
            Err(err) => {
                tracing::warn!(error = %err, user_id = %actor.user_id, "transaction fetch failed; reporting zero badges");
                return TRANSACTION_TABS
                    .iter()
                    .map(|tab| ((*tab).to_string(), 0))
                    .collect();
            }
        };

        let mut counts = HashMap::new();
        for tab in TRANSACTION_TABS {
            let ids =
                resolver::transaction_conversations_for_tab(&actor.user_id, &transactions, tab);
            let key = format!("transactions:{}:{tab}", actor.user_id);
            let total = self
                .unread_count(
                    &actor.user_id,
                    &ids,
                    Some(&key),
                    &UnreadOptions {
                        stale_ms: self.config.coarse_stale_ms,
                    },
                )
                .await;
            counts.insert((*tab).to_string(), total);
        }
        counts
    }

    /// Unread totals for the quote tabs (sent/received).
    pub async fn quote_tab_counts(&self, actor: &ActorIdentity) -> HashMap<String, u64> {
        let quotes = match self.entities.list_quotes_for_user(&actor.user_id).await {
            Ok(quotes) => quotes,
            Err(err) => {
                tracing::warn!(error = %err, user_id = %actor.user_id, "quote fetch failed; reporting zero badges");
                return [QUOTE_TAB_SENT, QUOTE_TAB_RECEIVED]
                    .iter()
                    .map(|tab| ((*tab).to_string(), 0))
                    .collect();
            }
        };

        let mut counts = HashMap::new();
        for tab in [QUOTE_TAB_SENT, QUOTE_TAB_RECEIVED] {
            let ids = resolver::quote_conversations_for_tab(&actor.user_id, &quotes, tab);
            let key = format!("quotes:{}:{tab}", actor.user_id);
            let total = self
                .unread_count(
                    &actor.user_id,
                    &ids,
                    Some(&key),
                    &UnreadOptions {
                        stale_ms: self.config.coarse_stale_ms,
                    },
                )
                .await;
            counts.insert(tab.to_string(), total);
        }
        counts
    }

    /// Per-dispute unread counts for the public dispute threads the user can
    /// see. Terminal disputes are excluded by the resolver.
    pub async fn dispute_unread_counts(&self, actor: &ActorIdentity) -> HashMap<String, u64> {
        let disputes = match self.entities.list_disputes_for_user(&actor.user_id).await {
            Ok(disputes) => disputes,
            Err(err) => {
                tracing::warn!(error = %err, user_id = %actor.user_id, "dispute fetch failed; reporting zero badges");
                return HashMap::new();
            }
        };

        let ids = resolver::dispute_conversations(&actor.user_id, &disputes);
        if ids.is_empty() {
            return HashMap::new();
        }

        // Serve per-dispute slots still inside the fine staleness window;
        // only the stale remainder hits the repositories.
        let mut counts = HashMap::new();
        let mut stale_ids: Vec<String> = Vec::new();
        for dispute in &disputes {
            if !ids.contains(&dispute.conversation_id) {
                continue;
            }
            let key = dispute_cache_key(&actor.user_id, &dispute.dispute_id);
            match self
                .invalidator
                .cache()
                .fresh(&key, self.config.fine_stale_ms)
                .await
            {
                Some(value) => {
                    counts.insert(dispute.dispute_id.clone(), value);
                }
                None => stale_ids.push(dispute.conversation_id.clone()),
            }
        }
        if stale_ids.is_empty() {
            return counts;
        }

        let per_conversation = self
            .aggregator
            .compute_unread_by_conversation(&actor.user_id, &stale_ids)
            .await;
        for dispute in &disputes {
            if let Some(count) = per_conversation.get(&dispute.conversation_id) {
                counts.insert(dispute.dispute_id.clone(), *count);
                let key = dispute_cache_key(&actor.user_id, &dispute.dispute_id);
                self.invalidator
                    .register_aggregate(
                        &key,
                        &actor.user_id,
                        std::slice::from_ref(&dispute.conversation_id),
                    )
                    .await;
                self.invalidator.cache().set_authoritative(&key, *count).await;
            }
        }
        counts
    }

    /// Unread count for one private admin channel of a dispute, as seen by
    /// `viewer_id` (the admin or the counterpart themselves).
    pub async fn admin_channel_unread(
        &self,
        viewer_id: &str,
        dispute: &DisputeSummary,
        role: ChannelRole,
    ) -> u64 {
        let counterpart_id = match role {
            ChannelRole::Seller => dispute.seller_id.clone(),
            ChannelRole::Buyer => dispute.buyer_id.clone(),
        };
        let view = ChannelView {
            counterpart_role: role,
            counterpart_id,
            viewer_id: viewer_id.to_string(),
        };
        let channel_id = channel_conversation_id(&dispute.conversation_id, role);
        let key = channel_cache_key(viewer_id, &channel_id);
        if let Some(value) = self
            .invalidator
            .cache()
            .fresh(&key, self.config.fine_stale_ms)
            .await
        {
            return value;
        }

        let count = self
            .aggregator
            .compute_channel_unread(viewer_id, &dispute.conversation_id, &channel_id, &view)
            .await;
        // Not registered with the invalidator: its recompute path does not
        // apply the channel membership predicate, so a realtime-triggered
        // recomputation would overcount. The staleness window bounds drift.
        self.invalidator.cache().set_authoritative(&key, count).await;
        count
    }

    /// Mark a private admin channel as read under its own cursor id.
    pub async fn mark_channel_read(
        &self,
        viewer_id: &str,
        dispute: &DisputeSummary,
        role: ChannelRole,
    ) {
        let channel_id = channel_conversation_id(&dispute.conversation_id, role);
        self.invalidator
            .cache()
            .zero(&channel_cache_key(viewer_id, &channel_id))
            .await;
        self.mark_read.mark_read(viewer_id, &channel_id).await;
    }
}
