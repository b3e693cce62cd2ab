use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::aggregator::UnreadCountAggregator;
use crate::cache::CountCache;
use crate::message::Message;
use crate::ports::realtime::{
    ChangeEvent, ChangeEventType, ChangeFeed, SubscriptionHandle, TABLE_DISPUTES, TABLE_MESSAGES,
    TABLE_TRANSACTIONS,
};
use crate::util::now_ms;

const DEFAULT_THROTTLE_WINDOW_MS: i64 = 3_000;

/// One registered aggregate: a cache slot fed by a set of conversations for
/// one user.
#[derive(Clone, Debug)]
pub struct AggregateRegistration {
    pub key: String,
    pub user_id: String,
    pub conversation_ids: HashSet<String>,
}

/// Listens to the change feed and keeps cached aggregates current: optimistic
/// increments on message inserts, throttled authoritative recomputation as
/// confirmation. Recomputations for the same key inside the throttle window
/// are dropped, not queued; the periodic refresh is the backstop.
#[derive(Clone)]
pub struct RealtimeInvalidator {
    feed: Arc<dyn ChangeFeed>,
    aggregator: UnreadCountAggregator,
    cache: CountCache,
    registry: Arc<RwLock<HashMap<String, AggregateRegistration>>>,
    last_fired: Arc<RwLock<HashMap<String, i64>>>,
    handles: Arc<Mutex<Vec<SubscriptionHandle>>>,
    degraded: Arc<AtomicBool>,
    throttle_window_ms: i64,
}

impl RealtimeInvalidator {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        aggregator: UnreadCountAggregator,
        cache: CountCache,
    ) -> Self {
        Self::with_throttle_window(feed, aggregator, cache, DEFAULT_THROTTLE_WINDOW_MS)
    }

    pub fn with_throttle_window(
        feed: Arc<dyn ChangeFeed>,
        aggregator: UnreadCountAggregator,
        cache: CountCache,
        throttle_window_ms: i64,
    ) -> Self {
        Self {
            feed,
            aggregator,
            cache,
            registry: Arc::new(RwLock::new(HashMap::new())),
            last_fired: Arc::new(RwLock::new(HashMap::new())),
            handles: Arc::new(Mutex::new(Vec::new())),
            degraded: Arc::new(AtomicBool::new(false)),
            throttle_window_ms,
        }
    }

    pub fn cache(&self) -> &CountCache {
        &self.cache
    }

    pub async fn register_aggregate(
        &self,
        key: &str,
        user_id: &str,
        conversation_ids: &[String],
    ) {
        let registration = AggregateRegistration {
            key: key.to_string(),
            user_id: user_id.to_string(),
            conversation_ids: conversation_ids.iter().cloned().collect(),
        };
        self.registry
            .write()
            .await
            .insert(key.to_string(), registration);
    }

    pub async fn unregister_aggregate(&self, key: &str) {
        self.registry.write().await.remove(key);
        self.last_fired.write().await.remove(key);
        self.cache.remove(key).await;
    }

    /// Subscribe the event handlers. Idempotent: a re-arm (e.g. after the
    /// transport reconnects) drops the previous subscriptions first, so no
    /// handler is ever registered twice. On subscription failure the engine
    /// degrades to periodic polling; no error is surfaced.
    pub async fn arm(&self) {
        self.disarm().await;

        let mut handles = Vec::new();
        for table in [TABLE_MESSAGES, TABLE_TRANSACTIONS, TABLE_DISPUTES] {
            let this = self.clone();
            let handler: crate::ports::realtime::EventHandler = Arc::new(move |event| {
                let this = this.clone();
                tokio::spawn(async move { this.handle_event(event).await });
            });
            match self.feed.subscribe(table, handler).await {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        table = %table,
                        "realtime subscription failed; degrading to periodic polling"
                    );
                    // Tear down whatever did register and fall back entirely.
                    for handle in handles.drain(..) {
                        let _ = self.feed.unsubscribe(handle).await;
                    }
                    self.degraded.store(true, Ordering::SeqCst);
                    return;
                }
            }
        }

        self.degraded.store(false, Ordering::SeqCst);
        *self.handles.lock().await = handles;
    }

    pub async fn disarm(&self) {
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = self.feed.unsubscribe(handle).await;
        }
    }

    /// True when the realtime path is down and only the periodic refresh
    /// keeps counts current.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub(crate) async fn handle_event(&self, event: ChangeEvent) {
        match (event.table.as_str(), event.event_type) {
            (TABLE_MESSAGES, ChangeEventType::Insert) => {
                let Ok(message) = serde_json::from_value::<Message>(event.new_row) else {
                    tracing::debug!("unparseable message insert event; ignoring");
                    return;
                };
                self.on_message_insert(&message).await;
            }
            (TABLE_TRANSACTIONS | TABLE_DISPUTES, ChangeEventType::Update) => {
                // A status change can move conversations between categories;
                // recompute every registered aggregate, throttled per key.
                let keys: Vec<String> = self.registry.read().await.keys().cloned().collect();
                for key in keys {
                    self.recompute_throttled(&key).await;
                }
            }
            _ => {}
        }
    }

    async fn on_message_insert(&self, message: &Message) {
        let matching: Vec<AggregateRegistration> = {
            let registry = self.registry.read().await;
            registry
                .values()
                .filter(|registration| {
                    registration.conversation_ids.contains(&message.conversation_id)
                        // Own messages are never unread for their author.
                        && registration.user_id != message.sender_id
                })
                .cloned()
                .collect()
        };

        for registration in matching {
            self.cache.apply_optimistic_delta(&registration.key, 1).await;
            self.recompute_throttled(&registration.key).await;
        }
    }

    /// At most one recomputation per key per window; extra requests inside
    /// the window are dropped.
    async fn recompute_throttled(&self, key: &str) {
        if !self.should_fire(key).await {
            tracing::debug!(key = %key, "recompute throttled; dropping");
            return;
        }
        self.recompute(key).await;
    }

    /// Unthrottled authoritative recomputation of one aggregate.
    pub async fn recompute(&self, key: &str) {
        let registration = {
            let registry = self.registry.read().await;
            registry.get(key).cloned()
        };
        let Some(registration) = registration else {
            return;
        };
        let ids: Vec<String> = registration.conversation_ids.iter().cloned().collect();
        let total = self
            .aggregator
            .compute_unread(&registration.user_id, &ids)
            .await;
        self.cache.set_authoritative(key, total).await;
    }

    /// Reconcile every aggregate containing the conversation, bypassing the
    /// throttle (mark-as-read must converge promptly).
    pub async fn refresh_conversation(&self, conversation_id: &str) {
        let keys: Vec<String> = {
            let registry = self.registry.read().await;
            registry
                .values()
                .filter(|registration| {
                    registration
                        .conversation_ids
                        .contains(conversation_id)
                })
                .map(|registration| registration.key.clone())
                .collect()
        };
        for key in keys {
            self.recompute(&key).await;
        }
    }

    /// Recompute every registered aggregate; the periodic fallback path.
    pub async fn refresh_all(&self) {
        let keys: Vec<String> = self.registry.read().await.keys().cloned().collect();
        for key in keys {
            self.recompute(&key).await;
        }
    }

    async fn should_fire(&self, key: &str) -> bool {
        let now = now_ms();
        let mut last_fired = self.last_fired.write().await;
        match last_fired.get(key) {
            Some(at) if now - at < self.throttle_window_ms => false,
            _ => {
                last_fired.insert(key.to_string(), now);
                true
            }
        }
    }
}
