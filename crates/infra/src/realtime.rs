//! Tokio-broadcast adapter for the change feed port. One channel fans events
//! out to per-subscription forwarding tasks; a lagged subscriber drops events
//! rather than queueing them, matching the engine's coalescing contract (the
//! periodic refresh is the backstop).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rivvlock_domain::ports::realtime::{ChangeEvent, ChangeFeed, EventHandler, SubscriptionHandle};
use rivvlock_domain::ports::BoxFuture;
use rivvlock_domain::DomainResult;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::observability::{
    register_event_delivered, register_event_lagged, register_event_published,
};

pub struct BroadcastChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    next_id: AtomicU64,
    tasks: Arc<RwLock<HashMap<SubscriptionHandle, JoinHandle<()>>>>,
}

impl BroadcastChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish one change event to every live subscription. Returns the
    /// number of receivers the event reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        register_event_published(&event.table);
        self.sender.send(event).unwrap_or(0)
    }

    pub async fn active_subscriptions(&self) -> usize {
        self.tasks.read().await.len()
    }
}

impl Default for BroadcastChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn subscribe(
        &self,
        table: &str,
        handler: EventHandler,
    ) -> BoxFuture<'_, DomainResult<SubscriptionHandle>> {
        let table = table.to_string();
        Box::pin(async move {
            let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::SeqCst));
            let mut receiver = self.sender.subscribe();
            let task = tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if event.table == table {
                                register_event_delivered(&table);
                                handler(event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            register_event_lagged(&table, skipped);
                            tracing::warn!(
                                table = %table,
                                skipped,
                                "change feed subscriber lagged; dropped events"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
            self.tasks.write().await.insert(handle, task);
            Ok(handle)
        })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async move {
            if let Some(task) = self.tasks.write().await.remove(&handle) {
                task.abort();
            }
            Ok(())
        })
    }
}
