use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ports::BoxFuture;
use crate::DomainResult;

pub const TABLE_MESSAGES: &str = "messages";
pub const TABLE_TRANSACTIONS: &str = "transactions";
pub const TABLE_DISPUTES: &str = "disputes";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    pub table: String,
    pub new_row: serde_json::Value,
    pub old_row: Option<serde_json::Value>,
}

pub type EventHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Generic change feed. Reconnection is the transport's responsibility; the
/// invalidator only guarantees handler re-arming without duplicates.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(
        &self,
        table: &str,
        handler: EventHandler,
    ) -> BoxFuture<'_, DomainResult<SubscriptionHandle>>;

    fn unsubscribe(&self, handle: SubscriptionHandle) -> BoxFuture<'_, DomainResult<()>>;
}
