//! Local cache for computed unread counts.
//!
//! Two writers feed each slot: authoritative recomputation results and
//! optimistic deltas from realtime events or mark-as-read. The single
//! conflict rule: an authoritative result always overwrites whatever is
//! displayed, whenever it resolves. Optimistic writes adjust the displayed
//! value but never extend freshness, so the next cached read still triggers
//! a confirming recomputation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::util::now_ms;

#[derive(Clone, Debug)]
struct CacheEntry {
    value: u64,
    computed_at_ms: i64,
}

#[derive(Clone, Default)]
pub struct CountCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl CountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently displayed value, regardless of freshness.
    pub async fn displayed(&self, key: &str) -> Option<u64> {
        self.entries.read().await.get(key).map(|entry| entry.value)
    }

    /// Value only if computed within the staleness window.
    pub async fn fresh(&self, key: &str, stale_ms: i64) -> Option<u64> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if now_ms() - entry.computed_at_ms < stale_ms {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Record a server-confirmed count. Always overwrites the displayed value,
    /// including any pending optimistic adjustment (last-resolved-wins).
    pub async fn set_authoritative(&self, key: &str, value: u64) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                computed_at_ms: now_ms(),
            },
        );
    }

    /// Optimistic adjustment, saturating at zero. Missing entries start from
    /// zero with no freshness, so the next read recomputes.
    pub async fn apply_optimistic_delta(&self, key: &str, delta: i64) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert(CacheEntry {
            value: 0,
            computed_at_ms: 0,
        });
        entry.value = if delta.is_negative() {
            entry.value.saturating_sub(delta.unsigned_abs())
        } else {
            entry.value.saturating_add(delta as u64)
        };
    }

    /// Optimistic zero for mark-as-read. Does not extend freshness; the next
    /// recomputation confirms from the server.
    pub async fn zero(&self, key: &str) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) => entry.value = 0,
            None => {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: 0,
                        computed_at_ms: 0,
                    },
                );
            }
        }
    }

    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authoritative_overwrites_optimistic_even_when_lower() {
        let cache = CountCache::new();
        cache.set_authoritative("k", 3).await;
        cache.apply_optimistic_delta("k", 2).await;
        assert_eq!(cache.displayed("k").await, Some(5));

        // The recomputation resolves lower than the optimistic view; it wins.
        cache.set_authoritative("k", 4).await;
        assert_eq!(cache.displayed("k").await, Some(4));
    }

    #[tokio::test]
    async fn optimistic_delta_saturates_at_zero() {
        let cache = CountCache::new();
        cache.set_authoritative("k", 1).await;
        cache.apply_optimistic_delta("k", -5).await;
        assert_eq!(cache.displayed("k").await, Some(0));
    }

    #[tokio::test]
    async fn zero_keeps_entry_stale() {
        let cache = CountCache::new();
        cache.zero("k").await;
        assert_eq!(cache.displayed("k").await, Some(0));
        // Never authoritative, so any staleness window rejects it.
        assert_eq!(cache.fresh("k", i64::MAX).await, Some(0));
        assert_eq!(cache.fresh("k", 1).await, None);
    }

    #[tokio::test]
    async fn freshness_window_is_respected() {
        let cache = CountCache::new();
        cache.set_authoritative("k", 7).await;
        assert_eq!(cache.fresh("k", 60_000).await, Some(7));
        assert_eq!(cache.fresh("k", 0).await, None);
        assert_eq!(cache.fresh("missing", 60_000).await, None);
    }

    #[tokio::test]
    async fn optimistic_delta_on_missing_entry_starts_from_zero() {
        let cache = CountCache::new();
        cache.apply_optimistic_delta("k", 1).await;
        assert_eq!(cache.displayed("k").await, Some(1));
        assert_eq!(cache.fresh("k", 60_000).await, None);
    }
}
