use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn uuid_v7_without_dashes() -> String {
    Uuid::now_v7().simple().to_string()
}

pub fn format_ms_rfc3339(epoch_ms: i64) -> String {
    let fallback = OffsetDateTime::from_unix_timestamp(0).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let value =
        OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000).unwrap_or(fallback);
    value
        .format(&Rfc3339)
        .unwrap_or("1970-01-01T00:00:00Z".to_string())
}

/// Stable identity for a set of conversation ids, insensitive to order and
/// duplicates. Two aggregates registered over the same set share one cache slot.
pub fn aggregate_fingerprint(conversation_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = conversation_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_insensitive() {
        let a = aggregate_fingerprint(&["c-1".to_string(), "c-2".to_string()]);
        let b = aggregate_fingerprint(&["c-2".to_string(), "c-1".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_ignores_duplicates() {
        let a = aggregate_fingerprint(&["c-1".to_string(), "c-1".to_string()]);
        let b = aggregate_fingerprint(&["c-1".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_sets() {
        let a = aggregate_fingerprint(&["c-1".to_string()]);
        let b = aggregate_fingerprint(&["c-2".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn format_ms_renders_epoch() {
        assert_eq!(format_ms_rfc3339(0), "1970-01-01T00:00:00Z");
    }
}
