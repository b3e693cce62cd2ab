use std::sync::OnceLock;

use anyhow::Result;
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const REALTIME_EVENTS_PUBLISHED_TOTAL: &str = "rivvlock_unread_realtime_events_published_total";
const REALTIME_EVENTS_DELIVERED_TOTAL: &str = "rivvlock_unread_realtime_events_delivered_total";
const REALTIME_EVENTS_LAGGED_TOTAL: &str = "rivvlock_unread_realtime_events_lagged_total";
const CURSOR_UPSERTS_TOTAL: &str = "rivvlock_unread_cursor_upserts_total";
const CURSOR_UPSERT_FAILURES_TOTAL: &str = "rivvlock_unread_cursor_upsert_failures_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn register_event_published(table: &str) {
    counter!(
        REALTIME_EVENTS_PUBLISHED_TOTAL,
        "table" => table.to_string()
    )
    .increment(1);
}

pub fn register_event_delivered(table: &str) {
    counter!(
        REALTIME_EVENTS_DELIVERED_TOTAL,
        "table" => table.to_string()
    )
    .increment(1);
}

pub fn register_event_lagged(table: &str, skipped: u64) {
    counter!(
        REALTIME_EVENTS_LAGGED_TOTAL,
        "table" => table.to_string()
    )
    .increment(skipped);
}

pub fn register_cursor_upsert(success: bool) {
    counter!(CURSOR_UPSERTS_TOTAL).increment(1);
    if !success {
        counter!(CURSOR_UPSERT_FAILURES_TOTAL).increment(1);
    }
}
