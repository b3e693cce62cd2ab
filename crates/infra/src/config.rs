use rivvlock_domain::unread::UnreadEngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    pub data_backend: String,
    /// Staleness window for dispute/transaction-level aggregates.
    pub unread_stale_ms: i64,
    /// Staleness window for whole-category totals.
    pub unread_coarse_stale_ms: i64,
    pub unread_refresh_interval_ms: u64,
    pub realtime_throttle_ms: i64,
    pub fetch_timeout_ms: u64,
    pub realtime_buffer_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("unread_stale_ms", 5_000)?
            .set_default("unread_coarse_stale_ms", 30_000)?
            .set_default("unread_refresh_interval_ms", 30_000)?
            .set_default("realtime_throttle_ms", 3_000)?
            .set_default("fetch_timeout_ms", 10_000)?
            .set_default("realtime_buffer_capacity", 256)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn engine_config(&self) -> UnreadEngineConfig {
        UnreadEngineConfig {
            fine_stale_ms: self.unread_stale_ms,
            coarse_stale_ms: self.unread_coarse_stale_ms,
            throttle_window_ms: self.realtime_throttle_ms,
            fetch_timeout_ms: self.fetch_timeout_ms,
            refresh_interval_ms: self.unread_refresh_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_environment() {
        let config = AppConfig::load().expect("defaults");
        assert_eq!(config.data_backend, "memory");
        assert!(!config.is_production());
        let engine = config.engine_config();
        assert_eq!(engine.fine_stale_ms, 5_000);
        assert_eq!(engine.coarse_stale_ms, 30_000);
    }
}
