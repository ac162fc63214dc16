//! Application configuration, loaded once at startup.
//!
//! `std::env::var(...).unwrap_or_else(|| default)` for optional knobs,
//! `.parse().unwrap_or(default)` for numeric ones, and an explicit
//! `ConfigInvalid` failure for the handful of variables with no sane
//! default.

use crate::error::PipelineError;

/// Tuning knobs with their spec-mandated defaults (§7).
#[derive(Debug, Clone)]
pub struct Tuning {
    pub channel_min_liquidation: f64,
    pub cascade_window_secs: u64,
    pub cascade_min_count: u32,
    pub cascade_min_volume: f64,
    pub oi_surge_threshold_pct: f64,
    pub oi_scan_interval_secs: u64,
    pub ws_shard_size: usize,
    pub ws_refresh_secs: u64,
    pub ws_ping_secs: u64,
    pub ws_reconnect_backoff_secs: u64,
    pub retention_secs: i64,
    pub retention_tick_secs: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            channel_min_liquidation: 250_000.0,
            cascade_window_secs: 10,
            cascade_min_count: 3,
            cascade_min_volume: 100_000.0,
            oi_surge_threshold_pct: 2.5,
            oi_scan_interval_secs: 15 * 60,
            ws_shard_size: 50,
            ws_refresh_secs: 24 * 3600,
            ws_ping_secs: 30,
            ws_reconnect_backoff_secs: 5,
            retention_secs: 48 * 3600,
            retention_tick_secs: 24 * 3600,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub telegram_bot_token: String,
    pub futures_ws_url: String,
    pub telegram_channel_id: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub tuning: Tuning,
}

impl Config {
    /// Load from the environment, failing fast only on the variables the
    /// spec marks required (`ConfigInvalid`). Everything else degrades to
    /// a documented default.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenv::dotenv().ok();

        let mongo_uri = required_var("MONGO_URI")?;
        let mongo_db_name = required_var("MONGO_DB_NAME")?;
        let telegram_bot_token = required_var("TELEGRAM_BOT_TOKEN")?;
        let futures_ws_url = required_var("FUTURES_WS_URL")?;

        let telegram_channel_id = std::env::var("TELEGRAM_CHANNEL_ID").ok();

        let redis_host = std::env::var("REDIS_HOST").ok();
        let redis_port = std::env::var("REDIS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6379);

        let mut tuning = Tuning::default();
        if let Ok(v) = std::env::var("CHANNEL_MIN_LIQUIDATION") {
            tuning.channel_min_liquidation = v.parse().unwrap_or(tuning.channel_min_liquidation);
        }

        Ok(Self {
            mongo_uri,
            mongo_db_name,
            telegram_bot_token,
            futures_ws_url,
            telegram_channel_id,
            redis_host,
            redis_port,
            tuning,
        })
    }
}

fn required_var(name: &str) -> Result<String, PipelineError> {
    std::env::var(name).map_err(|_| {
        PipelineError::ConfigInvalid(format!("missing required environment variable {name}"))
    })
}
