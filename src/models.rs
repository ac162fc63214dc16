//! Core data model. Every persisted/transmitted struct derives
//! `serde::{Serialize, Deserialize}` and uses `chrono::DateTime<Utc>` for
//! timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a leveraged position was force-closed.
///
/// Side mapping (spec §4.4, §8 invariant 3, §9 open question): upstream
/// `S == "BUY"` is a forced buy order, i.e. a short position got closed =>
/// `ShortLiquidated`. Any other value (including the expected `"SELL"`) is
/// treated as `LongLiquidated` -- "any non-BUY => long" is the adopted
/// convention, not just non-BUY-non-SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    LongLiquidated,
    ShortLiquidated,
}

impl Side {
    /// Apply the upstream `S` field mapping.
    pub fn from_upstream(s: &str) -> Self {
        if s == "BUY" {
            Side::ShortLiquidated
        } else {
            Side::LongLiquidated
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::LongLiquidated => write!(f, "Long"),
            Side::ShortLiquidated => write!(f, "Short"),
        }
    }
}

/// An immutable, append-only forced-liquidation event (spec §3).
///
/// Invariants: `price > 0`, `quantity > 0` (enforced at construction via
/// `LiquidationEvent::new`, which returns `None` otherwise rather than
/// panicking, keeping with the tolerant-decoder convention of
/// substituting/rejecting instead of unwrapping malformed upstream data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub time: DateTime<Utc>,
}

impl LiquidationEvent {
    pub fn new(symbol: impl Into<String>, side: Side, price: f64, quantity: f64, time: DateTime<Utc>) -> Option<Self> {
        if price > 0.0 && quantity > 0.0 {
            Some(Self {
                symbol: symbol.into(),
                side,
                price,
                quantity,
                time,
            })
        } else {
            None
        }
    }

    /// Derived, never stored (spec §3).
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A downstream alert recipient (spec §3). Keyed by `chatId`, unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub tracked_symbols: Vec<String>,
    pub notifications_enabled: bool,
    pub report_interval_hours: u32,
    pub min_liquidation_alert: u64,
    pub created_at: DateTime<Utc>,
}

/// Allowed `reportIntervalHours` values (spec §3 invariant).
pub const VALID_REPORT_INTERVALS: [u32; 4] = [1, 4, 12, 24];

impl Subscriber {
    pub fn new_default(chat_id: i64, first_name: Option<String>, username: Option<String>) -> Self {
        Self {
            chat_id,
            first_name,
            username,
            tracked_symbols: Vec::new(),
            notifications_enabled: true,
            report_interval_hours: 4,
            min_liquidation_alert: 10_000,
            created_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        VALID_REPORT_INTERVALS.contains(&self.report_interval_hours)
    }

    pub fn tracks(&self, symbol: &str) -> bool {
        self.tracked_symbols.iter().any(|s| s == symbol)
    }
}

/// In-memory accumulator for one `(symbol, side)` cascade key (spec §3, §4.5).
/// Exclusively owned by the cascade detector; created on first contributing
/// event, destroyed on flush.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeBucket {
    pub symbol: String,
    pub side: Side,
    pub count: u32,
    pub total_volume: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub start_time: DateTime<Utc>,
}

impl CascadeBucket {
    pub fn seed(event: &LiquidationEvent) -> Self {
        Self {
            symbol: event.symbol.clone(),
            side: event.side,
            count: 1,
            total_volume: event.notional(),
            min_price: event.price,
            max_price: event.price,
            start_time: event.time,
        }
    }

    pub fn accumulate(&mut self, event: &LiquidationEvent) {
        self.count += 1;
        self.total_volume += event.notional();
        self.min_price = self.min_price.min(event.price);
        self.max_price = self.max_price.max(event.price);
        // start_time unchanged (spec §4.5 step 3)
    }

    /// Eligible for emission once it has both enough events and enough
    /// volume (spec §4.5; thresholds are tunable, see `config::Tuning`).
    pub fn meets_threshold(&self, min_count: u32, min_volume: f64) -> bool {
        self.count >= min_count && self.total_volume >= min_volume
    }
}

/// A single venue's contribution to an aggregated market snapshot
/// (spec §3 Aggregated market stats).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStat {
    pub name: String,
    pub price: f64,
    pub funding_rate: f64,
    pub next_funding_time: Option<DateTime<Utc>>,
    pub open_interest: f64,
    pub url: String,
}

/// Cross-venue aggregated market stats for one base symbol (spec §3).
/// Value-typed, returned from the market-data aggregator; not persisted
/// beyond the 60s cache TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub symbol: String,
    pub total_open_interest: f64,
    pub avg_price: f64,
    pub exchanges: Vec<ExchangeStat>,
}

/// Emitted when a cascade bucket crosses its eligibility threshold
/// (spec §4.5, §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeAlert {
    pub symbol: String,
    pub side: Side,
    pub count: u32,
    pub total_volume: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub open_interest_usd: Option<f64>,
}

/// Emitted by the 15-minute OI scan when `|Δ%| >= OI_SURGE_THRESHOLD`
/// (spec §4.3, §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct OiSurgeAlert {
    pub symbol: String,
    pub previous_oi: f64,
    pub current_oi: f64,
    pub percent_change: f64,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_mapping_matches_spec() {
        assert_eq!(Side::from_upstream("BUY"), Side::ShortLiquidated);
        assert_eq!(Side::from_upstream("SELL"), Side::LongLiquidated);
        assert_eq!(Side::from_upstream("buy"), Side::LongLiquidated); // case-sensitive per spec wording
        assert_eq!(Side::from_upstream("anything-else"), Side::LongLiquidated);
    }

    #[test]
    fn liquidation_event_rejects_nonpositive_price_or_quantity() {
        let now = Utc::now();
        assert!(LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 0.0, 1.0, now).is_none());
        assert!(LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 1.0, 0.0, now).is_none());
        assert!(LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, -5.0, 1.0, now).is_none());
        assert!(LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 100.0, 2.0, now).is_some());
    }

    #[test]
    fn notional_is_price_times_quantity() {
        let event = LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 50_000.0, 2.0, Utc::now()).unwrap();
        assert_eq!(event.notional(), 100_000.0);
    }

    #[test]
    fn cascade_bucket_conserves_volume_across_accumulation() {
        let e1 = LiquidationEvent::new("ETHUSDT", Side::LongLiquidated, 3000.0, 10.0, Utc::now()).unwrap();
        let e2 = LiquidationEvent::new("ETHUSDT", Side::LongLiquidated, 2900.0, 10.0, Utc::now()).unwrap();
        let mut bucket = CascadeBucket::seed(&e1);
        bucket.accumulate(&e2);
        assert_eq!(bucket.total_volume, e1.notional() + e2.notional());
        assert_eq!(bucket.count, 2);
        assert_eq!(bucket.min_price, 2900.0);
        assert_eq!(bucket.max_price, 3000.0);
        assert_eq!(bucket.start_time, e1.time);
    }

    #[test]
    fn subscriber_defaults_match_spec() {
        let sub = Subscriber::new_default(42, Some("Ada".into()), None);
        assert!(sub.tracked_symbols.is_empty());
        assert!(sub.notifications_enabled);
        assert_eq!(sub.report_interval_hours, 4);
        assert_eq!(sub.min_liquidation_alert, 10_000);
        assert!(sub.is_valid());
    }
}
