//! OI-surge scan (spec §4.3, driven every 15 min by C8): compares each
//! tracked symbol's current aggregated OI against the snapshot cached at
//! `oi_last:<symbol>`, emitting an alert when `|Δ%| >= threshold`.

use super::Aggregator;
use crate::cache::{get_json, set_json, Cache};
use crate::models::OiSurgeAlert;
use futures_util::future::join_all;
use std::sync::Arc;

const SNAPSHOT_TTL_SECS: u64 = 24 * 3600;

pub struct OiSurgeScanner {
    aggregator: Arc<Aggregator>,
    cache: Arc<dyn Cache>,
    threshold_pct: f64,
}

impl OiSurgeScanner {
    pub fn new(aggregator: Arc<Aggregator>, cache: Arc<dyn Cache>, threshold_pct: f64) -> Self {
        Self {
            aggregator,
            cache,
            threshold_pct,
        }
    }

    /// One pass over the whole universe; symbols are scanned concurrently
    /// since each is independent (same "settled-all" shape as §4.3's
    /// venue fetch).
    pub async fn scan(&self, universe: &[&str]) -> Vec<OiSurgeAlert> {
        join_all(universe.iter().map(|symbol| self.scan_symbol(symbol)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn scan_symbol(&self, symbol: &str) -> Option<OiSurgeAlert> {
        let stats = self.aggregator.market_stats(symbol).await?;
        let cache_key = format!("oi_last:{symbol}");

        let previous_oi: Option<f64> = get_json(self.cache.as_ref(), &cache_key).await.ok().flatten();

        // Always write the new baseline, even when no surge fires.
        let _ = set_json(
            self.cache.as_ref(),
            &cache_key,
            &stats.total_open_interest,
            SNAPSHOT_TTL_SECS,
        )
        .await;

        let previous_oi = previous_oi?;
        if previous_oi == 0.0 {
            return None;
        }
        let percent_change = (stats.total_open_interest - previous_oi) / previous_oi * 100.0;
        if percent_change.abs() >= self.threshold_pct {
            Some(OiSurgeAlert {
                symbol: symbol.to_string(),
                previous_oi,
                current_oi: stats.total_open_interest,
                percent_change,
                price: stats.avg_price,
            })
        } else {
            None
        }
    }
}
