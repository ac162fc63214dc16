//! Cross-venue aggregation (spec §4.3): fetch Binance/Bybit/MEXC in
//! parallel with independent failure, normalise to USD, and cache the
//! combined snapshot. Also exposes the long/short ratio lookup and the
//! global top-funding ranking named in §4.3's opening paragraph.
//!
//! The "settled-all" primitive named in spec §9 Design Notes is
//! `futures::future::join_all` over boxed per-venue futures -- the three
//! venue clients have distinct concrete types, so each call is boxed into
//! a `Pin<Box<dyn Future<...>>>` before joining.

use super::binance::BinanceClient;
use super::bybit::BybitClient;
use super::mexc::MexcClient;
use crate::cache::{get_json, set_json, Cache};
use crate::models::{ExchangeStat, MarketStats};
use futures_util::future::join_all;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const AGGREGATE_TTL_SECS: u64 = 60;
const TOP_FUNDING_TTL_SECS: u64 = 300;
const TOP_FUNDING_RANK_SIZE: usize = 10;

pub struct Aggregator {
    binance: BinanceClient,
    bybit: BybitClient,
    mexc: MexcClient,
    cache: Arc<dyn Cache>,
}

impl Aggregator {
    pub fn new(cache: Arc<dyn Cache>) -> anyhow::Result<Self> {
        Ok(Self {
            binance: BinanceClient::new()?,
            bybit: BybitClient::new()?,
            mexc: MexcClient::new(cache.clone())?,
            cache,
        })
    }

    /// Read-through aggregated stats for one base symbol, TTL 60s.
    pub async fn market_stats(&self, base_symbol: &str) -> Option<MarketStats> {
        let cache_key = format!("market_stats:{base_symbol}");
        if let Ok(Some(cached)) = get_json::<MarketStats>(self.cache.as_ref(), &cache_key).await {
            return Some(cached);
        }
        let stats = self.fetch_market_stats(base_symbol).await?;
        let _ = set_json(self.cache.as_ref(), &cache_key, &stats, AGGREGATE_TTL_SECS).await;
        Some(stats)
    }

    async fn fetch_market_stats(&self, base_symbol: &str) -> Option<MarketStats> {
        let futs: Vec<Pin<Box<dyn Future<Output = Option<ExchangeStat>> + Send + '_>>> = vec![
            Box::pin(self.binance.fetch(base_symbol)),
            Box::pin(self.bybit.fetch(base_symbol)),
            Box::pin(self.mexc.fetch(base_symbol)),
        ];
        let mut exchanges: Vec<ExchangeStat> = join_all(futs).await.into_iter().flatten().collect();
        if exchanges.is_empty() {
            return None;
        }
        exchanges.sort_by(|a, b| {
            b.open_interest
                .partial_cmp(&a.open_interest)
                .unwrap_or(Ordering::Equal)
        });

        let total_open_interest: f64 = exchanges.iter().map(|e| e.open_interest).sum();
        let avg_price = exchanges.iter().map(|e| e.price).sum::<f64>() / exchanges.len() as f64;

        Some(MarketStats {
            symbol: base_symbol.to_string(),
            total_open_interest,
            avg_price,
            exchanges,
        })
    }

    /// Best-effort; `None` on any failure (spec §4.7 "funding-map lookup
    /// is best-effort; on failure, omit funding suffixes" reuses this).
    pub async fn long_short_ratio(&self, base_symbol: &str) -> Option<f64> {
        self.binance.long_short_ratio(base_symbol).await.ok()
    }

    /// Top `TOP_FUNDING_RANK_SIZE` symbols by absolute funding rate,
    /// cached globally for 300s.
    pub async fn top_funding_ranking(&self, universe: &[&str]) -> Vec<(String, f64)> {
        const CACHE_KEY: &str = "top_funding_ranking";
        if let Ok(Some(cached)) = get_json::<Vec<(String, f64)>>(self.cache.as_ref(), CACHE_KEY).await {
            return cached;
        }

        let futs = universe.iter().map(|symbol| {
            let symbol = symbol.to_string();
            async move {
                self.binance
                    .funding_rate(&symbol)
                    .await
                    .ok()
                    .map(|rate| (symbol, rate))
            }
        });
        let mut rates: Vec<(String, f64)> = join_all(futs).await.into_iter().flatten().collect();
        rates.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));
        rates.truncate(TOP_FUNDING_RANK_SIZE);

        let _ = set_json(self.cache.as_ref(), CACHE_KEY, &rates, TOP_FUNDING_TTL_SECS).await;
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &str, price: f64, open_interest: f64) -> ExchangeStat {
        ExchangeStat {
            name: name.to_string(),
            price,
            funding_rate: 0.0,
            next_funding_time: None,
            open_interest,
            url: String::new(),
        }
    }

    /// Spec §8 S4: Binance OI=10@100=>1000, Bybit OI=5@100=>500,
    /// MEXC holdVol=20,contractSize=0.1@100=>200. Aggregate total=1700,
    /// avgPrice=100, exchanges sorted [Binance, Bybit, MEXC].
    #[test]
    fn venue_normalisation_matches_spec_s4() {
        let mut exchanges = vec![stat("MEXC", 100.0, 20.0 * 0.1 * 100.0), stat("Bybit", 100.0, 500.0), stat("Binance", 100.0, 1000.0)];
        exchanges.sort_by(|a, b| b.open_interest.partial_cmp(&a.open_interest).unwrap());

        let total_open_interest: f64 = exchanges.iter().map(|e| e.open_interest).sum();
        let avg_price = exchanges.iter().map(|e| e.price).sum::<f64>() / exchanges.len() as f64;

        assert_eq!(total_open_interest, 1700.0);
        assert_eq!(avg_price, 100.0);
        assert_eq!(
            exchanges.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["Binance", "Bybit", "MEXC"]
        );
    }
}
