//! MEXC perpetual futures (spec §6.2): `contract/ticker` for price,
//! funding rate, and raw contract-count OI (`holdVol`); `contract/detail`
//! for the per-symbol contract size needed to convert `holdVol` to coin
//! units. Contract size is cached for 24h (spec §4.3) since it changes
//! rarely and the detail endpoint is otherwise called on every scan.

use super::{build_http_client, ensure_success, parse_or_zero};
use crate::cache::Cache;
use crate::models::ExchangeStat;
use serde::Deserialize;
use std::sync::Arc;

const BASE_URL: &str = "https://contract.mexc.com";
const CONTRACT_SIZE_TTL_SECS: u64 = 24 * 3600;

/// Safe fallback when the detail endpoint is unreachable or the symbol is
/// unlisted (spec §9 open question: fixed at 1, not the pre-spec 0.0001).
const DEFAULT_CONTRACT_SIZE: f64 = 1.0;

#[derive(Clone)]
pub struct MexcClient {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<dyn Cache>,
}

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    data: TickerData,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
    #[serde(rename = "fundingRate")]
    funding_rate: Option<f64>,
    #[serde(rename = "holdVol")]
    hold_vol: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    data: DetailData,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(rename = "contractSize")]
    contract_size: Option<f64>,
}

impl MexcClient {
    pub fn new(cache: Arc<dyn Cache>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: BASE_URL.to_string(),
            cache,
        })
    }

    fn symbol(base_symbol: &str) -> String {
        let base = base_symbol.strip_suffix("USDT").unwrap_or(base_symbol);
        format!("{base}_USDT")
    }

    pub async fn fetch(&self, base_symbol: &str) -> Option<ExchangeStat> {
        match self.fetch_inner(base_symbol).await {
            Ok(stat) => Some(stat),
            Err(err) => {
                tracing::debug!(venue = "mexc", symbol = base_symbol, error = %err, "venue fetch failed");
                None
            }
        }
    }

    async fn fetch_inner(&self, base_symbol: &str) -> anyhow::Result<ExchangeStat> {
        let symbol = Self::symbol(base_symbol);

        let resp = self
            .client
            .get(format!("{}/api/v1/contract/ticker", self.base_url))
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;
        let resp = ensure_success(resp, "mexc contract/ticker").await?;
        let ticker: TickerEnvelope = resp.json().await?;

        let price = ticker.data.last_price.unwrap_or(0.0);
        let hold_vol = ticker.data.hold_vol.unwrap_or(0.0);
        let funding_rate = ticker.data.funding_rate.unwrap_or(0.0);
        let contract_size = self.contract_size(&symbol).await;

        Ok(ExchangeStat {
            name: "MEXC".to_string(),
            price,
            funding_rate,
            next_funding_time: None,
            open_interest: hold_vol * contract_size * price,
            url: format!("https://futures.mexc.com/exchange/{symbol}"),
        })
    }

    /// Cache-then-fetch with a 24h TTL; any failure degrades to
    /// `DEFAULT_CONTRACT_SIZE` rather than propagating (spec §4.3).
    async fn contract_size(&self, symbol: &str) -> f64 {
        let cache_key = format!("mexc_contract_size:{symbol}");
        if let Ok(Some(cached)) = crate::cache::get_json::<f64>(self.cache.as_ref(), &cache_key).await {
            return cached;
        }
        match self.fetch_contract_size(symbol).await {
            Ok(size) => {
                let _ = crate::cache::set_json(
                    self.cache.as_ref(),
                    &cache_key,
                    &size,
                    CONTRACT_SIZE_TTL_SECS,
                )
                .await;
                size
            }
            Err(err) => {
                tracing::debug!(symbol, error = %err, "mexc contract/detail failed, using default contract size");
                DEFAULT_CONTRACT_SIZE
            }
        }
    }

    async fn fetch_contract_size(&self, symbol: &str) -> anyhow::Result<f64> {
        let resp = self
            .client
            .get(format!("{}/api/v1/contract/detail", self.base_url))
            .query(&[("symbol", symbol)])
            .send()
            .await?;
        let resp = ensure_success(resp, "mexc contract/detail").await?;
        let detail: DetailEnvelope = resp.json().await?;
        Ok(detail.data.contract_size.unwrap_or(DEFAULT_CONTRACT_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    #[test]
    fn symbol_inserts_underscore() {
        assert_eq!(MexcClient::symbol("BTC"), "BTC_USDT");
        assert_eq!(MexcClient::symbol("BTCUSDT"), "BTC_USDT");
    }

    #[tokio::test]
    async fn contract_size_uses_cached_value_without_a_network_call() {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        crate::cache::set_json(cache.as_ref(), "mexc_contract_size:BTC_USDT", &0.1, 3600)
            .await
            .unwrap();
        let mexc = MexcClient::new(cache).unwrap();
        assert_eq!(mexc.contract_size("BTC_USDT").await, 0.1);
    }
}
