//! Binance USDT-margined perpetuals (spec §6.2): `premiumIndex` for mark
//! price + funding, `openInterest` for raw coin-denominated OI,
//! `topLongShortAccountRatio` for the long/short ratio lookup.

use super::{build_http_client, ensure_success, parse_or_zero};
use crate::models::ExchangeStat;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

const BASE_URL: &str = "https://fapi.binance.com";

#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PremiumIndexResp {
    #[serde(rename = "markPrice")]
    mark_price: Option<String>,
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: Option<String>,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OpenInterestResp {
    #[serde(rename = "openInterest")]
    open_interest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LongShortRatioResp {
    #[serde(rename = "longShortRatio")]
    long_short_ratio: Option<String>,
}

impl BinanceClient {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: BASE_URL.to_string(),
        })
    }

    fn symbol(base_symbol: &str) -> String {
        if base_symbol.ends_with("USDT") {
            base_symbol.to_string()
        } else {
            format!("{base_symbol}USDT")
        }
    }

    /// Swallows any failure and returns `None`, per spec §4.3 "per-venue
    /// failure is swallowed".
    pub async fn fetch(&self, base_symbol: &str) -> Option<ExchangeStat> {
        match self.fetch_inner(base_symbol).await {
            Ok(stat) => Some(stat),
            Err(err) => {
                tracing::debug!(venue = "binance", symbol = base_symbol, error = %err, "venue fetch failed");
                None
            }
        }
    }

    async fn fetch_inner(&self, base_symbol: &str) -> anyhow::Result<ExchangeStat> {
        let symbol = Self::symbol(base_symbol);

        let premium_resp = self
            .client
            .get(format!("{}/fapi/v1/premiumIndex", self.base_url))
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;
        let premium_resp = ensure_success(premium_resp, "binance premiumIndex").await?;
        let premium: PremiumIndexResp = premium_resp.json().await?;

        let oi_resp = self
            .client
            .get(format!("{}/fapi/v1/openInterest", self.base_url))
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;
        let oi_resp = ensure_success(oi_resp, "binance openInterest").await?;
        let oi: OpenInterestResp = oi_resp.json().await?;

        let price = parse_or_zero(premium.mark_price.as_deref());
        let coin_oi = parse_or_zero(oi.open_interest.as_deref());
        let funding_rate = parse_or_zero(premium.last_funding_rate.as_deref());
        let next_funding_time = premium
            .next_funding_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(ExchangeStat {
            name: "Binance".to_string(),
            price,
            funding_rate,
            next_funding_time,
            open_interest: coin_oi * price,
            url: format!("https://www.binance.com/en/futures/{symbol}"),
        })
    }

    /// Long/short account ratio, most recent 5-minute bucket.
    pub async fn long_short_ratio(&self, base_symbol: &str) -> anyhow::Result<f64> {
        let symbol = Self::symbol(base_symbol);
        let resp = self
            .client
            .get(format!("{}/fapi/v1/topLongShortAccountRatio", self.base_url))
            .query(&[("symbol", symbol.as_str()), ("period", "5m"), ("limit", "1")])
            .send()
            .await?;
        let resp = ensure_success(resp, "binance topLongShortAccountRatio").await?;
        let rows: Vec<LongShortRatioResp> = resp.json().await?;
        Ok(rows
            .last()
            .map(|r| parse_or_zero(r.long_short_ratio.as_deref()))
            .unwrap_or(0.0))
    }

    /// Funding rate per symbol, for the top-funding ranking (aggregator
    /// caches this globally with a 300s TTL).
    pub async fn funding_rate(&self, base_symbol: &str) -> anyhow::Result<f64> {
        let symbol = Self::symbol(base_symbol);
        let resp = self
            .client
            .get(format!("{}/fapi/v1/premiumIndex", self.base_url))
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;
        let resp = ensure_success(resp, "binance premiumIndex").await?;
        let premium: PremiumIndexResp = resp.json().await?;
        Ok(parse_or_zero(premium.last_funding_rate.as_deref()))
    }
}
