//! Bybit linear perpetuals (spec §6.2): a single `tickers` call carries
//! price, funding rate, and OI together, unlike Binance's split endpoints.

use super::{build_http_client, ensure_success, parse_or_zero};
use crate::models::ExchangeStat;
use serde::Deserialize;

const BASE_URL: &str = "https://api.bybit.com";

#[derive(Clone)]
pub struct BybitClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TickersEnvelope {
    result: TickersResult,
}

#[derive(Debug, Deserialize)]
struct TickersResult {
    list: Vec<TickerRow>,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    #[serde(rename = "lastPrice")]
    last_price: Option<String>,
    #[serde(rename = "fundingRate")]
    funding_rate: Option<String>,
    #[serde(rename = "openInterest")]
    open_interest: Option<String>,
}

impl BybitClient {
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

    pub async fn fetch(&self, base_symbol: &str) -> Option<ExchangeStat> {
        match self.fetch_inner(base_symbol).await {
            Ok(stat) => Some(stat),
            Err(err) => {
                tracing::debug!(venue = "bybit", symbol = base_symbol, error = %err, "venue fetch failed");
                None
            }
        }
    }

    async fn fetch_inner(&self, base_symbol: &str) -> anyhow::Result<ExchangeStat> {
        let symbol = Self::symbol(base_symbol);
        let resp = self
            .client
            .get(format!("{}/v5/market/tickers", self.base_url))
            .query(&[("category", "linear"), ("symbol", symbol.as_str())])
            .send()
            .await?;
        let resp = ensure_success(resp, "bybit tickers").await?;
        let envelope: TickersEnvelope = resp.json().await?;
        let row = envelope
            .result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("bybit tickers returned no rows for {symbol}"))?;

        let price = parse_or_zero(row.last_price.as_deref());
        let coin_oi = parse_or_zero(row.open_interest.as_deref());

        Ok(ExchangeStat {
            name: "Bybit".to_string(),
            price,
            funding_rate: parse_or_zero(row.funding_rate.as_deref()),
            next_funding_time: None,
            open_interest: coin_oi * price,
            url: format!("https://www.bybit.com/trade/usdt/{symbol}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_appends_usdt_once() {
        assert_eq!(BybitClient::symbol("ETH"), "ETHUSDT");
        assert_eq!(BybitClient::symbol("ETHUSDT"), "ETHUSDT");
    }
}
