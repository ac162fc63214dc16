//! Market Data Aggregator (C3, spec §4.3): Binance/Bybit/MEXC
//! perpetual-futures fetchers, normalised to USD and combined into a
//! single cross-venue snapshot, plus the OI-surge scan.
//!
//! Each venue client follows the same per-collaborator `reqwest` wrapper
//! shape: one `Client` built once with a timeout and a browser-like
//! User-Agent, one small struct per venue, `anyhow::Context` on every
//! fallible call.

pub mod aggregator;
pub mod binance;
pub mod bybit;
pub mod mexc;
pub mod oi_surge;

pub use aggregator::Aggregator;
pub use oi_surge::OiSurgeScanner;

use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 liq-sentinel/0.1";

/// Shared client construction: timeout, Accept: application/json, a
/// browser-like User-Agent (spec §4.3 "HTTP discipline").
pub(crate) fn build_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                reqwest::header::HeaderValue::from_static("application/json"),
            );
            headers
        })
        .build()
        .map_err(Into::into)
}

/// Maps a completed HTTP response to `UpstreamError` for non-2xx, per
/// spec §4.3. Transient transport failures (timeout/connect) are left to
/// the caller to classify via `err.is_timeout()`/`err.is_connect()`.
pub(crate) async fn ensure_success(resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(anyhow::anyhow!("{what}: upstream returned {status}: {body}"))
    }
}

/// Parses a numeric upstream field tolerant of missing/unparsable values,
/// substituting `0` per spec §4.3.
pub(crate) fn parse_or_zero(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}
