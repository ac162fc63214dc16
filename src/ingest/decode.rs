//! Wire decode for the combined-stream `forceOrder` frames (spec §4.4,
//! §6.2): `{stream, data:{e:"forceOrder", o:{s, S, p, q, T, ...}}}`.

use crate::models::{LiquidationEvent, Side};
use chrono::{TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CombinedFrame {
    data: ForceOrderFrame,
}

#[derive(Debug, Deserialize)]
struct ForceOrderFrame {
    e: String,
    o: ForceOrderDetail,
}

#[derive(Debug, Deserialize)]
struct ForceOrderDetail {
    s: String,
    #[serde(rename = "S")]
    side: String,
    p: String,
    q: String,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

/// Decodes one WS text frame into a liquidation event. Returns `None` for
/// anything unparsable or not a `forceOrder` event -- spec §7
/// `MalformedUpstream`: log and continue, never crash the shard. The
/// caller logs at the call site, since this module tolerates malformed
/// input by design and shouldn't itself depend on a logging backend.
pub fn decode_force_order(text: &str) -> Option<LiquidationEvent> {
    let frame: CombinedFrame = serde_json::from_str(text).ok()?;
    if frame.data.e != "forceOrder" {
        return None;
    }
    let detail = frame.data.o;
    let price: f64 = detail.p.parse().ok()?;
    let quantity: f64 = detail.q.parse().ok()?;
    let time = Utc.timestamp_millis_opt(detail.trade_time_ms).single()?;
    let side = Side::from_upstream(&detail.side);
    LiquidationEvent::new(detail.s, side, price, quantity, time)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 S1: one BUY forceOrder frame decodes to a short liquidation
    /// with the documented notional and UTC time.
    #[test]
    fn decodes_spec_s1_frame() {
        let text = r#"{"stream":"btcusdt@forceOrder","data":{"e":"forceOrder","o":{"s":"BTCUSDT","S":"BUY","p":"50000","q":"2","T":1700000000000}}}"#;
        let event = decode_force_order(text).expect("should decode");
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.side, Side::ShortLiquidated);
        assert_eq!(event.notional(), 100_000.0);
        assert_eq!(event.time.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn sell_maps_to_long_liquidated() {
        let text = r#"{"stream":"ethusdt@forceOrder","data":{"e":"forceOrder","o":{"s":"ETHUSDT","S":"SELL","p":"2000","q":"1","T":1700000000000}}}"#;
        let event = decode_force_order(text).unwrap();
        assert_eq!(event.side, Side::LongLiquidated);
    }

    #[test]
    fn rejects_non_force_order_events() {
        let text = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","o":{"s":"BTCUSDT","S":"BUY","p":"1","q":"1","T":1}}}"#;
        assert!(decode_force_order(text).is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(decode_force_order("not json").is_none());
        assert!(decode_force_order("{}").is_none());
    }

    #[test]
    fn rejects_nonpositive_price_or_quantity() {
        let text = r#"{"stream":"btcusdt@forceOrder","data":{"e":"forceOrder","o":{"s":"BTCUSDT","S":"BUY","p":"0","q":"2","T":1700000000000}}}"#;
        assert!(decode_force_order(text).is_none());
    }
}
