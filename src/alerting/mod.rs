//! Alert Fan-Out (C6, spec §4.6): routes a real-time liquidation, cascade
//! alert, or OI-surge alert to the broadcast channel and/or the
//! subscribers tracking that symbol. Rendering (spec §6.3) is a pure
//! function of the event and never observes recipient identity, kept as
//! free functions so `reporting` can reuse the same value-formatting
//! conventions without constructing a router.

use crate::format::{format_price, format_usd, millions};
use crate::messaging::{Messaging, Recipient, SendError};
use crate::models::{CascadeAlert, LiquidationEvent, OiSurgeAlert, Side};
use crate::storage::Storage;
use std::sync::Arc;
use tracing::warn;

fn side_icon(side: Side) -> &'static str {
    match side {
        Side::LongLiquidated => "\u{1F534}", // red circle
        Side::ShortLiquidated => "\u{1F7E2}", // green circle
    }
}

/// Real-time single-liquidation message (spec §6.3). Whale-prefixed at or
/// above $1,000,000 notional.
pub fn render_realtime(event: &LiquidationEvent) -> String {
    let notional = event.notional();
    let label = match event.side {
        Side::LongLiquidated => "Long",
        Side::ShortLiquidated => "Short",
    };
    let body = format!(
        "{icon} *#{sym} REKT {label}:* {value} at {price}",
        icon = side_icon(event.side),
        sym = event.symbol,
        value = format_usd(notional),
        price = format_price(event.price),
    );
    if notional >= 1_000_000.0 {
        format!("\u{1F525} *WHALE ALERT!* \u{1F525}\n{body}")
    } else {
        body
    }
}

/// Cascade burst message (spec §6.3). The OI line is present only when the
/// pipeline managed to enrich the alert with a market-stats lookup.
pub fn render_cascade(alert: &CascadeAlert) -> String {
    let label = match alert.side {
        Side::LongLiquidated => "Longs Rekt",
        Side::ShortLiquidated => "Shorts Squeezed",
    };
    let pct = if alert.min_price > 0.0 {
        (alert.max_price - alert.min_price) / alert.min_price * 100.0
    } else {
        0.0
    };
    let mut message = format!(
        "{icon} *CASCADE ALERT: {sym}*\n\n\u{1F480} *{label}* (x{count} orders)\n\u{1F4B0} Total Volume: *{vol}* in 10s\n\u{1F4C9} Range: {min} - {max} ({pct:.2}%)",
        icon = side_icon(alert.side),
        sym = alert.symbol,
        count = alert.count,
        vol = format_usd(alert.total_volume),
        min = format_price(alert.min_price),
        max = format_price(alert.max_price),
    );
    if let Some(oi) = alert.open_interest_usd {
        message.push_str(&format!("\n\u{1F4CA} OI: ${}M", millions(oi)));
    }
    message
}

/// OI-surge message (spec §6.3).
pub fn render_oi_surge(alert: &OiSurgeAlert) -> String {
    let increased = alert.percent_change >= 0.0;
    let trend_icon = if increased { "\u{1F4C8}" } else { "\u{1F4C9}" };
    let direction_dot = if increased { "\u{1F7E2}" } else { "\u{1F534}" };
    let verb = if increased { "INCREASED" } else { "DROPPED" };
    format!(
        "{trend_icon} *OI ALERT: {sym}*\n\n{direction_dot} Open Interest {verb} by *{pct:.2}%* in 15 min!\n\n\u{1F4B5} Price: {price}\n\u{1F4B0} New OI: *{oi}M*",
        sym = alert.symbol,
        pct = alert.percent_change.abs(),
        price = format_price(alert.price),
        oi = millions(alert.current_oi),
    )
}

/// Routes rendered alerts to the broadcast channel and/or subscriber
/// fan-out (spec §4.6). Owns no rendering logic itself.
pub struct AlertRouter {
    storage: Arc<dyn Storage>,
    messaging: Arc<dyn Messaging>,
    broadcast_channel: Option<String>,
    channel_min_liquidation: f64,
}

impl AlertRouter {
    pub fn new(
        storage: Arc<dyn Storage>,
        messaging: Arc<dyn Messaging>,
        broadcast_channel: Option<String>,
        channel_min_liquidation: f64,
    ) -> Self {
        Self {
            storage,
            messaging,
            broadcast_channel,
            channel_min_liquidation,
        }
    }

    pub async fn route_realtime(&self, event: &LiquidationEvent) {
        let notional = event.notional();
        let message = render_realtime(event);
        self.broadcast_over_floor(notional, &message).await;
        self.fan_out(&event.symbol, Some(notional), &message).await;
    }

    pub async fn route_cascade(&self, alert: &CascadeAlert) {
        let message = render_cascade(alert);
        self.broadcast_over_floor(alert.total_volume, &message).await;
        self.fan_out(&alert.symbol, Some(alert.total_volume), &message).await;
    }

    /// OI surge always broadcasts (if a channel is configured) and targets
    /// every subscriber tracking the symbol regardless of magnitude
    /// (spec §4.6 step 2/3).
    pub async fn route_oi_surge(&self, alert: &OiSurgeAlert) {
        let message = render_oi_surge(alert);
        self.broadcast_always(&message).await;
        self.fan_out(&alert.symbol, None, &message).await;
    }

    /// Sends an already-rendered hourly/live digest to one subscriber
    /// (spec §4.8 "invoke C7 scheduled and send via C9"). Reuses the same
    /// `RecipientBlocked` handling as the real-time paths.
    pub async fn send_report(&self, chat_id: i64, report: &str) {
        self.send(Recipient::Subscriber(chat_id), report).await;
    }

    async fn broadcast_over_floor(&self, notional: f64, message: &str) {
        if notional >= self.channel_min_liquidation {
            self.broadcast_always(message).await;
        }
    }

    async fn broadcast_always(&self, message: &str) {
        if let Some(channel) = &self.broadcast_channel {
            self.send(Recipient::Channel(channel.clone()), message).await;
        }
    }

    /// `notional = None` means "any magnitude" (the OI-surge case); the
    /// subscriber's own `minLiquidationAlert` is ignored then.
    async fn fan_out(&self, symbol: &str, notional: Option<f64>, message: &str) {
        let subscribers = match self.storage.find_subscribers_tracking_symbol(symbol).await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                warn!(symbol, error = %err, "failed to query subscribers for fan-out");
                return;
            }
        };

        for subscriber in subscribers {
            let eligible = match notional {
                Some(notional) => notional >= subscriber.min_liquidation_alert as f64,
                None => true,
            };
            if eligible {
                self.send(Recipient::Subscriber(subscriber.chat_id), message).await;
            }
        }
    }

    async fn send(&self, recipient: Recipient, message: &str) {
        if let Err(err) = self.messaging.send(&recipient, message).await {
            match err {
                SendError::RecipientBlocked => {
                    if let Some(chat_id) = recipient.subscriber_chat_id() {
                        if let Err(err) = self.storage.set_notifications(chat_id, Some(false)).await {
                            warn!(chat_id, error = %err, "failed to disable notifications after block");
                        }
                    }
                }
                SendError::Transient(reason) => {
                    warn!(reason, "transient send failure, dropping");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::fake::FakeMessaging;
    use crate::storage::InMemoryStorage;
    use chrono::Utc;

    fn router(storage: Arc<InMemoryStorage>, messaging: Arc<FakeMessaging>, channel: Option<&str>, floor: f64) -> AlertRouter {
        AlertRouter::new(storage, messaging, channel.map(str::to_string), floor)
    }

    #[test]
    fn render_realtime_prefixes_whale_alert_at_one_million() {
        let event = LiquidationEvent::new("BTCUSDT", Side::ShortLiquidated, 50_000.0, 25.0, Utc::now()).unwrap();
        let message = render_realtime(&event);
        assert!(message.starts_with("\u{1F525} *WHALE ALERT!* \u{1F525}\n"));
        assert!(message.contains("REKT Short"));
        assert!(message.contains("$1.25M"));
    }

    #[test]
    fn render_realtime_omits_whale_prefix_below_one_million() {
        let event = LiquidationEvent::new("ETHUSDT", Side::LongLiquidated, 2000.0, 10.0, Utc::now()).unwrap();
        let message = render_realtime(&event);
        assert!(!message.contains("WHALE"));
        assert!(message.contains("REKT Long"));
    }

    /// Spec §8 S2 rendering companion: count/volume line matches the
    /// aggregated cascade fields, and the OI line is absent when unset.
    #[test]
    fn render_cascade_omits_oi_line_when_unset() {
        let alert = CascadeAlert {
            symbol: "ETHUSDT".into(),
            side: Side::LongLiquidated,
            count: 4,
            total_volume: 140_000.0,
            min_price: 2000.0,
            max_price: 5000.0,
            open_interest_usd: None,
        };
        let message = render_cascade(&alert);
        assert!(message.contains("x4 orders"));
        assert!(message.contains("$140k"));
        assert!(!message.contains("OI:"));
    }

    #[test]
    fn render_cascade_includes_oi_line_when_present() {
        let alert = CascadeAlert {
            symbol: "ETHUSDT".into(),
            side: Side::ShortLiquidated,
            count: 5,
            total_volume: 200_000.0,
            min_price: 1000.0,
            max_price: 1100.0,
            open_interest_usd: Some(1_500_000.0),
        };
        let message = render_cascade(&alert);
        assert!(message.contains("OI: $1.50M"));
        assert!(message.contains("Shorts Squeezed"));
    }

    /// Spec §8 S3 rendering companion.
    #[test]
    fn render_oi_surge_reports_unsigned_percent_with_direction() {
        let alert = OiSurgeAlert {
            symbol: "SOLUSDT".into(),
            previous_oi: 100_000_000.0,
            current_oi: 103_000_000.0,
            percent_change: 3.0,
            price: 150.0,
        };
        let message = render_oi_surge(&alert);
        assert!(message.contains("INCREASED by *3.00%*"));
        assert!(message.contains("New OI: *103.00M*"));
    }

    /// Spec §8 S5: of three subscribers tracking the same symbol with
    /// differing floors and one disabled, only the one whose floor is met
    /// and who has notifications enabled receives the alert.
    #[tokio::test]
    async fn subscriber_fan_out_matches_spec_s5() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.find_or_create_subscriber(1, None, None).await.unwrap();
        storage.toggle_tracked_symbol(1, "BTCUSDT").await.unwrap();
        storage.set_alert_threshold(1, 50_000).await.unwrap();

        storage.find_or_create_subscriber(2, None, None).await.unwrap();
        storage.toggle_tracked_symbol(2, "BTCUSDT").await.unwrap();
        storage.set_alert_threshold(2, 200_000).await.unwrap();

        storage.find_or_create_subscriber(3, None, None).await.unwrap();
        storage.toggle_tracked_symbol(3, "BTCUSDT").await.unwrap();
        storage.set_notifications(3, Some(false)).await.unwrap();

        let messaging = Arc::new(FakeMessaging::new());
        let router = router(storage, messaging.clone(), None, 250_000.0);

        let event = LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 1000.0, 100.0, Utc::now()).unwrap();
        router.route_realtime(&event).await;

        assert_eq!(messaging.sent_to(&Recipient::Subscriber(1)), 1);
        assert_eq!(messaging.sent_to(&Recipient::Subscriber(2)), 0);
        assert_eq!(messaging.sent_to(&Recipient::Subscriber(3)), 0);
    }

    /// Spec §8 invariant 6: raising a subscriber's floor never increases
    /// the alerts they receive for a fixed event stream.
    #[tokio::test]
    async fn raising_alert_threshold_never_increases_received_alerts() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.find_or_create_subscriber(1, None, None).await.unwrap();
        storage.toggle_tracked_symbol(1, "BTCUSDT").await.unwrap();
        let messaging = Arc::new(FakeMessaging::new());

        let events: Vec<LiquidationEvent> = (1..=5)
            .map(|i| LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 1000.0 * i as f64, 10.0, Utc::now()).unwrap())
            .collect();
        let _ = &messaging; // each floor level gets its own fake below

        let mut received_counts = Vec::new();
        for floor in [0u64, 20_000, 40_000, 60_000] {
            storage.set_alert_threshold(1, floor).await.unwrap();
            let per_floor_messaging = Arc::new(FakeMessaging::new());
            let router = router(storage.clone(), per_floor_messaging.clone(), None, f64::MAX);
            for event in &events {
                router.route_realtime(event).await;
            }
            received_counts.push(per_floor_messaging.sent_to(&Recipient::Subscriber(1)));
        }
        for window in received_counts.windows(2) {
            assert!(window[1] <= window[0]);
        }
    }

    #[tokio::test]
    async fn broadcast_requires_channel_and_floor() {
        let storage = Arc::new(InMemoryStorage::new());
        let messaging = Arc::new(FakeMessaging::new());
        let router = router(storage, messaging.clone(), Some("chan"), 250_000.0);

        let small = LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 1000.0, 10.0, Utc::now()).unwrap();
        router.route_realtime(&small).await;
        assert_eq!(messaging.sent_to(&Recipient::Channel("chan".into())), 0);

        let whale = LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 50_000.0, 10.0, Utc::now()).unwrap();
        router.route_realtime(&whale).await;
        assert_eq!(messaging.sent_to(&Recipient::Channel("chan".into())), 1);
    }

    #[tokio::test]
    async fn oi_surge_broadcasts_regardless_of_magnitude_when_channel_configured() {
        let storage = Arc::new(InMemoryStorage::new());
        let messaging = Arc::new(FakeMessaging::new());
        let router = router(storage, messaging.clone(), Some("chan"), 1_000_000_000.0);

        let alert = OiSurgeAlert {
            symbol: "SOLUSDT".into(),
            previous_oi: 100.0,
            current_oi: 103.0,
            percent_change: 3.0,
            price: 1.0,
        };
        router.route_oi_surge(&alert).await;
        assert_eq!(messaging.sent_to(&Recipient::Channel("chan".into())), 1);
    }

    #[tokio::test]
    async fn recipient_blocked_disables_notifications() {
        let storage = Arc::new(InMemoryStorage::new());
        let sub = storage.find_or_create_subscriber(9, None, None).await.unwrap();
        assert!(sub.notifications_enabled);
        storage.toggle_tracked_symbol(9, "BTCUSDT").await.unwrap();

        let messaging = Arc::new(FakeMessaging::new());
        messaging.block(Recipient::Subscriber(9));
        let router = router(storage.clone(), messaging, None, f64::MAX);

        let event = LiquidationEvent::new("BTCUSDT", Side::LongLiquidated, 1000.0, 10.0, Utc::now()).unwrap();
        router.route_realtime(&event).await;

        let sub = storage.find_or_create_subscriber(9, None, None).await.unwrap();
        assert!(!sub.notifications_enabled);
    }
}
