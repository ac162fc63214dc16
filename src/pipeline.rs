//! Per-event pipeline glue (spec §4.4, §5): the single handler every
//! ingest shard calls for each decoded liquidation, enforcing the
//! persist -> cascade -> fan-out ordering within one shard, plus the
//! periodic cascade sweep for `(symbol, side)` buckets that go quiet
//! before a triggering next event arrives.

use crate::alerting::AlertRouter;
use crate::cascade::CascadeDetector;
use crate::market_data::Aggregator;
use crate::models::{CascadeAlert, LiquidationEvent};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct Pipeline {
    storage: Arc<dyn Storage>,
    cascade: Arc<CascadeDetector>,
    aggregator: Arc<Aggregator>,
    alert_router: Arc<AlertRouter>,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        cascade: Arc<CascadeDetector>,
        aggregator: Arc<Aggregator>,
        alert_router: Arc<AlertRouter>,
    ) -> Self {
        Self {
            storage,
            cascade,
            aggregator,
            alert_router,
        }
    }

    /// Called once per decoded event, in arrival order, by the owning
    /// shard. Persistence failures are logged and otherwise ignored
    /// (spec §7 `StorageUnavailable`: "persistence skipped; alerts
    /// continue") -- they never block cascade detection or fan-out.
    pub async fn handle_event(&self, event: LiquidationEvent) {
        if let Err(err) = self.storage.save_liquidation(&event).await {
            warn!(symbol = %event.symbol, error = %err, "failed to persist liquidation event");
        }

        let cascade_alert = self.cascade.ingest(&event);

        self.alert_router.route_realtime(&event).await;
        if let Some(alert) = cascade_alert {
            self.emit_cascade(alert).await;
        }
    }

    /// Driven by a sub-second external tick (spec §4.5 "2s flush
    /// tolerance"); flushes any bucket whose window has elapsed even if no
    /// further event arrives for that key.
    pub async fn sweep_cascades(&self, now: DateTime<Utc>) {
        for alert in self.cascade.sweep(now) {
            self.emit_cascade(alert).await;
        }
    }

    async fn emit_cascade(&self, mut alert: CascadeAlert) {
        alert.open_interest_usd = self
            .aggregator
            .market_stats(&alert.symbol)
            .await
            .map(|stats| stats.total_open_interest);
        self.alert_router.route_cascade(&alert).await;
    }
}
