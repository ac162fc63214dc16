//! In-process `Storage` test double: a `parking_lot::Mutex`-guarded `Vec`
//! of events and `HashMap` of subscribers. Used by the cascade/alert/report
//! unit tests so none of them need a live Mongo instance.

use super::Storage;
use crate::models::{LiquidationEvent, Subscriber};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryStorage {
    liquidations: Mutex<Vec<LiquidationEvent>>,
    subscribers: Mutex<HashMap<i64, Subscriber>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_liquidation(&self, event: &LiquidationEvent) -> anyhow::Result<()> {
        self.liquidations.lock().push(event.clone());
        Ok(())
    }

    async fn get_liquidations_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>> {
        let mut out: Vec<_> = self
            .liquidations
            .lock()
            .iter()
            .filter(|e| e.symbol == symbol && e.time >= start && e.time < end)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        Ok(out)
    }

    async fn get_overall_liquidations_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>> {
        let mut out: Vec<_> = self
            .liquidations
            .lock()
            .iter()
            .filter(|e| e.time >= start && e.time < end)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.time);
        Ok(out)
    }

    async fn find_or_create_subscriber(
        &self,
        chat_id: i64,
        first_name: Option<String>,
        username: Option<String>,
    ) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        if let Some(existing) = subscribers.get(&chat_id) {
            return Ok(existing.clone());
        }
        let created = Subscriber::new_default(chat_id, first_name, username);
        subscribers.insert(chat_id, created.clone());
        Ok(created)
    }

    async fn toggle_tracked_symbol(&self, chat_id: i64, symbol: &str) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        let sub = subscribers
            .get_mut(&chat_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        if let Some(pos) = sub.tracked_symbols.iter().position(|s| s == symbol) {
            sub.tracked_symbols.remove(pos);
        } else {
            sub.tracked_symbols.push(symbol.to_string());
        }
        Ok(sub.clone())
    }

    async fn set_tracked_symbols(
        &self,
        chat_id: i64,
        symbols: Vec<String>,
    ) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        let sub = subscribers
            .get_mut(&chat_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        sub.tracked_symbols = symbols;
        Ok(sub.clone())
    }

    async fn set_notifications(
        &self,
        chat_id: i64,
        enabled: Option<bool>,
    ) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        let sub = subscribers
            .get_mut(&chat_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        sub.notifications_enabled = enabled.unwrap_or(!sub.notifications_enabled);
        Ok(sub.clone())
    }

    async fn set_report_interval(&self, chat_id: i64, hours: u32) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        let sub = subscribers
            .get_mut(&chat_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        sub.report_interval_hours = hours;
        Ok(sub.clone())
    }

    async fn set_alert_threshold(&self, chat_id: i64, amount: u64) -> anyhow::Result<Subscriber> {
        let mut subscribers = self.subscribers.lock();
        let sub = subscribers
            .get_mut(&chat_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        sub.min_liquidation_alert = amount;
        Ok(sub.clone())
    }

    async fn find_subscribers_tracking_symbol(
        &self,
        symbol: &str,
    ) -> anyhow::Result<Vec<Subscriber>> {
        Ok(self
            .subscribers
            .lock()
            .values()
            .filter(|s| s.notifications_enabled && s.tracks(symbol))
            .cloned()
            .collect())
    }

    async fn active_subscribers(&self) -> anyhow::Result<Vec<Subscriber>> {
        Ok(self
            .subscribers
            .lock()
            .values()
            .filter(|s| s.notifications_enabled && !s.tracked_symbols.is_empty())
            .cloned()
            .collect())
    }

    async fn delete_liquidations_older_than(&self, instant: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut liquidations = self.liquidations.lock();
        let before = liquidations.len();
        liquidations.retain(|e| e.time >= instant);
        Ok((before - liquidations.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Duration;

    fn event_at(symbol: &str, secs_ago: i64) -> LiquidationEvent {
        LiquidationEvent::new(
            symbol,
            Side::LongLiquidated,
            100.0,
            1.0,
            Utc::now() - Duration::seconds(secs_ago),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn find_or_create_subscriber_is_idempotent() {
        let storage = InMemoryStorage::new();
        let first = storage
            .find_or_create_subscriber(1, Some("Ada".into()), None)
            .await
            .unwrap();
        let second = storage
            .find_or_create_subscriber(1, Some("Someone Else".into()), None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn toggle_tracked_symbol_is_xor() {
        let storage = InMemoryStorage::new();
        storage.find_or_create_subscriber(1, None, None).await.unwrap();
        let sub = storage.toggle_tracked_symbol(1, "BTCUSDT").await.unwrap();
        assert!(sub.tracks("BTCUSDT"));
        let sub = storage.toggle_tracked_symbol(1, "BTCUSDT").await.unwrap();
        assert!(!sub.tracks("BTCUSDT"));
    }

    #[tokio::test]
    async fn delete_liquidations_older_than_prunes_only_old_events() {
        let storage = InMemoryStorage::new();
        storage.save_liquidation(&event_at("BTCUSDT", 3600)).await.unwrap();
        storage.save_liquidation(&event_at("BTCUSDT", 10)).await.unwrap();
        let cutoff = Utc::now() - Duration::seconds(60);
        let deleted = storage.delete_liquidations_older_than(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        let remaining = storage
            .get_overall_liquidations_between(cutoff - Duration::seconds(10000), Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn active_subscribers_requires_enabled_and_nonempty_tracking() {
        let storage = InMemoryStorage::new();
        storage.find_or_create_subscriber(1, None, None).await.unwrap();
        storage.find_or_create_subscriber(2, None, None).await.unwrap();
        storage.toggle_tracked_symbol(1, "BTCUSDT").await.unwrap();
        // subscriber 2 has no tracked symbols -> excluded despite notifications enabled
        let active = storage.active_subscribers().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].chat_id, 1);
    }
}
