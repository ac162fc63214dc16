//! Persistence layer: two collections, `liquidations` and `subscribers`,
//! behind a single trait so the rest of the pipeline never talks to Mongo
//! directly. A struct owning the connection, one method per query,
//! `anyhow::Result` throughout, `#[cfg(test)]` exercising a real backend
//! end to end.

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStorage;
pub use mongo::MongoStorage;

use crate::models::{LiquidationEvent, Subscriber};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything the pipeline needs from its document store.
///
/// Every method may fail (`StorageUnavailable` at the call site, per spec
/// §7); callers that are on the hot ingest path treat a persistence failure
/// as best-effort and log-and-drop rather than propagate.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_liquidation(&self, event: &LiquidationEvent) -> anyhow::Result<()>;

    async fn get_liquidations_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>>;

    async fn get_overall_liquidations_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>>;

    /// Returns the existing row, or inserts one with defaults (empty
    /// `trackedSymbols`, notifications on, 4h interval, 10k floor).
    /// Under a duplicate-key race the winning row is re-read and returned.
    async fn find_or_create_subscriber(
        &self,
        chat_id: i64,
        first_name: Option<String>,
        username: Option<String>,
    ) -> anyhow::Result<Subscriber>;

    /// Set-XOR `symbol` into `trackedSymbols`; returns the updated row.
    async fn toggle_tracked_symbol(&self, chat_id: i64, symbol: &str) -> anyhow::Result<Subscriber>;

    async fn set_tracked_symbols(
        &self,
        chat_id: i64,
        symbols: Vec<String>,
    ) -> anyhow::Result<Subscriber>;

    /// `enabled = None` flips the current value; `Some(v)` sets it.
    async fn set_notifications(
        &self,
        chat_id: i64,
        enabled: Option<bool>,
    ) -> anyhow::Result<Subscriber>;

    async fn set_report_interval(&self, chat_id: i64, hours: u32) -> anyhow::Result<Subscriber>;

    async fn set_alert_threshold(&self, chat_id: i64, amount: u64) -> anyhow::Result<Subscriber>;

    async fn find_subscribers_tracking_symbol(
        &self,
        symbol: &str,
    ) -> anyhow::Result<Vec<Subscriber>>;

    /// `notificationsEnabled = true` and `trackedSymbols` non-empty.
    async fn active_subscribers(&self) -> anyhow::Result<Vec<Subscriber>>;

    async fn delete_liquidations_older_than(&self, instant: DateTime<Utc>) -> anyhow::Result<u64>;
}
