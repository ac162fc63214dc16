//! Ingest manager: shards the tracked-symbol universe into
//! `WS_SHARD_SIZE`-sized groups, one shard connection per group, and
//! issues shutdown/refresh as broadcast commands over `tokio::sync::watch`
//! channels, generalized from one update channel to two independent
//! signals so the manager owns a collection of shard actors and refresh
//! is simply a broadcast command it issues.

use super::shard::Shard;
use crate::models::LiquidationEvent;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct IngestManager {
    shards: Vec<Arc<Shard>>,
    shutdown_tx: watch::Sender<bool>,
    refresh_tx: watch::Sender<u64>,
    handles: Vec<JoinHandle<()>>,
}

impl IngestManager {
    pub fn new(
        base_ws_url: &str,
        universe: &[&str],
        shard_size: usize,
        ping_interval: Duration,
        reconnect_backoff: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (refresh_tx, _) = watch::channel(0u64);
        let shards = universe
            .chunks(shard_size.max(1))
            .enumerate()
            .map(|(index, chunk)| Arc::new(Shard::new(index, base_ws_url, chunk, ping_interval, reconnect_backoff)))
            .collect();
        Self {
            shards,
            shutdown_tx,
            refresh_tx,
            handles: Vec::new(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Spawns one task per shard; `on_event` is cloned into every task, so
    /// it must be cheap to clone (an `Arc`-wrapped pipeline handle).
    pub fn spawn<F, Fut>(&mut self, on_event: F)
    where
        F: Fn(LiquidationEvent) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        for shard in &self.shards {
            let shard = shard.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let refresh_rx = self.refresh_tx.subscribe();
            let on_event = on_event.clone();
            self.handles.push(tokio::spawn(async move {
                shard.run(shutdown_rx, refresh_rx, on_event).await;
            }));
        }
    }

    /// Broadcasts the 24h proactive refresh (spec §4.8): every shard's
    /// current connection closes and reconnects through its normal
    /// backoff path.
    pub fn request_refresh(&self) {
        let _ = self.refresh_tx.send(self.refresh_tx.borrow().wrapping_add(1));
    }

    /// Broadcasts shutdown; callers that hold the only `Arc` can additionally
    /// wait out the grace window so in-flight shard tasks have a chance to
    /// observe it and exit cleanly (spec §5 "5s shutdown grace").
    pub fn broadcast_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown(&self, grace: Duration) {
        self.broadcast_shutdown();
        tokio::time::sleep(grace).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_chunk_universe_by_shard_size() {
        let universe: Vec<&str> = (0..125).map(|_| "BTCUSDT").collect();
        let manager = IngestManager::new("wss://example.invalid", &universe, 50, Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(manager.shard_count(), 3);
    }

    #[test]
    fn empty_universe_yields_no_shards() {
        let manager = IngestManager::new("wss://example.invalid", &[], 50, Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(manager.shard_count(), 0);
    }
}
