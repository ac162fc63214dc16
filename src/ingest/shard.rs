//! One WebSocket shard connection: owns up to `WS_SHARD_SIZE` symbol
//! streams on a single combined-stream URL and feeds every decoded
//! liquidation through the shared `on_event` callback in arrival order
//! (persist -> cascade -> fan-out must not be re-ordered within a shard).
//!
//! A `tokio::spawn`ed task per shard on the process's one multi-threaded
//! runtime; no per-shard OS thread or CPU pinning -- forceOrder frames
//! carry no throughput requirement that would justify it.

use super::decode::decode_force_order;
use super::session::{SessionManager, SessionState, TransitionReason};
use crate::models::LiquidationEvent;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

const PING_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub struct Shard {
    index: usize,
    url: String,
    session: Arc<SessionManager>,
}

impl Shard {
    pub fn new(
        index: usize,
        base_ws_url: &str,
        symbols: &[&str],
        ping_interval: Duration,
        reconnect_backoff: Duration,
    ) -> Self {
        let streams = symbols
            .iter()
            .map(|s| format!("{}@forceOrder", s.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");
        let base = base_ws_url.trim_end_matches('/');
        let url = format!("{base}/stream?streams={streams}");
        Self {
            index,
            url,
            session: Arc::new(SessionManager::new(index, ping_interval, reconnect_backoff)),
        }
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    /// Runs until `shutdown_rx` observes `true`. Reconnects with the
    /// configured fixed backoff on any failure, and on a refresh signal
    /// from `refresh_rx` (spec §4.8 "every 24 hours: trigger C4
    /// connection refresh").
    pub async fn run<F, Fut>(&self, mut shutdown_rx: watch::Receiver<bool>, mut refresh_rx: watch::Receiver<u64>, on_event: F)
    where
        F: Fn(LiquidationEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            if *shutdown_rx.borrow() {
                return;
            }
            self.session.transition(SessionState::Connecting, TransitionReason::Started);

            match self.run_connection(&mut shutdown_rx, &mut refresh_rx, &on_event).await {
                Ok(()) => return, // shutdown requested mid-connection
                Err(reason) => {
                    self.session.transition(SessionState::Closed, reason);
                    tokio::select! {
                        _ = tokio::time::sleep(self.session.reconnect_backoff()) => {}
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_connection<F, Fut>(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
        refresh_rx: &mut watch::Receiver<u64>,
        on_event: &F,
    ) -> Result<(), TransitionReason>
    where
        F: Fn(LiquidationEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|_| TransitionReason::NetworkError)?;
        self.session.transition(SessionState::Open, TransitionReason::ConnectSuccess);

        let (mut write, mut read) = ws_stream.split();
        let mut ping_tick = tokio::time::interval(PING_CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        self.session.transition(SessionState::Closed, TransitionReason::ShutdownRequested);
                        return Ok(());
                    }
                }
                _ = refresh_rx.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Err(TransitionReason::ProactiveRefresh);
                }
                _ = ping_tick.tick() => {
                    if self.session.should_ping() {
                        if write.send(Message::Ping(Vec::new())).await.is_err() {
                            return Err(TransitionReason::NetworkError);
                        }
                        self.session.record_ping_sent();
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match decode_force_order(&text) {
                            Some(event) => on_event(event).await,
                            None => warn!(shard = self.index, "malformed_or_unexpected_frame"),
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => return Err(TransitionReason::ServerClose),
                        Some(Ok(_)) => {}
                        Some(Err(_)) => return Err(TransitionReason::NetworkError),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_stream_url_lowercases_symbols_and_joins_with_slash() {
        let shard = Shard::new(0, "wss://fstream.binance.com", &["BTCUSDT", "ETHUSDT"], Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(
            shard.url,
            "wss://fstream.binance.com/stream?streams=btcusdt@forceOrder/ethusdt@forceOrder"
        );
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let shard = Shard::new(0, "wss://fstream.binance.com/", &["BTCUSDT"], Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(shard.url, "wss://fstream.binance.com/stream?streams=btcusdt@forceOrder");
    }
}
