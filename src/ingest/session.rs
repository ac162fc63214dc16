//! Per-connection session state: three states and a single fixed
//! reconnect delay. No endpoint rotation/circuit breaker -- there is one
//! `FUTURES_WS_URL`, not a pool of fallback hosts -- and no
//! data-staleness detection, since a forceOrder stream going quiet for
//! minutes is normal.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Connection state machine (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Reason for a state transition, carried through for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    ServerClose,
    NetworkError,
    ProactiveRefresh,
    ShutdownRequested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::ServerClose => write!(f, "server_close"),
            Self::NetworkError => write!(f, "network_error"),
            Self::ProactiveRefresh => write!(f, "proactive_refresh"),
            Self::ShutdownRequested => write!(f, "shutdown"),
        }
    }
}

/// Sends a ping every `ping_interval` while the connection is open (spec
/// §4.4 "every 30s, send a low-level ping if the connection is open").
#[derive(Debug)]
pub struct HeartbeatMonitor {
    ping_interval: Duration,
    last_ping_sent: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(ping_interval: Duration) -> Self {
        Self {
            ping_interval,
            last_ping_sent: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_ping_sent = None;
    }

    pub fn should_ping(&self) -> bool {
        match self.last_ping_sent {
            None => true,
            Some(last) => last.elapsed() >= self.ping_interval,
        }
    }

    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
    }
}

/// Coordinates one shard connection's lifecycle: current state, the fixed
/// reconnect backoff (spec gives a flat 5s delay, not exponential, so no
/// `BackoffCalculator` survives the transform), and the heartbeat monitor.
/// The 24h proactive refresh itself is driven externally by the scheduler
/// (spec §4.8: "every 24 hours: trigger C4 connection refresh") rather
/// than an internal per-connection clock, so this manager only tracks
/// state + heartbeat.
#[derive(Debug)]
pub struct SessionManager {
    shard_index: usize,
    state: RwLock<SessionState>,
    heartbeat: RwLock<HeartbeatMonitor>,
    reconnect_backoff: Duration,
}

impl SessionManager {
    pub fn new(shard_index: usize, ping_interval: Duration, reconnect_backoff: Duration) -> Self {
        Self {
            shard_index,
            state: RwLock::new(SessionState::Connecting),
            heartbeat: RwLock::new(HeartbeatMonitor::new(ping_interval)),
            reconnect_backoff,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn transition(&self, new_state: SessionState, reason: TransitionReason) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        if new_state == SessionState::Open {
            self.heartbeat.write().reset();
        }

        info!(
            shard = self.shard_index,
            from = %old_state,
            to = %new_state,
            reason = %reason,
            "shard_session_transition"
        );
    }

    pub fn reconnect_backoff(&self) -> Duration {
        self.reconnect_backoff
    }

    pub fn should_ping(&self) -> bool {
        self.heartbeat.read().should_ping()
    }

    pub fn record_ping_sent(&self) {
        self.heartbeat.write().record_ping_sent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_connecting_and_opens() {
        let manager = SessionManager::new(0, Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(manager.state(), SessionState::Connecting);
        manager.transition(SessionState::Open, TransitionReason::ConnectSuccess);
        assert_eq!(manager.state(), SessionState::Open);
    }

    #[test]
    fn should_ping_before_first_ping_and_after_interval_elapses() {
        let manager = SessionManager::new(0, Duration::from_millis(10), Duration::from_secs(5));
        assert!(manager.should_ping());
        manager.record_ping_sent();
        assert!(!manager.should_ping());
        std::thread::sleep(Duration::from_millis(15));
        assert!(manager.should_ping());
    }

    #[test]
    fn reconnect_closes_then_reopens_and_resets_heartbeat() {
        let manager = SessionManager::new(0, Duration::from_secs(30), Duration::from_secs(5));
        manager.transition(SessionState::Open, TransitionReason::ConnectSuccess);
        manager.record_ping_sent();
        assert!(!manager.should_ping());
        manager.transition(SessionState::Closed, TransitionReason::NetworkError);
        manager.transition(SessionState::Open, TransitionReason::ConnectSuccess);
        assert!(manager.should_ping());
    }
}
