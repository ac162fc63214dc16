//! Error taxonomy.
//!
//! Most call sites propagate with `anyhow::Result` + `.context(...)`. The
//! handful of places that must *match* on error kind -- cascade/fan-out
//! deciding whether a messaging failure should disable a subscriber, the
//! ingest shard deciding whether to reconnect -- use this hand-written enum
//! with a manual `Display` impl rather than pulling in `thiserror`.

use std::fmt;

/// Error kinds routed differently by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// HTTP timeout, 5xx, or WebSocket drop. Per-venue queries swallow this
    /// (the venue is simply absent from the result); the ingest shard
    /// reconnects with backoff.
    TransientUpstream(String),
    /// Non-2xx response, or a 2xx body that failed validation.
    UpstreamError(String),
    /// Unparseable JSON from an upstream feed. Logged and dropped; never
    /// crashes the shard.
    MalformedUpstream(String),
    /// Document store unreachable. Persistence is skipped; alerting
    /// continues regardless.
    StorageUnavailable(String),
    /// Recipient unreachable (Telegram 403-class). The subscriber's
    /// notifications are disabled; the message is not retried.
    RecipientBlocked,
    /// Missing/invalid required configuration. The only kind that aborts
    /// the process, and only at startup.
    ConfigInvalid(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientUpstream(msg) => write!(f, "transient upstream error: {msg}"),
            Self::UpstreamError(msg) => write!(f, "upstream error: {msg}"),
            Self::MalformedUpstream(msg) => write!(f, "malformed upstream payload: {msg}"),
            Self::StorageUnavailable(msg) => write!(f, "storage unavailable: {msg}"),
            Self::RecipientBlocked => write!(f, "recipient blocked"),
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// True for failures that should trigger a shard reconnect / venue skip
    /// rather than a crash.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUpstream(_) | Self::UpstreamError(_))
    }
}
