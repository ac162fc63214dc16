//! Real-time cryptocurrency liquidation and derivatives-market
//! observability pipeline: sharded WebSocket ingest, cascade detection, a
//! cross-venue market-data aggregator with OI-surge monitoring, a
//! scheduled reporting engine, and an alert fan-out contract.
//!
//! Module map (spec §2 components):
//! - [`cache`] -- C1, TTL-keyed blob store (in-process or Redis).
//! - [`storage`] -- C2, the `liquidations`/`subscribers` document store.
//! - [`market_data`] -- C3, cross-venue aggregation + OI-surge scan.
//! - [`ingest`] -- C4, sharded WebSocket ingest.
//! - [`cascade`] -- C5, per-`(symbol, side)` cascade detector.
//! - [`alerting`] -- C6, alert rendering + fan-out routing.
//! - [`reporting`] -- C7, the hourly/live digest generator.
//! - [`scheduler`] -- C8, the four periodic jobs.
//! - [`messaging`] -- C9, the Telegram send adapter.

pub mod alerting;
pub mod cache;
pub mod cascade;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod market_data;
pub mod messaging;
pub mod models;
pub mod pipeline;
pub mod reporting;
pub mod scheduler;
pub mod storage;
pub mod symbols;
