//! Cascade Detector (C5, spec §4.5): per-`(symbol, side)` bucketed
//! accumulators that flush into a single aggregate alert once a short
//! window crosses both a count and a volume floor, instead of alerting on
//! every individual liquidation.
//!
//! Bucket map is a `dashmap::DashMap` keyed by the composite `(symbol,
//! side)` -- a concurrent map with per-entry locking rather than a single
//! global lock. Flush is driven two ways: lazily inline when the next
//! event for a key arrives after the bucket's deadline (`ingest`), and by
//! a periodic sweep (`sweep`) for keys that go quiet before a new event
//! arrives.

use crate::models::{CascadeAlert, CascadeBucket, LiquidationEvent, Side};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub struct CascadeDetector {
    buckets: DashMap<(String, Side), CascadeBucket>,
    window: ChronoDuration,
    min_count: u32,
    min_volume: f64,
}

impl CascadeDetector {
    pub fn new(window_secs: u64, min_count: u32, min_volume: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            window: ChronoDuration::seconds(window_secs as i64),
            min_count,
            min_volume,
        }
    }

    /// Accumulate one event into its `(symbol, side)` bucket (spec §4.5
    /// steps 1-3). If the existing bucket is already past its deadline,
    /// it is flushed first and a fresh bucket is seeded with this event --
    /// the lazy-flush-on-next-ingest half of the dual flush policy.
    pub fn ingest(&self, event: &LiquidationEvent) -> Option<CascadeAlert> {
        let key = (event.symbol.clone(), event.side);

        match self.buckets.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(CascadeBucket::seed(event));
                None
            }
            Entry::Occupied(mut occupied) => {
                if event.time - occupied.get().start_time >= self.window {
                    let stale = occupied.remove();
                    self.buckets.insert(key, CascadeBucket::seed(event));
                    self.evaluate(&stale)
                } else {
                    occupied.get_mut().accumulate(event);
                    None
                }
            }
        }
    }

    /// Periodic sweep (spec §4.5 "every eligible bucket must be flushed
    /// within 2s of its deadline"): flushes every bucket whose window has
    /// elapsed relative to `now`, regardless of whether new events have
    /// arrived for that key. Intended to be called on a sub-second tick.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<CascadeAlert> {
        let due: Vec<(String, Side)> = self
            .buckets
            .iter()
            .filter(|entry| now - entry.start_time >= self.window)
            .map(|entry| entry.key().clone())
            .collect();

        let mut alerts = Vec::new();
        for key in due {
            if let Some((_, bucket)) = self.buckets.remove(&key) {
                if let Some(alert) = self.evaluate(&bucket) {
                    alerts.push(alert);
                }
            }
        }
        alerts
    }

    /// Eligibility check (spec §4.5 "emit ... if ALL of: count >= 3 AND
    /// totalVolume >= 100_000"). The bucket is always removed by the
    /// caller regardless of the outcome -- eligibility only gates whether
    /// an alert is *emitted*, not whether the bucket is destroyed.
    fn evaluate(&self, bucket: &CascadeBucket) -> Option<CascadeAlert> {
        if !bucket.meets_threshold(self.min_count, self.min_volume) {
            return None;
        }
        Some(CascadeAlert {
            symbol: bucket.symbol.clone(),
            side: bucket.side,
            count: bucket.count,
            total_volume: bucket.total_volume,
            min_price: bucket.min_price,
            max_price: bucket.max_price,
            open_interest_usd: None,
        })
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
