//! Scheduler: four independent periodic jobs -- hourly report trigger,
//! daily retention delete, 15-minute OI scan, 24-hour connection refresh --
//! each re-entrancy-guarded by its own mutex so an overrunning tick is
//! skipped rather than overlapping the next one.
//!
//! One `tokio::spawn`ed task per job wrapping a `tokio::time::interval`.
//! Non-overlap uses `Arc<tokio::sync::Mutex<()>>` + `try_lock` so a slow
//! job skips its next tick instead of running concurrently with itself.

use crate::alerting::AlertRouter;
use crate::ingest::IngestManager;
use crate::market_data::OiSurgeScanner;
use crate::pipeline::Pipeline;
use crate::reporting::ReportGenerator;
use crate::storage::Storage;
use chrono::{Duration as ChronoDuration, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Guards one job's re-entrancy: `try_lock` at the top of every tick,
/// skip-and-log-once on contention (spec §4.8, §9).
async fn run_exclusive<F, Fut>(lock: &Arc<Mutex<()>>, job: &str, f: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    match lock.clone().try_lock_owned() {
        Ok(guard) => {
            f().await;
            drop(guard);
        }
        Err(_) => warn!(job, "previous tick still running, skipping"),
    }
}

pub struct Scheduler {
    storage: Arc<dyn Storage>,
    alert_router: Arc<AlertRouter>,
    report_generator: Arc<ReportGenerator>,
    oi_scanner: Arc<OiSurgeScanner>,
    pipeline: Arc<Pipeline>,
    ingest: Arc<IngestManager>,
    universe: &'static [&'static str],
    retention: ChronoDuration,

    hourly_lock: Arc<Mutex<()>>,
    retention_lock: Arc<Mutex<()>>,
    oi_scan_lock: Arc<Mutex<()>>,
    refresh_lock: Arc<Mutex<()>>,
    cascade_sweep_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        alert_router: Arc<AlertRouter>,
        report_generator: Arc<ReportGenerator>,
        oi_scanner: Arc<OiSurgeScanner>,
        pipeline: Arc<Pipeline>,
        ingest: Arc<IngestManager>,
        universe: &'static [&'static str],
        retention: ChronoDuration,
    ) -> Self {
        Self {
            storage,
            alert_router,
            report_generator,
            oi_scanner,
            pipeline,
            ingest,
            universe,
            retention,
            hourly_lock: Arc::new(Mutex::new(())),
            retention_lock: Arc::new(Mutex::new(())),
            oi_scan_lock: Arc::new(Mutex::new(())),
            refresh_lock: Arc::new(Mutex::new(())),
            cascade_sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Spawns all jobs as independent tasks. Returns immediately; the jobs
    /// run for the lifetime of the process.
    pub fn spawn_all(self: &Arc<Self>, oi_scan_interval: Duration, ws_refresh_interval: Duration, retention_tick: Duration) {
        self.clone().spawn_hourly_reports();
        self.clone().spawn_daily_retention(retention_tick);
        self.clone().spawn_oi_scan(oi_scan_interval);
        self.clone().spawn_connection_refresh(ws_refresh_interval);
        self.clone().spawn_cascade_sweep();
    }

    /// At minute 0 of every hour, sends a report to every active
    /// subscriber whose `currentUTChour mod reportIntervalHours == 0`
    /// (spec §4.8).
    fn spawn_hourly_reports(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                sleep_until_next_hour_boundary().await;
                let scheduler = self.clone();
                run_exclusive(&self.hourly_lock, "hourly_reports", || async move {
                    scheduler.run_hourly_reports().await;
                })
                .await;
            }
        });
    }

    async fn run_hourly_reports(&self) {
        let now = Utc::now();
        let hour = now.hour();
        let subscribers = match self.storage.active_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                warn!(error = %err, "failed to load active subscribers for hourly report");
                return;
            }
        };

        for subscriber in subscribers {
            if subscriber.report_interval_hours == 0 || hour % subscriber.report_interval_hours != 0 {
                continue;
            }
            if let Some(report) = self
                .report_generator
                .generate_report(&subscriber, subscriber.report_interval_hours, true)
                .await
            {
                self.alert_router.send_report(subscriber.chat_id, &report).await;
            }
        }
    }

    /// At 00:00 UTC, deletes liquidations older than the retention window
    /// (spec §4.8).
    fn spawn_daily_retention(self: Arc<Self>, retention_tick: Duration) {
        tokio::spawn(async move {
            loop {
                sleep_until_next_midnight_utc().await;
                let scheduler = self.clone();
                run_exclusive(&self.retention_lock, "daily_retention", || async move {
                    scheduler.run_retention().await;
                })
                .await;
                // retention_tick is a floor on how often this can fire,
                // guarding against clock skew collapsing two boundaries.
                tokio::time::sleep(retention_tick.min(Duration::from_secs(60))).await;
            }
        });
    }

    async fn run_retention(&self) {
        let cutoff = Utc::now() - self.retention;
        match self.storage.delete_liquidations_older_than(cutoff).await {
            Ok(deleted) if deleted > 0 => info!(deleted, "pruned liquidations older than retention window"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "retention delete failed"),
        }
    }

    /// Every `OI_SCAN_INTERVAL`, scans the tracked-symbol universe for
    /// an OI surge and routes any hits (spec §4.8).
    fn spawn_oi_scan(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let scheduler = self.clone();
                run_exclusive(&self.oi_scan_lock, "oi_surge_scan", || async move {
                    let alerts = scheduler.oi_scanner.scan(scheduler.universe).await;
                    for alert in alerts {
                        scheduler.alert_router.route_oi_surge(&alert).await;
                    }
                })
                .await;
            }
        });
    }

    /// Every `WS_REFRESH`, proactively recycles every ingest shard
    /// connection (spec §4.8, §4.4).
    fn spawn_connection_refresh(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let scheduler = self.clone();
                run_exclusive(&self.refresh_lock, "connection_refresh", || async move {
                    scheduler.ingest.request_refresh();
                })
                .await;
            }
        });
    }

    /// Sub-second sweep for cascade buckets that go quiet before a
    /// triggering next event arrives (spec §4.5 "2s flush tolerance").
    fn spawn_cascade_sweep(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                ticker.tick().await;
                let scheduler = self.clone();
                run_exclusive(&self.cascade_sweep_lock, "cascade_sweep", || async move {
                    scheduler.pipeline.sweep_cascades(Utc::now()).await;
                })
                .await;
            }
        });
    }
}

/// Sleeps until the top of the next hour (minute 0, second 0), so
/// `run_hourly_reports` fires exactly once per qualifying hour rather than
/// once per minute (spec §4.8 "Hourly, at minute 0").
async fn sleep_until_next_hour_boundary() {
    let now = Utc::now();
    let secs_into_hour = (now.minute() * 60 + now.second()) as u64;
    let delay = if secs_into_hour == 0 { 3600 } else { 3600 - secs_into_hour };
    tokio::time::sleep(Duration::from_secs(delay)).await;
}

async fn sleep_until_next_midnight_utc() {
    let now = Utc::now();
    let seconds_today = now.num_seconds_from_midnight() as i64;
    let remaining = 86_400 - seconds_today;
    tokio::time::sleep(Duration::from_secs(remaining.max(1) as u64)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn run_exclusive_skips_when_lock_is_held() {
        let lock = Arc::new(Mutex::new(()));
        let guard = lock.clone().try_lock_owned().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        run_exclusive(&lock, "test_job", || async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        drop(guard);
    }

    #[tokio::test]
    async fn run_exclusive_runs_when_lock_is_free() {
        let lock = Arc::new(Mutex::new(()));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        run_exclusive(&lock, "test_job", || async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
