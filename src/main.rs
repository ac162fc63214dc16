//! Process entry point: loads configuration, wires every collaborator
//! (C1-C9), spawns the ingest shards and the scheduler's periodic jobs,
//! then blocks until `SIGINT`/`SIGTERM` and drains the ingest manager
//! within a grace window (spec §5 "on shutdown, close sockets and drain
//! in-flight flushes within 5s").

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use liq_sentinel::alerting::AlertRouter;
use liq_sentinel::cache::{Cache, InMemoryCache, RedisCache};
use liq_sentinel::cascade::CascadeDetector;
use liq_sentinel::config::Config;
use liq_sentinel::ingest::IngestManager;
use liq_sentinel::market_data::{Aggregator, OiSurgeScanner};
use liq_sentinel::messaging::TelegramClient;
use liq_sentinel::pipeline::Pipeline;
use liq_sentinel::reporting::ReportGenerator;
use liq_sentinel::scheduler::Scheduler;
use liq_sentinel::storage::{MongoStorage, Storage};
use liq_sentinel::symbols::SYMBOLS_TO_TRACK;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    info!("liquidation sentinel starting up");
    info!(symbols = SYMBOLS_TO_TRACK.len(), "tracked universe loaded");

    let cache: Arc<dyn Cache> = match &config.redis_host {
        Some(host) => {
            info!(host, port = config.redis_port, "using Redis cache backend");
            Arc::new(RedisCache::connect(host, config.redis_port).await.context("failed to connect to Redis")?)
        }
        None => {
            info!("no REDIS_HOST set, using in-process cache backend");
            Arc::new(InMemoryCache::new())
        }
    };

    let storage: Arc<dyn Storage> = Arc::new(
        MongoStorage::connect(&config.mongo_uri, &config.mongo_db_name)
            .await
            .context("failed to connect to MongoDB")?,
    );
    info!(db = %config.mongo_db_name, "connected to MongoDB");

    let messaging = Arc::new(TelegramClient::new(config.telegram_bot_token.clone()).context("failed to build Telegram client")?);

    let aggregator = Arc::new(Aggregator::new(cache.clone()).context("failed to build market-data aggregator")?);

    let cascade = Arc::new(CascadeDetector::new(
        config.tuning.cascade_window_secs,
        config.tuning.cascade_min_count,
        config.tuning.cascade_min_volume,
    ));

    let alert_router = Arc::new(AlertRouter::new(
        storage.clone(),
        messaging,
        config.telegram_channel_id.clone(),
        config.tuning.channel_min_liquidation,
    ));

    let report_generator = Arc::new(ReportGenerator::new(storage.clone(), aggregator.clone(), SYMBOLS_TO_TRACK));

    let oi_scanner = Arc::new(OiSurgeScanner::new(aggregator.clone(), cache.clone(), config.tuning.oi_surge_threshold_pct));

    let pipeline = Arc::new(Pipeline::new(storage.clone(), cascade, aggregator, alert_router.clone()));

    let mut ingest = IngestManager::new(
        &config.futures_ws_url,
        SYMBOLS_TO_TRACK,
        config.tuning.ws_shard_size,
        Duration::from_secs(config.tuning.ws_ping_secs),
        Duration::from_secs(config.tuning.ws_reconnect_backoff_secs),
    );
    info!(shards = ingest.shard_count(), "ingest shards built");

    {
        let pipeline = pipeline.clone();
        ingest.spawn(move |event| {
            let pipeline = pipeline.clone();
            async move { pipeline.handle_event(event).await }
        });
    }
    let ingest = Arc::new(ingest);

    let scheduler = Arc::new(Scheduler::new(
        storage,
        alert_router,
        report_generator,
        oi_scanner,
        pipeline,
        ingest.clone(),
        SYMBOLS_TO_TRACK,
        ChronoDuration::seconds(config.tuning.retention_secs),
    ));
    scheduler.spawn_all(
        Duration::from_secs(config.tuning.oi_scan_interval_secs),
        Duration::from_secs(config.tuning.ws_refresh_secs),
        Duration::from_secs(config.tuning.retention_tick_secs),
    );

    info!("startup complete, ingesting liquidations");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining ingest within grace window");
    ingest.shutdown(Duration::from_secs(5)).await;
    info!("shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "liq_sentinel=info".into());
    if cfg!(debug_assertions) {
        tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().json()).init();
    }
}
