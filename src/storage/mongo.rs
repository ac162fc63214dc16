//! MongoDB-backed `Storage`: two collections, no other tables. One struct
//! owning the connection, one method per query, `anyhow::Context` on every
//! fallible call, `#[cfg(test)]` exercising a real server when
//! `MONGO_TEST_URI` is set (see `tests` module).

use super::Storage;
use crate::models::{LiquidationEvent, Side, Subscriber, VALID_REPORT_INTERVALS};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LiquidationDoc {
    symbol: String,
    side: Side,
    price: f64,
    quantity: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    time: DateTime<Utc>,
}

impl From<&LiquidationEvent> for LiquidationDoc {
    fn from(event: &LiquidationEvent) -> Self {
        Self {
            symbol: event.symbol.clone(),
            side: event.side,
            price: event.price,
            quantity: event.quantity,
            time: event.time,
        }
    }
}

impl From<LiquidationDoc> for LiquidationEvent {
    fn from(doc: LiquidationDoc) -> Self {
        LiquidationEvent {
            symbol: doc.symbol,
            side: doc.side,
            price: doc.price,
            quantity: doc.quantity,
            time: doc.time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubscriberDoc {
    #[serde(rename = "chatId")]
    chat_id: i64,
    #[serde(rename = "firstName")]
    first_name: Option<String>,
    username: Option<String>,
    #[serde(rename = "trackedSymbols")]
    tracked_symbols: Vec<String>,
    #[serde(rename = "notificationsEnabled")]
    notifications_enabled: bool,
    #[serde(rename = "reportIntervalHours")]
    report_interval_hours: u32,
    #[serde(rename = "minLiquidationAlert")]
    min_liquidation_alert: u64,
    #[serde(
        rename = "createdAt",
        with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    created_at: DateTime<Utc>,
}

impl From<&Subscriber> for SubscriberDoc {
    fn from(s: &Subscriber) -> Self {
        Self {
            chat_id: s.chat_id,
            first_name: s.first_name.clone(),
            username: s.username.clone(),
            tracked_symbols: s.tracked_symbols.clone(),
            notifications_enabled: s.notifications_enabled,
            report_interval_hours: s.report_interval_hours,
            min_liquidation_alert: s.min_liquidation_alert,
            created_at: s.created_at,
        }
    }
}

impl From<SubscriberDoc> for Subscriber {
    fn from(d: SubscriberDoc) -> Self {
        Subscriber {
            chat_id: d.chat_id,
            first_name: d.first_name,
            username: d.username,
            tracked_symbols: d.tracked_symbols,
            notifications_enabled: d.notifications_enabled,
            report_interval_hours: d.report_interval_hours,
            min_liquidation_alert: d.min_liquidation_alert,
            created_at: d.created_at,
        }
    }
}

pub struct MongoStorage {
    liquidations: Collection<LiquidationDoc>,
    subscribers: Collection<SubscriberDoc>,
}

impl MongoStorage {
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("failed to connect to MongoDB")?;
        let db = client.database(db_name);
        let liquidations = db.collection::<LiquidationDoc>("liquidations");
        let subscribers = db.collection::<SubscriberDoc>("subscribers");

        liquidations
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "symbol": 1, "time": -1 })
                    .build(),
                None,
            )
            .await
            .context("failed to create liquidations index")?;

        subscribers
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "chatId": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await
            .context("failed to create subscribers unique index")?;

        Ok(Self {
            liquidations,
            subscribers,
        })
    }

    async fn find_subscriber(&self, chat_id: i64) -> anyhow::Result<Option<Subscriber>> {
        let doc = self
            .subscribers
            .find_one(doc! { "chatId": chat_id }, None)
            .await
            .context("failed to query subscriber")?;
        Ok(doc.map(Subscriber::from))
    }

    async fn update_subscriber(
        &self,
        chat_id: i64,
        update: mongodb::bson::Document,
    ) -> anyhow::Result<Subscriber> {
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let doc = self
            .subscribers
            .find_one_and_update(doc! { "chatId": chat_id }, update, opts)
            .await
            .context("failed to update subscriber")?
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        Ok(Subscriber::from(doc))
    }
}

#[async_trait]
impl Storage for MongoStorage {
    async fn save_liquidation(&self, event: &LiquidationEvent) -> anyhow::Result<()> {
        self.liquidations
            .insert_one(LiquidationDoc::from(event), None)
            .await
            .context("failed to insert liquidation")?;
        Ok(())
    }

    async fn get_liquidations_between(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>> {
        use futures_util::stream::TryStreamExt;
        let filter = doc! {
            "symbol": symbol,
            "time": { "$gte": bson_time(start), "$lt": bson_time(end) },
        };
        let sort = doc! { "time": 1 };
        let mut cursor = self
            .liquidations
            .find(filter, mongodb::options::FindOptions::builder().sort(sort).build())
            .await
            .context("failed to query liquidations")?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(LiquidationEvent::from(doc));
        }
        Ok(out)
    }

    async fn get_overall_liquidations_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LiquidationEvent>> {
        use futures_util::stream::TryStreamExt;
        let filter = doc! {
            "time": { "$gte": bson_time(start), "$lt": bson_time(end) },
        };
        let sort = doc! { "time": 1 };
        let mut cursor = self
            .liquidations
            .find(filter, mongodb::options::FindOptions::builder().sort(sort).build())
            .await
            .context("failed to query liquidations")?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(LiquidationEvent::from(doc));
        }
        Ok(out)
    }

    async fn find_or_create_subscriber(
        &self,
        chat_id: i64,
        first_name: Option<String>,
        username: Option<String>,
    ) -> anyhow::Result<Subscriber> {
        if let Some(existing) = self.find_subscriber(chat_id).await? {
            return Ok(existing);
        }
        let created = Subscriber::new_default(chat_id, first_name, username);
        match self
            .subscribers
            .insert_one(SubscriberDoc::from(&created), None)
            .await
        {
            Ok(_) => Ok(created),
            Err(e) => {
                // Duplicate-key race: another task won the insert. Re-read
                // and return whatever is actually stored.
                if e.to_string().contains("E11000") {
                    self.find_subscriber(chat_id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} vanished after race"))
                } else {
                    Err(e).context("failed to insert subscriber")
                }
            }
        }
    }

    async fn toggle_tracked_symbol(&self, chat_id: i64, symbol: &str) -> anyhow::Result<Subscriber> {
        let existing = self
            .find_subscriber(chat_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
        let update = if existing.tracks(symbol) {
            doc! { "$pull": { "trackedSymbols": symbol } }
        } else {
            doc! { "$addToSet": { "trackedSymbols": symbol } }
        };
        self.update_subscriber(chat_id, update).await
    }

    async fn set_tracked_symbols(
        &self,
        chat_id: i64,
        symbols: Vec<String>,
    ) -> anyhow::Result<Subscriber> {
        self.update_subscriber(chat_id, doc! { "$set": { "trackedSymbols": symbols } })
            .await
    }

    async fn set_notifications(
        &self,
        chat_id: i64,
        enabled: Option<bool>,
    ) -> anyhow::Result<Subscriber> {
        let value = match enabled {
            Some(v) => v,
            None => {
                let existing = self
                    .find_subscriber(chat_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("subscriber {chat_id} not found"))?;
                !existing.notifications_enabled
            }
        };
        self.update_subscriber(chat_id, doc! { "$set": { "notificationsEnabled": value } })
            .await
    }

    async fn set_report_interval(&self, chat_id: i64, hours: u32) -> anyhow::Result<Subscriber> {
        if !VALID_REPORT_INTERVALS.contains(&hours) {
            anyhow::bail!("invalid report interval {hours}");
        }
        self.update_subscriber(chat_id, doc! { "$set": { "reportIntervalHours": hours as i64 } })
            .await
    }

    async fn set_alert_threshold(&self, chat_id: i64, amount: u64) -> anyhow::Result<Subscriber> {
        self.update_subscriber(
            chat_id,
            doc! { "$set": { "minLiquidationAlert": amount as i64 } },
        )
        .await
    }

    async fn find_subscribers_tracking_symbol(
        &self,
        symbol: &str,
    ) -> anyhow::Result<Vec<Subscriber>> {
        use futures_util::stream::TryStreamExt;
        let filter = doc! {
            "notificationsEnabled": true,
            "trackedSymbols": symbol,
        };
        let mut cursor = self
            .subscribers
            .find(filter, None)
            .await
            .context("failed to query subscribers")?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(Subscriber::from(doc));
        }
        Ok(out)
    }

    async fn active_subscribers(&self) -> anyhow::Result<Vec<Subscriber>> {
        use futures_util::stream::TryStreamExt;
        let filter = doc! {
            "notificationsEnabled": true,
            "trackedSymbols.0": { "$exists": true },
        };
        let mut cursor = self
            .subscribers
            .find(filter, None)
            .await
            .context("failed to query subscribers")?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(Subscriber::from(doc));
        }
        Ok(out)
    }

    async fn delete_liquidations_older_than(&self, instant: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = self
            .liquidations
            .delete_many(doc! { "time": { "$lt": bson_time(instant) } }, None)
            .await
            .context("failed to prune liquidations")?;
        Ok(result.deleted_count)
    }
}

fn bson_time(time: DateTime<Utc>) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_chrono(time)
}
