//! Cache layer: a TTL-keyed byte-blob store with a read-through helper,
//! swappable at construction. An `async_trait`-based collaborator shape,
//! same as every other store/client in this crate.

pub mod memory;
pub mod redis_cache;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;

/// A boxed, type-erased producer future, used so `get_or_fetch` stays
/// object-safe on `dyn Cache` (a bare generic method would not).
pub type FetchFut = Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send>>;

/// TTL-keyed opaque byte-blob store (spec §4.1). Values are caller-serialised;
/// the cache never interprets them.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `None` on miss. Backend failures propagate.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// `ttl_secs == 0` means no expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> anyhow::Result<()>;

    /// Read-through helper: on miss, invoke `producer` exactly once, store
    /// the result (if non-empty) with the given TTL, and return it. No
    /// coalescing of concurrent misses is guaranteed (spec §4.1 permits
    /// but does not require it).
    async fn get_or_fetch(
        &self,
        key: &str,
        ttl_secs: u64,
        producer: Box<dyn FnOnce() -> FetchFut + Send>,
    ) -> anyhow::Result<Vec<u8>> {
        if let Some(cached) = self.get(key).await? {
            return Ok(cached);
        }
        let produced = producer().await?;
        if !produced.is_empty() {
            self.set(key, produced.clone(), ttl_secs).await?;
        }
        Ok(produced)
    }
}

/// Convenience helpers for the common case of JSON-serialisable values,
/// layered on top of the raw byte-blob `Cache` trait.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match cache.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: serde::Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(value)?;
    cache.set(key, bytes, ttl_secs).await
}
