//! Persistent provider response cache
//!
//! Successful provider payloads are stored in a fjall keyspace as postcard
//! entries with an expiry time, keyed by source, places, duration and budget.

use async_trait::async_trait;
use fjall::Keyspace;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;
use tracing::{debug, warn};

use super::TravelDataProvider;
use crate::lookup::normalize_place;
use crate::models::{SourceKind, TravelRequest};
use crate::{Result, TripDeckError};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    /// Provider JSON, kept as text since postcard is not self-describing
    value: String,
    expires_at: u64, // Unix timestamp (seconds)
}

/// Persistent TTL cache of raw provider payloads
#[derive(Clone)]
pub struct SourceCache {
    store: Keyspace,
}

fn cache_err(e: impl std::fmt::Display) -> TripDeckError {
    TripDeckError::cache(e.to_string())
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key).map_err(cache_err)?.map(|v| v.to_vec()))
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(cache_err)?
        .as_secs())
}

impl SourceCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open().map_err(cache_err)?;
        let items = db
            .keyspace("cache", fjall::KeyspaceCreateOptions::default)
            .map_err(cache_err)?;
        Ok(SourceCache { store: items })
    }

    /// Stores a payload with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or_else(|| TripDeckError::cache("TTL overflow"))?
            .duration_since(UNIX_EPOCH)
            .map_err(cache_err)?
            .as_secs();
        let entry = StoredEntry {
            value: serde_json::to_string(value).map_err(cache_err)?,
            expires_at,
        };
        let bytes = postcard::to_stdvec(&entry).map_err(cache_err)?;

        task::spawn_blocking(move || store.insert(key, bytes))
            .await
            .map_err(cache_err)?
            .map_err(cache_err)?;
        Ok(())
    }

    /// Retrieves a payload if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || get_from_store(store, key_bytes))
            .await
            .map_err(cache_err)??;

        let Some(bytes) = maybe_bytes else {
            debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry = postcard::from_bytes(&bytes).map_err(cache_err)?;
        if unix_now()? < entry.expires_at {
            debug!("Key found and still fresh");
            Ok(Some(serde_json::from_str(&entry.value).map_err(cache_err)?))
        } else {
            debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key))
            .await
            .map_err(cache_err)?
            .map_err(cache_err)?;
        Ok(())
    }
}

/// Cache key for one source of one request
#[must_use]
pub fn cache_key(kind: SourceKind, request: &TravelRequest) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        kind.as_str(),
        normalize_place(&request.origin),
        normalize_place(&request.destination),
        request.duration.trim(),
        request.budget.as_str()
    )
}

/// Serves provider payloads from a [`SourceCache`] before asking `inner`.
///
/// Cache failures never fail a fetch; they are logged and the provider is
/// asked directly. Empty or failed fetches are not stored.
pub struct CachedProvider<P> {
    inner: P,
    cache: SourceCache,
    ttl: Duration,
}

impl<P: TravelDataProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: SourceCache, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    /// TTL with ±10% jitter so entries written together expire apart
    fn jittered_ttl(&self) -> Duration {
        let factor: f64 = rand::rng().random_range(0.9..1.1);
        self.ttl.mul_f64(factor)
    }
}

#[async_trait]
impl<P: TravelDataProvider> TravelDataProvider for CachedProvider<P> {
    async fn fetch(&self, kind: SourceKind, request: &TravelRequest) -> Result<Value> {
        let key = cache_key(kind, request);

        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                debug!("{} served from cache", kind);
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for {}: {}", key, e),
        }

        let value = self.inner.fetch(kind, request).await?;
        if !value.is_null() {
            if let Err(e) = self.cache.put(&key, &value, self.jittered_ttl()).await {
                warn!("Cache write failed for {}: {}", key, e);
            }
        }
        Ok(value)
    }

    fn host(&self, kind: SourceKind) -> String {
        self.inner.host(kind)
    }
}
