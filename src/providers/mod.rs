//! Travel-data collaborators
//!
//! The pipeline only depends on the [`TravelDataProvider`] contract: one raw
//! JSON document per source category. Every failure mode a provider has
//! (HTTP errors, timeouts, rate limits, garbage) ends up as an absent or
//! malformed [`RawSourceRecord`], never as an error for the deck.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::TripDeckConfig;
use crate::models::{RawSourceRecord, RawSources, SourceKind, TravelRequest};
use crate::{Result, TripDeckError};

pub mod cache;
pub mod currency;
pub mod http;
pub mod rate_limit;

pub use cache::{CachedProvider, SourceCache};
pub use currency::{CurrencyLookup, SourceBackedRates, StaticRates};
pub use http::HttpTravelDataClient;
pub use rate_limit::{RateLimitMiddleware, RateLimiter, RateLimiterRegistry};

/// Source of raw travel data, one JSON document per category
#[async_trait]
pub trait TravelDataProvider: Send + Sync {
    /// Fetch the raw payload for `kind`. `Ok(Value::Null)` means "no data".
    async fn fetch(&self, kind: SourceKind, request: &TravelRequest) -> Result<Value>;

    /// Host this provider talks to for `kind`, used as the rate-limit key
    fn host(&self, kind: SourceKind) -> String {
        kind.as_str().to_string()
    }
}

#[async_trait]
impl<P: TravelDataProvider + ?Sized> TravelDataProvider for Arc<P> {
    async fn fetch(&self, kind: SourceKind, request: &TravelRequest) -> Result<Value> {
        (**self).fetch(kind, request).await
    }

    fn host(&self, kind: SourceKind) -> String {
        (**self).host(kind)
    }
}

/// Waits on the per-host rate limiter before delegating each fetch. For
/// providers that do not limit their own requests; [`HttpTravelDataClient`]
/// limits every HTTP attempt itself.
pub struct RateLimitedProvider<P> {
    inner: P,
    limiter: RateLimiterRegistry,
}

impl<P: TravelDataProvider> RateLimitedProvider<P> {
    pub fn new(inner: P, limiter: RateLimiterRegistry) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<P: TravelDataProvider> TravelDataProvider for RateLimitedProvider<P> {
    async fn fetch(&self, kind: SourceKind, request: &TravelRequest) -> Result<Value> {
        let host = self.inner.host(kind);
        self.limiter.acquire(&host).await?;
        self.inner.fetch(kind, request).await
    }

    fn host(&self, kind: SourceKind) -> String {
        self.inner.host(kind)
    }
}

/// HTTP provider stack from configuration: every request the client sends
/// is rate limited per host, and the client sits behind the persistent
/// cache when it is enabled
pub fn from_config(
    config: &TripDeckConfig,
    limiter: RateLimiterRegistry,
) -> Result<Arc<dyn TravelDataProvider>> {
    let client = HttpTravelDataClient::new(&config.providers, limiter)?;
    if !config.cache.enabled {
        return Ok(Arc::new(client));
    }

    let location = config.cache.resolved_location();
    info!("Caching provider responses in {}", location.display());
    let cache = SourceCache::open(&location)?;
    Ok(Arc::new(CachedProvider::new(client, cache, config.cache.ttl())))
}

/// Fetch every source category concurrently, each under a hard timeout.
///
/// This is the serialisation point of a deck: it completes before any card
/// work begins. Failures are logged and recorded as absent sources.
#[instrument(name = "fetch_sources", skip_all, fields(destination = %request.destination))]
pub async fn fetch_sources<P>(provider: &P, request: &TravelRequest, timeout: Duration) -> RawSources
where
    P: TravelDataProvider + ?Sized,
{
    let started = Instant::now();

    let fetches = SourceKind::ALL.into_iter().map(|kind| async move {
        let outcome = match tokio::time::timeout(timeout, provider.fetch(kind, request)).await {
            Ok(result) => result,
            Err(_) => Err(TripDeckError::timeout(
                format!("{kind} fetch"),
                timeout.as_secs_f64(),
            )),
        };

        match outcome {
            Ok(value) => RawSourceRecord::ingest(kind, value),
            Err(e) => {
                let e = e.into_source_fetch(kind.as_str());
                warn!("{}", e);
                RawSourceRecord::absent(kind, e.to_string())
            }
        }
    });

    let mut sources = RawSources::new();
    for record in join_all(fetches).await {
        sources.insert(record);
    }

    info!(
        "Fetched {} sources in {:.3}s",
        SourceKind::ALL.len(),
        started.elapsed().as_secs_f64()
    );
    sources
}
