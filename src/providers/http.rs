//! HTTP travel-data gateway client
//!
//! Thin adapter: `GET {base_url}/{source}?origin=..&destination=..` returning
//! the provider JSON untouched. Transient failures are retried by
//! `reqwest-retry`, and every attempt waits on the host's rate limiter; the
//! pipeline decides what a failure means.

use std::time::Instant;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::TravelDataProvider;
use super::rate_limit::{RateLimitMiddleware, RateLimiterRegistry, from_middleware_error};
use crate::config::ProvidersConfig;
use crate::models::{SourceKind, TravelRequest};
use crate::{Result, TripDeckError};

/// Travel-data client for a single gateway host
pub struct HttpTravelDataClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    host: String,
}

impl HttpTravelDataClient {
    /// Create a new client from provider configuration. The rate limiter
    /// sits inside the retry layer so retries are limited too.
    pub fn new(config: &ProvidersConfig, limiter: RateLimiterRegistry) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tripdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TripDeckError::config(format!("Failed to create HTTP client: {e}")))?;

        let host = host_of(&config.base_url);
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(RateLimitMiddleware::new(limiter, host.clone()))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            host,
        })
    }

    fn url(&self, kind: SourceKind, request: &TravelRequest) -> String {
        format!(
            "{}/{}?origin={}&destination={}&duration={}&budget={}",
            self.base_url,
            kind.as_str(),
            urlencoding::encode(&request.origin),
            urlencoding::encode(&request.destination),
            urlencoding::encode(&request.duration),
            request.budget.as_str(),
        )
    }
}

#[async_trait]
impl TravelDataProvider for HttpTravelDataClient {
    #[instrument(name = "fetch_source", skip(self, request), fields(source = %kind))]
    async fn fetch(&self, kind: SourceKind, request: &TravelRequest) -> Result<Value> {
        let started = Instant::now();
        let mut builder = self.client.get(self.url(kind, request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| from_middleware_error(e, |m| TripDeckError::source_fetch(kind.as_str(), m)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} provider answered HTTP {}", kind, status);
            return Err(TripDeckError::source_fetch(
                kind.as_str(),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| TripDeckError::source_fetch(kind.as_str(), format!("invalid JSON: {e}")))?;

        debug!(
            "{} fetched in {:.3}s",
            kind,
            started.elapsed().as_secs_f64()
        );
        Ok(value)
    }

    fn host(&self, _kind: SourceKind) -> String {
        self.host.clone()
    }
}

/// Host part of a URL, or the URL itself when it has none
pub(crate) fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?'])
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Local HTTP stub answering every request with `status`. Returns its base
/// URL and the number of requests it has served.
#[cfg(test)]
pub(crate) async fn serve_status(
    status: &'static str,
) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let served = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            // Read the whole request so closing the socket does not reset it.
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let Ok(n) = socket.read(&mut chunk).await else { break };
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            served.fetch_add(1, Ordering::SeqCst);
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::models::BudgetTier;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://api.example.com/v1/travel"), "api.example.com");
        assert_eq!(host_of("http://localhost:8787"), "localhost:8787");
        assert_eq!(host_of("no-scheme"), "no-scheme");
    }

    #[test]
    fn test_url_is_encoded() {
        let limiter = RateLimiterRegistry::new(&RateLimitConfig::default());
        let client = HttpTravelDataClient::new(&ProvidersConfig::default(), limiter).unwrap();
        let request = TravelRequest::new("New York", "São Paulo", "5-7", BudgetTier::Luxury);
        let url = client.url(SourceKind::Hotels, &request);
        assert!(url.starts_with("http://localhost:8787/travel/hotels?"));
        assert!(url.contains("destination=New%20York"));
        assert!(url.contains("origin=S%C3%A3o%20Paulo"));
        assert!(url.contains("budget=Luxury"));
    }

    #[tokio::test]
    async fn test_transport_retries_wait_on_the_rate_limiter() {
        let (base_url, hits) = serve_status("503 Service Unavailable").await;
        let config = ProvidersConfig {
            base_url: base_url.clone(),
            max_retries: 2,
            ..ProvidersConfig::default()
        };
        let limiter = RateLimiterRegistry::new(&RateLimitConfig {
            requests_per_minute: 60,
            backoff_base_ms: 50,
            backoff_ceiling_ms: 200,
            max_wait_seconds: 1,
        })
        .with_host_limit(&host_of(&base_url), 1);
        let client = HttpTravelDataClient::new(&config, limiter).unwrap();
        let request = TravelRequest::new("Goa", "Mumbai", "5-7", BudgetTier::Comfortable);

        let err = client.fetch(SourceKind::Flights, &request).await.unwrap_err();

        // The first attempt uses the only slot; the retry is refused by the limiter.
        assert!(matches!(err, TripDeckError::RateLimitExceeded { .. }), "{err}");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
