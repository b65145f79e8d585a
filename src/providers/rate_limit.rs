//! Per-host sliding-window rate limiting with bounded exponential backoff
//!
//! Callers wait cooperatively on the tokio timer; they never spin. Once the
//! configured total wait is used up the caller gets
//! [`TripDeckError::RateLimitExceeded`].
//!
//! HTTP clients attach [`RateLimitMiddleware`] so every request they send,
//! transport retries included, waits on the limiter first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Extensions;
use rand::RngExt;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use reqwest_retry::RetryError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::{Result, TripDeckError};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window for a single host
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per minute
    max_requests_per_minute: u32,
    /// Request timestamps within the current window
    request_times: Vec<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            max_requests_per_minute,
            request_times: Vec::new(),
        }
    }

    /// Check if a request is allowed and record it
    pub fn allow_request(&mut self) -> bool {
        self.cleanup_old_requests();

        if self.request_times.len() >= self.max_requests_per_minute as usize {
            false
        } else {
            self.request_times.push(Instant::now());
            true
        }
    }

    /// Get time until next request is allowed
    pub fn time_until_next_request(&mut self) -> Duration {
        self.cleanup_old_requests();

        if self.request_times.len() < self.max_requests_per_minute as usize {
            return Duration::ZERO;
        }
        match self.request_times.first() {
            Some(oldest) => WINDOW.saturating_sub(oldest.elapsed()),
            // A zero-capacity window never frees up.
            None => WINDOW,
        }
    }

    /// Remove requests older than the window
    fn cleanup_old_requests(&mut self) {
        let now = Instant::now();
        self.request_times
            .retain(|&time| now.duration_since(time) < WINDOW);
    }
}

/// Backoff policy shared by all hosts
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub ceiling: Duration,
    pub max_wait: Duration,
}

impl From<&RateLimitConfig> for Backoff {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            ceiling: Duration::from_millis(config.backoff_ceiling_ms),
            max_wait: Duration::from_secs(config.max_wait_seconds.into()),
        }
    }
}

impl Backoff {
    /// Step `attempt` of the doubling sequence, capped at `ceiling`, with ±10% jitter
    fn step(&self, attempt: u32) -> Duration {
        let doubled = self
            .base
            .saturating_mul(2_u32.saturating_pow(attempt.min(16)))
            .min(self.ceiling);
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        doubled.mul_f64(jitter)
    }
}

/// One [`RateLimiter`] per host, created on first use
#[derive(Debug, Clone)]
pub struct RateLimiterRegistry {
    default_rpm: u32,
    overrides: HashMap<String, u32>,
    limiters: Arc<Mutex<HashMap<String, Arc<Mutex<RateLimiter>>>>>,
    backoff: Backoff,
}

impl RateLimiterRegistry {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            default_rpm: config.requests_per_minute,
            overrides: HashMap::new(),
            limiters: Arc::new(Mutex::new(HashMap::new())),
            backoff: Backoff::from(config),
        }
    }

    /// Give `host` its own per-minute budget
    #[must_use]
    pub fn with_host_limit(mut self, host: &str, requests_per_minute: u32) -> Self {
        self.overrides.insert(host.to_string(), requests_per_minute);
        self
    }

    async fn limiter(&self, host: &str) -> Arc<Mutex<RateLimiter>> {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(host.to_string())
            .or_insert_with(|| {
                let rpm = self.overrides.get(host).copied().unwrap_or(self.default_rpm);
                Arc::new(Mutex::new(RateLimiter::new(rpm)))
            })
            .clone()
    }

    /// Wait until `host` has capacity and record the request.
    ///
    /// Each wait is the shorter of the window's own release time and the
    /// next backoff step. Fails once the accumulated wait would exceed the
    /// configured maximum.
    pub async fn acquire(&self, host: &str) -> Result<()> {
        let limiter = self.limiter(host).await;
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let wait = {
                let mut window = limiter.lock().await;
                if window.allow_request() {
                    if attempt > 0 {
                        debug!(
                            "Rate limit for {} cleared after {:.3}s",
                            host,
                            started.elapsed().as_secs_f64()
                        );
                    }
                    return Ok(());
                }
                window.time_until_next_request()
            };

            let waited = started.elapsed();
            let remaining = self.backoff.max_wait.saturating_sub(waited);
            if remaining.is_zero() {
                warn!(
                    "Rate limit for {} still exhausted after {:.1}s, giving up",
                    host,
                    waited.as_secs_f64()
                );
                return Err(TripDeckError::RateLimitExceeded {
                    host: host.to_string(),
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }

            let sleep_for = wait
                .min(self.backoff.step(attempt))
                .min(remaining)
                .max(Duration::from_millis(1));
            debug!(
                "Rate limit for {} exhausted, backing off {:.3}s (attempt {})",
                host,
                sleep_for.as_secs_f64(),
                attempt + 1
            );
            tokio::time::sleep(sleep_for).await;
            attempt += 1;
        }
    }
}

/// Acquires the per-host limiter before each request passes down the
/// middleware stack. Attach it after any retry middleware so every attempt
/// is limited.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    limiter: RateLimiterRegistry,
    host: String,
}

impl RateLimitMiddleware {
    #[must_use]
    pub fn new(limiter: RateLimiterRegistry, host: impl Into<String>) -> Self {
        Self {
            limiter,
            host: host.into(),
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.limiter
            .acquire(&self.host)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;
        next.run(req, extensions).await
    }
}

/// Map a middleware-stack failure back into a [`TripDeckError`]. Errors the
/// stack raised itself (rate limits) come back unchanged; transport errors
/// go through `other`.
pub(crate) fn from_middleware_error(
    err: reqwest_middleware::Error,
    other: impl FnOnce(String) -> TripDeckError,
) -> TripDeckError {
    let inner = match err {
        reqwest_middleware::Error::Middleware(inner) => inner,
        reqwest_middleware::Error::Reqwest(e) => return other(format!("request failed: {e}")),
    };
    let inner = match inner.downcast::<TripDeckError>() {
        Ok(own) => return own,
        Err(inner) => inner,
    };
    match inner.downcast::<RetryError>() {
        Ok(RetryError::WithRetries { retries, err }) => {
            debug!("Request gave up after {} transport retries", retries);
            from_middleware_error(err, other)
        }
        Ok(RetryError::Error(err)) => from_middleware_error(err, other),
        Err(inner) => other(format!("request failed: {inner}")),
    }
}
