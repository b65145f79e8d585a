//! Text-generation backend contract and its OpenAI-compatible HTTP client

use std::time::Instant;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::profiles::GenerationProfile;
use crate::config::LlmConfig;
use crate::providers::RateLimiterRegistry;
use crate::providers::http::host_of;
use crate::providers::rate_limit::{RateLimitMiddleware, from_middleware_error};
use crate::{Result, TripDeckError};

/// Accepts a system and user prompt and returns raw completion text.
///
/// Replies may be prose, fenced JSON or garbage; callers parse defensively.
#[async_trait]
pub trait TextGenerationBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str, profile: &GenerationProfile) -> Result<String>;
}

#[async_trait]
impl<B: TextGenerationBackend + ?Sized> TextGenerationBackend for std::sync::Arc<B> {
    async fn complete(&self, system: &str, user: &str, profile: &GenerationProfile) -> Result<String> {
        (**self).complete(system, user, profile).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
///
/// One `complete` call sends exactly one HTTP request, after waiting on the
/// rate limiter for the backend host. Failed calls are not retried here.
pub struct HttpTextBackend {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: Option<String>,
    host: String,
}

impl HttpTextBackend {
    /// Create a new backend client. Hard timeouts come from the per-card
    /// profile, not from the HTTP client.
    pub fn new(config: &LlmConfig, limiter: RateLimiterRegistry) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tripdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TripDeckError::config(format!("Failed to create HTTP client: {e}")))?;

        let host = host_of(&config.base_url);
        let client = ClientBuilder::new(http)
            .with(RateLimitMiddleware::new(limiter, host.clone()))
            .build();

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            host,
        })
    }
}

#[async_trait]
impl TextGenerationBackend for HttpTextBackend {
    #[instrument(name = "complete", skip(self, system, user), fields(model = %profile.model, host = %self.host))]
    async fn complete(&self, system: &str, user: &str, profile: &GenerationProfile) -> Result<String> {
        let started = Instant::now();
        let body = ChatRequest {
            model: &profile.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };
        debug!("Chat completion request: {} prompt chars", system.len() + user.len());

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| from_middleware_error(e, TripDeckError::backend))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Generation backend answered HTTP {}", status);
            return Err(TripDeckError::backend(format!("HTTP {}", status.as_u16())));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| TripDeckError::backend(format!("invalid response body: {e}")))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TripDeckError::backend("response contained no completion"))?;

        info!(
            "Completion from {} in {:.3}s ({} chars)",
            profile.model,
            started.elapsed().as_secs_f64(),
            text.len()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            temperature: 0.5,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn test_response_without_choices() {
        let reply: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(reply.choices.is_empty());
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = LlmConfig {
            base_url: "https://llm.example.com/v1/".to_string(),
            ..LlmConfig::default()
        };
        let backend =
            HttpTextBackend::new(&config, RateLimiterRegistry::new(&RateLimitConfig::default()))
                .unwrap();
        assert_eq!(backend.endpoint, "https://llm.example.com/v1/chat/completions");
        assert_eq!(backend.host, "llm.example.com");
    }

    #[tokio::test]
    async fn test_failed_completion_is_one_request() {
        let (base_url, hits) = crate::providers::http::serve_status("503 Service Unavailable").await;
        let config = LlmConfig {
            base_url,
            ..LlmConfig::default()
        };
        let backend =
            HttpTextBackend::new(&config, RateLimiterRegistry::new(&RateLimitConfig::default()))
                .unwrap();
        let profile = GenerationProfile {
            model: "m".to_string(),
            temperature: 0.2,
            max_tokens: 10,
            timeout: std::time::Duration::from_secs(5),
        };

        let err = backend.complete("s", "u", &profile).await.unwrap_err();

        assert!(err.to_string().contains("HTTP 503"), "{err}");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_rate_limit_sends_nothing() {
        let config = LlmConfig {
            base_url: "http://llm.invalid/v1".to_string(),
            ..LlmConfig::default()
        };
        let limiter = RateLimiterRegistry::new(&RateLimitConfig {
            requests_per_minute: 60,
            backoff_base_ms: 50,
            backoff_ceiling_ms: 200,
            max_wait_seconds: 1,
        })
        .with_host_limit("llm.invalid", 0);
        let backend = HttpTextBackend::new(&config, limiter).unwrap();
        let profile = GenerationProfile {
            model: "m".to_string(),
            temperature: 0.2,
            max_tokens: 10,
            timeout: std::time::Duration::from_secs(5),
        };

        let err = backend.complete("s", "u", &profile).await.unwrap_err();
        assert!(matches!(err, TripDeckError::RateLimitExceeded { .. }), "{err}");
    }
}
