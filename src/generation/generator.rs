//! Per-card content generation
//!
//! [`ContentGenerator::generate`] never fails. Every backend, timeout or
//! parse problem ends in the deterministic placeholder for that card.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::api_first::{SourceView, restructure};
use super::backend::TextGenerationBackend;
use super::budget::normalize_budget;
use super::fallback::placeholder;
use super::parse::parse_card_reply;
use super::profiles::GenerationProfiles;
use super::prompts::{PromptLimits, build_prompt};
use crate::models::{
    CardType, ContentQuality, DataSource, GeneratedCardContent, TravelRequest, ValidatedSourceData,
};
use crate::providers::{CurrencyLookup, SourceBackedRates};
use crate::quality::ContentQualityScorer;
use crate::strategy::Strategy;
use crate::{Result, TripDeckError};

pub const CONFIDENCE_API: f64 = 0.9;
pub const CONFIDENCE_API_ENHANCED: f64 = 0.85;
pub const CONFIDENCE_WITH_CONTEXT: f64 = 0.75;
pub const CONFIDENCE_GENERAL_KNOWLEDGE: f64 = 0.65;
pub const CONFIDENCE_FALLBACK: f64 = 0.4;

/// Model label for content restructured from source data
pub const MODEL_SOURCE_DATA: &str = "source-data";
/// Model label for local placeholders
pub const MODEL_FALLBACK: &str = "local-fallback";

/// Everything needed to generate one card
#[derive(Debug, Clone)]
pub struct CardGenerationRequest {
    pub card_type: CardType,
    pub request: Arc<TravelRequest>,
    pub sources: Arc<ValidatedSourceData>,
    pub strategy: Strategy,
    /// Mean quality of the sources this card reads
    pub relevant_quality: f64,
}

impl CardGenerationRequest {
    /// Same card under a different strategy
    #[must_use]
    pub fn with_strategy(&self, strategy: Strategy) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }
}

/// Drives one strategy for one card against the text-generation backend
pub struct ContentGenerator {
    backend: Arc<dyn TextGenerationBackend>,
    profiles: GenerationProfiles,
    limits: PromptLimits,
    scorer: ContentQualityScorer,
}

impl ContentGenerator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn TextGenerationBackend>,
        profiles: GenerationProfiles,
        limits: PromptLimits,
        scorer: ContentQualityScorer,
    ) -> Self {
        Self {
            backend,
            profiles,
            limits,
            scorer,
        }
    }

    /// Generate content for one card. Never fails.
    #[instrument(name = "generate_card", skip_all, fields(card = %req.card_type, strategy = %req.strategy, relevant_quality = req.relevant_quality))]
    pub async fn generate(&self, req: &CardGenerationRequest) -> GeneratedCardContent {
        let started = Instant::now();
        let rates = SourceBackedRates::from_sources(&req.sources);

        let strategy = match req.strategy {
            Strategy::ApiFirst => {
                let view = SourceView::new(&req.sources, &rates, self.limits.max_source_items);
                if let Some(content) = restructure(req.card_type, &req.request, &view) {
                    debug!("{} restructured from source data", req.card_type);
                    return self.finish(
                        req,
                        content,
                        CONFIDENCE_API,
                        DataSource::Api,
                        MODEL_SOURCE_DATA.to_string(),
                        None,
                        &rates,
                        started.elapsed(),
                    );
                }
                debug!(
                    "No usable source data for {}, generating with source context",
                    req.card_type
                );
                Strategy::ApiEnhanced
            }
            other => other,
        };

        let (confidence, data_source) = match strategy {
            Strategy::ApiFirst | Strategy::ApiEnhanced => {
                (CONFIDENCE_API_ENHANCED, DataSource::LlmEnhanced)
            }
            Strategy::LlmWithContext => (CONFIDENCE_WITH_CONTEXT, DataSource::LlmGenerated),
            Strategy::LlmFallback => (CONFIDENCE_GENERAL_KNOWLEDGE, DataSource::LlmGenerated),
        };
        let profile = self.profiles.get(req.card_type);

        match self.call_backend(req, strategy).await {
            Ok(content) => self.finish(
                req,
                content,
                confidence,
                data_source,
                profile.model.clone(),
                None,
                &rates,
                started.elapsed(),
            ),
            Err(e) => {
                warn!("{} generation degraded to placeholder: {}", req.card_type, e);
                self.finish(
                    req,
                    placeholder(req.card_type, &req.request),
                    CONFIDENCE_FALLBACK,
                    DataSource::Fallback,
                    MODEL_FALLBACK.to_string(),
                    Some(e.to_string()),
                    &rates,
                    started.elapsed(),
                )
            }
        }
    }

    /// One backend call under the profile's hard timeout, parsed and shape-checked
    async fn call_backend(&self, req: &CardGenerationRequest, strategy: Strategy) -> Result<Value> {
        let profile = self.profiles.get(req.card_type);
        let prompt = build_prompt(req.card_type, strategy, &req.request, &req.sources, self.limits);

        let reply = tokio::time::timeout(
            profile.timeout,
            self.backend.complete(&prompt.system, &prompt.user, profile),
        )
        .await
        .map_err(|_| {
            TripDeckError::timeout(
                format!("{} generation", req.card_type),
                profile.timeout.as_secs_f64(),
            )
        })??;

        parse_card_reply(req.card_type, &reply)
    }

    /// Placeholder content for a card whose generation could not run at all
    #[must_use]
    pub fn fallback(&self, req: &CardGenerationRequest, reason: &str) -> GeneratedCardContent {
        let rates = SourceBackedRates::from_sources(&req.sources);
        self.finish(
            req,
            placeholder(req.card_type, &req.request),
            CONFIDENCE_FALLBACK,
            DataSource::Fallback,
            MODEL_FALLBACK.to_string(),
            Some(reason.to_string()),
            &rates,
            Duration::ZERO,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        req: &CardGenerationRequest,
        mut content: Value,
        confidence: f64,
        data_source: DataSource,
        model: String,
        degraded_reason: Option<String>,
        rates: &dyn CurrencyLookup,
        processing_time: Duration,
    ) -> GeneratedCardContent {
        if req.card_type == CardType::Budget {
            normalize_budget(&mut content, &req.request, rates);
        }

        let mut generated = GeneratedCardContent {
            card_type: req.card_type,
            content,
            confidence,
            data_source,
            model,
            processing_time,
            quality: ContentQuality::default(),
            degraded_reason,
        };
        generated.quality = self.scorer.score(&generated, &req.request);
        generated
    }
}
