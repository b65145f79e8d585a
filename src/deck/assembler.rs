//! Deck assembly
//!
//! Sources are fetched and assessed once, one strategy is chosen, then one
//! task per catalog card runs concurrently. A card task that panics is
//! replaced by its placeholder card, so a deck is complete unless the caller
//! cancels it.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::catalog::CardCatalog;
use crate::config::TripDeckConfig;
use crate::generation::{
    CardGenerationRequest, ContentGenerator, GenerationProfiles, PromptLimits, TextGenerationBackend,
};
use crate::models::{
    Card, CardMetadata, DataSource, DeckMetadata, GeneratedCardContent, RawSources, TravelDeck,
    TravelRequest, ValidatedSourceData,
};
use crate::providers::{TravelDataProvider, fetch_sources};
use crate::quality::{ContentQualityScorer, SourceQualityAssessor, needs_escalation};
use crate::strategy::{Strategy, StrategySelector};
use crate::Result;

/// Result of one card task
#[derive(Debug)]
struct CardOutcome {
    content: GeneratedCardContent,
    escalated: bool,
}

/// Orchestrates generation of a complete deck for one travel request
pub struct DeckAssembler {
    assessor: SourceQualityAssessor,
    selector: StrategySelector,
    generator: Arc<ContentGenerator>,
    catalog: Arc<CardCatalog>,
    max_concurrent_cards: usize,
    fetch_timeout: Duration,
}

impl DeckAssembler {
    /// Assembler for the standard ten-card deck
    #[must_use]
    pub fn new(backend: Arc<dyn TextGenerationBackend>, config: &TripDeckConfig) -> Self {
        Self::with_catalog(backend, config, CardCatalog::standard())
    }

    /// Assembler producing exactly the card types in `catalog`
    #[must_use]
    pub fn with_catalog(
        backend: Arc<dyn TextGenerationBackend>,
        config: &TripDeckConfig,
        catalog: CardCatalog,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let limits = PromptLimits {
            max_source_chars: config.pipeline.max_source_chars as usize,
            max_source_items: config.pipeline.max_source_items as usize,
        };
        let generator = ContentGenerator::new(
            backend,
            GenerationProfiles::from_config(&config.llm),
            limits,
            ContentQualityScorer::new(catalog.clone()),
        );

        Self {
            assessor: SourceQualityAssessor::default(),
            selector: StrategySelector,
            generator: Arc::new(generator),
            catalog,
            max_concurrent_cards: (config.pipeline.max_concurrent_cards as usize).max(1),
            fetch_timeout: config.providers.timeout(),
        }
    }

    /// Build a deck from already fetched source responses
    pub async fn assemble(&self, request: TravelRequest, raw: RawSources) -> Result<TravelDeck> {
        self.assemble_with_cancellation(request, raw, &CancellationToken::new())
            .await
    }

    /// Fetch all sources from `provider`, then build the deck.
    ///
    /// Cancelling during the fetch skips the remaining fetches and every card.
    #[instrument(name = "generate_deck", skip_all, fields(destination = %request.destination))]
    pub async fn generate_deck<P>(
        &self,
        provider: &P,
        request: TravelRequest,
        cancel: &CancellationToken,
    ) -> Result<TravelDeck>
    where
        P: TravelDataProvider + ?Sized,
    {
        request.validate()?;

        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("Deck generation cancelled while fetching sources");
                RawSources::new()
            }
            raw = fetch_sources(provider, &request, self.fetch_timeout) => raw,
        };

        self.assemble_with_cancellation(request, raw, cancel).await
    }

    /// Build a deck, stopping early when `cancel` fires.
    ///
    /// Fails only for a structurally invalid request. A cancelled deck holds
    /// the cards whose tasks finished and has `metadata.cancelled` set.
    #[instrument(name = "assemble_deck", skip_all, fields(destination = %request.destination))]
    pub async fn assemble_with_cancellation(
        &self,
        request: TravelRequest,
        raw: RawSources,
        cancel: &CancellationToken,
    ) -> Result<TravelDeck> {
        request.validate()?;
        let started = Instant::now();

        let request = Arc::new(request);
        let sources = Arc::new(self.assessor.assess(&raw, &request));
        let strategy = self.selector.select_strategy(&sources);

        let card_requests: Vec<CardGenerationRequest> = self
            .catalog
            .card_types()
            .into_iter()
            .map(|card_type| CardGenerationRequest {
                card_type,
                request: request.clone(),
                sources: sources.clone(),
                strategy,
                relevant_quality: self.selector.relevant_quality(card_type, &sources),
            })
            .collect();

        let (mut outcomes, cancelled) = self.run_card_tasks(&card_requests, cancel).await;

        if !cancelled {
            let finished: BTreeSet<_> = outcomes.iter().map(|o| o.content.card_type).collect();
            for req in card_requests.iter().filter(|r| !finished.contains(&r.card_type)) {
                warn!("{} card task did not return, using placeholder", req.card_type);
                outcomes.push(CardOutcome {
                    content: self.generator.fallback(req, "card task did not return"),
                    escalated: false,
                });
            }
        }

        let deck = self.build_deck(request, &sources, strategy, outcomes, started, cancelled);
        info!(
            "Assembled {} cards for {} with {} in {}ms (mean confidence {:.2}{})",
            deck.cards.len(),
            deck.request.destination,
            strategy,
            deck.metadata.generation_time_ms,
            deck.metadata.mean_confidence,
            if cancelled { ", cancelled" } else { "" }
        );
        Ok(deck)
    }

    /// Run one task per card, bounded by the semaphore. Returns the outcomes
    /// of the tasks that finished and whether the caller cancelled.
    async fn run_card_tasks(
        &self,
        card_requests: &[CardGenerationRequest],
        cancel: &CancellationToken,
    ) -> (Vec<CardOutcome>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_cards));
        let mut tasks = JoinSet::new();

        for req in card_requests.iter().cloned() {
            let generator = self.generator.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.ok()?,
                };
                if cancel.is_cancelled() {
                    return None;
                }

                let outcome = AssertUnwindSafe(generate_card(&generator, &req))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let reason = format!("card task panicked: {}", panic_message(&*panic));
                        warn!("{} {}", req.card_type, reason);
                        CardOutcome {
                            content: generator.fallback(&req, &reason),
                            escalated: false,
                        }
                    });
                Some(outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(card_requests.len());
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Some(outcome))) => outcomes.push(outcome),
                    Some(Ok(None)) => {}
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => warn!("Card task failed: {}", e),
                },
                () = cancel.cancelled(), if !cancelled => {
                    warn!("Deck generation cancelled, aborting {} card tasks", tasks.len());
                    cancelled = true;
                    tasks.abort_all();
                }
            }
        }

        (outcomes, cancelled || cancel.is_cancelled())
    }

    fn build_deck(
        &self,
        request: Arc<TravelRequest>,
        sources: &ValidatedSourceData,
        strategy: Strategy,
        outcomes: Vec<CardOutcome>,
        started: Instant,
        cancelled: bool,
    ) -> TravelDeck {
        let mut cards: Vec<Card> = outcomes
            .into_iter()
            .map(|outcome| self.build_card(&request, outcome))
            .collect();
        cards.sort_by_key(|c| c.priority);

        let mean_confidence = if cards.is_empty() {
            0.0
        } else {
            cards.iter().map(|c| c.metadata.confidence).sum::<f64>() / cards.len() as f64
        };
        let mut distribution: BTreeMap<DataSource, usize> = BTreeMap::new();
        for card in &cards {
            *distribution.entry(card.metadata.data_source).or_default() += 1;
        }
        let escalations = cards.iter().filter(|c| c.metadata.escalated).count();

        let metadata = DeckMetadata {
            strategy,
            source_usability: sources.usability(),
            source_quality: sources.quality_summary(),
            mean_source_quality: sources.mean_overall(),
            mean_confidence,
            data_source_distribution: distribution,
            escalations,
            generated_at: Utc::now(),
            generation_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cancelled,
        };

        TravelDeck {
            id: Uuid::new_v4(),
            request: Arc::unwrap_or_clone(request),
            cards,
            metadata,
        }
    }

    fn build_card(&self, request: &TravelRequest, outcome: CardOutcome) -> Card {
        let CardOutcome { content, escalated } = outcome;
        let card_type = content.card_type;
        Card {
            id: Uuid::new_v4(),
            card_type,
            title: self.catalog.title(card_type, request),
            subtitle: self.catalog.subtitle(card_type, request),
            priority: self.catalog.priority(card_type),
            metadata: CardMetadata {
                data_source: content.data_source,
                confidence: content.confidence,
                quality_indicators: content.quality,
                model: content.model,
                processing_time_ms: u64::try_from(content.processing_time.as_millis())
                    .unwrap_or(u64::MAX),
                escalated,
                degraded_reason: content.degraded_reason,
            },
            content: content.content,
        }
    }
}

/// Generate one card, retrying once with `ApiEnhanced` when the first
/// result is too incomplete. The retry result is kept unless it is less
/// complete than the first, or it is a placeholder standing in for a
/// failed retry while the first attempt was real content.
async fn generate_card(generator: &ContentGenerator, req: &CardGenerationRequest) -> CardOutcome {
    let first = generator.generate(req).await;
    if !needs_escalation(&first.quality, req.strategy, first.data_source) {
        return CardOutcome {
            content: first,
            escalated: false,
        };
    }

    warn!(
        "{} completeness {:.2} too low, retrying once with {}",
        req.card_type,
        first.quality.completeness,
        Strategy::ApiEnhanced
    );
    let retry = generator
        .generate(&req.with_strategy(Strategy::ApiEnhanced))
        .await;
    debug!(
        "{} escalation completeness {:.2} -> {:.2}",
        req.card_type, first.quality.completeness, retry.quality.completeness
    );

    let retry_failed =
        retry.data_source == DataSource::Fallback && first.data_source != DataSource::Fallback;
    let content = if !retry_failed && retry.quality.completeness >= first.quality.completeness {
        retry
    } else {
        if retry_failed {
            warn!("{} escalation failed, keeping the first attempt", req.card_type);
        }
        first
    };
    CardOutcome {
        content,
        escalated: true,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
