//! End-to-end deck generation against fake providers and backends

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use tripdeck::config::RateLimitConfig;
use tripdeck::providers::RateLimitedProvider;
use tripdeck::{
    BudgetTier, CancellationToken, CardCatalog, CardType, DataSource, DeckAssembler,
    GenerationProfile, RateLimiterRegistry, RawSources, Result, SourceKind, Strategy,
    TextGenerationBackend, TravelDataProvider, TravelRequest, TripDeckConfig, TripDeckError,
};

fn goa() -> TravelRequest {
    TravelRequest::new("Goa", "Mumbai", "5-7", BudgetTier::Comfortable)
}

fn flights() -> (SourceKind, Value) {
    (
        SourceKind::Flights,
        json!({
            "origin": "Mumbai",
            "destination": "Goa",
            "flights": [
                { "airline": "IndiGo", "price": 4800, "currency": "INR", "departure": "07:10" },
                { "airline": "Air India", "price": 5600, "currency": "INR", "departure": "13:25" }
            ]
        }),
    )
}

fn hotels() -> (SourceKind, Value) {
    (
        SourceKind::Hotels,
        json!({
            "destination": "Goa",
            "hotels": [
                { "name": "Sea Breeze", "pricePerNight": 4200, "currency": "INR", "rating": 4.1, "area": "Calangute" },
                { "name": "Palm Grove", "pricePerNight": 6500, "currency": "INR", "rating": 4.6, "area": "Candolim" }
            ]
        }),
    )
}

fn travel_guide() -> (SourceKind, Value) {
    (
        SourceKind::TravelGuide,
        json!({
            "destination": "Goa",
            "overview": "Beaches, Portuguese heritage and a relaxed coastal pace.",
            "attractions": [
                { "name": "Baga Beach", "category": "beach", "rating": 4.4 },
                { "name": "Basilica of Bom Jesus", "category": "heritage", "rating": 4.7 },
                { "name": "Dudhsagar Falls", "category": "nature", "rating": 4.5 }
            ],
            "bestTimeToVisit": "November to February",
            "climate": "Tropical and humid, monsoon from June to September",
            "localTips": ["Rent a scooter to move between beaches"],
            "cuisine": ["Fish curry rice", "Bebinca"]
        }),
    )
}

fn visa() -> (SourceKind, Value) {
    (
        SourceKind::Visa,
        json!({
            "destination": "Goa",
            "visaRequired": false,
            "visaType": "Not required for Indian citizens",
            "processingTime": "None",
            "documents": ["Government photo ID"]
        }),
    )
}

fn trains() -> (SourceKind, Value) {
    (
        SourceKind::Trains,
        json!({
            "origin": "Mumbai",
            "destination": "Goa",
            "trains": [
                { "name": "Konkan Kanya Express", "price": 850, "currency": "INR", "departure": "23:05" }
            ]
        }),
    )
}

fn currency() -> (SourceKind, Value) {
    (
        SourceKind::Currency,
        json!({ "base": "USD", "target": "INR", "rate": 83.2 }),
    )
}

/// Four strong sources with trains and currency missing: mean quality ~0.66
fn partial_sources() -> Vec<(SourceKind, Value)> {
    vec![flights(), hotels(), travel_guide(), visa()]
}

fn full_sources() -> Vec<(SourceKind, Value)> {
    vec![flights(), hotels(), travel_guide(), visa(), trains(), currency()]
}

fn card_type_of(system: &str) -> CardType {
    CardType::ALL
        .into_iter()
        .find(|card_type| system.contains(&format!("\"{card_type}\" section")))
        .unwrap()
}

/// A complete, well-formed reply for `card_type`. Prices are in USD.
fn full_reply(card_type: CardType) -> Value {
    match card_type {
        CardType::Overview => json!({
            "summary": "Goa mixes beaches with Portuguese-era towns.",
            "highlights": ["Baga Beach", "Old Goa churches"],
            "bestTimeToVisit": "November to February",
            "idealFor": ["couples", "beach lovers"]
        }),
        CardType::Itinerary => json!({
            "days": [
                { "day": 1, "title": "North Goa beaches", "activities": ["Baga Beach", "Fort Aguada"] },
                { "day": 2, "title": "Old Goa", "activities": ["Basilica of Bom Jesus"] }
            ],
            "totalDays": 6,
            "pace": "relaxed"
        }),
        CardType::Budget => json!({
            "budget": { "level": "Luxury", "total": 600, "perPerson": 300, "perDay": 100 },
            "currency": "USD",
            "breakdown": { "accommodation": 240, "transport": 150, "food": 120, "activities": 90 },
            "dailyAverage": 100,
            "savingTips": ["Book flights early", "Eat at beach shacks"]
        }),
        CardType::Transport => json!({
            "options": [{ "mode": "flight", "carrier": "IndiGo", "price": 58, "currency": "USD", "duration": "1h 10m" }],
            "gettingAround": ["Rent a scooter", "Use app taxis"],
            "tips": ["Book the morning flight to avoid delays"]
        }),
        CardType::Accommodation => json!({
            "hotels": [{ "name": "Palm Grove", "pricePerNight": 78, "currency": "USD", "rating": 4.6, "area": "Candolim" }],
            "recommendedAreas": ["Candolim", "Palolem"],
            "tips": ["Book beach huts early in December"]
        }),
        CardType::Attractions => json!({
            "attractions": [{ "name": "Dudhsagar Falls", "category": "nature", "description": "Four-tier waterfall" }],
            "mustSee": ["Basilica of Bom Jesus"],
            "hiddenGems": ["Divar Island"]
        }),
        CardType::Food => json!({
            "dishes": [{ "name": "Fish curry rice", "description": "Coconut fish curry" }],
            "restaurants": ["Britto's", "Gunpowder"],
            "dietaryNotes": "Vegetarian thalis are easy to find"
        }),
        CardType::Visa => json!({
            "visaRequired": false,
            "visaType": "None",
            "processingTime": "None",
            "documents": ["Government photo ID"],
            "fee": "0"
        }),
        CardType::Weather => json!({
            "climate": "Tropical",
            "bestMonths": ["November", "December", "January"],
            "packing": ["Sunscreen", "Light cotton clothing"]
        }),
        CardType::Tips => json!({
            "tips": ["Carry cash for beach shacks"],
            "etiquette": ["Dress modestly in churches"],
            "safety": ["Avoid swimming where red flags are up"]
        }),
    }
}

/// Backend answering with `reply(card_type)`, counting calls
struct FakeBackend<F> {
    calls: AtomicUsize,
    reply: F,
}

impl<F> FakeBackend<F>
where
    F: Fn(CardType) -> String + Send + Sync,
{
    fn new(reply: F) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> TextGenerationBackend for FakeBackend<F>
where
    F: Fn(CardType) -> String + Send + Sync,
{
    async fn complete(&self, system: &str, _user: &str, _profile: &GenerationProfile) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.reply)(card_type_of(system)))
    }
}

fn well_behaved() -> Arc<FakeBackend<impl Fn(CardType) -> String + Send + Sync>> {
    FakeBackend::new(|card_type| full_reply(card_type).to_string())
}

/// Provider serving fixed payloads, one host per source category
struct FakeProvider {
    payloads: HashMap<SourceKind, Value>,
    failing: bool,
}

impl FakeProvider {
    fn serving(values: Vec<(SourceKind, Value)>) -> Self {
        Self {
            payloads: values.into_iter().collect(),
            failing: false,
        }
    }

    fn failing() -> Self {
        Self {
            payloads: HashMap::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl TravelDataProvider for FakeProvider {
    async fn fetch(&self, kind: SourceKind, _request: &TravelRequest) -> Result<Value> {
        if self.failing {
            return Err(TripDeckError::source_fetch(kind.as_str(), "connection refused"));
        }
        Ok(self.payloads.get(&kind).cloned().unwrap_or(Value::Null))
    }

    fn host(&self, kind: SourceKind) -> String {
        format!("{kind}.example.com")
    }
}

#[tokio::test]
async fn test_partial_sources_produce_enhanced_deck_in_local_currency() {
    let backend = well_behaved();
    let assembler = DeckAssembler::new(backend.clone(), &TripDeckConfig::default());

    let deck = assembler
        .assemble(goa(), RawSources::from_values(partial_sources()))
        .await
        .unwrap();

    assert_eq!(deck.metadata.strategy, Strategy::ApiEnhanced);
    assert!(deck.metadata.mean_source_quality >= 0.6 && deck.metadata.mean_source_quality < 0.8);
    assert!(!deck.metadata.cancelled);
    assert_eq!(deck.cards.len(), 10);
    assert_eq!(backend.calls(), 10);

    for card in &deck.cards {
        assert_eq!(card.metadata.data_source, DataSource::LlmEnhanced, "{}", card.card_type);
        assert!((card.metadata.confidence - 0.85).abs() < 1e-9);
        assert!(!card.metadata.escalated);
    }

    let budget = deck.card(CardType::Budget).unwrap();
    assert_eq!(budget.content["currency"], "INR");
    assert_eq!(budget.content["budget"]["level"], "Comfortable");
    assert_eq!(budget.content["budget"]["total"].as_f64(), Some(600.0 * 83.0));
}

#[tokio::test]
async fn test_cards_follow_catalog_priority() {
    let assembler = DeckAssembler::new(well_behaved(), &TripDeckConfig::default());
    let deck = assembler
        .assemble(goa(), RawSources::from_values(partial_sources()))
        .await
        .unwrap();

    let order: Vec<CardType> = deck.cards.iter().map(|c| c.card_type).collect();
    assert_eq!(order, CardType::ALL.to_vec());
    assert!(deck.cards.windows(2).all(|w| w[0].priority < w[1].priority));
    assert!(deck.card(CardType::Overview).unwrap().title.contains("Goa"));
}

#[tokio::test]
async fn test_no_sources_reachable_still_yields_every_card() {
    let backend = well_behaved();
    let assembler = DeckAssembler::new(backend.clone(), &TripDeckConfig::default());

    let deck = assembler
        .generate_deck(&FakeProvider::failing(), goa(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(deck.metadata.strategy, Strategy::LlmFallback);
    assert!(deck.metadata.source_usability.values().all(|usable| !usable));
    assert_eq!(deck.cards.len(), 10);
    for card in &deck.cards {
        assert!(matches!(
            card.metadata.data_source,
            DataSource::LlmGenerated | DataSource::Fallback
        ));
    }
    // General-knowledge content is never escalated
    assert_eq!(deck.metadata.escalations, 0);
    assert_eq!(backend.calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_host_only_affects_its_own_source() {
    let mut config = TripDeckConfig::default();
    config.rate_limit = RateLimitConfig {
        requests_per_minute: 60,
        backoff_base_ms: 100,
        backoff_ceiling_ms: 500,
        max_wait_seconds: 1,
    };
    let limiter = RateLimiterRegistry::new(&config.rate_limit).with_host_limit("visa.example.com", 0);
    let provider = RateLimitedProvider::new(FakeProvider::serving(partial_sources()), limiter);

    let assembler = DeckAssembler::new(well_behaved(), &config);
    let deck = assembler
        .generate_deck(&provider, goa(), &CancellationToken::new())
        .await
        .unwrap();

    let usability = &deck.metadata.source_usability;
    assert_eq!(usability.get(&SourceKind::Visa), Some(&false));
    assert_eq!(usability.get(&SourceKind::Hotels), Some(&true));
    assert_eq!(usability.get(&SourceKind::Flights), Some(&true));

    assert_eq!(deck.cards.len(), 10);
    assert!(deck.cards.iter().all(|c| c.metadata.data_source != DataSource::Fallback));
    assert!(!deck.metadata.cancelled);
}

#[tokio::test]
async fn test_restricted_catalog_yields_exactly_its_cards() {
    let catalog = CardCatalog::only(&[CardType::Visa, CardType::Budget, CardType::Weather]);
    let backend = well_behaved();
    let assembler = DeckAssembler::with_catalog(backend.clone(), &TripDeckConfig::default(), catalog);

    let deck = assembler.assemble(goa(), RawSources::new()).await.unwrap();

    let order: Vec<CardType> = deck.cards.iter().map(|c| c.card_type).collect();
    assert_eq!(order, vec![CardType::Budget, CardType::Visa, CardType::Weather]);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_strong_sources_need_no_backend_calls() {
    let backend = well_behaved();
    let assembler = DeckAssembler::new(backend.clone(), &TripDeckConfig::default());

    let deck = assembler
        .assemble(goa(), RawSources::from_values(full_sources()))
        .await
        .unwrap();

    assert_eq!(deck.metadata.strategy, Strategy::ApiFirst);
    assert_eq!(backend.calls(), 0);
    assert_eq!(deck.cards.len(), 10);
    for card in &deck.cards {
        assert_eq!(card.metadata.data_source, DataSource::Api, "{}", card.card_type);
        assert!((card.metadata.confidence - 0.9).abs() < 1e-9);
        assert_eq!(card.metadata.model, "source-data");
    }

    let budget = deck.card(CardType::Budget).unwrap();
    assert_eq!(budget.content["currency"], "INR");
    assert_eq!(budget.content["budget"]["level"], "Comfortable");
}

#[tokio::test]
async fn test_malformed_reply_degrades_one_card() {
    let backend = FakeBackend::new(|card_type| match card_type {
        CardType::Weather => "Sorry, I cannot describe the weather right now.".to_string(),
        other => full_reply(other).to_string(),
    });
    let assembler = DeckAssembler::new(backend, &TripDeckConfig::default());

    let deck = assembler
        .assemble(goa(), RawSources::from_values(partial_sources()))
        .await
        .unwrap();

    assert_eq!(deck.cards.len(), 10);
    let weather = deck.card(CardType::Weather).unwrap();
    assert_eq!(weather.metadata.data_source, DataSource::Fallback);
    assert!((weather.metadata.confidence - 0.4).abs() < 1e-9);
    assert!(weather.metadata.degraded_reason.is_some());
    assert!(weather.content["climate"].is_string());
    for field in CardCatalog::standard().expected_fields(CardType::Weather) {
        assert!(weather.content.get(*field).is_some(), "missing {field}");
    }

    let food = deck.card(CardType::Food).unwrap();
    assert_eq!(food.metadata.data_source, DataSource::LlmEnhanced);
}

#[tokio::test]
async fn test_panicking_card_task_is_contained() {
    let backend = FakeBackend::new(|card_type| {
        if card_type == CardType::Food {
            panic!("backend exploded");
        }
        full_reply(card_type).to_string()
    });
    let assembler = DeckAssembler::new(backend, &TripDeckConfig::default());

    let deck = assembler
        .assemble(goa(), RawSources::from_values(partial_sources()))
        .await
        .unwrap();

    assert_eq!(deck.cards.len(), 10);
    let food = deck.card(CardType::Food).unwrap();
    assert_eq!(food.metadata.data_source, DataSource::Fallback);
    assert!((food.metadata.confidence - 0.4).abs() < 1e-9);
    let reason = food.metadata.degraded_reason.as_deref().unwrap();
    assert!(reason.contains("panicked"));
    assert!(reason.contains("backend exploded"));

    let others = deck.cards.iter().filter(|c| c.card_type != CardType::Food);
    assert!(others.into_iter().all(|c| c.metadata.data_source == DataSource::LlmEnhanced));
}

/// Answers the overview card at once and stalls on every other card
struct StallingBackend;

#[async_trait]
impl TextGenerationBackend for StallingBackend {
    async fn complete(&self, system: &str, _user: &str, _profile: &GenerationProfile) -> Result<String> {
        let card_type = card_type_of(system);
        if card_type != CardType::Overview {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        Ok(full_reply(card_type).to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_returns_partial_deck() {
    let mut config = TripDeckConfig::default();
    config.pipeline.max_concurrent_cards = 10;
    let assembler = DeckAssembler::new(Arc::new(StallingBackend), &config);

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let deck = assembler
        .assemble_with_cancellation(goa(), RawSources::from_values(partial_sources()), &token)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert!(deck.metadata.cancelled);
    assert_eq!(deck.cards.len(), 1);
    assert_eq!(deck.cards[0].card_type, CardType::Overview);
}

#[tokio::test]
async fn test_cancelled_before_start_yields_empty_deck() {
    let backend = well_behaved();
    let assembler = DeckAssembler::new(backend.clone(), &TripDeckConfig::default());
    let token = CancellationToken::new();
    token.cancel();

    let deck = assembler
        .generate_deck(&FakeProvider::serving(full_sources()), goa(), &token)
        .await
        .unwrap();

    assert!(deck.metadata.cancelled);
    assert!(deck.cards.is_empty());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_work() {
    let backend = well_behaved();
    let assembler = DeckAssembler::new(backend.clone(), &TripDeckConfig::default());
    let request = TravelRequest::new("", "Mumbai", "5-7", BudgetTier::Budget);

    let err = assembler
        .generate_deck(&FakeProvider::failing(), request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_deck_serialises_with_wire_names() {
    let assembler = DeckAssembler::new(well_behaved(), &TripDeckConfig::default());
    let deck = assembler
        .assemble(goa(), RawSources::from_values(partial_sources()))
        .await
        .unwrap();

    let value = serde_json::to_value(&deck).unwrap();
    let first = &value["cards"][0];
    assert_eq!(first["type"], "overview");
    assert_eq!(first["metadata"]["dataSource"], "llm_enhanced");
    assert!(value["metadata"]["meanSourceQuality"].is_number());
}
