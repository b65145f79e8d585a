//! Card and deck models produced by the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::source::SourceKind;
use crate::strategy::Strategy;

/// One section of the output deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    Overview,
    Itinerary,
    Budget,
    Transport,
    Accommodation,
    Attractions,
    Food,
    Visa,
    Weather,
    Tips,
}

impl CardType {
    pub const ALL: [CardType; 10] = [
        CardType::Overview,
        CardType::Itinerary,
        CardType::Budget,
        CardType::Transport,
        CardType::Accommodation,
        CardType::Attractions,
        CardType::Food,
        CardType::Visa,
        CardType::Weather,
        CardType::Tips,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Overview => "overview",
            CardType::Itinerary => "itinerary",
            CardType::Budget => "budget",
            CardType::Transport => "transport",
            CardType::Accommodation => "accommodation",
            CardType::Attractions => "attractions",
            CardType::Food => "food",
            CardType::Visa => "visa",
            CardType::Weather => "weather",
            CardType::Tips => "tips",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a card's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Source data restructured without generative rewrite
    Api,
    /// Generated with raw source data in the prompt
    LlmEnhanced,
    /// Generated from general knowledge, optionally told which sources exist
    LlmGenerated,
    /// Deterministic local placeholder
    Fallback,
}

impl DataSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Api => "api",
            DataSource::LlmEnhanced => "llm_enhanced",
            DataSource::LlmGenerated => "llm_generated",
            DataSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic quality of generated content, each dimension in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuality {
    pub completeness: f64,
    pub accuracy: f64,
    pub relevance: f64,
    pub actionability: f64,
}

impl ContentQuality {
    #[must_use]
    pub fn overall(&self) -> f64 {
        (self.completeness + self.accuracy + self.relevance + self.actionability) / 4.0
    }
}

/// Output of one content generation attempt for one card
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCardContent {
    pub card_type: CardType,
    pub content: Value,
    pub confidence: f64,
    pub data_source: DataSource,
    /// Model identifier, `"source-data"` or `"local-fallback"`
    pub model: String,
    #[serde(with = "duration_ms")]
    pub processing_time: Duration,
    pub quality: ContentQuality,
    /// Set when content came from the fallback path
    pub degraded_reason: Option<String>,
}

/// Per-card metadata carried into the deck
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    pub data_source: DataSource,
    pub confidence: f64,
    pub quality_indicators: ContentQuality,
    pub model: String,
    pub processing_time_ms: u64,
    pub escalated: bool,
    pub degraded_reason: Option<String>,
}

/// One card of the deck, ready for rendering
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub title: String,
    pub subtitle: String,
    pub content: Value,
    pub priority: u32,
    pub metadata: CardMetadata,
}

/// Deck-level aggregates
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckMetadata {
    pub strategy: Strategy,
    pub source_usability: BTreeMap<SourceKind, bool>,
    pub source_quality: BTreeMap<SourceKind, f64>,
    pub mean_source_quality: f64,
    pub mean_confidence: f64,
    pub data_source_distribution: BTreeMap<DataSource, usize>,
    pub escalations: usize,
    pub generated_at: DateTime<Utc>,
    pub generation_time_ms: u64,
    /// The caller cancelled; `cards` holds only the tasks that finished
    pub cancelled: bool,
}

/// The complete ordered set of cards for one travel request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelDeck {
    pub id: Uuid,
    pub request: super::request::TravelRequest,
    pub cards: Vec<Card>,
    pub metadata: DeckMetadata,
}

impl TravelDeck {
    #[must_use]
    pub fn card(&self, card_type: CardType) -> Option<&Card> {
        self.cards.iter().find(|c| c.card_type == card_type)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_wire_names() {
        assert_eq!(serde_json::to_value(DataSource::LlmEnhanced).unwrap(), "llm_enhanced");
        assert_eq!(DataSource::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_card_type_wire_names() {
        for card_type in CardType::ALL {
            assert_eq!(serde_json::to_value(card_type).unwrap(), card_type.as_str());
        }
    }
}
