//! Generation strategy selection
//!
//! One strategy is chosen per deck from the mean source quality. Each card
//! also gets a relevant quality: the mean over the sources that card reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::models::{CardType, SourceKind, ValidatedSourceData};

/// Lower bounds (inclusive) of the strategy tiers
pub const API_FIRST_THRESHOLD: f64 = 0.8;
pub const API_ENHANCED_THRESHOLD: f64 = 0.6;
pub const LLM_WITH_CONTEXT_THRESHOLD: f64 = 0.4;

/// How much a card relies on source data versus generative knowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Restructure source data directly
    ApiFirst,
    /// Generate with raw source data in the prompt
    ApiEnhanced,
    /// Generate, telling the model which sources were usable
    LlmWithContext,
    /// Generate from the request alone
    LlmFallback,
}

impl Strategy {
    /// Tier for a mean quality value; boundaries belong to the higher tier
    #[must_use]
    pub fn for_quality(mean_quality: f64) -> Self {
        if mean_quality >= API_FIRST_THRESHOLD {
            Strategy::ApiFirst
        } else if mean_quality >= API_ENHANCED_THRESHOLD {
            Strategy::ApiEnhanced
        } else if mean_quality >= LLM_WITH_CONTEXT_THRESHOLD {
            Strategy::LlmWithContext
        } else {
            Strategy::LlmFallback
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ApiFirst => "apiFirst",
            Strategy::ApiEnhanced => "apiEnhanced",
            Strategy::LlmWithContext => "llmWithContext",
            Strategy::LlmFallback => "llmFallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sources each card type reads
#[must_use]
pub fn card_sources(card_type: CardType) -> &'static [SourceKind] {
    use SourceKind::*;
    match card_type {
        CardType::Overview => &[TravelGuide],
        CardType::Itinerary => &[TravelGuide, Flights, Hotels],
        CardType::Budget => &[Flights, Hotels, Currency],
        CardType::Transport => &[Flights, Trains],
        CardType::Accommodation => &[Hotels],
        CardType::Attractions => &[TravelGuide],
        CardType::Food => &[TravelGuide],
        CardType::Visa => &[Visa],
        CardType::Weather => &[TravelGuide],
        CardType::Tips => &[TravelGuide, Visa, Currency],
    }
}

/// Maps validated source data onto strategies and per-card quality
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector;

impl StrategySelector {
    /// Run-level strategy from the mean overall quality of all sources
    #[must_use]
    pub fn select_strategy(&self, sources: &ValidatedSourceData) -> Strategy {
        let mean = sources.mean_overall();
        let strategy = Strategy::for_quality(mean);
        info!("Mean source quality {:.3} -> strategy {}", mean, strategy);
        strategy
    }

    /// Mean overall quality of the sources `card_type` depends on
    #[must_use]
    pub fn relevant_quality(&self, card_type: CardType, sources: &ValidatedSourceData) -> f64 {
        let kinds = card_sources(card_type);
        if kinds.is_empty() {
            return 0.0;
        }
        kinds.iter().map(|k| sources.overall(*k)).sum::<f64>() / kinds.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QualityDetails, QualityScore, RawSourceRecord, ValidatedSource};
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn sources_with(overall: &[(SourceKind, f64)]) -> ValidatedSourceData {
        let map: BTreeMap<_, _> = overall
            .iter()
            .map(|(kind, q)| {
                let quality = QualityScore::new(*q, *q, *q, *q, QualityDetails::default());
                (
                    *kind,
                    ValidatedSource {
                        record: RawSourceRecord::absent(*kind, "test"),
                        usable: quality.is_usable(),
                        quality,
                    },
                )
            })
            .collect();
        ValidatedSourceData::new(map)
    }

    #[rstest]
    #[case(1.0, Strategy::ApiFirst)]
    #[case(0.8, Strategy::ApiFirst)]
    #[case(0.85, Strategy::ApiFirst)]
    #[case(0.79, Strategy::ApiEnhanced)]
    #[case(0.6, Strategy::ApiEnhanced)]
    #[case(0.59, Strategy::LlmWithContext)]
    #[case(0.4, Strategy::LlmWithContext)]
    #[case(0.39, Strategy::LlmFallback)]
    #[case(0.1, Strategy::LlmFallback)]
    fn test_thresholds(#[case] quality: f64, #[case] expected: Strategy) {
        assert_eq!(Strategy::for_quality(quality), expected);
    }

    #[test]
    fn test_selection_is_monotonic() {
        let mut previous = Strategy::for_quality(0.0);
        for step in 0..=100 {
            let current = Strategy::for_quality(f64::from(step) / 100.0);
            // Enum order runs from strongest to weakest reliance on sources.
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn test_select_uses_mean_across_sources() {
        let sources = sources_with(&[
            (SourceKind::Flights, 0.9),
            (SourceKind::Hotels, 0.8),
            (SourceKind::Visa, 0.2),
        ]);
        assert_eq!(StrategySelector.select_strategy(&sources), Strategy::ApiEnhanced);
    }

    #[test]
    fn test_relevant_quality_for_budget() {
        let sources = sources_with(&[
            (SourceKind::Flights, 0.9),
            (SourceKind::Hotels, 0.6),
            (SourceKind::Currency, 0.3),
            (SourceKind::TravelGuide, 0.1),
        ]);
        let q = StrategySelector.relevant_quality(CardType::Budget, &sources);
        assert!((q - 0.6).abs() < 1e-9);
        let visa = StrategySelector.relevant_quality(CardType::Visa, &sources);
        assert!((visa - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_every_card_reads_at_least_one_source() {
        for card_type in CardType::ALL {
            assert!(!card_sources(card_type).is_empty());
        }
    }
}
