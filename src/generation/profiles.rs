//! Per-card generation profiles

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::LlmConfig;
use crate::models::CardType;

/// Model, sampling and limits used for one card type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationProfile {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Hard timeout for one backend call
    #[serde(skip)]
    pub timeout: Duration,
}

/// Immutable card type → profile table
#[derive(Debug, Clone)]
pub struct GenerationProfiles {
    profiles: BTreeMap<CardType, GenerationProfile>,
    default: GenerationProfile,
}

impl GenerationProfiles {
    /// Build the table from LLM settings. Long-form cards use the detailed
    /// model; factual cards run cooler.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let timeout = config.timeout();
        let profile = |model: &str, temperature: f32, max_tokens: u32| GenerationProfile {
            model: model.to_string(),
            temperature,
            max_tokens,
            timeout,
        };
        let fast = config.default_model.as_str();
        let detailed = config.detailed_model.as_str();

        let profiles = CardType::ALL
            .into_iter()
            .map(|card_type| {
                let p = match card_type {
                    CardType::Itinerary => profile(detailed, 0.7, 2_000),
                    CardType::Budget => profile(detailed, 0.3, 1_200),
                    CardType::Overview => profile(fast, 0.6, 800),
                    CardType::Transport => profile(fast, 0.4, 1_000),
                    CardType::Accommodation => profile(fast, 0.5, 1_000),
                    CardType::Attractions => profile(fast, 0.6, 1_200),
                    CardType::Food => profile(fast, 0.7, 1_000),
                    CardType::Visa => profile(fast, 0.2, 800),
                    CardType::Weather => profile(fast, 0.3, 600),
                    CardType::Tips => profile(fast, 0.6, 800),
                };
                (card_type, p)
            })
            .collect();

        Self {
            profiles,
            default: profile(fast, 0.5, 1_000),
        }
    }

    #[must_use]
    pub fn get(&self, card_type: CardType) -> &GenerationProfile {
        self.profiles.get(&card_type).unwrap_or(&self.default)
    }

    /// Same table with every timeout replaced
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        for profile in self.profiles.values_mut() {
            profile.timeout = timeout;
        }
        self.default.timeout = timeout;
        self
    }
}

impl Default for GenerationProfiles {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}
