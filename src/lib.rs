//! `tripdeck` - Adaptive multi-source content generation for travel decks
//!
//! This library fuses unreliable travel-data sources with a text-generation
//! backend into a fixed set of cards describing one journey. It measures how
//! trustworthy each source response is, picks a generation strategy from
//! that, and always returns a complete deck, degraded where it has to be.

pub mod config;
pub mod deck;
pub mod error;
pub mod generation;
pub mod lookup;
pub mod models;
pub mod providers;
pub mod quality;
pub mod strategy;
pub mod telemetry;

// Re-export core types for public API
pub use config::TripDeckConfig;
pub use deck::{CancellationToken, CardCatalog, DeckAssembler};
pub use error::TripDeckError;
pub use generation::{
    CardGenerationRequest, ContentGenerator, GenerationProfile, HttpTextBackend,
    TextGenerationBackend,
};
pub use models::{
    BudgetTier, Card, CardType, DataSource, GeneratedCardContent, QualityScore, RawSources,
    SourceKind, TravelDeck, TravelRequest, TravelerComposition, ValidatedSourceData,
};
pub use providers::{
    CachedProvider, HttpTravelDataClient, RateLimiterRegistry, SourceCache, TravelDataProvider,
    fetch_sources,
};
pub use quality::{ContentQualityScorer, SourceQualityAssessor};
pub use strategy::{Strategy, StrategySelector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TripDeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
