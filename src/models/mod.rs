//! Data models for the deck pipeline
//!
//! - Request: the immutable travel request and its validation
//! - Source: source categories and typed provider payloads
//! - Validated: quality scores and the per-request validated source set
//! - Card: generated content, cards and the assembled deck

pub mod card;
pub mod request;
pub mod source;
pub mod validated;

pub use card::{
    Card, CardMetadata, CardType, ContentQuality, DataSource, DeckMetadata,
    GeneratedCardContent, TravelDeck,
};
pub use request::{BudgetTier, TravelRequest, TravelerComposition, TripDuration};
pub use source::{RawSourceRecord, RawSources, SourceKind, SourcePayload};
pub use validated::{
    QualityDetails, QualityScore, USABLE_THRESHOLD, ValidatedSource, ValidatedSourceData,
};
