//! Quality measurement on both sides of generation
//!
//! - Assessor: how trustworthy each raw source response is
//! - Scorer: how complete and useful a generated card is

pub mod assessor;
pub mod scorer;

pub use assessor::SourceQualityAssessor;
pub use scorer::{ContentQualityScorer, ESCALATION_COMPLETENESS, needs_escalation};
