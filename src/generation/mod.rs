//! Card content generation
//!
//! - Backend: the text-generation contract and its HTTP client
//! - Profiles: per-card model, sampling and timeout
//! - Prompts, Parse: what goes to the backend and what is accepted back
//! - Api first, Fallback, Budget: content that needs no backend call, and
//!   the currency pass every budget card gets
//! - Generator: the four strategies for one card

pub mod api_first;
pub mod backend;
pub mod budget;
pub mod fallback;
pub mod generator;
pub mod parse;
pub mod profiles;
pub mod prompts;

pub use backend::{HttpTextBackend, TextGenerationBackend};
pub use generator::{CardGenerationRequest, ContentGenerator};
pub use profiles::{GenerationProfile, GenerationProfiles};
pub use prompts::PromptLimits;
