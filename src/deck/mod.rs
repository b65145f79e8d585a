//! Deck assembly
//!
//! - Catalog: titles, priorities and expected fields per card type
//! - Cancel: cooperative cancellation of a deck run
//! - Assembler: concurrent per-card generation into an ordered deck

pub mod assembler;
pub mod cancel;
pub mod catalog;

pub use assembler::DeckAssembler;
pub use cancel::CancellationToken;
pub use catalog::{CardCatalog, CardSpec};
