//! Static per-card presentation and scoring tables
//!
//! The catalog is built once and handed to the assembler and the content
//! scorer; nothing mutates it afterwards. Restricting the catalog restricts
//! the deck: the assembler generates exactly the card types listed here.

use std::collections::BTreeMap;

use crate::models::{CardType, TravelRequest};

/// Presentation and scoring entry for one card type
#[derive(Debug, Clone)]
pub struct CardSpec {
    /// Title template, `{destination}` is substituted
    pub title: &'static str,
    /// Subtitle template, `{destination}`, `{days}` and `{budget}` are substituted
    pub subtitle: &'static str,
    /// Position in the deck, 1 comes first
    pub priority: u32,
    /// Top-level content fields a complete card carries
    pub expected_fields: &'static [&'static str],
}

/// Immutable table of the card types a deck contains
#[derive(Debug, Clone)]
pub struct CardCatalog {
    specs: BTreeMap<CardType, CardSpec>,
}

impl Default for CardCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl CardCatalog {
    /// All ten card types
    #[must_use]
    pub fn standard() -> Self {
        let specs = CardType::ALL
            .into_iter()
            .map(|card_type| (card_type, standard_spec(card_type)))
            .collect();
        Self { specs }
    }

    /// Standard entries for the given card types only
    #[must_use]
    pub fn only(card_types: &[CardType]) -> Self {
        let specs = card_types
            .iter()
            .map(|card_type| (*card_type, standard_spec(*card_type)))
            .collect();
        Self { specs }
    }

    /// Card types in priority order
    #[must_use]
    pub fn card_types(&self) -> Vec<CardType> {
        let mut types: Vec<_> = self.specs.keys().copied().collect();
        types.sort_by_key(|t| self.priority(*t));
        types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    #[must_use]
    pub fn get(&self, card_type: CardType) -> Option<&CardSpec> {
        self.specs.get(&card_type)
    }

    /// Priority of `card_type`; types missing from the catalog sort last
    #[must_use]
    pub fn priority(&self, card_type: CardType) -> u32 {
        self.get(card_type).map_or(u32::MAX, |s| s.priority)
    }

    #[must_use]
    pub fn expected_fields(&self, card_type: CardType) -> &'static [&'static str] {
        match self.get(card_type) {
            Some(spec) => spec.expected_fields,
            None => &[],
        }
    }

    #[must_use]
    pub fn title(&self, card_type: CardType, request: &TravelRequest) -> String {
        let template = self.get(card_type).map_or("{destination}", |s| s.title);
        render(template, request)
    }

    #[must_use]
    pub fn subtitle(&self, card_type: CardType, request: &TravelRequest) -> String {
        let template = self.get(card_type).map_or("", |s| s.subtitle);
        render(template, request)
    }
}

fn render(template: &str, request: &TravelRequest) -> String {
    template
        .replace("{destination}", request.destination.trim())
        .replace("{days}", request.duration.trim())
        .replace("{budget}", request.budget.as_str())
}

fn standard_spec(card_type: CardType) -> CardSpec {
    match card_type {
        CardType::Overview => CardSpec {
            title: "Welcome to {destination}",
            subtitle: "{days} days, {budget} budget",
            priority: 1,
            expected_fields: &["summary", "highlights", "bestTimeToVisit", "idealFor"],
        },
        CardType::Itinerary => CardSpec {
            title: "Your {destination} Itinerary",
            subtitle: "Day-by-day plan for {days} days",
            priority: 2,
            expected_fields: &["days", "totalDays", "pace"],
        },
        CardType::Budget => CardSpec {
            title: "Budget Breakdown",
            subtitle: "{budget} spending in {destination}",
            priority: 3,
            expected_fields: &["budget", "currency", "breakdown", "dailyAverage", "savingTips"],
        },
        CardType::Transport => CardSpec {
            title: "Getting to {destination}",
            subtitle: "Flights, trains and local transport",
            priority: 4,
            expected_fields: &["options", "gettingAround", "tips"],
        },
        CardType::Accommodation => CardSpec {
            title: "Where to Stay",
            subtitle: "Hotels and areas in {destination}",
            priority: 5,
            expected_fields: &["hotels", "recommendedAreas", "tips"],
        },
        CardType::Attractions => CardSpec {
            title: "Top Attractions",
            subtitle: "Must-see places in {destination}",
            priority: 6,
            expected_fields: &["attractions", "mustSee", "hiddenGems"],
        },
        CardType::Food => CardSpec {
            title: "Food & Dining",
            subtitle: "What to eat in {destination}",
            priority: 7,
            expected_fields: &["dishes", "restaurants", "dietaryNotes"],
        },
        CardType::Visa => CardSpec {
            title: "Visa & Entry",
            subtitle: "Entry requirements for {destination}",
            priority: 8,
            expected_fields: &["visaRequired", "visaType", "processingTime", "documents", "fee"],
        },
        CardType::Weather => CardSpec {
            title: "Weather & Packing",
            subtitle: "Climate in {destination}",
            priority: 9,
            expected_fields: &["climate", "bestMonths", "packing"],
        },
        CardType::Tips => CardSpec {
            title: "Local Tips",
            subtitle: "Know before you go",
            priority: 10,
            expected_fields: &["tips", "etiquette", "safety"],
        },
    }
}
