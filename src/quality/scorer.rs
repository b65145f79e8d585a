//! Heuristic scoring of generated card content
//!
//! Scores are a pure function of the produced content. Completeness drives
//! the single escalation retry; the other three dimensions are reported as
//! quality indicators on the card.

use std::sync::Arc;

use serde_json::Value;

use crate::deck::CardCatalog;
use crate::lookup;
use crate::models::{CardType, ContentQuality, DataSource, GeneratedCardContent, TravelRequest};
use crate::strategy::Strategy;

/// Cards below this completeness are retried once with a stronger strategy
pub const ESCALATION_COMPLETENESS: f64 = 0.6;

const CURRENCY_SYMBOLS: [char; 6] = ['$', '€', '£', '₹', '¥', '฿'];

const ADVICE_WORDS: &[&str] = &[
    "book", "visit", "try", "carry", "avoid", "plan", "bring", "check", "reserve", "take", "use",
    "explore", "pack", "keep", "consider", "recommended", "recommend", "should", "must", "arrive",
    "apply", "hire", "respect", "dress", "drink", "stay",
];

/// Cards where money figures are part of the content itself
fn is_monetary(card_type: CardType) -> bool {
    matches!(
        card_type,
        CardType::Budget | CardType::Transport | CardType::Accommodation | CardType::Visa
    )
}

#[derive(Debug, Clone)]
pub struct ContentQualityScorer {
    catalog: Arc<CardCatalog>,
}

impl ContentQualityScorer {
    #[must_use]
    pub fn new(catalog: Arc<CardCatalog>) -> Self {
        Self { catalog }
    }

    /// Score generated content on completeness, accuracy, relevance and actionability
    #[must_use]
    pub fn score(&self, generated: &GeneratedCardContent, request: &TravelRequest) -> ContentQuality {
        let card_type = generated.card_type;
        let content = &generated.content;
        let text = ContentText::collect(content);

        ContentQuality {
            completeness: self.completeness(card_type, content),
            accuracy: accuracy(card_type, &text),
            relevance: relevance(&text, request),
            actionability: actionability(&text),
        }
    }

    /// Fraction of the card's expected top-level fields that are present and non-empty
    #[must_use]
    pub fn completeness(&self, card_type: CardType, content: &Value) -> f64 {
        let Some(object) = content.as_object() else {
            return 0.0;
        };
        let expected = self.catalog.expected_fields(card_type);
        if expected.is_empty() {
            return if object.is_empty() { 0.0 } else { 1.0 };
        }

        let present = expected
            .iter()
            .filter(|field| object.get(**field).is_some_and(is_filled))
            .count();
        present as f64 / expected.len() as f64
    }
}

/// Whether a card should get its one escalation retry.
///
/// Content restructured straight from source data is never retried: a
/// stronger strategy than the source itself does not exist.
#[must_use]
pub fn needs_escalation(quality: &ContentQuality, strategy: Strategy, data_source: DataSource) -> bool {
    quality.completeness < ESCALATION_COMPLETENESS
        && strategy != Strategy::LlmFallback
        && data_source != DataSource::Api
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Words and numbers found anywhere in a content tree
#[derive(Debug, Default)]
struct ContentText {
    words: Vec<String>,
    lowered: String,
    has_number: bool,
    has_currency: bool,
}

impl ContentText {
    fn collect(content: &Value) -> Self {
        let mut text = Self::default();
        text.walk(content, None);
        text
    }

    fn walk(&mut self, value: &Value, key: Option<&str>) {
        match value {
            Value::String(s) => {
                if key.is_some_and(|k| k.eq_ignore_ascii_case("currency")) {
                    self.has_currency |= lookup::usd_rate(s).is_some();
                }
                self.push_text(s);
            }
            Value::Number(_) => self.has_number = true,
            Value::Array(items) => {
                for item in items {
                    self.walk(item, key);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    self.walk(v, Some(k));
                }
            }
            Value::Bool(_) | Value::Null => {}
        }
    }

    fn push_text(&mut self, s: &str) {
        if s.chars().any(|c| c.is_ascii_digit()) {
            self.has_number = true;
        }
        if s.chars().any(|c| CURRENCY_SYMBOLS.contains(&c)) {
            self.has_currency = true;
        }

        let lowered = s.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            if word.len() == 3 && lookup::usd_rate(word).is_some() {
                self.has_currency = true;
            }
            self.words.push(word.to_string());
        }
        self.lowered.push_str(&lowered);
        self.lowered.push(' ');
    }
}

fn accuracy(card_type: CardType, text: &ContentText) -> f64 {
    let base = if is_monetary(card_type) { 0.5 } else { 0.7 };
    let step = (1.0 - base) / 2.0;
    let mut score = base;
    if text.has_number {
        score += step;
    }
    if text.has_currency {
        score += step;
    }
    score
}

fn relevance(text: &ContentText, request: &TravelRequest) -> f64 {
    let destination = lookup::normalize_place(&request.destination);
    if destination.is_empty() {
        return 0.4;
    }
    if text.lowered.contains(&destination) {
        1.0
    } else if lookup::aliases(&destination)
        .iter()
        .any(|alias| text.lowered.contains(alias))
    {
        0.8
    } else {
        0.4
    }
}

fn actionability(text: &ContentText) -> f64 {
    let hits = text
        .words
        .iter()
        .filter(|w| ADVICE_WORDS.contains(&w.as_str()))
        .count();
    (0.3 + 0.175 * hits as f64).min(1.0)
}
