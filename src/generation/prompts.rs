//! Prompt construction for the generated strategies

use serde_json::{Map, Value, json};

use crate::models::{CardType, SourceKind, TravelRequest, ValidatedSourceData};
use crate::strategy::{Strategy, card_sources};

/// System and user prompt for one backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Limits on how much raw source data goes into a prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    /// Characters of serialised JSON per source
    pub max_source_chars: usize,
    /// Elements kept from every array in a source payload
    pub max_source_items: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_source_chars: 3_000,
            max_source_items: 5,
        }
    }
}

/// JSON shape the model is asked to produce for each card type
fn schema_hint(card_type: CardType) -> &'static str {
    match card_type {
        CardType::Overview => {
            r#"{"summary": string, "highlights": [string], "bestTimeToVisit": string, "idealFor": [string]}"#
        }
        CardType::Itinerary => {
            r#"{"days": [{"day": number, "title": string, "activities": [string]}], "totalDays": number, "pace": string}"#
        }
        CardType::Budget => {
            r#"{"budget": {"level": string, "total": number, "perPerson": number, "perDay": number}, "currency": string, "breakdown": {"accommodation": number, "transport": number, "food": number, "activities": number}, "dailyAverage": number, "savingTips": [string]}"#
        }
        CardType::Transport => {
            r#"{"options": [{"mode": string, "carrier": string, "price": number, "currency": string, "duration": string}], "gettingAround": [string], "tips": [string]}"#
        }
        CardType::Accommodation => {
            r#"{"hotels": [{"name": string, "pricePerNight": number, "currency": string, "rating": number, "area": string}], "recommendedAreas": [string], "tips": [string]}"#
        }
        CardType::Attractions => {
            r#"{"attractions": [{"name": string, "category": string, "description": string}], "mustSee": [string], "hiddenGems": [string]}"#
        }
        CardType::Food => {
            r#"{"dishes": [{"name": string, "description": string}], "restaurants": [string], "dietaryNotes": string}"#
        }
        CardType::Visa => {
            r#"{"visaRequired": boolean, "visaType": string, "processingTime": string, "documents": [string], "fee": string}"#
        }
        CardType::Weather => r#"{"climate": string, "bestMonths": [string], "packing": [string]}"#,
        CardType::Tips => r#"{"tips": [string], "etiquette": [string], "safety": [string]}"#,
    }
}

fn system_prompt(card_type: CardType) -> String {
    format!(
        "You are a travel planning assistant writing the \"{card_type}\" section of a trip plan. \
         Reply with exactly one JSON object and nothing else, using this shape:\n{}\n\
         Give concrete, practical advice. Quote prices as plain numbers with a currency code.",
        schema_hint(card_type)
    )
}

/// Build the prompt for `card_type` under `strategy`.
///
/// `ApiFirst` makes no backend call; asking for its prompt yields the
/// `ApiEnhanced` prompt, which is what it falls back to.
#[must_use]
pub fn build_prompt(
    card_type: CardType,
    strategy: Strategy,
    request: &TravelRequest,
    sources: &ValidatedSourceData,
    limits: PromptLimits,
) -> Prompt {
    let mut user = format!("{}\n\n", request.describe());

    match strategy {
        Strategy::ApiFirst | Strategy::ApiEnhanced => {
            user.push_str("Source quality summary:\n");
            user.push_str(&source_summary(sources).to_string());
            user.push_str("\n\nProvider data for this section (may be incomplete or wrong):\n");
            for kind in card_sources(card_type) {
                let Some(raw) = sources.get(*kind).and_then(|s| s.record.raw.as_ref()) else {
                    continue;
                };
                user.push_str(&format!("{kind}: {}\n", bounded_slice(raw, limits)));
            }
            user.push_str("\nPrefer the provider data where it is plausible and fill gaps from general knowledge.");
        }
        Strategy::LlmWithContext => {
            let usable: Vec<&str> = sources.usable_kinds().into_iter().map(SourceKind::as_str).collect();
            if usable.is_empty() {
                user.push_str("No provider data could be verified for this trip.");
            } else {
                user.push_str(&format!(
                    "Verified provider data exists for: {}. Use your general travel knowledge consistent with it.",
                    usable.join(", ")
                ));
            }
        }
        Strategy::LlmFallback => {
            user.push_str("Use your general travel knowledge.");
        }
    }

    user.push_str(&format!("\n\nWrite the {card_type} section for {}.", request.destination.trim()));

    Prompt {
        system: system_prompt(card_type),
        user,
    }
}

/// `{source: {usable, overall}}` for every assessed source
#[must_use]
pub fn source_summary(sources: &ValidatedSourceData) -> Value {
    let summary: Map<String, Value> = sources
        .iter()
        .map(|(kind, source)| {
            (
                kind.as_str().to_string(),
                json!({
                    "usable": source.usable,
                    "overall": (source.quality.overall * 100.0).round() / 100.0,
                }),
            )
        })
        .collect();
    Value::Object(summary)
}

/// Serialised JSON with every array cut to `max_source_items` and the text
/// cut to `max_source_chars`
#[must_use]
pub fn bounded_slice(raw: &Value, limits: PromptLimits) -> String {
    let trimmed = trim_arrays(raw, limits.max_source_items);
    let text = trimmed.to_string();
    if text.chars().count() <= limits.max_source_chars {
        return text;
    }
    let mut cut: String = text.chars().take(limits.max_source_chars).collect();
    cut.push_str("...(truncated)");
    cut
}

fn trim_arrays(value: &Value, max_items: usize) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(max_items)
                .map(|v| trim_arrays(v, max_items))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), trim_arrays(v, max_items)))
                .collect(),
        ),
        other => other.clone(),
    }
}
