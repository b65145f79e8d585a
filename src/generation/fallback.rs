//! Deterministic local placeholder content
//!
//! Used whenever generation fails for a card. The same request always yields
//! the same placeholder, and every placeholder satisfies its card's shape
//! contract and carries all expected fields.

use serde_json::{Value, json};

use crate::lookup;
use crate::models::{CardType, TravelRequest};

/// Share of the total budget per spending category
const BUDGET_SPLIT: [(&str, f64); 4] = [
    ("accommodation", 0.40),
    ("food", 0.25),
    ("transport", 0.20),
    ("activities", 0.15),
];

/// Placeholder content for `card_type`. Budget figures are in USD; the
/// budget normaliser converts them afterwards.
#[must_use]
pub fn placeholder(card_type: CardType, request: &TravelRequest) -> Value {
    let destination = request.destination.trim();
    let origin = request.origin.trim();
    let days = request.typical_days();

    match card_type {
        CardType::Overview => json!({
            "summary": format!(
                "A {days}-day {} trip from {origin} to {destination}.",
                request.budget.as_str().to_lowercase()
            ),
            "highlights": [
                format!("Explore the neighbourhoods of {destination}"),
                format!("Try the local food of {destination}"),
            ],
            "bestTimeToVisit": request
                .season
                .clone()
                .unwrap_or_else(|| format!("Check the local seasons for {destination} before you book")),
            "idealFor": [request.travelers.to_string(), request.style.clone()],
        }),
        CardType::Itinerary => {
            let plan: Vec<Value> = (1..=days)
                .map(|day| {
                    let (title, activity) = match day {
                        1 => ("Arrival".to_string(), format!("Check in and take an easy first walk around {destination}")),
                        d if d == days => ("Departure".to_string(), format!("Pick up souvenirs and head back to {origin}")),
                        d => (format!("Day {d}"), format!("Explore a new part of {destination}")),
                    };
                    json!({ "day": day, "title": title, "activities": [activity] })
                })
                .collect();
            json!({
                "days": plan,
                "totalDays": days,
                "pace": request.style,
            })
        }
        CardType::Budget => {
            let per_person_per_day = request.budget.daily_spend_usd();
            let travelers = f64::from(request.travelers.headcount().max(1));
            let total = (per_person_per_day * travelers * f64::from(days)).round();
            let breakdown: serde_json::Map<String, Value> = BUDGET_SPLIT
                .iter()
                .map(|(category, share)| ((*category).to_string(), json!((total * share).round())))
                .collect();
            json!({
                "budget": {
                    "level": request.budget.as_str(),
                    "total": total,
                    "perPerson": (total / travelers).round(),
                    "perDay": (total / f64::from(days.max(1))).round(),
                },
                "currency": lookup::DEFAULT_CURRENCY,
                "breakdown": breakdown,
                "dailyAverage": (total / f64::from(days.max(1))).round(),
                "savingTips": [
                    "Book transport and stays early",
                    "Keep a daily cash allowance for small purchases",
                ],
            })
        }
        CardType::Transport => json!({
            "options": [{
                "mode": if lookup::is_domestic(origin, destination) { "train or flight" } else { "flight" },
                "from": origin,
                "to": destination,
                "note": "Compare fares a few weeks before departure",
            }],
            "gettingAround": [format!("Use licensed taxis or ride-hailing apps in {destination}")],
            "tips": ["Check baggage allowances before you book"],
        }),
        CardType::Accommodation => json!({
            "hotels": [{
                "name": format!("Central {destination} stay"),
                "area": "City centre",
                "category": request.budget.as_str(),
            }],
            "recommendedAreas": [format!("Central {destination}")],
            "tips": ["Read recent reviews and check the cancellation policy"],
        }),
        CardType::Attractions => json!({
            "attractions": [{
                "name": format!("Historic centre of {destination}"),
                "category": "sightseeing",
                "description": format!("Walk the older quarters of {destination}"),
            }],
            "mustSee": [format!("Historic centre of {destination}")],
            "hiddenGems": ["Ask locals for their favourite viewpoint"],
        }),
        CardType::Food => json!({
            "dishes": [{
                "name": format!("Regional speciality of {destination}"),
                "description": "Try it where locals eat",
            }],
            "restaurants": ["Busy local eateries near the main market"],
            "dietaryNotes": request
                .dietary
                .clone()
                .map_or_else(|| "No dietary preference given".to_string(), |d| format!("Look for {d} options and ask staff about ingredients")),
        }),
        CardType::Visa => {
            let domestic = lookup::is_domestic(origin, destination);
            json!({
                "visaRequired": !domestic,
                "visaType": if domestic { "Not required for domestic travel" } else { "Check with the embassy" },
                "processingTime": if domestic { "None" } else { "Apply at least 4 weeks before travel" },
                "documents": ["Valid passport or national ID"],
                "fee": if domestic { "None" } else { "Varies by nationality" },
            })
        }
        CardType::Weather => json!({
            "climate": format!("Check the forecast for {destination} a week before departure"),
            "bestMonths": [request
                .season
                .clone()
                .unwrap_or_else(|| "Shoulder season, outside peak holidays".to_string())],
            "packing": ["Comfortable walking shoes", "Layers for changing weather"],
        }),
        CardType::Tips => json!({
            "tips": [
                format!("Keep digital copies of your documents while in {destination}"),
                "Carry some local cash",
            ],
            "etiquette": ["Dress respectfully at religious sites"],
            "safety": ["Use registered taxis at night"],
        }),
    }
}
