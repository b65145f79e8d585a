//! Currency normalisation of budget card figures
//!
//! Whatever produced a budget card, the deck shows it in the destination's
//! local currency and at the tier the traveller asked for.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::lookup;
use crate::models::TravelRequest;
use crate::providers::CurrencyLookup;

/// Monetary fields converted inside the `budget` object and at top level
const BUDGET_FIGURES: [&str; 4] = ["total", "perPerson", "perDay", "dailyAverage"];

/// Rewrite `content` so that `currency` is the destination's local currency
/// and `budget.level` is the requested tier.
///
/// Figures in an unknown currency are read as USD.
pub fn normalize_budget(content: &mut Value, request: &TravelRequest, rates: &dyn CurrencyLookup) {
    let Some(object) = content.as_object_mut() else {
        return;
    };

    let local = lookup::local_currency(&request.destination);
    let reported = object
        .get("currency")
        .and_then(Value::as_str)
        .map(|c| c.trim().to_uppercase())
        .filter(|c| lookup::usd_rate(c).is_some() || c == local)
        .unwrap_or_else(|| lookup::DEFAULT_CURRENCY.to_string());

    let factor = if reported == local {
        Some(1.0)
    } else {
        rates.rate(&reported, local)
    };

    match factor {
        Some(factor) => {
            if (factor - 1.0).abs() > f64::EPSILON {
                debug!("Converting budget figures {} -> {} at {:.4}", reported, local, factor);
                if let Some(budget) = object.get_mut("budget").and_then(Value::as_object_mut) {
                    scale_fields(budget, &BUDGET_FIGURES, factor);
                }
                if let Some(breakdown) = object.get_mut("breakdown").and_then(Value::as_object_mut) {
                    scale_all(breakdown, factor);
                }
                scale_fields(object, &BUDGET_FIGURES, factor);
            }
            object.insert("currency".to_string(), Value::from(local));
        }
        None => {
            warn!("No rate from {} to {}, keeping budget figures as reported", reported, local);
            object.insert("currency".to_string(), Value::from(reported));
        }
    }

    let budget = object
        .entry("budget")
        .or_insert_with(|| Value::Object(Map::new()));
    if !budget.is_object() {
        *budget = Value::Object(Map::new());
    }
    if let Some(budget) = budget.as_object_mut() {
        budget.insert("level".to_string(), Value::from(request.budget.as_str()));
    }
}

fn scale_fields(object: &mut Map<String, Value>, fields: &[&str], factor: f64) {
    for field in fields {
        if let Some(value) = object.get_mut(*field) {
            scale(value, factor);
        }
    }
}

fn scale_all(object: &mut Map<String, Value>, factor: f64) {
    for value in object.values_mut() {
        scale(value, factor);
    }
}

fn scale(value: &mut Value, factor: f64) {
    if let Some(n) = value.as_f64() {
        *value = Value::from((n * factor).round());
    }
}
