//! Keyed destination lookup tables
//!
//! Destinations are matched on their normalised name (lowercase, trimmed,
//! text before the first comma). Unknown destinations use the documented
//! defaults: no aliases, unknown country, `USD` as local currency.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Local currency assumed for destinations missing from the table
pub const DEFAULT_CURRENCY: &str = "USD";

struct DestinationInfo {
    country: &'static str,
    currency: &'static str,
    aliases: &'static [&'static str],
}

const DESTINATIONS: &[(&str, DestinationInfo)] = &[
    ("goa", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "panaji", "north goa", "south goa"] }),
    ("mumbai", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "bombay"] }),
    ("delhi", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "new delhi"] }),
    ("new delhi", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "delhi"] }),
    ("bangalore", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "bengaluru"] }),
    ("bengaluru", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "bangalore"] }),
    ("jaipur", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "rajasthan"] }),
    ("kerala", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "kochi", "munnar"] }),
    ("manali", DestinationInfo { country: "india", currency: "INR", aliases: &["india", "himachal pradesh"] }),
    ("india", DestinationInfo { country: "india", currency: "INR", aliases: &["bharat"] }),
    ("dubai", DestinationInfo { country: "uae", currency: "AED", aliases: &["uae", "united arab emirates"] }),
    ("abu dhabi", DestinationInfo { country: "uae", currency: "AED", aliases: &["uae", "united arab emirates"] }),
    ("bangkok", DestinationInfo { country: "thailand", currency: "THB", aliases: &["thailand", "krung thep"] }),
    ("phuket", DestinationInfo { country: "thailand", currency: "THB", aliases: &["thailand"] }),
    ("bali", DestinationInfo { country: "indonesia", currency: "IDR", aliases: &["indonesia", "denpasar", "ubud"] }),
    ("singapore", DestinationInfo { country: "singapore", currency: "SGD", aliases: &["sg"] }),
    ("kathmandu", DestinationInfo { country: "nepal", currency: "NPR", aliases: &["nepal"] }),
    ("colombo", DestinationInfo { country: "sri lanka", currency: "LKR", aliases: &["sri lanka"] }),
    ("maldives", DestinationInfo { country: "maldives", currency: "MVR", aliases: &["male"] }),
    ("tokyo", DestinationInfo { country: "japan", currency: "JPY", aliases: &["japan"] }),
    ("paris", DestinationInfo { country: "france", currency: "EUR", aliases: &["france"] }),
    ("rome", DestinationInfo { country: "italy", currency: "EUR", aliases: &["italy", "roma"] }),
    ("barcelona", DestinationInfo { country: "spain", currency: "EUR", aliases: &["spain", "catalonia"] }),
    ("amsterdam", DestinationInfo { country: "netherlands", currency: "EUR", aliases: &["netherlands", "holland"] }),
    ("london", DestinationInfo { country: "united kingdom", currency: "GBP", aliases: &["uk", "united kingdom", "england"] }),
    ("new york", DestinationInfo { country: "united states", currency: "USD", aliases: &["usa", "nyc", "united states"] }),
    ("sydney", DestinationInfo { country: "australia", currency: "AUD", aliases: &["australia"] }),
];

/// Units of each currency per 1 USD
const USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("INR", 83.0),
    ("AED", 3.67),
    ("THB", 36.0),
    ("IDR", 15_600.0),
    ("SGD", 1.35),
    ("NPR", 133.0),
    ("LKR", 300.0),
    ("MVR", 15.4),
    ("JPY", 150.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("AUD", 1.52),
];

static DESTINATION_TABLE: LazyLock<HashMap<&'static str, &'static DestinationInfo>> =
    LazyLock::new(|| DESTINATIONS.iter().map(|(k, v)| (*k, v)).collect());

static RATE_TABLE: LazyLock<HashMap<&'static str, f64>> =
    LazyLock::new(|| USD_RATES.iter().copied().collect());

/// Lowercase, trim and keep the part before the first comma
#[must_use]
pub fn normalize_place(name: &str) -> String {
    name.split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn info(place: &str) -> Option<&'static DestinationInfo> {
    DESTINATION_TABLE.get(normalize_place(place).as_str()).copied()
}

/// Known aliases of a destination (country, alternate spellings)
#[must_use]
pub fn aliases(place: &str) -> &'static [&'static str] {
    match info(place) {
        Some(i) => i.aliases,
        None => &[],
    }
}

/// Country of a destination, if known
#[must_use]
pub fn country_of(place: &str) -> Option<&'static str> {
    info(place).map(|i| i.country)
}

/// Local currency of a destination, [`DEFAULT_CURRENCY`] when unknown
#[must_use]
pub fn local_currency(place: &str) -> &'static str {
    info(place).map_or(DEFAULT_CURRENCY, |i| i.currency)
}

/// Units of `currency` per 1 USD from the static table
#[must_use]
pub fn usd_rate(currency: &str) -> Option<f64> {
    RATE_TABLE.get(currency.trim().to_uppercase().as_str()).copied()
}

/// Whether two places are known to be in the same country
#[must_use]
pub fn is_domestic(origin: &str, destination: &str) -> bool {
    match (country_of(origin), country_of(destination)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// True when `a` and `b` name the same place through the alias table
#[must_use]
pub fn alias_match(a: &str, b: &str) -> bool {
    let (na, nb) = (normalize_place(a), normalize_place(b));
    aliases(&na).contains(&nb.as_str())
        || aliases(&nb).contains(&na.as_str())
        || matches!((country_of(&na), country_of(&nb)), (Some(ca), Some(cb)) if ca == cb && (ca == na || cb == nb))
}
