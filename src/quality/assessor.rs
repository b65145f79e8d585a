//! Source quality assessment
//!
//! Scores every raw provider response on completeness, accuracy, relevance
//! and freshness. Assessment never fails: absent or malformed payloads get
//! low scores and a diagnostic instead of an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::lookup;
use crate::models::source::{
    CurrencyData, FlightsData, HotelsData, TrainsData, TravelGuideData, VisaData,
};
use crate::models::{
    QualityDetails, QualityScore, RawSourceRecord, RawSources, SourceKind, SourcePayload,
    TravelRequest, ValidatedSource, ValidatedSourceData,
};
use crate::providers::currency::{CurrencyLookup, StaticRates};

/// Average one-way fare band in USD for flights inside one country
const DOMESTIC_FARE_USD: (f64, f64) = (20.0, 600.0);
/// Average one-way fare band in USD for international flights
const INTERNATIONAL_FARE_USD: (f64, f64) = (80.0, 3_000.0);

const RELEVANCE_EXACT: f64 = 1.0;
const RELEVANCE_SUBSTRING: f64 = 0.8;
const RELEVANCE_ALIAS: f64 = 0.7;
const RELEVANCE_MISMATCH: f64 = 0.3;
/// Used when a provider does not report which place its data is about
const RELEVANCE_UNREPORTED: f64 = 0.5;

/// Accuracy for values that cannot be checked either way
const ACCURACY_UNVERIFIABLE: f64 = 0.7;
/// Accuracy for a payload that could not be typed at all
const ACCURACY_MALFORMED: f64 = 0.2;

/// Most providers expose no timestamp, so freshness is a fixed per-source prior.
#[must_use]
pub fn freshness_prior(kind: SourceKind) -> f64 {
    match kind {
        SourceKind::TravelGuide => 0.7,
        SourceKind::Flights => 0.9,
        SourceKind::Hotels => 0.85,
        SourceKind::Trains => 0.85,
        SourceKind::Visa => 0.75,
        SourceKind::Currency => 0.95,
    }
}

/// Scores raw source responses for one travel request
#[derive(Clone)]
pub struct SourceQualityAssessor {
    currency: Arc<dyn CurrencyLookup>,
}

impl Default for SourceQualityAssessor {
    fn default() -> Self {
        Self::new(Arc::new(StaticRates))
    }
}

/// Working state while scoring one source
#[derive(Default)]
struct Findings {
    details: QualityDetails,
}

impl Findings {
    fn missing(&mut self, field: &str) {
        if !self.details.missing_fields.iter().any(|f| f == field) {
            self.details.missing_fields.push(field.to_string());
        }
    }

    fn inconsistent(&mut self, kind: SourceKind, message: String) {
        warn!("{} data inconsistency: {}", kind, message);
        self.details.inconsistencies.push(message);
    }

    fn recommend(&mut self, message: &str) {
        self.details.recommendations.push(message.to_string());
    }
}

impl SourceQualityAssessor {
    #[must_use]
    pub fn new(currency: Arc<dyn CurrencyLookup>) -> Self {
        Self { currency }
    }

    /// Assess every source category for `request`
    #[instrument(name = "assess_sources", level = "debug", skip_all, fields(destination = %request.destination))]
    pub fn assess(&self, raw: &RawSources, request: &TravelRequest) -> ValidatedSourceData {
        let sources: BTreeMap<SourceKind, ValidatedSource> = raw
            .iter_all()
            .map(|record| {
                let quality = self.assess_one(&record, request);
                let usable = quality.is_usable();
                debug!(
                    "{}: overall {:.2} (c {:.2} a {:.2} r {:.2} f {:.2}) usable={}",
                    record.kind,
                    quality.overall,
                    quality.completeness,
                    quality.accuracy,
                    quality.relevance,
                    quality.freshness,
                    usable
                );
                (
                    record.kind,
                    ValidatedSource {
                        record,
                        quality,
                        usable,
                    },
                )
            })
            .collect();

        ValidatedSourceData::new(sources)
    }

    /// Score one source response
    #[must_use]
    pub fn assess_one(&self, record: &RawSourceRecord, request: &TravelRequest) -> QualityScore {
        let kind = record.kind;

        if record.is_absent() {
            let reason = record.error.as_deref().unwrap_or("no payload");
            warn!("{} source absent: {}", kind, reason);
            return QualityScore::absent(reason);
        }

        let freshness = freshness_prior(kind);
        let mut findings = Findings::default();

        let Some(payload) = &record.payload else {
            findings.inconsistent(
                kind,
                record
                    .error
                    .clone()
                    .unwrap_or_else(|| "payload could not be read".to_string()),
            );
            findings.recommend("treat this source as unavailable");
            return QualityScore::new(
                0.0,
                ACCURACY_MALFORMED,
                RELEVANCE_MISMATCH,
                freshness,
                findings.details,
            );
        };

        let (completeness, accuracy) = match payload {
            SourcePayload::Flights(d) => self.score_flights(d, request, &mut findings),
            SourcePayload::Hotels(d) => score_hotels(d, &mut findings),
            SourcePayload::Trains(d) => score_trains(d, &mut findings),
            SourcePayload::Visa(d) => score_visa(d, &mut findings),
            SourcePayload::Currency(d) => self.score_currency(d, &mut findings),
            SourcePayload::TravelGuide(d) => score_travel_guide(d, &mut findings),
        };

        let relevance = match payload {
            SourcePayload::Currency(d) => currency_relevance(d, request, &mut findings),
            other => match other.reported_place() {
                Some(place) => place_relevance(place, &request.destination),
                None => {
                    findings.missing("destination");
                    RELEVANCE_UNREPORTED
                }
            },
        };

        if completeness < 0.5 {
            findings.recommend("supplement missing fields from general knowledge");
        }

        QualityScore::new(completeness, accuracy, relevance, freshness, findings.details)
    }

    fn score_flights(
        &self,
        data: &FlightsData,
        request: &TravelRequest,
        findings: &mut Findings,
    ) -> (f64, f64) {
        if data.flights.is_empty() {
            findings.missing("flights");
            return (0.0, ACCURACY_UNVERIFIABLE);
        }

        let completeness = mean(data.flights.iter().map(|f| {
            presence(
                findings,
                &[
                    ("price", f.price.is_some()),
                    ("airline", f.airline.is_some()),
                    ("departure", f.departure.is_some()),
                ],
            )
        }));

        let origin_currency = lookup::local_currency(&request.origin);
        let prices_usd: Vec<f64> = data
            .flights
            .iter()
            .filter_map(|f| {
                let price = f.price?;
                let currency = f.currency.as_deref().unwrap_or(origin_currency);
                self.currency.convert(price, currency, "USD")
            })
            .collect();

        if prices_usd.is_empty() {
            findings.recommend("flight prices could not be verified");
            return (completeness, ACCURACY_UNVERIFIABLE);
        }

        let average = prices_usd.iter().sum::<f64>() / prices_usd.len() as f64;
        let domestic = lookup::is_domestic(&request.origin, &request.destination);
        let (low, high) = if domestic {
            DOMESTIC_FARE_USD
        } else {
            INTERNATIONAL_FARE_USD
        };

        let accuracy = if (low..=high).contains(&average) {
            1.0
        } else {
            findings.inconsistent(
                SourceKind::Flights,
                format!(
                    "average fare ${average:.0} outside {} band ${low:.0}-${high:.0}",
                    if domestic { "domestic" } else { "international" }
                ),
            );
            0.5
        };

        (completeness, accuracy)
    }

    fn score_currency(&self, data: &CurrencyData, findings: &mut Findings) -> (f64, f64) {
        let completeness = presence(
            findings,
            &[
                ("base", data.base.is_some()),
                ("target", data.target.is_some()),
                ("rate", data.rate.is_some()),
            ],
        );

        let accuracy = match (data.rate, &data.base, &data.target) {
            (Some(rate), _, _) if rate <= 0.0 => {
                findings.inconsistent(SourceKind::Currency, format!("non-positive rate {rate}"));
                0.2
            }
            (Some(rate), Some(base), Some(target)) => match self.currency.rate(base, target) {
                Some(reference) if (0.5..=2.0).contains(&(rate / reference)) => 1.0,
                Some(reference) => {
                    findings.inconsistent(
                        SourceKind::Currency,
                        format!("{base}->{target} rate {rate} far from reference {reference:.4}"),
                    );
                    0.4
                }
                None => ACCURACY_UNVERIFIABLE,
            },
            _ => ACCURACY_UNVERIFIABLE,
        };

        (completeness, accuracy)
    }
}

fn score_hotels(data: &HotelsData, findings: &mut Findings) -> (f64, f64) {
    if data.hotels.is_empty() {
        findings.missing("hotels");
        return (0.0, ACCURACY_UNVERIFIABLE);
    }

    let completeness = mean(data.hotels.iter().map(|h| {
        presence(
            findings,
            &[
                ("name", h.name.is_some()),
                ("price", h.price_per_night.is_some()),
                ("rating", h.rating.is_some()),
            ],
        )
    }));

    let mut checked = 0usize;
    let mut valid = 0usize;
    for hotel in &data.hotels {
        if let Some(rating) = hotel.rating {
            checked += 1;
            if (1.0..=5.0).contains(&rating) {
                valid += 1;
            } else {
                findings.inconsistent(
                    SourceKind::Hotels,
                    format!(
                        "rating {rating} for {} outside 1-5",
                        hotel.name.as_deref().unwrap_or("unnamed hotel")
                    ),
                );
            }
        }
        if let Some(price) = hotel.price_per_night {
            checked += 1;
            if price > 0.0 {
                valid += 1;
            } else {
                findings.inconsistent(SourceKind::Hotels, format!("non-positive nightly price {price}"));
            }
        }
    }

    (completeness, checked_accuracy(checked, valid))
}

fn score_trains(data: &TrainsData, findings: &mut Findings) -> (f64, f64) {
    if data.trains.is_empty() {
        findings.missing("trains");
        return (0.0, ACCURACY_UNVERIFIABLE);
    }

    let completeness = mean(data.trains.iter().map(|t| {
        presence(
            findings,
            &[
                ("name", t.name.is_some() || t.number.is_some()),
                ("price", t.price.is_some()),
                ("departure", t.departure.is_some()),
            ],
        )
    }));

    let prices: Vec<f64> = data.trains.iter().filter_map(|t| t.price).collect();
    let valid = prices.iter().filter(|p| **p > 0.0).count();
    if valid < prices.len() {
        findings.inconsistent(
            SourceKind::Trains,
            format!("{} non-positive fares", prices.len() - valid),
        );
    }

    (completeness, checked_accuracy(prices.len(), valid))
}

fn score_visa(data: &VisaData, findings: &mut Findings) -> (f64, f64) {
    let completeness = presence(
        findings,
        &[
            ("required", data.required.is_some()),
            ("visaType", data.visa_type.is_some()),
            ("processingTime", data.processing_time.is_some()),
            ("documents", !data.documents.is_empty()),
        ],
    );

    let accuracy = match data.fee {
        Some(fee) if fee < 0.0 => {
            findings.inconsistent(SourceKind::Visa, format!("negative visa fee {fee}"));
            0.3
        }
        Some(fee) if data.required == Some(false) && fee > 0.0 => {
            findings.inconsistent(
                SourceKind::Visa,
                format!("visa marked not required but fee {fee} listed"),
            );
            0.6
        }
        Some(_) => 1.0,
        None => 0.8,
    };

    (completeness, accuracy)
}

fn score_travel_guide(data: &TravelGuideData, findings: &mut Findings) -> (f64, f64) {
    let completeness = presence(
        findings,
        &[
            ("destination", data.destination.is_some() || data.region.is_some()),
            ("overview", data.overview.is_some()),
            ("attractions", !data.attractions.is_empty()),
            ("bestTimeToVisit", data.best_time_to_visit.is_some()),
        ],
    );

    let ratings: Vec<f64> = data.attractions.iter().filter_map(|a| a.rating).collect();
    let valid = ratings.iter().filter(|r| (0.0..=5.0).contains(*r)).count();
    if valid < ratings.len() {
        findings.inconsistent(
            SourceKind::TravelGuide,
            format!("{} attraction ratings outside 0-5", ratings.len() - valid),
        );
    }

    let accuracy = if ratings.is_empty() {
        0.8
    } else {
        checked_accuracy(ratings.len(), valid)
    };

    (completeness, accuracy)
}

fn currency_relevance(data: &CurrencyData, request: &TravelRequest, findings: &mut Findings) -> f64 {
    let expected = lookup::local_currency(&request.destination);
    match &data.target {
        Some(target) if target.eq_ignore_ascii_case(expected) => RELEVANCE_EXACT,
        Some(target) => {
            findings.inconsistent(
                SourceKind::Currency,
                format!("target currency {target}, destination uses {expected}"),
            );
            RELEVANCE_MISMATCH
        }
        None => RELEVANCE_UNREPORTED,
    }
}

/// Similarity between a provider-reported place and the requested destination
#[must_use]
pub fn place_relevance(reported: &str, requested: &str) -> f64 {
    let reported_n = lookup::normalize_place(reported);
    let requested_n = lookup::normalize_place(requested);

    if reported_n.is_empty() || requested_n.is_empty() {
        return RELEVANCE_UNREPORTED;
    }
    if reported_n == requested_n {
        return RELEVANCE_EXACT;
    }
    // Substring against the full reported text, so "Panaji, Goa" still hits.
    let reported_full = reported.to_lowercase();
    if reported_full.contains(&requested_n) || requested_n.contains(&reported_n) {
        return RELEVANCE_SUBSTRING;
    }
    if lookup::alias_match(&reported_n, &requested_n) {
        return RELEVANCE_ALIAS;
    }
    RELEVANCE_MISMATCH
}

/// Fraction of `fields` present; names of missing ones are recorded
fn presence(findings: &mut Findings, fields: &[(&str, bool)]) -> f64 {
    let present = fields.iter().filter(|(_, ok)| *ok).count();
    for (name, ok) in fields {
        if !ok {
            findings.missing(name);
        }
    }
    present as f64 / fields.len() as f64
}

fn checked_accuracy(checked: usize, valid: usize) -> f64 {
    if checked == 0 {
        ACCURACY_UNVERIFIABLE
    } else {
        0.4 + 0.6 * (valid as f64 / checked as f64)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BudgetTier;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn goa_request() -> TravelRequest {
        TravelRequest::new("Goa", "Mumbai", "5-7", BudgetTier::Comfortable)
    }

    fn assess(kind: SourceKind, value: Value) -> QualityScore {
        SourceQualityAssessor::default()
            .assess_one(&RawSourceRecord::ingest(kind, value), &goa_request())
    }

    #[test]
    fn test_complete_flights_score_high() {
        let score = assess(
            SourceKind::Flights,
            json!({
                "destination": "Goa",
                "flights": [
                    { "airline": "IndiGo", "price": 4800, "currency": "INR", "departure": "07:10" },
                    { "airline": "Vistara", "price": 6100, "currency": "INR", "departure": "18:45" }
                ]
            }),
        );
        assert_eq!(score.completeness, 1.0);
        assert_eq!(score.accuracy, 1.0);
        assert_eq!(score.relevance, 1.0);
        assert!(score.is_usable());
        assert!(score.details.inconsistencies.is_empty());
    }

    #[test]
    fn test_out_of_band_fare_is_penalised_not_rejected() {
        let score = assess(
            SourceKind::Flights,
            json!({
                "destination": "Goa",
                "flights": [{ "airline": "X", "price": 900000, "currency": "INR", "departure": "09:00" }]
            }),
        );
        assert_eq!(score.accuracy, 0.5);
        assert_eq!(score.details.inconsistencies.len(), 1);
        assert!(score.details.inconsistencies[0].contains("domestic"));
        assert!(score.is_usable());
    }

    #[test]
    fn test_hotel_rating_out_of_range() {
        let score = assess(
            SourceKind::Hotels,
            json!({
                "city": "Goa",
                "hotels": [
                    { "name": "Sea Breeze", "pricePerNight": 4500, "rating": 4.2 },
                    { "name": "Odd Inn", "pricePerNight": 3000, "rating": 9.1 }
                ]
            }),
        );
        assert_eq!(score.completeness, 1.0);
        assert!(score.accuracy < 1.0);
        assert!(score.details.inconsistencies[0].contains("Odd Inn"));
    }

    #[test]
    fn test_partial_hotel_fields_reduce_completeness() {
        let score = assess(
            SourceKind::Hotels,
            json!({ "city": "Goa", "hotels": [{ "name": "Sea Breeze" }] }),
        );
        assert!((score.completeness - 1.0 / 3.0).abs() < 1e-9);
        assert!(score.details.missing_fields.contains(&"price".to_string()));
        assert!(score.details.missing_fields.contains(&"rating".to_string()));
    }

    #[test]
    fn test_absent_payload() {
        let score = SourceQualityAssessor::default().assess_one(
            &RawSourceRecord::absent(SourceKind::Visa, "HTTP 503"),
            &goa_request(),
        );
        assert!(!score.is_usable());
        assert!(score.overall <= 0.2);
        assert!(score.details.inconsistencies[0].contains("HTTP 503"));
    }

    #[test]
    fn test_negative_string_fare_is_flagged() {
        let score = assess(
            SourceKind::Trains,
            json!({ "destination": "Goa", "trains": [{ "number": "10103", "price": "-5", "departure": "06:00" }] }),
        );
        assert!((score.accuracy - 0.4).abs() < 1e-9);
        assert!(score.details.inconsistencies[0].contains("non-positive"));
    }

    #[test]
    fn test_malformed_payload_is_unusable() {
        let score = assess(SourceKind::Trains, json!([1, 2, 3]));
        assert_eq!(score.completeness, 0.0);
        assert!(!score.is_usable());
    }

    #[test]
    fn test_currency_target_checked_against_destination() {
        let good = assess(SourceKind::Currency, json!({ "base": "USD", "target": "INR", "rate": 83.1 }));
        assert_eq!(good.relevance, 1.0);
        assert_eq!(good.accuracy, 1.0);

        let wrong = assess(SourceKind::Currency, json!({ "base": "USD", "target": "EUR", "rate": 0.9 }));
        assert_eq!(wrong.relevance, 0.3);
    }

    #[rstest]
    #[case("Goa", "Goa", 1.0)]
    #[case("goa ", "Goa", 1.0)]
    #[case("North Goa Beaches", "Goa", 0.8)]
    #[case("India", "Goa", 0.7)]
    #[case("UAE", "Dubai", 0.7)]
    #[case("Bangkok", "Goa", 0.3)]
    fn test_place_relevance(#[case] reported: &str, #[case] requested: &str, #[case] expected: f64) {
        assert_eq!(place_relevance(reported, requested), expected);
    }

    #[test]
    fn test_overall_always_mean_of_dimensions() {
        let inputs = [
            (SourceKind::TravelGuide, json!({ "destination": "Goa", "overview": "Beaches" })),
            (SourceKind::Visa, json!({ "country": "India", "required": false, "fee": 10 })),
            (SourceKind::Trains, json!({ "trains": [{ "number": "10103", "price": -5 }] })),
            (SourceKind::Flights, json!(null)),
        ];
        for (kind, value) in inputs {
            let s = assess(kind, value);
            let mean = (s.completeness + s.accuracy + s.relevance + s.freshness) / 4.0;
            assert!((s.overall - mean).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&s.overall));
        }
    }

    #[test]
    fn test_assess_covers_every_source() {
        let raw = RawSources::from_values([(SourceKind::Flights, json!({ "flights": [] }))]);
        let validated = SourceQualityAssessor::default().assess(&raw, &goa_request());
        assert_eq!(validated.iter().count(), SourceKind::ALL.len());
        assert!(!validated.is_usable(SourceKind::Visa));
    }
}
