//! Travel-data source categories and their typed payloads
//!
//! Provider responses arrive as loosely shaped JSON. They are typed exactly
//! once, here, at the ingestion boundary: every later stage works with
//! [`SourcePayload`] and keeps the raw JSON only for prompt slicing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One external travel-data category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    TravelGuide,
    Flights,
    Hotels,
    Trains,
    Visa,
    Currency,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::TravelGuide,
        SourceKind::Flights,
        SourceKind::Hotels,
        SourceKind::Trains,
        SourceKind::Visa,
        SourceKind::Currency,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::TravelGuide => "travelGuide",
            SourceKind::Flights => "flights",
            SourceKind::Hotels => "hotels",
            SourceKind::Trains => "trains",
            SourceKind::Visa => "visa",
            SourceKind::Currency => "currency",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `1234`, `1234.5`, `"1234"`, `"₹1,234"` and `"-5"`; anything else
/// is `None`. A minus sign counts only before the first digit.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_lenient_number(&s),
        _ => None,
    }))
}

fn parse_lenient_number(text: &str) -> Option<f64> {
    let first_digit = text.find(|c: char| c.is_ascii_digit())?;
    let negative = text[..first_digit].contains('-');
    let digits: String = text[first_digit..]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let magnitude: f64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightOffer {
    pub airline: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub duration: Option<String>,
    pub stops: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightsData {
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[serde(alias = "offers", alias = "results")]
    pub flights: Vec<FlightOffer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotelOffer {
    pub name: Option<String>,
    #[serde(alias = "price", deserialize_with = "lenient_f64")]
    pub price_per_night: Option<f64>,
    pub currency: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotelsData {
    #[serde(alias = "city", alias = "location")]
    pub destination: Option<String>,
    #[serde(alias = "results")]
    pub hotels: Vec<HotelOffer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainOption {
    pub name: Option<String>,
    pub number: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub duration: Option<String>,
    pub class: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainsData {
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[serde(alias = "results")]
    pub trains: Vec<TrainOption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisaData {
    #[serde(alias = "country", alias = "destinationCountry")]
    pub destination: Option<String>,
    #[serde(alias = "visaRequired")]
    pub required: Option<bool>,
    pub visa_type: Option<String>,
    pub processing_time: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fee: Option<f64>,
    pub fee_currency: Option<String>,
    pub documents: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrencyData {
    #[serde(alias = "from")]
    pub base: Option<String>,
    #[serde(alias = "to")]
    pub target: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rate: Option<f64>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attraction {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub entry_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TravelGuideData {
    #[serde(alias = "city", alias = "name")]
    pub destination: Option<String>,
    #[serde(alias = "country")]
    pub region: Option<String>,
    #[serde(alias = "description", alias = "summary")]
    pub overview: Option<String>,
    #[serde(alias = "pointsOfInterest", alias = "pois")]
    pub attractions: Vec<Attraction>,
    pub best_time_to_visit: Option<String>,
    pub climate: Option<String>,
    pub local_tips: Vec<String>,
    pub cuisine: Vec<String>,
}

/// Typed provider payload, one variant per source category
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum SourcePayload {
    TravelGuide(TravelGuideData),
    Flights(FlightsData),
    Hotels(HotelsData),
    Trains(TrainsData),
    Visa(VisaData),
    Currency(CurrencyData),
}

impl SourcePayload {
    /// Type `value` as the payload for `kind`
    pub fn parse(kind: SourceKind, value: &Value) -> serde_json::Result<Self> {
        let value = value.clone();
        Ok(match kind {
            SourceKind::TravelGuide => SourcePayload::TravelGuide(serde_json::from_value(value)?),
            SourceKind::Flights => SourcePayload::Flights(serde_json::from_value(value)?),
            SourceKind::Hotels => SourcePayload::Hotels(serde_json::from_value(value)?),
            SourceKind::Trains => SourcePayload::Trains(serde_json::from_value(value)?),
            SourceKind::Visa => SourcePayload::Visa(serde_json::from_value(value)?),
            SourceKind::Currency => SourcePayload::Currency(serde_json::from_value(value)?),
        })
    }

    /// Destination or region the provider says this data is about
    #[must_use]
    pub fn reported_place(&self) -> Option<&str> {
        match self {
            SourcePayload::TravelGuide(d) => d.destination.as_deref().or(d.region.as_deref()),
            SourcePayload::Flights(d) => d.destination.as_deref(),
            SourcePayload::Hotels(d) => d.destination.as_deref(),
            SourcePayload::Trains(d) => d.destination.as_deref(),
            SourcePayload::Visa(d) => d.destination.as_deref(),
            SourcePayload::Currency(_) => None,
        }
    }
}

/// One provider response as received, plus its typed form when it could be typed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceRecord {
    pub kind: SourceKind,
    /// Untouched provider JSON; `None` when the fetch failed or returned null
    pub raw: Option<Value>,
    #[serde(skip)]
    pub payload: Option<SourcePayload>,
    /// Why `raw` or `payload` is missing
    pub error: Option<String>,
}

impl RawSourceRecord {
    /// Ingest a provider response. `Value::Null` counts as absent.
    #[must_use]
    pub fn ingest(kind: SourceKind, value: Value) -> Self {
        if value.is_null() {
            return Self::absent(kind, "provider returned null");
        }

        match SourcePayload::parse(kind, &value) {
            Ok(payload) => Self {
                kind,
                raw: Some(value),
                payload: Some(payload),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Malformed {} payload: {}", kind, e);
                Self {
                    kind,
                    raw: Some(value),
                    payload: None,
                    error: Some(format!("malformed payload: {e}")),
                }
            }
        }
    }

    /// Record a source that produced nothing usable
    #[must_use]
    pub fn absent<S: Into<String>>(kind: SourceKind, reason: S) -> Self {
        Self {
            kind,
            raw: None,
            payload: None,
            error: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.raw.is_none()
    }
}

/// Raw responses for every source category of one request
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    records: BTreeMap<SourceKind, RawSourceRecord>,
}

impl RawSources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(kind, json)` pairs; missing kinds are recorded as absent
    #[must_use]
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (SourceKind, Value)>,
    {
        let mut sources = Self::new();
        for (kind, value) in values {
            sources.insert(RawSourceRecord::ingest(kind, value));
        }
        sources
    }

    pub fn insert(&mut self, record: RawSourceRecord) {
        self.records.insert(record.kind, record);
    }

    /// Record for `kind`; categories never inserted read as absent
    #[must_use]
    pub fn get(&self, kind: SourceKind) -> RawSourceRecord {
        self.records
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| RawSourceRecord::absent(kind, "source not fetched"))
    }

    /// One record per source category, absent ones included
    pub fn iter_all(&self) -> impl Iterator<Item = RawSourceRecord> + '_ {
        SourceKind::ALL.into_iter().map(|kind| self.get(kind))
    }
}
