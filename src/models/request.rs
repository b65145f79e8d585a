//! Travel request model, validated before any pipeline work starts

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, TripDeckError};

/// Budget tier chosen by the traveller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetTier {
    #[serde(alias = "budget", alias = "Budget-friendly")]
    Budget,
    #[serde(alias = "comfortable", alias = "Moderate")]
    Comfortable,
    #[serde(alias = "luxury", alias = "Premium")]
    Luxury,
}

impl BudgetTier {
    /// Typical all-in spend per traveller per day, in USD
    #[must_use]
    pub fn daily_spend_usd(self) -> f64 {
        match self {
            BudgetTier::Budget => 45.0,
            BudgetTier::Comfortable => 120.0,
            BudgetTier::Luxury => 350.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetTier::Budget => "Budget",
            BudgetTier::Comfortable => "Comfortable",
            BudgetTier::Luxury => "Luxury",
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is travelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TravelerComposition {
    Solo,
    Couple,
    Family { adults: u8, children: u8 },
    Group { size: u8 },
}

impl TravelerComposition {
    /// Number of people on the trip
    #[must_use]
    pub fn headcount(self) -> u32 {
        match self {
            TravelerComposition::Solo => 1,
            TravelerComposition::Couple => 2,
            TravelerComposition::Family { adults, children } => u32::from(adults) + u32::from(children),
            TravelerComposition::Group { size } => u32::from(size),
        }
    }
}

impl fmt::Display for TravelerComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelerComposition::Solo => write!(f, "solo traveller"),
            TravelerComposition::Couple => write!(f, "couple"),
            TravelerComposition::Family { adults, children } => {
                write!(f, "family of {adults} adults and {children} children")
            }
            TravelerComposition::Group { size } => write!(f, "group of {size}"),
        }
    }
}

/// Trip length in days, parsed from labels like `"5"`, `"5-7"` or `"14+"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripDuration {
    pub min_days: u32,
    pub max_days: u32,
}

impl TripDuration {
    /// Longest trip assumed for open-ended labels such as `"14+"`
    const OPEN_ENDED_EXTRA_DAYS: u32 = 7;

    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim().trim_end_matches("days").trim_end_matches("day").trim();
        let invalid = || Self::invalid(label);

        let (min_days, max_days) = if let Some(open) = label.strip_suffix('+') {
            let min = open.trim().parse::<u32>().map_err(|_| invalid())?;
            let max = min
                .checked_add(Self::OPEN_ENDED_EXTRA_DAYS)
                .ok_or_else(invalid)?;
            (min, max)
        } else if let Some((lo, hi)) = label.split_once('-') {
            let lo = lo.trim().parse::<u32>().map_err(|_| invalid())?;
            let hi = hi.trim().parse::<u32>().map_err(|_| invalid())?;
            (lo, hi)
        } else {
            let days = label.parse::<u32>().map_err(|_| invalid())?;
            (days, days)
        };

        if min_days == 0 || max_days < min_days || max_days > 90 {
            return Err(invalid());
        }

        Ok(Self { min_days, max_days })
    }

    fn invalid(label: &str) -> TripDeckError {
        TripDeckError::validation(format!(
            "Duration '{label}' must look like \"5\", \"5-7\" or \"14+\""
        ))
    }

    /// Midpoint of the range, rounded up
    #[must_use]
    pub fn typical_days(&self) -> u32 {
        (self.min_days + self.max_days).div_ceil(2)
    }
}

/// Immutable travel request handed over by the request handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelRequest {
    pub destination: String,
    pub origin: String,
    /// Duration label, e.g. `"5-7"`
    pub duration: String,
    pub budget: BudgetTier,
    pub travelers: TravelerComposition,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub dietary: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
}

fn default_style() -> String {
    "balanced".to_string()
}

impl TravelRequest {
    /// Minimal request used by tests and callers that only know the essentials
    #[must_use]
    pub fn new(destination: &str, origin: &str, duration: &str, budget: BudgetTier) -> Self {
        Self {
            destination: destination.to_string(),
            origin: origin.to_string(),
            duration: duration.to_string(),
            budget,
            travelers: TravelerComposition::Couple,
            style: default_style(),
            dietary: None,
            season: None,
            motivation: None,
        }
    }

    /// Reject structurally invalid requests. This is the only fatal check in
    /// the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(TripDeckError::validation("Destination cannot be empty"));
        }
        if self.origin.trim().is_empty() {
            return Err(TripDeckError::validation("Origin cannot be empty"));
        }
        self.trip_duration()?;
        if self.travelers.headcount() == 0 {
            return Err(TripDeckError::validation(
                "At least one traveller is required",
            ));
        }
        Ok(())
    }

    pub fn trip_duration(&self) -> Result<TripDuration> {
        TripDuration::parse(&self.duration)
    }

    /// Typical trip length; falls back to a week for unparseable labels
    #[must_use]
    pub fn typical_days(&self) -> u32 {
        self.trip_duration().map(|d| d.typical_days()).unwrap_or(7)
    }

    /// One-paragraph description used inside generation prompts
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!(
            "Trip from {} to {} for {} days, {} budget, {}, {} travel style.",
            self.origin, self.destination, self.duration, self.budget, self.travelers, self.style
        );
        if let Some(dietary) = &self.dietary {
            text.push_str(&format!(" Dietary preference: {dietary}."));
        }
        if let Some(season) = &self.season {
            text.push_str(&format!(" Travelling in {season}."));
        }
        if let Some(motivation) = &self.motivation {
            text.push_str(&format!(" Motivation: {motivation}."));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5", 5, 5)]
    #[case("5-7", 5, 7)]
    #[case(" 3 - 4 days", 3, 4)]
    #[case("14+", 14, 21)]
    fn test_duration_parsing(#[case] label: &str, #[case] min: u32, #[case] max: u32) {
        let duration = TripDuration::parse(label).unwrap();
        assert_eq!(duration.min_days, min);
        assert_eq!(duration.max_days, max);
    }

    #[rstest]
    #[case("")]
    #[case("a week")]
    #[case("7-5")]
    #[case("0")]
    #[case("4294967295+")]
    #[case("4294967295")]
    #[case("90+")]
    fn test_duration_rejects_garbage(#[case] label: &str) {
        assert!(TripDuration::parse(label).is_err());
    }

    #[test]
    fn test_typical_days_rounds_up() {
        assert_eq!(TripDuration::parse("5-7").unwrap().typical_days(), 6);
        assert_eq!(TripDuration::parse("5-6").unwrap().typical_days(), 6);
    }

    #[test]
    fn test_validate_rejects_empty_destination() {
        let request = TravelRequest::new("  ", "Mumbai", "5-7", BudgetTier::Comfortable);
        let err = request.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Destination"));
    }

    #[test]
    fn test_validate_rejects_overflowing_open_ended_duration() {
        let request = TravelRequest::new("Goa", "Mumbai", "4294967295+", BudgetTier::Comfortable);
        let err = request.validate().unwrap_err();
        assert!(matches!(err, TripDeckError::Validation { .. }));
        assert_eq!(request.typical_days(), 7);
    }

    #[test]
    fn test_validate_rejects_empty_group() {
        let mut request = TravelRequest::new("Goa", "Mumbai", "5-7", BudgetTier::Comfortable);
        request.travelers = TravelerComposition::Group { size: 0 };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_camel_case_json() {
        let request: TravelRequest = serde_json::from_value(serde_json::json!({
            "destination": "Goa",
            "origin": "Mumbai",
            "duration": "5-7",
            "budget": "Comfortable",
            "travelers": { "family": { "adults": 2, "children": 1 } },
            "dietary": "vegetarian"
        }))
        .unwrap();
        assert_eq!(request.travelers.headcount(), 3);
        assert_eq!(request.style, "balanced");
        assert!(request.validate().is_ok());
        assert!(request.describe().contains("vegetarian"));
    }
}
