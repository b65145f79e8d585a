//! Currency lookup used to normalise prices across currencies

use crate::lookup;
use crate::models::{SourceKind, SourcePayload, ValidatedSourceData};

/// Narrow interface onto a currency-rate service
pub trait CurrencyLookup: Send + Sync {
    /// Units of `to` per one unit of `from`
    fn rate(&self, from: &str, to: &str) -> Option<f64>;

    /// Convert `amount` from one currency into another
    fn convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(amount);
        }
        self.rate(from, to).map(|r| amount * r)
    }
}

/// Rates from the built-in USD pivot table
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRates;

impl CurrencyLookup for StaticRates {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let from_per_usd = lookup::usd_rate(from)?;
        let to_per_usd = lookup::usd_rate(to)?;
        Some(to_per_usd / from_per_usd)
    }
}

/// Prefers the rate reported by the request's currency source, falling back
/// to [`StaticRates`]
#[derive(Debug, Clone, Default)]
pub struct SourceBackedRates {
    live: Option<(String, String, f64)>,
}

impl SourceBackedRates {
    #[must_use]
    pub fn from_sources(sources: &ValidatedSourceData) -> Self {
        let live = sources
            .get(SourceKind::Currency)
            .filter(|s| s.usable)
            .and_then(|s| match &s.record.payload {
                Some(SourcePayload::Currency(c)) => match (&c.base, &c.target, c.rate) {
                    (Some(base), Some(target), Some(rate)) if rate > 0.0 => {
                        Some((base.to_uppercase(), target.to_uppercase(), rate))
                    }
                    _ => None,
                },
                _ => None,
            });
        Self { live }
    }
}

impl CurrencyLookup for SourceBackedRates {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if let Some((base, target, rate)) = &self.live {
            if *base == from && *target == to {
                return Some(*rate);
            }
            if *base == to && *target == from {
                return Some(1.0 / rate);
            }
        }
        StaticRates.rate(&from, &to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_cross_rate() {
        let rate = StaticRates.rate("USD", "INR").unwrap();
        assert!((rate - 83.0).abs() < 1e-9);
        let back = StaticRates.convert(830.0, "INR", "USD").unwrap();
        assert!((back - 10.0).abs() < 1e-9);
        assert!(StaticRates.rate("USD", "XYZ").is_none());
    }

    #[test]
    fn test_same_currency_is_identity() {
        assert_eq!(StaticRates.convert(42.0, "xyz", "XYZ"), Some(42.0));
    }

    #[test]
    fn test_live_rate_preferred() {
        let rates = SourceBackedRates {
            live: Some(("USD".into(), "INR".into(), 80.0)),
        };
        assert_eq!(rates.rate("usd", "inr"), Some(80.0));
        assert_eq!(rates.rate("INR", "USD"), Some(1.0 / 80.0));
        assert!((rates.rate("USD", "EUR").unwrap() - 0.92).abs() < 1e-9);
    }
}
