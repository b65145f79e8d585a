//! Source quality scores and the validated source set built once per request

use serde::Serialize;
use std::collections::BTreeMap;

use super::source::{RawSourceRecord, SourceKind};

/// A source is usable when its overall quality reaches this value
pub const USABLE_THRESHOLD: f64 = 0.4;

/// Overall score forced onto absent payloads
pub const ABSENT_OVERALL: f64 = 0.1;

/// Diagnostics collected while scoring a source
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityDetails {
    pub missing_fields: Vec<String>,
    pub inconsistencies: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Four-dimension quality of one source response, each in `[0, 1]`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityScore {
    pub completeness: f64,
    pub accuracy: f64,
    pub relevance: f64,
    pub freshness: f64,
    pub overall: f64,
    pub details: QualityDetails,
}

impl QualityScore {
    /// Build a score; dimensions are clamped to `[0, 1]` and `overall` is
    /// their arithmetic mean.
    #[must_use]
    pub fn new(
        completeness: f64,
        accuracy: f64,
        relevance: f64,
        freshness: f64,
        details: QualityDetails,
    ) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let (completeness, accuracy, relevance, freshness) =
            (clamp(completeness), clamp(accuracy), clamp(relevance), clamp(freshness));
        Self {
            completeness,
            accuracy,
            relevance,
            freshness,
            overall: (completeness + accuracy + relevance + freshness) / 4.0,
            details,
        }
    }

    /// Score for a payload that never arrived. All four dimensions sit at
    /// [`ABSENT_OVERALL`] so the mean invariant still holds.
    #[must_use]
    pub fn absent(reason: &str) -> Self {
        Self::new(
            ABSENT_OVERALL,
            ABSENT_OVERALL,
            ABSENT_OVERALL,
            ABSENT_OVERALL,
            QualityDetails {
                missing_fields: vec!["*".to_string()],
                inconsistencies: vec![format!("no data: {reason}")],
                recommendations: vec!["rely on general knowledge for this source".to_string()],
            },
        )
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.overall >= USABLE_THRESHOLD
    }
}

/// One source after assessment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSource {
    pub record: RawSourceRecord,
    pub quality: QualityScore,
    pub usable: bool,
}

/// Every source of one request with its quality. Built once, never mutated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidatedSourceData {
    sources: BTreeMap<SourceKind, ValidatedSource>,
}

impl ValidatedSourceData {
    #[must_use]
    pub fn new(sources: BTreeMap<SourceKind, ValidatedSource>) -> Self {
        Self { sources }
    }

    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<&ValidatedSource> {
        self.sources.get(&kind)
    }

    /// Overall quality of `kind`; unknown sources count as absent
    #[must_use]
    pub fn overall(&self, kind: SourceKind) -> f64 {
        self.get(kind).map_or(ABSENT_OVERALL, |s| s.quality.overall)
    }

    #[must_use]
    pub fn is_usable(&self, kind: SourceKind) -> bool {
        self.get(kind).is_some_and(|s| s.usable)
    }

    /// Mean overall quality across all assessed sources
    #[must_use]
    pub fn mean_overall(&self) -> f64 {
        if self.sources.is_empty() {
            return ABSENT_OVERALL;
        }
        self.sources.values().map(|s| s.quality.overall).sum::<f64>() / self.sources.len() as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceKind, &ValidatedSource)> {
        self.sources.iter()
    }

    #[must_use]
    pub fn usable_kinds(&self) -> Vec<SourceKind> {
        self.sources
            .iter()
            .filter(|(_, s)| s.usable)
            .map(|(k, _)| *k)
            .collect()
    }

    #[must_use]
    pub fn usability(&self) -> BTreeMap<SourceKind, bool> {
        self.sources.iter().map(|(k, s)| (*k, s.usable)).collect()
    }

    #[must_use]
    pub fn quality_summary(&self) -> BTreeMap<SourceKind, f64> {
        self.sources
            .iter()
            .map(|(k, s)| (*k, s.quality.overall))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_mean_and_clamped() {
        let score = QualityScore::new(1.4, 0.5, -0.2, f64::NAN, QualityDetails::default());
        assert_eq!(score.completeness, 1.0);
        assert_eq!(score.relevance, 0.0);
        assert_eq!(score.freshness, 0.0);
        assert!((score.overall - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_absent_score_is_unusable() {
        let score = QualityScore::absent("timeout");
        assert!(score.overall <= 0.2);
        assert!(!score.is_usable());
        assert!(score.details.inconsistencies[0].contains("timeout"));
    }

    #[test]
    fn test_usable_boundary_is_inclusive() {
        let score = QualityScore::new(0.4, 0.4, 0.4, 0.4, QualityDetails::default());
        assert!(score.is_usable());
    }

    #[test]
    fn test_empty_set_means_absent_quality() {
        let data = ValidatedSourceData::default();
        assert_eq!(data.mean_overall(), ABSENT_OVERALL);
        assert!(!data.is_usable(SourceKind::Flights));
    }
}
