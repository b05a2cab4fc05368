//! Reconciled multi-provider values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::location::Location;
use crate::types::{DataKind, MetricKind, TimeBucket};

/// How much the contributing providers agreed on a metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Two or more readings, none flagged as outliers
    High,
    /// Outliers were flagged, or only one provider reported
    Reduced,
    /// No two readings agreed within tolerance
    Low,
}

/// Reconciled value of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConsensus {
    pub value: f64,
    /// Agreement score in 0..1
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub contributors: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outliers: Vec<String>,
}

/// Authoritative value for a location and time bucket.
///
/// Never mutated; a newer consensus for the same key supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub location: Location,
    pub kind: DataKind,
    pub bucket: TimeBucket,
    pub metrics: BTreeMap<MetricKind, MetricConsensus>,
    pub providers: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl Consensus {
    pub fn metric(&self, metric: MetricKind) -> Option<&MetricConsensus> {
        self.metrics.get(&metric)
    }

    pub fn value(&self, metric: MetricKind) -> Option<f64> {
        self.metrics.get(&metric).map(|m| m.value)
    }

    /// Mean of the per-metric confidence scores
    pub fn overall_confidence(&self) -> f64 {
        if self.metrics.is_empty() {
            return 0.0;
        }
        self.metrics.values().map(|m| m.confidence).sum::<f64>() / self.metrics.len() as f64
    }

    pub fn has_low_confidence(&self) -> bool {
        self.metrics
            .values()
            .any(|m| m.level == ConfidenceLevel::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(value: f64, confidence: f64, level: ConfidenceLevel) -> MetricConsensus {
        MetricConsensus {
            value,
            confidence,
            level,
            contributors: 2,
            outliers: vec![],
        }
    }

    #[test]
    fn test_overall_confidence_is_mean() {
        let mut metrics = BTreeMap::new();
        metrics.insert(MetricKind::Temperature, metric(20.0, 0.75, ConfidenceLevel::High));
        metrics.insert(MetricKind::Humidity, metric(60.0, 0.25, ConfidenceLevel::Low));
        let consensus = Consensus {
            location: Location::new(0.0, 0.0),
            kind: DataKind::Current,
            bucket: TimeBucket::Live,
            metrics,
            providers: vec!["a".into(), "b".into()],
            computed_at: Utc::now(),
        };
        assert!((consensus.overall_confidence() - 0.5).abs() < 1e-9);
        assert!(consensus.has_low_confidence());
        assert_eq!(consensus.value(MetricKind::Temperature), Some(20.0));
        assert_eq!(consensus.value(MetricKind::WindSpeed), None);
    }
}
