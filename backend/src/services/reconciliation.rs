//! Reconciliation of provider readings into a consensus
//!
//! Each metric is reconciled independently with two-pass robust averaging:
//! an anchor reading is chosen by agreement, the first pass averages the
//! anchor's support set, readings outside the tolerance band of that mean
//! are flagged as outliers and count at half weight in the agreement ratio
//! of the second pass.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use shared::{ConfidenceLevel, Consensus, MetricConsensus, MetricKind, Reading};

use crate::config::ReconciliationConfig;
use crate::error::{AppError, AppResult};

/// Factor applied to outlier weight in the second pass
const OUTLIER_WEIGHT_FACTOR: f64 = 0.5;

/// Reconciliation engine
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    tolerances: ReconciliationConfig,
}

/// One reading's value for a single metric
#[derive(Debug, Clone, Copy)]
struct Sample<'a> {
    provider_id: &'a str,
    value: f64,
    weight: f64,
    reported_at: DateTime<Utc>,
}

impl ReconciliationEngine {
    pub fn new(tolerances: ReconciliationConfig) -> Self {
        Self { tolerances }
    }

    /// Combine readings for one location and time bucket.
    ///
    /// Fails with `InsufficientData` when there is nothing to reconcile.
    /// Metrics that no reading carries are absent from the result.
    pub fn reconcile(&self, readings: &[Reading]) -> AppResult<Consensus> {
        let first = readings.first().ok_or(AppError::InsufficientData)?;

        if readings
            .iter()
            .any(|r| r.location != first.location || r.bucket != first.bucket || r.kind != first.kind)
        {
            return Err(AppError::Internal(
                "readings from different keys cannot be reconciled together".into(),
            ));
        }

        let mut metrics = BTreeMap::new();
        for metric in MetricKind::ALL {
            let samples: Vec<Sample> = readings
                .iter()
                .filter_map(|r| {
                    r.value(metric).filter(|v| v.is_finite()).map(|value| Sample {
                        provider_id: &r.provider_id,
                        value,
                        weight: r.weight,
                        reported_at: r.reported_at,
                    })
                })
                .collect();

            if let Some(result) = reconcile_metric(&samples, self.tolerances.tolerance(metric)) {
                if result.level == ConfidenceLevel::Low {
                    tracing::debug!(
                        metric = %metric,
                        location = %first.location.key(),
                        "Providers disagree, returning low-confidence value"
                    );
                }
                metrics.insert(metric, result);
            }
        }

        if metrics.is_empty() {
            return Err(AppError::InsufficientData);
        }

        let mut providers: Vec<String> = Vec::with_capacity(readings.len());
        for reading in readings {
            if !providers.contains(&reading.provider_id) {
                providers.push(reading.provider_id.clone());
            }
        }

        Ok(Consensus {
            location: first.location.clone(),
            kind: first.kind,
            bucket: first.bucket,
            metrics,
            providers,
            computed_at: Utc::now(),
        })
    }
}

/// Highest score reachable by `n` fully agreeing readings
pub fn max_confidence(n: usize) -> f64 {
    1.0 - 0.5f64.powi(n as i32)
}

fn reconcile_metric(samples: &[Sample], tolerance: f64) -> Option<MetricConsensus> {
    if samples.is_empty() {
        return None;
    }

    if samples.len() == 1 {
        return Some(MetricConsensus {
            value: samples[0].value,
            confidence: max_confidence(1),
            level: ConfidenceLevel::Reduced,
            contributors: 1,
            outliers: vec![],
        });
    }

    let within = |a: f64, b: f64| (a - b).abs() <= tolerance;

    // Support of a sample: the samples agreeing with it, itself included
    let support = |anchor: &Sample| -> (usize, f64) {
        samples
            .iter()
            .filter(|s| within(s.value, anchor.value))
            .fold((0, 0.0), |(n, w), s| (n + 1, w + s.weight))
    };

    let anchor = samples
        .iter()
        .max_by(|a, b| {
            let (na, wa) = support(a);
            let (nb, wb) = support(b);
            na.cmp(&nb)
                .then(wa.total_cmp(&wb))
                .then(a.weight.total_cmp(&b.weight))
                // earlier report and smaller id rank higher
                .then(b.reported_at.cmp(&a.reported_at))
                .then(b.provider_id.cmp(a.provider_id))
        })
        .copied()?;

    let support_set: Vec<&Sample> = samples
        .iter()
        .filter(|s| within(s.value, anchor.value))
        .collect();
    let first_pass = weighted_mean(support_set.iter().copied());

    let (inliers, outliers): (Vec<&Sample>, Vec<&Sample>) = samples
        .iter()
        .partition(|s| within(s.value, first_pass));

    let inlier_weight: f64 = inliers.iter().map(|s| s.weight).sum();
    let outlier_weight: f64 =
        outliers.iter().map(|s| s.weight).sum::<f64>() * OUTLIER_WEIGHT_FACTOR;
    let agreement = if inlier_weight + outlier_weight > 0.0 {
        inlier_weight / (inlier_weight + outlier_weight)
    } else {
        inliers.len() as f64 / samples.len() as f64
    };
    let confidence = agreement * max_confidence(inliers.len());

    let result = if support_set.len() < 2 || inliers.is_empty() {
        MetricConsensus {
            value: weighted_mean(samples.iter()),
            confidence,
            level: ConfidenceLevel::Low,
            contributors: samples.len(),
            outliers: vec![],
        }
    } else {
        MetricConsensus {
            value: weighted_mean(inliers.iter().copied()),
            confidence,
            level: if outliers.is_empty() {
                ConfidenceLevel::High
            } else {
                ConfidenceLevel::Reduced
            },
            contributors: inliers.len(),
            outliers: outliers.iter().map(|s| s.provider_id.to_string()).collect(),
        }
    };
    Some(result)
}

/// Confidence-weighted mean; plain mean when every weight is zero
fn weighted_mean<'a>(samples: impl Iterator<Item = &'a Sample<'a>> + Clone) -> f64 {
    let (sum, total, count) = samples
        .clone()
        .fold((0.0, 0.0, 0usize), |(sum, total, n), s| {
            (sum + s.value * s.weight, total + s.weight, n + 1)
        });
    match total.partial_cmp(&0.0) {
        Some(Ordering::Greater) => sum / total,
        _ if count > 0 => samples.map(|s| s.value).sum::<f64>() / count as f64,
        _ => 0.0,
    }
}
